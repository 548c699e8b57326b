pub mod repl;
pub mod sidebar;

pub use repl::Repl;
