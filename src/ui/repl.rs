use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

use super::sidebar::{self, SIDEBAR_LIMIT};
use crate::services::{CacheError, ConversationCache, RouteDecision, Session};

const HELP: &str = "\
Commands:
  list [all]                 show conversations (most recent first)
  new [title]                create a conversation and select it
  pick <ref>                 select a conversation
  rename <ref> <title>       rename a conversation
  rm <ref>...                delete one or more conversations
  touch <ref>                mark a conversation active
  title <text>               mark the current conversation active and auto-title it from <text>
  history [ref]              show messages (current conversation by default)
  refresh                    reload from the backend
  nav | access <path>        show visible sections / check a route
  whoami | help | quit
<ref> is a list number or a conversation id.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List { all: bool },
    New { title: Option<String> },
    Pick(String),
    Rename { target: String, title: String },
    Remove(Vec<String>),
    Touch(String),
    Title(String),
    History(Option<String>),
    Refresh,
    Nav,
    Access(String),
    WhoAmI,
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        let required = |what: &str| -> Result<String, String> {
            if rest.is_empty() {
                Err(format!("`{}` needs {}", verb, what))
            } else {
                Ok(rest.to_string())
            }
        };

        let command = match verb {
            "list" | "ls" => Command::List { all: rest == "all" },
            "new" => Command::New {
                title: (!rest.is_empty()).then(|| rest.to_string()),
            },
            "pick" | "open" => Command::Pick(required("a conversation")?),
            "rename" => {
                let (target, title) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| "`rename` needs a conversation and a title".to_string())?;
                Command::Rename {
                    target: target.to_string(),
                    title: title.to_string(),
                }
            }
            "rm" | "delete" => Command::Remove(
                required("at least one conversation")?
                    .split_whitespace()
                    .map(str::to_string)
                    .collect(),
            ),
            "touch" => Command::Touch(required("a conversation")?),
            "title" => Command::Title(required("a message")?),
            "history" => Command::History((!rest.is_empty()).then(|| rest.to_string())),
            "refresh" => Command::Refresh,
            "nav" => Command::Nav,
            "access" => Command::Access(required("a path")?),
            "whoami" => Command::WhoAmI,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("Unknown command `{}` (try `help`)", other)),
        };
        Ok(Some(command))
    }
}

/// Map a list number or id to a conversation id.
fn resolve(cache: &ConversationCache, reference: &str) -> Option<String> {
    let conversations = cache.conversations();
    if let Ok(n) = reference.parse::<usize>() {
        if n >= 1 && n <= conversations.len() {
            return Some(conversations[n - 1].id.clone());
        }
    }
    conversations
        .into_iter()
        .find(|c| c.id == reference)
        .map(|c| c.id)
}

fn report(err: &CacheError) {
    match err {
        CacheError::InvalidInput(reason) => println!("Nothing done: {}", reason),
        other => println!("Error: {}", other),
    }
}

pub struct Repl {
    session: Session,
    lines: Lines<BufReader<Stdin>>,
}

impl Repl {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    async fn prompt(&mut self, text: &str) -> Result<Option<String>> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(text.as_bytes()).await?;
        stdout.flush().await?;
        Ok(self.lines.next_line().await?)
    }

    pub async fn run(mut self) -> Result<()> {
        println!("Signed in as {}. Type `help` for commands.", self.session.principal().id);
        self.print_list(false);

        while let Some(line) = self.prompt("> ").await? {
            match Command::parse(&line) {
                Ok(Some(Command::Quit)) => break,
                Ok(Some(command)) => self.execute(command).await?,
                Ok(None) => {}
                Err(message) => println!("{}", message),
            }
        }

        self.session.sign_out();
        Ok(())
    }

    fn print_list(&self, all: bool) {
        let cache = self.session.cache();
        if cache.is_loading() {
            println!("Loading...");
            return;
        }
        let limit = (!all).then_some(SIDEBAR_LIMIT);
        let current = cache.current_id();
        print!(
            "{}",
            sidebar::render(&cache.conversations(), current.as_deref(), limit, Utc::now())
        );
    }

    async fn execute(&mut self, command: Command) -> Result<()> {
        let cache: Arc<ConversationCache> = self.session.cache();

        match command {
            Command::List { all } => self.print_list(all),
            Command::New { title } => match cache.create(title.as_deref()).await {
                Ok(conv) => println!("Created \"{}\" ({})", conv.title, conv.id),
                Err(e) => report(&e),
            },
            Command::Pick(reference) => match resolve(&cache, &reference) {
                Some(id) => match cache.open(&id) {
                    // The reorder is already visible; the backend call runs on.
                    Ok(_pending) => self.print_list(false),
                    Err(e) => report(&e),
                },
                None => println!("No conversation `{}`", reference),
            },
            Command::Rename { target, title } => match resolve(&cache, &target) {
                Some(id) => match cache.rename(&id, &title).await {
                    Ok(()) => self.print_list(false),
                    Err(e) => report(&e),
                },
                None => println!("No conversation `{}`", target),
            },
            Command::Remove(references) => {
                let mut ids = Vec::new();
                for reference in &references {
                    match resolve(&cache, reference) {
                        Some(id) => ids.push(id),
                        None => {
                            println!("No conversation `{}`", reference);
                            return Ok(());
                        }
                    }
                }
                let question = match ids.len() {
                    1 => "Delete this conversation? [y/N] ".to_string(),
                    n => format!("Delete {} conversations? [y/N] ", n),
                };
                let answer = self.prompt(&question).await?.unwrap_or_default();
                if !matches!(answer.trim(), "y" | "Y" | "yes") {
                    println!("Kept.");
                    return Ok(());
                }
                let result = match ids.as_slice() {
                    [id] => cache.remove(id).await.map(|()| 1),
                    _ => cache.remove_batch(&ids).await,
                };
                match result {
                    Ok(n) => println!("Deleted {} conversation(s)", n),
                    Err(e) => report(&e),
                }
            }
            Command::Touch(reference) => match resolve(&cache, &reference) {
                Some(id) => {
                    if let Ok(Err(e)) = cache.touch(&id).await {
                        report(&e);
                    }
                }
                None => println!("No conversation `{}`", reference),
            },
            Command::Title(text) => {
                let id = match cache.current_id() {
                    Some(id) => id,
                    None => match cache.create(None).await {
                        Ok(conv) => conv.id,
                        Err(e) => {
                            report(&e);
                            return Ok(());
                        }
                    },
                };
                let _pending = cache.touch(&id);
                match cache.generate_title(&id, &text).await {
                    Ok(Some(title)) => println!("Titled \"{}\"", title),
                    Ok(None) => {}
                    Err(e) => report(&e),
                }
            }
            Command::History(reference) => {
                let id = match reference {
                    Some(r) => resolve(&cache, &r),
                    None => cache.current_id(),
                };
                let Some(id) = id else {
                    println!("No conversation selected");
                    return Ok(());
                };
                match cache.history(&id).await {
                    Ok(messages) if messages.is_empty() => println!("(no messages)"),
                    Ok(messages) => {
                        for message in messages {
                            println!("[{}] {}", message.role.as_str(), message.content);
                        }
                    }
                    Err(e) => report(&e),
                }
            }
            Command::Refresh => match cache.refresh().await {
                Ok(()) => self.print_list(false),
                Err(e) => report(&e),
            },
            Command::Nav => {
                for item in self.session.navigation() {
                    println!("{:<10} {}", item.title, item.path);
                }
            }
            Command::Access(path) => match self.session.check_route(&path) {
                RouteDecision::Allow => println!("allow"),
                RouteDecision::Unauthenticated => println!("sign-in required"),
                RouteDecision::Forbidden { required } => {
                    let roles: Vec<_> = required.iter().map(|r| r.as_str()).collect();
                    println!("forbidden: needs {}", roles.join(" or "));
                }
            },
            Command::WhoAmI => {
                let principal = self.session.principal();
                let roles: Vec<_> = principal.roles.iter().map(String::as_str).collect();
                println!("{} roles=[{}]", principal.id, roles.join(", "));
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("   ").unwrap(), None);
        assert_eq!(
            Command::parse("list all").unwrap(),
            Some(Command::List { all: true })
        );
        assert_eq!(
            Command::parse("new").unwrap(),
            Some(Command::New { title: None })
        );
        assert_eq!(
            Command::parse("new  Weekly sync ").unwrap(),
            Some(Command::New {
                title: Some("Weekly sync".to_string())
            })
        );
        assert_eq!(
            Command::parse("rename 2 Quarterly planning").unwrap(),
            Some(Command::Rename {
                target: "2".to_string(),
                title: "Quarterly planning".to_string()
            })
        );
        assert_eq!(
            Command::parse("rm 1 3").unwrap(),
            Some(Command::Remove(vec!["1".to_string(), "3".to_string()]))
        );
        assert_eq!(Command::parse("history").unwrap(), Some(Command::History(None)));
        assert_eq!(
            Command::parse("title How do I rotate logs?").unwrap(),
            Some(Command::Title("How do I rotate logs?".to_string()))
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(Command::parse("pick").is_err());
        assert!(Command::parse("rename 2").is_err());
        assert!(Command::parse("frobnicate").is_err());
        assert!(Command::parse("title").is_err());
        assert!(Command::parse("say hello").is_err());
    }
}
