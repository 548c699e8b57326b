const MAX_TITLE_CHARS: usize = 50;
const ELLIPSIS: &str = "...";

/// Fallback conversation title: the first 50 characters of the message,
/// trimmed, with an ellipsis when the message was longer than that.
pub fn truncate_title(message: &str) -> String {
    let cut: String = message.chars().take(MAX_TITLE_CHARS).collect();
    let mut title = cut.trim().to_string();
    if message.chars().count() > MAX_TITLE_CHARS {
        title.push_str(ELLIPSIS);
    }
    title
}
