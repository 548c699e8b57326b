use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::Conversation;

/// Entries shown before the list is cut off, unless everything is asked for.
pub const SIDEBAR_LIMIT: usize = 10;

/// Compact age label: `now`, `12m`, `5h`, `3d`, then the plain date.
pub fn format_relative(ts: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(ts) = ts else {
        return String::new();
    };
    let elapsed = now.signed_duration_since(ts);
    let mins = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if mins < 1 {
        "now".to_string()
    } else if mins < 60 {
        format!("{}m", mins)
    } else if hours < 24 {
        format!("{}h", hours)
    } else if days < 7 {
        format!("{}d", days)
    } else {
        ts.format("%Y-%m-%d").to_string()
    }
}

pub fn render(
    conversations: &[Conversation],
    current: Option<&str>,
    limit: Option<usize>,
    now: DateTime<Utc>,
) -> String {
    if conversations.is_empty() {
        return "No conversations yet. Type `new` to start one.\n".to_string();
    }

    let shown = limit.unwrap_or(conversations.len()).min(conversations.len());
    let mut out = String::new();
    for (index, conv) in conversations.iter().take(shown).enumerate() {
        let marker = if current == Some(conv.id.as_str()) { '*' } else { ' ' };
        let _ = writeln!(
            out,
            "{} {:>2}. {:<40} {:>10}  {}",
            marker,
            index + 1,
            conv.title,
            format_relative(conv.updated_at, now),
            conv.id
        );
    }
    if shown < conversations.len() {
        let _ = writeln!(out, "   ... {} more (`list all`)", conversations.len() - shown);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_format_relative() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        assert_eq!(format_relative(None, now), "");
        assert_eq!(format_relative(Some(now - Duration::seconds(20)), now), "now");
        assert_eq!(format_relative(Some(now - Duration::minutes(12)), now), "12m");
        assert_eq!(format_relative(Some(now - Duration::hours(5)), now), "5h");
        assert_eq!(format_relative(Some(now - Duration::days(3)), now), "3d");
        assert_eq!(format_relative(Some(now - Duration::days(9)), now), "2024-03-01");
    }

    #[test]
    fn test_render_marks_current_and_truncates() {
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let convs: Vec<_> = (0..12)
            .map(|i| Conversation::new(format!("id{}", i), "u1", format!("Chat {}", i), None, Some(now)))
            .collect();

        let out = render(&convs, Some("id1"), Some(SIDEBAR_LIMIT), now);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 11);
        assert!(lines[1].starts_with('*'));
        assert!(lines[10].contains("2 more"));

        let all = render(&convs, None, None, now);
        assert_eq!(all.lines().count(), 12);
    }

    #[test]
    fn test_render_empty() {
        assert!(render(&[], None, None, Utc::now()).contains("No conversations"));
    }
}
