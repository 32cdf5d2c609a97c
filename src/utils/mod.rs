//! Utility functions.
//!
//! Small helpers shared by the plugins and event handlers.

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Build an inline HTML mention for a user.
pub fn mention_html(user_id: u64, name: &str) -> String {
    format!(
        "<a href=\"tg://user?id={}\">{}</a>",
        user_id,
        html_escape(name)
    )
}

fn unit(n: u64, word: &str) -> String {
    if n == 1 {
        format!("1 {}", word)
    } else {
        format!("{} {}s", n, word)
    }
}

/// Format a duration in seconds as human-readable text (e.g. "2 hours 5 minutes").
pub fn format_duration_full(secs: u64) -> String {
    if secs < 60 {
        unit(secs, "second")
    } else if secs < 3600 {
        unit(secs / 60, "minute")
    } else if secs < 86400 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        if mins > 0 {
            format!("{} {}", unit(hours, "hour"), unit(mins, "minute"))
        } else {
            unit(hours, "hour")
        }
    } else {
        let days = secs / 86400;
        let hours = (secs % 86400) / 3600;
        if hours > 0 {
            format!("{} {}", unit(days, "day"), unit(hours, "hour"))
        } else {
            unit(days, "day")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_escape() {
        assert_eq!(html_escape("a<b>&c"), "a&lt;b&gt;&amp;c");
        assert_eq!(html_escape("plain"), "plain");
    }

    #[test]
    fn test_mention_html_escapes_name() {
        let m = mention_html(42, "Bob <alpha>");
        assert_eq!(m, "<a href=\"tg://user?id=42\">Bob &lt;alpha&gt;</a>");
    }

    #[test]
    fn test_format_duration_full() {
        assert_eq!(format_duration_full(30), "30 seconds");
        assert_eq!(format_duration_full(120), "2 minutes");
        assert_eq!(format_duration_full(3600), "1 hour");
        assert_eq!(format_duration_full(3900), "1 hour 5 minutes");
        assert_eq!(format_duration_full(90000), "1 day 1 hour");
    }
}
