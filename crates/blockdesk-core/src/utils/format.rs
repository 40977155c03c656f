use chrono::{DateTime, Local, NaiveDateTime};

/// Case-insensitive substring match used by every search box.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an optional string, returning a default if None
pub fn format_optional(value: &Option<String>, default: &str) -> String {
    value.as_deref().unwrap_or(default).to_string()
}

/// Render a backend timestamp in local time.
///
/// The audit trail uses `YYYY-MM-DD HH:MM:SS`; API logs and keys use RFC 3339.
/// Anything else is shown as received.
pub fn format_timestamp(ts: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(ts) {
        dt.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
    } else if NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").is_ok() {
        ts.to_string()
    } else if ts.is_empty() {
        "-".to_string()
    } else {
        ts.to_string()
    }
}
