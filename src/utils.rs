//! Utility functions for the pair-chat engine

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique user ID
pub fn generate_user_id() -> Uuid {
    Uuid::new_v4()
}

/// Generate a new unique room ID
pub fn generate_room_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Strip HTML-special characters and script-like prefixes from free text.
///
/// This is a courtesy filter for relayed text and aliases, not an HTML
/// escaper for rendering.
pub fn sanitize_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }

    strip_case_insensitive(&mut out, "javascript:");
    strip_event_handler_attrs(&mut out);
    out
}

/// Normalize a raw alias: trim, collapse whitespace, sanitize, truncate to
/// `max_len` characters. Returns `None` when fewer than `min_len` characters
/// survive.
pub fn normalize_alias(raw: &str, min_len: usize, max_len: usize) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(max_len).collect();
    let normalized = sanitize_text(&truncated);

    if normalized.chars().count() >= min_len {
        Some(normalized)
    } else {
        None
    }
}

/// Compare two secrets without short-circuiting on the first mismatch.
///
/// Length differences still return early; the secret's length is not
/// considered sensitive here, its contents are.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Remove every occurrence of the ASCII `needle` from `text`, ignoring case.
fn strip_case_insensitive(text: &mut String, needle: &str) {
    let needle = needle.as_bytes();
    loop {
        let hay = text.as_bytes();
        if hay.len() < needle.len() {
            break;
        }

        let mut found = None;
        'outer: for start in 0..=hay.len() - needle.len() {
            for (k, nb) in needle.iter().enumerate() {
                if hay[start + k].to_ascii_lowercase() != *nb {
                    continue 'outer;
                }
            }
            found = Some(start);
            break;
        }

        match found {
            // The matched bytes are ASCII, so the range sits on char
            // boundaries.
            Some(pos) => text.replace_range(pos..pos + needle.len(), ""),
            None => break,
        }
    }
}

/// Drop inline `onXxx=` event-handler attributes.
fn strip_event_handler_attrs(text: &mut String) {
    let chars: Vec<char> = text.chars().collect();
    let mut result = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if (chars[i] == 'o' || chars[i] == 'O')
            && i + 1 < chars.len()
            && (chars[i + 1] == 'n' || chars[i + 1] == 'N')
        {
            // Scan word characters, optional whitespace, then '='.
            let mut j = i + 2;
            while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                j += 1;
            }
            let word_end = j;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if word_end > i + 2 && j < chars.len() && chars[j] == '=' {
                i = j + 1;
                continue;
            }
        }
        result.push(chars[i]);
        i += 1;
    }

    *text = result;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        assert_ne!(generate_user_id(), generate_user_id());
        assert_ne!(generate_room_id(), generate_room_id());
    }

    #[test]
    fn test_sanitize_escapes_angle_brackets() {
        assert_eq!(sanitize_text("<b>hi</b>"), "&lt;b&gt;hi&lt;/b&gt;");
    }

    #[test]
    fn test_sanitize_strips_script_prefixes() {
        assert_eq!(sanitize_text("JavaScript:alert(1)"), "alert(1)");
        assert_eq!(sanitize_text("click onclick=steal()"), "click steal()");
    }

    #[test]
    fn test_normalize_alias_collapses_and_truncates() {
        assert_eq!(
            normalize_alias("  quiet   stranger  ", 2, 24),
            Some("quiet stranger".to_string())
        );

        let long = "a".repeat(40);
        let normalized = normalize_alias(&long, 2, 24).unwrap();
        assert_eq!(normalized.chars().count(), 24);
    }

    #[test]
    fn test_normalize_alias_rejects_too_short() {
        assert_eq!(normalize_alias("x", 2, 24), None);
        assert_eq!(normalize_alias("   ", 2, 24), None);
        assert_eq!(normalize_alias("", 2, 24), None);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("secret-token", "secret-token"));
        assert!(!constant_time_eq("secret-token", "secret-tokeX"));
        assert!(!constant_time_eq("short", "longer-value"));
        assert!(constant_time_eq("", ""));
    }
}
