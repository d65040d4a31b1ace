// Utility functions
use chrono::{DateTime, Utc};

/// Parses an RFC 3339 string into `DateTime<Utc>` if possible.
pub fn parse_datetime(date_str: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(date_str)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Canonical RFC 3339 form of a feed timestamp; unparsable values pass through trimmed.
pub fn canonical_timestamp(raw: &str) -> String {
    match parse_datetime(raw.trim()) {
        Some(dt) => dt.to_rfc3339(),
        None => raw.trim().to_string(),
    }
}

/// Percent-encodes a search query for use inside a URL.
pub fn encode_query(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for byte in text.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_timestamps() {
        assert_eq!(
            canonical_timestamp("2025-03-01T10:15:00.000Z"),
            "2025-03-01T10:15:00+00:00"
        );
        assert_eq!(canonical_timestamp(" 3h ago "), "3h ago");
    }

    #[test]
    fn encodes_reserved_characters() {
        assert_eq!(encode_query("supabase auth"), "supabase%20auth");
        assert_eq!(encode_query("c++ & rust"), "c%2B%2B%20%26%20rust");
        assert_eq!(encode_query("naïve"), "na%C3%AFve");
    }
}
