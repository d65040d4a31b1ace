// Text normalization shared by the dedup store and the similarity engine
use once_cell::sync::Lazy;
use regex::Regex;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:https?://|www\.)\S+").expect("valid url regex"));
static MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[@#]\w+").expect("valid tag regex"));

/// Dedup key: case-folded, whitespace-collapsed text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Returns `None` for empty or whitespace-only text.
    pub fn of(text: &str) -> Option<Self> {
        let key = collapse_whitespace(&text.to_lowercase());
        if key.is_empty() {
            None
        } else {
            Some(Self(key))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Lowercases, strips URLs, @mentions, #hashtags and punctuation, collapses whitespace.
pub fn normalize_text(text: &str) -> String {
    let lower = text.to_lowercase();
    let without_urls = URL_RE.replace_all(&lower, " ");
    let without_tags = MENTION_RE.replace_all(&without_urls, " ");
    let cleaned: String = without_tags
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    collapse_whitespace(&cleaned)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_folds_case_and_whitespace() {
        let a = Fingerprint::of("  What are   you\tbuilding?").unwrap();
        let b = Fingerprint::of("what ARE you building?").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "what are you building?");
    }

    #[test]
    fn fingerprint_rejects_blank() {
        assert!(Fingerprint::of("").is_none());
        assert!(Fingerprint::of(" \n\t ").is_none());
    }

    #[test]
    fn normalize_strips_noise() {
        let text = "Check https://x.com/a/status/1 @supabase rocks!!! #buildinpublic www.example.org";
        assert_eq!(normalize_text(text), "check rocks");
    }

    #[test]
    fn normalize_keeps_digits_and_unicode_letters() {
        assert_eq!(normalize_text("Café v2.0 — ready?"), "café v2 0 ready");
    }

    #[test]
    fn normalize_can_yield_empty() {
        assert_eq!(normalize_text("@someone #tag ..."), "");
    }
}
