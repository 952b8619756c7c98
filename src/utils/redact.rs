//! Redaction of tokens and keys in log output

use std::fmt;

const VISIBLE_PREFIX: usize = 4;

/// Display wrapper that shows only a short prefix and the length of a secret.
///
/// Tokens and derived keys double as upstream anti-scraping secrets, so they
/// go through this wrapper in every event above debug level.
#[derive(Clone, Copy)]
pub struct Redacted<'a>(pub &'a [u8]);

impl<'a> Redacted<'a> {
    pub fn str(value: &'a str) -> Self {
        Redacted(value.as_bytes())
    }
}

/// Shorthand for `Redacted::str`
pub fn redact(value: &str) -> Redacted<'_> {
    Redacted::str(value)
}

impl fmt::Display for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let visible: String = self
            .0
            .iter()
            .take(VISIBLE_PREFIX)
            .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
            .collect();
        write!(f, "{}…(len={})", visible, self.0.len())
    }
}

impl fmt::Debug for Redacted<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Redacted({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacts_to_prefix_and_length() {
        let shown = redact("=0je4I3M3pWe4Zmc0YkRWZ0R").to_string();
        assert_eq!(shown, "=0je…(len=24)");
        assert!(!shown.contains("M3pWe"));
    }

    #[test]
    fn test_short_and_binary_values() {
        assert_eq!(redact("").to_string(), "…(len=0)");
        assert_eq!(Redacted(&[0x00, 0x41, 0xff]).to_string(), ".A.…(len=3)");
    }
}
