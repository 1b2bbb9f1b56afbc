//! Address syntax check, the first and only offline stage.

use std::sync::LazyLock;

use regex::Regex;

// local-part: letters, digits, `. _ % + -`; domain: dot-separated labels of
// alphanumerics/hyphens ending in an alphabetic TLD of two or more letters.
static ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z0-9._%+-]+@(?:[a-z0-9-]+\.)+[a-z]{2,}$")
        .unwrap_or_else(|err| panic!("address pattern does not compile: {err}"))
});

/// Returns `true` when `email` is a syntactically acceptable address.
///
/// Never touches the network and never fails: empty input, a missing or
/// repeated `@`, or a domain without a top-level label all yield `false`.
pub fn check(email: &str) -> bool {
    ADDRESS.is_match(email)
}

/// Canonical form used for checking and for the `RCPT TO` envelope.
pub fn normalize(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// Domain part of an already normalized address.
pub(crate) fn domain_of(normalized: &str) -> Option<&str> {
    normalized
        .rsplit_once('@')
        .map(|(_, domain)| domain)
        .filter(|domain| !domain.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_basic() {
        assert!(check("user@example.com"));
        assert!(check("first.last+tag@mail.example.co.uk"));
        assert!(check("a_b%c-d@sub-domain.example.org"));
    }

    #[test]
    fn is_case_insensitive() {
        assert!(check("USER@UPPERCASE.COM"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(!check("not-an-email"));
        assert!(!check(""));
        assert!(!check("@example.com"));
        assert!(!check("user@"));
        assert!(!check("a@@b.com"));
        assert!(!check("a@b@example.com"));
        assert!(!check("user name@example.com"));
    }

    #[test]
    fn requires_top_level_label() {
        assert!(!check("a@b"));
        assert!(!check("user@example.c"));
        assert!(!check("user@example.123"));
        assert!(!check("user@example."));
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize("  Alice@Example.COM \n"), "alice@example.com");
    }

    #[test]
    fn domain_of_splits_on_last_at() {
        assert_eq!(domain_of("user@example.com"), Some("example.com"));
        assert_eq!(domain_of("user@"), None);
        assert_eq!(domain_of("nodomain"), None);
    }
}
