//! Utility functions and helpers.

pub mod http;

use unicode_segmentation::UnicodeSegmentation;
use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Trim and collapse every whitespace run to a single space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Display width of `s` in user-perceived characters.
pub fn display_width(s: &str) -> usize {
    s.graphemes(true).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://example.com/tour/").unwrap();
        assert_eq!(
            resolve_url(&base, "tickets/1"),
            "https://example.com/tour/tickets/1"
        );
        assert_eq!(
            resolve_url(&base, "/root.html"),
            "https://example.com/root.html"
        );
        assert_eq!(
            resolve_url(&base, "https://other.com/x"),
            "https://other.com/x"
        );
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  The \t Masonic\n "), "The Masonic");
        assert_eq!(collapse_whitespace("   "), "");
    }

    #[test]
    fn test_display_width_counts_graphemes() {
        assert_eq!(display_width("Café"), 4);
        assert_eq!(display_width("e\u{301}"), 1);
    }
}
