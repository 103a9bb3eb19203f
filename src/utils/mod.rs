//! Utility functions and helpers.

pub mod http;
pub mod log;

use unicode_segmentation::UnicodeSegmentation;

/// Shorten text to at most `max` user-perceived characters, marking the cut.
pub fn truncate_graphemes(text: &str, max: usize) -> String {
    let graphemes: Vec<&str> = text.graphemes(true).collect();
    if graphemes.len() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }

    let mut out: String = graphemes[..max - 1].concat();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_untouched() {
        assert_eq!(truncate_graphemes("Show HN", 20), "Show HN");
        assert_eq!(truncate_graphemes("", 5), "");
    }

    #[test]
    fn test_truncate_long_text() {
        assert_eq!(truncate_graphemes("abcdefgh", 5), "abcd…");
        assert_eq!(truncate_graphemes("abc", 0), "");
    }

    #[test]
    fn test_truncate_keeps_graphemes_whole() {
        // "é" as e + combining acute, and a flag made of two code points
        let text = "e\u{301}e\u{301}🇰🇷xyz";
        assert_eq!(truncate_graphemes(text, 4), "e\u{301}e\u{301}🇰🇷…");
    }
}
