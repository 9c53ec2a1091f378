//! Property-based tests for rich-text markup.

use enveil_frame::markup::{escape_html, flatten_html, preformatted};
use proptest::prelude::*;

proptest! {
    /// Escaped text can never open or close a tag or an attribute.
    #[test]
    fn prop_escaped_text_has_no_markup(text in any::<String>()) {
        let escaped = escape_html(&text);
        prop_assert!(!escaped.contains(['<', '>', '"', '\'']));
        prop_assert!(escaped.len() >= text.len());
    }

    /// Text without special characters passes through unchanged.
    #[test]
    fn prop_plain_text_is_untouched(text in "[A-Za-z0-9 +=\n-]{0,64}") {
        prop_assert_eq!(escape_html(&text), text.clone());
        prop_assert_eq!(preformatted(&text), format!("<pre>{text}</pre>"));
    }

    /// Flattening removes every newline and nothing else.
    #[test]
    fn prop_flatten_only_drops_newlines(html in any::<String>()) {
        let flat = flatten_html(&html);
        prop_assert!(!flat.contains('\n'));
        prop_assert_eq!(flat.len() + html.matches('\n').count(), html.len());
    }
}
