//! Armored message detection and normalisation.
//!
//! Text pulled out of a rich-text compose element is mangled: indentation,
//! non-breaking spaces, CRLF line ends, lost blank lines. [`extract_armored`]
//! finds the first armored block and rebuilds it in canonical form.

use crate::error::ArmorError;

/// First line of an armored message.
pub const BEGIN_MARKER: &str = "-----BEGIN PGP MESSAGE-----";

/// Last line of an armored message.
pub const END_MARKER: &str = "-----END PGP MESSAGE-----";

/// Whether `text` looks like it contains an armored message.
///
/// Accepts any single whitespace character between the header words, the
/// way a rich-text editor may have rewritten them.
pub fn contains_armored(text: &str) -> bool {
    text.match_indices("BEGIN").any(|(at, _)| {
        let rest = &text[at + "BEGIN".len()..];
        let Some(rest) = strip_one_whitespace(rest) else {
            return false;
        };
        let Some(rest) = rest.strip_prefix("PGP") else {
            return false;
        };
        strip_one_whitespace(rest).is_some_and(|rest| rest.starts_with("MESSAGE"))
    })
}

/// Extract and normalise the first armored block in `text`.
pub fn extract_armored(text: &str) -> Result<String, ArmorError> {
    let text = text.replace('\u{a0}', " ");
    let start = text.find(BEGIN_MARKER).ok_or(ArmorError::MissingBegin)?;
    let body_start = start + BEGIN_MARKER.len();
    let end = text[body_start..].find(END_MARKER).ok_or(ArmorError::MissingEnd)? + body_start;

    let mut lines = text[body_start..end].lines().map(str::trim).filter(|l| !l.is_empty()).peekable();

    let mut headers = Vec::new();
    while let Some(line) = lines.next_if(|l| is_armor_header(l)) {
        headers.push(line);
    }
    let body: Vec<_> = lines.collect();
    if body.is_empty() {
        return Err(ArmorError::EmptyBody);
    }

    let mut armored = String::with_capacity(end - start + END_MARKER.len());
    armored.push_str(BEGIN_MARKER);
    armored.push('\n');
    for header in headers {
        armored.push_str(header);
        armored.push('\n');
    }
    armored.push('\n');
    for line in body {
        armored.push_str(line);
        armored.push('\n');
    }
    armored.push_str(END_MARKER);
    Ok(armored)
}

fn strip_one_whitespace(s: &str) -> Option<&str> {
    let mut chars = s.chars();
    chars.next().filter(|c| c.is_whitespace()).map(|_| chars.as_str())
}

/// `Version: x`, `Comment: y`, `Charset: z`, ...
fn is_armor_header(line: &str) -> bool {
    line.split_once(": ").is_some_and(|(key, _)| {
        !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = "-----BEGIN PGP MESSAGE-----\nVersion: Test\n\nwcBMA0\nabcd==\n=XyZ1\n-----END PGP MESSAGE-----";

    #[test]
    fn detects_rewritten_header() {
        assert!(contains_armored("hi\n-----BEGIN PGP MESSAGE-----\n"));
        assert!(contains_armored("BEGIN\u{a0}PGP\tMESSAGE"));
        assert!(!contains_armored("BEGIN  PGP MESSAGE"));
        assert!(!contains_armored("just a letter"));
    }

    #[test]
    fn canonical_block_is_unchanged() {
        assert_eq!(extract_armored(CANONICAL).unwrap(), CANONICAL);
    }

    #[test]
    fn mangled_rich_text_is_normalised() {
        let mangled = "On Monday Bob wrote:\r\n  -----BEGIN PGP MESSAGE-----\r\n   Version: Test\r\n\r\n\r\n\u{a0}wcBMA0 \r\n abcd==\r\n=XyZ1\r\n-----END PGP MESSAGE-----\r\n> trailing";
        assert_eq!(extract_armored(mangled).unwrap(), CANONICAL);
    }

    #[test]
    fn missing_blank_line_after_headers_is_restored() {
        let squashed = "-----BEGIN PGP MESSAGE-----\nVersion: Test\nwcBMA0\nabcd==\n=XyZ1\n-----END PGP MESSAGE-----";
        assert_eq!(extract_armored(squashed).unwrap(), CANONICAL);
    }

    #[test]
    fn takes_first_block_only() {
        let two = format!("{CANONICAL}\n\n{CANONICAL}");
        assert_eq!(extract_armored(&two).unwrap(), CANONICAL);
    }

    #[test]
    fn malformed_blocks_are_errors() {
        assert_eq!(extract_armored("nothing here"), Err(ArmorError::MissingBegin));
        assert_eq!(extract_armored("-----BEGIN PGP MESSAGE-----\nabc"), Err(ArmorError::MissingEnd));
        assert_eq!(
            extract_armored("-----BEGIN PGP MESSAGE-----\nVersion: x\n\n-----END PGP MESSAGE-----"),
            Err(ArmorError::EmptyBody)
        );
    }
}
