//! Mail address parsing.
//!
//! Header values coming back from the provider are untrusted text. Parsing
//! never fails the caller: an unparseable entry is skipped, an unparseable
//! list is empty.

use crate::Recipient;

/// Parse a single address: `a@x.com`, `Alice <a@x.com>` or
/// `"Doe, Alice" <a@x.com>`.
pub fn parse_address(input: &str) -> Option<Recipient> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    let (name, email) = match (input.rfind('<'), input.rfind('>')) {
        (Some(open), Some(close)) if open < close => {
            let name = unquote(input[..open].trim());
            (name, input[open + 1..close].trim())
        },
        (None, None) => (None, input),
        _ => return None,
    };

    if !is_valid_email(email) {
        return None;
    }

    Some(Recipient { email: email.to_owned(), name })
}

/// Parse a comma-separated address list, skipping invalid entries.
///
/// Commas inside quotes or angle brackets do not split.
pub fn parse_address_list(input: &str) -> Vec<Recipient> {
    let mut entries = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut in_angle = false;

    for (i, c) in input.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' if !in_quotes && !in_angle => {
                entries.push(&input[start..i]);
                start = i + 1;
            },
            _ => {},
        }
    }
    entries.push(&input[start..]);

    entries.into_iter().filter_map(parse_address).collect()
}

/// Case-insensitive address comparison.
pub fn same_address(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn unquote(name: &str) -> Option<String> {
    let name = name.strip_prefix('"').and_then(|n| n.strip_suffix('"')).unwrap_or(name).trim();
    (!name.is_empty()).then(|| name.to_owned())
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(|c| c.is_whitespace() || c == '<' || c == '>' || c == ',')
}
