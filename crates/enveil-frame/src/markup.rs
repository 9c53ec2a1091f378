//! Markup written into and read from rich-text compose elements.

/// Escape `text` for use as HTML element content.
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '/' => escaped.push_str("&#x2F;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// `text` escaped and wrapped in `<pre>` so armor line breaks survive.
pub fn preformatted(text: &str) -> String {
    format!("<pre>{}</pre>", escape_html(text))
}

/// Inner HTML as the frame reads it: newlines removed.
pub fn flatten_html(html: &str) -> String {
    html.chars().filter(|&c| c != '\n').collect()
}
