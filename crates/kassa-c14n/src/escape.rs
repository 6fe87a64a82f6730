#![forbid(unsafe_code)]

//! Character escaping for canonical output.
//!
//! Text nodes escape `&`, `<`, `>` and carriage returns. Attribute values
//! escape `&`, `<`, `"` and the whitespace characters tab, newline and
//! carriage return as hexadecimal character references.

/// Append text node content to `out`.
pub fn push_text(out: &mut String, s: &str) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
}

/// Append an attribute value to `out`.
pub fn push_attr_value(out: &mut String, s: &str) {
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
}

/// Append processing instruction data to `out`.
pub fn push_pi_data(out: &mut String, s: &str) {
    for ch in s.chars() {
        match ch {
            '\r' => out.push_str("&#xD;"),
            _ => out.push(ch),
        }
    }
}
