//! Logging utilities for sanitizing serial text so logs stay single-line.
//! Escapes control characters that otherwise break log readability and masks secrets.

/// Escape a string for single-line logging:
/// - `\n` => `\\n`
/// - `\r` => `\\r`
/// - `\t` => `\\t`
/// - backslash => `\\\\`
///   Truncates very long strings (over `MAX_PREVIEW` chars) with an ellipsis to cap log noise.
pub fn escape_log(s: &str) -> String {
    const MAX_PREVIEW: usize = 300;
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

/// Replace a secret with a fixed-width placeholder that only reveals its length.
pub fn mask_secret(secret: &str) -> String {
    format!("<{} chars>", secret.chars().count())
}

/// Escape a raw line and blank out every occurrence of `secret` in it.
pub fn redact(line: &str, secret: &str) -> String {
    if secret.is_empty() {
        return escape_log(line);
    }
    escape_log(&line.replace(secret, &mask_secret(secret)))
}

/// Escape a raw line and mask everything that follows `label`, for lines whose secret
/// could not be isolated.
pub fn redact_after(line: &str, label: &str) -> String {
    match line.find(label) {
        Some(pos) => {
            let (head, rest) = line.split_at(pos + label.len());
            format!("{} {}", escape_log(head), mask_secret(rest.trim()))
        }
        None => escape_log(line),
    }
}
