use std::borrow::Cow;

use unicode_width::UnicodeWidthChar;

/// Ellipsis appended to truncated text
const ELLIPSIS: &str = "...";

/// Strip terminal control characters and ANSI escape sequences.
///
/// Feed titles and descriptions come from arbitrary servers and are printed
/// straight to the terminal. Tab and newline are kept; ESC starts a sequence
/// that is dropped up to its final byte (CSI) or terminator (OSC).
///
/// Returns `Cow::Borrowed` when there is nothing to strip.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    fn is_unwanted(c: char) -> bool {
        c == '\x1b' || c == '\x7f' || (c.is_ascii_control() && c != '\t' && c != '\n')
    }

    if !s.chars().any(is_unwanted) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            if !is_unwanted(c) {
                out.push(c);
            }
            continue;
        }

        match chars.peek() {
            Some('[') => {
                chars.next();
                // Parameters run until a final byte in 0x40..=0x7e
                for c in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&c) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                // Until BEL or ST (ESC \)
                while let Some(c) = chars.next() {
                    if c == '\x07' {
                        break;
                    }
                    if c == '\x1b' && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    Cow::Owned(out)
}

/// Truncate to at most `max_width` terminal columns, ending in "..." when cut.
///
/// Width is measured per character, so wide CJK glyphs count double.
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    let total: usize = s.chars().map(|c| c.width().unwrap_or(0)).sum();
    if total <= max_width {
        return Cow::Borrowed(s);
    }

    // Too narrow for an ellipsis: plain cut
    let (budget, suffix) = if max_width >= ELLIPSIS.len() {
        (max_width - ELLIPSIS.len(), ELLIPSIS)
    } else {
        (max_width, "")
    };
    let mut used = 0;
    let mut out = String::new();
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }

    out.push_str(suffix);
    Cow::Owned(out)
}

/// Render a Unix timestamp as `YYYY-MM-DD HH:MM:SS UTC`
pub fn format_timestamp(ts: i64) -> String {
    match chrono::DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => ts.to_string(),
    }
}

/// Render a Unix timestamp in microseconds, at second resolution
pub fn format_timestamp_micros(ts: i64) -> String {
    match chrono::DateTime::from_timestamp_micros(ts) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => ts.to_string(),
    }
}
