//! Whitespace visibility and output highlighting
//!
//! The text renderer can replace invisible characters with visible markers
//! (space to `·`, tab to `→`, newline to `↵`, carriage return to `←`) so
//! trailing-whitespace bugs show up in the report. The transformation is
//! reversible, which lets value highlighting run on the real characters and
//! the markers be re-applied afterwards. ANSI sequences never contain a
//! literal space or tab, so re-application is safe.

use std::sync::OnceLock;

use colored::Colorize;
use regex::Regex;

use crate::trace::render::Style;

const MARK_SPACE: &str = "\u{00b7}";
const MARK_TAB: &str = "\u{2192}";
const MARK_NEWLINE: &str = "\u{21b5}";
const MARK_CR: &str = "\u{2190}";
const MARK_ESC: &str = "[ESC]";

fn ansi_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // CSI sequences plus OSC sequences
        Regex::new(r"\x1b\[[0-9;]*[a-zA-Z]|\x1b\][^\x1b]*\x1b\\")
            .unwrap_or_else(|_| Regex::new(r"\x1b").unwrap())
    })
}

/// Replace ANSI escape sequences with a visible `[ESC]` marker.
pub fn strip_ansi(s: &str) -> String {
    ansi_pattern().replace_all(s, MARK_ESC).into_owned()
}

/// Visible length of a string, excluding ANSI escape sequences.
pub fn visible_len(s: &str) -> usize {
    ansi_pattern().replace_all(s, "").chars().count()
}

/// Replace whitespace with visible markers. `\r\n` is treated as a unit so
/// the marker order stays stable.
pub fn make_whitespace_visible(s: &str) -> String {
    mark_whitespace(&strip_ansi(s))
}

/// Single pass over the characters. Sequential `replace` calls would re-match
/// the real newline kept after the `↵` marker and double it.
fn mark_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 2);
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' if chars.peek() == Some(&'\n') => {
                chars.next();
                out.push_str(MARK_CR);
                out.push_str(MARK_NEWLINE);
                out.push('\n');
            }
            '\r' => out.push_str(MARK_CR),
            '\n' => {
                out.push_str(MARK_NEWLINE);
                out.push('\n');
            }
            ' ' => out.push_str(MARK_SPACE),
            '\t' => out.push_str(MARK_TAB),
            other => out.push(other),
        }
    }
    out
}

/// Reverse `make_whitespace_visible` so content can be value-highlighted on
/// its real characters.
pub fn undo_whitespace_visible(s: &str) -> String {
    let s = s.replace("\u{2190}\u{21b5}\n", "\r\n");
    let s = s.replace("\u{21b5}\n", "\n");
    let s = s.replace(MARK_CR, "\r");
    let s = s.replace(MARK_SPACE, " ");
    let s = s.replace(MARK_TAB, "\t");
    s.replace(MARK_ESC, "")
}

/// Re-apply whitespace markers after highlighting.
pub fn reapply_whitespace_visible(s: &str) -> String {
    mark_whitespace(s)
}

/// Colorize content that looks like a JSON value. Keys and strings get
/// distinct colors, numbers and keywords another. Non-JSON content and
/// disabled styles pass through unchanged. When `show_whitespace` is set,
/// markers are undone before highlighting and re-applied afterwards.
pub fn highlight_value(content: &str, style: Style, show_whitespace: bool) -> String {
    if !style.enabled() {
        return content.to_string();
    }
    let plain = if show_whitespace {
        undo_whitespace_visible(content)
    } else {
        content.to_string()
    };
    let trimmed = plain.trim_start();
    if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
        return content.to_string();
    }

    let highlighted = highlight_json(&plain);
    if show_whitespace {
        reapply_whitespace_visible(&highlighted)
    } else {
        highlighted
    }
}

/// A small single-pass JSON colorizer: strings followed by `:` are keys
/// (cyan), other strings green, numbers and `true`/`false`/`null` yellow.
fn highlight_json(content: &str) -> String {
    let mut out = String::with_capacity(content.len() * 2);
    let bytes = content.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                let start = i;
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
                i = (i + 1).min(bytes.len());
                let literal = &content[start..i];
                let mut j = i;
                while j < bytes.len() && (bytes[j] == b' ' || bytes[j] == b'\t') {
                    j += 1;
                }
                if j < bytes.len() && bytes[j] == b':' {
                    out.push_str(&literal.cyan().to_string());
                } else {
                    out.push_str(&literal.green().to_string());
                }
            }
            b'0'..=b'9' | b'-' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_digit()
                        || matches!(bytes[i], b'.' | b'-' | b'+' | b'e' | b'E'))
                {
                    i += 1;
                }
                out.push_str(&content[start..i].yellow().to_string());
            }
            b't' | b'f' | b'n' => {
                let rest = &content[i..];
                let keyword = ["true", "false", "null"]
                    .iter()
                    .find(|k| rest.starts_with(**k));
                match keyword {
                    Some(k) => {
                        out.push_str(&k.yellow().to_string());
                        i += k.len();
                    }
                    None => {
                        let ch_len = rest.chars().next().map(char::len_utf8).unwrap_or(1);
                        out.push_str(&content[i..i + ch_len]);
                        i += ch_len;
                    }
                }
            }
            _ => {
                let ch_len = content[i..].chars().next().map(char::len_utf8).unwrap_or(1);
                out.push_str(&content[i..i + ch_len]);
                i += ch_len;
            }
        }
    }
    out
}

/// Wrap known format anomaly markers in bold red.
pub fn highlight_errors(s: &str, style: Style) -> String {
    if !style.enabled() {
        return s.to_string();
    }
    let mut out = s.to_string();
    for verb in ['s', 'd', 'v', 'f', 'q', 't', 'x', 'b', 'e', 'g', 'c'] {
        let pattern = format!("%!{}(MISSING)", verb);
        if out.contains(&pattern) {
            let painted = pattern.red().bold().to_string();
            out = out.replace(&pattern, &painted);
        }
    }
    if out.contains("%!(BADWIDTH)") {
        let painted = "%!(BADWIDTH)".red().bold().to_string();
        out = out.replace("%!(BADWIDTH)", &painted);
    }
    out
}
