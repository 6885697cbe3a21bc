//! Reversible backslash escaping of arbitrary Unicode into printable ASCII.
//!
//! Printable ASCII passes through except `\`, which doubles. `\n`, `\r` and
//! `\t` use their short forms; every other character becomes `\xHH`, `\uHHHH`
//! or `\UHHHHHHHH` depending on its code point.

use std::fmt::Write as _;

use super::CodecError;

/// Escape `input` into printable ASCII.
pub fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ' '..='~' => out.push(c),
            c if (c as u32) < 0x100 => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c if (c as u32) < 0x1_0000 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => {
                let _ = write!(out, "\\U{:08x}", c as u32);
            }
        }
    }
    out
}

/// Reverse [`escape`].
///
/// # Errors
///
/// Returns [`CodecError::Escape`] for unknown escapes, truncated or invalid
/// hex digits, code points that are not Unicode scalar values, and raw
/// characters outside printable ASCII.
pub fn unescape(input: &str) -> Result<String, CodecError> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices();
    while let Some((pos, c)) = chars.next() {
        match c {
            '\\' => {
                let (_, kind) = chars.next().ok_or(CodecError::Escape { position: pos })?;
                let decoded = match kind {
                    '\\' => '\\',
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    'x' => hex_char(&mut chars, 2, pos)?,
                    'u' => hex_char(&mut chars, 4, pos)?,
                    'U' => hex_char(&mut chars, 8, pos)?,
                    _ => return Err(CodecError::Escape { position: pos }),
                };
                out.push(decoded);
            }
            ' '..='~' => out.push(c),
            _ => return Err(CodecError::Escape { position: pos }),
        }
    }
    Ok(out)
}

fn hex_char(
    chars: &mut std::str::CharIndices<'_>,
    digits: usize,
    position: usize,
) -> Result<char, CodecError> {
    let mut code: u32 = 0;
    for _ in 0..digits {
        let (_, c) = chars.next().ok_or(CodecError::Escape { position })?;
        let digit = c.to_digit(16).ok_or(CodecError::Escape { position })?;
        code = code * 16 + digit;
    }
    char::from_u32(code).ok_or(CodecError::Escape { position })
}
