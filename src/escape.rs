//! Byte-string literal escaping.
//!
//! The generator embeds each asset's (compressed) payload as a Rust
//! byte-string literal inside the generated source unit. This module turns
//! an arbitrary byte stream into the *body* of such a literal — the text
//! between `b"` and `"` — with the guarantee that the compiled literal
//! reproduces the original bytes exactly.
//!
//! ## Escaping Rules
//!
//! Input is decoded incrementally as UTF-8:
//!
//! - A byte that is not part of any valid UTF-8 sequence becomes a single
//!   `\xNN` escape; decoding resumes at the next byte.
//! - Backslash and double quote are escaped numerically (`\x5c`, `\x22`);
//!   single quote passes through unescaped.
//! - NUL becomes `\x00`; newline, carriage return, and tab use their named
//!   escapes; other ASCII control characters become `\xNN`.
//! - Printable ASCII passes through as-is.
//! - Non-ASCII characters are emitted as one `\xNN` per UTF-8 byte, since
//!   byte-string literals admit only ASCII source characters.
//!
//! The output therefore contains only printable ASCII, never a raw quote
//! or backslash, and is safe to splice between `b"` and `"` verbatim.

/// Escape `bytes` into the body of a Rust byte-string literal.
///
/// Round-trip contract: compiling `b"<output>"` yields exactly `bytes`,
/// including embedded NULs, quotes, backslashes, and invalid UTF-8.
pub fn escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + bytes.len() / 4);
    for chunk in bytes.utf8_chunks() {
        for ch in chunk.valid().chars() {
            push_char(&mut out, ch);
        }
        for &b in chunk.invalid() {
            push_hex(&mut out, b);
        }
    }
    out
}

fn push_char(out: &mut String, ch: char) {
    match ch {
        '\\' => out.push_str("\\x5c"),
        '"' => out.push_str("\\x22"),
        '\0' => out.push_str("\\x00"),
        '\n' => out.push_str("\\n"),
        '\r' => out.push_str("\\r"),
        '\t' => out.push_str("\\t"),
        c if c.is_ascii_control() => push_hex(out, c as u8),
        c if c.is_ascii() => out.push(c),
        c => {
            let mut buf = [0u8; 4];
            for &b in c.encode_utf8(&mut buf).as_bytes() {
                push_hex(out, b);
            }
        }
    }
}

fn push_hex(out: &mut String, byte: u8) {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    out.push_str("\\x");
    out.push(HEX[(byte >> 4) as usize] as char);
    out.push(HEX[(byte & 0x0f) as usize] as char);
}
