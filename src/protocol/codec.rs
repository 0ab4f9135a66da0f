//! Field escaping and request framing.
//!
//! Bytes in `0x00..=0x0f` cannot travel raw: each one is sent as `0x01` followed
//! by the byte with `0x40` set. A lone NUL token stands for an absent value.
use super::{LINE_END, TOKEN_SEPARATOR};

pub const NULL: u8 = 0x00;
const ESCAPE: u8 = 0x01;
const ESCAPE_SHIFT: u8 = 0x40;
const ESCAPE_MAX: u8 = 0x0f;

/// A column value as sent to the server; `None` is SQL `NULL`.
pub type Value<'a> = Option<&'a [u8]>;

pub fn encode(value: Value<'_>) -> Vec<u8> {
    let Some(value) = value else {
        return vec![NULL];
    };

    let mut out = Vec::with_capacity(value.len());
    for &byte in value {
        if byte <= ESCAPE_MAX {
            out.push(ESCAPE);
            out.push(byte | ESCAPE_SHIFT);
        } else {
            out.push(byte);
        }
    }
    out
}

pub fn decode(token: &[u8]) -> Option<Vec<u8>> {
    if token == [NULL] {
        return None;
    }

    let mut out = Vec::with_capacity(token.len());
    let mut bytes = token.iter().copied();
    while let Some(byte) = bytes.next() {
        if byte != ESCAPE {
            out.push(byte);
            continue;
        }

        match bytes.next() {
            Some(next) if (ESCAPE_SHIFT..=(ESCAPE_SHIFT | ESCAPE_MAX)).contains(&next) => {
                out.push(next ^ ESCAPE_SHIFT)
            }
            // Not a valid escape; keep both bytes as they came.
            Some(next) => {
                out.push(ESCAPE);
                out.push(next);
            }
            None => out.push(ESCAPE),
        }
    }
    Some(out)
}

/// Joins already encoded tokens into one request line.
pub fn build_frame<T: AsRef<[u8]>>(tokens: &[T]) -> Vec<u8> {
    let len = tokens.iter().map(|t| t.as_ref().len() + 1).sum::<usize>();
    let mut frame = Vec::with_capacity(len + 1);
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            frame.push(TOKEN_SEPARATOR);
        }
        frame.extend_from_slice(token.as_ref());
    }
    frame.push(LINE_END);
    frame
}
