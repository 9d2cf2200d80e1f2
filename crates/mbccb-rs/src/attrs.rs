// src/attrs.rs

//! Literal parsing for attribute values.

use alloc::string::String;

/// Parses an integer literal.
///
/// Accepts an optional sign, a `0x`/`0o`/`0b` radix prefix (any case) and
/// `_` separators between digits. Decimal literals may not carry leading
/// zeros unless the value is zero. Surrounding whitespace is ignored.
pub fn parse_int(text: &str) -> Option<i128> {
    let s = text.trim();
    let (negative, body) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let (radix, digits) = match body.get(..2) {
        Some(p) if p.eq_ignore_ascii_case("0x") => (16, &body[2..]),
        Some(p) if p.eq_ignore_ascii_case("0o") => (8, &body[2..]),
        Some(p) if p.eq_ignore_ascii_case("0b") => (2, &body[2..]),
        _ => (10, body),
    };

    // A single separator may follow a radix prefix, otherwise only between digits.
    let digits = match radix {
        10 => digits,
        _ => digits.strip_prefix('_').unwrap_or(digits),
    };
    if digits.is_empty()
        || digits.starts_with('_')
        || digits.ends_with('_')
        || digits.contains("__")
    {
        return None;
    }
    if radix == 10 && digits.starts_with('0') && digits.bytes().any(|b| b != b'0' && b != b'_') {
        return None;
    }

    let mut value: i128 = 0;
    for c in digits.chars().filter(|&c| c != '_') {
        let digit = c.to_digit(radix)?;
        value = value
            .checked_mul(i128::from(radix))?
            .checked_add(i128::from(digit))?;
    }
    Some(if negative { -value } else { value })
}

/// Parses a floating point literal. `_` is accepted between digits.
pub fn parse_float(text: &str) -> Option<f64> {
    let s = text.trim();
    if !s.contains('_') {
        return s.parse().ok();
    }
    let bytes = s.as_bytes();
    let mut cleaned = String::with_capacity(s.len());
    for (i, c) in s.char_indices() {
        if c == '_' {
            let before = i.checked_sub(1).map(|j| bytes[j]);
            let after = bytes.get(i + 1).copied();
            match (before, after) {
                (Some(b), Some(a)) if b.is_ascii_digit() && a.is_ascii_digit() => continue,
                _ => return None,
            }
        }
        cleaned.push(c);
    }
    cleaned.parse().ok()
}

/// Parses a boolean-like token: `T`/`TRUE`/`1` or `F`/`FALSE`/`0`, any case.
pub fn parse_bool(text: &str) -> Option<bool> {
    let s = text.trim();
    if ["T", "TRUE", "1"].iter().any(|t| s.eq_ignore_ascii_case(t)) {
        Some(true)
    } else if ["F", "FALSE", "0"].iter().any(|t| s.eq_ignore_ascii_case(t)) {
        Some(false)
    } else {
        None
    }
}

/// Device, command and pin names: a lowercase letter followed by lowercase
/// letters, digits, `-` or `.`.
pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
}
