//! Numeric tokens.
//!
//! A number token matches `[+-]?digits[.digits]([eE][+-]?digits)?`. Anything
//! else is text, even if Rust's own float parser would accept it (`inf`,
//! `1_000`, `.5`).

/// Significant digits kept when writing a non-integral number.
const SIGNIFICANT_DIGITS: i32 = 8;

/// Whether `token` is a number in the data language.
#[must_use]
pub fn is_number(token: &str) -> bool {
    let bytes = token.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i = 1;
    }
    let digits = |i: &mut usize| {
        let start = *i;
        while bytes.get(*i).is_some_and(u8::is_ascii_digit) {
            *i = i.saturating_add(1);
        }
        *i > start
    };
    if !digits(&mut i) {
        return false;
    }
    if bytes.get(i) == Some(&b'.') {
        i = i.saturating_add(1);
        if !digits(&mut i) {
            return false;
        }
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        i = i.saturating_add(1);
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i = i.saturating_add(1);
        }
        if !digits(&mut i) {
            return false;
        }
    }
    i == bytes.len()
}

/// Parse a number token, or `None` if it is not one.
#[must_use]
pub fn parse_number(token: &str) -> Option<f64> {
    if !is_number(token) {
        return None;
    }
    token.parse::<f64>().ok()
}

/// Format a value the way data files store it.
///
/// Integral values print without a decimal point. Other values keep up to
/// eight significant digits with trailing zeroes removed.
#[must_use]
#[allow(clippy::arithmetic_side_effects)]
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "0".to_owned();
    }
    if value.fract() == 0.0 {
        let text = format!("{value:.0}");
        return if text == "-0" { "0".to_owned() } else { text };
    }

    let mut magnitude = value.abs();
    let mut exponent: i32 = 0;
    while magnitude >= 10.0 {
        magnitude /= 10.0;
        exponent = exponent.saturating_add(1);
    }
    while magnitude < 1.0 {
        magnitude *= 10.0;
        exponent = exponent.saturating_sub(1);
    }
    let decimals = SIGNIFICANT_DIGITS
        .saturating_sub(1)
        .saturating_sub(exponent)
        .clamp(0, 20);
    let decimals = usize::try_from(decimals).unwrap_or(0);

    let mut text = format!("{value:.decimals$}");
    if text.contains('.') {
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.pop();
        }
    }
    if text == "-0" {
        text = "0".to_owned();
    }
    text
}
