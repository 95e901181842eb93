//! Number/string conversions with Lua 5.3 semantics.

use lunara_core::string::{StringId, StringInterner};
use lunara_core::value::TValue;

/// Numeric view of a value: numbers directly, numeric strings parsed.
pub fn to_number(v: TValue, strings: &StringInterner) -> Option<f64> {
    match v {
        TValue::Integer(i) => Some(i as f64),
        TValue::Float(f) => Some(f),
        TValue::Str(id) => {
            let s = std::str::from_utf8(strings.get_bytes(id)).ok()?;
            match parse_number(s)? {
                TValue::Integer(i) => Some(i as f64),
                TValue::Float(f) => Some(f),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Integer view: integers directly, integral floats folded, numeric strings
/// parsed and folded.
pub fn to_integer(v: TValue, strings: &StringInterner) -> Option<i64> {
    match v {
        TValue::Integer(i) => Some(i),
        TValue::Float(f) => float_to_integer(f),
        TValue::Str(id) => {
            let s = std::str::from_utf8(strings.get_bytes(id)).ok()?;
            match parse_number(s)? {
                TValue::Integer(i) => Some(i),
                TValue::Float(f) => float_to_integer(f),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Exact float-to-integer conversion; None when the float has a fractional
/// part or is out of i64 range.
pub fn float_to_integer(f: f64) -> Option<i64> {
    if !f.is_finite() || f.floor() != f {
        return None;
    }
    // 2^63 is exact as f64; i64::MAX is not. Accept [-2^63, 2^63).
    const LOWER: f64 = i64::MIN as f64;
    const UPPER: f64 = -(i64::MIN as f64);
    if (LOWER..UPPER).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

/// Parse a numeral the way the language does: optional sign, decimal
/// integer/float, or hex integer (wrapping) / hex float. `inf`/`nan`
/// spellings are rejected.
pub fn parse_number(s: &str) -> Option<TValue> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }

    let (neg, body) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };

    if body.starts_with("0x") || body.starts_with("0X") {
        let hex = &body[2..];
        if hex.is_empty() {
            return None;
        }
        if hex.contains(['.', 'p', 'P']) {
            let f = parse_hex_float(hex)?;
            return Some(TValue::Float(if neg { -f } else { f }));
        }
        let mut val: u64 = 0;
        for ch in hex.bytes() {
            let digit = (ch as char).to_digit(16)? as u64;
            val = val.wrapping_mul(16).wrapping_add(digit);
        }
        let i = val as i64;
        return Some(TValue::Integer(if neg { i.wrapping_neg() } else { i }));
    }

    // Rust's float parser accepts "inf"/"nan"; Lua's numeral grammar does not.
    let lower = body.to_ascii_lowercase();
    if lower.starts_with("inf") || lower.starts_with("nan") {
        return None;
    }

    if !body.contains(['.', 'e', 'E']) {
        if let Ok(i) = body.parse::<i64>() {
            return Some(TValue::Integer(if neg { i.wrapping_neg() } else { i }));
        }
    }
    let f = body.parse::<f64>().ok()?;
    Some(TValue::Float(if neg { -f } else { f }))
}

/// Parse the body of a hex float (after `0x`), e.g. `1.8p1`.
fn parse_hex_float(hex: &str) -> Option<f64> {
    let (mantissa, exp) = match hex.find(['p', 'P']) {
        Some(p) => (&hex[..p], hex[p + 1..].parse::<i32>().ok()?),
        None => (hex, 0),
    };
    let (int_part, frac_part) = match mantissa.find('.') {
        Some(dot) => (&mantissa[..dot], &mantissa[dot + 1..]),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let mut value = 0.0f64;
    for ch in int_part.chars() {
        value = value * 16.0 + ch.to_digit(16)? as f64;
    }
    let mut place = 1.0 / 16.0;
    for ch in frac_part.chars() {
        value += ch.to_digit(16)? as f64 * place;
        place /= 16.0;
    }
    Some(value * (2.0f64).powi(exp))
}

/// String form of a value for concatenation; None for non-coercible kinds.
pub fn to_string_for_concat(v: TValue, strings: &mut StringInterner) -> Option<StringId> {
    match v {
        TValue::Str(id) => Some(id),
        TValue::Integer(i) => Some(strings.intern_or_create(i.to_string().as_bytes())),
        TValue::Float(f) => Some(strings.intern_or_create(format_float(f).as_bytes())),
        _ => None,
    }
}

/// Canonical float formatting: `%.14g` with a `.0` suffix when the result
/// reads as an integer (so `2^10` prints as `1024.0`).
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let s = format_g14(f);
    if s.bytes().all(|b| b.is_ascii_digit() || b == b'-') {
        format!("{s}.0")
    } else {
        s
    }
}

/// `%.14g`-equivalent formatting of a finite float.
fn format_g14(f: f64) -> String {
    if f == 0.0 {
        return if f.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let exp = f.abs().log10().floor() as i32;
    if (-4..14).contains(&exp) {
        let decimals = (13 - exp).max(0) as usize;
        let mut s = format!("{f:.decimals$}");
        if s.contains('.') {
            s.truncate(s.trim_end_matches('0').len());
            if s.ends_with('.') {
                s.pop();
            }
        }
        s
    } else {
        // Scientific, trimmed mantissa, two-digit signed exponent.
        let s = format!("{f:.13e}");
        let (mantissa, exp_str) = s.split_once('e').unwrap();
        let mut m = mantissa.trim_end_matches('0').to_string();
        if m.ends_with('.') {
            m.pop();
        }
        let exp_num: i32 = exp_str.parse().unwrap_or(0);
        let sign = if exp_num < 0 { '-' } else { '+' };
        format!("{m}e{sign}{:02}", exp_num.abs())
    }
}
