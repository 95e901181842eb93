//! Equality and ordering with Lua 5.3 semantics.

use lunara_core::string::StringInterner;
use lunara_core::value::TValue;

/// Raw equality: numbers compare across int/float exactly, strings by
/// content, heap objects by identity. No metamethods here; `__eq` is the
/// dispatch loop's business.
pub fn raw_eq(a: TValue, b: TValue, strings: &StringInterner) -> bool {
    match (a, b) {
        (TValue::Nil, TValue::Nil) => true,
        (TValue::Boolean(x), TValue::Boolean(y)) => x == y,
        (TValue::Integer(x), TValue::Integer(y)) => x == y,
        (TValue::Float(x), TValue::Float(y)) => x == y, // NaN != NaN
        (TValue::Integer(i), TValue::Float(f)) | (TValue::Float(f), TValue::Integer(i)) => {
            int_eq_float(i, f)
        }
        (TValue::Str(x), TValue::Str(y)) => {
            x == y || strings.get_bytes(x) == strings.get_bytes(y)
        }
        (TValue::Table(x), TValue::Table(y)) => x == y,
        (TValue::Closure(x), TValue::Closure(y)) => x == y,
        (TValue::Native(x), TValue::Native(y)) => x == y,
        _ => false,
    }
}

/// An integer equals a float iff the float is integral and holds the same
/// value; the comparison is exact, without rounding the integer.
fn int_eq_float(i: i64, f: f64) -> bool {
    if f.floor() != f || !f.is_finite() {
        return false;
    }
    const UPPER: f64 = -(i64::MIN as f64); // 2^63, exact
    if !((i64::MIN as f64)..UPPER).contains(&f) {
        return false;
    }
    f as i64 == i
}

/// Ordering attempt; None when the pair is not orderable without a
/// metamethod.
pub fn try_lt(a: TValue, b: TValue, strings: &StringInterner) -> Option<bool> {
    match (a, b) {
        (TValue::Integer(x), TValue::Integer(y)) => Some(x < y),
        (TValue::Float(x), TValue::Float(y)) => Some(x < y),
        (TValue::Integer(x), TValue::Float(y)) => Some((x as f64) < y),
        (TValue::Float(x), TValue::Integer(y)) => Some(x < (y as f64)),
        (TValue::Str(x), TValue::Str(y)) => Some(strings.get_bytes(x) < strings.get_bytes(y)),
        _ => None,
    }
}

/// See [`try_lt`].
pub fn try_le(a: TValue, b: TValue, strings: &StringInterner) -> Option<bool> {
    match (a, b) {
        (TValue::Integer(x), TValue::Integer(y)) => Some(x <= y),
        (TValue::Float(x), TValue::Float(y)) => Some(x <= y),
        (TValue::Integer(x), TValue::Float(y)) => Some((x as f64) <= y),
        (TValue::Float(x), TValue::Integer(y)) => Some(x <= (y as f64)),
        (TValue::Str(x), TValue::Str(y)) => Some(strings.get_bytes(x) <= strings.get_bytes(y)),
        _ => None,
    }
}
