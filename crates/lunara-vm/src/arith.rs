//! Arithmetic and bitwise operations with Lua 5.3 semantics.
//!
//! Integer⊕integer stays integer except `/` and `^`, which always produce a
//! float. `//` and `%` use floor semantics; shifts are logical over the full
//! 64-bit pattern. Type mismatches report `NeedMetamethod` so the dispatch
//! loop can try `__add` and friends.

use crate::coerce;
use crate::error::LuaError;
use lunara_core::string::StringInterner;
use lunara_core::value::TValue;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
    Pow,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
}

/// Outcome of an arithmetic attempt.
pub enum ArithResult {
    Ok(TValue),
    /// Operands are not numeric; the caller should try a metamethod.
    NeedMetamethod,
    /// A genuine arithmetic error (division by zero, no integer
    /// representation).
    Error(LuaError),
}

/// Binary arithmetic dispatch.
pub fn arith(op: ArithOp, a: TValue, b: TValue, strings: &StringInterner) -> ArithResult {
    match op {
        ArithOp::BAnd | ArithOp::BOr | ArithOp::BXor | ArithOp::Shl | ArithOp::Shr => {
            return bitwise(op, a, b, strings)
        }
        _ => {}
    }

    // Integer fast path; `/` and `^` always take the float path.
    if !matches!(op, ArithOp::Div | ArithOp::Pow) {
        if let (TValue::Integer(ia), TValue::Integer(ib)) = (a, b) {
            return int_arith(op, ia, ib);
        }
        // Strings that read as integers keep integer semantics.
        if a.is_string() || b.is_string() {
            let ia = coerce::to_integer(a, strings);
            let ib = coerce::to_integer(b, strings);
            if let (Some(ia), Some(ib)) = (ia, ib) {
                return int_arith(op, ia, ib);
            }
        }
    }

    match (coerce::to_number(a, strings), coerce::to_number(b, strings)) {
        (Some(fa), Some(fb)) => ArithResult::Ok(TValue::Float(float_arith(op, fa, fb))),
        _ => ArithResult::NeedMetamethod,
    }
}

fn int_arith(op: ArithOp, a: i64, b: i64) -> ArithResult {
    let v = match op {
        ArithOp::Add => a.wrapping_add(b),
        ArithOp::Sub => a.wrapping_sub(b),
        ArithOp::Mul => a.wrapping_mul(b),
        ArithOp::IDiv => {
            if b == 0 {
                return ArithResult::Error(LuaError::Runtime(
                    "attempt to perform 'n//0'".to_string(),
                ));
            }
            floor_div(a, b)
        }
        ArithOp::Mod => {
            if b == 0 {
                return ArithResult::Error(LuaError::Runtime(
                    "attempt to perform 'n%0'".to_string(),
                ));
            }
            floor_mod(a, b)
        }
        ArithOp::BAnd | ArithOp::BOr | ArithOp::BXor | ArithOp::Shl | ArithOp::Shr
        | ArithOp::Div | ArithOp::Pow => unreachable!("handled elsewhere"),
    };
    ArithResult::Ok(TValue::Integer(v))
}

fn float_arith(op: ArithOp, a: f64, b: f64) -> f64 {
    match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => a / b,
        ArithOp::Pow => a.powf(b),
        // Float floor-division and modulo by zero follow IEEE (inf/NaN).
        ArithOp::IDiv => (a / b).floor(),
        ArithOp::Mod => float_mod(a, b),
        _ => unreachable!(),
    }
}

fn bitwise(op: ArithOp, a: TValue, b: TValue, strings: &StringInterner) -> ArithResult {
    let ia = match bit_operand(a, strings) {
        Ok(Some(i)) => i,
        Ok(None) => return ArithResult::NeedMetamethod,
        Err(e) => return ArithResult::Error(e),
    };
    let ib = match bit_operand(b, strings) {
        Ok(Some(i)) => i,
        Ok(None) => return ArithResult::NeedMetamethod,
        Err(e) => return ArithResult::Error(e),
    };
    let v = match op {
        ArithOp::BAnd => ia & ib,
        ArithOp::BOr => ia | ib,
        ArithOp::BXor => ia ^ ib,
        ArithOp::Shl => shift_left(ia, ib),
        ArithOp::Shr => shift_left(ia, ib.wrapping_neg()),
        _ => unreachable!(),
    };
    ArithResult::Ok(TValue::Integer(v))
}

/// Integer view of a bitwise operand. A float with a fractional part is an
/// error, not a metamethod case.
fn bit_operand(v: TValue, strings: &StringInterner) -> Result<Option<i64>, LuaError> {
    match v {
        TValue::Integer(i) => Ok(Some(i)),
        TValue::Float(f) => match coerce::float_to_integer(f) {
            Some(i) => Ok(Some(i)),
            None => Err(LuaError::Runtime(
                "number has no integer representation".to_string(),
            )),
        },
        TValue::Str(_) => Ok(coerce::to_integer(v, strings)),
        _ => Ok(None),
    }
}

/// Floor division, rounding toward negative infinity.
pub fn floor_div(a: i64, b: i64) -> i64 {
    let q = a.wrapping_div(b);
    let r = a.wrapping_rem(b);
    if r != 0 && (r ^ b) < 0 {
        q - 1
    } else {
        q
    }
}

/// Modulo with the sign of the divisor: a - floor(a/b)*b.
pub fn floor_mod(a: i64, b: i64) -> i64 {
    let r = a.wrapping_rem(b);
    if r != 0 && (r ^ b) < 0 {
        r.wrapping_add(b)
    } else {
        r
    }
}

/// Float modulo matching floor semantics.
pub fn float_mod(a: f64, b: f64) -> f64 {
    let r = a % b;
    if r != 0.0 && (r > 0.0) != (b > 0.0) {
        r + b
    } else {
        r
    }
}

/// Logical left shift; negative counts shift right, counts beyond 63 give 0.
pub fn shift_left(a: i64, n: i64) -> i64 {
    if n <= -64 || n >= 64 {
        0
    } else if n >= 0 {
        ((a as u64) << n) as i64
    } else {
        ((a as u64) >> -n) as i64
    }
}

/// Unary minus.
pub fn negate(v: TValue, strings: &StringInterner) -> ArithResult {
    match v {
        TValue::Integer(i) => ArithResult::Ok(TValue::Integer(i.wrapping_neg())),
        TValue::Float(f) => ArithResult::Ok(TValue::Float(-f)),
        TValue::Str(_) => match coerce::to_number(v, strings) {
            Some(f) => ArithResult::Ok(TValue::Float(-f)),
            None => ArithResult::NeedMetamethod,
        },
        _ => ArithResult::NeedMetamethod,
    }
}

/// Bitwise complement.
pub fn complement(v: TValue, strings: &StringInterner) -> ArithResult {
    match bit_operand(v, strings) {
        Ok(Some(i)) => ArithResult::Ok(TValue::Integer(!i)),
        Ok(None) => ArithResult::NeedMetamethod,
        Err(e) => ArithResult::Error(e),
    }
}
