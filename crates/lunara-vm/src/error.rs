//! Runtime error type.

use lunara_core::string::StringInterner;
use lunara_core::value::TValue;
use std::fmt;

/// A runtime failure. Propagates up the frame chain until a protected-call
/// boundary or the host.
#[derive(Clone, Debug)]
pub enum LuaError {
    /// Message raised by the VM itself, already positioned (`chunk:line:`).
    Runtime(String),
    /// Too many nested calls.
    StackOverflow,
    /// `error()` with an arbitrary Lua value.
    Value(TValue),
}

impl LuaError {
    /// The error as a Lua value, for pcall results.
    pub fn to_tvalue(&self, strings: &mut StringInterner) -> TValue {
        match self {
            LuaError::Runtime(msg) => TValue::Str(strings.intern_or_create(msg.as_bytes())),
            LuaError::StackOverflow => TValue::Str(strings.intern(b"stack overflow")),
            LuaError::Value(v) => *v,
        }
    }
}

impl fmt::Display for LuaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuaError::Runtime(msg) => write!(f, "{msg}"),
            LuaError::StackOverflow => write!(f, "stack overflow"),
            LuaError::Value(v) => write!(f, "{v}"),
        }
    }
}

impl std::error::Error for LuaError {}
