//! Tagged Lua value representation.
//!
//! A `TValue` is a small `Copy` sum over the eight Lua 5.3 value kinds this
//! runtime supports. Heap-allocated kinds (strings, tables, closures) are
//! carried as typed indices into the interner or the object heap, so the
//! value itself stays two words wide.

use crate::heap::{GcIdx, LuaClosure};
use crate::string::StringId;
use crate::table::Table;
use std::fmt;

/// Index of a registered native (host) function.
///
/// Natives live in a registry owned by the VM, not in the core heap, because
/// their signature mentions VM state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NativeId(pub u32);

/// A Lua value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TValue {
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Str(StringId),
    Table(GcIdx<Table>),
    Closure(GcIdx<LuaClosure>),
    Native(NativeId),
}

impl TValue {
    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, TValue::Nil)
    }

    /// Lua falsy: only nil and false.
    #[inline]
    pub fn is_falsy(&self) -> bool {
        matches!(self, TValue::Nil | TValue::Boolean(false))
    }

    /// Lua truthy: everything else, including 0 and the empty string.
    #[inline]
    pub fn is_truthy(&self) -> bool {
        !self.is_falsy()
    }

    /// Returns true for integers and floats.
    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, TValue::Integer(_) | TValue::Float(_))
    }

    #[inline]
    pub fn is_string(&self) -> bool {
        matches!(self, TValue::Str(_))
    }

    #[inline]
    pub fn is_table(&self) -> bool {
        matches!(self, TValue::Table(_))
    }

    /// Returns true for both scripted closures and natives.
    #[inline]
    pub fn is_function(&self) -> bool {
        matches!(self, TValue::Closure(_) | TValue::Native(_))
    }

    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    #[inline]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            TValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    #[inline]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            TValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Numeric view: integers widen to f64, floats pass through.
    #[inline]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            TValue::Integer(i) => Some(*i as f64),
            TValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[inline]
    pub fn as_string_id(&self) -> Option<StringId> {
        match self {
            TValue::Str(id) => Some(*id),
            _ => None,
        }
    }

    #[inline]
    pub fn as_table_idx(&self) -> Option<GcIdx<Table>> {
        match self {
            TValue::Table(idx) => Some(*idx),
            _ => None,
        }
    }

    #[inline]
    pub fn as_closure_idx(&self) -> Option<GcIdx<LuaClosure>> {
        match self {
            TValue::Closure(idx) => Some(*idx),
            _ => None,
        }
    }

    #[inline]
    pub fn as_native_id(&self) -> Option<NativeId> {
        match self {
            TValue::Native(id) => Some(*id),
            _ => None,
        }
    }
}

impl Default for TValue {
    fn default() -> Self {
        TValue::Nil
    }
}

impl fmt::Display for TValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TValue::Nil => write!(f, "nil"),
            TValue::Boolean(b) => write!(f, "{b}"),
            TValue::Integer(i) => write!(f, "{i}"),
            TValue::Float(x) => write!(f, "{x}"),
            TValue::Str(id) => write!(f, "string(#{})", id.0),
            TValue::Table(idx) => write!(f, "table(#{})", idx.index()),
            TValue::Closure(idx) => write!(f, "function(#{})", idx.index()),
            TValue::Native(id) => write!(f, "function(native #{})", id.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_stays_small() {
        assert!(std::mem::size_of::<TValue>() <= 16);
    }

    #[test]
    fn nil_is_falsy() {
        assert!(TValue::Nil.is_falsy());
        assert!(!TValue::Nil.is_truthy());
    }

    #[test]
    fn false_is_falsy() {
        assert!(TValue::Boolean(false).is_falsy());
    }

    #[test]
    fn zero_is_truthy() {
        // In Lua, 0 and 0.0 are truthy.
        assert!(TValue::Integer(0).is_truthy());
        assert!(TValue::Float(0.0).is_truthy());
    }

    #[test]
    fn number_views() {
        assert_eq!(TValue::Integer(7).as_number(), Some(7.0));
        assert_eq!(TValue::Float(2.5).as_number(), Some(2.5));
        assert_eq!(TValue::Nil.as_number(), None);
        assert_eq!(TValue::Integer(7).as_float(), None);
    }

    #[test]
    fn raw_equality_distinguishes_int_and_float() {
        // Derived equality is representational; Lua `==` lives in the VM.
        assert_ne!(TValue::Integer(1), TValue::Float(1.0));
        assert_eq!(TValue::Integer(1), TValue::Integer(1));
    }

    #[test]
    fn nan_is_not_raw_equal_to_itself() {
        assert_ne!(TValue::Float(f64::NAN), TValue::Float(f64::NAN));
    }

    // Property tests with proptest
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_integers_always_truthy(i in proptest::num::i64::ANY) {
            prop_assert!(TValue::Integer(i).is_truthy());
        }

        #[test]
        fn prop_floats_always_truthy(f in proptest::num::f64::ANY) {
            prop_assert!(TValue::Float(f).is_truthy());
        }

        #[test]
        fn prop_integer_number_view_exact_below_2p53(i in -(1i64 << 53)..(1i64 << 53)) {
            prop_assert_eq!(TValue::Integer(i).as_number(), Some(i as f64));
        }
    }
}
