//! Hybrid array/hash Lua table.
//!
//! Keys 1..=n live in a dense array part; everything else goes into an
//! insertion-ordered hash part. Contiguous integer keys migrate from hash to
//! array when the gap in front of them fills, so the border used by `#t` can
//! be computed from the array part alone.

use crate::heap::GcIdx;
use crate::string::StringId;
use crate::value::TValue;
use indexmap::IndexMap;

/// A normalized key for the hash part.
///
/// Integral floats are folded onto their integer form before this type is
/// built, so `t[2]` and `t[2.0]` address the same slot. Heap objects key by
/// arena index (identity).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TableKey {
    Integer(i64),
    Str(StringId),
    /// Non-integral float, keyed by bit pattern.
    Float(u64),
    Boolean(bool),
    Table(u32),
    Closure(u32),
    Native(u32),
}

/// A Lua table.
pub struct Table {
    array: Vec<TValue>,
    hash: IndexMap<TableKey, TValue>,
    pub metatable: Option<GcIdx<Table>>,
}

impl Table {
    pub fn new(array_hint: usize, hash_hint: usize) -> Self {
        Table {
            array: Vec::with_capacity(array_hint),
            hash: IndexMap::with_capacity(hash_hint),
            metatable: None,
        }
    }

    /// Raw get (no metamethods).
    pub fn get(&self, key: TValue) -> TValue {
        if let Some(i) = normalize_int_key(key) {
            return self.geti(i);
        }
        match key_of(key) {
            Some(k) => self.hash.get(&k).copied().unwrap_or(TValue::Nil),
            None => TValue::Nil,
        }
    }

    /// Raw set (no metamethods). Rejects nil and NaN keys.
    pub fn set(&mut self, key: TValue, value: TValue) -> Result<(), &'static str> {
        if key.is_nil() {
            return Err("table index is nil");
        }
        if let TValue::Float(f) = key {
            if f.is_nan() {
                return Err("table index is NaN");
            }
        }
        if let Some(i) = normalize_int_key(key) {
            self.seti(i, value);
            return Ok(());
        }
        let k = key_of(key).expect("non-nil, non-NaN key must normalize");
        self.hash_set(k, value);
        Ok(())
    }

    /// Raw get with an integer key.
    pub fn geti(&self, key: i64) -> TValue {
        if key >= 1 && (key as u64) <= self.array.len() as u64 {
            self.array[(key - 1) as usize]
        } else {
            self.hash
                .get(&TableKey::Integer(key))
                .copied()
                .unwrap_or(TValue::Nil)
        }
    }

    /// Raw set with an integer key.
    pub fn seti(&mut self, key: i64, value: TValue) {
        if key >= 1 {
            let idx = (key - 1) as usize;
            if idx < self.array.len() {
                self.array[idx] = value;
                if value.is_nil() {
                    self.shrink_array();
                }
                return;
            }
            if idx == self.array.len() {
                if value.is_nil() {
                    return;
                }
                self.array.push(value);
                self.migrate_from_hash();
                return;
            }
        }
        self.hash_set(TableKey::Integer(key), value);
    }

    /// Raw get with a string key.
    pub fn get_str(&self, key: StringId) -> TValue {
        self.hash
            .get(&TableKey::Str(key))
            .copied()
            .unwrap_or(TValue::Nil)
    }

    /// Raw set with a string key.
    pub fn set_str(&mut self, key: StringId, value: TValue) {
        self.hash_set(TableKey::Str(key), value);
    }

    /// A border: some n with `t[n] ~= nil` and `t[n+1] == nil`.
    pub fn border(&self) -> i64 {
        match self.array.last() {
            None => 0,
            Some(v) if !v.is_nil() => self.array.len() as i64,
            Some(_) => {
                // Trailing nils in the array part: binary search for a border.
                let mut lo = 0usize;
                let mut hi = self.array.len();
                while lo < hi {
                    let mid = (lo + hi) / 2;
                    if self.array[mid].is_nil() {
                        hi = mid;
                    } else {
                        lo = mid + 1;
                    }
                }
                lo as i64
            }
        }
    }

    /// Step the iteration cursor: nil starts, the last key ends with None.
    /// Err means the key was never in the table.
    #[allow(clippy::result_unit_err)]
    pub fn next(&self, key: TValue) -> Result<Option<(TValue, TValue)>, ()> {
        if key.is_nil() {
            return Ok(self.first_entry());
        }
        // Array position: continue from there.
        if let Some(i) = normalize_int_key(key) {
            if i >= 1 && (i as u64) <= self.array.len() as u64 {
                for j in (i as usize)..self.array.len() {
                    if !self.array[j].is_nil() {
                        return Ok(Some((TValue::Integer((j + 1) as i64), self.array[j])));
                    }
                }
                return Ok(self.first_hash_entry());
            }
        }
        // Hash position: scan forward from the key, skipping tombstones.
        let k = match key_of(key) {
            Some(k) => k,
            None => return Err(()),
        };
        match self.hash.get_index_of(&k) {
            None => Err(()),
            Some(pos) => {
                for (hk, hv) in self.hash.iter().skip(pos + 1) {
                    if !hv.is_nil() {
                        return Ok(Some((self.key_to_value(*hk), *hv)));
                    }
                }
                Ok(None)
            }
        }
    }

    pub fn array_len(&self) -> usize {
        self.array.len()
    }

    pub fn hash_len(&self) -> usize {
        self.hash.len()
    }

    fn first_entry(&self) -> Option<(TValue, TValue)> {
        for (i, v) in self.array.iter().enumerate() {
            if !v.is_nil() {
                return Some((TValue::Integer((i + 1) as i64), *v));
            }
        }
        self.first_hash_entry()
    }

    fn first_hash_entry(&self) -> Option<(TValue, TValue)> {
        for (k, v) in &self.hash {
            if !v.is_nil() {
                return Some((self.key_to_value(*k), *v));
            }
        }
        None
    }

    /// Deleting a key that exists leaves a nil tombstone so an in-progress
    /// `next` can still locate its cursor; keys never present are not added.
    fn hash_set(&mut self, key: TableKey, value: TValue) {
        if value.is_nil() {
            if self.hash.contains_key(&key) {
                self.hash.insert(key, TValue::Nil);
            }
        } else {
            self.hash.insert(key, value);
        }
    }

    /// Pull now-contiguous integer keys out of the hash part.
    fn migrate_from_hash(&mut self) {
        loop {
            let next_key = TableKey::Integer(self.array.len() as i64 + 1);
            match self.hash.shift_remove(&next_key) {
                Some(v) if !v.is_nil() => self.array.push(v),
                _ => break,
            }
        }
    }

    fn shrink_array(&mut self) {
        while self.array.last().is_some_and(|v| v.is_nil()) {
            self.array.pop();
        }
    }

    fn key_to_value(&self, k: TableKey) -> TValue {
        match k {
            TableKey::Integer(i) => TValue::Integer(i),
            TableKey::Str(id) => TValue::Str(id),
            TableKey::Float(bits) => TValue::Float(f64::from_bits(bits)),
            TableKey::Boolean(b) => TValue::Boolean(b),
            TableKey::Table(i) => TValue::Table(GcIdx::new(i)),
            TableKey::Closure(i) => TValue::Closure(GcIdx::new(i)),
            TableKey::Native(i) => TValue::Native(crate::value::NativeId(i)),
        }
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "table(array={}, hash={})",
            self.array.len(),
            self.hash.len()
        )
    }
}

/// Integer view of a key: integers directly, integral floats folded.
fn normalize_int_key(key: TValue) -> Option<i64> {
    match key {
        TValue::Integer(i) => Some(i),
        TValue::Float(f) => {
            if f.floor() == f && f >= -(2f64.powi(63)) && f < 2f64.powi(63) {
                Some(f as i64)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Normalize a value into a hash key. None for nil and NaN.
fn key_of(key: TValue) -> Option<TableKey> {
    match key {
        TValue::Nil => None,
        TValue::Boolean(b) => Some(TableKey::Boolean(b)),
        TValue::Integer(i) => Some(TableKey::Integer(i)),
        TValue::Float(f) => {
            if f.is_nan() {
                None
            } else if let Some(i) = normalize_int_key(key) {
                Some(TableKey::Integer(i))
            } else {
                Some(TableKey::Float(f.to_bits()))
            }
        }
        TValue::Str(id) => Some(TableKey::Str(id)),
        TValue::Table(idx) => Some(TableKey::Table(idx.index())),
        TValue::Closure(idx) => Some(TableKey::Closure(idx.index())),
        TValue::Native(id) => Some(TableKey::Native(id.0)),
    }
}
