//! Host-facing stack API.
//!
//! Indices are relative to the current frame: positive from its base
//! (register 1 is the frame's first slot — for a native function, its first
//! argument), negative from the top. Pseudo-indices are not supported:
//! native functions carry no upvalues in this value model.

use crate::binary_chunk::{self, UndumpError};
use crate::dispatch;
use crate::error::LuaError;
use crate::vm::{NativeFn, Vm};
use lunara_compiler::error::CompileError;
use lunara_core::object::{self, type_code, type_name};
use lunara_core::value::TValue;
use crate::coerce;

/// Status codes returned by `pcall`.
pub const LUA_OK: i32 = 0;
pub const LUA_ERRRUN: i32 = 2;

/// A chunk that failed to load (either codec).
#[derive(Debug)]
pub enum LoadError {
    Compile(CompileError),
    Chunk(UndumpError),
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Compile(e) => write!(f, "{e}"),
            LoadError::Chunk(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for LoadError {}

impl Vm {
    fn frame_base(&self) -> usize {
        self.call_stack.last().map(|ci| ci.base).unwrap_or(0)
    }

    /// Resolve an API index to a stack slot.
    pub fn abs_index(&self, idx: i32) -> usize {
        let base = self.frame_base();
        if idx > 0 {
            base + idx as usize - 1
        } else {
            assert!(idx < 0, "API index 0 is invalid");
            assert!((-idx as usize) <= self.stack_top - base, "index out of range");
            self.stack_top - (-idx as usize)
        }
    }

    /// Number of values in the current frame.
    pub fn get_top(&self) -> usize {
        self.stack_top - self.frame_base()
    }

    /// Grow or shrink the frame to exactly `n` values (new slots are nil).
    pub fn set_top(&mut self, n: usize) {
        let base = self.frame_base();
        let new_top = base + n;
        self.ensure_stack(new_top, 1);
        if new_top > self.stack_top {
            for slot in self.stack_top..new_top {
                self.stack[slot] = TValue::Nil;
            }
        }
        self.stack_top = new_top;
    }

    pub fn value_at(&self, idx: i32) -> TValue {
        self.stack[self.abs_index(idx)]
    }

    pub fn replace_at(&mut self, idx: i32, v: TValue) {
        let slot = self.abs_index(idx);
        self.stack[slot] = v;
    }

    // ---- Pushing ----

    pub fn push(&mut self, v: TValue) {
        self.ensure_stack(self.stack_top, 1);
        self.stack[self.stack_top] = v;
        self.stack_top += 1;
    }

    pub fn push_nil(&mut self) {
        self.push(TValue::Nil);
    }

    pub fn push_boolean(&mut self, b: bool) {
        self.push(TValue::Boolean(b));
    }

    pub fn push_integer(&mut self, i: i64) {
        self.push(TValue::Integer(i));
    }

    pub fn push_number(&mut self, f: f64) {
        self.push(TValue::Float(f));
    }

    pub fn push_string(&mut self, s: &[u8]) {
        let id = self.strings.intern_or_create(s);
        self.push(TValue::Str(id));
    }

    pub fn push_native(&mut self, func: NativeFn, name: &'static str) {
        let v = self.native_value(func, name);
        self.push(v);
    }

    /// Push a copy of the value at `idx`.
    pub fn push_value(&mut self, idx: i32) {
        let v = self.value_at(idx);
        self.push(v);
    }

    pub fn pop(&mut self, n: usize) {
        assert!(n <= self.get_top(), "popping past the frame base");
        self.stack_top -= n;
    }

    /// Rotate the values from `idx` to the top by `n` positions (toward the
    /// top for positive `n`).
    pub fn rotate(&mut self, idx: i32, n: i32) {
        let start = self.abs_index(idx);
        let top = self.stack_top;
        let seg = &mut self.stack[start..top];
        if n >= 0 {
            seg.rotate_right(n as usize % seg.len().max(1));
        } else {
            seg.rotate_left((-n) as usize % seg.len().max(1));
        }
    }

    /// Move the top value into `idx`, shifting the rest up.
    pub fn insert(&mut self, idx: i32) {
        self.rotate(idx, 1);
    }

    /// Remove the value at `idx`, shifting the rest down.
    pub fn remove(&mut self, idx: i32) {
        self.rotate(idx, -1);
        self.pop(1);
    }

    // ---- Type inspection ----

    pub fn type_of(&self, idx: i32) -> i32 {
        type_code(self.value_at(idx))
    }

    pub fn type_name_at(&self, idx: i32) -> &'static str {
        type_name(self.value_at(idx))
    }

    pub fn is_nil(&self, idx: i32) -> bool {
        self.value_at(idx).is_nil()
    }

    pub fn is_boolean(&self, idx: i32) -> bool {
        matches!(self.value_at(idx), TValue::Boolean(_))
    }

    pub fn is_number(&self, idx: i32) -> bool {
        self.value_at(idx).is_number()
    }

    pub fn is_string(&self, idx: i32) -> bool {
        // Numbers convert implicitly, as in the reference API.
        let v = self.value_at(idx);
        v.is_string() || v.is_number()
    }

    pub fn is_table(&self, idx: i32) -> bool {
        self.value_at(idx).is_table()
    }

    pub fn is_function(&self, idx: i32) -> bool {
        self.value_at(idx).is_function()
    }

    // ---- Converters ----

    pub fn to_boolean(&self, idx: i32) -> bool {
        self.value_at(idx).is_truthy()
    }

    pub fn to_integer(&self, idx: i32) -> Option<i64> {
        coerce::to_integer(self.value_at(idx), &self.strings)
    }

    pub fn to_number(&self, idx: i32) -> Option<f64> {
        coerce::to_number(self.value_at(idx), &self.strings)
    }

    /// String view with the canonical number→string coercion.
    pub fn to_str(&self, idx: i32) -> Option<String> {
        match self.value_at(idx) {
            TValue::Str(id) => {
                Some(String::from_utf8_lossy(self.strings.get_bytes(id)).into_owned())
            }
            TValue::Integer(i) => Some(i.to_string()),
            TValue::Float(f) => Some(coerce::format_float(f)),
            _ => None,
        }
    }

    // ---- Tables ----

    /// Push a fresh empty table.
    pub fn new_table(&mut self) {
        let t = self.heap.alloc_table(0, 0);
        self.push(TValue::Table(t));
    }

    /// `t[k]` with metamethods: pops the key, pushes the value, returns its
    /// type code.
    pub fn get_table(&mut self, idx: i32) -> Result<i32, LuaError> {
        let t = self.value_at(idx);
        let key = self.value_at(-1);
        self.pop(1);
        let v = dispatch::table_get(self, t, key)?;
        self.push(v);
        Ok(type_code(v))
    }

    /// `t[k] = v` with metamethods: pops the value and the key.
    pub fn set_table(&mut self, idx: i32) -> Result<(), LuaError> {
        let t = self.value_at(idx);
        let val = self.value_at(-1);
        let key = self.value_at(-2);
        self.pop(2);
        dispatch::table_set(self, t, key, val)
    }

    pub fn get_field(&mut self, idx: i32, name: &str) -> Result<i32, LuaError> {
        let t = self.value_at(idx);
        let key = TValue::Str(self.strings.intern_or_create(name.as_bytes()));
        let v = dispatch::table_get(self, t, key)?;
        self.push(v);
        Ok(type_code(v))
    }

    pub fn set_field(&mut self, idx: i32, name: &str) -> Result<(), LuaError> {
        let t = self.value_at(idx);
        let key = TValue::Str(self.strings.intern_or_create(name.as_bytes()));
        let val = self.value_at(-1);
        self.pop(1);
        dispatch::table_set(self, t, key, val)
    }

    pub fn get_i(&mut self, idx: i32, i: i64) -> Result<i32, LuaError> {
        let t = self.value_at(idx);
        let v = dispatch::table_get(self, t, TValue::Integer(i))?;
        self.push(v);
        Ok(type_code(v))
    }

    pub fn set_i(&mut self, idx: i32, i: i64) -> Result<(), LuaError> {
        let t = self.value_at(idx);
        let val = self.value_at(-1);
        self.pop(1);
        dispatch::table_set(self, t, TValue::Integer(i), val)
    }

    /// Raw read, no metamethods. Pops the key, pushes the value.
    pub fn raw_get(&mut self, idx: i32) -> Result<i32, LuaError> {
        let t = self.value_at(idx);
        let key = self.value_at(-1);
        self.pop(1);
        let table = t
            .as_table_idx()
            .ok_or_else(|| LuaError::Runtime("table expected".to_string()))?;
        let v = self.heap.get_table(table).get(key);
        self.push(v);
        Ok(type_code(v))
    }

    /// Raw write, no metamethods. Pops the value and the key.
    pub fn raw_set(&mut self, idx: i32) -> Result<(), LuaError> {
        let t = self.value_at(idx);
        let val = self.value_at(-1);
        let key = self.value_at(-2);
        self.pop(2);
        let table = t
            .as_table_idx()
            .ok_or_else(|| LuaError::Runtime("table expected".to_string()))?;
        self.heap
            .get_table_mut(table)
            .set(key, val)
            .map_err(|e| LuaError::Runtime(e.to_string()))
    }

    /// Iteration step: pops a key, pushes the next key/value pair (true) or
    /// nothing at the end (false).
    pub fn next(&mut self, idx: i32) -> Result<bool, LuaError> {
        let t = self.value_at(idx);
        let key = self.value_at(-1);
        self.pop(1);
        let table = t
            .as_table_idx()
            .ok_or_else(|| LuaError::Runtime("table expected".to_string()))?;
        match self.heap.get_table(table).next(key) {
            Ok(Some((k, v))) => {
                self.push(k);
                self.push(v);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(()) => Err(LuaError::Runtime("invalid key to 'next'".to_string())),
        }
    }

    /// Raw length: byte length for strings, a border for tables.
    pub fn len_of(&self, idx: i32) -> Result<i64, LuaError> {
        match self.value_at(idx) {
            TValue::Str(id) => Ok(self.strings.get_bytes(id).len() as i64),
            TValue::Table(t) => Ok(self.heap.get_table(t).border()),
            other => Err(LuaError::Runtime(format!(
                "attempt to get length of a {} value",
                type_name(other)
            ))),
        }
    }

    // ---- Loading and calling ----

    /// Load a chunk — source text, or a precompiled chunk recognized by its
    /// signature — and push the resulting closure.
    pub fn load(&mut self, data: &[u8], name: &str) -> Result<(), LoadError> {
        let closure = if data.starts_with(b"\x1bLua") {
            let mut strings = std::mem::take(&mut self.strings);
            let result = binary_chunk::undump(data, name, &mut strings);
            self.strings = strings;
            let proto = result.map_err(LoadError::Chunk)?;
            self.instantiate(&proto)
        } else {
            self.load_source(data, name).map_err(LoadError::Compile)?
        };
        self.push(closure);
        Ok(())
    }

    /// Call with `nargs` arguments on top of the stack, the callee below
    /// them. Results replace callee and arguments, adjusted to `nresults`
    /// (-1 keeps them all). Raises on error.
    pub fn call(&mut self, nargs: usize, nresults: i32) -> Result<(), LuaError> {
        let func_pos = self.stack_top - nargs - 1;
        let results = self.run_call(func_pos, nargs)?;
        self.stack_top = func_pos;
        match nresults {
            -1 => {
                for r in &results {
                    self.push(*r);
                }
            }
            n => {
                for i in 0..n as usize {
                    self.push(results.get(i).copied().unwrap_or(TValue::Nil));
                }
            }
        }
        Ok(())
    }

    /// Protected call: like [`Vm::call`], but errors leave the stack at the
    /// call position with the error value pushed, and the status reports the
    /// failure. `errfunc` is accepted for interface compatibility; message
    /// handlers are not applied (pass 0).
    pub fn pcall(&mut self, nargs: usize, nresults: i32, errfunc: i32) -> i32 {
        let _ = errfunc;
        let func_pos = self.stack_top - nargs - 1;
        match self.run_call(func_pos, nargs) {
            Ok(results) => {
                self.stack_top = func_pos;
                match nresults {
                    -1 => {
                        for r in &results {
                            self.push(*r);
                        }
                    }
                    n => {
                        for i in 0..n as usize {
                            self.push(results.get(i).copied().unwrap_or(TValue::Nil));
                        }
                    }
                }
                LUA_OK
            }
            Err(e) => {
                let ev = e.to_tvalue(&mut self.strings);
                self.stack_top = func_pos;
                self.push(ev);
                LUA_ERRRUN
            }
        }
    }

    // ---- Metatables and globals ----

    /// Push the metatable of the value at `idx`; false (nothing pushed) when
    /// it has none.
    pub fn get_metatable_at(&mut self, idx: i32) -> bool {
        if let TValue::Table(t) = self.value_at(idx) {
            if let Some(mt) = self.heap.get_table(t).metatable {
                self.push(TValue::Table(mt));
                return true;
            }
        }
        false
    }

    /// Pop a table (or nil) and install it as the metatable of the value at
    /// `idx`.
    pub fn set_metatable_at(&mut self, idx: i32) -> Result<(), LuaError> {
        let mt = self.value_at(-1);
        self.pop(1);
        let t = self
            .value_at(idx)
            .as_table_idx()
            .ok_or_else(|| LuaError::Runtime("table expected".to_string()))?;
        match mt {
            TValue::Nil => self.heap.get_table_mut(t).metatable = None,
            TValue::Table(m) => self.heap.get_table_mut(t).metatable = Some(m),
            other => {
                return Err(LuaError::Runtime(format!(
                    "nil or table expected, got {}",
                    type_name(other)
                )))
            }
        }
        Ok(())
    }

    /// Push the value of a global variable.
    pub fn get_global(&mut self, name: &str) -> i32 {
        let key = self.strings.intern_or_create(name.as_bytes());
        let v = self.heap.get_table(self.globals).get_str(key);
        self.push(v);
        type_code(v)
    }

    /// Pop a value and store it as a global variable.
    pub fn set_global(&mut self, name: &str) {
        let key = self.strings.intern_or_create(name.as_bytes());
        let v = self.value_at(-1);
        self.pop(1);
        self.heap.get_table_mut(self.globals).set_str(key, v);
    }
}

#[allow(unused_imports)]
pub use object::{
    LUA_TBOOLEAN, LUA_TFUNCTION, LUA_TLIGHTUSERDATA, LUA_TNIL, LUA_TNUMBER, LUA_TSTRING,
    LUA_TTABLE,
};
