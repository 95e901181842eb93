//! Base library natives: the host-side collaborators the runtime exposes
//! through the global table. They use the same calling convention as
//! scripted functions: arguments come in the native's frame, results go on
//! top of its stack, the return value is the count.

use crate::coerce;
use crate::dispatch;
use crate::error::LuaError;
use crate::vm::Vm;
use lunara_core::object::type_name;
use lunara_core::value::TValue;

/// Register the base natives into the globals table.
pub fn install(vm: &mut Vm) {
    vm.register("print", base_print, "print");
    vm.register("type", base_type, "type");
    vm.register("tostring", base_tostring, "tostring");
    vm.register("tonumber", base_tonumber, "tonumber");
    vm.register("next", base_next, "next");
    vm.register("pairs", base_pairs, "pairs");
    vm.register("ipairs", base_ipairs, "ipairs");
    vm.register("error", base_error, "error");
    vm.register("pcall", base_pcall, "pcall");
    vm.register("getmetatable", base_getmetatable, "getmetatable");
    vm.register("setmetatable", base_setmetatable, "setmetatable");
    vm.register("clock", base_clock, "clock");
}

/// Human-readable form of a value, as print and tostring show it.
pub fn display_value(vm: &Vm, v: TValue) -> String {
    match v {
        TValue::Nil => "nil".to_string(),
        TValue::Boolean(b) => b.to_string(),
        TValue::Integer(i) => i.to_string(),
        TValue::Float(f) => coerce::format_float(f),
        TValue::Str(id) => String::from_utf8_lossy(vm.strings.get_bytes(id)).into_owned(),
        TValue::Table(idx) => format!("table: {:#010x}", idx.index()),
        TValue::Closure(idx) => format!("function: {:#010x}", idx.index()),
        TValue::Native(id) => format!("function: builtin: {:#010x}", id.0),
    }
}

fn arg(vm: &Vm, i: i32) -> TValue {
    if (i as usize) <= vm.get_top() {
        vm.value_at(i)
    } else {
        TValue::Nil
    }
}

fn bad_arg(i: u32, func: &str, expected: &str, got: TValue) -> LuaError {
    LuaError::Runtime(format!(
        "bad argument #{i} to '{func}' ({expected} expected, got {})",
        type_name(got)
    ))
}

fn base_print(vm: &mut Vm) -> Result<u32, LuaError> {
    let n = vm.get_top();
    let mut line = String::new();
    for i in 1..=n {
        if i > 1 {
            line.push('\t');
        }
        line.push_str(&display_value(vm, vm.value_at(i as i32)));
    }
    println!("{line}");
    Ok(0)
}

fn base_type(vm: &mut Vm) -> Result<u32, LuaError> {
    let v = arg(vm, 1);
    vm.push_string(type_name(v).as_bytes());
    Ok(1)
}

fn base_tostring(vm: &mut Vm) -> Result<u32, LuaError> {
    let v = arg(vm, 1);
    let s = display_value(vm, v);
    vm.push_string(s.as_bytes());
    Ok(1)
}

fn base_tonumber(vm: &mut Vm) -> Result<u32, LuaError> {
    let v = arg(vm, 1);
    let result = match v {
        TValue::Integer(_) | TValue::Float(_) => v,
        TValue::Str(id) => {
            let bytes = vm.strings.get_bytes(id);
            match std::str::from_utf8(bytes).ok().and_then(coerce::parse_number) {
                Some(n) => n,
                None => TValue::Nil,
            }
        }
        _ => TValue::Nil,
    };
    vm.push(result);
    Ok(1)
}

fn base_next(vm: &mut Vm) -> Result<u32, LuaError> {
    let t = arg(vm, 1);
    let key = arg(vm, 2);
    let table = t
        .as_table_idx()
        .ok_or_else(|| bad_arg(1, "next", "table", t))?;
    match vm.heap.get_table(table).next(key) {
        Ok(Some((k, v))) => {
            vm.push(k);
            vm.push(v);
            Ok(2)
        }
        Ok(None) => {
            vm.push_nil();
            Ok(1)
        }
        Err(()) => Err(LuaError::Runtime("invalid key to 'next'".to_string())),
    }
}

/// `pairs(t)` returns the stateless iterator triple (next, t, nil).
fn base_pairs(vm: &mut Vm) -> Result<u32, LuaError> {
    let t = arg(vm, 1);
    if !t.is_table() {
        return Err(bad_arg(1, "pairs", "table", t));
    }
    let next = vm.native_value(base_next, "next");
    vm.push(next);
    vm.push(t);
    vm.push_nil();
    Ok(3)
}

/// `ipairs(t)` returns (aux, t, 0); aux stops at the first nil slot.
fn base_ipairs(vm: &mut Vm) -> Result<u32, LuaError> {
    let t = arg(vm, 1);
    if !t.is_table() {
        return Err(bad_arg(1, "ipairs", "table", t));
    }
    let aux = vm.native_value(ipairs_iterator, "ipairs_iterator");
    vm.push(aux);
    vm.push(t);
    vm.push_integer(0);
    Ok(3)
}

fn ipairs_iterator(vm: &mut Vm) -> Result<u32, LuaError> {
    let t = arg(vm, 1);
    let i = arg(vm, 2)
        .as_integer()
        .ok_or_else(|| bad_arg(2, "ipairs_iterator", "integer", arg(vm, 2)))?;
    let next_i = i + 1;
    let v = dispatch::table_get(vm, t, TValue::Integer(next_i))?;
    if v.is_nil() {
        vm.push_nil();
        Ok(1)
    } else {
        vm.push_integer(next_i);
        vm.push(v);
        Ok(2)
    }
}

/// `error(msg [, level])`: string messages at level > 0 get a
/// `chunk:line:` prefix for the given call level.
fn base_error(vm: &mut Vm) -> Result<u32, LuaError> {
    let msg = arg(vm, 1);
    let level = match arg(vm, 2) {
        TValue::Nil => 1,
        v => coerce::to_integer(v, &vm.strings).unwrap_or(1),
    };
    if level > 0 {
        if let TValue::Str(id) = msg {
            if let Some(prefix) = vm.position(level as usize) {
                let mut bytes = prefix.into_bytes();
                bytes.extend_from_slice(vm.strings.get_bytes(id));
                let positioned = vm.strings.intern_or_create(&bytes);
                return Err(LuaError::Value(TValue::Str(positioned)));
            }
        }
    }
    Err(LuaError::Value(msg))
}

/// `pcall(f, ...)`: (true, results...) on success, (false, error) on
/// failure. The protected boundary is this native's frame.
fn base_pcall(vm: &mut Vm) -> Result<u32, LuaError> {
    let n = vm.get_top();
    if n == 0 {
        return Err(LuaError::Runtime(
            "bad argument #1 to 'pcall' (value expected)".to_string(),
        ));
    }
    let base = vm.abs_index(1);
    match vm.run_call(base, n - 1) {
        Ok(results) => {
            vm.stack_top = base;
            vm.push_boolean(true);
            for r in &results {
                vm.push(*r);
            }
            Ok(1 + results.len() as u32)
        }
        Err(e) => {
            let errval = e.to_tvalue(&mut vm.strings);
            vm.stack_top = base;
            vm.push_boolean(false);
            vm.push(errval);
            Ok(2)
        }
    }
}

fn base_getmetatable(vm: &mut Vm) -> Result<u32, LuaError> {
    let t = arg(vm, 1);
    match t.as_table_idx().and_then(|idx| vm.heap.get_table(idx).metatable) {
        Some(mt) => vm.push(TValue::Table(mt)),
        None => vm.push_nil(),
    }
    Ok(1)
}

fn base_setmetatable(vm: &mut Vm) -> Result<u32, LuaError> {
    let t = arg(vm, 1);
    let mt = arg(vm, 2);
    let table = t
        .as_table_idx()
        .ok_or_else(|| bad_arg(1, "setmetatable", "table", t))?;
    match mt {
        TValue::Nil => vm.heap.get_table_mut(table).metatable = None,
        TValue::Table(m) => vm.heap.get_table_mut(table).metatable = Some(m),
        other => return Err(bad_arg(2, "setmetatable", "nil or table", other)),
    }
    // Returns its first argument, like the reference implementation.
    vm.push(t);
    Ok(1)
}

/// Seconds since the state was created, as a float.
fn base_clock(vm: &mut Vm) -> Result<u32, LuaError> {
    let secs = vm.start_time.elapsed().as_secs_f64();
    vm.push_number(secs);
    Ok(1)
}
