//! Dump/undump round trips executed end to end: a chunk must behave the
//! same after a trip through the binary codec.

use lunara_core::value::TValue;
use lunara_vm::{binary_chunk, stdlib, Vm};

/// Run a chunk from source, and again from its dumped form, and check both
/// produce the same results.
fn run_both_ways(source: &str) -> (Vec<TValue>, Vec<TValue>, Vm, Vm) {
    let (proto, strings) =
        lunara_compiler::compile_standalone(source.as_bytes(), "rt").unwrap();
    let blob = binary_chunk::dump(&proto, &strings);

    let mut direct_vm = Vm::new();
    stdlib::install(&mut direct_vm);
    let f = direct_vm.load_source(source.as_bytes(), "rt").unwrap();
    let direct = direct_vm.call_value(f, &[]).unwrap();

    let mut loaded_vm = Vm::new();
    stdlib::install(&mut loaded_vm);
    loaded_vm.load(&blob, "rt").unwrap();
    let nresults = direct.len() as i32;
    loaded_vm.call(0, nresults).unwrap();
    let mut loaded = Vec::new();
    for i in 0..nresults {
        loaded.push(loaded_vm.value_at(i - nresults));
    }
    (direct, loaded, direct_vm, loaded_vm)
}

fn values_match(a: TValue, b: TValue, va: &Vm, vb: &Vm) -> bool {
    match (a, b) {
        (TValue::Str(x), TValue::Str(y)) => va.strings.get_bytes(x) == vb.strings.get_bytes(y),
        (TValue::Float(x), TValue::Float(y)) => x.to_bits() == y.to_bits(),
        (x, y) => x == y,
    }
}

fn assert_same_behavior(source: &str) {
    let (direct, loaded, va, vb) = run_both_ways(source);
    assert_eq!(direct.len(), loaded.len(), "result count for {source:?}");
    for (i, (&x, &y)) in direct.iter().zip(&loaded).enumerate() {
        assert!(
            values_match(x, y, &va, &vb),
            "result {i} differs for {source:?}: {x:?} vs {y:?}"
        );
    }
}

#[test]
fn arithmetic_round_trips() {
    assert_same_behavior("return 1 + 2, 10 // 3, 10 % 3, 2 ^ 10");
}

#[test]
fn strings_round_trip() {
    let long = "z".repeat(200);
    assert_same_behavior(&format!("return 'short', '{long}'"));
    assert_same_behavior("local s = 'abc'\nreturn s .. 'def', #s");
}

#[test]
fn closures_round_trip() {
    assert_same_behavior(
        "local function mk()\n  local n = 0\n  return function() n = n + 1 return n end\nend\nlocal f = mk()\nf()\nreturn f()",
    );
}

#[test]
fn loops_and_tables_round_trip() {
    assert_same_behavior(
        "local t = {}\nfor i = 1, 20 do t[i] = i * i end\nlocal s = 0\nfor _, v in ipairs(t) do s = s + v end\nreturn s, #t",
    );
}

#[test]
fn metatables_round_trip() {
    assert_same_behavior(
        "local a = setmetatable({v = 1}, {__add = function(x, y) return x.v + y.v end})\nlocal b = setmetatable({v = 2}, getmetatable(a))\nreturn a + b",
    );
}

#[test]
fn varargs_round_trip() {
    assert_same_behavior(
        "local function f(...) local t = {...} return #t, ... end\nreturn f(9, 8, 7)",
    );
}

#[test]
fn pcall_round_trips() {
    assert_same_behavior(
        "local ok, err = pcall(function() error('boom') end)\nreturn ok, err",
    );
}
