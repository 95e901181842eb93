use lunara_core::value::TValue;
use lunara_vm::{stdlib, Vm};

/// Compile and run a chunk with the base natives installed; returns the
/// chunk's results and the state (for string inspection).
pub fn run(source: &str) -> (Vec<TValue>, Vm) {
    let mut vm = Vm::new();
    stdlib::install(&mut vm);
    let closure = vm
        .load_source(source.as_bytes(), "test")
        .unwrap_or_else(|e| panic!("compile error: {e}"));
    let results = vm
        .call_value(closure, &[])
        .unwrap_or_else(|e| panic!("runtime error: {e}"));
    (results, vm)
}

/// Run a chunk that is expected to die at runtime; returns the error text.
pub fn run_err(source: &str) -> String {
    let mut vm = Vm::new();
    stdlib::install(&mut vm);
    let closure = vm
        .load_source(source.as_bytes(), "test")
        .unwrap_or_else(|e| panic!("compile error: {e}"));
    match vm.call_value(closure, &[]) {
        Err(e) => match e {
            lunara_vm::LuaError::Value(v) => {
                if let Some(id) = v.as_string_id() {
                    String::from_utf8_lossy(vm.strings.get_bytes(id)).into_owned()
                } else {
                    format!("{v}")
                }
            }
            other => other.to_string(),
        },
        Ok(vals) => panic!("expected an error, got {vals:?}"),
    }
}

pub fn assert_int(results: &[TValue], idx: usize, expected: i64) {
    match results.get(idx) {
        Some(TValue::Integer(i)) if *i == expected => {}
        other => panic!("result[{idx}] = {other:?}, expected integer {expected}"),
    }
}

pub fn assert_float(results: &[TValue], idx: usize, expected: f64) {
    match results.get(idx) {
        Some(TValue::Float(f)) if *f == expected || (f - expected).abs() < 1e-12 => {}
        other => panic!("result[{idx}] = {other:?}, expected float {expected}"),
    }
}

pub fn assert_bool(results: &[TValue], idx: usize, expected: bool) {
    match results.get(idx) {
        Some(TValue::Boolean(b)) if *b == expected => {}
        other => panic!("result[{idx}] = {other:?}, expected {expected}"),
    }
}

pub fn assert_nil(results: &[TValue], idx: usize) {
    match results.get(idx) {
        Some(TValue::Nil) => {}
        other => panic!("result[{idx}] = {other:?}, expected nil"),
    }
}

pub fn assert_str(results: &[TValue], idx: usize, expected: &str, vm: &Vm) {
    match results.get(idx) {
        Some(TValue::Str(id)) => {
            let got = String::from_utf8_lossy(vm.strings.get_bytes(*id));
            assert_eq!(got, expected, "result[{idx}]");
        }
        other => panic!("result[{idx}] = {other:?}, expected string {expected:?}"),
    }
}

/// Run a chunk and compare every result against expected integers.
pub fn check_ints(source: &str, expected: &[i64]) {
    let (results, _) = run(source);
    assert_eq!(
        results.len(),
        expected.len(),
        "result count for {source:?}: got {results:?}"
    );
    for (i, &e) in expected.iter().enumerate() {
        assert_int(&results, i, e);
    }
}
