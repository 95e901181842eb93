use super::helpers::*;

#[test]
fn spec_pcall_error_scenario() {
    // ok,err = pcall(function() error("boom") end): the message gains a
    // chunk:line: prefix.
    let (r, vm) = run("local ok, err = pcall(function() error('boom') end)\nreturn ok, err");
    assert_bool(&r, 0, false);
    assert_str(&r, 1, "test:1: boom", &vm);
}

#[test]
fn pcall_success_prepends_true() {
    check_ints(
        "local ok, a, b = pcall(function() return 1, 2 end)\nreturn ok and 1 or 0, a, b",
        &[1, 1, 2],
    );
}

#[test]
fn pcall_catches_runtime_errors() {
    let (r, vm) = run("local ok, err = pcall(function() local x return x.y end)\nreturn ok, err");
    assert_bool(&r, 0, false);
    match r[1] {
        lunara_core::value::TValue::Str(id) => {
            let msg = String::from_utf8_lossy(vm.strings.get_bytes(id));
            assert!(msg.contains("attempt to index"), "got: {msg}");
            assert!(msg.contains("test:"), "got: {msg}");
        }
        other => panic!("expected string error, got {other:?}"),
    }
}

#[test]
fn error_with_non_string_value() {
    let (r, _) = run(
        "local ok, err = pcall(function() error({code = 42}) end)\nreturn ok, type(err) == 'table' and 1 or 0",
    );
    assert_bool(&r, 0, false);
    assert_int(&r, 1, 1);
}

#[test]
fn error_with_table_payload_round_trips() {
    check_ints(
        "local ok, err = pcall(function() error({code = 7}) end)\nreturn err.code",
        &[7],
    );
}

#[test]
fn error_level_zero_keeps_message_raw() {
    let (r, vm) = run("local ok, err = pcall(function() error('plain', 0) end)\nreturn err");
    assert_str(&r, 0, "plain", &vm);
}

#[test]
fn nested_pcall_boundaries() {
    check_ints(
        "local outer_ok = pcall(function()\n  local inner_ok = pcall(function() error('x') end)\n  if inner_ok then error('inner should have failed') end\nend)\nreturn outer_ok and 1 or 0",
        &[1],
    );
}

#[test]
fn execution_continues_after_pcall() {
    check_ints(
        "local n = 0\npcall(function() n = 1 error('stop') n = 2 end)\nn = n + 10\nreturn n",
        &[11],
    );
}

#[test]
fn pcall_of_non_function() {
    let (r, _) = run("local ok = pcall(5)\nreturn ok");
    assert_bool(&r, 0, false);
}

#[test]
fn runtime_errors_carry_position() {
    let msg = run_err("local x\n\n\nreturn x + 1");
    assert!(msg.starts_with("test:4:"), "got: {msg}");
}

#[test]
fn unhandled_errors_reach_the_host() {
    let msg = run_err("error('escaped')");
    assert!(msg.contains("escaped"), "got: {msg}");
}

#[test]
fn upvalues_survive_error_unwinding() {
    // The closure's upvalue must be closed while pcall unwinds the dead
    // frames.
    check_ints(
        "local keep\nlocal ok = pcall(function()\n  local x = 42\n  keep = function() return x end\n  error('unwind')\nend)\nreturn keep()",
        &[42],
    );
}

#[test]
fn pcall_restores_the_stack_for_the_caller() {
    check_ints(
        "local a, b = 1, 2\nlocal ok = pcall(function() error('x') end)\nreturn a + b",
        &[3],
    );
}
