use super::helpers::*;

#[test]
fn spec_counter_closure() {
    // `mk` returns a closure over x; x closes when mk returns.
    check_ints(
        "local function mk()\n  local x = 0\n  return function() x = x + 1 return x end\nend\nlocal f = mk()\nreturn f(), f(), f()",
        &[1, 2, 3],
    );
}

#[test]
fn closures_from_the_same_factory_are_independent() {
    check_ints(
        "local function mk()\n  local x = 0\n  return function() x = x + 1 return x end\nend\nlocal a, b = mk(), mk()\na() a()\nreturn a(), b()",
        &[3, 1],
    );
}

#[test]
fn sibling_closures_share_one_upvalue() {
    check_ints(
        "local function mk()\n  local n = 0\n  local function inc() n = n + 1 end\n  local function get() return n end\n  return inc, get\nend\nlocal inc, get = mk()\ninc() inc() inc()\nreturn get()",
        &[3],
    );
}

#[test]
fn open_upvalue_sees_live_writes() {
    check_ints(
        "local x = 1\nlocal function get() return x end\nx = 2\nreturn get()",
        &[2],
    );
}

#[test]
fn upvalue_write_reaches_enclosing_local() {
    check_ints(
        "local x = 1\nlocal function set(v) x = v end\nset(42)\nreturn x",
        &[42],
    );
}

#[test]
fn capture_through_two_levels() {
    check_ints(
        "local a = 7\nlocal function outer()\n  return function() return a end\nend\nreturn outer()()",
        &[7],
    );
}

#[test]
fn block_locals_close_per_iteration() {
    // Each loop iteration captures a fresh `v`.
    check_ints(
        "local fs = {}\nfor i = 1, 3 do\n  local v = i * 10\n  fs[i] = function() return v end\nend\nreturn fs[1](), fs[2](), fs[3]()",
        &[10, 20, 30],
    );
}

#[test]
fn loop_variable_captured_per_iteration() {
    check_ints(
        "local fs = {}\nfor i = 1, 3 do fs[i] = function() return i end end\nreturn fs[1](), fs[2](), fs[3]()",
        &[1, 2, 3],
    );
}

#[test]
fn do_block_close() {
    check_ints(
        "local f\ndo\n  local hidden = 99\n  f = function() return hidden end\nend\nreturn f()",
        &[99],
    );
}

#[test]
fn shared_state_updates_through_closed_upvalue() {
    check_ints(
        "local function account(balance)\n  return function(n) balance = balance + n return balance end\nend\nlocal deposit = account(100)\ndeposit(50)\nreturn deposit(25)",
        &[175],
    );
}

#[test]
fn recursion_through_upvalue() {
    check_ints(
        "local function mk()\n  local function fact(n)\n    if n <= 1 then return 1 end\n    return n * fact(n - 1)\n  end\n  return fact\nend\nreturn mk()(5)",
        &[120],
    );
}

#[test]
fn vararg_chunk_has_env_upvalue() {
    // Globals resolve through the chunk's _ENV upvalue.
    check_ints("g = 5\nlocal function read() return g end\nreturn read()", &[5]);
}
