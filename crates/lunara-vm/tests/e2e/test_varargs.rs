use super::helpers::*;

#[test]
fn spec_vararg_count_via_table_pack() {
    // select('#', ...) is library territory; counting through a table
    // constructor exercises the same vararg plumbing.
    check_ints(
        "local function count(...) local t = {...} return #t end\nreturn count(1, 2, 3)",
        &[3],
    );
}

#[test]
fn varargs_forward_through_return() {
    check_ints(
        "local function f(...) return ... end\nreturn f(1, 2, 3)",
        &[1, 2, 3],
    );
}

#[test]
fn varargs_with_fixed_params() {
    check_ints(
        "local function f(first, ...)\n  local rest = {...}\n  return first, #rest\nend\nreturn f(10, 20, 30, 40)",
        &[10, 3],
    );
}

#[test]
fn vararg_truncates_mid_list() {
    check_ints(
        "local function f(...) return select_one(...) end\nfunction select_one(a) return a end\nreturn f(7, 8, 9)",
        &[7],
    );
}

#[test]
fn vararg_single_value_context() {
    check_ints(
        "local function f(...) local first = ... return first end\nreturn f(42, 43)",
        &[42],
    );
}

#[test]
fn empty_varargs() {
    check_ints(
        "local function f(...) local t = {...} return #t end\nreturn f()",
        &[0],
    );
}

#[test]
fn varargs_expand_in_call_arguments() {
    check_ints(
        "local function sum3(a, b, c) return a + b + c end\nlocal function f(...) return sum3(...) end\nreturn f(1, 2, 3)",
        &[6],
    );
}

#[test]
fn varargs_mixed_with_values_in_constructor() {
    check_ints(
        "local function f(...) local t = {0, ...} return #t, t[1], t[4] end\nreturn f(1, 2, 3)",
        &[4, 0, 3],
    );
}

#[test]
fn main_chunk_is_vararg() {
    // `...` at chunk level compiles (the host passes no arguments).
    check_ints("local t = {...}\nreturn #t", &[0]);
}

#[test]
fn vararg_in_middle_gives_one_value() {
    check_ints(
        "local function f(...) local t = {..., 99} return #t, t[1], t[2] end\nreturn f(7, 8)",
        &[2, 7, 99],
    );
}
