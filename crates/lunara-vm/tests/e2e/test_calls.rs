use super::helpers::*;

#[test]
fn spec_function_declaration_and_call() {
    check_ints(
        "function add(x, y) return x + y end\nreturn add(123, 456)",
        &[579],
    );
}

#[test]
fn local_function_recursion() {
    check_ints(
        "local function fib(n)\n  if n < 2 then return n end\n  return fib(n - 1) + fib(n - 2)\nend\nreturn fib(15)",
        &[610],
    );
}

#[test]
fn multiple_returns() {
    check_ints(
        "local function three() return 1, 2, 3 end\nlocal a, b, c = three()\nreturn a, b, c",
        &[1, 2, 3],
    );
}

#[test]
fn extra_results_are_dropped() {
    check_ints(
        "local function three() return 1, 2, 3 end\nlocal a = three()\nreturn a",
        &[1],
    );
}

#[test]
fn missing_results_pad_with_nil() {
    let (r, _) = run("local function one() return 1 end\nlocal a, b = one()\nreturn a, b");
    assert_int(&r, 0, 1);
    assert_nil(&r, 1);
}

#[test]
fn missing_arguments_become_nil() {
    let (r, _) = run("local function f(a, b) return a, b end\nreturn f(1)");
    assert_int(&r, 0, 1);
    assert_nil(&r, 1);
}

#[test]
fn extra_arguments_are_ignored() {
    check_ints("local function f(a) return a end\nreturn f(1, 2, 3)", &[1]);
}

#[test]
fn call_results_expand_in_tail_position() {
    check_ints(
        "local function pair() return 10, 20 end\nlocal function sum3(a, b, c) return a + b + (c or 0) end\nreturn sum3(1, pair())",
        &[31],
    );
}

#[test]
fn call_results_truncate_mid_list() {
    check_ints(
        "local function pair() return 10, 20 end\nlocal function sum(a, b) return a + b end\nreturn sum(pair(), 1)",
        &[11],
    );
}

#[test]
fn parens_truncate_to_one() {
    check_ints(
        "local function pair() return 10, 20 end\nlocal a, b = (pair())\nreturn a, b == nil and 1 or 0",
        &[10, 1],
    );
}

#[test]
fn return_forwards_all_results() {
    check_ints(
        "local function pair() return 1, 2 end\nlocal function fwd() return pair() end\nlocal a, b = fwd()\nreturn a, b",
        &[1, 2],
    );
}

#[test]
fn deep_tail_recursion_reuses_frames() {
    // 100k tail-recursive steps must not overflow the call stack.
    check_ints(
        "local function loop(n)\n  if n == 0 then return 0 end\n  return loop(n - 1)\nend\nreturn loop(100000)",
        &[0],
    );
}

#[test]
fn non_tail_deep_recursion_overflows() {
    let msg = run_err(
        "local function f(n) return 1 + f(n + 1) end\nreturn f(1)",
    );
    assert!(msg.contains("stack overflow"), "got: {msg}");
}

#[test]
fn method_call_passes_receiver() {
    check_ints(
        "local obj = {value = 42}\nfunction obj:get() return self.value end\nreturn obj:get()",
        &[42],
    );
}

#[test]
fn method_with_arguments() {
    check_ints(
        "local acc = {total = 0}\nfunction acc:add(n) self.total = self.total + n return self.total end\nacc:add(5)\nacc:add(7)\nreturn acc.total",
        &[12],
    );
}

#[test]
fn function_values_are_first_class() {
    check_ints(
        "local function double(x) return x * 2 end\nlocal ops = {d = double}\nreturn ops.d(21)",
        &[42],
    );
}

#[test]
fn higher_order_functions() {
    check_ints(
        "local function apply(f, x) return f(x) end\nreturn apply(function(n) return n + 1 end, 41)",
        &[42],
    );
}

#[test]
fn calling_a_number_raises() {
    let msg = run_err("local x = 5\nreturn x()");
    assert!(msg.contains("attempt to call a number value"), "got: {msg}");
}

#[test]
fn calling_nil_raises() {
    let msg = run_err("return missing_function()");
    assert!(msg.contains("attempt to call a nil value"), "got: {msg}");
}

#[test]
fn string_and_table_call_sugar() {
    let (r, vm) = run(
        "local function id(x) return x end\nlocal s = id 'sugar'\nlocal t = id {1, 2}\nreturn s, #t",
    );
    assert_str(&r, 0, "sugar", &vm);
    assert_int(&r, 1, 2);
}

#[test]
fn chunk_results_reach_the_host() {
    check_ints("return 1, 2, 3", &[1, 2, 3]);
    let (r, _) = run("");
    assert!(r.is_empty());
}
