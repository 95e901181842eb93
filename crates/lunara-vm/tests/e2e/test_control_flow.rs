use super::helpers::*;

#[test]
fn if_elseif_else_chains() {
    let src = |n: i64| {
        format!(
            "local n = {n}\nif n < 10 then return 'small'\nelseif n < 100 then return 'medium'\nelse return 'large' end"
        )
    };
    let (r, vm) = run(&src(5));
    assert_str(&r, 0, "small", &vm);
    let (r, vm) = run(&src(50));
    assert_str(&r, 0, "medium", &vm);
    let (r, vm) = run(&src(500));
    assert_str(&r, 0, "large", &vm);
}

#[test]
fn while_loop_counts() {
    check_ints(
        "local i, n = 0, 0\nwhile i < 10 do i = i + 1 n = n + i end\nreturn n",
        &[55],
    );
}

#[test]
fn repeat_runs_at_least_once() {
    check_ints("local n = 0\nrepeat n = n + 1 until true\nreturn n", &[1]);
    check_ints(
        "local n = 0\nrepeat n = n + 1 until n >= 5\nreturn n",
        &[5],
    );
}

#[test]
fn repeat_condition_sees_body_locals() {
    check_ints(
        "local n = 0\nrepeat local done = n > 2 n = n + 1 until done\nreturn n",
        &[4],
    );
}

#[test]
fn spec_numeric_for_iterates_exactly_ten_times() {
    check_ints("local c = 0\nfor i = 1, 10 do c = c + 1 end\nreturn c", &[10]);
}

#[test]
fn spec_float_for_uses_float_semantics() {
    // A float initial value switches the whole loop to floats.
    let (r, _) = run(
        "local last\nfor i = 1.0, 10 do last = i end\nreturn last",
    );
    assert_float(&r, 0, 10.0);
}

#[test]
fn numeric_for_with_step() {
    check_ints(
        "local s = 0\nfor i = 1, 10, 2 do s = s + i end\nreturn s",
        &[25],
    );
    check_ints(
        "local s = 0\nfor i = 10, 1, -1 do s = s + i end\nreturn s",
        &[55],
    );
}

#[test]
fn numeric_for_zero_iterations() {
    check_ints("local c = 0\nfor i = 10, 1 do c = c + 1 end\nreturn c", &[0]);
}

#[test]
fn numeric_for_step_zero_raises() {
    let msg = run_err("for i = 1, 10, 0 do end");
    assert!(msg.contains("'for' step is zero"), "got: {msg}");
}

#[test]
fn numeric_for_fractional_step() {
    let (r, _) = run("local c = 0\nfor i = 0.0, 1.0, 0.25 do c = c + 1 end\nreturn c");
    assert_int(&r, 0, 5);
}

#[test]
fn numeric_for_var_is_local_to_the_loop() {
    let (r, _) = run("for i = 1, 3 do end\nreturn i");
    assert_nil(&r, 0);
}

#[test]
fn break_exits_innermost_loop() {
    check_ints(
        "local n = 0\nfor i = 1, 10 do\n  if i > 3 then break end\n  n = n + 1\nend\nreturn n",
        &[3],
    );
}

#[test]
fn break_in_nested_loops() {
    check_ints(
        "local n = 0\nfor i = 1, 3 do\n  for j = 1, 10 do\n    if j == 2 then break end\n    n = n + 1\n  end\nend\nreturn n",
        &[3],
    );
}

#[test]
fn while_with_break_and_condition() {
    check_ints(
        "local i = 0\nwhile true do i = i + 1 if i == 7 then break end end\nreturn i",
        &[7],
    );
}

#[test]
fn and_or_results() {
    let (r, vm) = run("return nil or 'fallback', false and 'x', 1 and 2, nil and 1");
    assert_str(&r, 0, "fallback", &vm);
    assert_bool(&r, 1, false);
    assert_int(&r, 2, 2);
    assert_nil(&r, 3);
}

#[test]
fn and_or_short_circuit_effects() {
    check_ints(
        "local n = 0\nlocal function bump() n = n + 1 return true end\nlocal _ = false and bump()\nlocal _ = true or bump()\nreturn n",
        &[0],
    );
}

#[test]
fn complex_conditions() {
    check_ints(
        "local a, b, c = 1, 2, 3\nif a < b and b < c then return 1 end\nreturn 0",
        &[1],
    );
    check_ints(
        "local a, b = 5, 2\nif a < b or b == 2 then return 1 end\nreturn 0",
        &[1],
    );
    check_ints("local x\nif not x then return 1 end\nreturn 0", &[1]);
}

#[test]
fn zero_and_empty_string_are_truthy() {
    check_ints("if 0 then return 1 end\nreturn 0", &[1]);
    check_ints("if '' then return 1 end\nreturn 0", &[1]);
}

#[test]
fn do_block_scoping() {
    check_ints(
        "local x = 1\ndo local x = 2 end\nreturn x",
        &[1],
    );
}

#[test]
fn generic_for_over_ipairs() {
    check_ints(
        "local t = {10, 20, 30}\nlocal s = 0\nfor i, v in ipairs(t) do s = s + i * v end\nreturn s",
        &[140],
    );
}

#[test]
fn generic_for_break() {
    check_ints(
        "local t = {1, 2, 3, 4}\nlocal s = 0\nfor _, v in ipairs(t) do if v == 3 then break end s = s + v end\nreturn s",
        &[3],
    );
}
