use super::helpers::*;

#[test]
fn constructor_and_indexing() {
    check_ints("local t = {10, 20, 30}\nreturn t[1], t[2], t[3]", &[10, 20, 30]);
}

#[test]
fn named_and_keyed_fields() {
    check_ints(
        "local t = {a = 1, b = 2, [10] = 3}\nreturn t.a, t.b, t[10]",
        &[1, 2, 3],
    );
}

#[test]
fn mixed_constructor() {
    check_ints(
        "local t = {5, x = 6, 7, [100] = 8}\nreturn t[1], t[2], t.x, t[100]",
        &[5, 7, 6, 8],
    );
}

#[test]
fn spec_ipairs_scenario() {
    // t={"a"}; t[2],t[3]="b","c"; ipairs walks 1..3 in order.
    let (r, vm) = run(
        "local t = {'a'}\nt[2], t[3] = 'b', 'c'\nlocal ks, vs = 0, ''\nfor i, v in ipairs(t) do ks = ks + i vs = vs .. v end\nreturn ks, vs",
    );
    assert_int(&r, 0, 6);
    assert_str(&r, 1, "abc", &vm);
}

#[test]
fn spec_pairs_sums_all_values() {
    // Iteration order is unspecified; the sum is deterministic.
    check_ints(
        "local t = {a = 1, b = 2, c = 3}\nt['b'] = 666\nlocal s = 0\nfor k, v in pairs(t) do s = s + v end\nreturn s",
        &[670],
    );
}

#[test]
fn length_of_sequences() {
    check_ints("return #{1, 2, 3}, #{}", &[3, 0]);
    check_ints("local t = {1, 2, 3}\nt[4] = 4\nreturn #t", &[4]);
}

#[test]
fn nil_assignment_shrinks_border() {
    check_ints("local t = {1, 2, 3}\nt[3] = nil\nreturn #t", &[2]);
}

#[test]
fn float_keys_alias_integer_keys() {
    check_ints("local t = {}\nt[2.0] = 42\nreturn t[2]", &[42]);
    check_ints("local t = {}\nt[3] = 7\nreturn t[3.0]", &[7]);
}

#[test]
fn fractional_keys_are_distinct() {
    check_ints("local t = {}\nt[1.5] = 9\nreturn t[1.5], t[1] == nil and 1 or 0", &[9, 1]);
}

#[test]
fn nil_key_raises() {
    let msg = run_err("local t = {}\nlocal k\nt[k] = 1");
    assert!(msg.contains("table index is nil"), "got: {msg}");
}

#[test]
fn nan_key_raises() {
    let msg = run_err("local t = {}\nt[0/0] = 1");
    assert!(msg.contains("table index is NaN"), "got: {msg}");
}

#[test]
fn reading_missing_keys_gives_nil() {
    let (r, _) = run("local t = {}\nreturn t.missing, t[99]");
    assert_nil(&r, 0);
    assert_nil(&r, 1);
}

#[test]
fn indexing_nil_raises() {
    let msg = run_err("local t\nreturn t.field");
    assert!(msg.contains("attempt to index a nil value"), "got: {msg}");
}

#[test]
fn indexing_number_raises() {
    let msg = run_err("local n = 5\nreturn n.x");
    assert!(msg.contains("attempt to index a number value"), "got: {msg}");
}

#[test]
fn nested_tables() {
    check_ints(
        "local t = {inner = {value = 42}}\nreturn t.inner.value",
        &[42],
    );
}

#[test]
fn table_identity() {
    let (r, _) = run("local a = {}\nlocal b = {}\nlocal c = a\nreturn a == b, a == c");
    assert_bool(&r, 0, false);
    assert_bool(&r, 1, true);
}

#[test]
fn next_walks_everything_once() {
    check_ints(
        "local t = {10, 20, x = 30}\nlocal count, sum = 0, 0\nlocal k, v = next(t)\nwhile k do count = count + 1 sum = sum + v k, v = next(t, k) end\nreturn count, sum",
        &[3, 60],
    );
}

#[test]
fn delete_during_iteration_is_allowed() {
    // Assigning nil to the current key mid-walk must not break `next`.
    check_ints(
        "local t = {a = 1, b = 2, c = 3}\nlocal count = 0\nfor k in pairs(t) do t[k] = nil count = count + 1 end\nreturn count",
        &[3],
    );
}

#[test]
fn constructor_with_fifty_plus_items() {
    let items: Vec<String> = (1..=75).map(|i| i.to_string()).collect();
    let src = format!(
        "local t = {{{}}}\nlocal s = 0\nfor _, v in ipairs(t) do s = s + v end\nreturn #t, s",
        items.join(", ")
    );
    check_ints(&src, &[75, (1..=75).sum()]);
}

#[test]
fn constructor_expands_trailing_call() {
    check_ints(
        "local function three() return 7, 8, 9 end\nlocal t = {1, three()}\nreturn #t, t[2], t[4]",
        &[4, 7, 9],
    );
}

#[test]
fn constructor_truncates_inner_call() {
    check_ints(
        "local function three() return 7, 8, 9 end\nlocal t = {three(), 1}\nreturn #t, t[1], t[2]",
        &[2, 7, 1],
    );
}

#[test]
fn sequence_grows_through_gap_fill() {
    check_ints(
        "local t = {}\nt[2] = 2 t[3] = 3\nlocal before = #t\nt[1] = 1\nreturn before, #t",
        &[0, 3],
    );
}
