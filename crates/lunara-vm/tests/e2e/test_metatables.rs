use super::helpers::*;

#[test]
fn index_table_fallback() {
    check_ints(
        "local defaults = {color = 7}\nlocal t = setmetatable({}, {__index = defaults})\nreturn t.color",
        &[7],
    );
}

#[test]
fn index_function_fallback() {
    check_ints(
        "local t = setmetatable({}, {__index = function(t, k) return 100 end})\nreturn t.anything",
        &[100],
    );
}

#[test]
fn index_chain_through_tables() {
    check_ints(
        "local top = {x = 1}\nlocal mid = setmetatable({}, {__index = top})\nlocal bot = setmetatable({}, {__index = mid})\nreturn bot.x",
        &[1],
    );
}

#[test]
fn own_keys_shadow_the_index_metamethod() {
    check_ints(
        "local t = setmetatable({x = 1}, {__index = function() return 99 end})\nreturn t.x",
        &[1],
    );
}

#[test]
fn newindex_function_intercepts_fresh_keys() {
    check_ints(
        "local log = {}\nlocal t = setmetatable({}, {__newindex = function(t, k, v) log[#log + 1] = v end})\nt.a = 10\nt.b = 20\nreturn #log, log[1], log[2], t.a == nil and 1 or 0",
        &[2, 10, 20, 1],
    );
}

#[test]
fn newindex_table_redirects_writes() {
    check_ints(
        "local store = {}\nlocal t = setmetatable({}, {__newindex = store})\nt.x = 5\nreturn store.x, t.x == nil and 1 or 0",
        &[5, 1],
    );
}

#[test]
fn newindex_skips_existing_keys() {
    check_ints(
        "local hits = 0\nlocal t = setmetatable({x = 1}, {__newindex = function() hits = hits + 1 end})\nt.x = 2\nreturn t.x, hits",
        &[2, 0],
    );
}

#[test]
fn arithmetic_metamethods() {
    check_ints(
        "local mt = {__add = function(a, b) return a.v + b.v end}\nlocal a = setmetatable({v = 30}, mt)\nlocal b = setmetatable({v = 12}, mt)\nreturn a + b",
        &[42],
    );
}

#[test]
fn arithmetic_metamethod_on_right_operand() {
    check_ints(
        "local mt = {__mul = function(a, b) return 77 end}\nlocal t = setmetatable({}, mt)\nreturn 3 * t",
        &[77],
    );
}

#[test]
fn unary_minus_metamethod() {
    check_ints(
        "local t = setmetatable({v = 5}, {__unm = function(x) return -x.v end})\nreturn -t",
        &[-5],
    );
}

#[test]
fn len_metamethod() {
    check_ints(
        "local t = setmetatable({1, 2, 3}, {__len = function() return 42 end})\nreturn #t",
        &[42],
    );
}

#[test]
fn eq_metamethod_fires_for_table_pairs() {
    let (r, _) = run(
        "local mt = {__eq = function(a, b) return a.id == b.id end}\nlocal a = setmetatable({id = 1}, mt)\nlocal b = setmetatable({id = 1}, mt)\nlocal c = setmetatable({id = 2}, mt)\nreturn a == b, a == c",
    );
    assert_bool(&r, 0, true);
    assert_bool(&r, 1, false);
}

#[test]
fn lt_and_le_metamethods() {
    let (r, _) = run(
        "local mt = {__lt = function(a, b) return a.v < b.v end, __le = function(a, b) return a.v <= b.v end}\nlocal a = setmetatable({v = 1}, mt)\nlocal b = setmetatable({v = 2}, mt)\nreturn a < b, b <= a",
    );
    assert_bool(&r, 0, true);
    assert_bool(&r, 1, false);
}

#[test]
fn concat_metamethod() {
    let (r, vm) = run(
        "local t = setmetatable({}, {__concat = function(a, b) return 'glued' end})\nreturn t .. 'x', 'x' .. t",
    );
    assert_str(&r, 0, "glued", &vm);
    assert_str(&r, 1, "glued", &vm);
}

#[test]
fn spec_concat_one_lookup_per_pair() {
    // Right-associative folding: each pair consults __concat once.
    check_ints(
        "local n = 0\nlocal mt\nmt = {__concat = function(a, b) n = n + 1 return setmetatable({}, mt) end}\nlocal t = setmetatable({}, mt)\nlocal _ = t .. t .. t\nreturn n",
        &[2],
    );
}

#[test]
fn call_metamethod() {
    check_ints(
        "local t = setmetatable({}, {__call = function(self, a, b) return a + b end})\nreturn t(20, 22)",
        &[42],
    );
}

#[test]
fn getmetatable_returns_the_table() {
    let (r, _) = run(
        "local mt = {}\nlocal t = setmetatable({}, mt)\nreturn getmetatable(t) == mt, getmetatable({}) == nil",
    );
    assert_bool(&r, 0, true);
    assert_bool(&r, 1, true);
}

#[test]
fn setmetatable_returns_its_argument() {
    check_ints("local t = setmetatable({x = 3}, {})\nreturn t.x", &[3]);
}

#[test]
fn clearing_a_metatable() {
    let (r, _) = run(
        "local t = setmetatable({}, {__index = function() return 1 end})\nsetmetatable(t, nil)\nreturn t.x == nil, getmetatable(t) == nil",
    );
    assert_bool(&r, 0, true);
    assert_bool(&r, 1, true);
}

#[test]
fn rawget_semantics_through_shadowing() {
    // A raw read is observable when __index would have fired.
    check_ints(
        "local t = setmetatable({}, {__index = function() return 9 end})\nlocal v = t.missing\nt.missing = 1\nreturn v, t.missing",
        &[9, 1],
    );
}

#[test]
fn metamethod_errors_propagate() {
    let msg = run_err(
        "local t = setmetatable({}, {__index = function() error('inner boom') end})\nreturn t.x",
    );
    assert!(msg.contains("inner boom"), "got: {msg}");
}
