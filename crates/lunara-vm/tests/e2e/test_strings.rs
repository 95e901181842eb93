use super::helpers::*;

#[test]
fn concat_basics() {
    let (r, vm) = run("return 'a' .. 'b' .. 'c'");
    assert_str(&r, 0, "abc", &vm);
}

#[test]
fn concat_coerces_numbers() {
    let (r, vm) = run("return 'n=' .. 42, 1 .. 2");
    assert_str(&r, 0, "n=42", &vm);
    assert_str(&r, 1, "12", &vm);
}

#[test]
fn concat_float_formatting() {
    // Floats concatenate in their canonical printed form.
    let (r, vm) = run("return 'v=' .. 2^10, 'h=' .. 0.5");
    assert_str(&r, 0, "v=1024.0", &vm);
    assert_str(&r, 1, "h=0.5", &vm);
}

#[test]
fn concat_nil_raises() {
    let msg = run_err("return 'x' .. nil");
    assert!(msg.contains("attempt to concatenate a nil value"), "got: {msg}");
}

#[test]
fn concat_boolean_raises() {
    let msg = run_err("return 'x' .. true");
    assert!(
        msg.contains("attempt to concatenate a boolean value"),
        "got: {msg}"
    );
}

#[test]
fn string_length() {
    check_ints("return #'hello', #''", &[5, 0]);
}

#[test]
fn string_equality_is_content_based() {
    let (r, _) = run("local a = 'he' .. 'llo'\nreturn a == 'hello', a ~= 'world'");
    assert_bool(&r, 0, true);
    assert_bool(&r, 1, true);
}

#[test]
fn long_strings_compare_by_content() {
    // Long strings are not interned; equality still holds.
    let piece = "x".repeat(30);
    let src = format!("local a = '{piece}' .. '{piece}'\nlocal b = '{piece}' .. '{piece}'\nreturn a == b, #a");
    let (r, _) = run(&src);
    assert_bool(&r, 0, true);
    assert_int(&r, 1, 60);
}

#[test]
fn string_ordering() {
    let (r, _) = run("return 'abc' < 'abd', 'abc' < 'ab', 'Z' < 'a', 'abc' <= 'abc'");
    assert_bool(&r, 0, true);
    assert_bool(&r, 1, false);
    assert_bool(&r, 2, true); // byte order: 'Z' (90) < 'a' (97)
    assert_bool(&r, 3, true);
}

#[test]
fn escapes_in_source_strings() {
    let (r, vm) = run(r#"return 'tab\there', "quote\"inside", '\65\66\67'"#);
    assert_str(&r, 0, "tab\there", &vm);
    assert_str(&r, 1, "quote\"inside", &vm);
    assert_str(&r, 2, "ABC", &vm);
}

#[test]
fn long_bracket_strings() {
    let (r, vm) = run("return [[line1\nline2]], [==[with ]] inside]==]");
    assert_str(&r, 0, "line1\nline2", &vm);
    assert_str(&r, 1, "with ]] inside", &vm);
}

#[test]
fn string_number_equality_is_false() {
    let (r, _) = run("return '1' == 1");
    assert_bool(&r, 0, false);
}

#[test]
fn concat_chain_is_right_associative() {
    // Observable through metamethod call order elsewhere; here through
    // result shape with mixed numbers.
    let (r, vm) = run("return 1 .. 2 .. 3 .. 4");
    assert_str(&r, 0, "1234", &vm);
}
