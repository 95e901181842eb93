use super::helpers::*;

#[test]
fn spec_print_expression_values() {
    // The four values behind `print(1+2, 10//3, 10%3, 2^10)`.
    let (r, _) = run("return 1+2, 10//3, 10%3, 2^10");
    assert_int(&r, 0, 3);
    assert_int(&r, 1, 3);
    assert_int(&r, 2, 1);
    assert_float(&r, 3, 1024.0);
}

#[test]
fn integer_arithmetic_stays_integer() {
    check_ints("return 1 + 2, 7 - 3, 6 * 7, 7 // 2, 7 % 3", &[3, 4, 42, 3, 1]);
}

#[test]
fn division_produces_floats() {
    let (r, _) = run("return 8 / 2, 1 / 4");
    assert_float(&r, 0, 4.0);
    assert_float(&r, 1, 0.25);
}

#[test]
fn floor_division_with_negatives() {
    check_ints("return -7 // 2, 7 // -2, -7 // -2", &[-4, -4, 3]);
    check_ints("return -7 % 2, 7 % -2", &[1, -1]);
}

#[test]
fn mixed_arithmetic_promotes() {
    let (r, _) = run("return 1 + 0.5, 2 * 1.5");
    assert_float(&r, 0, 1.5);
    assert_float(&r, 1, 3.0);
}

#[test]
fn float_floor_division() {
    let (r, _) = run("return 7.0 // 2.0, 7.5 // 2");
    assert_float(&r, 0, 3.0);
    assert_float(&r, 1, 3.0);
}

#[test]
fn integer_overflow_wraps_around() {
    check_ints(
        "local max = 9223372036854775807\nreturn max + 1 == -9223372036854775808 and 1 or 0",
        &[1],
    );
}

#[test]
fn bitwise_operators() {
    check_ints(
        "return 6 & 3, 6 | 3, 6 ~ 3, 1 << 4, 256 >> 4, ~0",
        &[2, 7, 5, 16, 16, -1],
    );
}

#[test]
fn shift_by_64_or_more_is_zero() {
    check_ints("return 1 << 64, 1 >> 64, 1 << 100", &[0, 0, 0]);
}

#[test]
fn negative_shift_reverses_direction() {
    check_ints("return 16 << -2, 1 >> -4", &[4, 16]);
}

#[test]
fn unary_minus() {
    check_ints("local x = 5\nreturn -x, -(-x)", &[-5, 5]);
}

#[test]
fn power_is_right_associative_and_float() {
    let (r, _) = run("return 2 ^ 3 ^ 2");
    assert_float(&r, 0, 512.0);
}

#[test]
fn string_coercion_in_arithmetic() {
    check_ints("return '10' + 5, '0x10' + 0", &[15, 16]);
    let (r, _) = run("return '1.5' * 2");
    assert_float(&r, 0, 3.0);
}

#[test]
fn spec_division_by_zero_boundary() {
    // 3//0 raises; 3/0 is inf.
    let msg = run_err("return 3 // 0");
    assert!(msg.contains("n//0"), "got: {msg}");
    let (r, _) = run("return 3 / 0, -3 / 0");
    assert_float(&r, 0, f64::INFINITY);
    assert_float(&r, 1, f64::NEG_INFINITY);
}

#[test]
fn comparisons() {
    let (r, _) = run("return 1 < 2, 2 < 1, 1 <= 1, 2 > 1, 2 >= 3, 1 == 1.0, 1 ~= 2");
    assert_bool(&r, 0, true);
    assert_bool(&r, 1, false);
    assert_bool(&r, 2, true);
    assert_bool(&r, 3, true);
    assert_bool(&r, 4, false);
    assert_bool(&r, 5, true);
    assert_bool(&r, 6, true);
}

#[test]
fn comparison_in_control_flow() {
    check_ints(
        "local a, b = 3, 4\nif a < b then return 1 else return 2 end",
        &[1],
    );
}

#[test]
fn nan_comparisons_are_false() {
    let (r, _) = run("local nan = 0/0\nreturn nan == nan, nan < nan, nan <= nan, nan ~= nan");
    assert_bool(&r, 0, false);
    assert_bool(&r, 1, false);
    assert_bool(&r, 2, false);
    assert_bool(&r, 3, true);
}

#[test]
fn arithmetic_on_nil_raises() {
    let msg = run_err("local x\nreturn x + 1");
    assert!(msg.contains("attempt to perform arithmetic"), "got: {msg}");
    assert!(msg.contains("nil"), "got: {msg}");
}

#[test]
fn compare_mixed_types_raises() {
    let msg = run_err("return 1 < 'x'");
    assert!(msg.contains("attempt to compare"), "got: {msg}");
}

#[test]
fn fractional_shift_operand_raises() {
    let msg = run_err("return 1.5 << 1");
    assert!(msg.contains("no integer representation"), "got: {msg}");
}
