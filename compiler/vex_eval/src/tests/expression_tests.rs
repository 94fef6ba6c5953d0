//! Expression reduction order, operators and literals.

use std::rc::Rc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::program::{
    boolean, build, call, call_stmt, ex, expr, func, ident, int, let_, main_fn, op, ret, ret_ex,
    run, run_err, s, string, ty, var,
};
use crate::{EvalErrorKind, Interpreter};

#[test]
fn multiplication_reduces_before_addition() {
    let out = run(vec![main_fn(vec![ret_ex("2 + 3 * 4")])]);
    assert_eq!(out.code, 14);
}

#[test]
fn equal_priorities_reduce_left_to_right() {
    let out = run(vec![main_fn(vec![ret_ex("10 - 3 - 2")])]);
    assert_eq!(out.code, 5);
}

#[test]
fn parenthesized_operand_reduces_first() {
    let grouped = expr(vec![ex("2 + 3"), op("*"), int(4)]);
    let out = run(vec![main_fn(vec![ret(Some(grouped))])]);
    assert_eq!(out.code, 20);
}

#[test]
fn prefix_minus_binds_tighter_than_multiplication() {
    let out = run(vec![main_fn(vec![ret_ex("- 3 * 4 + 20")])]);
    assert_eq!(out.code, 8);
}

#[test]
fn compound_assignment_updates_in_place() {
    let out = run(vec![main_fn(vec![
        let_("x", "5"),
        s("x += 3"),
        s("x *= 2"),
        ret_ex("x"),
    ])]);
    assert_eq!(out.code, 16);
}

#[test]
fn chained_assignment_reduces_leftmost_first() {
    // (a = b) = 3: `a` takes `b`, then 3; `b` keeps its value.
    let out = run(vec![main_fn(vec![
        let_("a", "1"),
        let_("b", "2"),
        s("a = b = 3"),
        ret_ex("a * 10 + b"),
    ])]);
    assert_eq!(out.code, 32);
}

#[test]
fn strings_concatenate_and_print() {
    let out = run(vec![main_fn(vec![
        call_stmt("println", vec![ex(r#""ab" + "cd""#)]),
        ret_ex("0"),
    ])]);
    assert_eq!(out.output, "abcd\n");
}

#[test]
fn comparisons_feed_logical_operators() {
    let out = run(vec![main_fn(vec![
        call_stmt("println", vec![ex("1 < 2 && 3 > 4")]),
        call_stmt("println", vec![ex("1 < 2 || 3 > 4")]),
        ret_ex("0"),
    ])]);
    assert_eq!(out.output, "false\ntrue\n");
}

#[test]
fn short_circuit_skips_an_unreduced_operand() {
    // The right side is never resolved, so the unknown name is harmless.
    let out = run(vec![main_fn(vec![
        let_("a", "false && undefined_name"),
        let_("b", "true || undefined_name"),
        call_stmt("print", vec![ex("a"), string(" "), ex("b")]),
        ret_ex("0"),
    ])]);
    assert_eq!(out.output, "false true");
}

#[test]
fn calls_reduce_before_logical_operators() {
    // `()` binds tighter than `&&`, so the call runs before the
    // short-circuit decision is made.
    let out = run(vec![
        func(
            "noisy",
            vec![],
            Some(ty("Bool")),
            vec![call_stmt("print", vec![string("called")]), ret_ex("true")],
        ),
        main_fn(vec![
            var(
                "x",
                None,
                Some(expr(vec![
                    boolean(false),
                    op("&&"),
                    ident("noisy"),
                    call(vec![]),
                ])),
            ),
            ret_ex("0"),
        ]),
    ]);
    assert_eq!(out.output, "called");
}

#[test]
fn floats_print_without_trailing_zeros() {
    let out = run(vec![main_fn(vec![
        call_stmt("println", vec![ex("1.5 * 2.0")]),
        call_stmt("println", vec![ex("7.0 / 2.0")]),
        ret_ex("0"),
    ])]);
    assert_eq!(out.output, "3\n3.5\n");
}

#[test]
fn wide_literals_are_int64() {
    let sum = expr(vec![int(3_000_000_000), op("+"), ident("Int64"), call(vec![int(1)])]);
    let out = run(vec![main_fn(vec![
        call_stmt("println", vec![sum]),
        ret_ex("0"),
    ])]);
    assert_eq!(out.output, "3000000001\n");
}

#[test]
fn mixed_integer_widths_do_not_convert_implicitly() {
    let err = run_err(vec![main_fn(vec![ret_ex("3000000000 + 1")])]);
    assert!(matches!(err.kind, EvalErrorKind::NoMatchingOverload { .. }));
}

#[test]
fn integer_division_by_zero_fails() {
    let err = run_err(vec![main_fn(vec![let_("zero", "0"), ret_ex("1 / zero")])]);
    assert_eq!(err.kind, EvalErrorKind::DivisionByZero);
}

#[test]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
fn evaluate_returns_the_value_of_an_expression_node() {
    let mut interp = Interpreter::new();
    let tree = Rc::new(build(&[ex("6 * 7")], interp.interner()));
    let node = tree.root().child(0).unwrap().id();
    let value = interp.evaluate(&tree, node).unwrap().unwrap();
    assert_eq!(interp.read_scalar(value).unwrap().as_i64(), 42);
}

#[test]
fn evaluate_discards_frames_on_error() {
    let mut interp = Interpreter::new();
    let tree = Rc::new(build(&[call_stmt("missing", vec![])], interp.interner()));
    let depth = interp.stack().depth();
    let node = tree.root().children().next().map(|n| n.id());
    let result = node.map(|n| interp.evaluate(&tree, n));
    assert!(matches!(result, Some(Err(_))));
    assert_eq!(interp.stack().depth(), depth);
}

proptest! {
    #[test]
    fn integer_arithmetic_matches_host(a in -1000i64..1000, b in -1000i64..1000, c in -1000i64..1000) {
        let body = expr(vec![int(a), op("+"), int(b), op("*"), int(c)]);
        let out = run(vec![main_fn(vec![ret(Some(body))])]);
        prop_assert_eq!(i64::from(out.code), a + b * c);
    }

    #[test]
    fn subtraction_chains_associate_left(a in -1000i64..1000, b in -1000i64..1000, c in -1000i64..1000) {
        let body = expr(vec![int(a), op("-"), int(b), op("-"), int(c)]);
        let out = run(vec![main_fn(vec![ret(Some(body))])]);
        prop_assert_eq!(i64::from(out.code), a - b - c);
    }
}
