//! Function and class templates, arrays and references.

use pretty_assertions::assert_eq;

use super::program::{
    call, call_stmt, class, ex, expr, for_, func, ident, if_, index, int, let_, main_fn, op, p,
    param, ret, ret_ex, run, run_err, s, stmt, template, tparam, ty, ty_of, var, vparam, Ast,
};
use crate::EvalErrorKind;

fn int_array(len: i64) -> Ast {
    ty_of("Array", vec![ty("Int32"), int(len)])
}

/// `name[i] = value;`
fn store(name: &str, i: i64, value: i64) -> Ast {
    stmt(expr(vec![ident(name), index(int(i)), op("="), int(value)]))
}

#[test]
fn type_parameters_are_deduced_from_arguments() {
    let max = template(
        func(
            "max",
            vec![p("a", "T"), p("b", "T")],
            Some(ty("T")),
            vec![if_(ex("a > b"), vec![ret_ex("a")], None), ret_ex("b")],
        ),
        vec![tparam("T")],
    );
    let out = run(vec![
        max,
        main_fn(vec![
            call_stmt(
                "println",
                vec![expr(vec![ident("max"), call(vec![ex("1.5"), ex("2.5")])])],
            ),
            ret(Some(expr(vec![ident("max"), call(vec![ex("13"), ex("4")])]))),
        ]),
    ]);
    assert_eq!(out.code, 13);
    assert_eq!(out.output, "2.5\n");
}

#[test]
fn conflicting_deductions_do_not_match() {
    let same = template(
        func("same", vec![p("a", "T"), p("b", "T")], None, vec![]),
        vec![tparam("T")],
    );
    let err = run_err(vec![
        same,
        main_fn(vec![
            call_stmt("same", vec![ex("1"), ex("true")]),
            ret_ex("0"),
        ]),
    ]);
    assert!(matches!(err.kind, EvalErrorKind::NoMatchingOverload { .. }));
}

#[test]
fn explicit_arguments_instantiate_without_deduction() {
    let zero = template(
        func(
            "zero",
            vec![],
            Some(ty("T")),
            vec![var("z", Some(ty("T")), None), ret_ex("z")],
        ),
        vec![tparam("T")],
    );
    let out = run(vec![
        zero,
        main_fn(vec![ret(Some(expr(vec![
            ty_of("zero", vec![ty("Int32")]),
            call(vec![]),
            op("+"),
            int(7),
        ])))]),
    ]);
    assert_eq!(out.code, 7);
}

#[test]
fn class_templates_instantiate_per_argument() {
    let boxed = template(
        class(
            "Box",
            vec![
                var("value", Some(ty("T")), None),
                func("get", vec![], Some(ty("T")), vec![ret_ex("value")]),
            ],
        ),
        vec![tparam("T")],
    );
    let out = run(vec![
        boxed,
        main_fn(vec![
            var("b", Some(ty_of("Box", vec![ty("Int32")])), None),
            s("b . value = 42"),
            var("f", Some(ty_of("Box", vec![ty("Float64")])), None),
            s("f . value = 0.5"),
            call_stmt("println", vec![ex("f . value")]),
            ret(Some(expr(vec![ident("b"), op("."), ident("get"), call(vec![])]))),
        ]),
    ]);
    assert_eq!(out.code, 42);
    assert_eq!(out.output, "0.5\n");
}

#[test]
fn value_parameters_bind_constants() {
    let times = template(
        func("times", vec![p("x", "Int32")], Some(ty("Int32")), vec![ret_ex("x * N")]),
        vec![vparam("N", "Int32")],
    );
    let out = run(vec![
        times,
        main_fn(vec![ret(Some(expr(vec![
            ty_of("times", vec![int(3)]),
            call(vec![ex("5")]),
        ])))]),
    ]);
    assert_eq!(out.code, 15);
}

#[test]
fn field_initializers_see_template_parameters() {
    let holder = template(
        class(
            "Holder",
            vec![var("n", Some(ty("Int32")), Some(ex("N + 1")))],
        ),
        vec![vparam("N", "Int32")],
    );
    let out = run(vec![
        holder,
        main_fn(vec![
            var("h", Some(ty_of("Holder", vec![int(7)])), None),
            ret_ex("h . n"),
        ]),
    ]);
    assert_eq!(out.code, 8);
}

#[test]
fn arrays_index_and_report_their_size() {
    let out = run(vec![main_fn(vec![
        var("a", Some(int_array(3)), None),
        store("a", 0, 4),
        store("a", 1, 5),
        store("a", 2, 6),
        let_("sum", "0"),
        for_(
            let_("i", "0"),
            expr(vec![ident("i"), op("<"), ident("a"), op("."), ident("size"), call(vec![])]),
            ex("i += 1"),
            vec![stmt(expr(vec![ident("sum"), op("+="), ident("a"), index(ident("i"))]))],
        ),
        call_stmt("println", vec![ex("a")]),
        ret_ex("sum"),
    ])]);
    assert_eq!(out.code, 15);
    assert_eq!(out.output, "[4, 5, 6]\n");
}

#[test]
fn array_index_out_of_bounds_fails() {
    let err = run_err(vec![main_fn(vec![
        var("a", Some(int_array(2)), None),
        store("a", 2, 1),
        ret_ex("0"),
    ])]);
    assert!(matches!(err.kind, EvalErrorKind::InvalidMemoryAccess { .. }));
}

#[test]
fn reference_parameters_deduce_their_target() {
    let inc = template(
        func(
            "inc",
            vec![param("r", ty_of("Ref", vec![ty("T")]))],
            None,
            vec![s("r = r + 1")],
        ),
        vec![tparam("T")],
    );
    let out = run(vec![
        inc,
        main_fn(vec![
            let_("v", "4"),
            call_stmt("inc", vec![ex("v")]),
            ret_ex("v"),
        ]),
    ]);
    assert_eq!(out.code, 5);
}
