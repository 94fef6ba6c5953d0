//! Classes, unions, enums, references and object lifetimes.

use pretty_assertions::assert_eq;

use super::program::{
    call, call_stmt, class, enumeration, ex, expr, func, ident, let_, main_fn, op, p, param, ret,
    ret_ex, run, run_err, s, string, stmt, ty, ty_of, union, var, Ast,
};
use crate::EvalErrorKind;

fn field(name: &str, type_name: &str) -> Ast {
    var(name, Some(ty(type_name)), None)
}

fn point() -> Ast {
    class("Point", vec![field("x", "Int32"), field("y", "Int32")])
}

/// `receiver.method(args...)` as an expression.
fn method_call(receiver: &str, method: &str, args: Vec<Ast>) -> Ast {
    expr(vec![ident(receiver), op("."), ident(method), call(args)])
}

/// A class whose destructor prints its `id`.
fn noisy() -> Ast {
    class(
        "Noisy",
        vec![
            field("id", "Int32"),
            func(
                "destruct",
                vec![],
                None,
                vec![call_stmt("println", vec![string("drop "), ex("id")])],
            ),
        ],
    )
}

#[test]
fn copies_are_independent_of_their_source() {
    let out = run(vec![
        point(),
        main_fn(vec![
            var("a", Some(ty("Point")), None),
            s("a . x = 3"),
            s("a . y = 4"),
            let_("b", "a"),
            s("b . x = 30"),
            ret_ex("a . x + b . x + b . y"),
        ]),
    ]);
    assert_eq!(out.code, 37);
}

#[test]
fn constructors_see_initialized_fields() {
    let counter = class(
        "Counter",
        vec![
            var("count", Some(ty("Int32")), Some(ex("10"))),
            func("construct", vec![p("start", "Int32")], None, vec![s("count += start")]),
            func(
                "bump",
                vec![],
                Some(ty("Int32")),
                vec![s("count += 1"), ret_ex("count")],
            ),
        ],
    );
    let out = run(vec![
        counter,
        main_fn(vec![
            var("c", None, Some(expr(vec![ident("Counter"), call(vec![ex("5")])]))),
            stmt(method_call("c", "bump", vec![])),
            ret(Some(method_call("c", "bump", vec![]))),
        ]),
    ]);
    assert_eq!(out.code, 17);
}

#[test]
fn default_construction_without_arguments() {
    let out = run(vec![
        class("Cell", vec![var("v", Some(ty("Int32")), Some(ex("7")))]),
        main_fn(vec![
            var("c", None, Some(expr(vec![ident("Cell"), call(vec![])]))),
            ret_ex("c . v"),
        ]),
    ]);
    assert_eq!(out.code, 7);
}

#[test]
fn field_initializers_do_not_see_caller_locals() {
    let err = run_err(vec![
        class("Leaky", vec![var("v", Some(ty("Int32")), Some(ex("local")))]),
        main_fn(vec![
            let_("local", "3"),
            var("l", Some(ty("Leaky")), None),
            ret_ex("l . v"),
        ]),
    ]);
    assert_eq!(
        err.kind,
        EvalErrorKind::UnresolvedIdentifier {
            name: "local".to_owned()
        }
    );
}

#[test]
fn field_initializers_call_module_functions() {
    let out = run(vec![
        func("seed", vec![], Some(ty("Int32")), vec![ret_ex("40")]),
        class(
            "Seeded",
            vec![var(
                "v",
                Some(ty("Int32")),
                Some(expr(vec![ident("seed"), call(vec![]), op("+"), ex("2")])),
            )],
        ),
        main_fn(vec![var("s", Some(ty("Seeded")), None), ret_ex("s . v")]),
    ]);
    assert_eq!(out.code, 42);
}

#[test]
fn destructors_run_in_reverse_order() {
    let out = run(vec![
        noisy(),
        main_fn(vec![
            var("a", Some(ty("Noisy")), None),
            s("a . id = 1"),
            var("b", Some(ty("Noisy")), None),
            s("b . id = 2"),
            ret_ex("0"),
        ]),
    ]);
    assert_eq!(out.output, "drop 2\ndrop 1\n");
}

#[test]
fn block_locals_die_at_the_end_of_the_block() {
    let out = run(vec![
        noisy(),
        main_fn(vec![
            super::program::block(vec![
                var("inner", Some(ty("Noisy")), None),
                s("inner . id = 1"),
            ]),
            call_stmt("println", vec![string("after")]),
            ret_ex("0"),
        ]),
    ]);
    assert_eq!(out.output, "drop 1\nafter\n");
}

#[test]
fn aggregates_return_through_the_caller_slot() {
    let make = func(
        "make",
        vec![p("a", "Int32"), p("b", "Int32")],
        Some(ty("Point")),
        vec![
            var("r", Some(ty("Point")), None),
            s("r . x = a"),
            s("r . y = b"),
            ret_ex("r"),
        ],
    );
    let out = run(vec![
        point(),
        make,
        main_fn(vec![
            var(
                "q",
                None,
                Some(expr(vec![ident("make"), call(vec![ex("8"), ex("5")])])),
            ),
            ret_ex("q . x * 100 + q . y"),
        ]),
    ]);
    assert_eq!(out.code, 805);
}

#[test]
fn member_access_looks_through_references() {
    let getx = func(
        "getx",
        vec![param("r", ty_of("Ref", vec![ty("Point")]))],
        Some(ty("Int32")),
        vec![ret_ex("r . x")],
    );
    let out = run(vec![
        point(),
        getx,
        main_fn(vec![
            var("a", Some(ty("Point")), None),
            s("a . x = 7"),
            ret(Some(expr(vec![ident("getx"), call(vec![ex("a")])]))),
        ]),
    ]);
    assert_eq!(out.code, 7);
}

#[test]
fn assignment_through_a_reference_writes_the_target() {
    let set = func(
        "set",
        vec![param("r", ty_of("Ref", vec![ty("Int32")]))],
        None,
        vec![s("r = 9")],
    );
    let out = run(vec![
        set,
        main_fn(vec![
            let_("v", "1"),
            call_stmt("set", vec![ex("v")]),
            ret_ex("v"),
        ]),
    ]);
    assert_eq!(out.code, 9);
}

#[test]
fn union_fields_share_storage() {
    let out = run(vec![
        union("Bits", vec![field("n", "Int32"), field("low", "UInt8")]),
        main_fn(vec![
            var("u", Some(ty("Bits")), None),
            s("u . n = 65"),
            call_stmt("println", vec![ex("u . low")]),
            ret_ex("0"),
        ]),
    ]);
    assert_eq!(out.output, "65\n");
}

#[test]
fn enums_count_up_from_explicit_values() {
    let color = enumeration(
        "Color",
        vec![("Red", None), ("Green", Some(ex("5"))), ("Blue", None)],
    );
    let out = run(vec![
        color,
        main_fn(vec![
            let_("c", "Color :: Blue"),
            call_stmt("println", vec![ex("c")]),
            call_stmt("println", vec![ex("c == Color :: Blue")]),
            call_stmt("println", vec![ex("c == Color :: Red")]),
            ret_ex("0"),
        ]),
    ]);
    assert_eq!(out.output, "Blue\ntrue\nfalse\n");
}

#[test]
fn free_operator_overloads_apply_to_classes() {
    let plus = func(
        "operator+",
        vec![p("a", "V"), p("b", "V")],
        Some(ty("V")),
        vec![
            var("r", Some(ty("V")), None),
            s("r . x = a . x + b . x"),
            ret_ex("r"),
        ],
    );
    let out = run(vec![
        class("V", vec![field("x", "Int32")]),
        plus,
        main_fn(vec![
            var("a", Some(ty("V")), None),
            s("a . x = 3"),
            var("b", Some(ty("V")), None),
            s("b . x = 4"),
            let_("c", "a + b"),
            ret_ex("c . x"),
        ]),
    ]);
    assert_eq!(out.code, 7);
}

#[test]
fn methods_call_siblings_through_implicit_self() {
    let acc = class(
        "Acc",
        vec![
            field("total", "Int32"),
            func("add", vec![p("n", "Int32")], None, vec![s("total += n")]),
            func(
                "twice",
                vec![p("n", "Int32")],
                None,
                vec![
                    stmt(expr(vec![ident("add"), call(vec![ex("n")])])),
                    stmt(expr(vec![ident("add"), call(vec![ex("n")])])),
                ],
            ),
        ],
    );
    let out = run(vec![
        acc,
        main_fn(vec![
            var("a", Some(ty("Acc")), None),
            stmt(method_call("a", "twice", vec![ex("4")])),
            ret_ex("a . total"),
        ]),
    ]);
    assert_eq!(out.code, 8);
}

#[test]
fn globals_are_destroyed_at_shutdown() {
    let out = run(vec![
        noisy(),
        var("g", Some(ty("Noisy")), None),
        main_fn(vec![call_stmt("println", vec![string("main")]), ret_ex("0")]),
    ]);
    assert_eq!(out.output, "main\ndrop 0\n");
}
