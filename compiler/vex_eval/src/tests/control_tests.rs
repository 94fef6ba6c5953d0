//! Blocks, conditionals, loops, jumps and calls.

use pretty_assertions::assert_eq;

use super::program::{
    block, brk, call, call_stmt, cont, ex, expr, for_, func, ident, if_, let_, main_fn, op, p,
    ret, ret_ex, run, run_err, s, string, ty, while_,
};
use crate::interpreter::DEFAULT_MAX_CALL_DEPTH;
use crate::EvalErrorKind;

/// `for (var i = 0; i < n; i += 1) body`.
fn count_to(n: u32, body: Vec<super::program::Ast>) -> super::program::Ast {
    for_(let_("i", "0"), ex(&format!("i < {n}")), ex("i += 1"), body)
}

#[test]
fn while_loop_runs_until_the_condition_fails() {
    let out = run(vec![main_fn(vec![
        let_("i", "0"),
        while_(ex("i < 3"), vec![call_stmt("print", vec![ex("i")]), s("i += 1")]),
        ret_ex("0"),
    ])]);
    assert_eq!(out.output, "012");
}

#[test]
fn for_loop_accumulates() {
    let out = run(vec![main_fn(vec![
        let_("sum", "0"),
        count_to(5, vec![s("sum += i")]),
        ret_ex("sum"),
    ])]);
    assert_eq!(out.code, 10);
}

#[test]
fn continue_still_runs_the_step() {
    let out = run(vec![main_fn(vec![
        count_to(
            5,
            vec![
                if_(ex("i == 2"), vec![cont()], None),
                call_stmt("print", vec![ex("i")]),
            ],
        ),
        ret_ex("0"),
    ])]);
    assert_eq!(out.output, "0134");
}

#[test]
fn break_with_levels_leaves_nested_loops() {
    let out = run(vec![main_fn(vec![
        let_("n", "0"),
        while_(
            ex("true"),
            vec![
                while_(ex("true"), vec![s("n += 1"), brk(2)]),
                s("n += 100"),
            ],
        ),
        ret_ex("n"),
    ])]);
    assert_eq!(out.code, 1);
}

#[test]
fn plain_break_leaves_only_the_inner_loop() {
    let out = run(vec![main_fn(vec![
        let_("n", "0"),
        count_to(
            3,
            vec![while_(ex("true"), vec![s("n += 1"), brk(1)]), s("n += 10")],
        ),
        ret_ex("n"),
    ])]);
    assert_eq!(out.code, 33);
}

#[test]
fn else_if_chains_pick_one_branch() {
    let classify = func(
        "classify",
        vec![p("n", "Int32")],
        None,
        vec![if_(
            ex("n < 0"),
            vec![call_stmt("println", vec![string("neg")])],
            Some(if_(
                ex("n == 0"),
                vec![call_stmt("println", vec![string("zero")])],
                Some(block(vec![call_stmt("println", vec![string("pos")])])),
            )),
        )],
    );
    let out = run(vec![
        classify,
        main_fn(vec![
            call_stmt("classify", vec![ex("- 5")]),
            call_stmt("classify", vec![ex("0")]),
            call_stmt("classify", vec![ex("7")]),
            ret_ex("0"),
        ]),
    ]);
    assert_eq!(out.output, "neg\nzero\npos\n");
}

#[test]
fn return_leaves_nested_loops() {
    let find = func(
        "find",
        vec![],
        Some(ty("Int32")),
        vec![
            count_to(
                10,
                vec![for_(
                    let_("j", "0"),
                    ex("j < 10"),
                    ex("j += 1"),
                    vec![if_(ex("i * j == 12"), vec![ret_ex("i + j")], None)],
                )],
            ),
            ret_ex("0"),
        ],
    );
    let out = run(vec![find, main_fn(vec![ret(Some(expr(vec![ident("find"), call(vec![])])))])]);
    assert_eq!(out.code, 8);
}

#[test]
fn loop_bodies_get_a_fresh_frame_each_iteration() {
    let out = run(vec![main_fn(vec![
        count_to(3, vec![let_("d", "i * 2"), call_stmt("print", vec![ex("d")])]),
        ret_ex("0"),
    ])]);
    assert_eq!(out.output, "024");
}

#[test]
fn recursion_computes_fibonacci() {
    let fib = func(
        "fib",
        vec![p("n", "Int32")],
        Some(ty("Int32")),
        vec![
            if_(ex("n < 2"), vec![ret_ex("n")], None),
            ret(Some(expr(vec![
                ident("fib"),
                call(vec![ex("n - 1")]),
                op("+"),
                ident("fib"),
                call(vec![ex("n - 2")]),
            ]))),
        ],
    );
    let out = run(vec![
        fib,
        main_fn(vec![ret(Some(expr(vec![ident("fib"), call(vec![ex("10")])])))]),
    ]);
    assert_eq!(out.code, 55);
}

#[test]
fn runaway_recursion_hits_the_call_depth_limit() {
    let forever = func(
        "forever",
        vec![],
        Some(ty("Int32")),
        vec![ret(Some(expr(vec![ident("forever"), call(vec![])])))],
    );
    let err = run_err(vec![
        forever,
        main_fn(vec![ret(Some(expr(vec![ident("forever"), call(vec![])])))]),
    ]);
    assert_eq!(
        err.kind,
        EvalErrorKind::CallDepthExceeded {
            limit: DEFAULT_MAX_CALL_DEPTH
        }
    );
}

#[test]
fn void_entry_exits_with_zero() {
    let out = run(vec![func(
        "main",
        vec![],
        None,
        vec![call_stmt("print", vec![string("hi")])],
    )]);
    assert_eq!(out.code, 0);
    assert_eq!(out.output, "hi");
}

#[test]
fn entry_result_is_the_exit_code() {
    let out = run(vec![main_fn(vec![ret_ex("42")])]);
    assert_eq!(out.code, 42);
}

#[test]
fn top_level_statements_run_before_the_entry_function() {
    let out = run(vec![
        call_stmt("print", vec![string("top ")]),
        main_fn(vec![call_stmt("print", vec![string("main")]), ret_ex("0")]),
    ]);
    assert_eq!(out.output, "top main");
}
