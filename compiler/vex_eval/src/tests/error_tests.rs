//! Error kinds, positions and the host report.

use std::path::PathBuf;

use pretty_assertions::assert_eq;

use super::program::{
    call_stmt, class, ex, func, import, main_fn, p, ret_ex, run, run_err, run_modules_err, s,
    string, ty, var, MemoryParser, MAIN,
};
use crate::{buffer_handler, EvalErrorKind, Instance, RunSettings};

#[test]
fn unknown_function_is_unresolved() {
    let err = run_err(vec![main_fn(vec![call_stmt("nothing", vec![]), ret_ex("0")])]);
    assert_eq!(
        err.kind,
        EvalErrorKind::UnresolvedIdentifier {
            name: "nothing".to_owned()
        }
    );
    assert!(err.pos.is_some());
}

#[test]
fn wrong_argument_types_find_no_overload() {
    let err = run_err(vec![
        func("take", vec![p("x", "Int32")], None, vec![]),
        main_fn(vec![call_stmt("take", vec![string("text")]), ret_ex("0")]),
    ]);
    assert!(matches!(err.kind, EvalErrorKind::NoMatchingOverload { .. }));
}

#[test]
fn dangling_operator_is_reported() {
    let err = run_err(vec![main_fn(vec![ret_ex("1 +")])]);
    assert_eq!(
        err.kind,
        EvalErrorKind::InvalidOperatorPosition { op: "+".to_owned() }
    );
}

#[test]
fn initializer_of_the_wrong_type_fails_to_convert() {
    let err = run_err(vec![main_fn(vec![
        var("x", Some(ty("Int32")), Some(ex(r#""s""#))),
        ret_ex("0"),
    ])]);
    assert_eq!(
        err.kind,
        EvalErrorKind::TypeConversionFailure {
            from: "Str".to_owned(),
            to: "Int32".to_owned()
        }
    );
}

#[test]
fn undeclared_type_is_unknown() {
    let err = run_err(vec![main_fn(vec![
        var("x", Some(ty("Missing")), None),
        ret_ex("0"),
    ])]);
    assert_eq!(
        err.kind,
        EvalErrorKind::UnknownType {
            name: "Missing".to_owned()
        }
    );
}

#[test]
fn duplicate_type_names_are_rejected() {
    let err = run_err(vec![class("Twice", vec![]), class("Twice", vec![])]);
    assert!(matches!(err.kind, EvalErrorKind::Redefinition { .. }));
}

#[test]
fn missing_entry_function_is_unresolved() {
    let err = run_err(vec![s("1 + 1")]);
    assert_eq!(
        err.kind,
        EvalErrorKind::UnresolvedIdentifier {
            name: "main".to_owned()
        }
    );
}

#[test]
fn failed_runs_exit_with_one_without_destructors() {
    let noisy = class(
        "Noisy",
        vec![func(
            "destruct",
            vec![],
            None,
            vec![call_stmt("println", vec![string("drop")])],
        )],
    );
    let out = run(vec![
        noisy,
        main_fn(vec![
            var("n", Some(ty("Noisy")), None),
            call_stmt("nothing", vec![]),
            ret_ex("0"),
        ]),
    ]);
    assert_eq!(out.code, 1);
    assert_eq!(out.output, "");
}

#[test]
fn report_names_the_file_and_line() {
    let parser = MemoryParser::new().file(
        MAIN,
        vec![main_fn(vec![call_stmt("nothing", vec![]), ret_ex("0")])],
    );
    let mut instance = Instance::with_print_handler(RunSettings::new(MAIN), parser, buffer_handler());
    let Err(err) = instance.try_run() else {
        panic!("expected the run to fail");
    };
    let report = instance.report(&err);
    assert!(report.starts_with("error: unresolved identifier `nothing`"));
    assert!(report.contains("--> /main.vx:"));
}

/// `main` calls into a module whose function fails.
fn failing_import() -> MemoryParser {
    MemoryParser::new()
        .file(
            "/lib.vx",
            vec![func("boom", vec![], None, vec![call_stmt("nothing", vec![])])],
        )
        .file(
            MAIN,
            vec![
                import("lib"),
                main_fn(vec![call_stmt("boom", vec![]), ret_ex("0")]),
            ],
        )
}

#[test]
fn errors_in_imported_modules_name_that_module() {
    let err = run_modules_err(failing_import());
    assert_eq!(err.file, Some(PathBuf::from("/lib.vx")));

    let mut instance =
        Instance::with_print_handler(RunSettings::new(MAIN), failing_import(), buffer_handler());
    let Err(err) = instance.try_run() else {
        panic!("expected the run to fail");
    };
    assert!(instance.report(&err).contains("--> /lib.vx:"));
}
