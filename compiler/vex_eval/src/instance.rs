//! Host entry point: load the entry module, run its entry function and
//! turn the outcome into an exit code.

use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Once;

use tracing::debug;
use vex_ir::{NodeId, SharedInterner, SyntaxTree};

use crate::errors::{unresolved_identifier, EvalError, EvalResult};
use crate::interpreter::{DEFAULT_MAX_CALL_DEPTH, DEFAULT_STACK_CAPACITY};
use crate::memory::Value;
use crate::print_handler::{stdout_handler, SharedPrintHandler};
use crate::scope::{resolve, CallSite};
use crate::{Interpreter, InterpreterBuilder, ModuleParser};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Safe to call multiple times. Enable with `RUST_LOG=vex_eval=debug` or
/// `RUST_LOG=vex_eval=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
                .with(filter)
                .init();
        }
    });
}

/// What to run and with which limits.
#[derive(Clone, Debug)]
pub struct RunSettings {
    /// Entry module, resolved like an import from the working directory.
    pub entry: PathBuf,
    /// Function called after the entry module's top level ran.
    pub entry_function: String,
    pub search_paths: Vec<PathBuf>,
    pub stack_capacity: usize,
    pub max_call_depth: usize,
}

impl RunSettings {
    pub fn new(entry: impl Into<PathBuf>) -> Self {
        RunSettings {
            entry: entry.into(),
            entry_function: "main".to_owned(),
            search_paths: Vec::new(),
            stack_capacity: DEFAULT_STACK_CAPACITY,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    /// Append the directories listed in `VEX_PATH`.
    #[must_use]
    pub fn with_env(mut self) -> Self {
        if let Some(paths) = std::env::var_os("VEX_PATH") {
            self.search_paths
                .extend(std::env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()));
        }
        self
    }

    #[must_use]
    pub fn entry_function(mut self, name: impl Into<String>) -> Self {
        self.entry_function = name.into();
        self
    }
}

/// One program run.
pub struct Instance {
    settings: RunSettings,
    interpreter: Interpreter,
}

impl Instance {
    pub fn new(settings: RunSettings, parser: impl ModuleParser + 'static) -> Self {
        Self::with_print_handler(settings, parser, stdout_handler())
    }

    pub fn with_print_handler(
        settings: RunSettings,
        parser: impl ModuleParser + 'static,
        print_handler: SharedPrintHandler,
    ) -> Self {
        let interpreter = InterpreterBuilder::new()
            .interner(SharedInterner::new())
            .print_handler(print_handler)
            .module_parser(parser)
            .search_paths(settings.search_paths.iter().cloned())
            .stack_capacity(settings.stack_capacity)
            .max_call_depth(settings.max_call_depth)
            .build();
        Instance {
            settings,
            interpreter,
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Run the program and return its exit code.
    ///
    /// Errors are reported to stderr and exit with 1.
    pub fn run(&mut self) -> i32 {
        init_tracing();
        match self.try_run() {
            Ok(code) => code,
            Err(error) => {
                self.interpreter.unwind_to(0);
                eprintln!("{}", self.report(&error));
                1
            }
        }
    }

    /// Run the program, returning the exit code or the first error.
    ///
    /// The exit code is the entry function's integer result, or 0 when it
    /// returns nothing.
    #[tracing::instrument(level = "debug", skip_all, fields(entry = %self.settings.entry.display()))]
    pub fn try_run(&mut self) -> EvalResult<i32> {
        let request = self.settings.entry.to_string_lossy().into_owned();
        let path = self.interpreter.find_module_path(&request, None)?;
        let tree = self.interpreter.parse_module(&path)?;
        let module = self.interpreter.evaluate_module(path, tree)?;

        let scope = self.interpreter.module(module).scope;
        let name = self.interpreter.intern(&self.settings.entry_function);
        let candidates = self.interpreter.scopes.get(scope).find_function(name).to_vec();
        let entry = resolve(
            &self.interpreter.types,
            &self.interpreter.functions,
            &candidates,
            CallSite::free(&[]),
        )
        .ok_or_else(|| {
            unresolved_identifier(self.settings.entry_function.as_str())
                .with_hint("the entry module must declare it without parameters")
        })?;

        let result = self.interpreter.invoke(entry, &[])?;
        let code = match result {
            Some(value) => self.exit_code(value)?,
            None => 0,
        };
        self.interpreter.shutdown()?;
        debug!(code, "program finished");
        Ok(code)
    }

    fn exit_code(&self, value: Value) -> EvalResult<i32> {
        let value = self.interpreter.strip_ref(value)?;
        match self.interpreter.scalar_kind(value.ty) {
            Some(kind) if kind.is_integer() => {
                Ok(self.interpreter.read_scalar(value)?.as_i64() as i32)
            }
            _ => Ok(0),
        }
    }

    /// Evaluate one node of an already parsed tree in the current context.
    pub fn evaluate(&mut self, tree: &Rc<SyntaxTree>, node: NodeId) -> EvalResult<Option<Value>> {
        self.interpreter.evaluate(tree, node)
    }

    /// Pop every remaining frame, running destructors.
    pub fn shutdown(&mut self) -> EvalResult<()> {
        self.interpreter.shutdown()
    }

    /// Render `error` for the user: the message, the file and line it was
    /// raised at (or the last line executed) and the hint.
    pub fn report(&self, error: &EvalError) -> String {
        let mut out = format!("error: {}", error.kind);
        let (pos, file) = match error.pos {
            Some(pos) => (pos, error.file.as_deref()),
            None => (self.interpreter.last_pos(), None),
        };
        let file = file.unwrap_or(self.settings.entry.as_path());
        if !pos.is_dummy() {
            out.push_str(&format!("\n  --> {}:{pos}", file.display()));
        }
        if let Some(hint) = &error.hint {
            out.push_str(&format!("\n  = help: {hint}"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn settings_default_to_main() {
        let settings = RunSettings::new("app.vx");
        assert_eq!(settings.entry_function, "main");
        assert_eq!(settings.stack_capacity, DEFAULT_STACK_CAPACITY);
        assert!(settings.search_paths.is_empty());
    }

    #[test]
    fn entry_function_can_be_renamed() {
        let settings = RunSettings::new("app.vx").entry_function("start");
        assert_eq!(settings.entry_function, "start");
    }
}
