//! Vex Eval - the execution engine of the Vex language.
//!
//! A tree-walking interpreter over the [`vex_ir`] syntax tree. There is no
//! garbage collector and no bytecode: values live in one byte arena, are
//! addressed relative to stack frames and die when their frame pops.
//!
//! # Architecture
//!
//! Leaves first:
//! - `types`: closed type model and the canonicalizing `TypeRegistry`
//! - `memory`: the arena `Stack`, frames, `Value`/`FrameBasedValue` handles
//! - `scope`: the scope tree and first-match overload resolution
//! - `function`: native and interpreted callables behind one table
//! - `exec`: statement executors and the priority-reduction expression evaluator
//! - `interpreter`: the execution context tying it all together
//! - `instance`: host entry point (module loading, entry function, exit code)

mod errors;
mod exec;
mod function;
mod instance;
mod interpreter;
mod memory;
mod print_handler;
mod recursion;
mod scope;
mod template;
mod types;

#[cfg(test)]
mod tests;

pub use errors::{EvalError, EvalErrorKind, EvalResult};
pub use exec::Flow;
pub use function::{Function, FunctionBody, FunctionFlags, FunctionId, NativeFn, Param};
pub use instance::{init_tracing, Instance, RunSettings};
pub use interpreter::{Interpreter, InterpreterBuilder, Module, ModuleId, ModuleParser};
pub use memory::{FrameBasedValue, FrameKind, Scalar, Stack, StackFrame, Value};
pub use print_handler::{
    buffer_handler, silent_handler, stdout_handler, BufferPrintHandler, PrintHandlerImpl,
    SharedPrintHandler, StdoutPrintHandler,
};
pub use recursion::ensure_sufficient_stack;
pub use scope::{CallSite, Scope, ScopeId, ScopeKind, ScopeTree};
pub use template::{TemplateId, TemplateParam, TemplateParamKind};
pub use types::{
    CallableKind, CoreKind, Field, Interned, StructKind, StructuralType, TemplateArg,
    TemplateKind, Type, TypeId, TypeKind, TypeRegistry,
};
