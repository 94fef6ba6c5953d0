//! `InterpreterBuilder` for creating configured interpreters.

use std::path::PathBuf;
use std::rc::Rc;

use rustc_hash::FxHashSet;
use vex_ir::{NodeKind, SharedInterner, SourcePos, TreeBuilder};

use super::{Interpreter, ModuleLoader, ModuleParser, OpNames, WellKnownNames};
use crate::function::FunctionTable;
use crate::memory::{FrameKind, Stack, StringPool};
use crate::print_handler::{stdout_handler, SharedPrintHandler};
use crate::scope::{ScopeId, ScopeTree};
use crate::template::TemplateTable;
use crate::types::{CoreKind, TypeId, TypeRegistry};

/// Default arena size (1 MiB).
pub const DEFAULT_STACK_CAPACITY: usize = 1 << 20;

/// Default limit on nested interpreted calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 2048;

pub struct InterpreterBuilder {
    interner: Option<SharedInterner>,
    print_handler: Option<SharedPrintHandler>,
    parser: Option<Box<dyn ModuleParser>>,
    search_paths: Vec<PathBuf>,
    stack_capacity: usize,
    max_call_depth: usize,
}

impl InterpreterBuilder {
    pub fn new() -> Self {
        Self {
            interner: None,
            print_handler: None,
            parser: None,
            search_paths: Vec::new(),
            stack_capacity: DEFAULT_STACK_CAPACITY,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    /// Share an interner with the parser that builds the trees.
    #[must_use]
    pub fn interner(mut self, interner: SharedInterner) -> Self {
        self.interner = Some(interner);
        self
    }

    /// Where `print` and `println` write. Default is stdout.
    #[must_use]
    pub fn print_handler(mut self, handler: SharedPrintHandler) -> Self {
        self.print_handler = Some(handler);
        self
    }

    /// Parser used for `import` and [`Instance`](crate::Instance) entry modules.
    #[must_use]
    pub fn module_parser(mut self, parser: impl ModuleParser + 'static) -> Self {
        self.parser = Some(Box::new(parser));
        self
    }

    /// Directories searched for imports after the importer's own directory.
    #[must_use]
    pub fn search_paths(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.search_paths.extend(paths);
        self
    }

    /// Arena size in bytes.
    #[must_use]
    pub fn stack_capacity(mut self, bytes: usize) -> Self {
        self.stack_capacity = bytes;
        self
    }

    #[must_use]
    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    pub fn build(self) -> Interpreter {
        let interner = self.interner.unwrap_or_default();
        let mut scopes = ScopeTree::new();
        let types = TypeRegistry::new(&mut scopes);

        // Core type names resolve from every scope through the universe.
        let universe = scopes.get_mut(ScopeId::UNIVERSE);
        for core in CoreKind::ALL {
            let _ = universe.register_type(interner.intern(core.name()), core.type_id());
        }
        let _ = universe.register_type(interner.intern("Function"), TypeId::FUNCTION);
        let _ = universe.register_type(interner.intern("Method"), TypeId::METHOD);

        let mut stack = Stack::new(self.stack_capacity);
        stack.push_frame(ScopeId::UNIVERSE, FrameKind::Universe, None);

        let mut empty = TreeBuilder::new();
        let root = empty.push(NodeKind::Module, vex_ir::Name::EMPTY, vec![], SourcePos::DUMMY);

        let mut interpreter = Interpreter {
            names: WellKnownNames::new(&interner),
            ops: OpNames::new(&interner),
            interner,
            types,
            scopes,
            functions: FunctionTable::new(),
            templates: TemplateTable::new(),
            stack,
            strings: StringPool::new(),
            modules: ModuleLoader::new(self.parser, self.search_paths),
            print_handler: self.print_handler.unwrap_or_else(stdout_handler),
            max_call_depth: self.max_call_depth,
            call_depth: 0,
            current_tree: Rc::new(empty.finish(root)),
            last_pos: SourcePos::DUMMY,
            declared: FxHashSet::default(),
        };
        interpreter.register_builtins();
        interpreter
    }
}

impl Default for InterpreterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
