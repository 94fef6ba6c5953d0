//! Module loading.
//!
//! The engine never reads source text: a [`ModuleParser`] supplied by the
//! host turns a path into a [`SyntaxTree`]. Each module is evaluated once,
//! keyed by its normalized absolute path; its top-level declarations land in
//! its own module scope and its globals in its own root frame.

use std::path::{Component, Path, PathBuf};
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;
use vex_ir::{NodeKind, SharedInterner, SyntaxTree, TreeId};

use super::Interpreter;
use crate::errors::{module_not_found, parse_failure, EvalResult};
use crate::memory::FrameKind;
use crate::scope::{ScopeId, ScopeKind};

/// Source file extension of Vex modules.
const EXTENSION: &str = "vx";

/// Turns module files into syntax trees.
pub trait ModuleParser {
    /// Parse the module at `path`, interning identifiers with `interner`.
    fn parse(&self, path: &Path, interner: &SharedInterner) -> Result<SyntaxTree, String>;

    /// Whether a module exists at `path`.
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ModuleId(u32);

/// One loaded module.
#[derive(Debug)]
pub struct Module {
    pub path: PathBuf,
    pub tree: Rc<SyntaxTree>,
    pub scope: ScopeId,
}

pub(crate) struct ModuleLoader {
    parser: Option<Box<dyn ModuleParser>>,
    search_paths: Vec<PathBuf>,
    modules: Vec<Module>,
    by_path: FxHashMap<PathBuf, ModuleId>,
    by_tree: FxHashMap<TreeId, ModuleId>,
}

impl ModuleLoader {
    pub(crate) fn new(parser: Option<Box<dyn ModuleParser>>, search_paths: Vec<PathBuf>) -> Self {
        ModuleLoader {
            parser,
            search_paths,
            modules: Vec::new(),
            by_path: FxHashMap::default(),
            by_tree: FxHashMap::default(),
        }
    }

    pub(crate) fn get(&self, id: ModuleId) -> &Module {
        &self.modules[id.0 as usize]
    }

    fn add(&mut self, module: Module) -> ModuleId {
        let id = ModuleId(u32::try_from(self.modules.len()).unwrap_or(u32::MAX));
        self.by_path.insert(module.path.clone(), id);
        self.by_tree.insert(module.tree.id(), id);
        self.modules.push(module);
        id
    }

    pub(crate) fn find(&self, path: &Path) -> Option<ModuleId> {
        self.by_path.get(path).copied()
    }

    /// Module whose tree is `tree`.
    pub(crate) fn for_tree(&self, tree: TreeId) -> Option<&Module> {
        self.by_tree.get(&tree).map(|&id| self.get(id))
    }
}

/// Candidate files for `request` relative to `dir`: `<request>.vx`, then
/// `<request>/mod.vx`. A request with an extension is taken as is.
fn candidates(request: &str, dir: &Path) -> Vec<PathBuf> {
    let resolved = dir.join(request);
    if resolved.extension().is_some() {
        return vec![resolved];
    }
    vec![resolved.with_extension(EXTENSION), resolved.join("mod.vx")]
}

/// Resolve `.` and `..` components and make the path absolute.
fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_relative() {
        std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    } else {
        path.to_path_buf()
    };
    let mut result = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            _ => result.push(component),
        }
    }
    result
}

impl Interpreter {
    /// Locate the module `request` imported from `importer`.
    ///
    /// Tries the importer's directory, then every search path.
    pub fn find_module_path(&self, request: &str, importer: Option<&Path>) -> EvalResult<PathBuf> {
        let parser = self
            .modules
            .parser
            .as_deref()
            .ok_or_else(|| module_not_found(request).with_hint("no module parser is configured"))?;

        let mut dirs: Vec<PathBuf> = Vec::with_capacity(1 + self.modules.search_paths.len());
        dirs.push(
            importer
                .and_then(Path::parent)
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        );
        if Path::new(request).is_relative() {
            dirs.extend(self.modules.search_paths.iter().cloned());
        }

        let mut searched = Vec::new();
        for dir in &dirs {
            for candidate in candidates(request, dir) {
                let candidate = normalize_path(&candidate);
                if parser.exists(&candidate) {
                    return Ok(candidate);
                }
                searched.push(candidate.display().to_string());
            }
        }
        Err(module_not_found(request).with_hint(format!("searched {}", searched.join(", "))))
    }

    pub fn parse_module(&self, path: &Path) -> EvalResult<Rc<SyntaxTree>> {
        let parser = self
            .modules
            .parser
            .as_deref()
            .ok_or_else(|| module_not_found(path.display().to_string()))?;
        parser
            .parse(path, &self.interner)
            .map(Rc::new)
            .map_err(|message| parse_failure(path.display().to_string(), message))
    }

    /// Evaluate a parsed module once and return its id.
    ///
    /// Every import in the tree, including those inside functions and
    /// blocks, is loaded first so the imported root frames sit below this
    /// module's and live as long as it does. Top-level imports are linked
    /// into the module scope right away; nested ones are linked when their
    /// statement runs. Then this module's frame is pushed and kept for the
    /// rest of the run.
    #[tracing::instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn evaluate_module(&mut self, path: PathBuf, tree: Rc<SyntaxTree>) -> EvalResult<ModuleId> {
        if let Some(id) = self.modules.find(&path) {
            return Ok(id);
        }
        let scope = self.scopes.create(ScopeKind::Module, Some(ScopeId::UNIVERSE));
        let id = self.modules.add(Module {
            path: path.clone(),
            tree: Rc::clone(&tree),
            scope,
        });

        let root = tree.root();
        for import in root.descendants().filter(|c| c.kind() == NodeKind::Import) {
            let request = self.name(import.text());
            let dep = self
                .load_module(request, Some(&path))
                .map_err(|e| e.with_location(import.pos(), Some(path.clone())))?;
            if root.children().any(|c| c.key() == import.key()) {
                let dep_scope = self.modules.get(dep).scope;
                self.scopes.get_mut(scope).add_import(dep_scope);
            }
        }

        self.stack.push_frame(scope, FrameKind::Module, None);
        self.with_tree(tree, |interp, tree| {
            interp.exec_statements(tree.root()).map(|_| ())
        })?;
        debug!(module = id.0, "module evaluated");
        Ok(id)
    }

    /// Find, parse and evaluate `request` unless it is already loaded.
    pub fn load_module(&mut self, request: &str, importer: Option<&Path>) -> EvalResult<ModuleId> {
        let path = self.find_module_path(request, importer)?;
        if let Some(id) = self.modules.find(&path) {
            return Ok(id);
        }
        let tree = self.parse_module(&path)?;
        self.evaluate_module(path, tree)
    }

    /// Module already loaded from `path`.
    pub(crate) fn loaded_module(&self, path: &Path) -> Option<ModuleId> {
        self.modules.find(path)
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        self.modules.get(id)
    }

    /// Path of the module currently executing.
    pub(crate) fn current_module_path(&self) -> Option<PathBuf> {
        self.modules
            .for_tree(self.current_tree.id())
            .map(|m| m.path.clone())
    }

    /// Pop every frame, root frames included, running destructors.
    pub fn shutdown(&mut self) -> EvalResult<()> {
        self.pop_frames_to(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn candidates_try_file_then_directory() {
        let found = candidates("math", Path::new("/project/src"));
        assert_eq!(
            found,
            vec![
                PathBuf::from("/project/src/math.vx"),
                PathBuf::from("/project/src/math/mod.vx"),
            ]
        );
    }

    #[test]
    fn explicit_extension_is_kept() {
        assert_eq!(
            candidates("util.vx", Path::new("/p")),
            vec![PathBuf::from("/p/util.vx")]
        );
    }

    #[test]
    fn normalize_resolves_parent_components() {
        assert_eq!(
            normalize_path(Path::new("/project/src/../lib/./x.vx")),
            PathBuf::from("/project/lib/x.vx")
        );
    }
}
