//! Blocks, conditionals, loops, jumps, variable definitions and imports.

use vex_ir::{NodeKind, NodeRef};

use super::Flow;
use crate::errors::{nested_import, type_conversion_failure, unexpected_node, unknown_type, EvalResult};
use crate::interpreter::definition_parts;
use crate::memory::{FrameKind, Value};
use crate::scope::ScopeKind;
use crate::types::TypeId;
use crate::Interpreter;

/// What a loop does after one iteration finished with `flow`: `None` to
/// keep looping, or the flow the loop itself finishes with.
fn loop_exit(flow: Flow) -> Option<Flow> {
    match flow {
        Flow::Normal | Flow::Continue => None,
        Flow::Break(levels) if levels <= 1 => Some(Flow::Normal),
        Flow::Break(levels) => Some(Flow::Break(levels - 1)),
        Flow::Return => Some(Flow::Return),
    }
}

fn required<'t>(node: NodeRef<'t>, index: usize) -> EvalResult<NodeRef<'t>> {
    node.child(index).ok_or_else(|| unexpected_node(node.kind()))
}

impl Interpreter {
    /// Run a block in its own frame.
    pub(crate) fn exec_block(&mut self, node: NodeRef<'_>) -> EvalResult<Flow> {
        let scope = self
            .scopes
            .scope_for(node.key(), ScopeKind::Block, self.current_scope());
        self.with_frame(scope, FrameKind::Block, None, |interp| {
            interp.exec_statements(node)
        })
    }

    /// Run a loop body or `else` branch: blocks get a frame, anything else
    /// runs as a single statement.
    fn exec_branch(&mut self, node: NodeRef<'_>) -> EvalResult<Flow> {
        match node.kind() {
            NodeKind::Block => self.exec_block(node),
            _ => self.exec_statement(node),
        }
    }

    /// Evaluate a condition to a `Bool`, looking through one reference.
    pub(crate) fn condition(&mut self, node: NodeRef<'_>) -> EvalResult<bool> {
        let value = self.evaluate_expression(node)?;
        let value = self.strip_ref(value)?;
        if value.ty != TypeId::BOOL {
            return Err(type_conversion_failure(self.type_name(value.ty), "Bool"));
        }
        self.read_bool(value)
    }

    pub(crate) fn exec_if(&mut self, node: NodeRef<'_>) -> EvalResult<Flow> {
        let cond = required(node, 0)?;
        let then = required(node, 1)?;
        if self.condition(cond)? {
            self.exec_branch(then)
        } else if let Some(otherwise) = node.child(2) {
            self.exec_branch(otherwise)
        } else {
            Ok(Flow::Normal)
        }
    }

    /// Each iteration runs in a fresh frame, so temporaries of the
    /// condition and body are released every time around.
    pub(crate) fn exec_while(&mut self, node: NodeRef<'_>) -> EvalResult<Flow> {
        let cond = required(node, 0)?;
        let body = required(node, 1)?;
        let scope = self
            .scopes
            .scope_for(node.key(), ScopeKind::Loop, self.current_scope());
        loop {
            let step = self.with_frame(scope, FrameKind::Block, None, |interp| {
                if !interp.condition(cond)? {
                    return Ok(None);
                }
                interp.exec_branch(body).map(Some)
            })?;
            match step {
                None => return Ok(Flow::Normal),
                Some(flow) => {
                    if let Some(done) = loop_exit(flow) {
                        return Ok(done);
                    }
                }
            }
        }
    }

    /// `for (init; cond; step) body`: `init` binds in a frame around the
    /// whole loop, each iteration gets its own frame inside it.
    pub(crate) fn exec_for(&mut self, node: NodeRef<'_>) -> EvalResult<Flow> {
        let init = required(node, 0)?;
        let cond = required(node, 1)?;
        let step = required(node, 2)?;
        let body = required(node, 3)?;
        let scope = self
            .scopes
            .scope_for(node.key(), ScopeKind::Loop, self.current_scope());
        self.with_frame(scope, FrameKind::Block, None, |interp| {
            interp.exec_statement(init)?;
            loop {
                let iteration = interp.with_frame(scope, FrameKind::Block, None, |interp| {
                    if !interp.condition(cond)? {
                        return Ok(None);
                    }
                    let flow = interp.exec_branch(body)?;
                    if loop_exit(flow).is_none() {
                        interp.evaluate_expression(step)?;
                    }
                    Ok(Some(flow))
                })?;
                match iteration {
                    None => return Ok(Flow::Normal),
                    Some(flow) => {
                        if let Some(done) = loop_exit(flow) {
                            return Ok(done);
                        }
                    }
                }
            }
        })
    }

    /// Copy-construct the value into the caller's return slot.
    pub(crate) fn exec_return(&mut self, node: NodeRef<'_>) -> EvalResult<Flow> {
        let Some(expr) = node.child(0) else {
            return Ok(Flow::Return);
        };
        let value = self.evaluate_expression(expr)?;
        match self.current_call().and_then(|c| c.return_slot) {
            Some(slot) => self.copy_construct(slot, value)?,
            None if value.ty == TypeId::VOID => {}
            None => {
                return Err(type_conversion_failure(self.type_name(value.ty), "Void")
                    .with_hint("this function does not return a value"))
            }
        }
        Ok(Flow::Return)
    }

    pub(crate) fn exec_break(&mut self, node: NodeRef<'_>) -> EvalResult<Flow> {
        let text = self.name(node.text());
        if text.is_empty() {
            return Ok(Flow::Break(1));
        }
        let levels = text
            .parse::<u32>()
            .map_err(|_| type_conversion_failure(text, "UInt32"))?;
        Ok(Flow::Break(levels.max(1)))
    }

    /// Define a variable in the innermost frame.
    ///
    /// A fresh temporary of exactly the variable's type, sitting at the top
    /// of the frame, becomes the variable's storage. Anything else is
    /// copy-constructed into a new slot.
    pub(crate) fn exec_variable_definition(&mut self, node: NodeRef<'_>) -> EvalResult<()> {
        let name = node.text();
        let (ty_node, init) = definition_parts(node);
        let declared = match ty_node {
            Some(ty) => Some(self.resolve_type(ty, self.current_scope())?),
            None => None,
        };

        let slot = match (declared, init) {
            (Some(ty), None) => {
                let slot = self.stack.reserve(&self.types, ty, false)?;
                let place = self.top_slot(slot)?;
                self.default_construct(place)?;
                slot
            }
            (declared, Some(init)) => {
                let before = self.stack.mark();
                let value = self.evaluate_expression(init)?;
                let ty = declared.unwrap_or_else(|| self.types.decay(value.ty));
                if ty == TypeId::VOID {
                    return Err(type_conversion_failure("Void", self.name(name))
                        .with_hint("the initializer has no value"));
                }
                if self.is_fresh_temporary(value, ty, before) {
                    self.stack.reserve(&self.types, ty, true)?
                } else {
                    let slot = self.stack.reserve(&self.types, ty, false)?;
                    let place = self.top_slot(slot)?;
                    self.copy_construct(place, value)?;
                    slot
                }
            }
            (None, None) => {
                return Err(unknown_type(self.name(name))
                    .with_hint("a variable needs a type or an initializer"))
            }
        };

        match self.stack.top_mut() {
            Some(frame) => {
                frame.bind(name, slot);
                Ok(())
            }
            None => Err(unexpected_node(NodeKind::VariableDefinition)),
        }
    }

    fn top_slot(&self, slot: crate::memory::FrameBasedValue) -> EvalResult<Value> {
        match self.stack.depth().checked_sub(1) {
            Some(frame) => Ok(self.stack.resolve(slot, frame)),
            None => Err(unexpected_node(NodeKind::VariableDefinition)),
        }
    }

    /// Whether `value` is a temporary of type `ty` allocated since `mark`
    /// and ending exactly at the current mark.
    fn is_fresh_temporary(&self, value: Value, ty: TypeId, mark: usize) -> bool {
        value.ty == ty
            && value.addr >= mark
            && value.addr + self.types.size(ty) == self.stack.mark()
    }

    /// `import "path";` loads the module (once) and links its scope into
    /// the current one.
    ///
    /// Imports inside functions and blocks were loaded with their module.
    /// A first load from a non-root frame is refused.
    pub(crate) fn exec_import(&mut self, node: NodeRef<'_>) -> EvalResult<Flow> {
        let request = self.name(node.text());
        let importer = self.current_module_path();
        let path = self.find_module_path(request, importer.as_deref())?;
        let at_root = self.stack.top().is_none_or(|f| f.kind.is_root());
        let id = match self.loaded_module(&path) {
            Some(id) => id,
            None if at_root => self.load_module(request, importer.as_deref())?,
            None => return Err(nested_import(request)),
        };
        let module_scope = self.module(id).scope;
        let scope = self.current_scope();
        self.scopes.get_mut(scope).add_import(module_scope);
        Ok(Flow::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::{loop_exit, Flow};
    use pretty_assertions::assert_eq;

    #[test]
    fn loops_consume_one_break_level() {
        assert_eq!(loop_exit(Flow::Normal), None);
        assert_eq!(loop_exit(Flow::Continue), None);
        assert_eq!(loop_exit(Flow::Break(1)), Some(Flow::Normal));
        assert_eq!(loop_exit(Flow::Break(3)), Some(Flow::Break(2)));
        assert_eq!(loop_exit(Flow::Return), Some(Flow::Return));
    }
}
