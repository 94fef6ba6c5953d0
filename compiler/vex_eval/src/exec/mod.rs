//! Statement and expression executors.
//!
//! - `control`: blocks, conditionals, loops, jumps, variable definitions
//!   and imports
//! - `expr`: operand resolution and priority-driven expression reduction
//! - `operators`: operator fixity and priority, operator dispatch
//! - `call`: calls, member access, scope resolution and indexing
//!
//! Every executor is a method on [`Interpreter`]; `exec_statement`
//! dispatches on the node tag.

mod call;
mod control;
mod expr;
mod operators;

use vex_ir::{NodeKind, NodeRef};

use crate::errors::{unexpected_node, EvalResult};
use crate::Interpreter;

/// How a statement finished.
///
/// Control transfer is a normal return value, never an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    Normal,
    Return,
    /// Leave this many enclosing loops.
    Break(u32),
    Continue,
}

impl Interpreter {
    pub(crate) fn exec_statement(&mut self, node: NodeRef<'_>) -> EvalResult<Flow> {
        let pos = node.pos();
        if !pos.is_dummy() {
            self.last_pos = pos;
        }
        let result = match node.kind() {
            NodeKind::Function | NodeKind::Class | NodeKind::Union | NodeKind::Enum => self
                .declare(node, self.current_scope())
                .map(|()| Flow::Normal),
            NodeKind::Import => self.exec_import(node),
            NodeKind::VariableDefinition => self.exec_variable_definition(node).map(|()| Flow::Normal),
            NodeKind::Block => self.exec_block(node),
            NodeKind::If => self.exec_if(node),
            NodeKind::While => self.exec_while(node),
            NodeKind::For => self.exec_for(node),
            NodeKind::Return => self.exec_return(node),
            NodeKind::Break => self.exec_break(node),
            NodeKind::Continue => Ok(Flow::Continue),
            NodeKind::ExpressionStatement => node
                .children()
                .try_for_each(|child| self.evaluate_expression(child).map(|_| ()))
                .map(|()| Flow::Normal),
            kind if kind.is_operand() => self.evaluate_expression(node).map(|_| Flow::Normal),
            other => Err(unexpected_node(other)),
        };
        result.map_err(|e| {
            if e.pos.is_some() {
                return e;
            }
            let file = self.current_module_path();
            e.with_location(pos, file)
        })
    }

    /// Run the children of `node` in order, stopping at the first that
    /// transfers control.
    pub(crate) fn exec_statements(&mut self, node: NodeRef<'_>) -> EvalResult<Flow> {
        for child in node.children() {
            let flow = self.exec_statement(child)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }
}
