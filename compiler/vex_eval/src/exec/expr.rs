//! Expression reduction.
//!
//! An `Expression` node's children are a flat sequence of operands and
//! operators. Operands start out pending (unevaluated). Each operator is
//! classified once as prefix, infix or postfix from its neighbours; then
//! the operator with the lowest priority whose operands are in place is
//! reduced, repeatedly, until one operand remains.

use tracing::trace;
use vex_ir::{Name, NodeKind, NodeRef};

use super::operators::{priority, Fixity};
use crate::errors::{
    invalid_operator_position, type_conversion_failure, unexpected_node, unresolved_identifier,
    EvalResult,
};
use crate::function::FunctionId;
use crate::interpreter::Callee;
use crate::memory::{Scalar, Value};
use crate::recursion::ensure_sufficient_stack;
use crate::types::{TemplateArg, TemplateKind, TypeId};
use crate::Interpreter;

/// An operand during reduction.
#[derive(Clone, Debug)]
pub(crate) enum Operand<'t> {
    /// Not evaluated yet.
    Pending(NodeRef<'t>),
    Value(Value),
    /// A type name, callable as a constructor.
    Type(TypeId),
    /// A function name with explicit template arguments.
    Functions { name: Name, explicit: Vec<TemplateArg> },
    /// A member function set reached through `Type::name`.
    Overloads { name: Name, candidates: Vec<FunctionId> },
    /// `receiver.name` naming a method.
    Method { receiver: Value, name: Name },
}

#[derive(Clone, Debug)]
enum Item<'t> {
    Operand(Operand<'t>),
    Operator {
        node: NodeRef<'t>,
        fixity: Fixity,
        priority: u8,
    },
}

impl Item<'_> {
    fn is_operand(&self) -> bool {
        matches!(self, Item::Operand(_))
    }
}

/// Fixity of the operator at `index`: calls and indexing are postfix;
/// an operator with no operand before it is prefix.
fn classify(items: &[Item<'_>], index: usize, node: NodeRef<'_>) -> Fixity {
    if node.kind() != NodeKind::Operator {
        return Fixity::Postfix;
    }
    match index.checked_sub(1).map(|i| &items[i]) {
        None => Fixity::Prefix,
        Some(Item::Operator { fixity, .. }) if *fixity != Fixity::Postfix => Fixity::Prefix,
        Some(_) => Fixity::Infix,
    }
}

/// Index of the next operator to reduce: the lowest priority among those
/// whose operands are in place, leftmost on ties.
fn next_reducible(items: &[Item<'_>]) -> Option<usize> {
    let operand_at = |i: Option<usize>| i.and_then(|i| items.get(i)).is_some_and(Item::is_operand);
    let mut best: Option<(u8, usize)> = None;
    for (i, item) in items.iter().enumerate() {
        let Item::Operator {
            fixity, priority, ..
        } = item
        else {
            continue;
        };
        let ready = match fixity {
            Fixity::Prefix => operand_at(Some(i + 1)),
            Fixity::Postfix => operand_at(i.checked_sub(1)),
            Fixity::Infix => operand_at(i.checked_sub(1)) && operand_at(Some(i + 1)),
        };
        if ready && best.map_or(true, |(p, _)| *priority < p) {
            best = Some((*priority, i));
        }
    }
    best.map(|(_, i)| i)
}

impl Interpreter {
    /// Evaluate an operand node to a value.
    pub fn evaluate_expression(&mut self, node: NodeRef<'_>) -> EvalResult<Value> {
        ensure_sufficient_stack(|| {
            trace!(kind = ?node.kind(), "evaluate");
            if node.kind() == NodeKind::Expression {
                self.reduce_expression(node)
            } else {
                let operand = self.resolve_operand(node)?;
                self.operand_value(operand)
            }
        })
    }

    /// The symbol an operator node stands for.
    pub(crate) fn operator_text(&self, node: NodeRef<'_>) -> &'static str {
        match node.kind() {
            NodeKind::Call => "()",
            NodeKind::Index => "[]",
            _ => self.name(node.text()),
        }
    }

    fn reduce_expression(&mut self, node: NodeRef<'_>) -> EvalResult<Value> {
        let mut items: Vec<Item<'_>> = Vec::with_capacity(node.child_count());
        for child in node.children() {
            if child.kind().is_operator() {
                let fixity = classify(&items, items.len(), child);
                let last = items.len() + 1 == node.child_count();
                let misplaced = match fixity {
                    Fixity::Postfix => items.is_empty(),
                    Fixity::Prefix | Fixity::Infix => last,
                };
                if misplaced {
                    return Err(invalid_operator_position(self.operator_text(child)));
                }
                items.push(Item::Operator {
                    node: child,
                    fixity,
                    priority: priority(self.operator_text(child), fixity),
                });
            } else {
                items.push(Item::Operand(Operand::Pending(child)));
            }
        }

        while items.len() > 1 {
            let Some(index) = next_reducible(&items) else {
                let symbol = items.iter().find_map(|item| match item {
                    Item::Operator { node, .. } => Some(self.operator_text(*node)),
                    Item::Operand(_) => None,
                });
                return Err(invalid_operator_position(symbol.unwrap_or("?")));
            };
            self.reduce_at(&mut items, index)?;
        }

        match items.pop() {
            Some(Item::Operand(operand)) => self.operand_value(operand),
            Some(Item::Operator { node, .. }) => {
                Err(invalid_operator_position(self.operator_text(node)))
            }
            None => Ok(self.void_value()),
        }
    }

    /// Reduce the operator at `index` with its operands in place.
    fn reduce_at<'t>(&mut self, items: &mut Vec<Item<'t>>, index: usize) -> EvalResult<()> {
        let Item::Operator { node, fixity, .. } = items[index] else {
            return Ok(());
        };
        let symbol = self.operator_text(node);
        let misplaced = || invalid_operator_position(symbol);
        match fixity {
            Fixity::Prefix => {
                let Item::Operand(operand) = items.remove(index + 1) else {
                    return Err(misplaced());
                };
                let value = self.operand_value(operand)?;
                let result = self.unary_operator(node.text(), value)?;
                items[index] = Item::Operand(Operand::Value(result));
            }
            Fixity::Postfix => {
                items.remove(index);
                let Item::Operand(operand) = items.remove(index - 1) else {
                    return Err(misplaced());
                };
                let result = self.reduce_postfix(node, operand)?;
                items.insert(index - 1, Item::Operand(result));
            }
            Fixity::Infix => {
                let mut span = items.drain(index - 1..=index + 1);
                let (Some(Item::Operand(left)), Some(_), Some(Item::Operand(right))) =
                    (span.next(), span.next(), span.next())
                else {
                    return Err(misplaced());
                };
                drop(span);
                let result = self.reduce_infix(node, left, right)?;
                items.insert(index - 1, Item::Operand(result));
            }
        }
        Ok(())
    }

    fn reduce_postfix<'t>(&mut self, node: NodeRef<'t>, operand: Operand<'t>) -> EvalResult<Operand<'t>> {
        match node.kind() {
            NodeKind::Call => self.reduce_call(operand, node),
            NodeKind::Index => self.reduce_index(operand, node),
            other => Err(unexpected_node(other)),
        }
    }

    fn reduce_infix<'t>(
        &mut self,
        node: NodeRef<'t>,
        left: Operand<'t>,
        right: Operand<'t>,
    ) -> EvalResult<Operand<'t>> {
        let symbol = node.text();
        match self.name(symbol) {
            "." => self.member_access(left, right),
            "::" => self.scope_resolution(left, right),
            "&&" | "||" => {
                let is_and = symbol == self.ops.and;
                self.logical(symbol, is_and, left, right).map(Operand::Value)
            }
            _ => {
                let l = self.operand_value(left)?;
                let r = self.operand_value(right)?;
                self.binary_operator(symbol, l, r).map(Operand::Value)
            }
        }
    }

    /// `&&` and `||`. The right operand is skipped only while it is still
    /// pending; one the priority order already reduced is simply combined.
    fn logical(&mut self, symbol: Name, is_and: bool, left: Operand<'_>, right: Operand<'_>) -> EvalResult<Value> {
        let l = self.operand_value(left)?;
        let l = self.strip_ref(l)?;
        if l.ty != TypeId::BOOL {
            let r = self.operand_value(right)?;
            return self.binary_operator(symbol, l, r);
        }
        let lv = self.read_bool(l)?;
        let decided = if is_and { !lv } else { lv };
        if decided && matches!(right, Operand::Pending(_)) {
            return self.alloc_bool(lv);
        }
        let r = self.operand_value(right)?;
        let r = self.strip_ref(r)?;
        if r.ty != TypeId::BOOL {
            return self.binary_operator(symbol, l, r);
        }
        let rv = self.read_bool(r)?;
        self.alloc_bool(if is_and { lv && rv } else { lv || rv })
    }

    /// Turn an operand node into an operand without forcing it to a value.
    pub(crate) fn resolve_operand<'t>(&mut self, node: NodeRef<'t>) -> EvalResult<Operand<'t>> {
        match node.kind() {
            NodeKind::IntegerLiteral => self.integer_literal(node).map(Operand::Value),
            NodeKind::FloatLiteral => {
                let text = self.name(node.text());
                let v: f64 = text
                    .parse()
                    .map_err(|_| type_conversion_failure(text, "Float64"))?;
                self.alloc_scalar(TypeId::FLOAT64, Scalar::Float(v))
                    .map(Operand::Value)
            }
            NodeKind::StringLiteral => {
                let text = self.name(node.text());
                self.alloc_str(text).map(Operand::Value)
            }
            NodeKind::BoolLiteral => {
                let v = self.name(node.text()) == "true";
                self.alloc_bool(v).map(Operand::Value)
            }
            NodeKind::Expression => self.reduce_expression(node).map(Operand::Value),
            NodeKind::Identifier => self.resolve_identifier(node.text()),
            NodeKind::TypeName if node.child_count() == 0 => self.resolve_identifier(node.text()),
            NodeKind::TypeName => {
                let scope = self.current_scope();
                let name = node.text();
                let is_type = TemplateKind::from_name(self.name(name)).is_some()
                    || self.find_template_type(scope, name).is_some();
                if is_type {
                    return self.resolve_type(node, scope).map(Operand::Type);
                }
                let mut explicit = Vec::with_capacity(node.child_count());
                for arg in node.children() {
                    explicit.push(self.resolve_template_arg(arg, scope)?);
                }
                Ok(Operand::Functions { name, explicit })
            }
            other => Err(unexpected_node(other)),
        }
    }

    /// `Int32` when the literal fits, `Int64` otherwise.
    fn integer_literal(&mut self, node: NodeRef<'_>) -> EvalResult<Value> {
        let text = self.name(node.text());
        let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(hex) => i64::from_str_radix(hex, 16),
            None => text.parse::<i64>(),
        };
        let v = parsed.map_err(|_| type_conversion_failure(text, "Int64"))?;
        let ty = if i32::try_from(v).is_ok() {
            TypeId::INT32
        } else {
            TypeId::INT64
        };
        self.alloc_scalar(ty, Scalar::Int(v))
    }

    /// A bare name: a variable, a template value parameter, a type, or a
    /// function set.
    fn resolve_identifier<'t>(&mut self, name: Name) -> EvalResult<Operand<'t>> {
        if let Some(v) = self.lookup_variable(name)? {
            return Ok(Operand::Value(v));
        }
        let scope = self.current_scope();
        if let Some(binding) = self.find_template_param(scope, name) {
            return match binding.arg {
                TemplateArg::Int(n) => {
                    let ty = binding.value_type.unwrap_or(TypeId::INT32);
                    self.alloc_scalar(ty, Scalar::Int(n)).map(Operand::Value)
                }
                TemplateArg::Type(t) => Ok(Operand::Type(t)),
            };
        }
        if let Some(ty) = self.resolve_type_name(scope, name) {
            return Ok(Operand::Type(ty));
        }
        let has_functions = !self.function_candidates(name).is_empty()
            || !self.template_function_candidates(name).is_empty();
        if has_functions {
            return Ok(Operand::Functions {
                name,
                explicit: Vec::new(),
            });
        }
        Err(unresolved_identifier(self.name(name)))
    }

    /// Force an operand to a value.
    ///
    /// A name that denotes exactly one function becomes a `Function`
    /// value; a method reference becomes a `Method` value.
    pub(crate) fn operand_value(&mut self, operand: Operand<'_>) -> EvalResult<Value> {
        match operand {
            Operand::Pending(node) => {
                let resolved = self.resolve_operand(node)?;
                self.operand_value(resolved)
            }
            Operand::Value(v) => Ok(v),
            Operand::Type(t) => Err(type_conversion_failure(self.type_name(t), "value")
                .with_hint("call the type to construct a value")),
            Operand::Functions { name, explicit } => {
                let candidates: Vec<FunctionId> = if explicit.is_empty() {
                    self.function_candidates(name)
                        .into_iter()
                        .filter_map(|c| match c {
                            Callee::Function(f) => Some(f),
                            Callee::Constructor(_) => None,
                        })
                        .collect()
                } else {
                    self.template_function_candidates(name)
                        .into_iter()
                        .map(|t| self.instantiate_function(t, &explicit))
                        .collect::<EvalResult<_>>()?
                };
                self.function_value(name, &candidates)
            }
            Operand::Overloads { name, candidates } => self.function_value(name, &candidates),
            Operand::Method { receiver, name } => {
                let members = self.types.get(receiver.ty).members();
                let candidates = self.scopes.get(members).find_function(name).to_vec();
                let [f] = candidates.as_slice() else {
                    return Err(unresolved_identifier(self.name(name))
                        .with_hint("a method value needs exactly one overload"));
                };
                let out = self.allocate(TypeId::METHOD)?;
                self.stack.write_u64(out.addr, receiver.addr as u64)?;
                self.stack.write_u64(out.addr + 8, u64::from(f.raw()))?;
                Ok(out)
            }
        }
    }

    fn function_value(&mut self, name: Name, candidates: &[FunctionId]) -> EvalResult<Value> {
        let [f] = candidates else {
            return Err(unresolved_identifier(self.name(name))
                .with_hint("a function value needs exactly one overload"));
        };
        let out = self.allocate(TypeId::FUNCTION)?;
        self.stack.write_u64(out.addr, u64::from(f.raw()))?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use vex_ir::{SourcePos, StringInterner, SyntaxTree, TreeBuilder};

    /// An expression over `parts`: `None` for an operand, `Some(sym)` for
    /// an operator, `"()"` for a call.
    fn expression(parts: &[Option<&str>]) -> SyntaxTree {
        let interner = StringInterner::new();
        let mut b = TreeBuilder::new();
        let mut children = Vec::new();
        for part in parts {
            let (kind, text) = match part {
                Some("()") => (NodeKind::Call, ""),
                Some(sym) => (NodeKind::Operator, *sym),
                None => (NodeKind::Identifier, "x"),
            };
            children.push(b.push(kind, interner.intern(text), vec![], SourcePos::DUMMY));
        }
        let root = b.push(NodeKind::Expression, interner.intern(""), children, SourcePos::DUMMY);
        b.finish(root)
    }

    fn items<'t>(tree: &'t SyntaxTree, parts: &[Option<&str>]) -> Vec<Item<'t>> {
        let mut items: Vec<Item<'t>> = Vec::new();
        for (child, part) in tree.root().children().zip(parts) {
            match part {
                Some(sym) => {
                    let fixity = classify(&items, items.len(), child);
                    items.push(Item::Operator {
                        node: child,
                        fixity,
                        priority: priority(sym, fixity),
                    });
                }
                None => items.push(Item::Operand(Operand::Pending(child))),
            }
        }
        items
    }

    fn fixities(items: &[Item<'_>]) -> Vec<Option<Fixity>> {
        items
            .iter()
            .map(|item| match item {
                Item::Operator { fixity, .. } => Some(*fixity),
                Item::Operand(_) => None,
            })
            .collect()
    }

    #[test]
    fn operators_are_classified_by_neighbours() {
        let parts = [Some("-"), None, Some("*"), Some("-"), None, Some("()")];
        let tree = expression(&parts);
        assert_eq!(
            fixities(&items(&tree, &parts)),
            vec![
                Some(Fixity::Prefix),
                None,
                Some(Fixity::Infix),
                Some(Fixity::Prefix),
                None,
                Some(Fixity::Postfix),
            ]
        );
    }

    #[test]
    fn operator_after_call_is_infix() {
        let parts = [None, Some("()"), Some("-"), None];
        let tree = expression(&parts);
        assert_eq!(
            fixities(&items(&tree, &parts)),
            vec![None, Some(Fixity::Postfix), Some(Fixity::Infix), None]
        );
    }

    #[test]
    fn lowest_priority_ready_operator_reduces_first() {
        let parts = [None, Some("+"), None, Some("*"), None];
        let tree = expression(&parts);
        assert_eq!(next_reducible(&items(&tree, &parts)), Some(3));
    }

    #[test]
    fn equal_priorities_reduce_left_to_right() {
        let parts = [None, Some("-"), None, Some("+"), None];
        let tree = expression(&parts);
        assert_eq!(next_reducible(&items(&tree, &parts)), Some(1));
    }

    #[test]
    fn prefix_waits_for_its_operand() {
        // - - x: only the inner prefix has its operand in place.
        let parts = [Some("-"), Some("-"), None];
        let tree = expression(&parts);
        assert_eq!(next_reducible(&items(&tree, &parts)), Some(1));
    }
}
