//! Universe-scope functions and value formatting.

use std::fmt::Write as _;
use std::rc::Rc;

use super::Interpreter;
use crate::errors::EvalResult;
use crate::function::{Function, FunctionBody, FunctionFlags, Param};
use crate::memory::Value;
use crate::scope::ScopeId;
use crate::types::{CoreKind, StructKind, TemplateKind, TypeId, TypeKind};

impl Interpreter {
    /// Register `print(...)` and `println(...)` in the universe scope.
    pub(crate) fn register_builtins(&mut self) {
        for (name, newline) in [(self.names.print, false), (self.names.println, true)] {
            let params = vec![Param {
                name: self.names.ellipsis,
                ty: TypeId::VOID,
            }];
            let body = FunctionBody::Native(Rc::new(move |interp: &mut Interpreter, args: &[Value]| {
                let mut line = String::new();
                for &arg in args {
                    interp.format_into(&mut line, arg)?;
                }
                if newline {
                    interp.print_handler.println(&line);
                } else {
                    interp.print_handler.print(&line);
                }
                Ok(None)
            }));
            let function = Function::new(
                name,
                params,
                TypeId::VOID,
                FunctionFlags::VARIADIC | FunctionFlags::SYNTHESIZED,
                None,
                body,
                self.names.self_,
            );
            let id = self.functions.add(function);
            self.scopes
                .get_mut(ScopeId::UNIVERSE)
                .register_function(name, id);
        }
    }

    /// Render a value the way `print` shows it.
    pub fn format_value(&self, value: Value) -> EvalResult<String> {
        let mut out = String::new();
        self.format_into(&mut out, value)?;
        Ok(out)
    }

    fn format_into(&self, out: &mut String, value: Value) -> EvalResult<()> {
        let ty = self.types.get(value.ty);
        match ty.kind() {
            TypeKind::Core(CoreKind::Void) => {}
            TypeKind::Core(CoreKind::Str) => out.push_str(self.read_str(value)?),
            TypeKind::Core(CoreKind::Bool) => {
                out.push_str(if self.read_bool(value)? { "true" } else { "false" });
            }
            TypeKind::Core(k) if k.is_float() => {
                let _ = write!(out, "{}", self.read_scalar(value)?.as_f64());
            }
            TypeKind::Core(k) if k.is_signed() => {
                let _ = write!(out, "{}", self.read_scalar(value)?.as_i64());
            }
            TypeKind::Core(_) => {
                let _ = write!(out, "{}", self.read_scalar(value)?.as_u64());
            }
            TypeKind::Structural(s) if s.kind == StructKind::Enum => {
                let v = self.read_scalar(value)?.as_i64();
                match s.variant_name(v) {
                    Some(name) => out.push_str(self.name(name)),
                    None => {
                        let _ = write!(out, "{}({v})", ty.name());
                    }
                }
            }
            TypeKind::Structural(_) => {
                let _ = write!(out, "<{} at {:#x}>", ty.name(), value.addr);
            }
            TypeKind::Template { kind: TemplateKind::Ref, .. } => {
                let target = self.strip_ref(value)?;
                if self.types.get(target.ty).reference_target().is_some() {
                    let _ = write!(out, "<{}>", self.type_name(target.ty));
                } else {
                    self.format_into(out, target)?;
                }
            }
            TypeKind::Template { kind: TemplateKind::Address, .. } => {
                let _ = write!(out, "{:#x}", self.stack.read_u64(value.addr)?);
            }
            TypeKind::Template { kind: TemplateKind::Array, .. } => {
                let Some((elem, len)) = ty.array() else {
                    return Ok(());
                };
                let size = self.types.size(elem);
                out.push('[');
                for i in 0..len {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    self.format_into(out, Value::new(elem, value.addr + i * size))?;
                }
                out.push(']');
            }
            TypeKind::Callable(_) => {
                let raw = self.stack.read_u64(value.addr + ty.size() - 8)?;
                match self.functions.checked(raw) {
                    Some(f) => {
                        let _ = write!(out, "<function {}>", self.name(self.functions.get(f).name));
                    }
                    None => out.push_str("<function>"),
                }
            }
        }
        Ok(())
    }
}
