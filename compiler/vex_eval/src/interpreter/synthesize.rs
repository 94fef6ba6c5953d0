//! Members the engine adds to a type the first time it is used.
//!
//! Post-initialization runs once per type, on the first member lookup,
//! and registers native functions in the type's member scope: copy
//! construction and assignment for everything, arithmetic for numbers,
//! element access for arrays and addresses, rebinding and write-through for
//! references. User-declared members are registered earlier, so they win
//! first-match resolution over anything synthesized here.

use std::cmp::Ordering;

use tracing::trace;
use vex_ir::Name;

use super::Interpreter;
use crate::errors::{division_by_zero, invalid_memory_access, type_conversion_failure, EvalResult};
use crate::function::{Function, FunctionBody, FunctionFlags, FunctionId, Param};
use crate::memory::{Scalar, Value};
use crate::scope::{resolve, CallSite};
use crate::types::{CoreKind, StructKind, TemplateKind, TypeId, TypeKind};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Arith {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl Arith {
    const NUMERIC: [(&'static str, Arith); 5] = [
        ("+", Arith::Add),
        ("-", Arith::Sub),
        ("*", Arith::Mul),
        ("/", Arith::Div),
        ("%", Arith::Rem),
    ];
    const BITWISE: [(&'static str, Arith); 5] = [
        ("&", Arith::And),
        ("|", Arith::Or),
        ("^", Arith::Xor),
        ("<<", Arith::Shl),
        (">>", Arith::Shr),
    ];
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Compare {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Compare {
    const ALL: [(&'static str, Compare); 6] = [
        ("==", Compare::Eq),
        ("!=", Compare::Ne),
        ("<", Compare::Lt),
        ("<=", Compare::Le),
        (">", Compare::Gt),
        (">=", Compare::Ge),
    ];

    fn holds(self, ord: Option<Ordering>) -> bool {
        match self {
            Compare::Eq => ord == Some(Ordering::Equal),
            Compare::Ne => ord != Some(Ordering::Equal),
            Compare::Lt => ord == Some(Ordering::Less),
            Compare::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
            Compare::Gt => ord == Some(Ordering::Greater),
            Compare::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

/// Integer and float arithmetic at the width of `kind`.
///
/// Integers wrap; division and remainder by zero are errors.
fn arith(op: Arith, kind: CoreKind, l: Scalar, r: Scalar) -> EvalResult<Scalar> {
    let out = if kind.is_float() {
        let (a, b) = (l.as_f64(), r.as_f64());
        Scalar::Float(match op {
            Arith::Add => a + b,
            Arith::Sub => a - b,
            Arith::Mul => a * b,
            Arith::Div => a / b,
            Arith::Rem => a % b,
            _ => return Err(type_conversion_failure(kind.name(), "integer")),
        })
    } else if kind.is_signed() {
        let (a, b) = (l.as_i64(), r.as_i64());
        Scalar::Int(match op {
            Arith::Add => a.wrapping_add(b),
            Arith::Sub => a.wrapping_sub(b),
            Arith::Mul => a.wrapping_mul(b),
            Arith::Div | Arith::Rem if b == 0 => return Err(division_by_zero()),
            Arith::Div => a.wrapping_div(b),
            Arith::Rem => a.wrapping_rem(b),
            Arith::And => a & b,
            Arith::Or => a | b,
            Arith::Xor => a ^ b,
            Arith::Shl => a.wrapping_shl(b as u32),
            Arith::Shr => a.wrapping_shr(b as u32),
        })
    } else {
        let (a, b) = (l.as_u64(), r.as_u64());
        Scalar::UInt(match op {
            Arith::Add => a.wrapping_add(b),
            Arith::Sub => a.wrapping_sub(b),
            Arith::Mul => a.wrapping_mul(b),
            Arith::Div | Arith::Rem if b == 0 => return Err(division_by_zero()),
            Arith::Div => a / b,
            Arith::Rem => a % b,
            Arith::And => a & b,
            Arith::Or => a | b,
            Arith::Xor => a ^ b,
            Arith::Shl => a.wrapping_shl(b as u32),
            Arith::Shr => a.wrapping_shr(b as u32),
        })
    };
    Ok(out.cast(kind))
}

fn ordering(kind: CoreKind, l: Scalar, r: Scalar) -> Option<Ordering> {
    if kind.is_float() {
        l.as_f64().partial_cmp(&r.as_f64())
    } else if kind.is_signed() {
        Some(l.as_i64().cmp(&r.as_i64()))
    } else {
        Some(l.as_u64().cmp(&r.as_u64()))
    }
}

/// `base + n * size`, refusing to leave the address space.
fn offset_address(base: usize, n: i64, size: usize) -> EvalResult<usize> {
    i64::try_from(size)
        .ok()
        .and_then(|size| n.checked_mul(size))
        .and_then(|delta| i64::try_from(base).ok()?.checked_add(delta))
        .and_then(|addr| usize::try_from(addr).ok())
        .ok_or_else(|| invalid_memory_access(base, size))
}

/// Address of element `index` of `len` elements at `base`.
fn element_address(base: usize, index: i64, len: usize, size: usize) -> EvalResult<usize> {
    match usize::try_from(index) {
        Ok(i) if i < len => Ok(base + i * size),
        _ => Err(invalid_memory_access(base, size)
            .with_hint(format!("index {index} out of bounds for length {len}"))),
    }
}

impl Interpreter {
    /// Run post-initialization for `ty` if it has not run yet.
    ///
    /// Incomplete types are left alone; they initialize on a later lookup
    /// once their layout is known.
    pub(crate) fn ensure_initialized(&mut self, ty: TypeId) -> EvalResult<()> {
        let t = self.types.get(ty);
        if t.is_initialized() || !t.is_complete() || ty == TypeId::VOID {
            return Ok(());
        }
        self.types.mark_initialized(ty);
        trace!(name = self.type_name(ty), "post-initialize");

        let this_ref = self.reference_type(ty)?;
        match self.types.get(ty).kind().clone() {
            TypeKind::Core(CoreKind::Void) => {}
            TypeKind::Core(CoreKind::Bool) => self.synthesize_bool(ty, this_ref),
            TypeKind::Core(CoreKind::Str) => self.synthesize_str(ty, this_ref),
            TypeKind::Core(core) => self.synthesize_numeric(ty, this_ref, core),
            TypeKind::Callable(_) => self.synthesize_bitwise(ty, this_ref),
            TypeKind::Template { kind, .. } => match kind {
                TemplateKind::Array => self.synthesize_array(ty, this_ref)?,
                TemplateKind::Ref => self.synthesize_reference(ty, this_ref),
                TemplateKind::Address => self.synthesize_address(ty, this_ref)?,
            },
            TypeKind::Structural(s) if s.kind == StructKind::Enum => {
                self.synthesize_bitwise(ty, this_ref);
                self.synthesize_equality(ty);
            }
            TypeKind::Structural(_) => self.synthesize_aggregate(ty, this_ref),
        }
        Ok(())
    }

    fn param(&self, name: &str, ty: TypeId) -> Param {
        Param {
            name: self.intern(name),
            ty,
        }
    }

    fn self_param(&self, ty: TypeId) -> Param {
        Param {
            name: self.names.self_,
            ty,
        }
    }

    /// Register a native member of `owner`.
    fn add_member(
        &mut self,
        owner: TypeId,
        name: Name,
        params: Vec<Param>,
        ret: TypeId,
        body: impl Fn(&mut Interpreter, &[Value]) -> EvalResult<Option<Value>> + 'static,
    ) -> FunctionId {
        let mut flags = FunctionFlags::SYNTHESIZED;
        if name == self.names.construct {
            flags |= FunctionFlags::CONSTRUCTOR;
        }
        let function = Function::new(
            name,
            params,
            ret,
            flags,
            Some(owner),
            FunctionBody::Native(std::rc::Rc::new(body)),
            self.names.self_,
        );
        let id = self.functions.add(function);
        self.scopes
            .get_mut(self.types.get(owner).members())
            .register_function(name, id);
        id
    }

    /// Register a native operator of `owner`.
    fn add_operator(
        &mut self,
        owner: TypeId,
        symbol: &str,
        params: Vec<Param>,
        ret: TypeId,
        body: impl Fn(&mut Interpreter, &[Value]) -> EvalResult<Option<Value>> + 'static,
    ) -> FunctionId {
        let symbol = self.intern(symbol);
        let function = Function::new(
            symbol,
            params,
            ret,
            FunctionFlags::SYNTHESIZED,
            Some(owner),
            FunctionBody::Native(std::rc::Rc::new(body)),
            self.names.self_,
        );
        let id = self.functions.add(function);
        self.scopes
            .get_mut(self.types.get(owner).members())
            .register_operator(symbol, id);
        id
    }

    /// Bytewise copy constructor and assignment.
    fn synthesize_bitwise(&mut self, ty: TypeId, this_ref: TypeId) {
        let size = self.types.size(ty);
        let params = vec![self.self_param(this_ref), self.param("rhs", this_ref)];
        self.add_member(ty, self.names.construct, params, TypeId::VOID, move |interp, args| {
            interp.stack.copy(args[1].addr, args[0].addr, size)?;
            Ok(None)
        });
        let params = vec![self.self_param(this_ref), self.param("rhs", ty)];
        self.add_operator(ty, "=", params, ty, move |interp, args| {
            interp.stack.copy(args[1].addr, args[0].addr, size)?;
            Ok(Some(args[0]))
        });
    }

    /// `==` and `!=` over the scalar representation.
    fn synthesize_equality(&mut self, ty: TypeId) {
        for (symbol, op) in [("==", Compare::Eq), ("!=", Compare::Ne)] {
            let params = vec![self.self_param(ty), self.param("rhs", ty)];
            self.add_operator(ty, symbol, params, TypeId::BOOL, move |interp, args| {
                let (l, r) = (interp.read_scalar(args[0])?, interp.read_scalar(args[1])?);
                let ord = Some(l.as_i64().cmp(&r.as_i64()));
                interp.alloc_bool(op.holds(ord)).map(Some)
            });
        }
    }

    fn synthesize_numeric(&mut self, ty: TypeId, this_ref: TypeId, core: CoreKind) {
        self.synthesize_bitwise(ty, this_ref);

        for from in CoreKind::ALL.into_iter().filter(|k| k.is_numeric() && *k != core) {
            let params = vec![self.self_param(this_ref), self.param("rhs", from.type_id())];
            self.add_member(ty, self.names.construct, params, TypeId::VOID, move |interp, args| {
                let v = interp.stack.read_scalar(args[1].addr, from)?;
                interp.stack.write_scalar(args[0].addr, core, v.cast(core))?;
                Ok(None)
            });
        }

        let bitwise: &[(&str, Arith)] = if core.is_integer() { &Arith::BITWISE } else { &[] };
        for &(symbol, op) in Arith::NUMERIC.iter().chain(bitwise) {
            let params = vec![self.self_param(ty), self.param("rhs", ty)];
            self.add_operator(ty, symbol, params, ty, move |interp, args| {
                let l = interp.stack.read_scalar(args[0].addr, core)?;
                let r = interp.stack.read_scalar(args[1].addr, core)?;
                let out = arith(op, core, l, r)?;
                interp.alloc_scalar(ty, out).map(Some)
            });
        }
        for (symbol, op) in Arith::NUMERIC {
            let compound = format!("{symbol}=");
            let params = vec![self.self_param(this_ref), self.param("rhs", ty)];
            self.add_operator(ty, &compound, params, ty, move |interp, args| {
                let l = interp.stack.read_scalar(args[0].addr, core)?;
                let r = interp.stack.read_scalar(args[1].addr, core)?;
                let out = arith(op, core, l, r)?;
                interp.stack.write_scalar(args[0].addr, core, out)?;
                Ok(Some(args[0]))
            });
        }

        for (symbol, op) in Compare::ALL {
            let params = vec![self.self_param(ty), self.param("rhs", ty)];
            self.add_operator(ty, symbol, params, TypeId::BOOL, move |interp, args| {
                let l = interp.stack.read_scalar(args[0].addr, core)?;
                let r = interp.stack.read_scalar(args[1].addr, core)?;
                interp.alloc_bool(op.holds(ordering(core, l, r))).map(Some)
            });
        }

        let params = vec![self.self_param(ty)];
        self.add_operator(ty, "-", params, ty, move |interp, args| {
            let v = interp.stack.read_scalar(args[0].addr, core)?;
            let out = match v {
                Scalar::Float(f) => Scalar::Float(-f),
                Scalar::Int(i) => Scalar::Int(i.wrapping_neg()),
                other => Scalar::UInt(other.as_u64().wrapping_neg()),
            };
            interp.alloc_scalar(ty, out.cast(core)).map(Some)
        });
        if core.is_integer() {
            let params = vec![self.self_param(ty)];
            self.add_operator(ty, "~", params, ty, move |interp, args| {
                let v = interp.stack.read_scalar(args[0].addr, core)?;
                let out = Scalar::UInt(!v.as_u64()).cast(core);
                interp.alloc_scalar(ty, out).map(Some)
            });
        }
    }

    fn synthesize_bool(&mut self, ty: TypeId, this_ref: TypeId) {
        self.synthesize_bitwise(ty, this_ref);
        let params = vec![self.self_param(ty)];
        self.add_operator(ty, "!", params, ty, |interp, args| {
            let v = interp.read_bool(args[0])?;
            interp.alloc_bool(!v).map(Some)
        });
        let ops: [(&str, fn(bool, bool) -> bool); 4] = [
            ("==", |a, b| a == b),
            ("!=", |a, b| a != b),
            ("&&", |a, b| a && b),
            ("||", |a, b| a || b),
        ];
        for (symbol, op) in ops {
            let params = vec![self.self_param(ty), self.param("rhs", ty)];
            self.add_operator(ty, symbol, params, ty, move |interp, args| {
                let (a, b) = (interp.read_bool(args[0])?, interp.read_bool(args[1])?);
                interp.alloc_bool(op(a, b)).map(Some)
            });
        }
    }

    fn synthesize_str(&mut self, ty: TypeId, this_ref: TypeId) {
        self.synthesize_bitwise(ty, this_ref);
        let params = vec![self.self_param(ty), self.param("rhs", ty)];
        self.add_operator(ty, "+", params, ty, |interp, args| {
            let joined = format!("{}{}", interp.read_str(args[0])?, interp.read_str(args[1])?);
            interp.alloc_str(&joined).map(Some)
        });
        for (symbol, op) in [("==", Compare::Eq), ("!=", Compare::Ne), ("<", Compare::Lt)] {
            let params = vec![self.self_param(ty), self.param("rhs", ty)];
            self.add_operator(ty, symbol, params, TypeId::BOOL, move |interp, args| {
                let ord = interp.read_str(args[0])?.cmp(interp.read_str(args[1])?);
                interp.alloc_bool(op.holds(Some(ord))).map(Some)
            });
        }
        let params = vec![self.self_param(this_ref)];
        self.add_member(ty, self.names.size, params, TypeId::INT32, |interp, args| {
            let len = interp.read_str(args[0])?.chars().count();
            interp.alloc_scalar(TypeId::INT32, Scalar::Int(len as i64)).map(Some)
        });
    }

    fn synthesize_array(&mut self, ty: TypeId, this_ref: TypeId) -> EvalResult<()> {
        let Some((elem, len)) = self.types.get(ty).array() else {
            return Ok(());
        };
        let elem_size = self.types.size(elem);

        if self.types.get(elem).is_aggregate() {
            let params = vec![self.self_param(this_ref), self.param("rhs", this_ref)];
            self.add_member(ty, self.names.construct, params, TypeId::VOID, |interp, args| {
                interp.copy_members(args[0], args[1])?;
                Ok(None)
            });
            let params = vec![self.self_param(this_ref), self.param("rhs", ty)];
            self.add_operator(ty, "=", params, ty, |interp, args| {
                interp.assign_members(args[0], args[1])?;
                Ok(Some(args[0]))
            });
        } else {
            self.synthesize_bitwise(ty, this_ref);
        }

        let address = self.types.address_of(&mut self.scopes, elem)?;
        let params = vec![self.self_param(this_ref)];
        self.add_member(ty, self.names.data, params, address, move |interp, args| {
            let out = interp.allocate(address)?;
            interp.stack.write_u64(out.addr, args[0].addr as u64)?;
            Ok(Some(out))
        });
        let params = vec![self.self_param(this_ref)];
        self.add_member(ty, self.names.size, params, TypeId::INT32, move |interp, _| {
            interp.alloc_scalar(TypeId::INT32, Scalar::Int(len as i64)).map(Some)
        });
        for index in [TypeId::INT32, TypeId::INT64] {
            let params = vec![self.self_param(this_ref), self.param("index", index)];
            self.add_operator(ty, "[]", params, elem, move |interp, args| {
                let i = interp.read_scalar(args[1])?.as_i64();
                let addr = element_address(args[0].addr, i, len, elem_size)?;
                Ok(Some(Value::new(elem, addr)))
            });
        }
        Ok(())
    }

    /// `Ref<X>`: copy, bind, `get` and write-through assignment.
    fn synthesize_reference(&mut self, ty: TypeId, this_ref: TypeId) {
        let Some(target) = self.types.get(ty).reference_target() else {
            return;
        };

        let params = vec![self.self_param(this_ref), self.param("rhs", this_ref)];
        self.add_member(ty, self.names.construct, params, TypeId::VOID, |interp, args| {
            interp.stack.copy(args[1].addr, args[0].addr, 8)?;
            Ok(None)
        });
        let params = vec![self.self_param(this_ref), self.param("target", ty)];
        self.add_member(ty, self.names.construct, params, TypeId::VOID, |interp, args| {
            interp.stack.write_u64(args[0].addr, args[1].addr as u64)?;
            Ok(None)
        });

        let params = vec![self.self_param(this_ref)];
        self.add_member(ty, self.names.get, params, target, move |interp, args| {
            let addr = interp.stack.read_addr(args[0].addr)?;
            Ok(Some(Value::new(target, addr)))
        });

        for rhs in [target, ty] {
            let params = vec![self.self_param(this_ref), self.param("rhs", rhs)];
            self.add_operator(ty, "=", params, target, move |interp, args| {
                let dst = Value::new(target, interp.stack.read_addr(args[0].addr)?);
                interp.assign(dst, args[1])?;
                Ok(Some(dst))
            });
        }
    }

    /// `Address<X>`: rebinding, `get`, pointer arithmetic and indexing.
    fn synthesize_address(&mut self, ty: TypeId, this_ref: TypeId) -> EvalResult<()> {
        let Some(target) = self.types.get(ty).address_target() else {
            return Ok(());
        };
        let elem_size = self.types.size(target);
        self.synthesize_bitwise(ty, this_ref);

        let params = vec![self.self_param(ty)];
        self.add_member(ty, self.names.get, params, target, move |interp, args| {
            let addr = interp.stack.read_addr(args[0].addr)?;
            Ok(Some(Value::new(target, addr)))
        });

        for (symbol, sign) in [("+", 1i64), ("-", -1i64)] {
            let params = vec![self.self_param(ty), self.param("offset", TypeId::INT32)];
            self.add_operator(ty, symbol, params, ty, move |interp, args| {
                let base = interp.stack.read_addr(args[0].addr)?;
                let n = interp.read_scalar(args[1])?.as_i64() * sign;
                let addr = offset_address(base, n, elem_size)?;
                let out = interp.allocate(ty)?;
                interp.stack.write_u64(out.addr, addr as u64)?;
                Ok(Some(out))
            });
        }

        let params = vec![self.self_param(ty), self.param("index", TypeId::INT32)];
        self.add_operator(ty, "[]", params, target, move |interp, args| {
            let base = interp.stack.read_addr(args[0].addr)?;
            let n = interp.read_scalar(args[1])?.as_i64();
            Ok(Some(Value::new(target, offset_address(base, n, elem_size)?)))
        });

        for (symbol, op) in [("==", Compare::Eq), ("!=", Compare::Ne)] {
            let params = vec![self.self_param(ty), self.param("rhs", ty)];
            self.add_operator(ty, symbol, params, TypeId::BOOL, move |interp, args| {
                let (l, r) = (interp.stack.read_u64(args[0].addr)?, interp.stack.read_u64(args[1].addr)?);
                interp.alloc_bool(op.holds(Some(l.cmp(&r)))).map(Some)
            });
        }
        Ok(())
    }

    /// Member-wise copy and assignment for classes and unions, unless the
    /// class already declares an overload taking another instance.
    fn synthesize_aggregate(&mut self, ty: TypeId, this_ref: TypeId) {
        let members = self.types.get(ty).members();
        let site = [ty, ty];
        let scope = self.scopes.get(members);
        let has_copy = resolve(
            &self.types,
            &self.functions,
            scope.find_function(self.names.construct),
            CallSite::method(&site),
        )
        .is_some();
        let has_assign = resolve(
            &self.types,
            &self.functions,
            scope.find_operator(self.ops.assign),
            CallSite::method(&site),
        )
        .is_some();

        if !has_copy {
            let params = vec![self.self_param(this_ref), self.param("rhs", this_ref)];
            self.add_member(ty, self.names.construct, params, TypeId::VOID, |interp, args| {
                interp.copy_members(args[0], args[1])?;
                Ok(None)
            });
        }
        if !has_assign {
            let params = vec![self.self_param(this_ref), self.param("rhs", ty)];
            self.add_operator(ty, "=", params, ty, |interp, args| {
                interp.assign_members(args[0], args[1])?;
                Ok(Some(args[0]))
            });
        }
    }
}
