//! Construction, destruction and assignment of values in place.

use std::rc::Rc;

use smallvec::SmallVec;

use super::invoke::arg_types;
use super::Interpreter;
use crate::errors::{no_matching_overload, type_conversion_failure, EvalResult};
use crate::function::{FunctionFlags, FunctionId};
use crate::memory::{FrameKind, Value};
use crate::scope::{resolve, CallSite};
use crate::types::{Field, StructKind, TypeId, TypeKind};

impl Interpreter {
    /// `construct` overload of `ty` accepting `args` after the receiver.
    pub(crate) fn constructor_for(&mut self, ty: TypeId, args: &[Value]) -> EvalResult<Option<FunctionId>> {
        self.ensure_initialized(ty)?;
        self.member_function(ty, self.names.construct, args)
    }

    /// Resolve a member function of `ty` for a receiver of `ty` plus `args`.
    fn member_function(&self, ty: TypeId, name: vex_ir::Name, args: &[Value]) -> EvalResult<Option<FunctionId>> {
        let mut types: SmallVec<[TypeId; 4]> = SmallVec::with_capacity(args.len() + 1);
        types.push(ty);
        types.extend(arg_types(args));
        let members = self.types.get(ty).members();
        Ok(resolve(
            &self.types,
            &self.functions,
            self.scopes.get(members).find_function(name),
            CallSite::method(&types),
        ))
    }

    /// Run constructor `f` on the place `dst`.
    ///
    /// Source-level constructors of classes see their fields already
    /// default-initialized.
    fn run_constructor(&mut self, f: FunctionId, dst: Value, args: &[Value]) -> EvalResult<()> {
        let user_defined = !self.functions.get(f).flags.contains(FunctionFlags::SYNTHESIZED);
        if user_defined && self.types.get(dst.ty).structural().is_some() {
            self.init_fields(dst)?;
        }
        let mut full: SmallVec<[Value; 4]> = SmallVec::with_capacity(args.len() + 1);
        full.push(dst);
        full.extend_from_slice(args);
        self.invoke(f, &full)?;
        Ok(())
    }

    /// Construct `dst` (zeroed memory) from `src`.
    pub fn copy_construct(&mut self, dst: Value, src: Value) -> EvalResult<()> {
        if dst.ty == TypeId::VOID {
            return Ok(());
        }
        match self.constructor_for(dst.ty, &[src])? {
            Some(f) => self.run_constructor(f, dst, &[src]),
            None => Err(type_conversion_failure(
                self.type_name(src.ty),
                self.type_name(dst.ty),
            )),
        }
    }

    /// Allocate a fresh `ty` in the top frame and construct it from `args`.
    pub fn construct_new(&mut self, ty: TypeId, args: &[Value]) -> EvalResult<Value> {
        if args.is_empty() {
            let place = self.allocate(ty)?;
            self.default_construct(place)?;
            return Ok(place);
        }
        let Some(f) = self.constructor_for(ty, args)? else {
            let label = format!("{}::construct", self.type_name(ty));
            return Err(no_matching_overload(label, &self.type_names(args)));
        };
        let place = self.allocate(ty)?;
        self.run_constructor(f, place, args)?;
        Ok(place)
    }

    /// Default-construct zeroed memory: nested fields and initializers,
    /// then a zero-argument `construct`. Arrays construct each element.
    pub fn default_construct(&mut self, place: Value) -> EvalResult<()> {
        let ty = self.types.get(place.ty);
        if !ty.is_aggregate() {
            return Ok(());
        }
        if let Some((elem, len)) = ty.array() {
            let size = self.types.size(elem);
            for i in 0..len {
                self.default_construct(Value::new(elem, place.addr + i * size))?;
            }
            return Ok(());
        }
        self.init_fields(place)?;
        self.ensure_initialized(place.ty)?;
        if let Some(f) = self.member_function(place.ty, self.names.construct, &[])? {
            self.invoke(f, &[place])?;
        }
        Ok(())
    }

    fn fields_of(&self, ty: TypeId) -> Option<(StructKind, Vec<Field>)> {
        self.types
            .get(ty)
            .structural()
            .map(|s| (s.kind, s.fields.clone()))
    }

    /// Default-construct the fields of a class and run their initializers.
    ///
    /// Initializers run in the class's own scope, in a frame that sees no
    /// locals of the constructing code.
    fn init_fields(&mut self, place: Value) -> EvalResult<()> {
        let Some((StructKind::Class, fields)) = self.fields_of(place.ty) else {
            return Ok(());
        };
        let class_scope = self.types.get(place.ty).members();
        for field in fields {
            let slot = place.at_offset(field.ty, field.offset);
            match field.init {
                Some(init) => {
                    self.with_frame(class_scope, FrameKind::Function, None, |interp| {
                        let value = interp.with_tree(Rc::clone(&init.tree), |interp, tree| {
                            interp.evaluate_expression(tree.node(init.node))
                        })?;
                        interp.copy_construct(slot, value)
                    })?;
                }
                None => self.default_construct(slot)?,
            }
        }
        Ok(())
    }

    /// Run destructors for `value`: the user `destruct`, then fields in
    /// reverse declaration order. Array elements go last to first.
    pub fn destroy(&mut self, value: Value) -> EvalResult<()> {
        let ty = self.types.get(value.ty);
        if !ty.is_aggregate() {
            return Ok(());
        }
        if let Some((elem, len)) = ty.array() {
            let size = self.types.size(elem);
            for i in (0..len).rev() {
                self.destroy(Value::new(elem, value.addr + i * size))?;
            }
            return Ok(());
        }
        if let Some(f) = self.member_function(value.ty, self.names.destruct, &[])? {
            self.invoke(f, &[value])?;
        }
        if let Some((StructKind::Class, fields)) = self.fields_of(value.ty) {
            for field in fields.iter().rev() {
                self.destroy(value.at_offset(field.ty, field.offset))?;
            }
        }
        Ok(())
    }

    /// `dst = src` through the assignment operator of `dst`'s type.
    pub fn assign(&mut self, dst: Value, src: Value) -> EvalResult<()> {
        self.binary_operator(self.ops.assign, dst, src).map(|_| ())
    }

    /// Member-wise copy used by synthesized copy constructors.
    pub(crate) fn copy_members(&mut self, dst: Value, src: Value) -> EvalResult<()> {
        match self.types.get(dst.ty).kind() {
            TypeKind::Structural(s) if s.kind == StructKind::Class => {
                let fields = s.fields.clone();
                for field in fields {
                    self.copy_construct(
                        dst.at_offset(field.ty, field.offset),
                        src.at_offset(field.ty, field.offset),
                    )?;
                }
                Ok(())
            }
            _ => {
                if let Some((elem, len)) = self.types.get(dst.ty).array() {
                    let size = self.types.size(elem);
                    for i in 0..len {
                        let offset = i * size;
                        self.copy_construct(dst.at_offset(elem, offset), src.at_offset(elem, offset))?;
                    }
                    return Ok(());
                }
                let size = self.types.size(dst.ty);
                self.stack.copy(src.addr, dst.addr, size)
            }
        }
    }

    /// Member-wise assignment used by synthesized `=`.
    pub(crate) fn assign_members(&mut self, dst: Value, src: Value) -> EvalResult<()> {
        match self.types.get(dst.ty).kind() {
            TypeKind::Structural(s) if s.kind == StructKind::Class => {
                let fields = s.fields.clone();
                for field in fields {
                    self.assign(
                        dst.at_offset(field.ty, field.offset),
                        src.at_offset(field.ty, field.offset),
                    )?;
                }
                Ok(())
            }
            _ => {
                if let Some((elem, len)) = self.types.get(dst.ty).array() {
                    let size = self.types.size(elem);
                    for i in 0..len {
                        let offset = i * size;
                        self.assign(dst.at_offset(elem, offset), src.at_offset(elem, offset))?;
                    }
                    return Ok(());
                }
                let size = self.types.size(dst.ty);
                self.stack.copy(src.addr, dst.addr, size)
            }
        }
    }
}
