//! Overload resolution.
//!
//! Candidates are tried in order and the first whose signature accepts the
//! argument types wins. There is no ranking: a parameter accepts an
//! argument of exactly its type, or of `T` when the parameter is `Ref<T>`.

use tracing::warn;

use crate::function::{Function, FunctionId, FunctionTable};
use crate::types::{TypeId, TypeRegistry};

/// Argument shape of one call.
#[derive(Copy, Clone, Debug)]
pub struct CallSite<'a> {
    pub args: &'a [TypeId],
    /// Only functions whose first parameter is `self` qualify.
    pub method: bool,
    /// Required return type, if the caller constrains it.
    pub ret: Option<TypeId>,
}

impl<'a> CallSite<'a> {
    pub fn free(args: &'a [TypeId]) -> Self {
        CallSite {
            args,
            method: false,
            ret: None,
        }
    }

    pub fn method(args: &'a [TypeId]) -> Self {
        CallSite {
            args,
            method: true,
            ret: None,
        }
    }
}

/// Whether a parameter of type `param` accepts an argument of type `arg`.
#[inline]
pub fn accepts(types: &TypeRegistry, param: TypeId, arg: TypeId) -> bool {
    param == arg || types.get(param).reference_target() == Some(arg)
}

pub fn signature_matches(types: &TypeRegistry, function: &Function, site: CallSite<'_>) -> bool {
    if site.method && !function.is_method() {
        return false;
    }
    if site.ret.is_some_and(|ret| ret != function.ret) {
        return false;
    }
    let fixed = function.fixed_params();
    let arity_ok = if function.is_variadic() {
        site.args.len() >= fixed.len()
    } else {
        site.args.len() == fixed.len()
    };
    arity_ok
        && fixed
            .iter()
            .zip(site.args)
            .all(|(param, &arg)| accepts(types, param.ty, arg))
}

/// First candidate accepting `site`.
pub fn resolve(
    types: &TypeRegistry,
    functions: &FunctionTable,
    candidates: &[FunctionId],
    site: CallSite<'_>,
) -> Option<FunctionId> {
    let mut matching = candidates
        .iter()
        .copied()
        .filter(|&id| signature_matches(types, functions.get(id), site));
    let first = matching.next()?;
    if let Some(other) = matching.find(|&id| id != first) {
        warn!(
            first = first.raw(),
            other = other.raw(),
            "ambiguous overload; using the first declared"
        );
    }
    Some(first)
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "Tests use unwrap for brevity")]
mod tests {
    use super::*;
    use crate::function::{FunctionBody, FunctionFlags, Param};
    use crate::scope::ScopeTree;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use std::rc::Rc;
    use vex_ir::StringInterner;

    struct Fixture {
        interner: StringInterner,
        scopes: ScopeTree,
        types: TypeRegistry,
        functions: FunctionTable,
    }

    impl Fixture {
        fn new() -> Self {
            let mut scopes = ScopeTree::new();
            let types = TypeRegistry::new(&mut scopes);
            Fixture {
                interner: StringInterner::new(),
                scopes,
                types,
                functions: FunctionTable::new(),
            }
        }

        fn add(&mut self, params: &[(&str, TypeId)], flags: FunctionFlags) -> FunctionId {
            let params = params
                .iter()
                .map(|&(name, ty)| Param {
                    name: self.interner.intern(name),
                    ty,
                })
                .collect();
            self.functions.add(Function::new(
                self.interner.intern("f"),
                params,
                TypeId::VOID,
                flags,
                None,
                FunctionBody::Native(Rc::new(|_, _| Ok(None))),
                self.interner.intern("self"),
            ))
        }
    }

    #[test]
    fn exact_types_match() {
        let mut fx = Fixture::new();
        let f = fx.add(&[("a", TypeId::INT32)], FunctionFlags::empty());
        let site = CallSite::free(&[TypeId::INT32]);
        assert_eq!(resolve(&fx.types, &fx.functions, &[f], site), Some(f));
        let site = CallSite::free(&[TypeId::INT64]);
        assert_eq!(resolve(&fx.types, &fx.functions, &[f], site), None);
    }

    #[test]
    fn reference_parameter_accepts_its_target() {
        let mut fx = Fixture::new();
        let r = fx.types.reference_to(&mut fx.scopes, TypeId::INT32).unwrap();
        assert!(accepts(&fx.types, r, TypeId::INT32));
        assert!(accepts(&fx.types, r, r));
        assert!(!accepts(&fx.types, TypeId::INT32, r));
    }

    #[test]
    fn first_match_wins() {
        let mut fx = Fixture::new();
        let r = fx.types.reference_to(&mut fx.scopes, TypeId::INT32).unwrap();
        let by_ref = fx.add(&[("a", r)], FunctionFlags::empty());
        let by_value = fx.add(&[("a", TypeId::INT32)], FunctionFlags::empty());
        let site = CallSite::free(&[TypeId::INT32]);
        assert_eq!(
            resolve(&fx.types, &fx.functions, &[by_ref, by_value], site),
            Some(by_ref)
        );
        assert_eq!(
            resolve(&fx.types, &fx.functions, &[by_value, by_ref], site),
            Some(by_value)
        );
    }

    #[test]
    fn method_sites_require_self() {
        let mut fx = Fixture::new();
        let free = fx.add(&[("a", TypeId::INT32)], FunctionFlags::empty());
        let method = fx.add(&[("self", TypeId::INT32)], FunctionFlags::empty());
        let site = CallSite::method(&[TypeId::INT32]);
        assert_eq!(
            resolve(&fx.types, &fx.functions, &[free, method], site),
            Some(method)
        );
    }

    #[test]
    fn return_type_filters() {
        let mut fx = Fixture::new();
        let f = fx.add(&[], FunctionFlags::empty());
        let site = CallSite {
            args: &[],
            method: false,
            ret: Some(TypeId::INT32),
        };
        assert_eq!(resolve(&fx.types, &fx.functions, &[f], site), None);
    }

    #[test]
    fn variadic_tail_takes_any_count() {
        let mut fx = Fixture::new();
        let f = fx.add(
            &[("first", TypeId::STR), ("...", TypeId::VOID)],
            FunctionFlags::VARIADIC,
        );
        for args in [
            &[TypeId::STR][..],
            &[TypeId::STR, TypeId::INT32],
            &[TypeId::STR, TypeId::BOOL, TypeId::FLOAT64],
        ] {
            assert_eq!(
                resolve(&fx.types, &fx.functions, &[f], CallSite::free(args)),
                Some(f)
            );
        }
        assert_eq!(
            resolve(&fx.types, &fx.functions, &[f], CallSite::free(&[])),
            None
        );
    }

    const PARAM_TYPES: [TypeId; 3] = [TypeId::INT32, TypeId::BOOL, TypeId::STR];

    proptest! {
        #[test]
        fn resolution_picks_the_first_accepting_candidate(
            signatures in prop::collection::vec(
                prop::collection::vec(0usize..PARAM_TYPES.len(), 0..3),
                1..8,
            ),
            call in prop::collection::vec(0usize..PARAM_TYPES.len(), 0..3),
        ) {
            let mut fx = Fixture::new();
            let candidates: Vec<FunctionId> = signatures
                .iter()
                .map(|sig| {
                    let params: Vec<(&str, TypeId)> =
                        sig.iter().map(|&i| ("p", PARAM_TYPES[i])).collect();
                    fx.add(&params, FunctionFlags::empty())
                })
                .collect();
            let args: Vec<TypeId> = call.iter().map(|&i| PARAM_TYPES[i]).collect();
            let expected = signatures
                .iter()
                .position(|sig| *sig == call)
                .map(|i| candidates[i]);
            let site = CallSite::free(&args);
            let first = resolve(&fx.types, &fx.functions, &candidates, site);
            prop_assert_eq!(first, expected);
            prop_assert_eq!(resolve(&fx.types, &fx.functions, &candidates, site), first);
        }
    }
}
