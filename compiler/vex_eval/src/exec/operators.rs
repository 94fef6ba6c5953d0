//! Operator fixity, priority and dispatch.
//!
//! Lower priority binds tighter. Ties reduce left to right.

use vex_ir::Name;

use crate::errors::{no_matching_overload, type_conversion_failure, EvalResult};
use crate::interpreter::arg_types;
use crate::memory::Value;
use crate::scope::{resolve, CallSite};
use crate::Interpreter;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Fixity {
    Prefix,
    Infix,
    Postfix,
}

/// Priority of `symbol` used with `fixity`.
pub(crate) fn priority(symbol: &str, fixity: Fixity) -> u8 {
    match fixity {
        Fixity::Postfix => 1,
        Fixity::Prefix => 2,
        Fixity::Infix => match symbol {
            "::" => 0,
            "." => 1,
            "*" | "/" | "%" => 3,
            "+" | "-" => 4,
            "<<" | ">>" => 5,
            "<" | "<=" | ">" | ">=" => 6,
            "==" | "!=" => 7,
            "&" => 8,
            "^" => 9,
            "|" => 10,
            "&&" => 11,
            "||" => 12,
            "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" | "<<=" | ">>=" => 13,
            _ => 14,
        },
    }
}

impl Interpreter {
    /// Resolve and run operator `symbol` on `args`: members of the first
    /// operand's type first, then free operators in scope.
    pub(crate) fn try_operator(&mut self, symbol: Name, args: &[Value]) -> EvalResult<Option<Value>> {
        let Some(receiver) = args.first() else {
            return Ok(None);
        };
        self.ensure_initialized(receiver.ty)?;
        let types = arg_types(args);
        let members = self.types.get(receiver.ty).members();
        let member = resolve(
            &self.types,
            &self.functions,
            self.scopes.get(members).find_operator(symbol),
            CallSite::method(&types),
        );
        let found = match member {
            Some(f) => Some(f),
            None => {
                let free = self.operator_candidates(symbol);
                resolve(&self.types, &self.functions, &free, CallSite::free(&types))
            }
        };
        match found {
            Some(f) => {
                let result = self.invoke(f, args)?;
                Ok(Some(result.unwrap_or_else(|| self.void_value())))
            }
            None => Ok(None),
        }
    }

    /// `l symbol r`, retried once with both sides dereferenced.
    pub(crate) fn binary_operator(&mut self, symbol: Name, l: Value, r: Value) -> EvalResult<Value> {
        if let Some(v) = self.try_operator(symbol, &[l, r])? {
            return Ok(v);
        }
        let (dl, dr) = (self.strip_ref(l)?, self.strip_ref(r)?);
        if (dl, dr) != (l, r) {
            if let Some(v) = self.try_operator(symbol, &[dl, dr])? {
                return Ok(v);
            }
        }
        let label = format!("operator{}", self.name(symbol));
        Err(no_matching_overload(label, &self.type_names(&[l, r])))
    }

    /// `symbol v`. Without an overload, `&` takes the address and `*`
    /// dereferences.
    pub(crate) fn unary_operator(&mut self, symbol: Name, v: Value) -> EvalResult<Value> {
        if let Some(out) = self.try_operator(symbol, &[v])? {
            return Ok(out);
        }
        let d = self.strip_ref(v)?;
        if d != v {
            if let Some(out) = self.try_operator(symbol, &[d])? {
                return Ok(out);
            }
        }
        if symbol == self.ops.amp {
            let ty = self.types.address_of(&mut self.scopes, d.ty)?;
            let out = self.allocate(ty)?;
            self.stack.write_u64(out.addr, d.addr as u64)?;
            return Ok(out);
        }
        if symbol == self.ops.star {
            if let Some(target) = self.types.get(d.ty).address_target() {
                return Ok(Value::new(target, self.stack.read_addr(d.addr)?));
            }
            if d != v {
                return Ok(d);
            }
            return Err(type_conversion_failure(self.type_name(v.ty), "Address"));
        }
        let label = format!("operator{}", self.name(symbol));
        Err(no_matching_overload(label, &self.type_names(&[v])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn multiplicative_binds_tighter_than_additive() {
        assert!(priority("*", Fixity::Infix) < priority("+", Fixity::Infix));
        assert!(priority("+", Fixity::Infix) < priority("==", Fixity::Infix));
        assert!(priority("&&", Fixity::Infix) < priority("||", Fixity::Infix));
        assert!(priority("||", Fixity::Infix) < priority("=", Fixity::Infix));
    }

    #[test]
    fn unary_and_member_access_bind_tightest() {
        assert!(priority("::", Fixity::Infix) < priority(".", Fixity::Infix));
        assert_eq!(priority("()", Fixity::Postfix), priority(".", Fixity::Infix));
        assert!(priority("-", Fixity::Prefix) < priority("*", Fixity::Infix));
        assert_eq!(priority("-", Fixity::Prefix), priority("!", Fixity::Prefix));
    }
}
