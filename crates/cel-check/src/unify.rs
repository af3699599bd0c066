//! Type parameter unification.
//!
//! Matching an argument against a generic parameter binds the parameter's
//! type variables. Bindings live in a [`Substitutions`] value that belongs to
//! a single overload attempt, so a failed attempt never leaks bindings into
//! the next one.

use std::collections::HashMap;
use std::sync::Arc;

use cel_check_common::CelType;
use thiserror::Error;

/// Why an argument did not unify with a parameter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UnifyError {
    #[error("type parameter '{param}' is bound to '{bound}' but found '{found}'")]
    InconsistentBinding {
        param: String,
        bound: CelType,
        found: CelType,
    },

    #[error("expected '{expected}' but found '{found}'")]
    Mismatch { expected: CelType, found: CelType },
}

/// Type parameter bindings for one overload attempt.
#[derive(Debug, Clone, Default)]
pub struct Substitutions {
    bindings: HashMap<Arc<str>, CelType>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current binding of a type parameter.
    pub fn get(&self, param: &str) -> Option<&CelType> {
        self.bindings.get(param)
    }

    /// Unify an argument type with a parameter type.
    ///
    /// `dyn` and the error sentinel unify with anything without binding.
    /// Unbound parameters bind to the argument; bound ones must be
    /// compatible with it, and a `null` binding widens to a nullable
    /// argument. Parameterized types unify component-wise.
    pub fn unify(&mut self, arg: &CelType, param: &CelType) -> Result<(), UnifyError> {
        if arg.is_dyn_or_error() || param.is_dyn_or_error() {
            return Ok(());
        }

        match (arg, param) {
            (_, CelType::TypeParam(name)) => self.bind(name, arg),
            (CelType::List(arg_elem), CelType::List(param_elem)) => {
                self.unify(arg_elem, param_elem)
            }
            (CelType::Map(arg_key, arg_val), CelType::Map(param_key, param_val)) => {
                self.unify(arg_key, param_key)?;
                self.unify(arg_val, param_val)
            }
            (CelType::Type(arg_inner), CelType::Type(param_inner)) => {
                self.unify(arg_inner, param_inner)
            }
            (
                CelType::Abstract { name: arg_name, params: arg_params },
                CelType::Abstract { name: param_name, params: param_params },
            ) if arg_name == param_name && arg_params.len() == param_params.len() => {
                for (a, p) in arg_params.iter().zip(param_params.iter()) {
                    self.unify(a, p)?;
                }
                Ok(())
            }
            _ if !param.has_type_params() && param.is_assignable_from(arg) => Ok(()),
            _ => Err(UnifyError::Mismatch {
                expected: param.clone(),
                found: arg.clone(),
            }),
        }
    }

    fn bind(&mut self, name: &Arc<str>, arg: &CelType) -> Result<(), UnifyError> {
        let Some(bound) = self.bindings.get(name) else {
            self.bindings.insert(name.clone(), arg.clone());
            return Ok(());
        };

        if !(bound.is_assignable_from(arg) || arg.is_assignable_from(bound)) {
            return Err(UnifyError::InconsistentBinding {
                param: name.to_string(),
                bound: bound.clone(),
                found: arg.clone(),
            });
        }
        if *bound == CelType::Null && arg.is_nullable() {
            self.bindings.insert(name.clone(), arg.clone());
        }
        Ok(())
    }

    /// Apply the bindings to a type. Unbound parameters become `dyn`.
    pub fn substitute(&self, ty: &CelType) -> CelType {
        match ty {
            CelType::TypeParam(name) => self.bindings.get(name).cloned().unwrap_or(CelType::Dyn),
            CelType::List(elem) => CelType::list(self.substitute(elem)),
            CelType::Map(key, val) => CelType::map(self.substitute(key), self.substitute(val)),
            CelType::Type(inner) => CelType::type_of(self.substitute(inner)),
            CelType::Wrapper(inner) => CelType::wrapper(self.substitute(inner)),
            CelType::Abstract { name, params } => CelType::Abstract {
                name: name.clone(),
                params: params.iter().map(|p| self.substitute(p)).collect(),
            },
            _ => ty.clone(),
        }
    }
}
