//! Declaration types for variables, functions, and overloads.
//!
//! These define the environment an expression is checked against. Function
//! declarations with the same name merge their overload lists; the merge
//! rejects redefinitions and overlapping signatures.

use thiserror::Error;

use crate::{CelType, CelValue};

/// Errors raised while assembling declarations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclError {
    /// The same overload id was declared twice with different signatures.
    #[error("overload redefinition in function '{function}': '{overload}' has multiple definitions")]
    OverloadRedefinition { function: String, overload: String },

    /// Two distinct overloads accept the same arguments.
    #[error("overload signature collision in function '{function}': '{overload}' collides with '{existing}'")]
    OverloadCollision {
        function: String,
        overload: String,
        existing: String,
    },

    /// An identifier was redeclared with a different type in the same scope.
    #[error("overlapping identifier for name '{name}'")]
    OverlappingIdentifier { name: String },
}

/// Variable declaration.
///
/// Represents a variable or constant that can be referenced in expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub name: String,
    pub cel_type: CelType,
    /// Compile-time value for constants such as enum values.
    pub const_value: Option<CelValue>,
}

impl VariableDecl {
    pub fn new(name: impl Into<String>, cel_type: CelType) -> Self {
        Self {
            name: name.into(),
            cel_type,
            const_value: None,
        }
    }

    /// Create a constant declaration with a compile-time value.
    pub fn constant(name: impl Into<String>, cel_type: CelType, value: CelValue) -> Self {
        Self {
            name: name.into(),
            cel_type,
            const_value: Some(value),
        }
    }
}

/// A single signature of a function.
///
/// Member overloads carry the receiver type as their first parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct OverloadDecl {
    /// Unique identifier, e.g. `add_int64_int64`.
    pub id: String,
    pub params: Vec<CelType>,
    pub result: CelType,
    /// Whether this overload is called as `receiver.function(args)`.
    pub is_member: bool,
    /// Names of the type parameters the signature is generic over.
    pub type_params: Vec<String>,
    /// Whether the overload accepts error and unknown arguments.
    pub non_strict: bool,
}

impl OverloadDecl {
    /// Create a global function overload.
    pub fn function(id: impl Into<String>, params: Vec<CelType>, result: CelType) -> Self {
        Self {
            id: id.into(),
            params,
            result,
            is_member: false,
            type_params: Vec::new(),
            non_strict: false,
        }
    }

    /// Create a member function overload; `params[0]` is the receiver.
    pub fn method(id: impl Into<String>, params: Vec<CelType>, result: CelType) -> Self {
        Self {
            is_member: true,
            ..Self::function(id, params, result)
        }
    }

    /// Declare the type parameters of a generic overload.
    pub fn with_type_params<S: Into<String>>(mut self, params: impl IntoIterator<Item = S>) -> Self {
        self.type_params = params.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the overload as non-strict.
    pub fn non_strict(mut self) -> Self {
        self.non_strict = true;
        self
    }

    /// Get the receiver type for member functions.
    pub fn receiver_type(&self) -> Option<&CelType> {
        if self.is_member {
            self.params.first()
        } else {
            None
        }
    }

    /// Get the argument types (excluding receiver for member functions).
    pub fn arg_types(&self) -> &[CelType] {
        if self.is_member && !self.params.is_empty() {
            &self.params[1..]
        } else {
            &self.params
        }
    }

    /// Two overloads overlap when a single call could match both.
    pub fn signature_overlaps(&self, other: &OverloadDecl) -> bool {
        self.is_member == other.is_member
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(other.params.iter())
                .all(|(a, b)| a.is_assignable_from(b) || b.is_assignable_from(a))
    }

    fn signature_eq(&self, other: &OverloadDecl) -> bool {
        self.is_member == other.is_member && self.params == other.params && self.result == other.result
    }
}

/// Function declaration with overloads.
///
/// Overloads are kept in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub overloads: Vec<OverloadDecl>,
}

impl FunctionDecl {
    /// Create a new function declaration with no overloads.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overloads: Vec::new(),
        }
    }

    /// Add an overload without validation.
    pub fn with_overload(mut self, overload: OverloadDecl) -> Self {
        self.overloads.push(overload);
        self
    }

    /// Add multiple overloads without validation.
    pub fn with_overloads(mut self, overloads: impl IntoIterator<Item = OverloadDecl>) -> Self {
        self.overloads.extend(overloads);
        self
    }

    /// Add an overload, enforcing the merge rules.
    ///
    /// An identical overload is ignored. Reusing an id with a different
    /// signature, or adding a signature that overlaps an existing overload,
    /// is an error.
    pub fn add_overload(&mut self, overload: OverloadDecl) -> Result<(), DeclError> {
        for existing in &self.overloads {
            if existing.id == overload.id {
                if existing.signature_eq(&overload) {
                    return Ok(());
                }
                return Err(DeclError::OverloadRedefinition {
                    function: self.name.clone(),
                    overload: overload.id,
                });
            }
            if existing.signature_overlaps(&overload) {
                return Err(DeclError::OverloadCollision {
                    function: self.name.clone(),
                    overload: overload.id,
                    existing: existing.id.clone(),
                });
            }
        }
        self.overloads.push(overload);
        Ok(())
    }

    /// Merge another declaration of the same function into this one.
    pub fn merge(&mut self, other: FunctionDecl) -> Result<(), DeclError> {
        for overload in other.overloads {
            self.add_overload(overload)?;
        }
        Ok(())
    }

    /// Check if this function has any member overloads.
    pub fn has_member_overloads(&self) -> bool {
        self.overloads.iter().any(|o| o.is_member)
    }

    /// Check if this function has any global overloads.
    pub fn has_global_overloads(&self) -> bool {
        self.overloads.iter().any(|o| !o.is_member)
    }
}
