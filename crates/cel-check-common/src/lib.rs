//! Common types for the CEL type checker.
//!
//! This crate provides the foundational types shared by the checker:
//!
//! - **Type System**: `CelType` with parameterized types like `list(T)`,
//!   `map(K, V)` and `type(T)`, plus the assignability and join rules.
//! - **Values**: `CelValue` for literal and constant values.
//! - **AST**: The checked expression tree (`Expr`, `SpannedExpr`, `Ast`) and an
//!   `ExprFactory` that builds nodes and expands the standard macros.
//! - **Declarations**: `FunctionDecl`, `OverloadDecl`, `VariableDecl`.
//! - **Containers**: `Container` namespace and alias resolution.
//! - **Sources**: `Source` line/column bookkeeping for diagnostics.
//! - **Type Providers**: the `TypeProvider` trait and a protobuf-backed
//!   implementation.

use std::fmt;
use std::sync::Arc;

mod ast;
pub use ast::{
    Ast, ComprehensionExpr, Expr, ExprFactory, MapEntry, Span, Spanned, SpannedExpr, StructField,
    ACCU_VAR,
};

mod container;
pub use container::{Container, ContainerError};

mod decls;
pub use decls::{DeclError, FunctionDecl, OverloadDecl, VariableDecl};

mod source;
pub use source::{Location, Source};

pub mod provider;
pub use provider::{ProtoTypeProvider, ProviderError, TypeProvider};

// ==================== CelValue ====================

/// A CEL constant value.
///
/// Literals in the AST and compile-time constants (such as enum values
/// resolved through a type provider) use this representation.
#[derive(Debug, Clone, PartialEq)]
pub enum CelValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
}

impl CelValue {
    /// The literal type of this value.
    pub fn cel_type(&self) -> CelType {
        match self {
            CelValue::Null => CelType::Null,
            CelValue::Bool(_) => CelType::Bool,
            CelValue::Int(_) => CelType::Int,
            CelValue::UInt(_) => CelType::UInt,
            CelValue::Double(_) => CelType::Double,
            CelValue::String(_) => CelType::String,
            CelValue::Bytes(_) => CelType::Bytes,
        }
    }
}

impl fmt::Display for CelValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CelValue::Null => write!(f, "null"),
            CelValue::Bool(v) => write!(f, "{}", v),
            CelValue::Int(v) => write!(f, "{}", v),
            CelValue::UInt(v) => write!(f, "{}u", v),
            CelValue::Double(v) => write!(f, "{:?}", v),
            CelValue::String(v) => write!(f, "{:?}", v),
            CelValue::Bytes(v) => write!(f, "b{:?}", String::from_utf8_lossy(v)),
        }
    }
}

// ==================== CelType ====================

/// Name of the abstract type used for optional values.
pub const OPTIONAL_TYPE_NAME: &str = "optional_type";

/// CEL types assigned to expressions by the checker.
///
/// `Dyn` and `Error` are absorbing: either one is assignable to and from
/// every other type, so a single failure or a dynamic value never cascades
/// into further diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CelType {
    // ==================== Primitives ====================
    Bool,
    Int,
    UInt,
    Double,
    String,
    Bytes,

    // ==================== Parameterized Collections ====================
    /// Homogeneous list: `list(T)`
    List(Arc<CelType>),
    /// Key-value map: `map(K, V)`
    Map(Arc<CelType>, Arc<CelType>),

    // ==================== Well-known Types ====================
    /// google.protobuf.Timestamp
    Timestamp,
    /// google.protobuf.Duration
    Duration,

    // ==================== Special Types ====================
    /// The type of `null`.
    Null,
    /// Dynamic type, resolved at evaluation time.
    Dyn,
    /// Type value: `type(T)`. The unparameterized `type` is `type(dyn)`.
    Type(Arc<CelType>),

    // ==================== Named Types ====================
    /// Message type with a fully qualified name.
    Message(Arc<str>),
    /// Application-defined type with optional type parameters.
    Abstract {
        name: Arc<str>,
        params: Arc<[CelType]>,
    },
    /// Boxed primitive, e.g. `google.protobuf.Int64Value`.
    Wrapper(Arc<CelType>),

    // ==================== Type Checking Types ====================
    /// Type parameter of a generic overload (e.g. `A` in `list(A)`).
    TypeParam(Arc<str>),
    /// Sentinel for a subexpression that failed to check.
    Error,
}

// ==================== Constructors ====================

impl CelType {
    /// Create a list type with the given element type.
    ///
    /// # Example
    /// ```
    /// use cel_check_common::CelType;
    /// assert_eq!(CelType::list(CelType::Int).to_string(), "list(int)");
    /// ```
    pub fn list(elem: CelType) -> Self {
        CelType::List(Arc::new(elem))
    }

    /// Create a map type with the given key and value types.
    ///
    /// # Example
    /// ```
    /// use cel_check_common::CelType;
    /// let map_str_int = CelType::map(CelType::String, CelType::Int);
    /// assert_eq!(map_str_int.to_string(), "map(string, int)");
    /// ```
    pub fn map(key: CelType, value: CelType) -> Self {
        CelType::Map(Arc::new(key), Arc::new(value))
    }

    /// Create a type value representing `type(T)`.
    pub fn type_of(inner: CelType) -> Self {
        CelType::Type(Arc::new(inner))
    }

    /// Create a message type with the given fully qualified name.
    pub fn message(name: &str) -> Self {
        CelType::Message(Arc::from(name))
    }

    /// Create an abstract type with the given name and parameter types.
    pub fn abstract_type(name: &str, params: &[CelType]) -> Self {
        CelType::Abstract {
            name: Arc::from(name),
            params: Arc::from(params),
        }
    }

    /// Create an optional type: `optional_type(T)`.
    pub fn optional(inner: CelType) -> Self {
        CelType::abstract_type(OPTIONAL_TYPE_NAME, &[inner])
    }

    /// Create a type parameter with the given name.
    pub fn type_param(name: &str) -> Self {
        CelType::TypeParam(Arc::from(name))
    }

    /// Create a wrapper type around a primitive.
    pub fn wrapper(inner: CelType) -> Self {
        CelType::Wrapper(Arc::new(inner))
    }
}

// ==================== Type Properties ====================

impl CelType {
    /// Returns true if this is a primitive type.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            CelType::Bool
                | CelType::Int
                | CelType::UInt
                | CelType::Double
                | CelType::String
                | CelType::Bytes
        )
    }

    /// Returns true for `dyn` and the error sentinel.
    pub fn is_dyn_or_error(&self) -> bool {
        matches!(self, CelType::Dyn | CelType::Error)
    }

    /// Returns true if `null` may be assigned to this type.
    pub fn is_nullable(&self) -> bool {
        matches!(
            self,
            CelType::Null
                | CelType::Message(_)
                | CelType::Wrapper(_)
                | CelType::Abstract { .. }
                | CelType::Timestamp
                | CelType::Duration
        )
    }

    /// Returns true if this type mentions a type parameter.
    pub fn has_type_params(&self) -> bool {
        match self {
            CelType::TypeParam(_) => true,
            CelType::List(elem) => elem.has_type_params(),
            CelType::Map(key, val) => key.has_type_params() || val.has_type_params(),
            CelType::Type(inner) | CelType::Wrapper(inner) => inner.has_type_params(),
            CelType::Abstract { params, .. } => params.iter().any(CelType::has_type_params),
            _ => false,
        }
    }

    /// Get the element type of a list, or None if not a list.
    pub fn list_elem(&self) -> Option<&CelType> {
        match self {
            CelType::List(elem) => Some(elem),
            _ => None,
        }
    }

    /// Get the key and value types of a map, or None if not a map.
    pub fn map_types(&self) -> Option<(&CelType, &CelType)> {
        match self {
            CelType::Map(key, val) => Some((key, val)),
            _ => None,
        }
    }

    /// Get the message name if this is a message type.
    pub fn message_name(&self) -> Option<&str> {
        match self {
            CelType::Message(name) => Some(name),
            _ => None,
        }
    }

    /// Returns true if `self` accepts a value of type `other`.
    ///
    /// # Rules
    /// - Equal types are assignable.
    /// - `dyn` and the error sentinel are assignable to and from anything.
    /// - Lists, maps, abstract types and type values compare parameter-wise.
    /// - Wrappers accept `null` and their primitive; primitives accept their
    ///   wrapper.
    /// - `null` is assignable to every nullable type.
    /// - Well-known protobuf messages are compared through their CEL
    ///   equivalents (`google.protobuf.Int64Value` is `wrapper(int)`).
    pub fn is_assignable_from(&self, other: &CelType) -> bool {
        if self == other || self.is_dyn_or_error() || other.is_dyn_or_error() {
            return true;
        }

        match (self, other) {
            (CelType::List(to_elem), CelType::List(from_elem)) => {
                to_elem.is_assignable_from(from_elem)
            }
            (CelType::Map(to_key, to_val), CelType::Map(from_key, from_val)) => {
                to_key.is_assignable_from(from_key) && to_val.is_assignable_from(from_val)
            }
            (
                CelType::Abstract { name: to_name, params: to_params },
                CelType::Abstract { name: from_name, params: from_params },
            ) => {
                to_name == from_name
                    && to_params.len() == from_params.len()
                    && to_params
                        .iter()
                        .zip(from_params.iter())
                        .all(|(to, from)| to.is_assignable_from(from))
            }
            (CelType::Type(to_inner), CelType::Type(from_inner)) => {
                to_inner.is_assignable_from(from_inner)
            }

            (to, CelType::Null) if to.is_nullable() => true,

            (CelType::Message(name), _) => match well_known_type(name) {
                Some(alias) => alias.is_assignable_from(other),
                None => false,
            },
            (_, CelType::Message(name)) => match well_known_type(name) {
                Some(alias) => self.is_assignable_from(&alias),
                None => false,
            },

            (CelType::Wrapper(inner), from) => inner.is_assignable_from(from),
            (to, CelType::Wrapper(inner)) => to.is_assignable_from(inner),

            _ => false,
        }
    }

    /// Join two types into the most specific type both are compatible with.
    ///
    /// Used for the branches of a conditional and the elements of list and
    /// map literals. Incompatible inputs join to `dyn`.
    pub fn most_specific(a: &CelType, b: &CelType) -> CelType {
        if a == b {
            return a.clone();
        }
        match (a, b) {
            (CelType::Error, other) | (other, CelType::Error) => other.clone(),
            (CelType::Null, other) | (other, CelType::Null) if other.is_nullable() => {
                other.clone()
            }
            (CelType::List(a_elem), CelType::List(b_elem)) => {
                CelType::list(CelType::most_specific(a_elem, b_elem))
            }
            (CelType::Map(a_key, a_val), CelType::Map(b_key, b_val)) => CelType::map(
                CelType::most_specific(a_key, b_key),
                CelType::most_specific(a_val, b_val),
            ),
            _ => CelType::Dyn,
        }
    }
}

/// Map a well-known protobuf message name to its CEL type.
///
/// Returns `None` for names outside the `google.protobuf` well-known set.
pub fn well_known_type(full_name: &str) -> Option<CelType> {
    let cel_type = match full_name {
        "google.protobuf.Timestamp" => CelType::Timestamp,
        "google.protobuf.Duration" => CelType::Duration,

        "google.protobuf.BoolValue" => CelType::wrapper(CelType::Bool),
        "google.protobuf.Int32Value" | "google.protobuf.Int64Value" => {
            CelType::wrapper(CelType::Int)
        }
        "google.protobuf.UInt32Value" | "google.protobuf.UInt64Value" => {
            CelType::wrapper(CelType::UInt)
        }
        "google.protobuf.FloatValue" | "google.protobuf.DoubleValue" => {
            CelType::wrapper(CelType::Double)
        }
        "google.protobuf.StringValue" => CelType::wrapper(CelType::String),
        "google.protobuf.BytesValue" => CelType::wrapper(CelType::Bytes),

        "google.protobuf.Any" | "google.protobuf.Value" => CelType::Dyn,
        "google.protobuf.Struct" => CelType::map(CelType::String, CelType::Dyn),
        "google.protobuf.ListValue" => CelType::list(CelType::Dyn),

        _ => return None,
    };
    Some(cel_type)
}

// ==================== Display ====================

impl fmt::Display for CelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CelType::Bool => write!(f, "bool"),
            CelType::Int => write!(f, "int"),
            CelType::UInt => write!(f, "uint"),
            CelType::Double => write!(f, "double"),
            CelType::String => write!(f, "string"),
            CelType::Bytes => write!(f, "bytes"),
            CelType::List(elem) => write!(f, "list({})", elem),
            CelType::Map(key, val) => write!(f, "map({}, {})", key, val),
            CelType::Timestamp => write!(f, "google.protobuf.Timestamp"),
            CelType::Duration => write!(f, "google.protobuf.Duration"),
            CelType::Null => write!(f, "null_type"),
            CelType::Dyn => write!(f, "dyn"),
            CelType::Type(inner) if **inner == CelType::Dyn => write!(f, "type"),
            CelType::Type(inner) => write!(f, "type({})", inner),
            CelType::Message(name) => write!(f, "{}", name),
            CelType::Abstract { name, params } => {
                write!(f, "{}", name)?;
                if !params.is_empty() {
                    let params: Vec<_> = params.iter().map(ToString::to_string).collect();
                    write!(f, "({})", params.join(", "))?;
                }
                Ok(())
            }
            CelType::Wrapper(inner) => write!(f, "wrapper({})", inner),
            CelType::TypeParam(name) => write!(f, "{}", name),
            CelType::Error => write!(f, "!error!"),
        }
    }
}
