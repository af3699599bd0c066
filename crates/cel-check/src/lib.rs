//! CEL Type Checker
//!
//! This crate type-checks CEL (Common Expression Language) expressions,
//! producing a `type_map` and `reference_map` for every node of the checked
//! AST plus cel-go style diagnostics.
//!
//! # Example
//!
//! ```
//! use cel_check::Env;
//! use cel_check_common::{CelType, ExprFactory, Source};
//!
//! let env = Env::with_standard_library()
//!     .with_variable("names", CelType::list(CelType::String))
//!     .unwrap();
//!
//! let mut factory = ExprFactory::new();
//! let names = factory.ident("names", 0..5);
//! let size = factory.member_call(names, "size", vec![], 5..12);
//! let zero = factory.int(0, 15..16);
//! let expr = factory.call("_>_", vec![size, zero], 13..14);
//! let ast = factory.build(expr, Source::new("names.size() > 0"));
//!
//! let result = env.check(ast).unwrap();
//! assert!(result.is_ok());
//! assert_eq!(result.result_type(), Some(&CelType::Bool));
//! ```

mod checker;
mod comprehension;
mod env;
mod errors;
mod overload;
mod scope;
mod standard_library;
mod unify;

pub use checker::{CheckResult, Checker, Reference};
pub use env::{CheckerOptions, Env, EnvError};
pub use errors::{CheckAbort, CheckError, CheckErrorKind, Diagnostics};
pub use overload::{resolve_overload, Resolution};
pub use scope::Scopes;
pub use standard_library::{standard_functions, STANDARD_LIBRARY};
pub use unify::{Substitutions, UnifyError};
