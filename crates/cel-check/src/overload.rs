//! Overload resolution for function calls.
//!
//! Every overload whose call style and arity fit is tried with fresh
//! type parameter bindings. All matches are kept: a single result type
//! resolves the call, differing result types make it ambiguous and the call
//! is typed `dyn` so the choice is deferred to evaluation.

use cel_check_common::{CelType, FunctionDecl};
use log::debug;

use crate::unify::Substitutions;

/// Outcome of resolving a call against a function declaration.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Every matching overload agrees on the result type.
    Resolved {
        result_type: CelType,
        overload_ids: Vec<String>,
    },
    /// Matching overloads disagree on the result type; the call is `dyn`.
    Ambiguous { overload_ids: Vec<String> },
    NoMatch,
}

impl Resolution {
    /// The type the call expression receives.
    pub fn result_type(&self) -> CelType {
        match self {
            Resolution::Resolved { result_type, .. } => result_type.clone(),
            Resolution::Ambiguous { .. } => CelType::Dyn,
            Resolution::NoMatch => CelType::Error,
        }
    }

    /// Ids of every matching overload.
    pub fn overload_ids(&self) -> &[String] {
        match self {
            Resolution::Resolved { overload_ids, .. } | Resolution::Ambiguous { overload_ids } => {
                overload_ids
            }
            Resolution::NoMatch => &[],
        }
    }
}

/// Resolve the matching overload(s) for a call.
///
/// `receiver` is the target type for member calls and `None` for global
/// calls.
pub fn resolve_overload(
    func: &FunctionDecl,
    receiver: Option<&CelType>,
    args: &[CelType],
) -> Resolution {
    let call_args: Vec<&CelType> = receiver.into_iter().chain(args.iter()).collect();
    let mut matches: Vec<(&str, CelType)> = Vec::new();

    for overload in &func.overloads {
        if overload.is_member != receiver.is_some() || overload.params.len() != call_args.len() {
            continue;
        }

        let mut subs = Substitutions::new();
        let unified = call_args
            .iter()
            .zip(overload.params.iter())
            .try_for_each(|(arg, param)| subs.unify(arg, param));
        if unified.is_ok() {
            matches.push((overload.id.as_str(), subs.substitute(&overload.result)));
        }
    }

    let Some((_, first_type)) = matches.first() else {
        debug!("no overload of '{}' matches {:?}", func.name, call_args);
        return Resolution::NoMatch;
    };

    let overload_ids: Vec<String> = matches.iter().map(|(id, _)| id.to_string()).collect();
    if matches.iter().all(|(_, ty)| ty == first_type) {
        debug!("'{}' resolved to {:?}", func.name, overload_ids);
        Resolution::Resolved {
            result_type: first_type.clone(),
            overload_ids,
        }
    } else {
        debug!("'{}' is ambiguous between {:?}", func.name, overload_ids);
        Resolution::Ambiguous { overload_ids }
    }
}
