//! Error types for type checking.
//!
//! Type errors are collected into [`Diagnostics`] and never interrupt a
//! check. The only fatal condition is [`CheckAbort`].

use cel_check_common::{CelType, Source, Span};
use thiserror::Error;

/// Maximum number of errors included in a rendered report.
const MAX_ERRORS_TO_REPORT: usize = 100;

/// A type checking error.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckError {
    pub kind: CheckErrorKind,
    /// The source span where the error occurred.
    pub span: Span,
    /// The expression ID where the error occurred.
    pub expr_id: i64,
}

impl CheckError {
    pub fn new(kind: CheckErrorKind, span: Span, expr_id: i64) -> Self {
        Self { kind, span, expr_id }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        self.kind.to_string()
    }

    /// Render this error against its source in the CEL report format.
    pub fn to_display_string(&self, source: &Source) -> String {
        let location = source.location(self.span.start);
        let mut result = format!(
            "ERROR: {}:{}:{}: {}",
            source.description(),
            location.line,
            location.column + 1,
            self.kind
        );

        if let Some(snippet) = source.snippet(location.line) {
            let snippet = snippet.replace('\t', " ");
            result.push_str("\n | ");
            result.push_str(&snippet);
            result.push_str("\n | ");

            let mut chars = snippet.chars();
            for c in chars.by_ref().take(location.column) {
                result.push(if c.len_utf8() > 1 { '\u{ff0e}' } else { '.' });
            }
            match chars.next() {
                Some(c) if c.len_utf8() > 1 => result.push('\u{ff3e}'),
                _ => result.push('^'),
            }
        }
        result
    }
}

impl std::fmt::Display for CheckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for CheckError {}

/// The kind of type checking error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckErrorKind {
    /// Reference to an undeclared identifier, message or function.
    #[error("undeclared reference to '{name}' (in container '{container}')")]
    UndeclaredReference { container: String, name: String },

    /// No overload accepts the argument types.
    #[error("found no matching overload for '{function}' applied to '{}'", format_call_signature(.receiver.as_ref(), .arg_types))]
    NoMatchingOverload {
        function: String,
        receiver: Option<CelType>,
        arg_types: Vec<CelType>,
    },

    #[error("expected type '{expected}' but found '{actual}'")]
    TypeMismatch { expected: CelType, actual: CelType },

    #[error("undefined field '{field}'")]
    UndefinedField { field: String },

    /// A message field was initialized with an incompatible value.
    #[error("expected type of field '{field}' is '{expected}' but provided type is '{actual}'")]
    FieldTypeMismatch {
        field: String,
        expected: CelType,
        actual: CelType,
    },

    #[error("'{name}' is not a message type")]
    NotAMessageType { name: String },

    #[error("expression of type '{range}' cannot be range of a comprehension (must be list, map, or dynamic)")]
    NotAComprehensionRange { range: CelType },

    #[error("type '{operand}' does not support field selection")]
    FieldSelectionUnsupported { operand: CelType },

    /// The type provider lost track of a type it had already resolved.
    #[error("unexpected failed resolution of '{name}'")]
    UnexpectedFailedResolution { name: String },
}

/// Format argument types as `(a, b)` or, for member calls, `recv.(a, b)`.
fn format_call_signature(receiver: Option<&CelType>, arg_types: &[CelType]) -> String {
    let args: Vec<String> = arg_types.iter().map(ToString::to_string).collect();
    match receiver {
        Some(receiver) => format!("{}.({})", receiver, args.join(", ")),
        None => format!("({})", args.join(", ")),
    }
}

/// Fatal conditions that stop a check without producing a result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckAbort {
    #[error("max recursion depth exceeded: {limit}")]
    RecursionLimitExceeded { limit: usize },
}

/// Ordered, append-only collection of check errors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    errors: Vec<CheckError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: CheckError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Errors in the order they were reported.
    pub fn errors(&self) -> &[CheckError] {
        &self.errors
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CheckError> {
        self.errors.iter()
    }

    /// Render every error, ordered by source position.
    ///
    /// Errors at the same position keep their reporting order. Reports
    /// beyond the first hundred are summarized in a trailing line.
    pub fn to_display_string(&self, source: &Source) -> String {
        let mut ordered: Vec<_> = self
            .errors
            .iter()
            .map(|error| (source.location(error.span.start), error))
            .collect();
        ordered.sort_by_key(|(location, _)| *location);

        let mut blocks: Vec<String> = ordered
            .iter()
            .take(MAX_ERRORS_TO_REPORT)
            .map(|(_, error)| error.to_display_string(source))
            .collect();
        if ordered.len() > MAX_ERRORS_TO_REPORT {
            blocks.push(format!(
                "{} more errors were truncated",
                ordered.len() - MAX_ERRORS_TO_REPORT
            ));
        }
        blocks.join("\n")
    }
}

impl IntoIterator for Diagnostics {
    type Item = CheckError;
    type IntoIter = std::vec::IntoIter<CheckError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a CheckError;
    type IntoIter = std::slice::Iter<'a, CheckError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}
