//! Core type checker implementation.
//!
//! The checker walks an [`Ast`] depth-first, assigning a type to every node
//! and resolving every identifier and call to a declaration. Type errors are
//! collected, never thrown: a failing node is typed `Error`, which absorbs
//! further mismatches so one mistake produces one diagnostic.
//!
//! Select chains that spell a declared qualified name (`a.b.c`) are
//! rewritten in place to a single identifier, and member calls whose target
//! spells a namespace (`pkg.f(x)`) become global calls. The checked AST is
//! returned as part of the [`CheckResult`].

use std::collections::HashMap;
use std::sync::Arc;

use cel_check_common::{
    well_known_type, Ast, CelType, CelValue, Container, Expr, FunctionDecl, MapEntry,
    ProviderError, Span, Spanned, SpannedExpr, StructField, TypeProvider, VariableDecl,
};
use log::{debug, warn};

use crate::env::CheckerOptions;
use crate::errors::{CheckAbort, CheckError, CheckErrorKind, Diagnostics};
use crate::overload::{resolve_overload, Resolution};
use crate::scope::Scopes;

const CONDITIONAL: &str = "_?_:_";

/// Resolution recorded for an identifier, message construction or call.
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    /// The fully qualified name.
    pub name: String,
    /// Matching overload ids for calls.
    pub overload_ids: Vec<String>,
    /// Constant value for constants such as enum values.
    pub value: Option<CelValue>,
}

impl Reference {
    /// Create an identifier reference.
    pub fn ident(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            overload_ids: Vec::new(),
            value: None,
        }
    }

    /// Create a function reference with overload ids.
    pub fn function(name: impl Into<String>, overload_ids: Vec<String>) -> Self {
        Self {
            name: name.into(),
            overload_ids,
            value: None,
        }
    }
}

/// Result of type checking an expression.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// The checked AST, with qualified names rewritten.
    pub ast: Ast,
    /// Map from expression id to its type. Total over the checked AST.
    pub type_map: HashMap<i64, CelType>,
    /// Map from expression id to its resolved reference.
    pub reference_map: HashMap<i64, Reference>,
    pub errors: Diagnostics,
}

impl CheckResult {
    /// Check if type checking was successful (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Type of the whole expression.
    pub fn result_type(&self) -> Option<&CelType> {
        self.type_map.get(&self.ast.expr.id)
    }

    pub fn get_type(&self, expr_id: i64) -> Option<&CelType> {
        self.type_map.get(&expr_id)
    }

    pub fn get_reference(&self, expr_id: i64) -> Option<&Reference> {
        self.reference_map.get(&expr_id)
    }

    /// Render all diagnostics against the checked source.
    pub fn error_report(&self) -> String {
        self.errors.to_display_string(&self.ast.source)
    }
}

/// Type checker for a single expression.
///
/// Built from an environment's shared declarations; owns only the frames it
/// pushes for comprehension variables and the maps it produces.
pub struct Checker<'a> {
    /// Scopes visible to the expression; frames above `root` are local.
    pub(crate) scopes: Scopes,
    root: Arc<Scopes>,
    container: &'a Container,
    provider: Option<&'a dyn TypeProvider>,
    options: &'a CheckerOptions,
    type_map: HashMap<i64, CelType>,
    reference_map: HashMap<i64, Reference>,
    errors: Diagnostics,
    depth: usize,
}

impl<'a> Checker<'a> {
    pub fn new(
        root: Arc<Scopes>,
        container: &'a Container,
        provider: Option<&'a dyn TypeProvider>,
        options: &'a CheckerOptions,
    ) -> Self {
        Self {
            scopes: Scopes::child_of(root.clone()),
            root,
            container,
            provider,
            options,
            type_map: HashMap::new(),
            reference_map: HashMap::new(),
            errors: Diagnostics::new(),
            depth: 0,
        }
    }

    /// Type check an AST.
    ///
    /// Fails only when the expression nests deeper than the configured
    /// recursion limit.
    pub fn check(mut self, mut ast: Ast) -> Result<CheckResult, CheckAbort> {
        self.check_expr(&mut ast.expr)?;
        debug!(
            "checked expression with {} nodes, {} errors",
            self.type_map.len(),
            self.errors.len()
        );
        Ok(CheckResult {
            ast,
            type_map: self.type_map,
            reference_map: self.reference_map,
            errors: self.errors,
        })
    }

    pub(crate) fn set_type(&mut self, expr_id: i64, cel_type: CelType) {
        self.type_map.insert(expr_id, cel_type);
    }

    fn set_reference(&mut self, expr_id: i64, reference: Reference) {
        self.reference_map.insert(expr_id, reference);
    }

    pub(crate) fn report(&mut self, kind: CheckErrorKind, span: &Span, expr_id: i64) {
        self.errors.push(CheckError::new(kind, span.clone(), expr_id));
    }

    fn undeclared(&mut self, name: &str, span: &Span, expr_id: i64) {
        let kind = CheckErrorKind::UndeclaredReference {
            container: self.container.name().to_string(),
            name: name.to_string(),
        };
        self.report(kind, span, expr_id);
    }

    /// Type check an expression, record its type and return it.
    pub(crate) fn check_expr(&mut self, expr: &mut SpannedExpr) -> Result<CelType, CheckAbort> {
        self.depth += 1;
        if self.depth > self.options.max_recursion_depth {
            warn!(
                "aborting check: nesting exceeds {}",
                self.options.max_recursion_depth
            );
            return Err(CheckAbort::RecursionLimitExceeded {
                limit: self.options.max_recursion_depth,
            });
        }

        let id = expr.id;
        let span = expr.span.clone();
        let mut rewrite = None;

        let cel_type = match &mut expr.node {
            Expr::Const(value) => value.cel_type(),
            Expr::Ident(name) => self.check_ident(name, id, &span),
            Expr::Select {
                operand,
                field,
                test_only,
            } => {
                if let Some(decl) = self.resolve_qualified_select(operand, field, *test_only) {
                    rewrite = Some(Expr::Ident(decl.name.clone()));
                    self.set_ident_reference(id, decl)
                } else {
                    self.check_select(operand, field, *test_only, id, &span)?
                }
            }
            Expr::Call {
                target,
                function,
                args,
            } => {
                let (cel_type, global_name) = self.check_call(target, function, args, id, &span)?;
                if let Some(global_name) = global_name {
                    *target = None;
                    *function = global_name;
                }
                cel_type
            }
            Expr::List(elements) => self.check_list(elements)?,
            Expr::Map(entries) => self.check_map(entries)?,
            Expr::Struct {
                message_name,
                fields,
            } => self.check_struct(message_name, fields, id, &span)?,
            Expr::Comprehension(comp) => self.check_comprehension(comp)?,
        };

        if let Some(node) = rewrite {
            expr.node = node;
        }
        self.set_type(id, cel_type.clone());
        self.depth -= 1;
        Ok(cel_type)
    }

    // ==================== Identifiers ====================

    /// Find an identifier: comprehension locals first, then each container
    /// candidate in the scope chain, then each candidate in the type provider.
    fn resolve_ident(&self, name: &str) -> Option<VariableDecl> {
        if !name.starts_with('.') {
            if let Some(decl) = self.scopes.find_local_ident(name, &self.root) {
                return Some(decl.clone());
            }
        }

        let candidates = self.container.candidate_names(name);
        for candidate in &candidates {
            if let Some(decl) = self.scopes.find_ident(candidate) {
                return Some(decl.clone());
            }
        }

        let provider = self.provider?;
        candidates
            .iter()
            .find_map(|candidate| provider.find_ident(candidate))
    }

    fn is_local(&self, name: &str) -> bool {
        self.scopes.find_local_ident(name, &self.root).is_some()
    }

    /// Record the declaration an identifier resolved to and return its type.
    fn set_ident_reference(&mut self, id: i64, decl: VariableDecl) -> CelType {
        let reference = Reference {
            name: decl.name,
            overload_ids: Vec::new(),
            value: decl.const_value,
        };
        self.set_reference(id, reference);
        decl.cel_type
    }

    fn check_ident(&mut self, name: &str, id: i64, span: &Span) -> CelType {
        match self.resolve_ident(name) {
            Some(decl) => self.set_ident_reference(id, decl),
            None => {
                self.undeclared(name, span, id);
                CelType::Error
            }
        }
    }

    // ==================== Selection ====================

    /// Try to read `operand.field` as one qualified identifier.
    fn resolve_qualified_select(
        &self,
        operand: &SpannedExpr,
        field: &str,
        test_only: bool,
    ) -> Option<VariableDecl> {
        if test_only {
            return None;
        }
        let prefix = operand.node.qualified_name()?;
        let root = prefix.split('.').next().unwrap_or_default();
        if self.is_local(root) {
            return None;
        }
        self.resolve_ident(&format!("{}.{}", prefix, field))
    }

    fn check_select(
        &mut self,
        operand: &mut SpannedExpr,
        field: &str,
        test_only: bool,
        id: i64,
        span: &Span,
    ) -> Result<CelType, CheckAbort> {
        let operand_type = self.check_expr(operand)?;

        if test_only && !self.supports_selection(&operand_type) {
            if self.options.validate_presence_tests {
                let kind = CheckErrorKind::FieldSelectionUnsupported {
                    operand: operand_type,
                };
                self.report(kind, span, id);
                return Ok(CelType::Error);
            }
            return Ok(CelType::Bool);
        }

        let field_type = self.field_type(&operand_type, field, id, span);
        Ok(if test_only { CelType::Bool } else { field_type })
    }

    fn supports_selection(&self, operand: &CelType) -> bool {
        match operand {
            CelType::Map(_, _) | CelType::Message(_) | CelType::Dyn | CelType::Error => true,
            CelType::TypeParam(_) => true,
            _ => false,
        }
    }

    /// Type of `field` on a value of type `operand`.
    fn field_type(&mut self, operand: &CelType, field: &str, id: i64, span: &Span) -> CelType {
        match operand {
            CelType::Map(_, value) => (**value).clone(),
            CelType::Dyn | CelType::Error | CelType::TypeParam(_) => CelType::Dyn,
            CelType::Message(name) => {
                if let Some(alias) = well_known_type(name) {
                    return self.field_type(&alias, field, id, span);
                }
                self.message_field_type(name, field, id, span)
            }
            other => {
                let kind = CheckErrorKind::FieldSelectionUnsupported {
                    operand: other.clone(),
                };
                self.report(kind, span, id);
                CelType::Error
            }
        }
    }

    fn message_field_type(&mut self, message: &str, field: &str, id: i64, span: &Span) -> CelType {
        let lookup = match self.provider {
            Some(provider) => provider.find_field_type(message, field),
            None => Err(ProviderError::UnknownMessage(message.to_string())),
        };
        match lookup {
            Ok(Some(field_type)) => field_type,
            Ok(None) => {
                let kind = CheckErrorKind::UndefinedField {
                    field: field.to_string(),
                };
                self.report(kind, span, id);
                CelType::Error
            }
            Err(err) => {
                debug!("field lookup failed: {}", err);
                let kind = CheckErrorKind::UnexpectedFailedResolution {
                    name: message.to_string(),
                };
                self.report(kind, span, id);
                CelType::Error
            }
        }
    }

    // ==================== Calls ====================

    /// Check a call. Returns its type and, when the target turned out to be a
    /// namespace, the qualified global function name to rewrite the call to.
    fn check_call(
        &mut self,
        target: &mut Option<Box<SpannedExpr>>,
        function: &str,
        args: &mut [SpannedExpr],
        id: i64,
        span: &Span,
    ) -> Result<(CelType, Option<String>), CheckAbort> {
        if let Some(target_expr) = target.as_deref() {
            if let Some(qualified) = self.qualified_function_name(target_expr, function) {
                let cel_type = self.resolve_call(&qualified, None, args, id, span)?;
                return Ok((cel_type, Some(qualified)));
            }
        }

        let cel_type = match target {
            Some(target_expr) => {
                let receiver = self.check_expr(target_expr)?;
                self.resolve_call(function, Some(receiver), args, id, span)?
            }
            None => self.resolve_call(function, None, args, id, span)?,
        };
        Ok((cel_type, None))
    }

    /// Qualified name of a global function spelled as `target.function`.
    fn qualified_function_name(&self, target: &SpannedExpr, function: &str) -> Option<String> {
        let prefix = target.node.qualified_name()?;
        let root = prefix.split('.').next().unwrap_or_default();
        if self.is_local(root) {
            return None;
        }
        let (name, decl) = self.find_function(&format!("{}.{}", prefix, function))?;
        decl.has_global_overloads().then_some(name)
    }

    fn find_function(&self, name: &str) -> Option<(String, &FunctionDecl)> {
        self.container
            .candidate_names(name)
            .into_iter()
            .find_map(|candidate| {
                let decl = self.scopes.find_function(&candidate)?;
                Some((candidate, decl))
            })
    }

    fn resolve_call(
        &mut self,
        function: &str,
        receiver: Option<CelType>,
        args: &mut [SpannedExpr],
        id: i64,
        span: &Span,
    ) -> Result<CelType, CheckAbort> {
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args.iter_mut() {
            arg_types.push(self.check_expr(arg)?);
        }

        let Some((name, decl)) = self.find_function(function) else {
            self.undeclared(function, span, id);
            return Ok(CelType::Error);
        };

        // Conditional branches are joined rather than unified, so only the
        // guard takes part in resolution.
        let conditional = name == CONDITIONAL && receiver.is_none() && arg_types.len() == 3;
        let resolution = if conditional {
            let guard = [arg_types[0].clone(), CelType::Dyn, CelType::Dyn];
            resolve_overload(decl, None, &guard)
        } else {
            resolve_overload(decl, receiver.as_ref(), &arg_types)
        };
        if resolution == Resolution::NoMatch {
            let kind = CheckErrorKind::NoMatchingOverload {
                function: function.to_string(),
                receiver,
                arg_types,
            };
            self.report(kind, span, id);
            return Ok(CelType::Error);
        }

        let result_type = if conditional {
            CelType::most_specific(&arg_types[1], &arg_types[2])
        } else {
            resolution.result_type()
        };
        self.set_reference(
            id,
            Reference::function(name, resolution.overload_ids().to_vec()),
        );
        Ok(result_type)
    }

    // ==================== Aggregates ====================

    fn check_list(&mut self, elements: &mut [SpannedExpr]) -> Result<CelType, CheckAbort> {
        let mut elem_type: Option<CelType> = None;
        for elem in elements.iter_mut() {
            let ty = self.check_expr(elem)?;
            elem_type = Some(match elem_type {
                Some(joined) => CelType::most_specific(&joined, &ty),
                None => ty,
            });
        }
        Ok(CelType::list(elem_type.unwrap_or(CelType::Dyn)))
    }

    fn check_map(&mut self, entries: &mut [Spanned<MapEntry>]) -> Result<CelType, CheckAbort> {
        let mut joined: Option<(CelType, CelType)> = None;
        for entry in entries.iter_mut() {
            let key = self.check_expr(&mut entry.node.key)?;
            let value = self.check_expr(&mut entry.node.value)?;
            joined = Some(match joined {
                Some((k, v)) => (
                    CelType::most_specific(&k, &key),
                    CelType::most_specific(&v, &value),
                ),
                None => (key, value),
            });
        }
        let (key, value) = joined.unwrap_or((CelType::Dyn, CelType::Dyn));
        Ok(CelType::map(key, value))
    }

    fn check_struct(
        &mut self,
        message_name: &str,
        fields: &mut [Spanned<StructField>],
        id: i64,
        span: &Span,
    ) -> Result<CelType, CheckAbort> {
        let resolved = self.provider.and_then(|provider| {
            self.container
                .candidate_names(message_name)
                .into_iter()
                .find_map(|candidate| {
                    provider.find_struct_type(&candidate).map(|t| (candidate, t))
                })
        });

        let Some((full_name, message_type)) = resolved else {
            if self.resolve_ident(message_name).is_some() {
                let kind = CheckErrorKind::NotAMessageType {
                    name: message_name.to_string(),
                };
                self.report(kind, span, id);
            } else {
                self.undeclared(message_name, span, id);
            }
            for field in fields.iter_mut() {
                self.check_expr(&mut field.node.value)?;
            }
            return Ok(CelType::Error);
        };

        self.set_reference(id, Reference::ident(full_name.clone()));
        for field in fields.iter_mut() {
            let value_type = self.check_expr(&mut field.node.value)?;
            let field_name = field.node.name.clone();
            let lookup = match self.provider {
                Some(provider) => provider.find_field_type(&full_name, &field_name),
                None => Ok(None),
            };
            let kind = match lookup {
                Ok(Some(expected)) if expected.is_assignable_from(&value_type) => continue,
                Ok(Some(expected)) => CheckErrorKind::FieldTypeMismatch {
                    field: field_name,
                    expected,
                    actual: value_type,
                },
                Ok(None) => CheckErrorKind::UndefinedField { field: field_name },
                Err(_) => CheckErrorKind::UnexpectedFailedResolution {
                    name: full_name.clone(),
                },
            };
            self.report(kind, &field.span, field.id);
        }

        let alias = message_type.message_name().and_then(well_known_type);
        Ok(alias.unwrap_or(message_type))
    }
}
