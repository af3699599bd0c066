//! Checked expression tree.
//!
//! The checker consumes expressions in their canonical form: literals,
//! identifiers, selections, calls, aggregate literals and comprehensions.
//! Operators are plain calls to their internal function names (`_+_`,
//! `_[_]`, `_?_:_`, ...) and macros have already been expanded.
//!
//! [`ExprFactory`] builds trees in this form, assigning unique ids and
//! expanding the standard macros the same way a CEL parser does.

use std::collections::HashMap;

use crate::{CelValue, Source};

/// Source span for error reporting. Byte offsets into the source text.
pub type Span = std::ops::Range<usize>;

/// Name of the accumulator variable introduced by macro expansion.
pub const ACCU_VAR: &str = "__result__";

/// AST node with source location and unique ID.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    /// Unique identifier for this node.
    pub id: i64,
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(id: i64, node: T, span: Span) -> Self {
        Self { id, node, span }
    }
}

/// A spanned expression.
pub type SpannedExpr = Spanned<Expr>;

/// A field initializer in a message construction.
#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub name: String,
    pub value: SpannedExpr,
}

/// A key/value entry in a map literal.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: SpannedExpr,
    pub value: SpannedExpr,
}

/// Comprehension produced by macro expansion.
///
/// Semantics:
/// ```text
/// let accu_var = accu_init
/// for (let iter_var, iter_var2 in iter_range) {
///    if (!loop_condition) { break }
///    accu_var = loop_step
/// }
/// return result
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ComprehensionExpr {
    pub iter_var: String,
    /// Second iteration variable of the two-variable form.
    pub iter_var2: Option<String>,
    pub iter_range: SpannedExpr,
    pub accu_var: String,
    pub accu_init: SpannedExpr,
    pub loop_condition: SpannedExpr,
    pub loop_step: SpannedExpr,
    pub result: SpannedExpr,
}

/// CEL expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal value.
    Const(CelValue),
    /// Identifier, possibly dot-qualified (`a.b.c`) or absolute (`.a.b`).
    Ident(String),
    /// Field selection `operand.field`; `test_only` for `has()`.
    Select {
        operand: Box<SpannedExpr>,
        field: String,
        test_only: bool,
    },
    /// Global call `f(args)` or member call `target.f(args)`.
    Call {
        target: Option<Box<SpannedExpr>>,
        function: String,
        args: Vec<SpannedExpr>,
    },
    /// List literal.
    List(Vec<SpannedExpr>),
    /// Message construction: `pkg.Msg{field: value}`.
    Struct {
        message_name: String,
        fields: Vec<Spanned<StructField>>,
    },
    /// Map literal.
    Map(Vec<Spanned<MapEntry>>),
    /// Expanded macro.
    Comprehension(Box<ComprehensionExpr>),
}

impl Expr {
    /// Render a select chain rooted at an identifier as a dotted name.
    ///
    /// Returns `None` when the chain contains anything other than plain
    /// selections over an identifier.
    pub fn qualified_name(&self) -> Option<String> {
        match self {
            Expr::Ident(name) => Some(name.clone()),
            Expr::Select {
                operand,
                field,
                test_only: false,
            } => operand
                .node
                .qualified_name()
                .map(|prefix| format!("{}.{}", prefix, field)),
            _ => None,
        }
    }
}

/// A parsed expression ready for checking.
#[derive(Debug, Clone)]
pub struct Ast {
    /// Root expression.
    pub expr: SpannedExpr,
    /// Source the expression was parsed from.
    pub source: Source,
    /// Original macro call expressions, keyed by the id of their expansion.
    pub macro_calls: HashMap<i64, SpannedExpr>,
}

impl Ast {
    pub fn new(expr: SpannedExpr, source: Source) -> Self {
        Self {
            expr,
            source,
            macro_calls: HashMap::new(),
        }
    }

    /// Visit every node id in the tree, root first.
    pub fn ids(&self) -> Vec<i64> {
        let mut ids = Vec::new();
        collect_ids(&self.expr, &mut ids);
        ids
    }
}

fn collect_ids(expr: &SpannedExpr, ids: &mut Vec<i64>) {
    ids.push(expr.id);
    match &expr.node {
        Expr::Const(_) | Expr::Ident(_) => {}
        Expr::Select { operand, .. } => collect_ids(operand, ids),
        Expr::Call { target, args, .. } => {
            if let Some(target) = target {
                collect_ids(target, ids);
            }
            for arg in args {
                collect_ids(arg, ids);
            }
        }
        Expr::List(elements) => {
            for elem in elements {
                collect_ids(elem, ids);
            }
        }
        Expr::Struct { fields, .. } => {
            for field in fields {
                collect_ids(&field.node.value, ids);
            }
        }
        Expr::Map(entries) => {
            for entry in entries {
                collect_ids(&entry.node.key, ids);
                collect_ids(&entry.node.value, ids);
            }
        }
        Expr::Comprehension(comp) => {
            collect_ids(&comp.iter_range, ids);
            collect_ids(&comp.accu_init, ids);
            collect_ids(&comp.loop_condition, ids);
            collect_ids(&comp.loop_step, ids);
            collect_ids(&comp.result, ids);
        }
    }
}

// ==================== ExprFactory ====================

/// Builds expression trees with unique, increasing node ids.
///
/// Macro helpers produce the same comprehension shapes as the CEL parser
/// and record the original call in the macro-call map.
#[derive(Debug, Default)]
pub struct ExprFactory {
    next_id: i64,
    macro_calls: HashMap<i64, SpannedExpr>,
}

impl ExprFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next unique node ID.
    pub fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn spanned(&mut self, node: Expr, span: Span) -> SpannedExpr {
        Spanned::new(self.next_id(), node, span)
    }

    /// Finish building, pairing the root with its source.
    pub fn build(self, expr: SpannedExpr, source: Source) -> Ast {
        Ast {
            expr,
            source,
            macro_calls: self.macro_calls,
        }
    }

    // === Leaves ===

    pub fn literal(&mut self, value: CelValue, span: Span) -> SpannedExpr {
        self.spanned(Expr::Const(value), span)
    }

    pub fn null(&mut self, span: Span) -> SpannedExpr {
        self.literal(CelValue::Null, span)
    }

    pub fn bool(&mut self, value: bool, span: Span) -> SpannedExpr {
        self.literal(CelValue::Bool(value), span)
    }

    pub fn int(&mut self, value: i64, span: Span) -> SpannedExpr {
        self.literal(CelValue::Int(value), span)
    }

    pub fn uint(&mut self, value: u64, span: Span) -> SpannedExpr {
        self.literal(CelValue::UInt(value), span)
    }

    pub fn double(&mut self, value: f64, span: Span) -> SpannedExpr {
        self.literal(CelValue::Double(value), span)
    }

    pub fn string(&mut self, value: &str, span: Span) -> SpannedExpr {
        self.literal(CelValue::String(value.to_string()), span)
    }

    pub fn bytes(&mut self, value: &[u8], span: Span) -> SpannedExpr {
        self.literal(CelValue::Bytes(value.to_vec()), span)
    }

    pub fn ident(&mut self, name: &str, span: Span) -> SpannedExpr {
        self.spanned(Expr::Ident(name.to_string()), span)
    }

    // === Composite nodes ===

    pub fn select(&mut self, operand: SpannedExpr, field: &str, span: Span) -> SpannedExpr {
        self.spanned(
            Expr::Select {
                operand: Box::new(operand),
                field: field.to_string(),
                test_only: false,
            },
            span,
        )
    }

    /// Global call, including operators such as `_+_`.
    pub fn call(&mut self, function: &str, args: Vec<SpannedExpr>, span: Span) -> SpannedExpr {
        self.spanned(
            Expr::Call {
                target: None,
                function: function.to_string(),
                args,
            },
            span,
        )
    }

    /// Receiver-style call `target.function(args)`.
    pub fn member_call(
        &mut self,
        target: SpannedExpr,
        function: &str,
        args: Vec<SpannedExpr>,
        span: Span,
    ) -> SpannedExpr {
        self.spanned(
            Expr::Call {
                target: Some(Box::new(target)),
                function: function.to_string(),
                args,
            },
            span,
        )
    }

    pub fn list(&mut self, elements: Vec<SpannedExpr>, span: Span) -> SpannedExpr {
        self.spanned(Expr::List(elements), span)
    }

    /// Map literal from `(key, value)` pairs; each entry spans its key.
    pub fn map(&mut self, entries: Vec<(SpannedExpr, SpannedExpr)>, span: Span) -> SpannedExpr {
        let entries = entries
            .into_iter()
            .map(|(key, value)| {
                let entry_span = key.span.start..value.span.end;
                Spanned::new(self.next_id(), MapEntry { key, value }, entry_span)
            })
            .collect();
        self.spanned(Expr::Map(entries), span)
    }

    /// Message construction from `(field, value)` pairs.
    pub fn message(
        &mut self,
        message_name: &str,
        fields: Vec<(&str, SpannedExpr)>,
        span: Span,
    ) -> SpannedExpr {
        let fields = fields
            .into_iter()
            .map(|(name, value)| {
                let field_span = value.span.clone();
                Spanned::new(
                    self.next_id(),
                    StructField {
                        name: name.to_string(),
                        value,
                    },
                    field_span,
                )
            })
            .collect();
        self.spanned(
            Expr::Struct {
                message_name: message_name.to_string(),
                fields,
            },
            span,
        )
    }

    /// Raw comprehension node.
    pub fn comprehension(&mut self, comp: ComprehensionExpr, span: Span) -> SpannedExpr {
        self.spanned(Expr::Comprehension(Box::new(comp)), span)
    }

    // === Macros ===

    /// `has(operand.field)`
    pub fn has(&mut self, operand: SpannedExpr, field: &str, span: Span) -> SpannedExpr {
        let select = self.select(operand.clone(), field, span.clone());
        let call = self.call("has", vec![select], span.clone());
        let expanded = self.spanned(
            Expr::Select {
                operand: Box::new(operand),
                field: field.to_string(),
                test_only: true,
            },
            span,
        );
        self.macro_calls.insert(expanded.id, call);
        expanded
    }

    /// `range.all(var, cond)`
    pub fn all(&mut self, range: SpannedExpr, var: &str, cond: SpannedExpr, span: Span) -> SpannedExpr {
        let accu_init = self.bool(true, span.clone());
        let accu = self.ident(ACCU_VAR, span.clone());
        let loop_condition = self.call("@not_strictly_false", vec![accu], span.clone());
        let accu = self.ident(ACCU_VAR, span.clone());
        let loop_step = self.call("_&&_", vec![accu, cond.clone()], span.clone());
        self.quantifier("all", range, var, None, cond, accu_init, loop_condition, loop_step, span)
    }

    /// `range.exists(var, cond)`
    pub fn exists(&mut self, range: SpannedExpr, var: &str, cond: SpannedExpr, span: Span) -> SpannedExpr {
        let accu_init = self.bool(false, span.clone());
        let accu = self.ident(ACCU_VAR, span.clone());
        let not_accu = self.call("!_", vec![accu], span.clone());
        let loop_condition = self.call("@not_strictly_false", vec![not_accu], span.clone());
        let accu = self.ident(ACCU_VAR, span.clone());
        let loop_step = self.call("_||_", vec![accu, cond.clone()], span.clone());
        self.quantifier("exists", range, var, None, cond, accu_init, loop_condition, loop_step, span)
    }

    /// `range.exists_one(var, cond)`
    pub fn exists_one(
        &mut self,
        range: SpannedExpr,
        var: &str,
        cond: SpannedExpr,
        span: Span,
    ) -> SpannedExpr {
        let accu_init = self.int(0, span.clone());
        let loop_condition = self.bool(true, span.clone());
        let accu = self.ident(ACCU_VAR, span.clone());
        let one = self.int(1, span.clone());
        let increment = self.call("_+_", vec![accu, one], span.clone());
        let accu = self.ident(ACCU_VAR, span.clone());
        let loop_step = self.call("_?_:_", vec![cond.clone(), increment, accu], span.clone());
        let call = self.macro_call(&range, "exists_one", var, None, vec![cond], span.clone());

        let accu = self.ident(ACCU_VAR, span.clone());
        let one = self.int(1, span.clone());
        let result = self.call("_==_", vec![accu, one], span.clone());
        self.finish_macro(call, range, var, None, accu_init, loop_condition, loop_step, result, span)
    }

    /// `range.all(key, value, cond)` over the two-variable form.
    pub fn all2(
        &mut self,
        range: SpannedExpr,
        var: &str,
        var2: &str,
        cond: SpannedExpr,
        span: Span,
    ) -> SpannedExpr {
        let accu_init = self.bool(true, span.clone());
        let accu = self.ident(ACCU_VAR, span.clone());
        let loop_condition = self.call("@not_strictly_false", vec![accu], span.clone());
        let accu = self.ident(ACCU_VAR, span.clone());
        let loop_step = self.call("_&&_", vec![accu, cond.clone()], span.clone());
        self.quantifier(
            "all",
            range,
            var,
            Some(var2),
            cond,
            accu_init,
            loop_condition,
            loop_step,
            span,
        )
    }

    /// `range.map(var, transform)`
    pub fn map_macro(
        &mut self,
        range: SpannedExpr,
        var: &str,
        transform: SpannedExpr,
        span: Span,
    ) -> SpannedExpr {
        let call = self.macro_call(&range, "map", var, None, vec![transform.clone()], span.clone());
        let accu_init = self.list(Vec::new(), span.clone());
        let loop_condition = self.bool(true, span.clone());
        let appended = self.append_step(transform, span.clone());
        let result = self.ident(ACCU_VAR, span.clone());
        self.finish_macro(call, range, var, None, accu_init, loop_condition, appended, result, span)
    }

    /// `range.map(var, filter, transform)`
    pub fn map_filter(
        &mut self,
        range: SpannedExpr,
        var: &str,
        filter: SpannedExpr,
        transform: SpannedExpr,
        span: Span,
    ) -> SpannedExpr {
        let call = self.macro_call(
            &range,
            "map",
            var,
            None,
            vec![filter.clone(), transform.clone()],
            span.clone(),
        );
        let accu_init = self.list(Vec::new(), span.clone());
        let loop_condition = self.bool(true, span.clone());
        let appended = self.append_step(transform, span.clone());
        let accu = self.ident(ACCU_VAR, span.clone());
        let loop_step = self.call("_?_:_", vec![filter, appended, accu], span.clone());
        let result = self.ident(ACCU_VAR, span.clone());
        self.finish_macro(call, range, var, None, accu_init, loop_condition, loop_step, result, span)
    }

    /// `range.filter(var, cond)`
    pub fn filter(&mut self, range: SpannedExpr, var: &str, cond: SpannedExpr, span: Span) -> SpannedExpr {
        let call = self.macro_call(&range, "filter", var, None, vec![cond.clone()], span.clone());
        let accu_init = self.list(Vec::new(), span.clone());
        let loop_condition = self.bool(true, span.clone());
        let elem = self.ident(var, span.clone());
        let appended = self.append_step(elem, span.clone());
        let accu = self.ident(ACCU_VAR, span.clone());
        let loop_step = self.call("_?_:_", vec![cond, appended, accu], span.clone());
        let result = self.ident(ACCU_VAR, span.clone());
        self.finish_macro(call, range, var, None, accu_init, loop_condition, loop_step, result, span)
    }

    /// `__result__ + [value]`
    fn append_step(&mut self, value: SpannedExpr, span: Span) -> SpannedExpr {
        let accu = self.ident(ACCU_VAR, span.clone());
        let single = self.list(vec![value], span.clone());
        self.call("_+_", vec![accu, single], span)
    }

    #[allow(clippy::too_many_arguments)]
    fn quantifier(
        &mut self,
        name: &str,
        range: SpannedExpr,
        var: &str,
        var2: Option<&str>,
        cond: SpannedExpr,
        accu_init: SpannedExpr,
        loop_condition: SpannedExpr,
        loop_step: SpannedExpr,
        span: Span,
    ) -> SpannedExpr {
        let call = self.macro_call(&range, name, var, var2, vec![cond], span.clone());
        let result = self.ident(ACCU_VAR, span.clone());
        self.finish_macro(call, range, var, var2, accu_init, loop_condition, loop_step, result, span)
    }

    fn macro_call(
        &mut self,
        range: &SpannedExpr,
        name: &str,
        var: &str,
        var2: Option<&str>,
        rest: Vec<SpannedExpr>,
        span: Span,
    ) -> SpannedExpr {
        let mut args = vec![self.ident(var, span.clone())];
        if let Some(var2) = var2 {
            args.push(self.ident(var2, span.clone()));
        }
        args.extend(rest);
        self.member_call(range.clone(), name, args, span)
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_macro(
        &mut self,
        call: SpannedExpr,
        range: SpannedExpr,
        var: &str,
        var2: Option<&str>,
        accu_init: SpannedExpr,
        loop_condition: SpannedExpr,
        loop_step: SpannedExpr,
        result: SpannedExpr,
        span: Span,
    ) -> SpannedExpr {
        let expanded = self.comprehension(
            ComprehensionExpr {
                iter_var: var.to_string(),
                iter_var2: var2.map(str::to_string),
                iter_range: range,
                accu_var: ACCU_VAR.to_string(),
                accu_init,
                loop_condition,
                loop_step,
                result,
            },
            span,
        );
        self.macro_calls.insert(expanded.id, call);
        expanded
    }
}
