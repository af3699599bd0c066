//! Comprehension type checking.

use cel_check_common::{CelType, ComprehensionExpr, VariableDecl};

use crate::checker::Checker;
use crate::errors::{CheckAbort, CheckErrorKind};

impl Checker<'_> {
    /// Check a comprehension.
    ///
    /// The range and accumulator initializer are checked in the enclosing
    /// scope. The accumulator and iteration variables then live in one fresh
    /// frame for the loop condition, loop step and result.
    pub(crate) fn check_comprehension(
        &mut self,
        comp: &mut ComprehensionExpr,
    ) -> Result<CelType, CheckAbort> {
        let range_type = self.check_expr(&mut comp.iter_range)?;
        let (var_type, var2_type) = match &range_type {
            CelType::List(elem) => (CelType::Int, (**elem).clone()),
            CelType::Map(key, value) => ((**key).clone(), (**value).clone()),
            CelType::Dyn | CelType::Error => (CelType::Dyn, CelType::Dyn),
            other => {
                let kind = CheckErrorKind::NotAComprehensionRange {
                    range: other.clone(),
                };
                self.report(kind, &comp.iter_range.span, comp.iter_range.id);
                (CelType::Dyn, CelType::Dyn)
            }
        };
        // A single variable walks list elements or map keys.
        let (iter_type, iter2_type) = match (&comp.iter_var2, &range_type) {
            (Some(_), _) => (var_type, Some(var2_type)),
            (None, CelType::List(_)) => (var2_type, None),
            (None, _) => (var_type, None),
        };

        let accu_type = self.check_expr(&mut comp.accu_init)?;

        let mut scopes = std::mem::take(&mut self.scopes).push();
        scopes.insert_ident(VariableDecl::new(comp.accu_var.clone(), accu_type.clone()));
        scopes.insert_ident(VariableDecl::new(comp.iter_var.clone(), iter_type));
        if let (Some(name), Some(cel_type)) = (&comp.iter_var2, iter2_type) {
            scopes.insert_ident(VariableDecl::new(name.clone(), cel_type));
        }
        self.scopes = scopes;

        let body = self.check_body(comp, &accu_type);
        self.scopes = std::mem::take(&mut self.scopes).pop();
        body
    }

    fn check_body(
        &mut self,
        comp: &mut ComprehensionExpr,
        accu_type: &CelType,
    ) -> Result<CelType, CheckAbort> {
        let condition = self.check_expr(&mut comp.loop_condition)?;
        if !CelType::Bool.is_assignable_from(&condition) {
            let kind = CheckErrorKind::TypeMismatch {
                expected: CelType::Bool,
                actual: condition,
            };
            self.report(kind, &comp.loop_condition.span, comp.loop_condition.id);
        }

        let step = self.check_expr(&mut comp.loop_step)?;
        if !accu_type.is_assignable_from(&step) {
            let kind = CheckErrorKind::TypeMismatch {
                expected: accu_type.clone(),
                actual: step,
            };
            self.report(kind, &comp.loop_step.span, comp.loop_step.id);
        }

        self.check_expr(&mut comp.result)
    }
}
