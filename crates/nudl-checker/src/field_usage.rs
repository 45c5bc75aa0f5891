//! Computes, for every struct type a module touches, the set of field names
//! actually read from it — the pruning hint the emitter uses to drop
//! fields a Python dataclass would otherwise carry unused (spec §4.8
//! "FieldUsageVisitor").
//!
//! Grounded on `FieldUsageVisitor` in `nudl/analysis/scope.{h,cc}`. Lives in
//! this crate rather than `nudl-binder` (see that crate's top-level doc
//! comment) because it walks the concrete [`Expression`] tree; it crosses
//! function-call boundaries by following a `FunctionCall` node's resolved
//! callee into that function's own body, so usage inside a helper function
//! counts against the caller's module too.

use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use nudl_binder::var_base::TypedExpr;
use nudl_binder::Module;

use crate::expression::{Expression, ExpressionKind};
use crate::function::Function;

/// Accumulates `type full_name -> {field names}` across a module (and any
/// function it calls into), visiting each function body at most once even
/// under recursion.
#[derive(Default)]
pub struct FieldUsageVisitor {
    used: std::cell::RefCell<FxHashMap<String, FxHashSet<String>>>,
    visited_functions: std::cell::RefCell<FxHashSet<usize>>,
}

impl FieldUsageVisitor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn used_fields(&self) -> FxHashMap<String, FxHashSet<String>> {
        self.used.borrow().clone()
    }

    #[must_use]
    pub fn fields_of(&self, type_full_name: &str) -> FxHashSet<String> {
        self.used
            .borrow()
            .get(type_full_name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn visit_module(&self, module: &Module) {
        for expr in module.top_level() {
            if let Some(expr) = expr.as_any().downcast_ref::<Expression>() {
                self.visit_expression(expr);
            }
        }
    }

    fn record(&self, owner_type: &str, field: &str) {
        self.used
            .borrow_mut()
            .entry(owner_type.to_string())
            .or_default()
            .insert(field.to_string());
    }

    fn visit_expression(&self, expr: &Expression) {
        match expr.kind() {
            ExpressionKind::DotAccess { base, member } => {
                self.visit_expression(base);
                if let Some(base_type) = base.cached_type() {
                    self.record(&base_type.full_name(), member);
                }
            }
            ExpressionKind::Assignment { value, .. } => self.visit_expression(value),
            ExpressionKind::ArrayDef { elements } => {
                elements.iter().for_each(|e| self.visit_expression(e));
            }
            ExpressionKind::MapDef { entries } => entries.iter().for_each(|(k, v)| {
                self.visit_expression(k);
                self.visit_expression(v);
            }),
            ExpressionKind::TupleDef { elements } => {
                elements.iter().for_each(|e| self.visit_expression(&e.value));
            }
            ExpressionKind::If {
                branches,
                else_branch,
            } => {
                for (condition, body) in branches {
                    self.visit_expression(condition);
                    self.visit_expression(body);
                }
                if let Some(body) = else_branch {
                    self.visit_expression(body);
                }
            }
            ExpressionKind::Block { children } => {
                children.iter().for_each(|c| self.visit_expression(c));
            }
            ExpressionKind::Index { collection, index } => {
                self.visit_expression(collection);
                self.visit_expression(index);
            }
            ExpressionKind::TupleIndex { tuple, .. } => self.visit_expression(tuple),
            ExpressionKind::Lambda { function } => self.visit_function(function),
            ExpressionKind::FunctionCall {
                positional,
                keyword,
                ..
            } => {
                positional.iter().for_each(|e| self.visit_expression(e));
                keyword.iter().for_each(|(_, e)| self.visit_expression(e));
                if let Some(callee) = expr.resolved_callee() {
                    self.visit_function(&callee);
                }
            }
            ExpressionKind::FunctionDefinition { function } => self.visit_function(function),
            ExpressionKind::FunctionResult { value, .. } => {
                if let Some(value) = value {
                    self.visit_expression(value);
                }
            }
            ExpressionKind::Literal { .. }
            | ExpressionKind::Identifier { .. }
            | ExpressionKind::EmptyStruct
            | ExpressionKind::Import { .. }
            | ExpressionKind::SchemaDefinition { .. }
            | ExpressionKind::TypeDefinition { .. }
            | ExpressionKind::NoOp => {}
        }
    }

    fn visit_function(&self, function: &Rc<Function>) {
        let identity = Rc::as_ptr(function) as usize;
        if !self.visited_functions.borrow_mut().insert(identity) {
            return;
        }
        if let Some(body) = function.body() {
            self.visit_expression(&body);
        }
    }
}
