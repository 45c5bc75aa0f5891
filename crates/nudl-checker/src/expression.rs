//! The typed expression tree: every NuDL construct that produces a value
//! (or, for statement-shaped constructs like imports and definitions,
//! stands in for the side effect it already performed).
//!
//! Grounded on the `Expression` subclass family in `nudl/analysis/expression.{h,cc}`
//! (spec §3 "Expression", §4.6): each node negotiates its result type against
//! an optional hint from its surrounding context (an assignment's declared
//! type, a function's declared result type, a containing collection's
//! element type), caches the outcome on success, and exposes it through
//! [`TypedExpr`] so [`VarBase::assign`](nudl_binder::VarBase::assign) can
//! typecheck against it without this crate's concrete node types leaking
//! into `nudl-binder`.

use std::cell::RefCell;
use std::rc::Rc;

use nudl_common::{NudlError, NudlResult};
use nudl_types::{TypeId, TypeIdAllocator, TypeSpec};

use nudl_binder::var_base::TypedExpr;
use nudl_binder::VarBase;

use crate::function::Function;
use crate::function_binding::resolve_overload;
use crate::function_group::FunctionGroup;

/// What an `Identifier` expression names: the closed set of things a bare
/// name can resolve to once scope lookup has run (spec §3's `NamedObject`
/// kinds, narrowed to what can appear as an expression's value).
#[derive(Clone)]
pub enum IdentifierTarget {
    Var(Rc<VarBase>),
    Type(TypeSpec),
    Function(Rc<FunctionGroup>),
}

impl IdentifierTarget {
    fn result_type(&self, alloc: &TypeIdAllocator) -> NudlResult<TypeSpec> {
        match self {
            IdentifierTarget::Var(v) => Ok(v.effective_type()),
            IdentifierTarget::Type(_) => Ok(TypeSpec::builtin_base(TypeId::Type)),
            IdentifierTarget::Function(group) => group.representative_type(alloc),
        }
    }
}

/// Distinguishes `return`, `yield`, and `pass` forms of a function exit
/// (spec §4.6 "FunctionResult"). `Pass` carries no value and always types
/// as `Null`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    Return,
    Yield,
    Pass,
}

/// One named slot of a tuple literal or index: `(a: 1, 2)` has one named and
/// one positional element.
pub struct TupleElement {
    pub label: Option<String>,
    pub value: Rc<Expression>,
}

/// The concrete shape of an [`Expression`] node. Each variant is exactly one
/// of the node kinds spec §4.6 lists.
pub enum ExpressionKind {
    Literal {
        build_type: TypeSpec,
        lexeme: String,
    },
    Identifier {
        target: IdentifierTarget,
    },
    Assignment {
        var: Rc<VarBase>,
        value: Rc<Expression>,
    },
    EmptyStruct,
    ArrayDef {
        elements: Vec<Rc<Expression>>,
    },
    MapDef {
        entries: Vec<(Rc<Expression>, Rc<Expression>)>,
    },
    TupleDef {
        elements: Vec<TupleElement>,
    },
    If {
        branches: Vec<(Rc<Expression>, Rc<Expression>)>,
        else_branch: Option<Rc<Expression>>,
    },
    Block {
        children: Vec<Rc<Expression>>,
    },
    Index {
        collection: Rc<Expression>,
        index: Rc<Expression>,
    },
    TupleIndex {
        tuple: Rc<Expression>,
        index: usize,
    },
    Lambda {
        function: Rc<Function>,
    },
    DotAccess {
        base: Rc<Expression>,
        member: String,
    },
    FunctionCall {
        group: Rc<FunctionGroup>,
        positional: Vec<Rc<Expression>>,
        keyword: Vec<(String, Rc<Expression>)>,
        resolved_callee: RefCell<Option<Rc<Function>>>,
    },
    Import {
        alias: String,
    },
    FunctionDefinition {
        function: Rc<Function>,
    },
    SchemaDefinition {
        struct_type: TypeSpec,
    },
    TypeDefinition {
        declared: TypeSpec,
    },
    FunctionResult {
        kind: ExitKind,
        value: Option<Rc<Expression>>,
    },
    NoOp,
}

/// A node in the typed expression tree.
pub struct Expression {
    kind: ExpressionKind,
    cached_type: RefCell<Option<TypeSpec>>,
}

impl Expression {
    #[must_use]
    pub fn new(kind: ExpressionKind) -> Rc<Self> {
        Rc::new(Self {
            kind,
            cached_type: RefCell::new(None),
        })
    }

    #[must_use]
    pub fn kind(&self) -> &ExpressionKind {
        &self.kind
    }

    #[must_use]
    pub fn cached_type(&self) -> Option<TypeSpec> {
        self.cached_type.borrow().clone()
    }

    /// Negotiates this node's result type against an optional hint from its
    /// context (spec §4.6 "NegotiateType"). Idempotent: once a node has
    /// negotiated successfully, later calls return the cached type without
    /// re-walking children, regardless of the hint passed.
    pub fn negotiate_type(
        self: &Rc<Self>,
        hint: Option<&TypeSpec>,
        alloc: &TypeIdAllocator,
    ) -> NudlResult<TypeSpec> {
        if let Some(cached) = self.cached_type() {
            return Ok(cached);
        }
        let result = self.negotiate_uncached(hint, alloc)?;
        *self.cached_type.borrow_mut() = Some(result.clone());
        Ok(result)
    }

    fn negotiate_uncached(
        self: &Rc<Self>,
        hint: Option<&TypeSpec>,
        alloc: &TypeIdAllocator,
    ) -> NudlResult<TypeSpec> {
        match &self.kind {
            ExpressionKind::Literal { build_type, .. } => {
                if let Some(h) = hint {
                    if h.type_id().is_numeric_family()
                        && build_type.is_ancestor_of(h)
                        && !build_type.is_equal(h)
                    {
                        return Ok(h.clone());
                    }
                }
                Ok(build_type.clone())
            }
            ExpressionKind::Identifier { target } => target.result_type(alloc),
            ExpressionKind::Assignment { var, value } => {
                value.negotiate_type(Some(var.original_type()), alloc)?;
                var.assign(Rc::clone(value) as Rc<dyn TypedExpr>)?;
                Ok(TypeSpec::null())
            }
            ExpressionKind::EmptyStruct => match hint {
                Some(h)
                    if matches!(
                        h.type_id(),
                        TypeId::Array | TypeId::Set | TypeId::Map | TypeId::Tuple
                    ) =>
                {
                    Ok(h.clone())
                }
                _ => TypeSpec::builtin_base(TypeId::Tuple).bind(&[], alloc),
            },
            ExpressionKind::ArrayDef { elements } => {
                let inner_hint = hint.and_then(TypeSpec::indexed_type);
                let element_types = negotiate_all(elements, inner_hint.as_ref(), alloc)?;
                let element_type = least_common_ancestor(&element_types)
                    .ok_or_else(|| NudlError::invalid_argument("empty array literal needs a hint"))?;
                reject_bare_any(&element_type, "array element")?;
                TypeSpec::builtin_base(TypeId::Array)
                    .bind(&[nudl_types::BindArg::Type(element_type)], alloc)
            }
            ExpressionKind::MapDef { entries } => {
                let key_types = negotiate_all(
                    &entries.iter().map(|(k, _)| Rc::clone(k)).collect::<Vec<_>>(),
                    None,
                    alloc,
                )?;
                let value_types = negotiate_all(
                    &entries.iter().map(|(_, v)| Rc::clone(v)).collect::<Vec<_>>(),
                    None,
                    alloc,
                )?;
                let key_type = least_common_ancestor(&key_types)
                    .ok_or_else(|| NudlError::invalid_argument("empty map literal needs a hint"))?;
                let value_type = least_common_ancestor(&value_types)
                    .ok_or_else(|| NudlError::invalid_argument("empty map literal needs a hint"))?;
                reject_bare_any(&key_type, "map key")?;
                reject_bare_any(&value_type, "map value")?;
                TypeSpec::builtin_base(TypeId::Map).bind(
                    &[
                        nudl_types::BindArg::Type(key_type),
                        nudl_types::BindArg::Type(value_type),
                    ],
                    alloc,
                )
            }
            ExpressionKind::TupleDef { elements } => {
                let mut args = Vec::with_capacity(elements.len());
                for element in elements {
                    let ty = element.value.negotiate_type(None, alloc)?;
                    args.push(match &element.label {
                        Some(label) => nudl_types::BindArg::Named(label.clone(), ty),
                        None => nudl_types::BindArg::Type(ty),
                    });
                }
                TypeSpec::builtin_base(TypeId::Tuple).bind(&args, alloc)
            }
            ExpressionKind::If {
                branches,
                else_branch,
            } => {
                let boolean = TypeSpec::builtin_base(TypeId::Bool);
                let mut branch_types = Vec::with_capacity(branches.len() + 1);
                for (condition, body) in branches {
                    condition.negotiate_type(Some(&boolean), alloc)?;
                    branch_types.push(body.negotiate_type(hint, alloc)?);
                }
                match else_branch {
                    Some(body) => {
                        branch_types.push(body.negotiate_type(hint, alloc)?);
                        least_common_ancestor(&branch_types)
                            .ok_or_else(|| NudlError::invalid_argument("if branches share no common ancestor"))
                    }
                    None => {
                        let lca = least_common_ancestor(&branch_types)
                            .ok_or_else(|| NudlError::invalid_argument("if branches share no common ancestor"))?;
                        TypeSpec::builtin_base(TypeId::Nullable)
                            .bind(&[nudl_types::BindArg::Type(lca)], alloc)
                    }
                }
            }
            ExpressionKind::Block { children } => {
                let mut last = TypeSpec::null();
                for child in children {
                    last = child.negotiate_type(None, alloc)?;
                }
                Ok(last)
            }
            ExpressionKind::Index { collection, index } => {
                let collection_type = collection.negotiate_type(None, alloc)?;
                let index_hint = collection_type.index_type();
                index.negotiate_type(index_hint.as_ref(), alloc)?;
                collection_type.indexed_type().ok_or_else(|| {
                    NudlError::invalid_argument(format!(
                        "`{}` does not support indexing",
                        collection_type.full_name()
                    ))
                })
            }
            ExpressionKind::TupleIndex { tuple, index } => {
                let tuple_type = tuple.negotiate_type(None, alloc)?;
                tuple_type
                    .parameters()
                    .get(*index)
                    .cloned()
                    .ok_or_else(|| {
                        NudlError::invalid_argument(format!(
                            "tuple index {index} out of range for `{}`",
                            tuple_type.full_name()
                        ))
                    })
            }
            ExpressionKind::Lambda { function } => function.function_type(alloc),
            ExpressionKind::DotAccess { base, member } => {
                let base_type = base.negotiate_type(None, alloc)?;
                let store = base_type.member_store().ok_or_else(|| {
                    NudlError::not_found(format!("`{}` has no members", base_type.full_name()))
                })?;
                let field = store.field(member).ok_or_else(|| {
                    NudlError::not_found(format!(
                        "no field `{member}` on `{}`",
                        base_type.full_name()
                    ))
                })?;
                Ok(field.field_type().clone())
            }
            ExpressionKind::FunctionCall {
                group,
                positional,
                keyword,
                resolved_callee,
            } => {
                let positional_types = negotiate_all(positional, None, alloc)?;
                let mut keyword_types = Vec::with_capacity(keyword.len());
                for (name, expr) in keyword {
                    keyword_types.push((name.clone(), expr.negotiate_type(None, alloc)?));
                }
                let binding = resolve_overload(group, &positional_types, &keyword_types, alloc)?;
                if let Some(target) = binding.target() {
                    *resolved_callee.borrow_mut() = Some(target);
                }
                Ok(binding.result_type())
            }
            ExpressionKind::Import { .. } => Ok(TypeSpec::null()),
            ExpressionKind::FunctionDefinition { .. } => Ok(TypeSpec::null()),
            ExpressionKind::SchemaDefinition { .. } => Ok(TypeSpec::null()),
            ExpressionKind::TypeDefinition { .. } => Ok(TypeSpec::null()),
            ExpressionKind::FunctionResult { kind, value } => match (kind, value) {
                (ExitKind::Pass, _) => Ok(TypeSpec::null()),
                (_, Some(value)) => value.negotiate_type(hint, alloc),
                (_, None) => Ok(TypeSpec::null()),
            },
            ExpressionKind::NoOp => Ok(TypeSpec::null()),
        }
    }

    /// For a `FunctionCall` node, the overload selected by the most recent
    /// successful negotiation, if any.
    #[must_use]
    pub fn resolved_callee(&self) -> Option<Rc<Function>> {
        match &self.kind {
            ExpressionKind::FunctionCall {
                resolved_callee, ..
            } => resolved_callee.borrow().clone(),
            _ => None,
        }
    }

    /// Whether every path through this node unconditionally exits its
    /// enclosing function (spec §4.6, used to validate that a function with
    /// a declared non-`Null` result type always produces one).
    #[must_use]
    pub fn always_exits(&self) -> bool {
        match &self.kind {
            ExpressionKind::FunctionResult { .. } => true,
            ExpressionKind::Block { children } => {
                children.last().is_some_and(|c| c.always_exits())
            }
            ExpressionKind::If {
                branches,
                else_branch,
            } => {
                else_branch.as_ref().is_some_and(|e| e.always_exits())
                    && branches.iter().all(|(_, body)| body.always_exits())
            }
            _ => false,
        }
    }

    /// Deep-copies this subtree, giving `replace` first refusal on every
    /// node: when it returns `Some`, that subtree is used in place of a
    /// recursive copy (spec §4.6 "Clone(override)", used to instantiate a
    /// lambda body against concrete argument `VarBase`s at a call site).
    #[must_use]
    pub fn clone_with(self: &Rc<Self>, replace: &dyn Fn(&Rc<Expression>) -> Option<Rc<Expression>>) -> Rc<Self> {
        if let Some(replacement) = replace(self) {
            return replacement;
        }
        let cloned_kind = match &self.kind {
            ExpressionKind::Assignment { var, value } => ExpressionKind::Assignment {
                var: Rc::clone(var),
                value: value.clone_with(replace),
            },
            ExpressionKind::ArrayDef { elements } => ExpressionKind::ArrayDef {
                elements: elements.iter().map(|e| e.clone_with(replace)).collect(),
            },
            ExpressionKind::MapDef { entries } => ExpressionKind::MapDef {
                entries: entries
                    .iter()
                    .map(|(k, v)| (k.clone_with(replace), v.clone_with(replace)))
                    .collect(),
            },
            ExpressionKind::TupleDef { elements } => ExpressionKind::TupleDef {
                elements: elements
                    .iter()
                    .map(|e| TupleElement {
                        label: e.label.clone(),
                        value: e.value.clone_with(replace),
                    })
                    .collect(),
            },
            ExpressionKind::If {
                branches,
                else_branch,
            } => ExpressionKind::If {
                branches: branches
                    .iter()
                    .map(|(c, b)| (c.clone_with(replace), b.clone_with(replace)))
                    .collect(),
                else_branch: else_branch.as_ref().map(|e| e.clone_with(replace)),
            },
            ExpressionKind::Block { children } => ExpressionKind::Block {
                children: children.iter().map(|c| c.clone_with(replace)).collect(),
            },
            ExpressionKind::Index { collection, index } => ExpressionKind::Index {
                collection: collection.clone_with(replace),
                index: index.clone_with(replace),
            },
            ExpressionKind::TupleIndex { tuple, index } => ExpressionKind::TupleIndex {
                tuple: tuple.clone_with(replace),
                index: *index,
            },
            ExpressionKind::DotAccess { base, member } => ExpressionKind::DotAccess {
                base: base.clone_with(replace),
                member: member.clone(),
            },
            ExpressionKind::FunctionCall {
                group,
                positional,
                keyword,
                ..
            } => ExpressionKind::FunctionCall {
                group: Rc::clone(group),
                positional: positional.iter().map(|e| e.clone_with(replace)).collect(),
                keyword: keyword
                    .iter()
                    .map(|(n, e)| (n.clone(), e.clone_with(replace)))
                    .collect(),
                resolved_callee: RefCell::new(None),
            },
            ExpressionKind::FunctionResult { kind, value } => ExpressionKind::FunctionResult {
                kind: *kind,
                value: value.as_ref().map(|v| v.clone_with(replace)),
            },
            ExpressionKind::Literal { build_type, lexeme } => ExpressionKind::Literal {
                build_type: build_type.clone(),
                lexeme: lexeme.clone(),
            },
            ExpressionKind::Identifier { target } => ExpressionKind::Identifier {
                target: target.clone(),
            },
            ExpressionKind::EmptyStruct => ExpressionKind::EmptyStruct,
            ExpressionKind::Lambda { function } => ExpressionKind::Lambda {
                function: Rc::clone(function),
            },
            ExpressionKind::Import { alias } => ExpressionKind::Import {
                alias: alias.clone(),
            },
            ExpressionKind::FunctionDefinition { function } => ExpressionKind::FunctionDefinition {
                function: Rc::clone(function),
            },
            ExpressionKind::SchemaDefinition { struct_type } => ExpressionKind::SchemaDefinition {
                struct_type: struct_type.clone(),
            },
            ExpressionKind::TypeDefinition { declared } => ExpressionKind::TypeDefinition {
                declared: declared.clone(),
            },
            ExpressionKind::NoOp => ExpressionKind::NoOp,
        };
        Expression::new(cloned_kind)
    }
}

impl TypedExpr for Expression {
    /// Returns the type this node cached the last time `negotiate_type`
    /// succeeded. Callers in this crate only ever hand out an `Expression`
    /// to `VarBase::assign` after negotiating it, so this holds in
    /// practice; a node that was never negotiated reports `Any` rather than
    /// panicking, since `TypedExpr::result_type` has no way to fail.
    fn result_type(&self) -> TypeSpec {
        self.cached_type().unwrap_or_else(TypeSpec::any)
    }
}

fn negotiate_all(
    exprs: &[Rc<Expression>],
    hint: Option<&TypeSpec>,
    alloc: &TypeIdAllocator,
) -> NudlResult<Vec<TypeSpec>> {
    exprs.iter().map(|e| e.negotiate_type(hint, alloc)).collect()
}

fn reject_bare_any(ty: &TypeSpec, what: &str) -> NudlResult<()> {
    if ty.type_id() == TypeId::Any {
        return Err(NudlError::invalid_argument(format!(
            "{what} type has no common ancestor narrower than Any"
        )));
    }
    Ok(())
}

/// The narrowest type that is an ancestor of every type in `types`, or
/// `None` for an empty slice. Walks the first type's own ancestor chain,
/// since every builtin lattice is a tree and `Any` is its root (spec §3
/// "ancestor"): the first ancestor (possibly the type itself) that is also
/// an ancestor of every other element is the answer.
fn least_common_ancestor(types: &[TypeSpec]) -> Option<TypeSpec> {
    let (first, rest) = types.split_first()?;
    let mut candidate = first.clone();
    loop {
        if rest.iter().all(|t| candidate.is_ancestor_of(t)) {
            return Some(candidate);
        }
        candidate = candidate.ancestor()?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nudl_types::ScopeName;

    fn lit(ty: TypeSpec) -> Rc<Expression> {
        Expression::new(ExpressionKind::Literal {
            build_type: ty,
            lexeme: String::new(),
        })
    }

    #[test]
    fn literal_negotiates_to_its_build_type_without_a_hint() {
        let alloc = TypeIdAllocator::new();
        let int = TypeSpec::builtin_base(TypeId::Int);
        let expr = lit(int.clone());
        let result = expr.negotiate_type(None, &alloc).unwrap();
        assert!(result.is_equal(&int));
    }

    #[test]
    fn literal_narrows_to_a_more_specific_numeric_hint() {
        let alloc = TypeIdAllocator::new();
        let int = TypeSpec::builtin_base(TypeId::Int);
        let int8 = TypeSpec::builtin_base(TypeId::Int8);
        let expr = lit(int);
        let result = expr.negotiate_type(Some(&int8), &alloc).unwrap();
        assert!(result.is_equal(&int8));
    }

    #[test]
    fn negotiate_type_is_cached_after_first_success() {
        let alloc = TypeIdAllocator::new();
        let int = TypeSpec::builtin_base(TypeId::Int);
        let string = TypeSpec::builtin_base(TypeId::String);
        let expr = lit(int.clone());
        expr.negotiate_type(None, &alloc).unwrap();
        let second = expr.negotiate_type(Some(&string), &alloc).unwrap();
        assert!(second.is_equal(&int));
    }

    #[test]
    fn array_literal_uses_the_least_common_ancestor_of_its_elements() {
        let alloc = TypeIdAllocator::new();
        let int8 = TypeSpec::builtin_base(TypeId::Int8);
        let int32 = TypeSpec::builtin_base(TypeId::Int32);
        let expr = Expression::new(ExpressionKind::ArrayDef {
            elements: vec![lit(int8), lit(int32)],
        });
        let result = expr.negotiate_type(None, &alloc).unwrap();
        assert_eq!(result.type_id(), TypeId::Array);
        let int = TypeSpec::builtin_base(TypeId::Int);
        assert!(result.parameters()[0].is_equal(&int));
    }

    #[test]
    fn if_without_an_else_branch_wraps_the_result_in_nullable() {
        let alloc = TypeIdAllocator::new();
        let boolean = lit(TypeSpec::builtin_base(TypeId::Bool));
        let body = lit(TypeSpec::builtin_base(TypeId::Int));
        let expr = Expression::new(ExpressionKind::If {
            branches: vec![(boolean, body)],
            else_branch: None,
        });
        let result = expr.negotiate_type(None, &alloc).unwrap();
        assert_eq!(result.type_id(), TypeId::Nullable);
    }

    #[test]
    fn assignment_negotiates_its_value_and_narrows_the_target_variable() {
        let alloc = TypeIdAllocator::new();
        let numeric = TypeSpec::builtin_base(TypeId::Numeric);
        let var = VarBase::new(
            nudl_binder::VarKind::Var,
            "x",
            Rc::new(ScopeName::empty()),
            numeric,
        );
        let int = TypeSpec::builtin_base(TypeId::Int);
        let expr = Expression::new(ExpressionKind::Assignment {
            var: Rc::clone(&var),
            value: lit(int.clone()),
        });
        let result = expr.negotiate_type(None, &alloc).unwrap();
        assert_eq!(result.type_id(), TypeId::Null);
        assert!(var.effective_type().is_equal(&int));
    }

    #[test]
    fn block_result_is_its_last_childs_type() {
        let alloc = TypeIdAllocator::new();
        let string = TypeSpec::builtin_base(TypeId::String);
        let expr = Expression::new(ExpressionKind::Block {
            children: vec![lit(TypeSpec::builtin_base(TypeId::Int)), lit(string.clone())],
        });
        let result = expr.negotiate_type(None, &alloc).unwrap();
        assert!(result.is_equal(&string));
    }

    #[test]
    fn always_exits_is_true_only_when_every_branch_returns() {
        let returning = Expression::new(ExpressionKind::FunctionResult {
            kind: ExitKind::Return,
            value: Some(lit(TypeSpec::builtin_base(TypeId::Int))),
        });
        let plain = lit(TypeSpec::builtin_base(TypeId::Int));
        let if_without_else = Expression::new(ExpressionKind::If {
            branches: vec![(lit(TypeSpec::builtin_base(TypeId::Bool)), Rc::clone(&returning))],
            else_branch: None,
        });
        let if_with_else = Expression::new(ExpressionKind::If {
            branches: vec![(lit(TypeSpec::builtin_base(TypeId::Bool)), returning)],
            else_branch: Some(plain),
        });
        assert!(!if_without_else.always_exits());
        assert!(!if_with_else.always_exits());
    }
}
