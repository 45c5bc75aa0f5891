//! A single function declaration (or concrete binding thereof): its
//! argument list, result type, body, and binding-lifecycle state.
//!
//! Grounded on `Function` in `nudl/analysis/function.{h,cc}` (spec §3
//! "Function", §4.7 state machine): a `Function` starts `Declared`, moves to
//! `Abstract` if any argument type is unbound at definition, or straight to
//! `Concrete` otherwise; a call site binding an `Abstract` function produces
//! a fresh `Concrete` instance linked back to it by `binding_parent`.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use nudl_common::{NudlError, NudlResult};
use nudl_types::named_object::{NamedObject, ObjectKind};
use nudl_types::{BindArg, ScopeName, TypeId, TypeIdAllocator, TypeSpec};

use nudl_binder::var_base::VarKind;
use nudl_binder::VarBase;

use crate::expression::Expression;

/// A declared function parameter: the `VarBase` carrying its type, plus an
/// optional default-value expression (type-checked in the function's own
/// scope at definition time, per spec §4.7 "Default values").
pub struct Argument {
    var: Rc<VarBase>,
    default_value: RefCell<Option<Rc<Expression>>>,
}

impl Argument {
    #[must_use]
    pub fn new(var: Rc<VarBase>) -> Self {
        Self {
            var,
            default_value: RefCell::new(None),
        }
    }

    #[must_use]
    pub fn var(&self) -> &Rc<VarBase> {
        &self.var
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.var.name()
    }

    #[must_use]
    pub fn declared_type(&self) -> TypeSpec {
        self.var.original_type().clone()
    }

    #[must_use]
    pub fn has_default(&self) -> bool {
        self.default_value.borrow().is_some()
    }

    #[must_use]
    pub fn default_value(&self) -> Option<Rc<Expression>> {
        self.default_value.borrow().clone()
    }

    pub fn set_default_value(&self, expr: Rc<Expression>) {
        *self.default_value.borrow_mut() = Some(expr);
    }
}

/// Spec §4.7's function lifecycle. `Error` carries the structural
/// diagnostic that put the function in a terminal failed state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionState {
    Declared,
    Abstract,
    Concrete,
    Emitted,
    Error(String),
}

/// A function declaration or one of its concrete bindings.
pub struct Function {
    name: String,
    scope_name: Rc<ScopeName>,
    arguments: Vec<Argument>,
    result_type: RefCell<Option<TypeSpec>>,
    first_default_value_index: Cell<Option<usize>>,
    body: RefCell<Option<Rc<Expression>>>,
    /// Native implementation source, keyed by target-language tag (e.g.
    /// `"python"`), for functions the emitter should emit verbatim rather
    /// than translate from `body`.
    native_impls: RefCell<FxHashMap<String, String>>,
    skip_conversion: Cell<bool>,
    binding_parent: RefCell<Option<Weak<Function>>>,
    callees: RefCell<Vec<Rc<Function>>>,
    state: RefCell<FunctionState>,
}

impl Function {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        scope_name: Rc<ScopeName>,
        arguments: Vec<Argument>,
        result_type: Option<TypeSpec>,
    ) -> Rc<Self> {
        let first_default = arguments.iter().position(Argument::has_default);
        let state = if arguments.iter().any(|a| !a.declared_type().is_bound())
            || result_type.as_ref().is_none_or(|t| !t.is_bound())
        {
            FunctionState::Abstract
        } else {
            FunctionState::Concrete
        };
        Rc::new(Self {
            name: name.into(),
            scope_name,
            arguments,
            result_type: RefCell::new(result_type),
            first_default_value_index: Cell::new(first_default),
            body: RefCell::new(None),
            native_impls: RefCell::new(FxHashMap::default()),
            skip_conversion: Cell::new(false),
            binding_parent: RefCell::new(None),
            callees: RefCell::new(Vec::new()),
            state: RefCell::new(state),
        })
    }

    #[must_use]
    pub fn arguments(&self) -> &[Argument] {
        &self.arguments
    }

    #[must_use]
    pub fn result_type(&self) -> Option<TypeSpec> {
        self.result_type.borrow().clone()
    }

    pub fn set_result_type(&self, result_type: TypeSpec) {
        *self.result_type.borrow_mut() = Some(result_type);
    }

    #[must_use]
    pub fn first_default_value_index(&self) -> Option<usize> {
        self.first_default_value_index.get()
    }

    #[must_use]
    pub fn body(&self) -> Option<Rc<Expression>> {
        self.body.borrow().clone()
    }

    pub fn set_body(&self, body: Rc<Expression>) {
        *self.body.borrow_mut() = Some(body);
    }

    pub fn set_native_impl(&self, target: impl Into<String>, source: impl Into<String>) {
        self.native_impls.borrow_mut().insert(target.into(), source.into());
    }

    #[must_use]
    pub fn native_impl(&self, target: &str) -> Option<String> {
        self.native_impls.borrow().get(target).cloned()
    }

    #[must_use]
    pub fn skip_conversion(&self) -> bool {
        self.skip_conversion.get()
    }

    pub fn set_skip_conversion(&self, skip: bool) {
        self.skip_conversion.set(skip);
    }

    #[must_use]
    pub fn binding_parent(&self) -> Option<Rc<Function>> {
        self.binding_parent.borrow().as_ref().and_then(Weak::upgrade)
    }

    #[must_use]
    pub fn state(&self) -> FunctionState {
        self.state.borrow().clone()
    }

    pub fn set_state(&self, state: FunctionState) {
        *self.state.borrow_mut() = state;
    }

    #[must_use]
    pub fn is_abstract(&self) -> bool {
        matches!(self.state(), FunctionState::Abstract)
    }

    pub fn mark_emitted(&self) -> NudlResult<()> {
        if matches!(self.state(), FunctionState::Error(_)) {
            return Err(NudlError::failed_precondition(format!(
                "cannot emit function `{}`: it is in an error state",
                self.name
            )));
        }
        self.set_state(FunctionState::Emitted);
        Ok(())
    }

    pub fn add_callee(&self, callee: Rc<Function>) {
        self.callees.borrow_mut().push(callee);
    }

    #[must_use]
    pub fn callees(&self) -> Vec<Rc<Function>> {
        self.callees.borrow().clone()
    }

    /// The `Function<...>` `TypeSpec` this declaration presents, built from
    /// its argument types (with per-slot names) and result type.
    pub fn function_type(&self, alloc: &TypeIdAllocator) -> NudlResult<TypeSpec> {
        let result = self.result_type.borrow().clone().ok_or_else(|| {
            NudlError::failed_precondition(format!(
                "function `{}` has no result type set",
                self.name
            ))
        })?;
        let mut args: Vec<BindArg> = self
            .arguments
            .iter()
            .map(|a| BindArg::Named(a.name().to_string(), a.declared_type()))
            .collect();
        args.push(BindArg::Type(result));
        TypeSpec::builtin_base(TypeId::Function).bind(&args, alloc)
    }

    /// Produces a fresh `Concrete` instance of this (necessarily
    /// `Abstract`) function, with argument/result types replaced by
    /// `rebuilt`'s components and `binding_parent` pointing back to `self`
    /// (spec §4.7 "Function instances"). The body expression is shared,
    /// not deep-copied: it was already negotiated against the abstract
    /// local-name types, which the concrete types are guaranteed
    /// convertible from.
    pub fn instantiate(self: &Rc<Self>, rebuilt: &TypeSpec) -> NudlResult<Rc<Function>> {
        if rebuilt.type_id() != TypeId::Function {
            return Err(NudlError::invalid_argument(
                "instantiate requires a Function-typed rebuild",
            ));
        }
        let result_type = rebuilt.result_type().ok_or_else(|| {
            NudlError::invalid_argument("rebuilt function type has no result type")
        })?;
        let arg_types = &rebuilt.parameters()[..rebuilt.parameters().len() - 1];
        if arg_types.len() != self.arguments.len() {
            return Err(NudlError::invalid_argument(format!(
                "rebuilt function `{}` has {} arguments, expected {}",
                self.name,
                arg_types.len(),
                self.arguments.len()
            )));
        }
        let arguments: Vec<Argument> = self
            .arguments
            .iter()
            .zip(arg_types)
            .map(|(original, concrete_type)| {
                let var = VarBase::new(
                    VarKind::Argument,
                    original.name().to_string(),
                    Rc::clone(&self.scope_name),
                    concrete_type.clone(),
                );
                let arg = Argument::new(var);
                if let Some(default) = original.default_value() {
                    arg.set_default_value(default);
                }
                arg
            })
            .collect();
        let instance = Function::new(
            self.name.clone(),
            Rc::clone(&self.scope_name),
            arguments,
            Some(result_type),
        );
        instance.set_state(FunctionState::Concrete);
        *instance.binding_parent.borrow_mut() = Some(Rc::downgrade(self));
        if let Some(body) = self.body() {
            instance.set_body(body);
        }
        Ok(instance)
    }
}

impl NamedObject for Function {
    fn object_kind(&self) -> ObjectKind {
        ObjectKind::Function
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn scope_name(&self) -> Rc<ScopeName> {
        Rc::clone(&self.scope_name)
    }
}
