//! An overload set: every `Function` sharing a name and scope.
//!
//! Grounded on `FunctionGroup` in `nudl/analysis/function.{h,cc}` (spec §4.7
//! "FunctionGroup"): declarations accumulate in `functions` in source order
//! (used as the overload-resolution tie-breaker); concrete bindings produced
//! by instantiating an `Abstract` member at a call site accumulate
//! separately in `instances`, so the emitter can enumerate exactly the
//! concrete signatures a generic function was actually called with.

use std::cell::RefCell;
use std::rc::Rc;

use nudl_common::NudlResult;
use nudl_types::named_object::{NamedObject, ObjectKind};
use nudl_types::{ScopeName, TypeIdAllocator, TypeSpec};

use crate::function::Function;

pub struct FunctionGroup {
    name: String,
    scope_name: Rc<ScopeName>,
    functions: RefCell<Vec<Rc<Function>>>,
    instances: RefCell<Vec<Rc<Function>>>,
}

impl FunctionGroup {
    #[must_use]
    pub fn new(name: impl Into<String>, scope_name: Rc<ScopeName>) -> Rc<Self> {
        Rc::new(Self {
            name: name.into(),
            scope_name,
            functions: RefCell::new(Vec::new()),
            instances: RefCell::new(Vec::new()),
        })
    }

    pub fn add_function(&self, function: Rc<Function>) {
        self.functions.borrow_mut().push(function);
    }

    #[must_use]
    pub fn functions(&self) -> Vec<Rc<Function>> {
        self.functions.borrow().clone()
    }

    pub fn add_instance(&self, function: Rc<Function>) {
        self.instances.borrow_mut().push(function);
    }

    #[must_use]
    pub fn instances(&self) -> Vec<Rc<Function>> {
        self.instances.borrow().clone()
    }

    /// The `Function<...>` type a bare reference to this group types as,
    /// before any call-site overload resolution narrows it: the first
    /// declared overload's type, since a group with more than one overload
    /// can only be called, not passed around bare, per spec §4.7.
    pub fn representative_type(&self, alloc: &TypeIdAllocator) -> NudlResult<TypeSpec> {
        let functions = self.functions.borrow();
        let first = functions.first().ok_or_else(|| {
            nudl_common::NudlError::not_found(format!("function group `{}` has no overloads", self.name))
        })?;
        first.function_type(alloc)
    }
}

impl NamedObject for FunctionGroup {
    fn object_kind(&self) -> ObjectKind {
        ObjectKind::FunctionGroup
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn scope_name(&self) -> Rc<ScopeName> {
        Rc::clone(&self.scope_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nudl_binder::var_base::VarKind;
    use nudl_binder::VarBase;
    use nudl_types::TypeId;

    fn arg(name: &str, ty: TypeSpec) -> crate::function::Argument {
        crate::function::Argument::new(VarBase::new(
            VarKind::Argument,
            name,
            Rc::new(ScopeName::empty()),
            ty,
        ))
    }

    #[test]
    fn representative_type_is_the_first_declared_overloads_type() {
        let alloc = TypeIdAllocator::new();
        let group = FunctionGroup::new("f", Rc::new(ScopeName::empty()));
        let int = TypeSpec::builtin_base(TypeId::Int);
        let f = Function::new(
            "f",
            Rc::new(ScopeName::empty()),
            vec![arg("x", int.clone())],
            Some(int),
        );
        group.add_function(f);
        let ty = group.representative_type(&alloc).unwrap();
        assert_eq!(ty.type_id(), TypeId::Function);
    }

    #[test]
    fn an_empty_group_reports_not_found() {
        let alloc = TypeIdAllocator::new();
        let group = FunctionGroup::new("f", Rc::new(ScopeName::empty()));
        assert!(group.representative_type(&alloc).is_err());
    }
}
