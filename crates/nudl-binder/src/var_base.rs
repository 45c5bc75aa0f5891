//! A typed, assignable name: a local variable, a function parameter or
//! argument, or a struct field reached through one (`v.f.g`).
//!
//! Grounded on `VarBase` in `nudl/analysis/vars.{h,cc}`: every variable
//! carries both its *original* declared type and a current *effective*
//! type that assignment can narrow (e.g. a `Union<Int, String>` local
//! narrows to `Int` after `v = 1`). Member access (`v.f`) is resolved
//! lazily by walking the effective type's member store and cloning the
//! found field into a fresh child `VarBase` reparented under `v`, so the
//! shared type-level member store is never mutated.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use nudl_common::{NudlError, NudlResult};
use nudl_types::named_object::{NamedObject, ObjectKind};
use nudl_types::type_member_store::TypeMemberStore;
use nudl_types::{ScopeName, TypeId, TypeSpec};

/// The closed set of roles a [`VarBase`] can play, mirroring the
/// `VarKind` discriminant in `vars.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarKind {
    Var,
    Parameter,
    Argument,
    Field,
}

/// Anything a typed expression can be assigned to: an already-analyzed
/// expression node exposing the type it negotiated. Kept as a trait
/// rather than a concrete `Expression` so this crate does not need to
/// depend on the expression tree built one layer up, in `nudl-checker`.
///
/// Requires `Any` so code one layer up (`nudl_checker::field_usage`, which
/// walks `Module::top_level`'s erased `Rc<dyn TypedExpr>` entries) can
/// downcast back to the concrete `Expression` it actually stored there.
pub trait TypedExpr: std::any::Any {
    fn result_type(&self) -> TypeSpec;

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

/// A variable, parameter, argument, or field-access result.
pub struct VarBase {
    kind: VarKind,
    name: String,
    scope_name: Rc<ScopeName>,
    parent: Option<Weak<VarBase>>,
    original_type: TypeSpec,
    effective_type: RefCell<TypeSpec>,
    assignment_log: RefCell<Vec<(Rc<dyn TypedExpr>, TypeSpec)>>,
    failed_assignments: RefCell<Vec<Rc<dyn TypedExpr>>>,
    members: RefCell<FxHashMap<String, Rc<VarBase>>>,
}

impl VarBase {
    #[must_use]
    pub fn new(
        kind: VarKind,
        name: impl Into<String>,
        scope_name: Rc<ScopeName>,
        original_type: TypeSpec,
    ) -> Rc<Self> {
        Self::with_parent(kind, name, scope_name, original_type, None)
    }

    fn with_parent(
        kind: VarKind,
        name: impl Into<String>,
        scope_name: Rc<ScopeName>,
        original_type: TypeSpec,
        parent: Option<Weak<VarBase>>,
    ) -> Rc<Self> {
        let effective_type = original_type.clone();
        Rc::new(Self {
            kind,
            name: name.into(),
            scope_name,
            parent,
            original_type,
            effective_type: RefCell::new(effective_type),
            assignment_log: RefCell::new(Vec::new()),
            failed_assignments: RefCell::new(Vec::new()),
            members: RefCell::new(FxHashMap::default()),
        })
    }

    #[must_use]
    pub fn kind(&self) -> VarKind {
        self.kind
    }

    #[must_use]
    pub fn original_type(&self) -> &TypeSpec {
        &self.original_type
    }

    #[must_use]
    pub fn effective_type(&self) -> TypeSpec {
        self.effective_type.borrow().clone()
    }

    #[must_use]
    pub fn assignment_log(&self) -> Vec<(Rc<dyn TypedExpr>, TypeSpec)> {
        self.assignment_log.borrow().clone()
    }

    #[must_use]
    pub fn failed_assignments(&self) -> Vec<Rc<dyn TypedExpr>> {
        self.failed_assignments.borrow().clone()
    }

    /// Typechecks an assignment: `expr`'s result type must have both the
    /// variable's original type and its current effective type as an
    /// ancestor. On success the effective type may narrow to the
    /// assigned type, except it is never narrowed to `Null` (a `v = null`
    /// assignment to a `Nullable<T>` local keeps `v` nullable, it does not
    /// collapse its tracked type to the bottom type).
    pub fn assign(&self, expr: Rc<dyn TypedExpr>) -> NudlResult<()> {
        let actual = expr.result_type();
        let original_ok = self.original_type.is_ancestor_of(&actual);
        let effective_ok = self.effective_type.borrow().is_ancestor_of(&actual);
        if !original_ok || !effective_ok {
            let message = format!(
                "cannot assign `{}` to `{}`: declared type `{}`, current type `{}`",
                actual.full_name(),
                self.name,
                self.original_type.full_name(),
                self.effective_type.borrow().full_name(),
            );
            self.failed_assignments.borrow_mut().push(expr);
            return Err(NudlError::invalid_argument(message));
        }
        if actual.type_id() != TypeId::Null {
            *self.effective_type.borrow_mut() = actual.clone();
        }
        self.assignment_log.borrow_mut().push((expr, actual));
        Ok(())
    }

    /// Resolves `v.local_name`, lazily cloning the member found on the
    /// variable's effective type's member store into a fresh child
    /// `VarBase` reparented under `self`. Repeated lookups of the same
    /// local name return the same child instance.
    pub fn get_name(self: &Rc<Self>, local_name: &str) -> NudlResult<Rc<VarBase>> {
        if let Some(existing) = self.members.borrow().get(local_name) {
            return Ok(Rc::clone(existing));
        }
        let effective = self.effective_type.borrow().clone();
        let store: Rc<TypeMemberStore> = effective.member_store().ok_or_else(|| {
            NudlError::not_found(format!(
                "`{}` has no members (type `{}`)",
                self.name,
                effective.full_name()
            ))
        })?;
        let field = store.field(local_name).ok_or_else(|| {
            NudlError::not_found(format!(
                "no field `{local_name}` on `{}`",
                effective.full_name()
            ))
        })?;
        let child = VarBase::with_parent(
            VarKind::Field,
            local_name,
            Rc::clone(&self.scope_name),
            field.field_type().clone(),
            Some(Rc::downgrade(self)),
        );
        self.members
            .borrow_mut()
            .insert(local_name.to_string(), Rc::clone(&child));
        Ok(child)
    }

    #[must_use]
    pub fn parent(&self) -> Option<Rc<VarBase>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Walks `parent` pointers to the outermost enclosing `VarBase` (the
    /// root of a `v.f.g` chain), used during emission to detect whether an
    /// identifier use crosses a module boundary.
    #[must_use]
    pub fn get_root_var(self: &Rc<Self>) -> Rc<VarBase> {
        let mut current = Rc::clone(self);
        loop {
            match current.parent() {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }
}

impl NamedObject for VarBase {
    fn object_kind(&self) -> ObjectKind {
        match self.kind {
            VarKind::Field => ObjectKind::Field,
            _ => ObjectKind::Var,
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn scope_name(&self) -> Rc<ScopeName> {
        Rc::clone(&self.scope_name)
    }
}
