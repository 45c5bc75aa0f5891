//! The "what members does this type have" store, and its binding graph.
//!
//! Grounded on `TypeMemberStore` in `nudl/analysis/type_spec.{h,cc}`. A
//! member store is attached to every [`crate::type_spec::TypeSpec`]; when a
//! parametric type is bound (`Array<Any>` → `Array<Int>`), the bound
//! instance gets a fresh child store linked back to the unbound parent by a
//! canonical binding signature, so member lookup can walk: self → bound
//! children whose type is an ancestor of the queried type → binding parent
//! → ancestor (spec §3 "TypeMemberStore").
//!
//! The C++ source manages this cyclic graph (parent ↔ bound child, type ↔
//! its member store) with an explicit `RemoveBindingParent`/
//! `RemoveMemberType` destructor dance to avoid use-after-free. In Rust the
//! same shape is expressed with `Rc` for the owning direction (parent owns
//! its bound children, a store owns its member objects) and `Weak` for the
//! back-reference (`binding_parent`); no manual teardown sequence is
//! needed; `Weak::upgrade` simply returns `None` once the owner is gone
//! (spec §9 "Cyclic member-store graph").

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use nudl_common::{NudlError, NudlResult};

use crate::named_object::NamedObject;
#[cfg(test)]
use crate::named_object::ObjectKind;
#[cfg(test)]
use crate::names::ScopeName;
use crate::type_spec::TypeSpec;

/// A single struct field: a name and its declared type.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
    field_type: TypeSpec,
}

impl Field {
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: TypeSpec) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn field_type(&self) -> &TypeSpec {
        &self.field_type
    }
}

/// The member store attached to every [`TypeSpec`]. Holds ordinary members
/// (methods, and for struct types, fields) plus the binding-graph plumbing.
pub struct TypeMemberStore {
    owner_name: String,
    ancestor: RefCell<Option<Rc<TypeMemberStore>>>,
    binding_parent: RefCell<Option<Weak<TypeMemberStore>>>,
    binding_signature: RefCell<String>,
    bound_children: RefCell<FxHashMap<String, Rc<TypeMemberStore>>>,
    /// Cache of fully-bound `TypeSpec`s keyed by binding signature, giving
    /// `Bind` idempotence (spec §8: `G.Bind(args).Clone().IsEqual(G.Bind(args))`)
    /// and reusing synthesized struct types for repeated generator calls
    /// with identical arguments.
    bound_types: RefCell<FxHashMap<String, TypeSpec>>,
    order: RefCell<Vec<String>>,
    members: RefCell<FxHashMap<String, Rc<dyn NamedObject>>>,
    /// Struct-only: ordered fields (spec "StructMemberStore").
    fields: RefCell<Vec<Field>>,
    /// Which `TypeSpec` this store was bound for, set by
    /// `TypeSpec::bind` via [`Self::set_owner_type_hint`]. Used to resolve
    /// the binding-order walk's "bound children whose type is an ancestor
    /// of the queried type" step without a strong cyclic back-pointer.
    owner_type: RefCell<Option<TypeSpec>>,
}

impl TypeMemberStore {
    #[must_use]
    pub fn new(owner_name: impl Into<String>, ancestor: Option<Rc<TypeMemberStore>>) -> Rc<Self> {
        Rc::new(Self {
            owner_name: owner_name.into(),
            ancestor: RefCell::new(ancestor),
            binding_parent: RefCell::new(None),
            binding_signature: RefCell::new(String::new()),
            bound_children: RefCell::new(FxHashMap::default()),
            bound_types: RefCell::new(FxHashMap::default()),
            order: RefCell::new(Vec::new()),
            members: RefCell::new(FxHashMap::default()),
            fields: RefCell::new(Vec::new()),
            owner_type: RefCell::new(None),
        })
    }

    #[must_use]
    pub fn owner_name(&self) -> &str {
        &self.owner_name
    }

    #[must_use]
    pub fn ancestor(&self) -> Option<Rc<TypeMemberStore>> {
        self.ancestor.borrow().clone()
    }

    #[must_use]
    pub fn binding_parent(&self) -> Option<Rc<TypeMemberStore>> {
        self.binding_parent.borrow().as_ref().and_then(Weak::upgrade)
    }

    #[must_use]
    pub fn binding_signature(&self) -> String {
        self.binding_signature.borrow().clone()
    }

    /// Looks up an already-bound child by signature, without constructing
    /// anything; used by `TypeSpec::bind` for idempotence.
    #[must_use]
    pub fn cached_binding(&self, signature: &str) -> Option<TypeSpec> {
        self.bound_types.borrow().get(signature).cloned()
    }

    pub fn cache_binding(&self, signature: impl Into<String>, bound: TypeSpec) {
        self.bound_types.borrow_mut().insert(signature.into(), bound);
    }

    /// Registers `child` as the bound-child store for `signature`, wiring
    /// up `child`'s `binding_parent` back-reference. `self_rc` must be the
    /// `Rc` handle to `self` (Rust cannot derive `Rc<Self>` from `&self`
    /// alone, unlike the C++ source's `shared_from_this`-free raw-pointer
    /// `binding_parent_`).
    pub fn add_binding(
        self_rc: &Rc<TypeMemberStore>,
        signature: impl Into<String>,
        child: Rc<TypeMemberStore>,
    ) {
        let signature = signature.into();
        *child.binding_signature.borrow_mut() = signature.clone();
        *child.binding_parent.borrow_mut() = Some(Rc::downgrade(self_rc));
        self_rc
            .bound_children
            .borrow_mut()
            .insert(signature, child);
    }

    #[must_use]
    pub fn bound_children(&self) -> Vec<Rc<TypeMemberStore>> {
        self.bound_children.borrow().values().cloned().collect()
    }

    pub fn set_fields(&self, fields: Vec<Field>) {
        *self.fields.borrow_mut() = fields;
    }

    #[must_use]
    pub fn fields(&self) -> Vec<Field> {
        self.fields.borrow().clone()
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<Field> {
        self.fields.borrow().iter().find(|f| f.name() == name).cloned()
    }

    pub fn add_member(&self, object: Rc<dyn NamedObject>) -> NudlResult<()> {
        let name = object.name().to_string();
        let mut members = self.members.borrow_mut();
        if members.contains_key(&name) {
            return Err(NudlError::already_exists(format!(
                "Member `{name}` already defined on `{}`",
                self.owner_name
            )));
        }
        members.insert(name.clone(), object);
        self.order.borrow_mut().push(name);
        Ok(())
    }

    #[must_use]
    pub fn get_member_here(&self, name: &str) -> Option<Rc<dyn NamedObject>> {
        self.members.borrow().get(name).cloned()
    }

    /// Walks the binding order spec §3: self → bound children whose type
    /// is an ancestor of `queried_type` → binding parent → ancestor,
    /// bounded by [`nudl_common::limits::MAX_BINDING_ORDER_DEPTH`].
    #[must_use]
    pub fn find_member(
        self_rc: &Rc<TypeMemberStore>,
        name: &str,
        queried_type: Option<&TypeSpec>,
    ) -> NudlResult<Option<Rc<dyn NamedObject>>> {
        let mut depth = 0u32;
        let mut frontier: Vec<Rc<TypeMemberStore>> = vec![Rc::clone(self_rc)];
        let mut visited: Vec<*const TypeMemberStore> = Vec::new();
        while let Some(store) = frontier.pop() {
            let ptr = Rc::as_ptr(&store);
            if visited.contains(&ptr) {
                continue;
            }
            visited.push(ptr);
            depth += 1;
            if depth > nudl_common::limits::MAX_BINDING_ORDER_DEPTH {
                return Err(NudlError::internal(
                    "Member store binding graph walk exceeded maximum depth",
                ));
            }
            if let Some(found) = store.get_member_here(name) {
                return Ok(Some(found));
            }
            if let Some(queried) = queried_type {
                for child in store.bound_children() {
                    // Only descend into a bound child whose own type is an
                    // ancestor of the type we're resolving members for —
                    // e.g. looking up a member on `Array<Int8>` may find it
                    // registered on the `Array<Int>` bound child if `Int`
                    // is an ancestor of `Int8`.
                    if child
                        .owner_type_hint()
                        .map(|owner| owner.is_ancestor_of(queried))
                        .unwrap_or(false)
                    {
                        frontier.push(child);
                    }
                }
            }
            if let Some(parent) = store.binding_parent() {
                frontier.push(parent);
            } else if let Some(ancestor) = store.ancestor() {
                frontier.push(ancestor);
            }
        }
        Ok(None)
    }

    /// A cached hint of which `TypeSpec` this store describes, set when a
    /// bound child is created via [`Self::add_binding`] from
    /// `TypeSpec::bind`. Not part of the C++ source's member store
    /// directly (it keeps a raw `TypeSpec*`); we resolve the cycle with a
    /// weak owner hint instead of a strong back-pointer.
    #[must_use]
    pub fn owner_type_hint(&self) -> Option<TypeSpec> {
        self.owner_type.borrow().clone()
    }

    pub fn set_owner_type_hint(&self, owner: TypeSpec) {
        *self.owner_type.borrow_mut() = Some(owner);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn fields_round_trip() {
        let store = TypeMemberStore::new("Point", None);
        store.set_fields(vec![]);
        assert!(store.fields().is_empty());
    }

    #[test]
    fn member_already_exists_is_rejected() {
        struct Dummy(String, Rc<ScopeName>);
        impl NamedObject for Dummy {
            fn object_kind(&self) -> ObjectKind {
                ObjectKind::Field
            }
            fn name(&self) -> &str {
                &self.0
            }
            fn scope_name(&self) -> Rc<ScopeName> {
                Rc::clone(&self.1)
            }
        }
        let store = TypeMemberStore::new("S", None);
        let scope = Rc::new(ScopeName::empty());
        let obj: Rc<dyn NamedObject> = Rc::new(Dummy("x".to_string(), Rc::clone(&scope)));
        store.add_member(Rc::clone(&obj)).unwrap();
        let err = store.add_member(obj).unwrap_err();
        assert_eq!(err.kind(), nudl_common::ErrorKind::AlreadyExists);
    }
}
