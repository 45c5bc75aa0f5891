//! The shared identity and scoping protocol every analysis object
//! implements.
//!
//! Grounded on `nudl/analysis/named_object.h`: every declared thing (a
//! type, a function, a variable, a module) is a [`NamedObject`] living in
//! some enclosing [`NameStore`]. The traits live in this crate — the
//! lowest crate in the workspace — because `nudl-binder`'s `VarBase`/
//! `Scope` and `nudl-checker`'s `Function`/`FunctionGroup` both need to
//! implement them, and Rust's dependency graph only runs one way.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use nudl_common::{NudlError, NudlResult};

use crate::names::{NameUtil, ScopeName};

/// The closed set of things a [`NamedObject`] can be, mirrored from
/// `ObjectKind` in `named_object.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Module,
    Type,
    Function,
    FunctionGroup,
    Var,
    Field,
    Unknown,
}

impl ObjectKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Module => "module",
            ObjectKind::Type => "type",
            ObjectKind::Function => "function",
            ObjectKind::FunctionGroup => "function_group",
            ObjectKind::Var => "var",
            ObjectKind::Field => "field",
            ObjectKind::Unknown => "unknown",
        }
    }
}

/// Anything that has a simple name, a kind, and a position in the scope
/// tree.
pub trait NamedObject {
    fn object_kind(&self) -> ObjectKind;

    /// The simple, unqualified name (e.g. `bar` in `foo.bar`).
    fn name(&self) -> &str;

    /// The `ScopeName` this object lives directly under.
    fn scope_name(&self) -> Rc<ScopeName>;

    /// The fully qualified name, `scope_name().name() + "." + name()`
    /// (or just `name()` when the scope is empty).
    fn full_name(&self) -> String {
        let scope = self.scope_name();
        if scope.is_empty() {
            self.name().to_string()
        } else {
            format!("{}.{}", scope.name(), self.name())
        }
    }

    /// The store this object is registered in, if any. A `Weak` link so
    /// that store → object → store never keeps the store alive past its
    /// owner.
    fn parent_store(&self) -> Option<Weak<dyn NameStore>> {
        None
    }
}

/// A scope that can hold and resolve [`NamedObject`]s by local name,
/// optionally delegating to an enclosing store.
///
/// Grounded on `NameStore` in `named_object.h`: `AddName`/`GetName` are
/// the primitive insert/local-lookup operations; `FindName` walks up
/// `parent_store()` until it either finds a match or runs out of scope
/// (bounded by [`nudl_common::limits::MAX_SCOPE_WALK_DEPTH`]).
pub trait NameStore {
    fn scope_name(&self) -> Rc<ScopeName>;

    fn parent_store(&self) -> Option<Rc<dyn NameStore>>;

    /// Registers `object` under its own `name()`. Fails if the name is
    /// already taken in this store (shadowing an enclosing store's name
    /// is fine — only local collisions are rejected).
    fn add_name(&self, object: Rc<dyn NamedObject>) -> NudlResult<()>;

    /// Local, non-recursive lookup.
    fn get_name(&self, local_name: &str) -> Option<Rc<dyn NamedObject>>;

    /// All locally registered names, in insertion order.
    fn names(&self) -> Vec<Rc<dyn NamedObject>>;

    /// Recursive lookup: local store, then each `parent_store()` in
    /// turn, stopping at [`nudl_common::limits::MAX_SCOPE_WALK_DEPTH`]
    /// hops.
    fn find_name(&self, local_name: &str) -> NudlResult<Option<Rc<dyn NamedObject>>> {
        let local_name = NameUtil::normalize_local_name(local_name);
        let mut current: Option<Rc<dyn NameStore>> = None;
        let mut hops: u32 = 0;
        if let Some(found) = self.get_name(local_name) {
            return Ok(Some(found));
        }
        current = self.parent_store();
        while let Some(store) = current {
            hops += 1;
            if hops > nudl_common::limits::MAX_SCOPE_WALK_DEPTH {
                return Err(NudlError::internal(format!(
                    "Scope walk exceeded maximum depth resolving `{local_name}`"
                )));
            }
            if let Some(found) = store.get_name(local_name) {
                return Ok(Some(found));
            }
            current = store.parent_store();
        }
        Ok(None)
    }
}

/// A straightforward, insertion-ordered [`NameStore`] backed by a hash
/// map, the default implementation used by modules, function scopes, and
/// member stores alike.
///
/// Grounded on `BaseNameStore` in `named_object.h`.
pub struct BaseNameStore {
    scope_name: Rc<ScopeName>,
    parent_store: Option<Weak<dyn NameStore>>,
    order: RefCell<Vec<String>>,
    entries: RefCell<FxHashMap<String, Rc<dyn NamedObject>>>,
}

impl BaseNameStore {
    #[must_use]
    pub fn new(scope_name: Rc<ScopeName>, parent_store: Option<Weak<dyn NameStore>>) -> Self {
        Self {
            scope_name,
            parent_store,
            order: RefCell::new(Vec::new()),
            entries: RefCell::new(FxHashMap::default()),
        }
    }
}

impl NameStore for BaseNameStore {
    fn scope_name(&self) -> Rc<ScopeName> {
        Rc::clone(&self.scope_name)
    }

    fn parent_store(&self) -> Option<Rc<dyn NameStore>> {
        self.parent_store.as_ref().and_then(Weak::upgrade)
    }

    fn add_name(&self, object: Rc<dyn NamedObject>) -> NudlResult<()> {
        let local_name = NameUtil::normalize_local_name(object.name()).to_string();
        let mut entries = self.entries.borrow_mut();
        if entries.contains_key(&local_name) {
            return Err(NudlError::already_exists(format!(
                "Name `{local_name}` is already defined in scope `{}`",
                self.scope_name.name()
            )));
        }
        entries.insert(local_name.clone(), object);
        self.order.borrow_mut().push(local_name);
        Ok(())
    }

    fn get_name(&self, local_name: &str) -> Option<Rc<dyn NamedObject>> {
        let local_name = NameUtil::normalize_local_name(local_name);
        self.entries.borrow().get(local_name).cloned()
    }

    fn names(&self) -> Vec<Rc<dyn NamedObject>> {
        let entries = self.entries.borrow();
        self.order
            .borrow()
            .iter()
            .filter_map(|name| entries.get(name).cloned())
            .collect()
    }
}

/// A [`NameStore`] that delegates every lookup to an inner store but
/// presents its own `scope_name` — used where a type's member store
/// needs to resolve names relative to the owning type's scope while
/// still sharing the member table with a binding ancestor.
///
/// Grounded on `WrappedNameStore` in `named_object.h`.
pub struct WrappedNameStore {
    scope_name: Rc<ScopeName>,
    inner: Rc<dyn NameStore>,
}

impl WrappedNameStore {
    #[must_use]
    pub fn new(scope_name: Rc<ScopeName>, inner: Rc<dyn NameStore>) -> Self {
        Self { scope_name, inner }
    }
}

impl NameStore for WrappedNameStore {
    fn scope_name(&self) -> Rc<ScopeName> {
        Rc::clone(&self.scope_name)
    }

    fn parent_store(&self) -> Option<Rc<dyn NameStore>> {
        self.inner.parent_store()
    }

    fn add_name(&self, object: Rc<dyn NamedObject>) -> NudlResult<()> {
        self.inner.add_name(object)
    }

    fn get_name(&self, local_name: &str) -> Option<Rc<dyn NamedObject>> {
        self.inner.get_name(local_name)
    }

    fn names(&self) -> Vec<Rc<dyn NamedObject>> {
        self.inner.names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy {
        name: String,
        scope_name: Rc<ScopeName>,
    }

    impl NamedObject for Dummy {
        fn object_kind(&self) -> ObjectKind {
            ObjectKind::Var
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn scope_name(&self) -> Rc<ScopeName> {
            Rc::clone(&self.scope_name)
        }
    }

    fn dummy(name: &str, scope: &Rc<ScopeName>) -> Rc<dyn NamedObject> {
        Rc::new(Dummy {
            name: name.to_string(),
            scope_name: Rc::clone(scope),
        })
    }

    #[test]
    fn add_and_get_round_trips() {
        let scope = Rc::new(ScopeName::empty());
        let store = BaseNameStore::new(Rc::clone(&scope), None);
        store.add_name(dummy("x", &scope)).unwrap();
        assert!(store.get_name("x").is_some());
        assert!(store.get_name("y").is_none());
    }

    #[test]
    fn duplicate_local_name_is_rejected() {
        let scope = Rc::new(ScopeName::empty());
        let store = BaseNameStore::new(Rc::clone(&scope), None);
        store.add_name(dummy("x", &scope)).unwrap();
        let err = store.add_name(dummy("x", &scope)).unwrap_err();
        assert_eq!(err.kind(), nudl_common::ErrorKind::AlreadyExists);
    }

    #[test]
    fn find_name_walks_up_parent_store() {
        let outer_scope = Rc::new(ScopeName::empty());
        let outer: Rc<dyn NameStore> = Rc::new(BaseNameStore::new(Rc::clone(&outer_scope), None));
        outer.add_name(dummy("x", &outer_scope)).unwrap();

        let inner_scope = Rc::new(ScopeName::parse("inner").unwrap());
        let inner = BaseNameStore::new(Rc::clone(&inner_scope), Some(Rc::downgrade(&outer)));

        assert!(inner.get_name("x").is_none());
        assert!(inner.find_name("x").unwrap().is_some());
        assert!(inner.find_name("missing").unwrap().is_none());
    }

    #[test]
    fn wrapped_store_delegates_but_keeps_own_scope_name() {
        let outer_scope = Rc::new(ScopeName::empty());
        let outer: Rc<dyn NameStore> = Rc::new(BaseNameStore::new(Rc::clone(&outer_scope), None));
        outer.add_name(dummy("x", &outer_scope)).unwrap();

        let wrapped_scope = Rc::new(ScopeName::parse("wrapped").unwrap());
        let wrapped = WrappedNameStore::new(Rc::clone(&wrapped_scope), Rc::clone(&outer));

        assert_eq!(wrapped.scope_name().name(), "wrapped");
        assert!(wrapped.get_name("x").is_some());
    }

    #[test]
    fn normalize_strips_leading_colon_colon() {
        assert_eq!(NameUtil::normalize_local_name("::x"), "x");
        assert_eq!(NameUtil::normalize_local_name("x"), "x");
    }
}
