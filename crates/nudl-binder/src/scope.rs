//! A lexical scope: a `NameStore` for variables and functions, paired
//! with its own per-scope type registry and its import table.
//!
//! Grounded on `Scope` in `nudl/analysis/scope.{h,cc}`. Every module and
//! every function body is a `Scope`; nested scopes chain through
//! `parent_store` the same way `NameStore::find_name` already walks for
//! plain names, while type lookups are delegated to the shared
//! [`GlobalTypeStore`] keyed by this scope's [`ScopeName`].

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use rustc_hash::FxHashMap;

use nudl_common::{NudlError, NudlResult};
use nudl_types::named_object::{NameStore, NamedObject};
use nudl_types::names::NameUtil;
use nudl_types::type_store::TypeExprRef;
use nudl_types::{GlobalTypeStore, ScopeName, TypeSpec};

/// A variable/function scope with its own type registry and imports.
pub struct Scope {
    scope_name: Rc<ScopeName>,
    parent_store: Option<Weak<dyn NameStore>>,
    order: RefCell<Vec<String>>,
    entries: RefCell<FxHashMap<String, Rc<dyn NamedObject>>>,
    /// `import foo as bar` registers `bar -> foo`'s scope here; `import foo`
    /// (no alias) registers it under foo's own full name.
    imports: RefCell<FxHashMap<String, Rc<Scope>>>,
    type_store: Rc<GlobalTypeStore>,
}

impl Scope {
    #[must_use]
    pub fn new(
        scope_name: Rc<ScopeName>,
        parent_store: Option<Weak<dyn NameStore>>,
        type_store: Rc<GlobalTypeStore>,
    ) -> Rc<Self> {
        Rc::new(Self {
            scope_name,
            parent_store,
            order: RefCell::new(Vec::new()),
            entries: RefCell::new(FxHashMap::default()),
            imports: RefCell::new(FxHashMap::default()),
            type_store,
        })
    }

    #[must_use]
    pub fn type_store(&self) -> &Rc<GlobalTypeStore> {
        &self.type_store
    }

    pub fn declare_type(&self, spec: TypeSpec) -> NudlResult<TypeSpec> {
        self.type_store.declare_type(&self.scope_name, spec)
    }

    pub fn find_type(&self, expr: &TypeExprRef) -> NudlResult<TypeSpec> {
        self.type_store.find_type(&self.scope_name, expr)
    }

    /// Registers `target` as a child store reachable under `alias` (the
    /// `as` clause of an import, or the imported module's own full name
    /// when no alias is given).
    pub fn add_import(&self, alias: &str, target: Rc<Scope>) -> NudlResult<()> {
        let alias = NameUtil::validated_name(alias)?;
        let mut imports = self.imports.borrow_mut();
        if imports.contains_key(&alias) {
            return Err(NudlError::already_exists(format!(
                "An import is already registered under `{alias}` in scope `{}`",
                self.scope_name.name()
            )));
        }
        self.type_store.add_alias(&target.scope_name, &self.scope_name.subname(&alias)?)?;
        imports.insert(alias, target);
        Ok(())
    }

    #[must_use]
    pub fn import(&self, alias: &str) -> Option<Rc<Scope>> {
        self.imports.borrow().get(alias).cloned()
    }

    #[must_use]
    pub fn imports(&self) -> Vec<(String, Rc<Scope>)> {
        self.imports
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), Rc::clone(v)))
            .collect()
    }
}

impl NameStore for Scope {
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

#[cfg(test)]
mod tests {
    use super::*;
    use nudl_types::named_object::ObjectKind;

    struct Dummy(String, Rc<ScopeName>);
    impl NamedObject for Dummy {
        fn object_kind(&self) -> ObjectKind {
            ObjectKind::Var
        }
        fn name(&self) -> &str {
            &self.0
        }
        fn scope_name(&self) -> Rc<ScopeName> {
            Rc::clone(&self.1)
        }
    }

    #[test]
    fn add_and_find_name_walks_to_parent_scope() {
        let types = GlobalTypeStore::new();
        let outer_name = Rc::new(ScopeName::empty());
        let outer: Rc<dyn NameStore> = Scope::new(Rc::clone(&outer_name), None, Rc::clone(&types));
        outer
            .add_name(Rc::new(Dummy("g".to_string(), Rc::clone(&outer_name))))
            .unwrap();

        let inner_name = Rc::new(ScopeName::parse("m").unwrap());
        let inner = Scope::new(inner_name, Some(Rc::downgrade(&outer)), types);
        assert!(inner.get_name("g").is_none());
        assert!(inner.find_name("g").unwrap().is_some());
    }

    #[test]
    fn declare_type_records_scope_and_is_visible_through_find_type() {
        let types = GlobalTypeStore::new();
        let scope_name = Rc::new(ScopeName::parse("pkg").unwrap());
        let scope = Scope::new(scope_name, None, types);
        let thing = TypeSpec::declare_struct(scope.type_store().allocator(), "Thing", Vec::new());
        scope.declare_type(thing).unwrap();
        assert!(scope.find_type(&TypeExprRef::simple("Thing")).is_ok());
    }

    #[test]
    fn add_import_registers_an_alias_and_rejects_a_duplicate() {
        let types = GlobalTypeStore::new();
        let real_name = Rc::new(ScopeName::parse("pkg.real").unwrap());
        let real = Scope::new(real_name, None, Rc::clone(&types));
        let widget = TypeSpec::declare_struct(real.type_store().allocator(), "Widget", Vec::new());
        real.declare_type(widget).unwrap();

        let importer_name = Rc::new(ScopeName::parse("pkg.main").unwrap());
        let importer = Scope::new(importer_name, None, types);
        importer.add_import("r", Rc::clone(&real)).unwrap();
        assert!(importer.import("r").is_some());

        let err = importer.add_import("r", real).unwrap_err();
        assert_eq!(err.kind(), nudl_common::ErrorKind::AlreadyExists);
    }
}
