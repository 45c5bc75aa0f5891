//! A compilation unit: a [`Scope`] plus its top-level expressions in
//! declaration order, with import/dependency bookkeeping.
//!
//! Grounded on `Module` in `nudl/analysis/scope.{h,cc}` (spec §3 "Module /
//! Scope", §4.8): a module hosts types, variables, and functions through its
//! `Scope`, additionally owning the ordered list of top-level expressions
//! that make it up and a dependency set used to order emission. Like
//! [`Scope`] itself, `Module` does not implement `NamedObject` — nothing
//! looks a module up *by name* the way it looks up a variable or a type;
//! callers hold an `Rc<Module>` directly or resolve one through its
//! `ScopeName`.
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

use rustc_hash::FxHashSet;

use nudl_common::NudlResult;
use nudl_types::named_object::{NameStore, NamedObject};
use nudl_types::type_store::TypeExprRef;
use nudl_types::{GlobalTypeStore, ScopeName, TypeSpec};

use crate::scope::Scope;
use crate::var_base::TypedExpr;

/// A module's top-level content: its own [`Scope`] plus the expressions
/// that make it up, in declaration order.
pub struct Module {
    scope: Rc<Scope>,
    top_level: RefCell<Vec<Rc<dyn TypedExpr>>>,
    /// Scope names of modules this one imports, used to order emission.
    dependencies: RefCell<FxHashSet<String>>,
    parse_time: Cell<Option<Duration>>,
    analysis_time: Cell<Option<Duration>>,
}

impl Module {
    #[must_use]
    pub fn new(
        scope_name: Rc<ScopeName>,
        parent_store: Option<Weak<dyn NameStore>>,
        type_store: Rc<GlobalTypeStore>,
    ) -> Rc<Self> {
        Rc::new(Self {
            scope: Scope::new(scope_name, parent_store, type_store),
            top_level: RefCell::new(Vec::new()),
            dependencies: RefCell::new(FxHashSet::default()),
            parse_time: Cell::new(None),
            analysis_time: Cell::new(None),
        })
    }

    /// The global singleton built-in module (spec §3): an empty-scoped
    /// module wrapping the base type lattice, with no top-level
    /// expressions of its own.
    #[must_use]
    pub fn builtin(type_store: Rc<GlobalTypeStore>) -> Rc<Self> {
        Self::new(Rc::new(ScopeName::empty()), None, type_store)
    }

    #[must_use]
    pub fn scope(&self) -> &Rc<Scope> {
        &self.scope
    }

    pub fn declare_type(&self, spec: TypeSpec) -> NudlResult<TypeSpec> {
        self.scope.declare_type(spec)
    }

    pub fn find_type(&self, expr: &TypeExprRef) -> NudlResult<TypeSpec> {
        self.scope.find_type(expr)
    }

    /// Appends `expr` to the module's top-level expression list, in
    /// declaration order (spec §5 "module expressions are analyzed in
    /// source order").
    pub fn push_top_level(&self, expr: Rc<dyn TypedExpr>) {
        self.top_level.borrow_mut().push(expr);
    }

    #[must_use]
    pub fn top_level(&self) -> Vec<Rc<dyn TypedExpr>> {
        self.top_level.borrow().clone()
    }

    /// Registers `target` as an import under `alias`, both for name
    /// resolution (delegated to the underlying `Scope`) and for the
    /// module's own dependency set.
    pub fn add_import(&self, alias: &str, target: &Rc<Module>) -> NudlResult<()> {
        self.scope.add_import(alias, Rc::clone(&target.scope))?;
        self.dependencies
            .borrow_mut()
            .insert(target.scope.scope_name().name().to_string());
        Ok(())
    }

    /// Scope names of every module imported so far, sorted for stable
    /// emission ordering.
    #[must_use]
    pub fn dependencies(&self) -> Vec<String> {
        let mut deps: Vec<String> = self.dependencies.borrow().iter().cloned().collect();
        deps.sort();
        deps
    }

    pub fn set_parse_time(&self, duration: Duration) {
        self.parse_time.set(Some(duration));
    }

    #[must_use]
    pub fn parse_time(&self) -> Option<Duration> {
        self.parse_time.get()
    }

    pub fn set_analysis_time(&self, duration: Duration) {
        self.analysis_time.set(Some(duration));
    }

    #[must_use]
    pub fn analysis_time(&self) -> Option<Duration> {
        self.analysis_time.get()
    }
}

impl NameStore for Module {
    fn scope_name(&self) -> Rc<ScopeName> {
        NameStore::scope_name(self.scope.as_ref())
    }

    fn parent_store(&self) -> Option<Rc<dyn NameStore>> {
        self.scope.parent_store()
    }

    fn add_name(&self, object: Rc<dyn NamedObject>) -> NudlResult<()> {
        self.scope.add_name(object)
    }

    fn get_name(&self, local_name: &str) -> Option<Rc<dyn NamedObject>> {
        self.scope.get_name(local_name)
    }

    fn names(&self) -> Vec<Rc<dyn NamedObject>> {
        self.scope.names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nudl_types::named_object::ObjectKind;
    use std::time::Duration;

    struct Lit(TypeSpec);
    impl TypedExpr for Lit {
        fn result_type(&self) -> TypeSpec {
            self.0.clone()
        }
    }

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
    fn builtin_module_has_the_empty_scope_name() {
        let types = GlobalTypeStore::new();
        let builtin = Module::builtin(types);
        assert!(NameStore::scope_name(builtin.as_ref()).is_empty());
        assert!(builtin.top_level().is_empty());
    }

    #[test]
    fn push_top_level_preserves_declaration_order() {
        let types = GlobalTypeStore::new();
        let scope_name = Rc::new(ScopeName::parse("pkg").unwrap());
        let module = Module::new(scope_name, None, types);
        let int = TypeSpec::builtin_base(nudl_types::TypeId::Int);
        let string = TypeSpec::builtin_base(nudl_types::TypeId::String);
        module.push_top_level(Rc::new(Lit(int.clone())));
        module.push_top_level(Rc::new(Lit(string.clone())));
        let top = module.top_level();
        assert!(top[0].result_type().is_equal(&int));
        assert!(top[1].result_type().is_equal(&string));
    }

    #[test]
    fn add_import_records_a_dependency_and_an_alias() {
        let types = GlobalTypeStore::new();
        let lib_name = Rc::new(ScopeName::parse("pkg.lib").unwrap());
        let lib = Module::new(lib_name, None, Rc::clone(&types));
        let widget = TypeSpec::declare_struct(lib.scope().type_store().allocator(), "Widget", Vec::new());
        lib.declare_type(widget).unwrap();

        let main_name = Rc::new(ScopeName::parse("pkg.main").unwrap());
        let main = Module::new(main_name, None, types);
        main.add_import("l", &lib).unwrap();
        assert_eq!(main.dependencies(), vec!["pkg.lib".to_string()]);
        assert!(main.find_type(&TypeExprRef::simple("Widget")).is_err());
        assert!(main.scope().import("l").is_some());
    }

    #[test]
    fn add_name_and_find_name_delegate_to_the_underlying_scope() {
        let types = GlobalTypeStore::new();
        let outer_name = Rc::new(ScopeName::empty());
        let outer: Rc<dyn NameStore> = Module::new(Rc::clone(&outer_name), None, Rc::clone(&types));
        outer
            .add_name(Rc::new(Dummy("g".to_string(), Rc::clone(&outer_name))))
            .unwrap();

        let inner_name = Rc::new(ScopeName::parse("m").unwrap());
        let inner = Module::new(inner_name, Some(Rc::downgrade(&outer)), types);
        assert!(inner.get_name("g").is_none());
        assert!(inner.find_name("g").unwrap().is_some());
    }
}
