//! Per-scope type registries, the global store, and built-in bootstrap.
//!
//! Grounded on `TypeStore`/`GlobalTypeStore` in `nudl/analysis/type_spec.{h,cc}`:
//! a [`GlobalTypeStore`] owns one `BaseTypesStore` pre-populated with the
//! built-in lattice, plus a map of named scope stores — one per module or
//! function scope that declares types of its own (spec §4.4).

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use nudl_common::{NudlError, NudlResult, ResultExt};

use crate::names::ScopeName;
use crate::type_spec::{BindArg, TypeSpec};
use crate::types::{TypeId, TypeIdAllocator};

/// The full set of built-in type ids the base store bootstraps, in the
/// order `nudl/analysis/types.cc` registers them (abstract ancestors
/// before the concrete leaves that specialize them).
const BUILTIN_IDS: &[TypeId] = &[
    TypeId::Any,
    TypeId::Null,
    TypeId::Numeric,
    TypeId::Integral,
    TypeId::Int,
    TypeId::Int8,
    TypeId::Int16,
    TypeId::Int32,
    TypeId::UInt,
    TypeId::UInt8,
    TypeId::UInt16,
    TypeId::UInt32,
    TypeId::Float64,
    TypeId::Float32,
    TypeId::Decimal,
    TypeId::String,
    TypeId::Bytes,
    TypeId::Bool,
    TypeId::Timestamp,
    TypeId::Date,
    TypeId::DateTime,
    TypeId::TimeInterval,
    TypeId::Iterable,
    TypeId::Container,
    TypeId::Array,
    TypeId::Set,
    TypeId::Map,
    TypeId::Generator,
    TypeId::Tuple,
    TypeId::Struct,
    TypeId::Function,
    TypeId::Union,
    TypeId::Nullable,
    TypeId::Dataset,
    TypeId::Type,
    TypeId::Module,
    TypeId::TupleJoin,
    TypeId::DatasetAggregate,
    TypeId::DatasetJoin,
];

/// An as-yet-unresolved type expression, the shape a parser hands to
/// [`GlobalTypeStore::find_type`] — a name plus its binding arguments, or
/// the defining use of a local type variable (spec §4.4's `{T: C}` case).
#[derive(Debug, Clone)]
pub enum TypeExprRef {
    Named {
        name: String,
        args: Vec<TypeExprRef>,
    },
    IntLiteral(i64),
    /// The defining use of a local type name, e.g. `T` in `{T: Numeric}`.
    LocalDef {
        local_name: String,
        constraint: Option<Box<TypeExprRef>>,
    },
    /// An argument slot carrying an explicit name, e.g. `name: T` inside a
    /// `tuple<...>` or `Function(...)` argument list.
    Slot {
        name: String,
        inner: Box<TypeExprRef>,
    },
}

impl TypeExprRef {
    #[must_use]
    pub fn named(name: impl Into<String>, args: Vec<TypeExprRef>) -> Self {
        Self::Named {
            name: name.into(),
            args,
        }
    }

    #[must_use]
    pub fn simple(name: impl Into<String>) -> Self {
        Self::named(name, Vec::new())
    }

    #[must_use]
    pub fn slot(name: impl Into<String>, inner: TypeExprRef) -> Self {
        Self::Slot {
            name: name.into(),
            inner: Box::new(inner),
        }
    }
}

/// The type registry for a single scope (a module, or a function that
/// declares local type variables of its own).
pub struct ScopeTypeStore {
    scope_name: Rc<ScopeName>,
    types: RefCell<FxHashMap<String, TypeSpec>>,
    order: RefCell<Vec<String>>,
    locals: RefCell<FxHashMap<String, TypeSpec>>,
}

impl ScopeTypeStore {
    fn new(scope_name: Rc<ScopeName>) -> Rc<Self> {
        Rc::new(Self {
            scope_name,
            types: RefCell::new(FxHashMap::default()),
            order: RefCell::new(Vec::new()),
            locals: RefCell::new(FxHashMap::default()),
        })
    }

    #[must_use]
    pub fn scope_name(&self) -> Rc<ScopeName> {
        Rc::clone(&self.scope_name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<TypeSpec> {
        self.types.borrow().get(name).cloned()
    }

    #[must_use]
    pub fn types(&self) -> Vec<TypeSpec> {
        let types = self.types.borrow();
        self.order
            .borrow()
            .iter()
            .filter_map(|name| types.get(name).cloned())
            .collect()
    }

    fn declare(&self, spec: TypeSpec) -> NudlResult<TypeSpec> {
        let name = spec.name().to_string();
        let mut types = self.types.borrow_mut();
        if types.contains_key(&name) {
            return Err(NudlError::already_exists(format!(
                "Type `{name}` is already declared in scope `{}`",
                self.scope_name.name()
            )));
        }
        spec.set_definition_scope(Rc::clone(&self.scope_name))?;
        types.insert(name.clone(), spec.clone());
        self.order.borrow_mut().push(name);
        Ok(spec)
    }

    fn declare_local(&self, local_name: &str, constraint: Option<TypeSpec>) -> NudlResult<TypeSpec> {
        let mut locals = self.locals.borrow_mut();
        if locals.contains_key(local_name) {
            return Err(NudlError::already_exists(format!(
                "Local type `{local_name}` is already declared in scope `{}`",
                self.scope_name.name()
            )));
        }
        let spec = TypeSpec::local_type_variable(local_name, constraint);
        locals.insert(local_name.to_string(), spec.clone());
        Ok(spec)
    }
}

type RegisterHook = Box<dyn Fn(&Rc<ScopeTypeStore>, &TypeSpec)>;

/// The process-wide (per-analysis-run) type registry: one `BaseTypesStore`
/// plus named scope stores, shared by every module under analysis.
///
/// Grounded on `GlobalTypeStore` in `type_spec.h`.
pub struct GlobalTypeStore {
    base: Rc<ScopeTypeStore>,
    scopes: RefCell<FxHashMap<String, Rc<ScopeTypeStore>>>,
    alloc: TypeIdAllocator,
    on_register: RefCell<Vec<RegisterHook>>,
}

impl GlobalTypeStore {
    #[must_use]
    pub fn new() -> Rc<Self> {
        let base = ScopeTypeStore::new(Rc::new(ScopeName::empty()));
        for &id in BUILTIN_IDS {
            let spec = TypeSpec::builtin_base(id);
            base.types.borrow_mut().insert(spec.name().to_string(), spec.clone());
            base.order.borrow_mut().push(spec.name().to_string());
        }
        Rc::new(Self {
            base,
            scopes: RefCell::new(FxHashMap::default()),
            alloc: TypeIdAllocator::new(),
            on_register: RefCell::new(Vec::new()),
        })
    }

    #[must_use]
    pub fn allocator(&self) -> &TypeIdAllocator {
        &self.alloc
    }

    #[must_use]
    pub fn base_store(&self) -> Rc<ScopeTypeStore> {
        Rc::clone(&self.base)
    }

    /// Registers a callback invoked after every successful [`Self::declare_type`],
    /// in any scope — the hook clients use to attach members to a freshly
    /// declared struct type.
    pub fn on_register(&self, callback: impl Fn(&Rc<ScopeTypeStore>, &TypeSpec) + 'static) {
        self.on_register.borrow_mut().push(Box::new(callback));
    }

    /// Creates (or returns, if it already exists) the scope store for
    /// `name`.
    pub fn add_scope(&self, scope_name: &ScopeName) -> Rc<ScopeTypeStore> {
        let mut scopes = self.scopes.borrow_mut();
        scopes
            .entry(scope_name.name().to_string())
            .or_insert_with(|| ScopeTypeStore::new(Rc::new(scope_name.clone())))
            .clone()
    }

    #[must_use]
    pub fn scope(&self, scope_name: &ScopeName) -> Option<Rc<ScopeTypeStore>> {
        self.scopes.borrow().get(scope_name.name()).cloned()
    }

    /// Makes `existing` additionally reachable under `alias`, so types
    /// declared via one name are visible via the other (e.g. a module's
    /// canonical name and an `import … as` alias).
    pub fn add_alias(&self, existing: &ScopeName, alias: &ScopeName) -> NudlResult<()> {
        let target = self.scope(existing).ok_or_else(|| {
            NudlError::not_found(format!("No scope store named `{}`", existing.name()))
        })?;
        self.scopes
            .borrow_mut()
            .insert(alias.name().to_string(), target);
        Ok(())
    }

    /// Registers `spec` under its own name in `scope_name`'s store,
    /// recording the definition scope on the type and firing the
    /// post-registration hooks.
    pub fn declare_type(&self, scope_name: &ScopeName, spec: TypeSpec) -> NudlResult<TypeSpec> {
        let store = self.add_scope(scope_name);
        let declared = store
            .declare(spec)
            .with_context(|| format!("declaring type in scope `{}`", scope_name.name()))?;
        for hook in self.on_register.borrow().iter() {
            hook(&store, &declared);
        }
        Ok(declared)
    }

    /// Resolves a parsed type expression against `lookup_scope`: local type
    /// definitions declare a fresh type variable; named references probe
    /// each prefix of `lookup_scope`, from longest to empty, then the base
    /// store, recursively resolving and binding any arguments (spec §4.4).
    pub fn find_type(&self, lookup_scope: &ScopeName, expr: &TypeExprRef) -> NudlResult<TypeSpec> {
        match expr {
            TypeExprRef::IntLiteral(_) => Err(NudlError::invalid_argument(
                "An integer literal is not a type",
            )),
            TypeExprRef::LocalDef {
                local_name,
                constraint,
            } => {
                let resolved_constraint = match constraint {
                    Some(c) => Some(self.find_type(lookup_scope, c)?),
                    None => None,
                };
                let store = self.add_scope(lookup_scope);
                store
                    .declare_local(local_name, resolved_constraint)
                    .with_context(|| format!("declaring local type `{local_name}`"))
            }
            TypeExprRef::Named { name, args } => {
                let base = self
                    .resolve_named(lookup_scope, name)
                    .with_context(|| format!("resolving type `{name}`"))?;
                if args.is_empty() {
                    return Ok(base);
                }
                let bind_args = self.resolve_bind_args(lookup_scope, args)?;
                base.bind(&bind_args, &self.alloc)
                    .with_context(|| format!("binding type `{name}`"))
            }
            TypeExprRef::Slot { name, .. } => Err(NudlError::invalid_argument(format!(
                "Named slot `{name}` cannot be resolved outside of an argument list"
            ))),
        }
    }

    fn resolve_bind_args(
        &self,
        lookup_scope: &ScopeName,
        args: &[TypeExprRef],
    ) -> NudlResult<Vec<BindArg>> {
        args.iter()
            .map(|arg| match arg {
                TypeExprRef::IntLiteral(n) => Ok(BindArg::Int(*n)),
                TypeExprRef::Slot { name, inner } => Ok(BindArg::Named(
                    name.clone(),
                    self.find_type(lookup_scope, inner)?,
                )),
                other => Ok(BindArg::Type(self.find_type(lookup_scope, other)?)),
            })
            .collect()
    }

    /// Walks from the longest prefix of `lookup_scope` down to the empty
    /// scope, probing each registered scope store for `name`, and falls
    /// back to the base store (where every built-in lives unqualified).
    fn resolve_named(&self, lookup_scope: &ScopeName, name: &str) -> NudlResult<TypeSpec> {
        let total = lookup_scope.size();
        for k in (0..=total).rev() {
            let prefix = lookup_scope.prefix(k);
            if let Some(store) = self.scope(&prefix) {
                if let Some(found) = store.get(name) {
                    return Ok(found);
                }
            }
            // Local type variables declared directly in the lookup scope
            // (not the base) are visible without qualification too.
            if k == total {
                if let Some(store) = self.scope(&prefix) {
                    if let Some(found) = store.locals.borrow().get(name).cloned() {
                        return Ok(found);
                    }
                }
            }
        }
        self.base
            .get(name)
            .ok_or_else(|| NudlError::not_found(format!("Unknown type `{name}`")))
    }
}

impl Default for GlobalTypeStore {
    fn default() -> Self {
        // `new()` returns an `Rc`; `Default` is only used by callers that
        // immediately wrap it themselves, so unwrap the single owner here.
        Rc::try_unwrap(Self::new())
            .unwrap_or_else(|_| unreachable!("freshly constructed store has one owner"))
    }
}
