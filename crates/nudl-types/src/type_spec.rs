//! The central entity of the analyzer: the parametric type lattice.
//!
//! Grounded on `nudl/analysis/type_spec.{h,cc}` and `types.{h,cc}`: a
//! [`TypeSpec`] is a type-id, a display name, an optional ancestor, an
//! ordered list of parameters, and the handful of relations (`IsAncestorOf`,
//! `IsEqual`, `IsConvertibleFrom`) and operations (`Bind`, `Build`) that make
//! the lattice extensible — abstract types like `Numeric` or `Iterable`
//! coexist with concrete leaves, and a handful of "generator" types
//! (`TupleJoin`, `DatasetAggregate`, `DatasetJoin`) synthesize brand-new
//! struct types on `Bind` (spec §4.3).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use nudl_common::{NudlError, NudlResult, ResultExt};

use crate::names::ScopeName;
use crate::type_member_store::{Field, TypeMemberStore};
use crate::types::{TypeId, TypeIdAllocator};

/// An argument to `Bind`/`Build`: a type, a bare integer (used for
/// `Decimal<precision, scale>`), or a named type (used for `Tuple<name:
/// T>` and `Function(name: T, ...)` slots). Mirrors `TypeBindingArg` in
/// `type_spec.h`.
#[derive(Debug, Clone)]
pub enum BindArg {
    Type(TypeSpec),
    Int(i64),
    Named(String, TypeSpec),
}

impl BindArg {
    #[must_use]
    pub fn as_type(&self) -> Option<&TypeSpec> {
        match self {
            BindArg::Type(t) | BindArg::Named(_, t) => Some(t),
            BindArg::Int(_) => None,
        }
    }

    #[must_use]
    pub fn slot_name(&self) -> Option<&str> {
        match self {
            BindArg::Named(name, _) => Some(name),
            _ => None,
        }
    }

    #[must_use]
    fn signature_component(&self) -> String {
        match self {
            BindArg::Type(t) | BindArg::Named(_, t) => t.type_signature(),
            BindArg::Int(n) => format!("_i_{n}"),
        }
    }
}

struct TypeSpecData {
    type_id: TypeId,
    name: String,
    parameters: Vec<TypeSpec>,
    /// Per-slot names, parallel to `parameters`, for `Tuple<name: T, ...>`
    /// and `Function(name: T, ...)` argument slots. Empty when unnamed.
    slot_names: Vec<Option<String>>,
    bound: bool,
    ancestor: Option<TypeSpec>,
    original_bind: Option<TypeSpec>,
    int_args: Vec<i64>,
    local_name: RefCell<Option<String>>,
    definition_scope: RefCell<Option<Rc<ScopeName>>>,
    member_store: RefCell<Option<Rc<TypeMemberStore>>>,
}

/// The central type-lattice entity (spec §3 "TypeSpec").
///
/// Cheap to `Clone` (an `Rc` bump); `Bind`/`Build` produce a logically new
/// `TypeSpec` value rather than mutating in place, matching the source's
/// `Clone()`-then-substitute pattern.
#[derive(Clone)]
pub struct TypeSpec(Rc<TypeSpecData>);

impl TypeSpec {
    fn new(
        type_id: TypeId,
        name: impl Into<String>,
        parameters: Vec<TypeSpec>,
        bound: bool,
        ancestor: Option<TypeSpec>,
    ) -> Self {
        let member_store = TypeMemberStore::new(name.into(), None);
        let name_str = member_store.owner_name().to_string();
        Self(Rc::new(TypeSpecData {
            type_id,
            name: name_str,
            parameters,
            slot_names: Vec::new(),
            bound,
            ancestor,
            original_bind: None,
            int_args: Vec::new(),
            local_name: RefCell::new(None),
            definition_scope: RefCell::new(None),
            member_store: RefCell::new(Some(member_store)),
        }))
    }

    fn with_slot_names(mut self, slot_names: Vec<Option<String>>) -> Self {
        let data = Rc::get_mut(&mut self.0).expect("fresh TypeSpec has one owner");
        data.slot_names = slot_names;
        self
    }

    fn with_original_bind(mut self, generator: TypeSpec) -> Self {
        let data = Rc::get_mut(&mut self.0).expect("fresh TypeSpec has one owner");
        data.original_bind = Some(generator);
        self
    }

    fn with_int_args(mut self, int_args: Vec<i64>) -> Self {
        let data = Rc::get_mut(&mut self.0).expect("fresh TypeSpec has one owner");
        data.int_args = int_args;
        self
    }

    // ---- bootstrap constructors for the built-in hierarchy ----

    /// Builds the abstract/base instance of a built-in type, with no bound
    /// parameters — the object `BaseTypesStore` registers for each entry of
    /// the hierarchy table in spec §4.3.
    #[must_use]
    pub fn builtin_base(type_id: TypeId) -> Self {
        let (name, bound) = builtin_name_and_boundedness(type_id);
        Self::new(type_id, name, Vec::new(), bound, None)
    }

    /// Constructs a parametric instance directly (used internally by
    /// `ancestor()`/`Bind` once parameters are already resolved).
    fn parametric(type_id: TypeId, parameters: Vec<TypeSpec>) -> Self {
        let (name, bound) = builtin_name_and_boundedness(type_id);
        Self::new(type_id, name, parameters, bound, None)
    }

    #[must_use]
    pub fn any() -> Self {
        Self::builtin_base(TypeId::Any)
    }

    #[must_use]
    pub fn null() -> Self {
        Self::builtin_base(TypeId::Null)
    }

    /// Declares a fresh local type variable (e.g. the defining use of `T`
    /// in `{T: Numeric}`): unbound, with the given constraint as its
    /// ancestor (defaults to `Any`).
    #[must_use]
    pub fn local_type_variable(local_name: impl Into<String>, constraint: Option<TypeSpec>) -> Self {
        let constraint = constraint.unwrap_or_else(TypeSpec::any);
        let name = constraint.name().to_string();
        let spec = Self::new(TypeId::Any, name, Vec::new(), false, Some(constraint));
        spec.set_local_name(local_name);
        spec
    }

    /// Allocates a fresh, nominal struct type with the given fields; used
    /// both for user-declared structs and for the types synthesized by
    /// `DatasetAggregate`/`DatasetJoin`.
    #[must_use]
    pub fn declare_struct(
        alloc: &TypeIdAllocator,
        name: impl Into<String>,
        fields: Vec<Field>,
    ) -> Self {
        let type_id = alloc.allocate();
        let spec = Self::new(type_id, name, Vec::new(), true, Some(Self::builtin_base(TypeId::Struct)));
        if let Some(store) = spec.member_store() {
            store.set_fields(fields);
        }
        spec
    }

    // ---- accessors ----

    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.0.type_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[must_use]
    pub fn parameters(&self) -> &[TypeSpec] {
        &self.0.parameters
    }

    #[must_use]
    pub fn slot_name(&self, index: usize) -> Option<&str> {
        self.0.slot_names.get(index).and_then(|n| n.as_deref())
    }

    #[must_use]
    pub fn int_args(&self) -> &[i64] {
        &self.0.int_args
    }

    #[must_use]
    pub fn is_bound_type(&self) -> bool {
        self.0.bound
    }

    #[must_use]
    pub fn original_bind(&self) -> Option<TypeSpec> {
        self.0.original_bind.clone()
    }

    #[must_use]
    pub fn local_name(&self) -> Option<String> {
        self.0.local_name.borrow().clone()
    }

    /// Sets the type's local name (e.g. the `T` in `{T: Numeric}`). Set
    /// once at definition; later calls are ignored — mirroring the
    /// source's "settable once" fields without surfacing plumbing errors
    /// for what is, in practice, an internal-only call site.
    pub fn set_local_name(&self, local_name: impl Into<String>) {
        let mut slot = self.0.local_name.borrow_mut();
        if slot.is_none() {
            *slot = Some(local_name.into());
        }
    }

    #[must_use]
    pub fn definition_scope(&self) -> Option<Rc<ScopeName>> {
        self.0.definition_scope.borrow().clone()
    }

    pub fn set_definition_scope(&self, scope: Rc<ScopeName>) -> NudlResult<()> {
        let mut slot = self.0.definition_scope.borrow_mut();
        if slot.is_some() {
            return Err(NudlError::failed_precondition(format!(
                "Definition scope already set for type `{}`",
                self.full_name()
            )));
        }
        *slot = Some(scope);
        Ok(())
    }

    #[must_use]
    pub fn member_store(&self) -> Option<Rc<TypeMemberStore>> {
        self.0.member_store.borrow().clone()
    }

    /// The declared ancestor, if this type carries one directly (structs,
    /// local type variables). For the rest of the built-in hierarchy the
    /// ancestor is computed on demand by [`Self::ancestor`].
    fn declared_ancestor(&self) -> Option<TypeSpec> {
        self.0.ancestor.clone()
    }

    /// The direct ancestor `TypeSpec` of this instance — spec §3's
    /// "ancestor" attribute, reconstructed with parameters substituted so
    /// that the `IsAncestorOf` walk can compare at every level
    /// (`Array<Int8>.ancestor() == Container<Int8>`, not `Container<Any>`).
    #[must_use]
    pub fn ancestor(&self) -> Option<TypeSpec> {
        if let Some(explicit) = self.declared_ancestor() {
            return Some(explicit);
        }
        let ancestor_id = self.type_id().builtin_ancestor()?;
        if self.type_id().is_iterable_family() && ancestor_id.is_iterable_family() {
            let carried = self.result_type()?;
            return Some(Self::parametric(ancestor_id, vec![carried]));
        }
        if ancestor_id == TypeId::Any {
            return Some(Self::any());
        }
        Some(Self::builtin_base(ancestor_id))
    }

    /// The element type produced by iteration (iterables), the return type
    /// (functions), or the wrapped type (nullable/dataset). `None` if this
    /// type doesn't have one.
    #[must_use]
    pub fn result_type(&self) -> Option<TypeSpec> {
        match self.type_id() {
            TypeId::Array | TypeId::Set | TypeId::Iterable | TypeId::Container
            | TypeId::Generator | TypeId::Dataset | TypeId::Nullable => {
                self.parameters().first().cloned()
            }
            TypeId::Map => self.parameters().get(1).cloned(),
            TypeId::Function => self.parameters().last().cloned(),
            _ => None,
        }
    }

    /// The type accepted by the `[]` index operator, if any.
    #[must_use]
    pub fn index_type(&self) -> Option<TypeSpec> {
        match self.type_id() {
            TypeId::Array => Some(Self::builtin_base(TypeId::Int)),
            TypeId::Set => Some(Self::builtin_base(TypeId::Bool)),
            TypeId::Map => self.parameters().first().cloned(),
            _ => None,
        }
    }

    /// The type returned by the `[]` index operator, if any.
    #[must_use]
    pub fn indexed_type(&self) -> Option<TypeSpec> {
        match self.type_id() {
            TypeId::Array => self.parameters().first().cloned(),
            TypeId::Set => Some(Self::builtin_base(TypeId::Bool)),
            TypeId::Map => self.parameters().get(1).cloned(),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_iterable(&self) -> bool {
        self.type_id().is_iterable_family() || self.type_id() == TypeId::Dataset
    }

    /// Is this type, and every one of its parameters, bound? Spec §3; the
    /// `Function` case has its own rule (spec §0.2): bound iff it has a
    /// result type, every argument is bound, and the result is bound *or*
    /// is itself a function type.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        if self.type_id() == TypeId::Function {
            let Some(result) = self.result_type() else {
                return false;
            };
            let args = &self.parameters()[..self.parameters().len().saturating_sub(1)];
            let args_bound = args.iter().all(TypeSpec::is_bound);
            return args_bound && (result.is_bound() || result.type_id() == TypeId::Function);
        }
        self.is_bound_type() && self.parameters().iter().all(TypeSpec::is_bound)
    }

    // ---- relations ----

    #[must_use]
    pub fn is_equal(&self, other: &TypeSpec) -> bool {
        self.type_id() == other.type_id()
            && self.parameters().len() == other.parameters().len()
            && self
                .parameters()
                .iter()
                .zip(other.parameters())
                .all(|(a, b)| a.is_equal(b))
    }

    #[must_use]
    pub fn is_ancestor_of(&self, other: &TypeSpec) -> bool {
        match self.type_id() {
            TypeId::Union if other.type_id() != TypeId::Union => {
                return self.parameters().iter().any(|p| p.is_ancestor_of(other));
            }
            TypeId::Nullable if other.type_id() != TypeId::Nullable => {
                if other.type_id() == TypeId::Null {
                    return true;
                }
                return self
                    .result_type()
                    .is_some_and(|inner| inner.is_ancestor_of(other));
            }
            id if id.is_generator_marker() => {
                if let Some(origin) = other.original_bind() {
                    if origin.type_id() == id {
                        return true;
                    }
                }
            }
            _ => {}
        }
        self.structural_ancestor_walk(other)
    }

    fn structural_ancestor_walk(&self, other: &TypeSpec) -> bool {
        let mut current = Some(other.clone());
        let mut hops = 0u32;
        while let Some(candidate) = current {
            if self.type_id() == candidate.type_id() {
                return self.has_ancestor_parameters(&candidate);
            }
            hops += 1;
            if hops > nudl_common::limits::MAX_BINDING_ORDER_DEPTH {
                return false;
            }
            current = candidate.ancestor();
        }
        false
    }

    fn has_ancestor_parameters(&self, other: &TypeSpec) -> bool {
        if self.parameters().is_empty() {
            return true;
        }
        if self.parameters().len() != other.parameters().len() {
            if self.parameters().len() == 1 && self.is_iterable() && other.is_iterable() {
                return other
                    .result_type()
                    .is_some_and(|rt| self.parameters()[0].is_ancestor_of(&rt));
            }
            return false;
        }
        self.parameters()
            .iter()
            .zip(other.parameters())
            .all(|(a, b)| a.is_ancestor_of(b))
    }

    #[must_use]
    pub fn is_convertible_from(&self, other: &TypeSpec) -> bool {
        match self.type_id() {
            TypeId::Union if other.type_id() != TypeId::Union => {
                return self
                    .parameters()
                    .iter()
                    .any(|p| p.is_convertible_from(other));
            }
            TypeId::Nullable if other.type_id() != TypeId::Nullable => {
                if other.type_id() == TypeId::Null {
                    return true;
                }
                return self
                    .result_type()
                    .is_some_and(|inner| inner.is_convertible_from(other));
            }
            id if id.is_generator_marker() => {
                if let Some(origin) = other.original_bind() {
                    if origin.type_id() == id {
                        return true;
                    }
                }
            }
            _ => {}
        }
        if self.is_ancestor_of(other) {
            return true;
        }
        // Unbound parameters recursively require ancestry only; bound ones
        // must be exactly ancestor-related as checked above, so the only
        // remaining gap is when `self` itself isn't fully bound yet (e.g.
        // during overload resolution before unification has run).
        if !self.is_bound() && self.type_id() == other.type_id() {
            return self
                .parameters()
                .iter()
                .zip(other.parameters())
                .all(|(a, b)| !a.is_bound() || a.is_convertible_from(b));
        }
        false
    }

    // ---- signatures ----

    /// A stable opaque string identifying this exact type, used to key
    /// bound children in member stores. Format: `name` alone if there are
    /// no parameters, else `name__sig1_sig2_…__` (spec §4.3, grounded on
    /// `TypeSpec::TypeSignature` in `type_spec.cc`).
    #[must_use]
    pub fn type_signature(&self) -> String {
        if self.parameters().is_empty() && self.int_args().is_empty() {
            return self.name().to_string();
        }
        let mut parts: Vec<String> = self.parameters().iter().map(TypeSpec::type_signature).collect();
        parts.extend(self.int_args().iter().map(|n| format!("_i_{n}")));
        format!("{}__{}__", self.name(), parts.join("_"))
    }

    /// The signature of a binding-argument list: `TS_<sig1>_s_<sig2>_..._`
    /// (spec §4.3).
    #[must_use]
    pub fn binding_signature(args: &[BindArg]) -> String {
        let parts: Vec<String> = args.iter().map(BindArg::signature_component).collect();
        format!("TS_{}_", parts.join("_s_"))
    }

    /// A human-readable rendering: wraps with the local name when set
    /// (`{T: Numeric}`), otherwise `Name<p1,p2>` for parametric types.
    #[must_use]
    pub fn full_name(&self) -> String {
        let base = if self.parameters().is_empty() {
            self.name().to_string()
        } else {
            let params: Vec<String> = self
                .parameters()
                .iter()
                .enumerate()
                .map(|(i, p)| match self.slot_name(i) {
                    Some(n) => format!("{n}: {}", p.full_name()),
                    None => p.full_name(),
                })
                .collect();
            format!("{}<{}>", self.name(), params.join(", "))
        };
        match self.local_name() {
            Some(local) => format!("{{{local}: {base}}}"),
            None => base,
        }
    }

    // ---- Bind / Build ----

    /// Creates the parametric instance for `args`, caching the result under
    /// the binding signature on this type's member store so repeated binds
    /// with identical arguments return an equal (for synthesized structs,
    /// the very same) type — spec §8's `Bind` idempotence invariant.
    pub fn bind(&self, args: &[BindArg], alloc: &TypeIdAllocator) -> NudlResult<TypeSpec> {
        let signature = Self::binding_signature(args);
        if let Some(store) = self.member_store() {
            if let Some(cached) = store.cached_binding(&signature) {
                return Ok(cached);
            }
        }
        let bound = self
            .bind_uncached(args, alloc)
            .with_context(|| format!("binding `{}`", self.full_name()))?;
        if let Some(store) = self.member_store() {
            store.cache_binding(signature.clone(), bound.clone());
            if let Some(bound_store) = bound.member_store() {
                bound_store.set_owner_type_hint(bound.clone());
                TypeMemberStore::add_binding(&store, signature, bound_store);
            }
        }
        Ok(bound)
    }

    /// Same as [`Self::bind`]; spec §4.3 "Build(args) creates the
    /// parametric instance (default: same as Bind)".
    pub fn build(&self, args: &[BindArg], alloc: &TypeIdAllocator) -> NudlResult<TypeSpec> {
        self.bind(args, alloc)
    }

    fn bind_uncached(&self, args: &[BindArg], alloc: &TypeIdAllocator) -> NudlResult<TypeSpec> {
        match self.type_id() {
            TypeId::Null => bind_null(args),
            TypeId::Nullable => bind_nullable(self, args),
            TypeId::Union => bind_union(self, args),
            TypeId::Decimal => bind_decimal(self, args),
            TypeId::Map => bind_map(self, args),
            TypeId::Function => bind_function(self, args),
            TypeId::Tuple => bind_tuple(self, args),
            TypeId::TupleJoin => bind_tuple_join(self, args),
            TypeId::DatasetAggregate => bind_dataset_aggregate(self, args, alloc),
            TypeId::DatasetJoin => bind_dataset_join(self, args, alloc),
            id if id.is_iterable_family() || id == TypeId::Dataset => {
                bind_single_param(self, args)
            }
            _ => Err(NudlError::unimplemented(format!(
                "Type `{}` does not support binding",
                self.full_name()
            ))),
        }
    }
}

impl fmt::Debug for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeSpec({})", self.full_name())
    }
}

impl PartialEq for TypeSpec {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other)
    }
}

fn builtin_name_and_boundedness(type_id: TypeId) -> (&'static str, bool) {
    use TypeId::*;
    match type_id {
        Any => ("Any", false),
        Null => ("Null", true),
        Numeric => ("Numeric", false),
        Integral => ("Integral", false),
        Int => ("Int", true),
        Int8 => ("Int8", true),
        Int16 => ("Int16", true),
        Int32 => ("Int32", true),
        UInt => ("UInt", true),
        UInt8 => ("UInt8", true),
        UInt16 => ("UInt16", true),
        UInt32 => ("UInt32", true),
        Float64 => ("Float64", true),
        Float32 => ("Float32", true),
        Decimal => ("Decimal", true),
        String => ("String", true),
        Bytes => ("Bytes", true),
        Bool => ("Bool", true),
        Timestamp => ("Timestamp", false),
        Date => ("Date", true),
        DateTime => ("DateTime", true),
        TimeInterval => ("TimeInterval", true),
        Iterable => ("Iterable", false),
        Container => ("Container", false),
        Array => ("Array", true),
        Set => ("Set", true),
        Map => ("Map", true),
        Generator => ("Generator", true),
        Tuple => ("Tuple", false),
        Struct => ("Struct", false),
        Function => ("Function", false),
        Union => ("Union", false),
        Nullable => ("Nullable", true),
        Dataset => ("Dataset", true),
        Type => ("Type", true),
        Module => ("Module", true),
        TupleJoin => ("TupleJoin", false),
        DatasetAggregate => ("DatasetAggregate", false),
        DatasetJoin => ("DatasetJoin", false),
        User(_) => ("<user>", true),
    }
}

fn types_from_bindings(args: &[BindArg]) -> NudlResult<Vec<TypeSpec>> {
    args.iter()
        .map(|a| {
            a.as_type().cloned().ok_or_else(|| {
                NudlError::invalid_argument("Expected a type argument, found an integer")
            })
        })
        .collect()
}

fn bind_single_param(self_type: &TypeSpec, args: &[BindArg]) -> NudlResult<TypeSpec> {
    if args.len() != 1 {
        return Err(NudlError::invalid_argument(format!(
            "`{}` expects exactly one type parameter, got {}",
            self_type.name(),
            args.len()
        )));
    }
    let types = types_from_bindings(args)?;
    Ok(TypeSpec::parametric(self_type.type_id(), types))
}

fn bind_map(self_type: &TypeSpec, args: &[BindArg]) -> NudlResult<TypeSpec> {
    if args.len() != 2 {
        return Err(NudlError::invalid_argument(format!(
            "`Map` expects exactly two type parameters, got {}",
            args.len()
        )));
    }
    let types = types_from_bindings(args)?;
    let _ = self_type;
    Ok(TypeSpec::parametric(TypeId::Map, types))
}

fn bind_tuple(self_type: &TypeSpec, args: &[BindArg]) -> NudlResult<TypeSpec> {
    let types = types_from_bindings(args)?;
    let slot_names: Vec<Option<String>> = args.iter().map(|a| a.slot_name().map(str::to_string)).collect();
    let _ = self_type;
    Ok(TypeSpec::parametric(TypeId::Tuple, types).with_slot_names(slot_names))
}

/// `Null.Bind([T])` returns `Nullable<T>` unless `T` is already `Nullable`,
/// in which case `T` itself is returned unchanged (spec §4.3 "Nullable
/// rules").
fn bind_null(args: &[BindArg]) -> NudlResult<TypeSpec> {
    if args.len() != 1 {
        return Err(NudlError::invalid_argument(
            "`Null` binds to exactly one type",
        ));
    }
    let types = types_from_bindings(args)?;
    let inner = types.into_iter().next().unwrap();
    if inner.type_id() == TypeId::Nullable {
        return Ok(inner);
    }
    Ok(TypeSpec::parametric(TypeId::Nullable, vec![inner]))
}

/// `Nullable.Bind([Null, T])` = `Nullable<T>`; `Nullable.Bind([T])` wraps
/// `T` unless `T` is `Null` (invalid) or already `Nullable` (spec §4.3).
fn bind_nullable(self_type: &TypeSpec, args: &[BindArg]) -> NudlResult<TypeSpec> {
    let _ = self_type;
    let types = types_from_bindings(args)?;
    let inner = match types.as_slice() {
        [one] => one.clone(),
        [first, second] if first.type_id() == TypeId::Null => second.clone(),
        _ => {
            return Err(NudlError::invalid_argument(
                "`Nullable` expects one type, or `[Null, T]`",
            ));
        }
    };
    if inner.type_id() == TypeId::Null {
        return Err(NudlError::invalid_argument("Cannot build `Nullable<Null>`"));
    }
    if inner.type_id() == TypeId::Nullable {
        return Ok(inner);
    }
    Ok(TypeSpec::parametric(TypeId::Nullable, vec![inner]))
}

/// Sorts and deduplicates Union parameters: `Null` first, then
/// alphabetically by full name (spec §4.3 "Union rules", grounded on
/// `UnionSortTypes` in `types.cc`).
fn union_sort_types(mut types: Vec<TypeSpec>) -> Vec<TypeSpec> {
    let mut deduped: Vec<TypeSpec> = Vec::with_capacity(types.len());
    for t in types.drain(..) {
        if !deduped.iter().any(|existing| existing.is_equal(&t)) {
            deduped.push(t);
        }
    }
    deduped.sort_by(|a, b| match (a.type_id(), b.type_id()) {
        (TypeId::Null, TypeId::Null) => std::cmp::Ordering::Equal,
        (TypeId::Null, _) => std::cmp::Ordering::Less,
        (_, TypeId::Null) => std::cmp::Ordering::Greater,
        _ => a.full_name().cmp(&b.full_name()),
    });
    deduped
}

fn bind_union(self_type: &TypeSpec, args: &[BindArg]) -> NudlResult<TypeSpec> {
    let types = types_from_bindings(args)?;
    if !self_type.parameters().is_empty() {
        // Already-bound Union: `Bind([X])` narrows to `X` if it's one of
        // the alternatives, else fails.
        if types.len() != 1 {
            return Err(NudlError::invalid_argument(
                "Binding an already-bound `Union` expects exactly one type",
            ));
        }
        let candidate = &types[0];
        if self_type.is_ancestor_of(candidate) {
            return Ok(candidate.clone());
        }
        return Err(NudlError::invalid_argument(format!(
            "Cannot bind any of the arguments of `{}` to `{}`",
            self_type.full_name(),
            candidate.full_name()
        )));
    }
    let sorted = union_sort_types(types);
    if sorted.len() < 2 {
        return Err(NudlError::invalid_argument(format!(
            "Cannot build a `Union` with fewer than two type parameters: got {}",
            sorted.len()
        )));
    }
    Ok(TypeSpec::parametric(TypeId::Union, sorted))
}

fn bind_decimal(self_type: &TypeSpec, args: &[BindArg]) -> NudlResult<TypeSpec> {
    let ints: Vec<i64> = args
        .iter()
        .map(|a| match a {
            BindArg::Int(n) => Ok(*n),
            BindArg::Type(_) | BindArg::Named(_, _) => Err(NudlError::invalid_argument(
                "`Decimal` expects integer precision/scale arguments",
            )),
        })
        .collect::<NudlResult<_>>()?;
    if ints.len() != 2 {
        return Err(NudlError::invalid_argument(
            "`Decimal` expects exactly two integer arguments: precision, scale",
        ));
    }
    Ok(TypeSpec::parametric(self_type.type_id(), Vec::new()).with_int_args(ints))
}

fn bind_function(self_type: &TypeSpec, args: &[BindArg]) -> NudlResult<TypeSpec> {
    if args.is_empty() {
        return Err(NudlError::invalid_argument(
            "`Function` binding expects at least a result type",
        ));
    }
    let types = types_from_bindings(args)?;
    let slot_names: Vec<Option<String>> = args.iter().map(|a| a.slot_name().map(str::to_string)).collect();
    let _ = &self_type.0.slot_names;
    Ok(TypeSpec::parametric(TypeId::Function, types).with_slot_names(slot_names))
}

/// `TupleJoin.Bind(args)` flattens any tuple argument into the parameter
/// list while preserving names, returning a fresh `Tuple` (spec §4.3).
fn bind_tuple_join(self_type: &TypeSpec, args: &[BindArg]) -> NudlResult<TypeSpec> {
    let types = types_from_bindings(args)?;
    let mut flat_params = Vec::new();
    let mut flat_names = Vec::new();
    for t in &types {
        if t.type_id() == TypeId::Tuple {
            for (i, p) in t.parameters().iter().enumerate() {
                flat_params.push(p.clone());
                flat_names.push(t.slot_name(i).map(str::to_string));
            }
        } else {
            flat_params.push(t.clone());
            flat_names.push(None);
        }
    }
    let generator = self_type.clone();
    Ok(TypeSpec::parametric(TypeId::Tuple, flat_params)
        .with_slot_names(flat_names)
        .with_original_bind(generator))
}

/// Assigns field names for aggregate/join synthesis: unnamed or
/// `"_unnamed"` slots get a synthesized `arg_<n>`; duplicates are rejected
/// (spec §0.2, grounded on `NameKeeper` in `types.cc`).
struct NameKeeper {
    index: usize,
    known: std::collections::HashSet<String>,
}

impl NameKeeper {
    fn new() -> Self {
        Self {
            index: 0,
            known: std::collections::HashSet::new(),
        }
    }

    fn field_name(&mut self, candidate: Option<&str>) -> NudlResult<String> {
        self.index += 1;
        let result = match candidate {
            None => self.synthesize(),
            Some("_unnamed") => self.synthesize(),
            Some(other) => {
                if self.known.contains(other) {
                    return Err(NudlError::invalid_argument(format!(
                        "Duplicated field name found in aggregation: `{other}`"
                    )));
                }
                crate::names::NameUtil::validated_name(other)
                    .context("invalid aggregate field name")?
            }
        };
        self.known.insert(result.clone());
        Ok(result)
    }

    fn synthesize(&mut self) -> String {
        let mut j = self.index;
        loop {
            let candidate = format!("arg_{j}");
            if !self.known.contains(&candidate) {
                return candidate;
            }
            j += 1;
        }
    }
}

/// Per-aggregate-kind field type derivation (spec §0.2): `count` → `Int`,
/// `to_set` → `Set<T>`, `to_array` → `Array<T>`, `sum`/`mean` → require a
/// `Numeric` ancestor, anything else passes the input type through.
fn aggregate_field_type(kind: &str, input: &TypeSpec) -> NudlResult<TypeSpec> {
    match kind {
        "count" => Ok(TypeSpec::builtin_base(TypeId::Int)),
        "to_set" => Ok(TypeSpec::parametric(TypeId::Set, vec![input.clone()])),
        "to_array" => Ok(TypeSpec::parametric(TypeId::Array, vec![input.clone()])),
        "sum" | "mean" => {
            if !TypeSpec::builtin_base(TypeId::Numeric).is_ancestor_of(input) {
                return Err(NudlError::invalid_argument(format!(
                    "Aggregate `{kind}` requires a numeric field, found `{}`",
                    input.full_name()
                )));
            }
            Ok(input.clone())
        }
        _ => Ok(input.clone()),
    }
}

/// `DatasetAggregate.Bind([tuple])`: the tuple's head is the input row
/// struct; remaining slots are named `{aggregate_name: tuple<field_name:
/// field_type>}`. Synthesizes a fresh struct type with one field per
/// aggregate slot, wrapped in `Dataset<...>` (spec §4.3).
fn bind_dataset_aggregate(
    self_type: &TypeSpec,
    args: &[BindArg],
    alloc: &TypeIdAllocator,
) -> NudlResult<TypeSpec> {
    if args.len() != 1 {
        return Err(NudlError::invalid_argument(
            "`DatasetAggregate` expects exactly one tuple argument",
        ));
    }
    let types = types_from_bindings(args)?;
    let spec = &types[0];
    if spec.type_id() != TypeId::Tuple || spec.parameters().len() < 2 {
        return Err(NudlError::invalid_argument(format!(
            "`DatasetAggregate` expects a tuple with two or more members, found `{}`",
            spec.full_name()
        )));
    }
    let base_type = &spec.parameters()[0];
    let mut names = NameKeeper::new();
    let mut fields = Vec::new();
    for (i, aggregate_slot) in spec.parameters().iter().enumerate().skip(1) {
        let aggregate_kind = spec.slot_name(i).unwrap_or_default().to_string();
        if aggregate_slot.type_id() != TypeId::Tuple || aggregate_slot.parameters().is_empty() {
            return Err(NudlError::invalid_argument(format!(
                "Aggregation specification is badly built at index {i}, aggregate kind `{aggregate_kind}`"
            )));
        }
        let field_name = names
            .field_name(aggregate_slot.slot_name(0))
            .with_context(|| format!("in aggregation specification at index {i}"))?;
        let field_type = aggregate_field_type(&aggregate_kind, &aggregate_slot.parameters()[0])
            .with_context(|| format!("determining field type for aggregate `{field_name}`"))?;
        fields.push(Field::new(field_name, field_type));
    }
    let struct_name = format!("_Aggregate_{}", base_type.name());
    let struct_type = TypeSpec::declare_struct(alloc, struct_name, fields);
    Ok(TypeSpec::parametric(TypeId::Dataset, vec![struct_type]).with_original_bind(self_type.clone()))
}

/// `DatasetJoin.Bind([struct, key_fn, joins_tuple])`: copies the left
/// struct's fields, then per right-side join slot adds a `Nullable<right>`
/// (`right`), `Array<right>` (`right_multi`), or `Array<right>` +
/// `Array<Int>` index field (`right_multi_array`). Key result types must
/// agree across sides; duplicate field names are rejected (spec §4.3).
fn bind_dataset_join(
    self_type: &TypeSpec,
    args: &[BindArg],
    alloc: &TypeIdAllocator,
) -> NudlResult<TypeSpec> {
    if args.len() != 3 {
        return Err(NudlError::invalid_argument(
            "`DatasetJoin` expects exactly three arguments: struct, key function, joins tuple",
        ));
    }
    let types = types_from_bindings(args)?;
    let left_struct = &types[0];
    let key_fn = &types[1];
    let joins = &types[2];
    if joins.type_id() != TypeId::Tuple {
        return Err(NudlError::invalid_argument(
            "`DatasetJoin`'s third argument must be a tuple of join specifications",
        ));
    }
    let Some(left_key) = key_fn.result_type() else {
        return Err(NudlError::invalid_argument(
            "`DatasetJoin`'s key function must have a result type",
        ));
    };

    let mut names = NameKeeper::new();
    let mut fields = Vec::new();
    if let Some(store) = left_struct.member_store() {
        for field in store.fields() {
            fields.push(Field::new(names.field_name(Some(field.name()))?, field.field_type().clone()));
        }
    }

    for (i, join_slot) in joins.parameters().iter().enumerate() {
        let join_kind = joins.slot_name(i).unwrap_or("right").to_string();
        if join_slot.type_id() != TypeId::Tuple || join_slot.parameters().len() < 2 {
            return Err(NudlError::invalid_argument(format!(
                "Join specification badly built at index {i}"
            )));
        }
        let right_struct = &join_slot.parameters()[0];
        let right_key_fn = &join_slot.parameters()[1];
        let Some(right_key) = right_key_fn.result_type() else {
            return Err(NudlError::invalid_argument(format!(
                "Join key function at index {i} must have a result type"
            )));
        };
        if !left_key.is_equal(&right_key) {
            return Err(NudlError::invalid_argument(format!(
                "Join key types disagree at index {i}: `{}` vs `{}`",
                left_key.full_name(),
                right_key.full_name()
            )));
        }
        let field_base_name = joins.slot_name(i).unwrap_or("join").to_string();
        match join_kind.as_str() {
            "right" => {
                let ty = TypeSpec::parametric(TypeId::Nullable, vec![right_struct.clone()]);
                fields.push(Field::new(names.field_name(Some(&field_base_name))?, ty));
            }
            "right_multi" => {
                let ty = TypeSpec::parametric(TypeId::Array, vec![right_struct.clone()]);
                fields.push(Field::new(names.field_name(Some(&field_base_name))?, ty));
            }
            "right_multi_array" => {
                let ty = TypeSpec::parametric(TypeId::Array, vec![right_struct.clone()]);
                fields.push(Field::new(names.field_name(Some(&field_base_name))?, ty));
                let index_name = format!("{field_base_name}_index");
                let index_ty = TypeSpec::parametric(
                    TypeId::Array,
                    vec![TypeSpec::builtin_base(TypeId::Int)],
                );
                fields.push(Field::new(names.field_name(Some(&index_name))?, index_ty));
            }
            other => {
                return Err(NudlError::invalid_argument(format!(
                    "Unknown join kind `{other}` at index {i}"
                )));
            }
        }
    }

    let struct_name = format!("_Join_{}", left_struct.name());
    let struct_type = TypeSpec::declare_struct(alloc, struct_name, fields);
    Ok(TypeSpec::parametric(TypeId::Dataset, vec![struct_type]).with_original_bind(self_type.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc() -> TypeIdAllocator {
        TypeIdAllocator::new()
    }

    fn array_of(inner: TypeSpec) -> TypeSpec {
        TypeSpec::builtin_base(TypeId::Array)
            .bind(&[BindArg::Type(inner)], &alloc())
            .unwrap()
    }

    #[test]
    fn array_int_is_ancestor_of_array_int8_and_convertible() {
        let int8 = TypeSpec::builtin_base(TypeId::Int8);
        let int = TypeSpec::builtin_base(TypeId::Int);
        let array_int = array_of(int);
        let array_int8 = array_of(int8);
        assert!(array_int.is_ancestor_of(&array_int8));
        assert!(array_int.is_convertible_from(&array_int8));
        assert!(!array_int8.is_ancestor_of(&array_int));
    }

    #[test]
    fn reflexivity_and_equality() {
        let x = TypeSpec::builtin_base(TypeId::String);
        assert!(x.is_ancestor_of(&x));
        assert!(x.is_equal(&x));
        assert!(x.is_convertible_from(&x));
    }

    #[test]
    fn iterable_single_param_is_ancestor_of_map_via_result_type() {
        let a = alloc();
        let key = TypeSpec::builtin_base(TypeId::String);
        let val = TypeSpec::builtin_base(TypeId::Int);
        let map = TypeSpec::builtin_base(TypeId::Map)
            .bind(&[BindArg::Type(key), BindArg::Type(val.clone())], &a)
            .unwrap();
        let iterable_int = TypeSpec::builtin_base(TypeId::Iterable)
            .bind(&[BindArg::Type(val)], &a)
            .unwrap();
        assert!(iterable_int.is_ancestor_of(&map));
    }

    #[test]
    fn nullable_normalizes_double_wrapping() {
        let a = alloc();
        let int = TypeSpec::builtin_base(TypeId::Int);
        let nullable_int = TypeSpec::builtin_base(TypeId::Nullable)
            .bind(&[BindArg::Type(int)], &a)
            .unwrap();
        let double = TypeSpec::builtin_base(TypeId::Nullable)
            .bind(&[BindArg::Type(nullable_int.clone())], &a)
            .unwrap();
        assert!(double.is_equal(&nullable_int));
    }

    #[test]
    fn union_rejects_single_parameter() {
        let a = alloc();
        let int = TypeSpec::builtin_base(TypeId::Int);
        let err = TypeSpec::builtin_base(TypeId::Union)
            .bind(&[BindArg::Type(int)], &a)
            .unwrap_err();
        assert_eq!(err.kind(), nudl_common::ErrorKind::InvalidArgument);
    }

    #[test]
    fn union_dedups_and_sorts_null_first() {
        let a = alloc();
        let int = TypeSpec::builtin_base(TypeId::Int);
        let string = TypeSpec::builtin_base(TypeId::String);
        let null = TypeSpec::null();
        let union = TypeSpec::builtin_base(TypeId::Union)
            .bind(
                &[
                    BindArg::Type(int.clone()),
                    BindArg::Type(string.clone()),
                    BindArg::Type(int),
                    BindArg::Type(null),
                ],
                &a,
            )
            .unwrap();
        assert_eq!(union.parameters().len(), 3);
        assert_eq!(union.parameters()[0].type_id(), TypeId::Null);
    }

    #[test]
    fn bind_is_idempotent_under_clone() {
        let a = alloc();
        let int8 = TypeSpec::builtin_base(TypeId::Int8);
        let first = TypeSpec::builtin_base(TypeId::Array)
            .bind(&[BindArg::Type(int8.clone())], &a)
            .unwrap();
        let second = TypeSpec::builtin_base(TypeId::Array)
            .bind(&[BindArg::Type(int8)], &a)
            .unwrap();
        assert!(first.clone().is_equal(&second));
    }

    #[test]
    fn function_bind_example_scenario() {
        let a = alloc();
        let numeric = TypeSpec::builtin_base(TypeId::Numeric);
        let t = TypeSpec::local_type_variable("T", Some(numeric));
        let int = TypeSpec::builtin_base(TypeId::Int);
        let function_template = TypeSpec::builtin_base(TypeId::Function);
        let bound = function_template
            .bind(
                &[
                    BindArg::Type(t.clone()),
                    BindArg::Type(int.clone()),
                    BindArg::Type(int.clone()),
                ],
                &a,
            )
            .unwrap();
        assert_eq!(bound.parameters().len(), 3);
        assert!(bound.result_type().unwrap().is_equal(&int));
    }
}
