//! Scope/name resolution and the parametric `TypeSpec` lattice for NuDL.
//!
//! This crate is the foundation the rest of the analysis pipeline is
//! built on: [`names`] and [`named_object`] give every declared thing a
//! qualified identity and a place in the scope tree; [`type_spec`] and
//! [`types`] define the type lattice itself (ancestry, convertibility,
//! parametric binding); [`type_store`] is where types get registered and
//! looked up by signature.

pub mod names;
pub use names::{NameUtil, ScopeName, ScopedName};

pub mod named_object;
pub use named_object::{BaseNameStore, NameStore, NamedObject, ObjectKind, WrappedNameStore};

pub mod types;
pub use types::{TypeId, TypeIdAllocator};

pub mod type_member_store;
pub use type_member_store::{Field, TypeMemberStore};

pub mod type_spec;
pub use type_spec::{BindArg, TypeSpec};

pub mod local_names_rebinder;
pub use local_names_rebinder::LocalNamesRebinder;

pub mod type_store;
pub use type_store::GlobalTypeStore;
