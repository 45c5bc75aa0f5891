//! Variable binding, the scope/module graph, and field-usage analysis.
//!
//! This crate sits directly above [`nudl_types`]: [`var_base`] gives every
//! assignable thing (a local, a parameter, a struct field access) typed
//! assignment with effective-type narrowing; [`scope`] and [`module`] wire
//! those variables, together with declared types and functions, into the
//! `NameStore` tree a module exposes.
//!
//! `FieldUsageVisitor` (spec §4.8) is not in this crate even though the
//! layout table in `SPEC_FULL.md` names it here: it walks the concrete
//! `Expression` tree, which lives one layer up in `nudl-checker`, and Rust's
//! crate graph only runs one way (the same reasoning `nudl_types::named_object`'s
//! doc comment gives for keeping `NameStore` at the bottom of the workspace).
//! It lives in `nudl_checker::field_usage` instead.

pub mod var_base;
pub use var_base::{VarBase, VarKind};

pub mod scope;
pub use scope::Scope;

pub mod module;
pub use module::Module;
