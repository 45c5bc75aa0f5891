//! Renders an analyzed NuDL module to Python source (spec §4.9, §6).
//!
//! This crate sits at the top of the workspace, depending on
//! [`nudl_checker`] for the typed expression tree and overload machinery,
//! [`nudl_binder`] for the module/scope graph, and [`nudl_types`] for the
//! type lattice each annotation is rendered from. It has one entry point,
//! [`emit_module`], plus [`emit_entrypoint`] for the small runnable script
//! a `main` function produces.
//!
//! Grounded on the module layout of `tsz-emitter` (`emit_context`,
//! `emitter::{expressions, declarations}`, a top-level driver), generalized
//! from that crate's `.d.ts`/JS output to this one's Python output.

pub mod emit_context;
pub use emit_context::EmitState;

pub mod identifiers;
pub use identifiers::{rename_identifier, sanitize_qualified_name};

pub mod types;
pub use types::{struct_class_name, type_annotation};

pub mod expressions;
pub use expressions::{emit_statement, emit_tail, emit_value};

pub mod functions;
pub use functions::{emit_function, emit_struct, python_function_name};

pub mod module;
pub use module::{emit_entrypoint, emit_module};
