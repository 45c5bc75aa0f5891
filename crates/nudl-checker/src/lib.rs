//! The typed expression tree and overload resolution for the NuDL semantic
//! analyzer.
//!
//! This crate sits above [`nudl_binder`]: [`expression`] defines every
//! concrete node of the analyzed program and the `NegotiateType` contract
//! each one implements (spec §4.6); [`function`], [`function_group`], and
//! [`function_binding`] implement the overload-set/call-resolution machinery
//! those nodes call into for `FunctionCall` (spec §4.7); [`field_usage`]
//! walks an analyzed module's expressions to compute the per-type field
//! usage the emitter needs to prune synthesized struct fields (spec §4.8).

pub mod expression;
pub use expression::{Expression, ExpressionKind, ExitKind, IdentifierTarget, TupleElement};

pub mod function;
pub use function::{Argument, Function, FunctionState};

pub mod function_group;
pub use function_group::FunctionGroup;

pub mod function_binding;
pub use function_binding::{resolve_overload, FunctionBinding};

pub mod field_usage;
pub use field_usage::FieldUsageVisitor;
