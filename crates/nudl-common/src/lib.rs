//! Common types and utilities shared by the NuDL analysis crates.
//!
//! This crate provides the ambient stack the rest of the workspace builds
//! on:
//! - The closed error taxonomy (`NudlError`, `ErrorKind`, `NudlResult`)
//! - Process-wide configuration flags (`CompilerOptions`)
//! - Centralized recursion guards (`limits`)

pub mod compiler_options;
pub use compiler_options::CompilerOptions;

pub mod error;
pub use error::{ErrorKind, NudlError, NudlResult, ResultExt};

pub mod limits;
