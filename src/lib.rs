//! Library facade over the NuDL analyzer/emitter workspace.
//!
//! Mirrors the teacher's root `wasm` package acting as the library facade
//! over its own crates (`tsz-common`, `tsz-binder`, `tsz-checker`,
//! `tsz-emitter`, ...), minus the binaries, WASM bindings, and benches that
//! package also carries — those are out of this spec's scope. Downstream
//! embedders (a parser, a CLI) depend on this crate and reach every stage
//! through one of the modules below rather than depending on the five
//! workspace crates individually.

pub mod common {
    pub use nudl_common::*;
}

pub mod types {
    pub use nudl_types::*;
}

pub mod binder {
    pub use nudl_binder::*;
}

pub mod checker {
    pub use nudl_checker::*;
}

pub mod emitter {
    pub use nudl_emitter::*;
}

use nudl_binder::Module;
use nudl_common::{CompilerOptions, NudlResult};

/// Runs the emitter over an already-bound and already-checked [`Module`],
/// producing the Python source spec §6 describes as the compiler's
/// external interface. Binding and type-checking an input syntax tree into
/// a `Module` is the job of the (out-of-scope, per spec §1) parser/binder
/// driver; this function picks up from there.
#[tracing::instrument(skip_all)]
pub fn emit_python_module(module: &Module, options: &CompilerOptions) -> NudlResult<String> {
    nudl_emitter::emit_module(module, options)
}
