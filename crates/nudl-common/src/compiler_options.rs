//! Process-wide configuration flags for analysis and emission.
//!
//! Lives in `nudl-common` so that `nudl-types`, `nudl-checker`, and
//! `nudl-emitter` can all read it without a circular dependency, the same
//! role the teacher gives `CheckerOptions` in `tsz-common`.

/// Compiler configuration flags (spec §6 "Configuration flags").
#[derive(Debug, Clone, Copy, Default)]
pub struct CompilerOptions {
    /// Emit compact type references rather than full structural protos.
    pub short_proto_output: bool,
    /// When true, the default value of `Nullable<T>` is `default(T)`
    /// rather than the null literal.
    pub nullable_default_is_value: bool,
    /// When true, a function-typed variable may hold an abstract
    /// (not-fully-bound) function.
    pub accept_abstract_lambdas: bool,
    /// When true, each concrete function binding is emitted in the module
    /// that *uses* it, rather than the module that declares the abstract
    /// function.
    pub bindings_on_use: bool,
}

impl CompilerOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
