//! Centralized recursion guards.
//!
//! The analyzer is recursive-descent over an already-parsed tree (spec §5:
//! single-threaded, cooperative, no internal tasks). These constants bound
//! the handful of genuinely recursive algorithms so a pathological or
//! cyclic input degrades to an `internal` error instead of a stack
//! overflow, rather than expressing every bound as an ad hoc magic number
//! at its call site.

/// Maximum depth when walking the `TypeMemberStore` binding graph
/// (`FindBindingOrder`): self, bound children, binding parent, ancestor.
/// Pathological binding graphs should never approach this in practice.
pub const MAX_BINDING_ORDER_DEPTH: u32 = 256;

/// Maximum recursion depth for `Expression::negotiate_type`. Mirrors the
/// checker's own AST recursion guard; deeply nested expressions beyond
/// this are vanishingly unlikely in hand-written source.
pub const MAX_EXPRESSION_DEPTH: u32 = 512;

/// Maximum number of parent-store hops when resolving a scoped name
/// (`NameStore::find_name`'s walk up the parent-store chain).
pub const MAX_SCOPE_WALK_DEPTH: u32 = 256;

/// Maximum recursion depth for `LocalNamesRebinder::process_type`/
/// `rebuild_type` over a type's parameter tree.
pub const MAX_REBINDER_DEPTH: u32 = 128;
