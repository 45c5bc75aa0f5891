//! Per-module emission state: the output buffer, indentation depth, the
//! "seen" sets that keep every function/group/struct emitted exactly once,
//! the set of imports the emitted module needs, the abstract-lambda
//! dispatch-wrapper table, and the "currently being called" stack used to
//! route identifier resolution to the right binding.
//!
//! Grounded on `EmitContext`/`Printer` state in `tsz-emitter/src/emit_context.rs`
//! and `tsz-emitter/src/emitter/helpers.rs` (spec §4.9): the teacher keeps
//! transform-specific state out of the traversal code by grouping it into
//! one context object threaded through every emit call; we do the same,
//! generalized to the handful of pieces of state spec §4.9 actually names.

use std::collections::BTreeSet;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use nudl_checker::Function;

const INDENT_UNIT: &str = "    ";

/// Mutable state threaded through one module's emission (spec §4.9: "a
/// stream buffer, indentation depth, a set of seen functions/function-groups/
/// structs ..., a set of required imports, a macro-expansion table, and a
/// stack of currently-being-called functions").
pub struct EmitState {
    buffer: String,
    indent_depth: u32,
    seen_functions: FxHashSet<usize>,
    seen_groups: FxHashSet<usize>,
    seen_structs: FxHashSet<String>,
    required_imports: BTreeSet<String>,
    /// Dispatch wrappers synthesized for abstract-lambda call sites (spec
    /// §9 "Design Notes"): keyed by the call-site signature that produced
    /// them, valued by the wrapper's already-rendered Python source.
    macro_table: FxHashMap<String, String>,
    call_stack: Vec<Rc<Function>>,
    /// Source of concrete function instances emitted lazily, the first
    /// time a call site resolves to them (spec §4.7 "Function instances"):
    /// an abstract function has no Python `def` of its own, so each
    /// instantiation called anywhere in the module gets its own, collected
    /// here and spliced in ahead of the statements that use them.
    instance_defs: Vec<String>,
}

impl EmitState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            indent_depth: 0,
            seen_functions: FxHashSet::default(),
            seen_groups: FxHashSet::default(),
            seen_structs: FxHashSet::default(),
            required_imports: BTreeSet::new(),
            macro_table: FxHashMap::default(),
            call_stack: Vec::new(),
            instance_defs: Vec::new(),
        }
    }

    fn indent_str(&self) -> String {
        INDENT_UNIT.repeat(self.indent_depth as usize)
    }

    /// Appends one line, prefixed with the current indentation and
    /// suffixed with a newline.
    pub fn write_line(&mut self, text: &str) {
        if text.is_empty() {
            self.buffer.push('\n');
            return;
        }
        self.buffer.push_str(&self.indent_str());
        self.buffer.push_str(text);
        self.buffer.push('\n');
    }

    pub fn blank_line(&mut self) {
        self.buffer.push('\n');
    }

    pub fn indent(&mut self) {
        self.indent_depth += 1;
    }

    pub fn dedent(&mut self) {
        self.indent_depth = self.indent_depth.saturating_sub(1);
    }

    pub fn require_import(&mut self, module: impl Into<String>) {
        self.required_imports.insert(module.into());
    }

    #[must_use]
    pub fn imports(&self) -> Vec<String> {
        self.required_imports.iter().cloned().collect()
    }

    /// Marks `function` as emitted by reference identity; returns `true`
    /// the first time a given function is seen so callers can skip
    /// re-emitting a `def` for a binding instance already written out.
    pub fn mark_function_seen(&mut self, function: &Rc<Function>) -> bool {
        self.seen_functions.insert(Rc::as_ptr(function) as usize)
    }

    pub fn mark_group_seen(&mut self, group_ptr: usize) -> bool {
        self.seen_groups.insert(group_ptr)
    }

    pub fn mark_struct_seen(&mut self, full_name: impl Into<String>) -> bool {
        self.seen_structs.insert(full_name.into())
    }

    pub fn push_call(&mut self, function: Rc<Function>) {
        self.call_stack.push(function);
    }

    pub fn pop_call(&mut self) {
        self.call_stack.pop();
    }

    #[must_use]
    pub fn currently_calling(&self) -> Option<&Rc<Function>> {
        self.call_stack.last()
    }

    pub fn register_macro(&mut self, signature: impl Into<String>, source: impl Into<String>) {
        self.macro_table.insert(signature.into(), source.into());
    }

    #[must_use]
    pub fn macro_for(&self, signature: &str) -> Option<&str> {
        self.macro_table.get(signature).map(String::as_str)
    }

    pub fn push_instance_def(&mut self, source: String) {
        self.instance_defs.push(source);
    }

    #[must_use]
    pub fn instance_defs(&self) -> &[String] {
        &self.instance_defs
    }

    /// The accumulated body text written so far (everything after imports
    /// and struct/function preambles), handed to [`crate::module::emit_module`]
    /// to assemble the final file.
    #[must_use]
    pub fn into_source(self) -> String {
        self.buffer
    }
}

impl Default for EmitState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_line_indents_by_current_depth() {
        let mut state = EmitState::new();
        state.indent();
        state.write_line("pass");
        assert_eq!(state.into_source(), "    pass\n");
    }

    #[test]
    fn mark_struct_seen_is_true_only_the_first_time() {
        let mut state = EmitState::new();
        assert!(state.mark_struct_seen("geo.Point"));
        assert!(!state.mark_struct_seen("geo.Point"));
    }

    #[test]
    fn imports_are_deduplicated_and_sorted() {
        let mut state = EmitState::new();
        state.require_import("typing");
        state.require_import("dataclasses");
        state.require_import("typing");
        assert_eq!(state.imports(), vec!["dataclasses".to_string(), "typing".to_string()]);
    }
}
