//! Parsing, validation, and composition of qualified names.
//!
//! Grounded on `nudl/analysis/names.{h,cc}`: a [`ScopeName`] is an ordered
//! pair of a module path (joined by `.`) and a function path (joined by
//! `::`); a [`ScopedName`] pairs a shared `ScopeName` with a simple
//! identifier.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use nudl_common::{NudlError, NudlResult};

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}

/// Identifier-shape validation, grounded on `NameUtil` in `names.h`.
pub struct NameUtil;

impl NameUtil {
    #[must_use]
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty() && is_valid_segment(name)
    }

    pub fn validated_name(name: impl Into<String>) -> NudlResult<String> {
        let name = name.into();
        if Self::is_valid_name(&name) {
            Ok(name)
        } else {
            Err(NudlError::invalid_argument(format!(
                "Invalid identifier name: `{name}`"
            )))
        }
    }

    #[must_use]
    pub fn is_valid_module_name(name: &str) -> bool {
        !name.is_empty() && name.split('.').all(is_valid_segment)
    }

    pub fn validated_module_name(name: impl Into<String>) -> NudlResult<String> {
        let name = name.into();
        if Self::is_valid_module_name(&name) {
            Ok(name)
        } else {
            Err(NudlError::invalid_argument(format!(
                "Invalid module name: `{name}`"
            )))
        }
    }

    /// Strips a leading `::`, the normalization `NameStore::NormalizeLocalName`
    /// performs before any lookup/insert.
    #[must_use]
    pub fn normalize_local_name(local_name: &str) -> &str {
        local_name.strip_prefix("::").unwrap_or(local_name)
    }

    #[must_use]
    pub fn identifier_from_name(name: &str) -> String {
        name.replace(['.', ':'], "_")
    }
}

/// A module path + function path pair, identifying a lexical scope.
///
/// Immutable and hashable; the empty `ScopeName` denotes the built-in
/// scope.
#[derive(Debug, Clone, Eq)]
pub struct ScopeName {
    module_names: Rc<Vec<String>>,
    function_names: Rc<Vec<String>>,
    composed: Rc<str>,
}

impl ScopeName {
    #[must_use]
    pub fn empty() -> Self {
        Self::recompose(Vec::new(), Vec::new())
    }

    /// Parses `"foo.bar::baz::qux"` into module=[foo,bar], function=[baz,qux].
    pub fn parse(name: &str) -> NudlResult<Self> {
        if name.is_empty() {
            return Ok(Self::empty());
        }
        let (module_part, function_part) = match name.split_once("::") {
            Some((m, f)) => (m, Some(f)),
            None => (name, None),
        };
        let module_names: Vec<String> = if module_part.is_empty() {
            Vec::new()
        } else {
            module_part.split('.').map(str::to_string).collect()
        };
        for segment in &module_names {
            if !is_valid_segment(segment) {
                return Err(NudlError::invalid_argument(format!(
                    "Invalid module segment `{segment}` in scope name `{name}`"
                )));
            }
        }
        let function_names: Vec<String> = match function_part {
            None => Vec::new(),
            Some(f) => {
                let segments: Vec<String> = f.split("::").map(str::to_string).collect();
                for segment in &segments {
                    if !is_valid_segment(segment) {
                        return Err(NudlError::invalid_argument(format!(
                            "Invalid function segment `{segment}` in scope name `{name}`"
                        )));
                    }
                }
                segments
            }
        };
        Ok(Self::recompose(module_names, function_names))
    }

    /// Pure recomposition from the parsed components; never fails.
    #[must_use]
    pub fn recompose(module_names: Vec<String>, function_names: Vec<String>) -> Self {
        let mut composed = module_names.join(".");
        if !function_names.is_empty() {
            if !composed.is_empty() {
                composed.push_str("::");
            } else {
                // function-only scope still uses the `::` separator form.
            }
            composed.push_str(&function_names.join("::"));
        }
        Self {
            module_names: Rc::new(module_names),
            function_names: Rc::new(function_names),
            composed: Rc::from(composed.as_str()),
        }
    }

    #[must_use]
    pub fn module_names(&self) -> &[String] {
        &self.module_names
    }

    #[must_use]
    pub fn function_names(&self) -> &[String] {
        &self.function_names
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.composed
    }

    #[must_use]
    pub fn module_name(&self) -> String {
        self.module_names.join(".")
    }

    #[must_use]
    pub fn function_name(&self) -> String {
        self.function_names.join("::")
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.module_names.is_empty() && self.function_names.is_empty()
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.module_names.len() + self.function_names.len()
    }

    /// First `k` segments (module segments first, then function segments),
    /// combined as a new `ScopeName`.
    #[must_use]
    pub fn prefix(&self, k: usize) -> Self {
        let (modules, functions) = self.split_at(k);
        Self::recompose(modules, functions)
    }

    /// Like [`Self::prefix`] but renders just the composed name string,
    /// matching `PrefixScopeName(pos).name()` call sites.
    #[must_use]
    pub fn prefix_scope_name(&self, k: usize) -> String {
        self.prefix(k).name().to_string()
    }

    #[must_use]
    pub fn suffix(&self, k: usize) -> Self {
        let total = self.size();
        let k = k.min(total);
        let (_, rest_modules, rest_functions) = self.split_at_remainder(k);
        Self::recompose(rest_modules, rest_functions)
    }

    #[must_use]
    pub fn suffix_scope_name(&self, k: usize) -> String {
        self.suffix(k).name().to_string()
    }

    fn split_at(&self, k: usize) -> (Vec<String>, Vec<String>) {
        let k = k.min(self.size());
        if k <= self.module_names.len() {
            (self.module_names[..k].to_vec(), Vec::new())
        } else {
            (
                self.module_names.to_vec(),
                self.function_names[..k - self.module_names.len()].to_vec(),
            )
        }
    }

    fn split_at_remainder(&self, k: usize) -> ((), Vec<String>, Vec<String>) {
        if k <= self.module_names.len() {
            (
                (),
                self.module_names[k..].to_vec(),
                self.function_names.to_vec(),
            )
        } else {
            (
                (),
                Vec::new(),
                self.function_names[k - self.module_names.len()..].to_vec(),
            )
        }
    }

    /// True iff `other.name()` begins with `self.name()` followed by
    /// end-of-string, `.`, or `::`.
    #[must_use]
    pub fn is_prefix_scope(&self, other: &ScopeName) -> bool {
        let (a, b) = (self.name(), other.name());
        if a.is_empty() {
            return true;
        }
        match b.strip_prefix(a) {
            None => false,
            Some(rest) => rest.is_empty() || rest.starts_with('.') || rest.starts_with("::"),
        }
    }

    pub fn submodule(&self, name: &str) -> NudlResult<Self> {
        let name = NameUtil::validated_name(name)?;
        if !self.function_names.is_empty() {
            return Err(NudlError::invalid_argument(format!(
                "Cannot append submodule `{name}` to a scope with a function path: `{}`",
                self.name()
            )));
        }
        let mut modules = self.module_names.to_vec();
        modules.push(name);
        Ok(Self::recompose(modules, Vec::new()))
    }

    pub fn subfunction(&self, name: &str) -> NudlResult<Self> {
        let name = NameUtil::validated_name(name)?;
        let mut functions = self.function_names.to_vec();
        functions.push(name);
        Ok(Self::recompose(self.module_names.to_vec(), functions))
    }

    /// Appends to the function path once any function segment exists,
    /// otherwise to the module path.
    pub fn subname(&self, name: &str) -> NudlResult<Self> {
        if self.function_names.is_empty() {
            self.submodule(name)
        } else {
            self.subfunction(name)
        }
    }

    /// Concatenates `other` onto `self` if `other` is structurally
    /// appendable (it has no module segments once `self` already has
    /// function segments, etc); otherwise returns `self` unchanged — the
    /// documented precondition-violation recovery.
    #[must_use]
    pub fn subscope(&self, other: &ScopeName) -> Self {
        if other.is_empty() {
            return self.clone();
        }
        if !self.function_names.is_empty() && !other.module_names.is_empty() {
            return self.clone();
        }
        let mut modules = self.module_names.to_vec();
        modules.extend(other.module_names.iter().cloned());
        let mut functions = self.function_names.to_vec();
        functions.extend(other.function_names.iter().cloned());
        Self::recompose(modules, functions)
    }
}

impl PartialEq for ScopeName {
    fn eq(&self, other: &Self) -> bool {
        self.composed == other.composed
    }
}

impl Hash for ScopeName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.composed.hash(state);
    }
}

impl fmt::Display for ScopeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.composed)
    }
}

/// A shared `ScopeName` plus a simple identifier, used for every name
/// occurrence in the program.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopedName {
    scope_name: Rc<ScopeName>,
    name: String,
}

impl ScopedName {
    #[must_use]
    pub fn new(scope_name: Rc<ScopeName>, name: impl Into<String>) -> Self {
        Self {
            scope_name,
            name: name.into(),
        }
    }

    /// Parses `"foo.bar::baz.qux"` into scope=`foo.bar::baz`, name=`qux`.
    pub fn parse(full_name: &str) -> NudlResult<Self> {
        Self::from_identifier(full_name)
    }

    pub fn from_identifier(full_name: &str) -> NudlResult<Self> {
        let (scope_part, name) = match full_name.rsplit_once('.') {
            Some((scope, name)) => (scope, name),
            None => ("", full_name),
        };
        let name = NameUtil::validated_name(name)?;
        let scope_name = ScopeName::parse(scope_part)?;
        Ok(Self::new(Rc::new(scope_name), name))
    }

    #[must_use]
    pub fn scope_name_ptr(&self) -> Rc<ScopeName> {
        Rc::clone(&self.scope_name)
    }

    #[must_use]
    pub fn scope_name(&self) -> &ScopeName {
        &self.scope_name
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        if self.scope_name.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.scope_name.name(), self.name)
        }
    }
}

impl fmt::Display for ScopedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}
