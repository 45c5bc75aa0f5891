//! Target-language identifier renaming (spec §6 "Identifier renaming").
//!
//! Grounded on the keyword/builtin collision tables the teacher's
//! `tsz-emitter::emitter::helpers` consults before writing any identifier
//! (`write_identifier`) — generalized here from JS/TS reserved words to
//! Python's, since this emitter's one target language is Python.

use rustc_hash::FxHashSet;
use std::sync::OnceLock;

const PY_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

const PY_BUILTINS: &[&str] = &[
    "print", "len", "str", "int", "float", "bool", "bytes", "list", "dict", "set", "tuple",
    "type", "object", "id", "input", "open", "range", "map", "filter", "sum", "min", "max",
    "sorted", "reversed", "enumerate", "zip", "iter", "next", "super", "property",
    "staticmethod", "classmethod", "Exception", "ValueError", "TypeError", "KeyError",
    "IndexError", "StopIteration", "vars", "dir", "hash", "repr", "format", "abs", "round",
    "all", "any", "isinstance", "issubclass", "getattr", "setattr", "hasattr", "callable",
];

const PY_STD_MODULES: &[&str] = &[
    "os", "sys", "typing", "dataclasses", "datetime", "decimal", "json", "re", "math",
    "itertools", "functools", "collections", "abc", "io", "copy",
];

fn collision_set() -> &'static FxHashSet<&'static str> {
    static SET: OnceLock<FxHashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| {
        PY_KEYWORDS
            .iter()
            .chain(PY_BUILTINS)
            .chain(PY_STD_MODULES)
            .copied()
            .collect()
    })
}

/// True iff `name` begins and ends with a double underscore and is longer
/// than just `"____"` (spec §6: "names beginning and ending with `__`").
fn is_dunder(name: &str) -> bool {
    name.len() > 4 && name.starts_with("__") && name.ends_with("__")
}

fn needs_rename(name: &str) -> bool {
    collision_set().contains(name) || is_dunder(name)
}

/// Renames `name` for emission: verbatim if `skip_conversion` is set on its
/// declaration, otherwise suffixed with `__nudl` when it collides with a
/// target-language keyword, builtin function, standard module, or dunder
/// convention (spec §6).
#[must_use]
pub fn rename_identifier(name: &str, skip_conversion: bool) -> String {
    if skip_conversion || !needs_rename(name) {
        name.to_string()
    } else {
        format!("{name}__nudl")
    }
}

/// Renders a scope-qualified type name (`pkg.sub.Widget`) as a valid single
/// Python identifier, since Python class names can't contain `.`.
#[must_use]
pub fn sanitize_qualified_name(full_name: &str) -> String {
    full_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_plain_name_passes_through_unchanged() {
        assert_eq!(rename_identifier("widget", false), "widget");
    }

    #[test]
    fn a_keyword_collision_is_suffixed() {
        assert_eq!(rename_identifier("class", false), "class__nudl");
    }

    #[test]
    fn a_builtin_collision_is_suffixed() {
        assert_eq!(rename_identifier("list", false), "list__nudl");
    }

    #[test]
    fn a_dunder_name_is_suffixed() {
        assert_eq!(rename_identifier("__init__", false), "__init____nudl");
    }

    #[test]
    fn skip_conversion_bypasses_renaming_even_for_a_keyword() {
        assert_eq!(rename_identifier("class", true), "class");
    }

    #[test]
    fn a_short_dunder_like_name_is_not_treated_as_dunder() {
        assert_eq!(rename_identifier("____", false), "____");
    }

    #[test]
    fn sanitize_qualified_name_replaces_dots() {
        assert_eq!(sanitize_qualified_name("geo.Point"), "geo_Point");
    }
}
