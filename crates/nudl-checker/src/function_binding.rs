//! Overload resolution: picking the best-matching declaration in a
//! [`FunctionGroup`] for a given call-site argument list.
//!
//! Grounded on `FunctionBinding`/`FindBestOverload` in
//! `nudl/analysis/function.cc` (spec §4.7 "Overload resolution"): each
//! candidate is matched positionally, then by keyword, then by default
//! value; every matched slot is scored by how far the actual type sits from
//! the declared one; the candidate with the lowest total score wins, ties
//! broken by declaration order.

use std::rc::Rc;

use nudl_common::{NudlError, NudlResult};
use nudl_types::{LocalNamesRebinder, TypeId, TypeIdAllocator, TypeSpec};

use crate::function::Function;
use crate::function_group::FunctionGroup;

/// The outcome of resolving a call: either a ready-to-use existing
/// `Function`, or, when the matched candidate was `Abstract`, a freshly
/// instantiated concrete one (registered onto the group as a side effect).
pub struct FunctionBinding {
    target: Option<Rc<Function>>,
    bound_type: TypeSpec,
}

impl FunctionBinding {
    #[must_use]
    pub fn target(&self) -> Option<Rc<Function>> {
        self.target.clone()
    }

    #[must_use]
    pub fn bound_type(&self) -> TypeSpec {
        self.bound_type.clone()
    }

    #[must_use]
    pub fn result_type(&self) -> TypeSpec {
        self.bound_type
            .result_type()
            .unwrap_or_else(TypeSpec::null)
    }
}

/// Per-slot conversion cost: `0` exact, `1` up-cast to a declared ancestor
/// or through a `Nullable` wrap, `1 + parameter count` for an unbound local
/// type variable matched via convertibility (so a more specific generic
/// constraint is preferred over a looser one). `None` means the slot does
/// not accept the actual type at all.
fn score_slot(declared: &TypeSpec, actual: &TypeSpec) -> Option<u32> {
    if declared.is_equal(actual) {
        return Some(0);
    }
    if declared.type_id() == TypeId::Nullable {
        if let Some(inner) = declared.result_type() {
            if inner.is_equal(actual) {
                return Some(2);
            }
            if inner.is_ancestor_of(actual) {
                return Some(2 + 1);
            }
        }
    }
    if declared.is_ancestor_of(actual) {
        return Some(1);
    }
    if !declared.is_bound() && declared.is_convertible_from(actual) {
        return Some(1 + declared.parameters().len() as u32);
    }
    None
}

struct Candidate {
    function: Rc<Function>,
    rebinder: LocalNamesRebinder,
    component_types: Vec<TypeSpec>,
    score: u32,
}

fn match_candidate(
    function: &Rc<Function>,
    positional: &[TypeSpec],
    keyword: &[(String, TypeSpec)],
    alloc: &TypeIdAllocator,
) -> NudlResult<Candidate> {
    let arguments = function.arguments();
    if positional.len() > arguments.len() {
        return Err(NudlError::invalid_argument(format!(
            "`{}` takes {} argument(s), {} given",
            function.name(),
            arguments.len(),
            positional.len()
        )));
    }
    let rebinder = LocalNamesRebinder::new();
    let mut component_types = Vec::with_capacity(arguments.len());
    let mut total_score = 0u32;

    for (slot, argument) in arguments.iter().enumerate() {
        let declared = argument.declared_type();
        let actual = if slot < positional.len() {
            Some(positional[slot].clone())
        } else if let Some((_, ty)) = keyword.iter().find(|(name, _)| name == argument.name()) {
            Some(ty.clone())
        } else {
            None
        };
        let actual = match actual {
            Some(actual) => actual,
            None if argument.has_default() => {
                component_types.push(declared);
                continue;
            }
            None => {
                return Err(NudlError::invalid_argument(format!(
                    "`{}` is missing required argument `{}`",
                    function.name(),
                    argument.name()
                )));
            }
        };
        let score = score_slot(&declared, &actual).ok_or_else(|| {
            NudlError::invalid_argument(format!(
                "`{}` cannot accept `{}` for argument `{}` (declared `{}`)",
                function.name(),
                actual.full_name(),
                argument.name(),
                declared.full_name()
            ))
        })?;
        total_score += score;
        if let Some(local_name) = declared.local_name() {
            rebinder.record(&local_name, &actual, alloc)?;
        }
        let rebuilt = rebinder.rebuild_type(&declared, alloc)?;
        component_types.push(if rebuilt.is_bound() { rebuilt } else { actual });
    }

    // Keyword arguments naming a slot that was already filled positionally,
    // or that does not exist on the candidate at all, disqualify it.
    for (name, _) in keyword {
        let slot = arguments.iter().position(|a| a.name() == name);
        match slot {
            Some(index) if index < positional.len() => {
                return Err(NudlError::invalid_argument(format!(
                    "`{}` got multiple values for argument `{name}`",
                    function.name()
                )));
            }
            None => {
                return Err(NudlError::invalid_argument(format!(
                    "`{}` has no argument named `{name}`",
                    function.name()
                )));
            }
            Some(_) => {}
        }
    }

    Ok(Candidate {
        function: Rc::clone(function),
        rebinder,
        component_types,
        score: total_score,
    })
}

/// Resolves a call against every declaration in `group`, returning the
/// lowest-scoring match (ties broken by declaration order) as a
/// [`FunctionBinding`]. If the winning candidate is `Abstract`, a concrete
/// instance is created and registered onto the group as a side effect.
pub fn resolve_overload(
    group: &FunctionGroup,
    positional: &[TypeSpec],
    keyword: &[(String, TypeSpec)],
    alloc: &TypeIdAllocator,
) -> NudlResult<FunctionBinding> {
    let functions = group.functions();
    if functions.is_empty() {
        return Err(NudlError::not_found(format!(
            "function group `{}` has no overloads",
            group.name()
        )));
    }

    let mut best: Option<Candidate> = None;
    let mut rejections = Vec::new();
    for function in &functions {
        match match_candidate(function, positional, keyword, alloc) {
            Ok(candidate) => {
                if best.as_ref().is_none_or(|b| candidate.score < b.score) {
                    best = Some(candidate);
                }
            }
            Err(err) => rejections.push(err.to_string()),
        }
    }

    let winner = best.ok_or_else(|| {
        NudlError::invalid_argument(format!(
            "no overload of `{}` matches the given arguments: {}",
            group.name(),
            rejections.join("; ")
        ))
    })?;

    let result_type = winner
        .function
        .result_type()
        .ok_or_else(|| NudlError::failed_precondition("candidate function has no result type"))?;
    let rebuilt_result = winner.rebinder.rebuild_type(&result_type, alloc)?;

    if !winner.function.is_abstract() {
        return Ok(FunctionBinding {
            target: Some(Rc::clone(&winner.function)),
            bound_type: winner.function.function_type(alloc)?,
        });
    }

    let mut components = winner.component_types;
    components.push(rebuilt_result);
    let bound_type = winner.rebinder.rebuild_function_with_components(
        &winner.function.function_type(alloc)?,
        &components,
        alloc,
    )?;
    let instance = winner.function.instantiate(&bound_type)?;
    group.add_instance(Rc::clone(&instance));

    Ok(FunctionBinding {
        target: Some(instance),
        bound_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nudl_binder::var_base::VarKind;
    use nudl_binder::VarBase;
    use nudl_types::ScopeName;

    fn arg(name: &str, ty: TypeSpec) -> crate::function::Argument {
        crate::function::Argument::new(VarBase::new(
            VarKind::Argument,
            name,
            Rc::new(ScopeName::empty()),
            ty,
        ))
    }

    #[test]
    fn an_exact_match_scores_zero_and_returns_the_same_function() {
        let alloc = TypeIdAllocator::new();
        let int = TypeSpec::builtin_base(TypeId::Int);
        let group = FunctionGroup::new("f", Rc::new(ScopeName::empty()));
        let f = Function::new(
            "f",
            Rc::new(ScopeName::empty()),
            vec![arg("x", int.clone())],
            Some(int.clone()),
        );
        group.add_function(Rc::clone(&f));
        let binding = resolve_overload(&group, &[int], &[], &alloc).unwrap();
        assert!(Rc::ptr_eq(&binding.target().unwrap(), &f));
    }

    #[test]
    fn a_generic_function_instantiates_a_concrete_binding() {
        let alloc = TypeIdAllocator::new();
        let numeric = TypeSpec::builtin_base(TypeId::Numeric);
        let t = TypeSpec::local_type_variable("T", Some(numeric));
        let group = FunctionGroup::new("identity", Rc::new(ScopeName::empty()));
        let f = Function::new(
            "identity",
            Rc::new(ScopeName::empty()),
            vec![arg("x", t.clone())],
            Some(t),
        );
        group.add_function(f);
        let int = TypeSpec::builtin_base(TypeId::Int);
        let binding = resolve_overload(&group, &[int.clone()], &[], &alloc).unwrap();
        assert!(binding.result_type().is_equal(&int));
        assert_eq!(group.instances().len(), 1);
    }

    #[test]
    fn a_missing_required_argument_is_rejected() {
        let alloc = TypeIdAllocator::new();
        let int = TypeSpec::builtin_base(TypeId::Int);
        let group = FunctionGroup::new("f", Rc::new(ScopeName::empty()));
        let f = Function::new(
            "f",
            Rc::new(ScopeName::empty()),
            vec![arg("x", int.clone())],
            Some(int),
        );
        group.add_function(f);
        assert!(resolve_overload(&group, &[], &[], &alloc).is_err());
    }

    #[test]
    fn overload_resolution_prefers_the_more_specific_declared_parameter() {
        let alloc = TypeIdAllocator::new();
        let numeric = TypeSpec::builtin_base(TypeId::Numeric);
        let int = TypeSpec::builtin_base(TypeId::Int);
        let group = FunctionGroup::new("describe", Rc::new(ScopeName::empty()));
        let general = Function::new(
            "describe",
            Rc::new(ScopeName::empty()),
            vec![arg("x", numeric)],
            Some(TypeSpec::builtin_base(TypeId::String)),
        );
        let specific = Function::new(
            "describe",
            Rc::new(ScopeName::empty()),
            vec![arg("x", int.clone())],
            Some(TypeSpec::builtin_base(TypeId::String)),
        );
        group.add_function(general);
        group.add_function(Rc::clone(&specific));
        let binding = resolve_overload(&group, &[int], &[], &alloc).unwrap();
        assert!(Rc::ptr_eq(&binding.target().unwrap(), &specific));
    }
}
