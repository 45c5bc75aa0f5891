//! Translates one analyzed [`Expression`] into Python source text.
//!
//! Grounded on the statement/expression split in `tsz-emitter/src/emitter/
//! expressions.rs` and `.../declarations.rs`: a node used for its value
//! (an array literal, a call, an operand of another expression) goes
//! through [`emit_value`]; a node used for its side effect at a statement
//! position goes through [`emit_statement`]. The one piece this emitter
//! needs that a 1:1 AST-to-AST translator wouldn't is a tail-position
//! rewrite (`emit_tail`): NuDL's `If`/`Block` are expressions whose value
//! is their last branch's value (spec §4.6), but Python has no expression
//! form for a multi-branch conditional, so a function body's implicit tail
//! return is lowered into an explicit `if/elif/else` of `return` statements
//! instead of a ternary chain.

use std::rc::Rc;

use nudl_common::{CompilerOptions, NudlError, NudlResult};
use nudl_types::named_object::NamedObject;
use nudl_types::TypeId;

use nudl_checker::expression::{ExitKind, IdentifierTarget, TupleElement};
use nudl_checker::{Expression, ExpressionKind, Function};

use crate::emit_context::EmitState;
use crate::functions::python_function_name;
use crate::identifiers::rename_identifier;
use crate::types::type_annotation;

/// Renders `expr` as a Python expression (usable wherever a value is
/// expected: an operand, an argument, an array element).
pub fn emit_value(expr: &Expression, state: &mut EmitState, options: &CompilerOptions) -> NudlResult<String> {
    match expr.kind() {
        ExpressionKind::Literal { build_type, lexeme } => Ok(literal_text(build_type.type_id(), lexeme)),
        ExpressionKind::Identifier { target } => identifier_text(target, state, options),
        ExpressionKind::EmptyStruct => empty_struct_text(expr),
        ExpressionKind::ArrayDef { elements } => {
            let parts = emit_all(elements, state, options)?;
            Ok(format!("[{}]", parts.join(", ")))
        }
        ExpressionKind::MapDef { entries } => {
            let mut parts = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                parts.push(format!("{}: {}", emit_value(k, state, options)?, emit_value(v, state, options)?));
            }
            Ok(format!("{{{}}}", parts.join(", ")))
        }
        ExpressionKind::TupleDef { elements } => tuple_text(elements, state, options),
        ExpressionKind::Index { collection, index } => {
            Ok(format!(
                "{}[{}]",
                emit_value(collection, state, options)?,
                emit_value(index, state, options)?
            ))
        }
        ExpressionKind::TupleIndex { tuple, index } => {
            Ok(format!("{}[{index}]", emit_value(tuple, state, options)?))
        }
        ExpressionKind::DotAccess { base, member } => Ok(format!(
            "{}.{}",
            emit_value(base, state, options)?,
            rename_identifier(member, false)
        )),
        ExpressionKind::FunctionCall { positional, keyword, resolved_callee, .. } => {
            call_text(positional, keyword, resolved_callee, state, options)
        }
        ExpressionKind::Lambda { function } => lambda_text(function, state, options),
        ExpressionKind::If { .. } | ExpressionKind::Block { .. } => {
            // A branching/compound value used inline (e.g. as a call
            // argument) rather than in tail position: only representable
            // when every branch is itself a single plain value, since
            // Python's conditional expression takes no statements.
            conditional_expression_text(expr, state, options)
        }
        ExpressionKind::Assignment { .. }
        | ExpressionKind::Import { .. }
        | ExpressionKind::FunctionDefinition { .. }
        | ExpressionKind::SchemaDefinition { .. }
        | ExpressionKind::TypeDefinition { .. }
        | ExpressionKind::NoOp => Ok("None".to_string()),
        ExpressionKind::FunctionResult { kind, value } => match (kind, value) {
            (ExitKind::Pass, _) => Ok("None".to_string()),
            (_, Some(value)) => emit_value(value, state, options),
            (_, None) => Ok("None".to_string()),
        },
    }
}

fn emit_all(exprs: &[Rc<Expression>], state: &mut EmitState, options: &CompilerOptions) -> NudlResult<Vec<String>> {
    exprs.iter().map(|e| emit_value(e, state, options)).collect()
}

fn literal_text(type_id: TypeId, lexeme: &str) -> String {
    match type_id {
        TypeId::Bool => match lexeme.trim() {
            "true" | "True" => "True".to_string(),
            "false" | "False" => "False".to_string(),
            other => other.to_string(),
        },
        TypeId::Null => "None".to_string(),
        _ => lexeme.to_string(),
    }
}

fn identifier_text(target: &IdentifierTarget, state: &mut EmitState, options: &CompilerOptions) -> NudlResult<String> {
    match target {
        IdentifierTarget::Var(var) => Ok(rename_identifier(var.name(), false)),
        IdentifierTarget::Function(group) => Ok(rename_identifier(group.name(), false)),
        IdentifierTarget::Type(ty) => type_annotation(ty, options.short_proto_output, state),
    }
}

fn empty_struct_text(expr: &Expression) -> NudlResult<String> {
    let cached = expr.cached_type().ok_or_else(|| {
        NudlError::internal("EmptyStruct reached the emitter without a negotiated type")
    })?;
    Ok(match cached.type_id() {
        TypeId::Array => "[]".to_string(),
        TypeId::Set => "set()".to_string(),
        TypeId::Map => "{}".to_string(),
        TypeId::Tuple => "()".to_string(),
        other => {
            return Err(NudlError::internal(format!(
                "EmptyStruct negotiated to unexpected type id {other:?}"
            )))
        }
    })
}

/// NuDL named-tuple slot names have no Python tuple-literal equivalent;
/// they're dropped, keeping just the positional values (documented in
/// `DESIGN.md`).
fn tuple_text(elements: &[TupleElement], state: &mut EmitState, options: &CompilerOptions) -> NudlResult<String> {
    let mut parts = Vec::with_capacity(elements.len());
    for element in elements {
        parts.push(emit_value(&element.value, state, options)?);
    }
    if parts.len() == 1 {
        Ok(format!("({},)", parts[0]))
    } else {
        Ok(format!("({})", parts.join(", ")))
    }
}

fn call_text(
    positional: &[Rc<Expression>],
    keyword: &[(String, Rc<Expression>)],
    resolved_callee: &std::cell::RefCell<Option<Rc<Function>>>,
    state: &mut EmitState,
    options: &CompilerOptions,
) -> NudlResult<String> {
    let callee = resolved_callee.borrow().clone().ok_or_else(|| {
        NudlError::internal("FunctionCall reached the emitter without a resolved callee")
    })?;
    let name = python_function_name(&callee);
    // A call-site instantiation of a generic (spec §4.7) has no `def` of
    // its own anywhere in module scope; the first call site to reach it
    // renders one into `state`'s instance buffer.
    if callee.binding_parent().is_some() && state.mark_function_seen(&callee) {
        let rendered = crate::functions::render_instance_def(&callee, state, options)?;
        state.push_instance_def(rendered);
    }
    let mut parts = emit_all(positional, state, options)?;
    for (kw_name, value) in keyword {
        parts.push(format!("{}={}", rename_identifier(kw_name, false), emit_value(value, state, options)?));
    }
    Ok(format!("{name}({})", parts.join(", ")))
}

fn lambda_text(function: &Rc<Function>, state: &mut EmitState, options: &CompilerOptions) -> NudlResult<String> {
    let body = function.body().ok_or_else(|| {
        NudlError::internal(format!("lambda `{}` has no body", function.name()))
    })?;
    let args: Vec<String> = function
        .arguments()
        .iter()
        .map(|a| rename_identifier(a.name(), false))
        .collect();
    let single_expr = single_tail_expression(&body);
    match single_expr {
        Some(expr) => Ok(format!("lambda {}: {}", args.join(", "), emit_value(&expr, state, options)?)),
        None => Err(NudlError::unimplemented(format!(
            "lambda `{}` has a multi-statement body; Python lambdas can't express one",
            function.name()
        ))),
    }
}

/// If `expr` (a lambda or function body) reduces to exactly one value-
/// producing tail expression with no preceding statements, returns it.
fn single_tail_expression(expr: &Rc<Expression>) -> Option<Rc<Expression>> {
    match expr.kind() {
        ExpressionKind::Block { children } if children.len() == 1 => single_tail_expression(&children[0]),
        ExpressionKind::Block { .. } => None,
        ExpressionKind::FunctionResult { kind: ExitKind::Return, value: Some(v) } => Some(Rc::clone(v)),
        ExpressionKind::If { .. } => Some(Rc::clone(expr)),
        ExpressionKind::FunctionResult { .. } | ExpressionKind::Assignment { .. } => None,
        _ => Some(Rc::clone(expr)),
    }
}

/// Renders an `If`/`Block` used inline as a ternary chain. Fails (rather
/// than silently dropping side effects) the moment a branch isn't itself a
/// single value.
fn conditional_expression_text(expr: &Expression, state: &mut EmitState, options: &CompilerOptions) -> NudlResult<String> {
    match expr.kind() {
        ExpressionKind::Block { children } if children.len() == 1 => emit_value(&children[0], state, options),
        ExpressionKind::Block { .. } => Err(NudlError::unimplemented(
            "a multi-statement block used inline has no Python expression form",
        )),
        ExpressionKind::If { branches, else_branch } => {
            let else_text = match else_branch {
                Some(e) => emit_value(e, state, options)?,
                None => "None".to_string(),
            };
            let mut rendered = else_text;
            for (condition, body) in branches.iter().rev() {
                let cond_text = emit_value(condition, state, options)?;
                let body_text = emit_value(body, state, options)?;
                rendered = format!("({body_text} if {cond_text} else {rendered})");
            }
            Ok(rendered)
        }
        _ => emit_value(expr, state, options),
    }
}

/// Emits `expr` as a standalone statement (a bare expression statement,
/// or the direct statement form of a statement-shaped node).
pub fn emit_statement(expr: &Expression, state: &mut EmitState, options: &CompilerOptions) -> NudlResult<()> {
    match expr.kind() {
        ExpressionKind::Assignment { var, value } => {
            let value_text = emit_value(value, state, options)?;
            state.write_line(&format!("{} = {value_text}", rename_identifier(var.name(), false)));
            Ok(())
        }
        ExpressionKind::If { branches, else_branch } => {
            for (i, (condition, body)) in branches.iter().enumerate() {
                let cond_text = emit_value(condition, state, options)?;
                let keyword = if i == 0 { "if" } else { "elif" };
                state.write_line(&format!("{keyword} {cond_text}:"));
                state.indent();
                emit_body_statements(body, state, options)?;
                state.dedent();
            }
            if let Some(body) = else_branch {
                state.write_line("else:");
                state.indent();
                emit_body_statements(body, state, options)?;
                state.dedent();
            }
            Ok(())
        }
        ExpressionKind::Block { children } => {
            if children.is_empty() {
                state.write_line("pass");
                return Ok(());
            }
            for child in children {
                emit_statement(child, state, options)?;
            }
            Ok(())
        }
        ExpressionKind::FunctionResult { kind, value } => {
            match kind {
                ExitKind::Pass => state.write_line("pass"),
                ExitKind::Return => {
                    let text = match value {
                        Some(v) => format!("return {}", emit_value(v, state, options)?),
                        None => "return".to_string(),
                    };
                    state.write_line(&text);
                }
                ExitKind::Yield => {
                    let text = match value {
                        Some(v) => format!("yield {}", emit_value(v, state, options)?),
                        None => "yield".to_string(),
                    };
                    state.write_line(&text);
                }
            }
            Ok(())
        }
        ExpressionKind::FunctionDefinition { function } => crate::functions::emit_nested_function(function, state, options),
        ExpressionKind::Import { .. }
        | ExpressionKind::SchemaDefinition { .. }
        | ExpressionKind::TypeDefinition { .. }
        | ExpressionKind::NoOp => Ok(()),
        _ => {
            let text = emit_value(expr, state, options)?;
            state.write_line(&text);
            Ok(())
        }
    }
}

/// Emits the body of an `if`/`elif`/`else` branch: a `Block`'s children
/// each as their own statement, or a bare single statement if the branch
/// wasn't itself a block.
fn emit_body_statements(body: &Expression, state: &mut EmitState, options: &CompilerOptions) -> NudlResult<()> {
    match body.kind() {
        ExpressionKind::Block { children } if children.is_empty() => {
            state.write_line("pass");
            Ok(())
        }
        _ => emit_statement(body, state, options),
    }
}

/// Emits `body` (a function's top-level `Block`) with its last child
/// rewritten into an explicit `return`/`yield`, recursing through `If` so
/// every leaf branch gets its own return (spec §4.6's implicit tail
/// return, lowered since Python has no multi-branch conditional
/// expression).
pub fn emit_tail(body: &Expression, state: &mut EmitState, options: &CompilerOptions) -> NudlResult<()> {
    match body.kind() {
        ExpressionKind::Block { children } => {
            if children.is_empty() {
                state.write_line("pass");
                return Ok(());
            }
            for child in &children[..children.len() - 1] {
                emit_statement(child, state, options)?;
            }
            emit_tail(&children[children.len() - 1], state, options)
        }
        ExpressionKind::If { branches, else_branch } => {
            for (i, (condition, body)) in branches.iter().enumerate() {
                let cond_text = emit_value(condition, state, options)?;
                let keyword = if i == 0 { "if" } else { "elif" };
                state.write_line(&format!("{keyword} {cond_text}:"));
                state.indent();
                emit_tail(body, state, options)?;
                state.dedent();
            }
            state.write_line("else:");
            state.indent();
            match else_branch {
                Some(body) => emit_tail(body, state, options)?,
                None => state.write_line("return None"),
            }
            state.dedent();
            Ok(())
        }
        ExpressionKind::FunctionResult { .. } | ExpressionKind::Assignment { .. } => {
            emit_statement(body, state, options)
        }
        ExpressionKind::Import { .. }
        | ExpressionKind::FunctionDefinition { .. }
        | ExpressionKind::SchemaDefinition { .. }
        | ExpressionKind::TypeDefinition { .. }
        | ExpressionKind::NoOp => emit_statement(body, state, options),
        _ => {
            let text = emit_value(body, state, options)?;
            state.write_line(&format!("return {text}"));
            Ok(())
        }
    }
}
