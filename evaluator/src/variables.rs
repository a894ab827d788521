//! Input variable resolution.
//!
//! Documents declare their inputs with `variable` blocks. Each declaration
//! is bound to the caller's override, else to its default, converted to the
//! declared type and published under `var`.

use std::collections::BTreeMap;

use schemacfg::block::Body;
use schemacfg::decode::{DecodeError, TypeExpr, VariableDecl, decode_variables};

use crate::context::EvalContext;
use crate::convert::convert;
use crate::error::{Error, Result};
use crate::literal::decode_value;
use crate::value::{Type, Value};

/// Resolve the variables declared in `body` and merge them into the `var`
/// namespace of `ctx`.
///
/// Either every declaration resolves and all of them are published, or the
/// first failure is returned and the context is left untouched.
pub fn resolve_input_variables(
    ctx: &mut EvalContext,
    body: &Body,
    overrides: &BTreeMap<String, Value>,
) -> Result<()> {
    resolve_input_variables_in(ctx, body, 0, overrides)
}

/// Like [`resolve_input_variables`], attributing decode errors to the
/// source `file_id`.
pub fn resolve_input_variables_in(
    ctx: &mut EvalContext,
    body: &Body,
    file_id: usize,
    overrides: &BTreeMap<String, Value>,
) -> Result<()> {
    let decls = decode_variables(body, file_id)?;
    let mut resolved = BTreeMap::new();
    for decl in &decls {
        let value = resolve(ctx, decl, file_id, overrides)?;
        log::debug!("var.{} = {}", decl.name, value);
        resolved.insert(decl.name.clone(), value);
    }
    ctx.merge_input_variables(resolved);
    Ok(())
}

fn resolve(
    ctx: &EvalContext,
    decl: &VariableDecl,
    file_id: usize,
    overrides: &BTreeMap<String, Value>,
) -> Result<Value> {
    let value = match (overrides.get(&decl.name), &decl.default) {
        (Some(value), _) => value.clone(),
        (None, Some(default)) => decode_value(default).map_err(|e| {
            Error::from(vec![DecodeError::new(
                format!("invalid default for variable \"{}\": {}", decl.name, e.0),
                decl.span.clone(),
                file_id,
            )])
        })?,
        (None, None) => {
            return Err(Error::MissingVariable {
                name: decl.name.clone(),
                span: decl.span.clone(),
            });
        }
    };

    let ty = declared_type(&decl.ty);
    // A scalar given for a list of that scalar is promoted to a one-element
    // list, since callers may not know the declared type.
    let value = match ty.element_type() {
        Some(element) if value.ty() == *element => Value::List {
            element: element.clone(),
            items: vec![value],
        },
        _ => value,
    };

    convert(ctx.types(), value, &ty).map_err(|source| Error::VariableConversion {
        name: decl.name.clone(),
        source,
        span: decl.span.clone(),
    })
}

/// The value type a declared type expression denotes.
pub fn declared_type(ty: &TypeExpr) -> Type {
    match ty {
        TypeExpr::String => Type::String,
        TypeExpr::Number => Type::Number,
        TypeExpr::Bool => Type::Bool,
        TypeExpr::Any => Type::Any,
        TypeExpr::List(element) => Type::list(declared_type(element)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemacfg::block::Block;
    use schemacfg::decode::VARIABLE_BLOCK;
    use schemacfg::expression::Expression;

    fn overrides(entries: &[(&str, Value)]) -> BTreeMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn variable(name: &str, ty: Expression) -> Block {
        Block::new(VARIABLE_BLOCK).label(name).attr("type", ty)
    }

    fn list_of(ty: &str) -> Expression {
        Expression::call("list", vec![Expression::keyword(ty)])
    }

    #[test]
    fn default_is_used_without_override() {
        let body = Body::new().block(
            variable("x", Expression::keyword("string")).attr("default", Expression::string("a")),
        );
        let mut ctx = EvalContext::new();
        resolve_input_variables(&mut ctx, &body, &BTreeMap::new()).unwrap();
        assert_eq!(ctx.input_variable("x"), Some(&Value::string("a")));
    }

    #[test]
    fn override_wins_over_default() {
        let body = Body::new().block(
            variable("x", Expression::keyword("string")).attr("default", Expression::string("a")),
        );
        let mut ctx = EvalContext::new();
        resolve_input_variables(&mut ctx, &body, &overrides(&[("x", Value::string("b"))]))
            .unwrap();
        assert_eq!(ctx.input_variable("x"), Some(&Value::string("b")));
    }

    #[test]
    fn scalar_is_promoted_to_list() {
        let body = Body::new().block(variable("x", list_of("string")));
        let mut ctx = EvalContext::new();
        resolve_input_variables(&mut ctx, &body, &overrides(&[("x", Value::string("c"))]))
            .unwrap();
        assert_eq!(
            ctx.input_variable("x"),
            Some(&Value::List {
                element: Type::String,
                items: vec![Value::string("c")],
            })
        );
    }

    #[test]
    fn scalar_of_another_type_is_not_promoted() {
        let body = Body::new().block(variable("x", list_of("number")));
        let mut ctx = EvalContext::new();
        let err = resolve_input_variables(&mut ctx, &body, &overrides(&[("x", Value::string("1"))]))
            .unwrap_err();
        assert!(matches!(err, Error::VariableConversion { .. }));
        assert_eq!(
            err.to_string(),
            "variable \"x\": list(number) required, got string"
        );
    }

    #[test]
    fn missing_required_variable() {
        let body = Body::new().block(variable("x", Expression::keyword("string")).at(3..9));
        let mut ctx = EvalContext::new();
        let err = resolve_input_variables(&mut ctx, &body, &BTreeMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "missing value for required variable \"x\"");
        assert_eq!(err.span(), Some(3..9));
    }

    #[test]
    fn failed_pass_commits_nothing() {
        let body = Body::new()
            .block(variable("a", Expression::keyword("string")).attr("default", Expression::string("ok")))
            .block(variable("b", Expression::keyword("number")));
        let mut ctx = EvalContext::new();
        assert!(resolve_input_variables(&mut ctx, &body, &BTreeMap::new()).is_err());
        assert!(ctx.get("var").is_none());
    }

    #[test]
    fn values_are_converted_to_the_declared_type() {
        let body = Body::new()
            .block(variable("port", Expression::keyword("int")))
            .block(variable("debug", Expression::keyword("bool")).attr("default", Expression::literal("false")))
            .block(variable("anything", Expression::keyword("any")));
        let mut ctx = EvalContext::new();
        let given = overrides(&[
            ("port", Value::string("5432")),
            ("anything", Value::Bool(true)),
        ]);
        resolve_input_variables(&mut ctx, &body, &given).unwrap();
        assert_eq!(ctx.input_variable("port"), Some(&Value::Number(5432.0)));
        assert_eq!(ctx.input_variable("debug"), Some(&Value::Bool(false)));
        assert_eq!(ctx.input_variable("anything"), Some(&Value::Bool(true)));
    }

    #[test]
    fn conversion_error_names_the_variable() {
        let body = Body::new().block(variable("port", Expression::keyword("number")));
        let mut ctx = EvalContext::new();
        let err = resolve_input_variables(&mut ctx, &body, &overrides(&[("port", Value::string("x"))]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "variable \"port\": a number is required, got \"x\""
        );
    }

    #[test]
    fn malformed_declarations_surface_decode_errors() {
        let body = Body::new().block(Block::new(VARIABLE_BLOCK).label("x"));
        let mut ctx = EvalContext::new();
        let err = resolve_input_variables(&mut ctx, &body, &BTreeMap::new()).unwrap_err();
        match err {
            Error::Decode { errors } => {
                assert_eq!(errors.len(), 1);
                assert!(errors[0].message.contains("\"type\""));
            }
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn non_constant_default_is_a_decode_error() {
        let body = Body::new().block(
            variable("x", Expression::keyword("string"))
                .attr("default", Expression::traversal(["var", "y"])),
        );
        let mut ctx = EvalContext::new();
        let err = resolve_input_variables(&mut ctx, &body, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        assert!(err.to_string().contains("invalid default for variable \"x\""));
    }

    #[test]
    fn passes_merge_into_one_namespace() {
        let doc_a = Body::new().block(variable("a", Expression::keyword("number")));
        let doc_b = Body::new().block(variable("b", Expression::keyword("number")));
        let mut ctx = EvalContext::new();
        resolve_input_variables(&mut ctx, &doc_a, &overrides(&[("a", Value::Number(1.0))])).unwrap();
        resolve_input_variables(&mut ctx, &doc_b, &overrides(&[("b", Value::Number(2.0))])).unwrap();
        assert_eq!(ctx.lookup("var.a"), Some(&Value::Number(1.0)));
        assert_eq!(ctx.lookup("var.b"), Some(&Value::Number(2.0)));

        resolve_input_variables(&mut ctx, &doc_a, &overrides(&[("a", Value::Number(2.0))])).unwrap();
        assert_eq!(ctx.lookup("var.a"), Some(&Value::Number(2.0)));
    }
}
