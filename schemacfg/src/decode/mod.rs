//! Decoding of `variable` declaration blocks.
//!
//! ```text
//! variable "name" {
//!   type    = list(string)
//!   default = "a"
//! }
//! ```

pub mod error;

use std::fmt;
use std::ops::Range;

pub use error::DecodeError;

use crate::block::{Block, Body};
use crate::expression::Expression;

/// Block type of input variable declarations. These blocks are never
/// reachable by reference from the evaluation scope.
pub const VARIABLE_BLOCK: &str = "variable";

/// The declared type of an input variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    String,
    Number,
    Bool,
    Any,
    List(Box<TypeExpr>),
}

impl TypeExpr {
    /// Decode a type expression: a bare keyword (`string`, `number`, `int`,
    /// `bool`, `any`) or `list(<type>)`.
    pub fn decode(expr: &Expression, span: &Range<usize>, file_id: usize) -> Result<Self, DecodeError> {
        match expr {
            Expression::Traversal(parts) if parts.len() == 1 => match parts[0].as_str() {
                "string" => Ok(TypeExpr::String),
                "number" | "int" => Ok(TypeExpr::Number),
                "bool" => Ok(TypeExpr::Bool),
                "any" => Ok(TypeExpr::Any),
                other => Err(DecodeError::new(
                    format!("unknown type keyword \"{}\"", other),
                    span.clone(),
                    file_id,
                )
                .with_note("expected one of: string, number, int, bool, any, list(<type>)")),
            },
            Expression::Call { name, args } if name == "list" => match args.as_slice() {
                [element] => Ok(TypeExpr::List(Box::new(TypeExpr::decode(
                    element, span, file_id,
                )?))),
                _ => Err(DecodeError::new(
                    format!("list type takes exactly one argument, got {}", args.len()),
                    span.clone(),
                    file_id,
                )),
            },
            other => Err(DecodeError::new(
                format!("invalid type specification: {}", other),
                span.clone(),
                file_id,
            )),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::String => write!(f, "string"),
            TypeExpr::Number => write!(f, "number"),
            TypeExpr::Bool => write!(f, "bool"),
            TypeExpr::Any => write!(f, "any"),
            TypeExpr::List(element) => write!(f, "list({})", element),
        }
    }
}

/// A decoded `variable` block.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub default: Option<Expression>,
    pub span: Range<usize>,
}

/// Decode every root-level `variable` block in `body`. Other blocks and
/// attributes are left alone.
///
/// All malformed declarations are reported, not just the first.
pub fn decode_variables(body: &Body, file_id: usize) -> Result<Vec<VariableDecl>, Vec<DecodeError>> {
    let mut decls = Vec::new();
    let mut errors = Vec::new();
    for block in body.blocks.iter().filter(|b| b.kind == VARIABLE_BLOCK) {
        match decode_variable(block, file_id) {
            Ok(decl) => decls.push(decl),
            Err(mut errs) => errors.append(&mut errs),
        }
    }
    if errors.is_empty() {
        Ok(decls)
    } else {
        Err(errors)
    }
}

fn decode_variable(block: &Block, file_id: usize) -> Result<VariableDecl, Vec<DecodeError>> {
    let mut errors = Vec::new();

    let name = match block.labels.as_slice() {
        [name] => Some(name.clone()),
        labels => {
            errors.push(
                DecodeError::new(
                    format!(
                        "variable block requires exactly one label, got {}",
                        labels.len()
                    ),
                    block.span.clone(),
                    file_id,
                )
                .with_note("the label is the variable name: variable \"name\" { ... }"),
            );
            None
        }
    };

    for nested in &block.body.blocks {
        errors.push(DecodeError::new(
            format!("unexpected \"{}\" block in variable declaration", nested.kind),
            nested.span.clone(),
            file_id,
        ));
    }

    let mut ty = None;
    let mut default = None;
    for attr in &block.body.attributes {
        match attr.name.as_str() {
            "type" => match TypeExpr::decode(&attr.expr, &attr.span, file_id) {
                Ok(t) => ty = Some(t),
                Err(e) => errors.push(e),
            },
            "default" => default = Some(attr.expr.clone()),
            other => errors.push(
                DecodeError::new(
                    format!("unsupported argument \"{}\" in variable declaration", other),
                    attr.span.clone(),
                    file_id,
                )
                .with_note("only \"type\" and \"default\" are allowed"),
            ),
        }
    }
    if block.body.attribute("type").is_none() {
        errors.push(DecodeError::new(
            "missing required argument \"type\" in variable declaration",
            block.span.clone(),
            file_id,
        ));
    }

    match (name, ty) {
        (Some(name), Some(ty)) if errors.is_empty() => Ok(VariableDecl {
            name,
            ty,
            default,
            span: block.span.clone(),
        }),
        _ => Err(errors),
    }
}
