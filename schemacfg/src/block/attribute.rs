use std::ops::Range;

use serde::Deserialize;

use crate::expression::Expression;

/// A `name = expression` pair inside a body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub expr: Expression,
    #[serde(default)]
    pub span: Range<usize>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, expr: Expression) -> Self {
        Attribute {
            name: name.into(),
            expr,
            span: 0..0,
        }
    }

    pub fn at(mut self, span: Range<usize>) -> Self {
        self.span = span;
        self
    }
}
