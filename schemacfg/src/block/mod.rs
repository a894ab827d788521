pub mod attribute;

use std::ops::Range;

use serde::Deserialize;

pub use crate::block::attribute::Attribute;
use crate::expression::Expression;

/// The contents of a document or of a block: attributes and nested blocks,
/// both in source order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Body {
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub blocks: Vec<Block>,
}

impl Body {
    pub fn new() -> Self {
        Body::default()
    }

    pub fn block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    pub fn attr(mut self, name: impl Into<String>, expr: Expression) -> Self {
        self.attributes.push(Attribute::new(name, expr));
        self
    }

    /// First attribute with the given name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

/// A typed, optionally labeled block, e.g. `table "users" { ... }`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Block {
    /// The block type name (`table`, `column`, `variable`, ...).
    #[serde(rename = "type")]
    pub kind: String,
    /// Labels in source order. The last one is the name; a preceding one
    /// qualifies it.
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(flatten)]
    pub body: Body,
    /// Byte span in source for error reporting.
    #[serde(default)]
    pub span: Range<usize>,
}

impl Block {
    pub fn new(kind: impl Into<String>) -> Self {
        Block {
            kind: kind.into(),
            labels: Vec::new(),
            body: Body::default(),
            span: 0..0,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, expr: Expression) -> Self {
        self.body.attributes.push(Attribute::new(name, expr));
        self
    }

    pub fn child(mut self, block: Block) -> Self {
        self.body.blocks.push(block);
        self
    }

    pub fn at(mut self, span: Range<usize>) -> Self {
        self.span = span;
        self
    }
}
