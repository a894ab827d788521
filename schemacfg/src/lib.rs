pub mod block;
pub mod decode;
pub mod expression;

use serde::Deserialize;

use crate::block::Body;

/// A configuration document handed over by the parser.
///
/// The tree is what the evaluator consumes. `source` is optional and only
/// used to render diagnostics with excerpts; spans in the tree point into it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Document {
    /// Display name of the source (usually a file path).
    #[serde(default)]
    pub source_name: Option<String>,
    /// Original text the spans refer to, if the producer kept it.
    #[serde(default)]
    pub source: Option<String>,
    /// Root attributes and blocks.
    #[serde(flatten)]
    pub body: Body,
    /// The source file ID (for error reporting with codespan-reporting).
    #[serde(skip)]
    pub source_id: usize,
}

impl Document {
    pub fn new(body: Body) -> Self {
        Document {
            body,
            ..Document::default()
        }
    }
}
