//! Evaluation context construction for schema configuration documents.
//!
//! ```text
//! Body ──► SchemaRegistry ──► ScopeBuilder ──► EvalContext { table, column, ... }
//!   │                                               ▲
//!   └──► variable blocks ──► resolve_input_variables┘  (under `var`)
//! ```

pub mod context;
pub mod convert;
pub mod error;
pub mod literal;
pub mod registry;
pub mod scope;
pub mod value;
pub mod variables;

pub use context::{EvalContext, VAR_NAMESPACE};
pub use convert::{ConversionError, TypeRegistry, convert};
pub use error::{Error, Result};
pub use literal::{LITERAL_TYPE, Opaque, OpaqueTag};
pub use registry::{REF_ATTR, SchemaRegistry};
pub use scope::{ScopeBuilder, build_scope};
pub use value::{Type, Value};
pub use variables::{resolve_input_variables, resolve_input_variables_in};

use std::collections::BTreeMap;

use schemacfg::Document;

/// Evaluate a document into `ctx`: resolve its input variables, then bind
/// its blocks.
pub fn evaluate_document(
    ctx: &mut EvalContext,
    document: &Document,
    overrides: &BTreeMap<String, Value>,
) -> Result<()> {
    resolve_input_variables_in(ctx, &document.body, document.source_id, overrides)?;
    build_scope(ctx, &document.body)
}
