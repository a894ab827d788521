use std::ops::Range;

use schemacfg::decode::DecodeError;
use thiserror::Error;

use crate::convert::ConversionError;

/// Failures of a scope-building or variable-resolution pass. A pass that
/// fails commits nothing to the context.
#[derive(Debug, Error)]
pub enum Error {
    /// A declared variable has neither an override nor a default.
    #[error("missing value for required variable \"{name}\"")]
    MissingVariable { name: String, span: Range<usize> },

    /// The resolved value does not convert to the declared type.
    #[error("variable \"{name}\": {source}")]
    VariableConversion {
        name: String,
        #[source]
        source: ConversionError,
        span: Range<usize>,
    },

    /// Malformed variable declarations.
    #[error("{}", join_messages(.errors))]
    Decode { errors: Vec<DecodeError> },

    /// The scope builder met a block type the schema registry does not
    /// describe at that nesting path.
    #[error("block type \"{kind}\" is not described by the schema registry")]
    UnknownBlockType { kind: String, span: Range<usize> },
}

fn join_messages(errors: &[DecodeError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Source location of the failure, when there is a single one.
    pub fn span(&self) -> Option<Range<usize>> {
        match self {
            Error::MissingVariable { span, .. }
            | Error::VariableConversion { span, .. }
            | Error::UnknownBlockType { span, .. } => Some(span.clone()),
            Error::Decode { errors } => match errors.as_slice() {
                [single] => Some(single.span.clone()),
                _ => None,
            },
        }
    }
}

impl From<Vec<DecodeError>> for Error {
    fn from(errors: Vec<DecodeError>) -> Self {
        Error::Decode { errors }
    }
}

/// Result type alias for evaluation passes.
pub type Result<T> = std::result::Result<T, Error>;
