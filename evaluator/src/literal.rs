//! Opaque literal values.
//!
//! Attribute literals are captured in their exact source spelling so that
//! formatting and precision survive (`1.50` stays `1.50`, `"int"` keeps its
//! quotes). The value algebra treats them as foreign: the only way to read one
//! is the string coercion registered in [`TypeRegistry::new`].

use std::collections::BTreeMap;
use std::fmt;

use schemacfg::expression::Expression;

use crate::convert::{ConversionError, TypeRegistry};
use crate::value::{Type, Value};

/// Discriminant of an opaque value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpaqueTag {
    Literal,
}

impl fmt::Display for OpaqueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpaqueTag::Literal => write!(f, "lit"),
        }
    }
}

/// The type of captured attribute literals.
pub const LITERAL_TYPE: Type = Type::Opaque(OpaqueTag::Literal);

/// A tagged foreign value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opaque {
    tag: OpaqueTag,
    raw: String,
}

impl Opaque {
    pub fn literal(raw: impl Into<String>) -> Self {
        Opaque {
            tag: OpaqueTag::Literal,
            raw: raw.into(),
        }
    }

    pub fn tag(&self) -> OpaqueTag {
        self.tag
    }

    /// The captured source text.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Read a literal as a string: un-quoted when the text is a valid quoted
/// string, verbatim otherwise.
pub(crate) fn literal_as_string(opaque: &Opaque) -> Result<Value, ConversionError> {
    Ok(Value::String(
        unquote(&opaque.raw).unwrap_or_else(|| opaque.raw.clone()),
    ))
}

pub(crate) fn register(types: &mut TypeRegistry) {
    types.register(OpaqueTag::Literal, Type::String, literal_as_string);
}

/// Remove the quotes around a string literal and resolve its escapes.
///
/// Accepts `"..."` with backslash escapes, `` `...` `` raw strings and
/// single-character `'c'` literals. Returns `None` for anything else.
pub fn unquote(raw: &str) -> Option<String> {
    let quote = raw.chars().next().filter(|c| matches!(c, '"' | '`' | '\''))?;
    if raw.len() < 2 || !raw.ends_with(quote) {
        return None;
    }
    let inner = &raw[1..raw.len() - 1];
    match quote {
        '`' => (!inner.contains('`')).then(|| inner.replace('\r', "")),
        '"' => unescape(inner, '"'),
        '\'' => {
            let s = unescape(inner, '\'')?;
            (s.chars().count() == 1).then_some(s)
        }
        _ => None,
    }
}

fn unescape(inner: &str, quote: char) -> Option<String> {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == quote || c == '\n' {
            return None;
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = match chars.next()? {
            'a' => '\u{7}',
            'b' => '\u{8}',
            'f' => '\u{c}',
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            'v' => '\u{b}',
            '\\' => '\\',
            c if c == quote => c,
            'x' => hex_char(&mut chars, 2).filter(char::is_ascii)?,
            'u' => hex_char(&mut chars, 4)?,
            'U' => hex_char(&mut chars, 8)?,
            d @ '0'..='7' => {
                let mut code = d.to_digit(8)?;
                for _ in 0..2 {
                    code = code * 8 + chars.next()?.to_digit(8)?;
                }
                char::from_u32(code).filter(char::is_ascii)?
            }
            _ => return None,
        };
        out.push(escaped);
    }
    Some(out)
}

fn hex_char(chars: &mut std::str::Chars<'_>, digits: usize) -> Option<char> {
    let mut code = 0u32;
    for _ in 0..digits {
        code = code * 16 + chars.next()?.to_digit(16)?;
    }
    char::from_u32(code)
}

/// Why a constant expression could not be turned into a value.
#[derive(Debug, Clone, PartialEq)]
pub struct LiteralError(pub String);

/// Decode the raw text of a scalar literal.
pub fn decode_literal(raw: &str) -> Result<Value, LiteralError> {
    let raw = raw.trim();
    match raw {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        "null" => return Ok(Value::Null(Type::Any)),
        _ => {}
    }
    if raw.starts_with(['"', '`', '\'']) {
        return unquote(raw)
            .map(Value::String)
            .ok_or_else(|| LiteralError(format!("invalid string literal {}", raw)));
    }
    raw.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(Value::Number)
        .ok_or_else(|| LiteralError(format!("invalid literal {}", raw)))
}

/// Decode a constant expression: literals, tuples and objects of constants.
pub fn decode_value(expr: &Expression) -> Result<Value, LiteralError> {
    match expr {
        Expression::Literal(raw) => decode_literal(raw),
        Expression::Tuple(items) => Ok(Value::list(
            items.iter().map(decode_value).collect::<Result<_, _>>()?,
        )),
        Expression::Object(fields) => Ok(Value::Object(
            fields
                .iter()
                .map(|(name, expr)| Ok((name.clone(), decode_value(expr)?)))
                .collect::<Result<BTreeMap<_, _>, _>>()?,
        )),
        Expression::Traversal(_) | Expression::Call { .. } => Err(LiteralError(format!(
            "{} is not a constant value; references and function calls are not allowed here",
            expr
        ))),
    }
}
