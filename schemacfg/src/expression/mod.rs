use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

/// An attribute expression as produced by the parser.
///
/// Only literal-shaped expressions are ever evaluated by the core; the other
/// forms exist so declarations such as `type = list(string)` can be decoded.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    /// A scalar literal in its exact source spelling: `"text"`, `42`,
    /// `1.50`, `true`, `null`.
    Literal(String),
    /// `[a, b, c]`
    Tuple(Vec<Expression>),
    /// `{ key = value }`
    Object(BTreeMap<String, Expression>),
    /// A dotted reference such as `var.name`, or a bare keyword like `string`.
    Traversal(Vec<String>),
    /// A function-call form such as `list(string)`.
    Call { name: String, args: Vec<Expression> },
}

impl Expression {
    pub fn literal(raw: impl Into<String>) -> Self {
        Expression::Literal(raw.into())
    }

    /// A double-quoted string literal holding `text`.
    pub fn string(text: &str) -> Self {
        Expression::Literal(quote(text))
    }

    pub fn keyword(name: impl Into<String>) -> Self {
        Expression::Traversal(vec![name.into()])
    }

    pub fn traversal<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Expression::Traversal(parts.into_iter().map(Into::into).collect())
    }

    pub fn call(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Call {
            name: name.into(),
            args,
        }
    }

    /// The raw source text if this is a scalar literal.
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Expression::Literal(raw) => Some(raw),
            _ => None,
        }
    }
}

/// Quote `text` as a double-quoted literal, escaping what the unquoting side
/// expects to be escaped.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Literal(raw) => write!(f, "{}", raw),
            Expression::Tuple(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Expression::Object(fields) => {
                write!(f, "{{")?;
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {} = {}", key, value)?;
                }
                write!(f, " }}")
            }
            Expression::Traversal(parts) => write!(f, "{}", parts.join(".")),
            Expression::Call { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_escapes_specials() {
        assert_eq!(quote("int"), "\"int\"");
        assert_eq!(quote("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
        assert_eq!(quote("\u{1}"), "\"\\u0001\"");
    }

    #[test]
    fn display_type_expression() {
        let expr = Expression::call("list", vec![Expression::keyword("string")]);
        assert_eq!(expr.to_string(), "list(string)");
        assert_eq!(Expression::traversal(["var", "name"]).to_string(), "var.name");
    }

    #[test]
    fn deserialize_tagged_forms() {
        #[derive(Deserialize)]
        struct Holder {
            a: Expression,
            b: Expression,
        }
        let holder: Holder = toml::from_str(
            r#"
            a = { literal = '"int"' }
            b = { call = { name = "list", args = [{ traversal = ["string"] }] } }
            "#,
        )
        .unwrap();
        assert_eq!(holder.a, Expression::string("int"));
        assert_eq!(
            holder.b,
            Expression::call("list", vec![Expression::keyword("string")])
        );
    }
}
