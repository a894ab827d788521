use std::collections::BTreeMap;
use std::fmt;

use crate::literal::{Opaque, OpaqueTag};

/// The type of a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    String,
    Number,
    Bool,
    List(Box<Type>),
    Object(BTreeMap<String, Type>),
    /// A foreign value only reachable through registered coercions.
    Opaque(OpaqueTag),
    /// Accepts any value; conversion to it is the identity.
    Any,
}

impl Type {
    pub fn list(element: Type) -> Self {
        Type::List(Box::new(element))
    }

    /// The element type of a list type.
    pub fn element_type(&self) -> Option<&Type> {
        match self {
            Type::List(element) => Some(element),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Type::List(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::String => write!(f, "string"),
            Type::Number => write!(f, "number"),
            Type::Bool => write!(f, "bool"),
            Type::List(element) => write!(f, "list({})", element),
            Type::Object(fields) => {
                write!(f, "object({{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {}", name, ty)?;
                }
                write!(f, "}})")
            }
            Type::Opaque(tag) => write!(f, "{}", tag),
            Type::Any => write!(f, "any"),
        }
    }
}

/// A value bound in the evaluation context.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent value of a known type.
    Null(Type),
    String(String),
    Number(f64),
    Bool(bool),
    List { element: Type, items: Vec<Value> },
    Object(BTreeMap<String, Value>),
    Opaque(Opaque),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// A list whose element type is taken from its items: the shared type if
    /// they all agree, `any` otherwise.
    pub fn list(items: Vec<Value>) -> Self {
        let element = match items.split_first() {
            Some((first, rest)) => {
                let ty = first.ty();
                if rest.iter().all(|v| v.ty() == ty) {
                    ty
                } else {
                    Type::Any
                }
            }
            None => Type::Any,
        };
        Value::List { element, items }
    }

    pub fn ty(&self) -> Type {
        match self {
            Value::Null(ty) => ty.clone(),
            Value::String(_) => Type::String,
            Value::Number(_) => Type::Number,
            Value::Bool(_) => Type::Bool,
            Value::List { element, .. } => Type::List(Box::new(element.clone())),
            Value::Object(fields) => Type::Object(
                fields
                    .iter()
                    .map(|(name, value)| (name.clone(), value.ty()))
                    .collect(),
            ),
            Value::Opaque(opaque) => Type::Opaque(opaque.tag()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(fields) => Some(fields),
            _ => None,
        }
    }

    /// Attribute lookup on an object value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.as_object()?.get(name)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null(_) => "null",
            Value::String(_) => "string",
            Value::Number(_) => "number",
            Value::Bool(_) => "bool",
            Value::List { .. } => "list",
            Value::Object(_) => "object",
            Value::Opaque(_) => "opaque",
        }
    }
}

/// Integral numbers print without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n == n.floor() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            write_pretty(f, self, 0)
        } else {
            write_inline(f, self)
        }
    }
}

fn write_inline(f: &mut fmt::Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::Null(_) => write!(f, "null"),
        Value::String(s) => write!(f, "{}", schemacfg::expression::quote(s)),
        Value::Number(n) => write!(f, "{}", format_number(*n)),
        Value::Bool(b) => write!(f, "{}", b),
        Value::List { items, .. } => {
            write!(f, "[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write_inline(f, item)?;
            }
            write!(f, "]")
        }
        Value::Object(fields) => {
            if fields.is_empty() {
                return write!(f, "{{}}");
            }
            write!(f, "{{")?;
            for (i, (name, field)) in fields.iter().enumerate() {
                if i > 0 {
                    write!(f, ",")?;
                }
                write!(f, " {} = ", name)?;
                write_inline(f, field)?;
            }
            write!(f, " }}")
        }
        Value::Opaque(opaque) => write!(f, "{}", opaque.raw()),
    }
}

fn write_pretty(f: &mut fmt::Formatter<'_>, value: &Value, depth: usize) -> fmt::Result {
    match value {
        Value::Object(fields) if !fields.is_empty() => {
            writeln!(f, "{{")?;
            for (name, field) in fields {
                write!(f, "{}{} = ", "  ".repeat(depth + 1), name)?;
                write_pretty(f, field, depth + 1)?;
                writeln!(f)?;
            }
            write!(f, "{}}}", "  ".repeat(depth))
        }
        other => write_inline(f, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(fields: &[(&str, Value)]) -> Value {
        Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn list_element_type_is_inferred() {
        let strings = Value::list(vec![Value::string("a"), Value::string("b")]);
        assert_eq!(strings.ty(), Type::list(Type::String));

        let mixed = Value::list(vec![Value::string("a"), Value::Number(1.0)]);
        assert_eq!(mixed.ty(), Type::list(Type::Any));

        assert_eq!(Value::list(vec![]).ty(), Type::list(Type::Any));
    }

    #[test]
    fn typed_null_reports_its_type() {
        let null = Value::Null(Type::list(Type::Number));
        assert!(null.is_null());
        assert_eq!(null.ty(), Type::list(Type::Number));
    }

    #[test]
    fn inline_display() {
        let value = object(&[
            ("name", Value::string("users")),
            ("size", Value::Number(3.0)),
            ("ratio", Value::Number(0.5)),
            ("tags", Value::list(vec![Value::Bool(true), Value::Null(Type::Bool)])),
        ]);
        assert_eq!(
            value.to_string(),
            "{ name = \"users\", ratio = 0.5, size = 3, tags = [true, null] }"
        );
    }

    #[test]
    fn pretty_display_nests_objects() {
        let value = object(&[
            ("a", object(&[("b", Value::Number(1.0))])),
            ("c", object(&[])),
        ]);
        assert_eq!(
            format!("{:#}", value),
            "{\n  a = {\n    b = 1\n  }\n  c = {}\n}"
        );
    }

    #[test]
    fn type_display() {
        let ty = Type::Object(
            [("__ref".to_string(), Type::String), ("n".to_string(), Type::list(Type::Number))]
                .into_iter()
                .collect(),
        );
        assert_eq!(ty.to_string(), "object({__ref = string, n = list(number)})");
    }
}
