//! Value conversion between types.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::literal::{self, Opaque, OpaqueTag};
use crate::value::{Type, Value, format_number};

/// A conversion out of an opaque value into a concrete type.
pub type Coercion = fn(&Opaque) -> Result<Value, ConversionError>;

/// Conversion failure, with the location inside the value where it happened.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{}{}", display_path(.path), .message)]
pub struct ConversionError {
    /// Steps from the converted value to the failing part, e.g. `[0].name`.
    pub path: String,
    pub message: String,
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("{}: ", path)
    }
}

impl ConversionError {
    pub fn new(message: impl Into<String>) -> Self {
        ConversionError {
            path: String::new(),
            message: message.into(),
        }
    }

    fn within(mut self, step: &str) -> Self {
        self.path.insert_str(0, step);
        self
    }
}

/// Opaque coercions known to one evaluation, keyed by source tag and
/// requested type.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    coercions: HashMap<(OpaqueTag, Type), Coercion>,
}

impl TypeRegistry {
    /// A registry with the built-in coercions (literal to string).
    pub fn new() -> Self {
        let mut types = TypeRegistry::empty();
        literal::register(&mut types);
        types
    }

    /// A registry without any coercion.
    pub fn empty() -> Self {
        TypeRegistry {
            coercions: HashMap::new(),
        }
    }

    pub fn register(&mut self, tag: OpaqueTag, target: Type, coercion: Coercion) {
        self.coercions.insert((tag, target), coercion);
    }

    pub fn coercion(&self, tag: OpaqueTag, target: &Type) -> Option<Coercion> {
        self.coercions.get(&(tag, target.clone())).copied()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        TypeRegistry::new()
    }
}

/// Convert `value` to `target`.
pub fn convert(types: &TypeRegistry, value: Value, target: &Type) -> Result<Value, ConversionError> {
    if *target == Type::Any {
        return Ok(value);
    }
    if let Value::Null(_) = value {
        return Ok(Value::Null(target.clone()));
    }
    if value.ty() == *target {
        return Ok(value);
    }
    match (value, target) {
        (Value::Opaque(opaque), target) => match types.coercion(opaque.tag(), target) {
            Some(coerce) => coerce(&opaque),
            None => Err(ConversionError::new(format!(
                "{} cannot be converted to {}",
                opaque.tag(),
                target
            ))),
        },
        (Value::String(s), Type::Number) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Value::Number)
            .ok_or_else(|| ConversionError::new(format!("a number is required, got \"{}\"", s))),
        (Value::String(s), Type::Bool) => match s.as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(ConversionError::new(format!(
                "a bool is required, got \"{}\"",
                s
            ))),
        },
        (Value::Number(n), Type::String) => Ok(Value::String(format_number(n))),
        (Value::Bool(b), Type::String) => Ok(Value::String(b.to_string())),
        (Value::List { items, .. }, Type::List(element)) => {
            let items = items
                .into_iter()
                .enumerate()
                .map(|(i, item)| {
                    convert(types, item, element).map_err(|e| e.within(&format!("[{}]", i)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Value::List {
                element: (**element).clone(),
                items,
            })
        }
        (Value::Object(mut fields), Type::Object(field_types)) => {
            let mut out = BTreeMap::new();
            for (name, ty) in field_types {
                let field = fields.remove(name).ok_or_else(|| {
                    ConversionError::new(format!("attribute \"{}\" is required", name))
                })?;
                let converted =
                    convert(types, field, ty).map_err(|e| e.within(&format!(".{}", name)))?;
                out.insert(name.clone(), converted);
            }
            Ok(Value::Object(out))
        }
        (value, target) => Err(ConversionError::new(format!(
            "{} required, got {}",
            target,
            value.type_name()
        ))),
    }
}
