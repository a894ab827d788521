use std::collections::BTreeMap;

use crate::convert::TypeRegistry;
use crate::value::Value;

/// Name of the namespace input variables are published under.
pub const VAR_NAMESPACE: &str = "var";

/// The root name → value mapping that expressions and downstream consumers
/// query.
///
/// Owned by one evaluation run. The scope builder and the variable resolver
/// may be applied to it repeatedly; each pass extends what is already there.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    variables: BTreeMap<String, Value>,
    types: TypeRegistry,
}

impl EvalContext {
    pub fn new() -> Self {
        EvalContext::default()
    }

    /// A context using a caller-built coercion table.
    pub fn with_types(types: TypeRegistry) -> Self {
        EvalContext {
            variables: BTreeMap::new(),
            types,
        }
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn variables(&self) -> &BTreeMap<String, Value> {
        &self.variables
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.variables.insert(name.into(), value);
    }

    /// Follow a dotted path from the root: `table.users.column.id.__ref`.
    pub fn lookup(&self, path: &str) -> Option<&Value> {
        self.traverse(path.split('.'))
    }

    /// Follow a sequence of attribute names from the root.
    pub fn traverse<'a, I>(&self, path: I) -> Option<&Value>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut parts = path.into_iter();
        let mut current = self.variables.get(parts.next()?)?;
        for part in parts {
            current = current.get(part)?;
        }
        Some(current)
    }

    /// The resolved input variable named `name`.
    pub fn input_variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(VAR_NAMESPACE)?.get(name)
    }

    /// Merge resolved input variables into the `var` namespace. Entries of
    /// earlier passes are kept; same-named entries are replaced.
    pub fn merge_input_variables(&mut self, resolved: BTreeMap<String, Value>) {
        let mut merged = match self.variables.remove(VAR_NAMESPACE) {
            Some(Value::Object(existing)) => existing,
            Some(other) => {
                log::warn!(
                    "replacing non-object \"{}\" binding ({}) with input variables",
                    VAR_NAMESPACE,
                    other.type_name()
                );
                BTreeMap::new()
            }
            None => BTreeMap::new(),
        };
        merged.extend(resolved);
        self.variables
            .insert(VAR_NAMESPACE.to_string(), Value::Object(merged));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(entries: &[(&str, f64)]) -> BTreeMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), Value::Number(*v)))
            .collect()
    }

    #[test]
    fn merge_adds_and_overwrites() {
        let mut ctx = EvalContext::new();
        ctx.merge_input_variables(vars(&[("a", 1.0)]));
        ctx.merge_input_variables(vars(&[("b", 2.0)]));
        assert_eq!(ctx.input_variable("a"), Some(&Value::Number(1.0)));
        assert_eq!(ctx.input_variable("b"), Some(&Value::Number(2.0)));

        ctx.merge_input_variables(vars(&[("a", 3.0)]));
        assert_eq!(ctx.input_variable("a"), Some(&Value::Number(3.0)));
        assert_eq!(ctx.input_variable("b"), Some(&Value::Number(2.0)));
    }

    #[test]
    fn merge_replaces_non_object_binding() {
        let mut ctx = EvalContext::new();
        ctx.set(VAR_NAMESPACE, Value::string("oops"));
        ctx.merge_input_variables(vars(&[("a", 1.0)]));
        assert_eq!(ctx.lookup("var.a"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn lookup_follows_nested_objects() {
        let mut ctx = EvalContext::new();
        let inner: BTreeMap<String, Value> =
            [("name".to_string(), Value::string("id"))].into_iter().collect();
        let outer: BTreeMap<String, Value> =
            [("column".to_string(), Value::Object(inner))].into_iter().collect();
        ctx.set("table", Value::Object(outer));

        assert_eq!(ctx.lookup("table.column.name"), Some(&Value::string("id")));
        assert_eq!(ctx.lookup("table.column.missing"), None);
        assert_eq!(ctx.lookup("table.column.name.deeper"), None);
        assert_eq!(ctx.lookup("nothing"), None);
    }
}
