//! Scope construction: turns the block tree into addressable object values.
//!
//! Every block instance becomes an object holding its attributes (missing
//! ones as typed nulls), an `__ref` address and the bindings of its own child
//! blocks. Instances are bound under their type name, keyed by name, or by
//! qualifier and then name when a block carries two labels:
//!
//! ```text
//! table "users" { ... }           -> table.users        ($table.users)
//! schema "public" "users" { ... } -> schema.public.users ($schema.public.users)
//! column { ... }                  -> column.0           ($column.0)
//! ```

use std::collections::{BTreeMap, HashMap};

use schemacfg::block::{Block, Body};
use schemacfg::decode::VARIABLE_BLOCK;

use crate::context::{EvalContext, VAR_NAMESPACE};
use crate::error::{Error, Result};
use crate::literal::{LITERAL_TYPE, Opaque};
use crate::registry::{BlockSchema, REF_ATTR, SchemaRegistry, TypeId};
use crate::value::Value;

/// Infer the schema of `body` and bind its blocks into `ctx`.
///
/// Each root block type is bound at the top level of the context, next to
/// (not under) the `var` namespace. Existing bindings of the same name are
/// replaced.
pub fn build_scope(ctx: &mut EvalContext, body: &Body) -> Result<()> {
    let registry = SchemaRegistry::build(body);
    ScopeBuilder::new(&registry).bind(ctx, body)
}

/// What a name under a block type is bound to while instances are collected.
enum Slot {
    Instance(Value),
    /// The group of instances sharing this qualifier.
    Group,
}

/// How a block instance is named among its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
struct InstanceName {
    qualifier: Option<String>,
    name: String,
}

/// Builds object values guided by a [`SchemaRegistry`].
pub struct ScopeBuilder<'r> {
    registry: &'r SchemaRegistry,
}

impl<'r> ScopeBuilder<'r> {
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        ScopeBuilder { registry }
    }

    /// Bind the root blocks of `body` into `ctx`. Nothing is committed if
    /// a block does not match the registry.
    pub fn bind(&self, ctx: &mut EvalContext, body: &Body) -> Result<()> {
        let blocks: Vec<&Block> = body
            .blocks
            .iter()
            .filter(|b| b.kind != VARIABLE_BLOCK)
            .collect();
        let bindings = self.block_values(&blocks, "", self.registry.root())?;
        if bindings.contains_key(VAR_NAMESPACE) {
            log::warn!(
                "block type \"{}\" shadows the input variable namespace",
                VAR_NAMESPACE
            );
        }
        log::debug!("bound {} root block type(s)", bindings.len());
        for (name, value) in bindings {
            ctx.set(name, value);
        }
        Ok(())
    }

    /// Bindings for a list of sibling blocks, one per block type known to
    /// `schema`.
    fn block_values(
        &self,
        blocks: &[&Block],
        parent_addr: &str,
        schema: &BlockSchema,
    ) -> Result<BTreeMap<String, Value>> {
        let by_type = self.group_by_type(blocks, schema)?;
        let mut vars = BTreeMap::new();
        for (id, def) in schema.children() {
            let type_name = self.registry.type_name(id);
            let instances = by_type.get(&id).map(Vec::as_slice).unwrap_or_default();
            if instances.is_empty() {
                // Referencing an absent optional block yields a typed null.
                vars.insert(
                    type_name.to_string(),
                    Value::Null(self.registry.object_type(def)),
                );
                continue;
            }
            let binding = self.type_binding(type_name, instances, parent_addr, def)?;
            vars.insert(type_name.to_string(), binding);
        }
        Ok(vars)
    }

    /// Group sibling blocks by interned type, keeping document order.
    fn group_by_type<'b>(
        &self,
        blocks: &[&'b Block],
        schema: &BlockSchema,
    ) -> Result<HashMap<TypeId, Vec<&'b Block>>> {
        let mut groups: HashMap<TypeId, Vec<&'b Block>> = HashMap::new();
        for block in blocks {
            let id = self
                .registry
                .type_id(&block.kind)
                .filter(|id| schema.child(*id).is_some())
                .ok_or_else(|| Error::UnknownBlockType {
                    kind: block.kind.clone(),
                    span: block.span.clone(),
                })?;
            groups.entry(id).or_default().push(block);
        }
        Ok(groups)
    }

    /// The value bound under a type name: `name → instance`, or
    /// `qualifier → name → instance` for qualified instances.
    fn type_binding(
        &self,
        type_name: &str,
        instances: &[&Block],
        parent_addr: &str,
        def: &BlockSchema,
    ) -> Result<Value> {
        // Qualifiers and names share one namespace. Entries are written in
        // document order, so the last instance or group under a name wins.
        let mut binding: BTreeMap<String, Slot> = BTreeMap::new();
        let mut groups: BTreeMap<String, BTreeMap<String, Value>> = BTreeMap::new();
        let mut unlabeled = 0usize;
        let (mut qualified, mut unqualified) = (false, false);
        for block in instances {
            let InstanceName { qualifier, name } = instance_name(block, &mut unlabeled);
            let self_addr = addr(parent_addr, type_name, &name, qualifier.as_deref());
            let value = self.instance_value(block, &self_addr, def)?;
            let (key, slot) = match qualifier {
                Some(qualifier) => {
                    groups.entry(qualifier.clone()).or_default().insert(name, value);
                    (qualifier, Slot::Group)
                }
                None => (name, Slot::Instance(value)),
            };
            let is_group = matches!(slot, Slot::Group);
            qualified |= is_group;
            unqualified |= !is_group;
            if let Some(previous) = binding.insert(key.clone(), slot) {
                if matches!(previous, Slot::Group) != is_group {
                    log::warn!(
                        "\"{}\" of block type \"{}\" at \"{}\" is both a qualifier and an instance name; the later block wins",
                        key,
                        type_name,
                        parent_addr
                    );
                }
            }
        }
        if qualified && unqualified {
            log::warn!(
                "block type \"{}\" at \"{}\" mixes qualified and unqualified instances",
                type_name,
                parent_addr
            );
        }

        let binding = binding
            .into_iter()
            .map(|(key, slot)| {
                let value = match slot {
                    Slot::Instance(value) => value,
                    Slot::Group => Value::Object(groups.remove(&key).unwrap_or_default()),
                };
                (key, value)
            })
            .collect();
        Ok(Value::Object(binding))
    }

    fn instance_value(&self, block: &Block, self_addr: &str, def: &BlockSchema) -> Result<Value> {
        let mut attrs = literal_attributes(block);
        for field in def.fields() {
            attrs
                .entry(field.clone())
                .or_insert_with(|| Value::Null(LITERAL_TYPE));
        }
        attrs.insert(REF_ATTR.to_string(), Value::string(self_addr));

        let children: Vec<&Block> = block.body.blocks.iter().collect();
        let nested = self.block_values(&children, self_addr, def)?;
        attrs.extend(nested);
        Ok(Value::Object(attrs))
    }
}

/// Attributes whose expression is a literal, captured as opaque values.
/// Anything else is left out and ends up as a typed null.
fn literal_attributes(block: &Block) -> BTreeMap<String, Value> {
    let mut attrs = BTreeMap::new();
    for attr in &block.body.attributes {
        match attr.expr.as_literal() {
            Some(raw) => {
                attrs.insert(attr.name.clone(), Value::Opaque(Opaque::literal(raw)));
            }
            None => log::warn!(
                "attribute \"{}\" of \"{}\" block is not a literal ({}); binding null",
                attr.name,
                block.kind,
                attr.expr
            ),
        }
    }
    attrs
}

/// Name and qualifier from the labels: none → positional index, one → name,
/// two or more → qualifier and name.
fn instance_name(block: &Block, unlabeled: &mut usize) -> InstanceName {
    let (qualifier, name) = match block.labels.as_slice() {
        [] => (None, String::new()),
        [name] => (None, name.clone()),
        [qualifier, name, ..] => (Some(qualifier.clone()), name.clone()),
    };
    let name = if name.is_empty() {
        let index = unlabeled.to_string();
        *unlabeled += 1;
        index
    } else {
        name
    };
    InstanceName { qualifier, name }
}

/// Address of an instance: `<parent>.$<type>.[<qualifier>.]<name>`.
fn addr(parent_addr: &str, type_name: &str, name: &str, qualifier: Option<&str>) -> String {
    let prefix = if parent_addr.is_empty() {
        String::new()
    } else {
        format!("{}.", parent_addr)
    };
    match qualifier {
        Some(qualifier) => format!("{}${}.{}.{}", prefix, type_name, qualifier, name),
        None => format!("{}${}.{}", prefix, type_name, name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemacfg::expression::Expression;

    fn lit(raw: &str) -> Expression {
        Expression::literal(raw)
    }

    fn scope(body: &Body) -> EvalContext {
        let mut ctx = EvalContext::new();
        build_scope(&mut ctx, body).unwrap();
        ctx
    }

    fn str_at<'a>(ctx: &'a EvalContext, path: &str) -> &'a str {
        ctx.lookup(path)
            .and_then(Value::as_str)
            .unwrap_or_else(|| panic!("no string at {}", path))
    }

    #[test]
    fn addresses() {
        assert_eq!(addr("", "table", "users", None), "$table.users");
        assert_eq!(addr("", "schema", "users", Some("public")), "$schema.public.users");
        assert_eq!(
            addr("$table.users", "column", "id", None),
            "$table.users.$column.id"
        );
    }

    #[test]
    fn label_rules() {
        let mut unlabeled = 0;
        let name = |labels: &[&str], unlabeled: &mut usize| {
            let block = labels.iter().fold(Block::new("t"), |b, l| b.label(*l));
            instance_name(&block, unlabeled)
        };
        assert_eq!(
            name(&[], &mut unlabeled),
            InstanceName { qualifier: None, name: "0".into() }
        );
        assert_eq!(
            name(&["a"], &mut unlabeled),
            InstanceName { qualifier: None, name: "a".into() }
        );
        assert_eq!(
            name(&["q", "n", "extra"], &mut unlabeled),
            InstanceName { qualifier: Some("q".into()), name: "n".into() }
        );
        assert_eq!(
            name(&[""], &mut unlabeled),
            InstanceName { qualifier: None, name: "1".into() }
        );
    }

    #[test]
    fn unlabeled_instances_are_indexed_in_order() {
        let body = Body::new()
            .block(Block::new("index").attr("n", lit("\"first\"")))
            .block(Block::new("index").attr("n", lit("\"second\"")))
            .block(Block::new("index").attr("n", lit("\"third\"")));
        let ctx = scope(&body);
        for (i, n) in ["first", "second", "third"].iter().enumerate() {
            assert_eq!(str_at(&ctx, &format!("index.{}.__ref", i)), format!("$index.{}", i));
            let raw = Value::Opaque(Opaque::literal(format!("\"{}\"", n)));
            assert_eq!(ctx.lookup(&format!("index.{}.n", i)), Some(&raw));
        }
    }

    #[test]
    fn qualified_instances_group_by_qualifier() {
        let body = Body::new()
            .block(Block::new("table").label("public").label("users"))
            .block(Block::new("table").label("public").label("posts"))
            .block(Block::new("table").label("audit").label("users"));
        let ctx = scope(&body);
        assert_eq!(str_at(&ctx, "table.public.users.__ref"), "$table.public.users");
        assert_eq!(str_at(&ctx, "table.public.posts.__ref"), "$table.public.posts");
        assert_eq!(str_at(&ctx, "table.audit.users.__ref"), "$table.audit.users");
        let public = ctx.lookup("table.public").and_then(Value::as_object).unwrap();
        assert_eq!(public.keys().collect::<Vec<_>>(), ["posts", "users"]);
    }

    #[test]
    fn missing_attributes_are_typed_nulls() {
        let body = Body::new()
            .block(Block::new("column").label("a").attr("type", lit("\"int\"")))
            .block(Block::new("column").label("b").attr("null", lit("true")));
        let ctx = scope(&body);
        assert_eq!(ctx.lookup("column.a.null"), Some(&Value::Null(LITERAL_TYPE)));
        assert_eq!(ctx.lookup("column.b.type"), Some(&Value::Null(LITERAL_TYPE)));
        assert_eq!(
            ctx.lookup("column.b.null"),
            Some(&Value::Opaque(Opaque::literal("true")))
        );
    }

    #[test]
    fn non_literal_attributes_degrade_to_null() {
        let body = Body::new().block(
            Block::new("foreign_key")
                .label("fk")
                .attr("columns", Expression::traversal(["table", "users", "column", "id"])),
        );
        let ctx = scope(&body);
        assert_eq!(ctx.lookup("foreign_key.fk.columns"), Some(&Value::Null(LITERAL_TYPE)));
    }

    #[test]
    fn absent_child_type_is_a_typed_null() {
        let body = Body::new()
            .block(
                Block::new("table")
                    .label("a")
                    .child(Block::new("index").label("i").attr("unique", lit("true"))),
            )
            .block(Block::new("table").label("b"));
        let ctx = scope(&body);
        let index = ctx.lookup("table.b.index").unwrap();
        assert!(index.is_null());
        let registry = SchemaRegistry::build(&body);
        let expected = registry.object_type(registry.schema(&["table", "index"]).unwrap());
        assert_eq!(index.ty(), expected);
    }

    #[test]
    fn children_are_reachable_from_ancestors() {
        let body = Body::new().block(
            Block::new("schema").label("main").child(
                Block::new("table")
                    .label("users")
                    .child(Block::new("column").label("id")),
            ),
        );
        let ctx = scope(&body);
        assert_eq!(
            str_at(&ctx, "schema.main.table.users.column.id.__ref"),
            "$schema.main.$table.users.$column.id"
        );
    }

    #[test]
    fn variable_blocks_are_not_bound() {
        let body = Body::new()
            .block(Block::new(VARIABLE_BLOCK).label("x").attr("type", Expression::keyword("string")))
            .block(Block::new("table").label("t"));
        let ctx = scope(&body);
        assert!(ctx.get(VARIABLE_BLOCK).is_none());
        assert!(ctx.get("table").is_some());
    }

    #[test]
    fn later_qualified_group_replaces_instance() {
        let body = Body::new()
            .block(Block::new("table").label("public"))
            .block(Block::new("table").label("public").label("users"));
        let ctx = scope(&body);
        assert_eq!(str_at(&ctx, "table.public.users.__ref"), "$table.public.users");
        assert!(ctx.lookup("table.public.__ref").is_none());
    }

    #[test]
    fn later_instance_replaces_qualified_group() {
        let body = Body::new()
            .block(Block::new("table").label("public").label("users"))
            .block(Block::new("table").label("public"));
        let ctx = scope(&body);
        assert_eq!(str_at(&ctx, "table.public.__ref"), "$table.public");
        assert!(ctx.lookup("table.public.users").is_none());
    }

    #[test]
    fn qualified_group_collects_across_an_interleaved_instance() {
        let body = Body::new()
            .block(Block::new("table").label("public").label("users"))
            .block(Block::new("table").label("public"))
            .block(Block::new("table").label("public").label("orders"));
        let ctx = scope(&body);
        assert_eq!(str_at(&ctx, "table.public.users.__ref"), "$table.public.users");
        assert_eq!(str_at(&ctx, "table.public.orders.__ref"), "$table.public.orders");
        assert!(ctx.lookup("table.public.__ref").is_none());
    }

    #[test]
    fn blocks_outside_the_registry_are_rejected() {
        let registry = SchemaRegistry::build(&Body::new().block(Block::new("table")));
        let other = Body::new().block(Block::new("view").label("v").at(10..20));
        let mut ctx = EvalContext::new();
        let err = ScopeBuilder::new(&registry).bind(&mut ctx, &other).unwrap_err();
        assert!(matches!(err, Error::UnknownBlockType { ref kind, .. } if kind == "view"));
        assert_eq!(err.span(), Some(10..20));
        assert!(ctx.variables().is_empty());
    }
}
