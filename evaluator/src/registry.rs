//! Structural schema inference.
//!
//! One pass over the document yields, for every nesting path, the schema of
//! each block type found there: the union of attribute names seen on its
//! instances and the schemas of its child types. The registry is immutable
//! once built and belongs to a single evaluation run.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use schemacfg::block::{Block, Body};
use schemacfg::decode::VARIABLE_BLOCK;

use crate::literal::LITERAL_TYPE;
use crate::value::Type;

/// Name of the synthetic attribute holding a block instance's address.
pub const REF_ATTR: &str = "__ref";

/// Interned block type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

#[derive(Debug, Default)]
struct Interner {
    names: Vec<String>,
    ids: HashMap<String, TypeId>,
}

impl Interner {
    fn intern(&mut self, name: &str) -> TypeId {
        if let Some(id) = self.ids.get(name) {
            return *id;
        }
        let id = TypeId(self.names.len() as u32);
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }
}

/// Schema of one block type at one nesting path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockSchema {
    fields: BTreeSet<String>,
    children: BTreeMap<TypeId, BlockSchema>,
}

impl BlockSchema {
    /// Attribute names seen on any instance.
    pub fn fields(&self) -> &BTreeSet<String> {
        &self.fields
    }

    /// Child block types, ordered by [`TypeId`]: the order in which their
    /// names were first interned anywhere in the document, not per parent.
    pub fn children(&self) -> impl Iterator<Item = (TypeId, &BlockSchema)> {
        self.children.iter().map(|(id, schema)| (*id, schema))
    }

    pub fn child(&self, id: TypeId) -> Option<&BlockSchema> {
        self.children.get(&id)
    }

    fn add_child(&mut self, id: TypeId, schema: BlockSchema) {
        match self.children.get_mut(&id) {
            Some(existing) => existing.merge(schema),
            None => {
                self.children.insert(id, schema);
            }
        }
    }

    /// Union the field sets and merge the children recursively.
    fn merge(&mut self, other: BlockSchema) {
        self.fields.extend(other.fields);
        for (id, child) in other.children {
            self.add_child(id, child);
        }
    }
}

/// The inferred schema of a whole document.
#[derive(Debug)]
pub struct SchemaRegistry {
    interner: Interner,
    root: BlockSchema,
}

impl SchemaRegistry {
    /// Scan every block of `body`. Root-level `variable` blocks are skipped:
    /// declarations are not reachable by reference.
    pub fn build(body: &Body) -> Self {
        let mut interner = Interner::default();
        let mut root = BlockSchema::default();
        for block in body.blocks.iter().filter(|b| b.kind != VARIABLE_BLOCK) {
            let (id, schema) = extract(block, &mut interner);
            root.add_child(id, schema);
        }
        log::debug!(
            "schema registry: {} block type name(s), {} root type(s)",
            interner.names.len(),
            root.children.len()
        );
        SchemaRegistry { interner, root }
    }

    /// The schema of the document root; its children are the root block types.
    pub fn root(&self) -> &BlockSchema {
        &self.root
    }

    pub fn type_id(&self, name: &str) -> Option<TypeId> {
        self.interner.ids.get(name).copied()
    }

    pub fn type_name(&self, id: TypeId) -> &str {
        &self.interner.names[id.0 as usize]
    }

    /// Schema reached by following block type names from the root, e.g.
    /// `["table", "column"]`.
    pub fn schema(&self, path: &[&str]) -> Option<&BlockSchema> {
        path.iter().try_fold(&self.root, |schema, name| {
            schema.child(self.type_id(name)?)
        })
    }

    /// The object type an instance described by `schema` has: its fields as
    /// literals, the address as a string and its child types recursively.
    pub fn object_type(&self, schema: &BlockSchema) -> Type {
        let mut fields: BTreeMap<String, Type> = schema
            .fields
            .iter()
            .map(|name| (name.clone(), LITERAL_TYPE))
            .collect();
        fields.insert(REF_ATTR.to_string(), Type::String);
        for (id, child) in schema.children() {
            fields.insert(self.type_name(id).to_string(), self.object_type(child));
        }
        Type::Object(fields)
    }
}

fn extract(block: &Block, interner: &mut Interner) -> (TypeId, BlockSchema) {
    let id = interner.intern(&block.kind);
    let mut schema = BlockSchema::default();
    schema
        .fields
        .extend(block.body.attributes.iter().map(|a| a.name.clone()));
    for child in &block.body.blocks {
        let (child_id, child_schema) = extract(child, interner);
        schema.add_child(child_id, child_schema);
    }
    (id, schema)
}
