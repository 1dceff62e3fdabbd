//! Schema loading.
//!
//! The schema is a JSON document describing every element the configuration
//! tree may contain: its position, occurrence bounds, attributes and, for
//! simple-content elements, the value type. It is compiled once into an
//! immutable [`Schema`] whose declarations are cached by tag path, so value
//! validation never has to interpret the document again.
//!
//! ```json
//! {
//!   "namespace": "http://www.baramcfd.org/baram",
//!   "version": 2,
//!   "types": { "positiveNumber": { "base": "double", "minExclusive": 0 } },
//!   "complexTypes": {
//!     "inputNumber": {
//!       "type": { "base": "double" },
//!       "attributes": [{ "name": "batchParameter" }]
//!     }
//!   },
//!   "root": {
//!     "name": "configuration",
//!     "attributes": [{ "name": "version", "required": true }],
//!     "children": [
//!       { "name": "general", "children": [
//!         { "name": "timeTransient", "type": { "base": "boolean" } }
//!       ] }
//!     ]
//!   }
//! }
//! ```

use std::{collections::HashMap, path::Path};

use log::debug;
use serde::Deserialize;

use crate::{
    error::{DbError, Result},
    tree::Element,
};

/// Value types compiled from schema type definitions.
pub mod field;

/// Full-tree validation against the schema.
pub mod validate;

pub use field::{DecimalFacets, FieldType, SimpleTypeDef};

/// Attribute name that marks an element as able to reference a batch parameter.
pub const BATCH_PARAMETER_ATTRIBUTE: &str = "batchParameter";

const BUILTIN_SCHEMA: &str = include_str!("../../resources/baram.cfg.schema.json");
const MAX_DEPTH: usize = 64;

/// Index of a declaration inside a [`Schema`].
pub type DeclId = usize;

/// Compiled attribute declaration.
#[derive(Debug, Clone)]
pub struct AttributeDecl {
    pub name: String,
    pub required: bool,
    pub field: Option<FieldType>,
    pub default: Option<String>,
}

/// Content model of an element.
#[derive(Debug, Clone)]
pub enum Content {
    /// Text content of the given type.
    Simple(FieldType),
    /// An ordered sequence of child elements.
    Elements(Vec<DeclId>),
}

/// Compiled element declaration.
#[derive(Debug, Clone)]
pub struct ElementDecl {
    pub name: String,
    pub min_occurs: u32,
    /// `None` means unbounded.
    pub max_occurs: Option<u32>,
    pub attributes: Vec<AttributeDecl>,
    pub content: Content,
}

impl ElementDecl {
    pub fn has_simple_content(&self) -> bool {
        matches!(self.content, Content::Simple(_))
    }

    /// Value type for simple-content elements.
    pub fn field(&self) -> Option<&FieldType> {
        match &self.content {
            Content::Simple(ft) => Some(ft),
            Content::Elements(_) => None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDecl> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Whether values of this element may be given as `$name` references.
    pub fn allows_batch_parameter(&self) -> bool {
        self.attribute(BATCH_PARAMETER_ATTRIBUTE).is_some()
    }
}

/// Immutable, compiled schema.
#[derive(Debug, Clone)]
pub struct Schema {
    namespace: Option<String>,
    version: u32,
    decls: Vec<ElementDecl>,
    root: DeclId,
    by_path: HashMap<String, DeclId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SchemaDoc {
    namespace: Option<String>,
    version: u32,
    #[serde(default)]
    types: HashMap<String, SimpleTypeDef>,
    #[serde(default)]
    complex_types: HashMap<String, ComplexTypeDef>,
    root: ElementDef,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ComplexTypeDef {
    #[serde(rename = "type")]
    type_ref: Option<TypeRef>,
    #[serde(default)]
    attributes: Vec<AttributeDef>,
    children: Option<Vec<ElementDef>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ElementDef {
    name: String,
    #[serde(default = "one")]
    min_occurs: u32,
    #[serde(default)]
    max_occurs: MaxOccurs,
    #[serde(rename = "type")]
    type_ref: Option<TypeRef>,
    complex_type: Option<String>,
    #[serde(default)]
    attributes: Vec<AttributeDef>,
    children: Option<Vec<ElementDef>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AttributeDef {
    name: String,
    #[serde(default)]
    required: bool,
    #[serde(rename = "type")]
    type_ref: Option<TypeRef>,
    default: Option<String>,
}

#[derive(Deserialize, Clone)]
#[serde(untagged)]
enum TypeRef {
    Named(String),
    Inline(SimpleTypeDef),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MaxOccurs {
    Count(u32),
    Keyword(String),
}

impl Default for MaxOccurs {
    fn default() -> Self {
        MaxOccurs::Count(1)
    }
}

fn one() -> u32 {
    1
}

struct Compiler<'a> {
    doc: &'a SchemaDoc,
    decls: Vec<ElementDecl>,
    by_path: HashMap<String, DeclId>,
}

impl Compiler<'_> {
    fn field(&self, type_ref: &TypeRef, context: &str) -> Result<FieldType> {
        match type_ref {
            TypeRef::Named(name) => match self.doc.types.get(name) {
                Some(def) => FieldType::compile(def, name),
                // primitive names may be used directly
                None => FieldType::compile(
                    &SimpleTypeDef {
                        base: name.clone(),
                        ..Default::default()
                    },
                    context,
                ),
            },
            TypeRef::Inline(def) => FieldType::compile(def, context),
        }
    }

    fn attributes(&self, defs: &[AttributeDef], context: &str) -> Result<Vec<AttributeDecl>> {
        defs.iter()
            .map(|a| {
                Ok(AttributeDecl {
                    name: a.name.clone(),
                    required: a.required,
                    field: match &a.type_ref {
                        Some(t) => Some(self.field(t, &format!("{context}/@{}", a.name))?),
                        None => None,
                    },
                    default: a.default.clone(),
                })
            })
            .collect()
    }

    fn element(&mut self, def: &ElementDef, parent_path: &str, depth: usize) -> Result<DeclId> {
        let doc = self.doc;
        let path = if parent_path.is_empty() {
            def.name.clone()
        } else {
            format!("{parent_path}/{}", def.name)
        };
        if depth > MAX_DEPTH {
            return Err(DbError::Schema(format!("declarations nest too deep at `{path}`")));
        }

        let max_occurs = match &def.max_occurs {
            MaxOccurs::Count(n) => Some(*n),
            MaxOccurs::Keyword(k) if k == "unbounded" => None,
            MaxOccurs::Keyword(k) => {
                return Err(DbError::Schema(format!("`{path}`: invalid maxOccurs `{k}`")));
            }
        };

        let empty = ComplexTypeDef::default();
        let complex = match &def.complex_type {
            Some(name) => doc.complex_types.get(name).ok_or_else(|| {
                DbError::Schema(format!("`{path}`: unknown complex type `{name}`"))
            })?,
            None => &empty,
        };

        let mut attributes = self.attributes(&complex.attributes, &path)?;
        for attr in self.attributes(&def.attributes, &path)? {
            match attributes.iter_mut().find(|a| a.name == attr.name) {
                Some(existing) => *existing = attr,
                None => attributes.push(attr),
            }
        }

        let type_ref = def.type_ref.as_ref().or(complex.type_ref.as_ref());
        let children = def.children.as_ref().or(complex.children.as_ref());

        // reserve the slot so parents precede children
        let id = self.decls.len();
        self.decls.push(ElementDecl {
            name: def.name.clone(),
            min_occurs: def.min_occurs,
            max_occurs,
            attributes,
            content: Content::Elements(Vec::new()),
        });
        self.by_path.insert(path.clone(), id);

        let content = match (type_ref, children) {
            (Some(_), Some(_)) => {
                return Err(DbError::Schema(format!(
                    "`{path}` declares both a value type and children"
                )));
            }
            (Some(t), None) => Content::Simple(self.field(t, &path)?),
            (None, Some(children)) => {
                let mut ids = Vec::with_capacity(children.len());
                for child in children {
                    if children.iter().filter(|c| c.name == child.name).count() > 1 {
                        return Err(DbError::Schema(format!(
                            "`{path}` declares `{}` more than once",
                            child.name
                        )));
                    }
                    ids.push(self.element(child, &path, depth + 1)?);
                }
                Content::Elements(ids)
            }
            (None, None) => Content::Simple(FieldType::String),
        };
        self.decls[id].content = content;
        Ok(id)
    }
}

impl Schema {
    /// Compile a schema from its JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Json`] for malformed JSON and [`DbError::Schema`]
    /// for inconsistent declarations.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let doc: SchemaDoc = serde_json::from_str(text)?;
        let mut compiler = Compiler {
            doc: &doc,
            decls: Vec::new(),
            by_path: HashMap::new(),
        };
        let root = compiler.element(&doc.root, "", 0)?;
        let Compiler { decls, by_path, .. } = compiler;

        debug!(
            "schema v{} compiled: {} declarations",
            doc.version,
            decls.len()
        );

        Ok(Self {
            namespace: doc.namespace.clone(),
            version: doc.version,
            decls,
            root,
            by_path,
        })
    }

    /// Load a schema from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// The schema packaged with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_json_str(BUILTIN_SCHEMA)
    }

    /// Default namespace written on the document root.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Document version this schema describes.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn root(&self) -> &ElementDecl {
        &self.decls[self.root]
    }

    pub fn decl(&self, id: DeclId) -> &ElementDecl {
        &self.decls[id]
    }

    /// Declaration for a tag path relative to the root, such as
    /// `regions/region/name`. The empty path is the root.
    pub fn decl_for_path(&self, tag_path: &str) -> Option<&ElementDecl> {
        if tag_path.is_empty() {
            return Some(self.root());
        }
        let root_name = &self.root().name;
        self.by_path
            .get(&format!("{root_name}/{tag_path}"))
            .map(|&id| &self.decls[id])
    }

    /// Declaration of the element at `id` in `tree`.
    pub fn decl_for_node(&self, tree: &Element, id: &[usize]) -> Option<&ElementDecl> {
        self.decl_for_path(&tree.tag_path(id)?)
    }
}
