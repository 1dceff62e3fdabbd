//! The document store.
//!
//! [`CoreDb`] owns the live configuration tree. Every read and write is
//! addressed by a path expression; writes go through the value validator and
//! keep the tree valid against the [`Schema`] outside of an open transaction.

use std::{cell::RefCell, collections::HashMap, sync::Arc};

use log::{debug, warn};

use crate::{
    error::{DbError, Result, ValueError, ValueErrorKind},
    ids::{self, IdLimits},
    schema::{BATCH_PARAMETER_ATTRIBUTE, Schema},
    template::Templates,
    transaction::TxnState,
    tree::{Element, NodeId, PathExpr, path, xml},
};

const DEFAULT_DOCUMENT: &str = include_str!("../resources/baram.cfg.xml");

/// Where batch parameters are declared.
pub const BATCH_PARAMETERS_PATH: &str = "/runCalculation/batch/parameters";

/// Result of validating a raw value against the schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    /// Element the value belongs to.
    pub id: NodeId,
    /// Canonical text to store.
    pub value: String,
    /// Batch parameter the value was given through, if any.
    pub parameter: Option<String>,
}

/// In-memory configuration document.
pub struct CoreDb {
    schema: Arc<Schema>,
    templates: Arc<Templates>,
    limits: IdLimits,
    pub(crate) tree: Element,
    config_count: u64,
    saved_count: u64,
    pub(crate) txn: Option<TxnState>,
    floats: RefCell<HashMap<String, f64>>,
}

impl std::fmt::Debug for CoreDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreDb")
            .field("root", &self.tree.tag)
            .field("config_count", &self.config_count)
            .field("in_transaction", &self.txn.is_some())
            .finish()
    }
}

impl CoreDb {
    /// A store holding the packaged default document.
    pub fn new(schema: Arc<Schema>, templates: Arc<Templates>) -> Result<Self> {
        let tree = xml::parse(DEFAULT_DOCUMENT)?;
        Self::with_tree(schema, templates, tree)
    }

    /// A store holding `tree`, which must be valid against `schema`.
    pub fn with_tree(schema: Arc<Schema>, templates: Arc<Templates>, tree: Element) -> Result<Self> {
        schema.validate(&tree)?;
        Ok(Self {
            schema,
            templates,
            limits: IdLimits::default(),
            tree,
            config_count: 0,
            saved_count: 0,
            txn: None,
            floats: RefCell::new(HashMap::new()),
        })
    }

    /// Replace the id namespace bounds.
    pub fn with_limits(mut self, limits: IdLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn templates(&self) -> &Templates {
        &self.templates
    }

    pub fn limits(&self) -> &IdLimits {
        &self.limits
    }

    /// The live tree.
    pub fn root(&self) -> &Element {
        &self.tree
    }

    /// The document serialized as XML.
    pub fn to_xml(&self) -> Result<String> {
        xml::to_document(&self.tree, self.schema.namespace())
    }

    // ---- lookup ---------------------------------------------------------

    /// Every element matching `path`, in document order.
    pub fn select(&self, path: &str) -> Result<Vec<NodeId>> {
        path::select(&self.tree, path)
    }

    /// The single element matching `path`.
    pub(crate) fn single(&self, path: &str) -> Result<NodeId> {
        let mut ids = self.select(path)?;
        if ids.len() != 1 {
            return Err(DbError::lookup(path, ids.len()));
        }
        Ok(ids.remove(0))
    }

    pub(crate) fn node(&self, id: &[usize]) -> Result<&Element> {
        self.tree
            .get(id)
            .ok_or_else(|| DbError::lookup(&self.tree.describe(id), 0))
    }

    pub(crate) fn node_mut(&mut self, id: &[usize]) -> Result<&mut Element> {
        let described = self.tree.describe(id);
        self.tree
            .get_mut(id)
            .ok_or_else(|| DbError::lookup(&described, 0))
    }

    /// The single element matching `path`.
    ///
    /// # Errors
    ///
    /// [`DbError::Lookup`] unless exactly one element matches.
    pub fn get_element(&self, path: &str) -> Result<&Element> {
        let id = self.single(path)?;
        self.node(&id)
    }

    /// Every element matching `path`.
    pub fn get_elements(&self, path: &str) -> Result<Vec<&Element>> {
        Ok(self
            .select(path)?
            .iter()
            .filter_map(|id| self.tree.get(id))
            .collect())
    }

    /// Whether `path` matches anything. Malformed paths match nothing.
    pub fn exists(&self, path: &str) -> bool {
        match PathExpr::parse(path) {
            Ok(expr) => !expr.select(&self.tree).is_empty(),
            Err(e) => {
                debug!("exists({path}): {e}");
                false
            }
        }
    }

    // ---- reads ----------------------------------------------------------

    /// Value of a simple-content element.
    ///
    /// A value given through a batch parameter reads back as `$name`.
    pub fn get_value(&self, path: &str) -> Result<String> {
        let id = self.single(path)?;
        let element = self.node(&id)?;
        if let Some(parameter) = element.attribute(BATCH_PARAMETER_ATTRIBUTE) {
            return Ok(format!("${parameter}"));
        }
        let decl = self
            .schema
            .decl_for_node(&self.tree, &id)
            .ok_or_else(|| DbError::lookup(path, 0))?;
        if !decl.has_simple_content() {
            return Err(DbError::NoSimpleContent { path: path.into() });
        }

        let value = element.text().unwrap_or("").to_string();
        debug!("get_value({path}) -> {value}");
        Ok(value)
    }

    pub fn get_attribute(&self, path: &str, name: &str) -> Result<String> {
        let element = self.get_element(path)?;
        let value = element
            .attribute(name)
            .ok_or_else(|| DbError::MissingAttribute {
                path: path.into(),
                name: name.into(),
            })?;
        debug!("get_attribute({path}:{name}) -> {value}");
        Ok(value.to_string())
    }

    /// Texts of every element matching `path`.
    pub fn get_list(&self, path: &str) -> Result<Vec<String>> {
        Ok(self
            .get_elements(path)?
            .into_iter()
            .map(|e| e.text().unwrap_or("").to_string())
            .collect())
    }

    pub fn get_bool(&self, path: &str) -> Result<bool> {
        Ok(self.get_value(path)? == "true")
    }

    /// Numeric value of `path`, following a batch parameter reference.
    ///
    /// Parsed values are cached until the next write.
    pub fn get_float(&self, path: &str) -> Result<f64> {
        if let Some(v) = self.floats.borrow().get(path) {
            return Ok(*v);
        }

        let raw = self.get_value(path)?;
        let text = match raw.strip_prefix('$') {
            Some(name) => self
                .batch_parameter_value(name)?
                .ok_or_else(|| ValueError::new(ValueErrorKind::FloatOnly, path, &raw))?,
            None => raw.clone(),
        };
        let v: f64 = text
            .trim()
            .parse()
            .map_err(|_| ValueError::new(ValueErrorKind::FloatOnly, path, &raw))?;

        self.floats.borrow_mut().insert(path.to_string(), v);
        Ok(v)
    }

    /// The `x`, `y` and `z` children of `path`.
    pub fn get_vector(&self, path: &str) -> Result<[f64; 3]> {
        Ok([
            self.get_float(&format!("{path}/x"))?,
            self.get_float(&format!("{path}/y"))?,
            self.get_float(&format!("{path}/z"))?,
        ])
    }

    fn batch_parameter_value(&self, name: &str) -> Result<Option<String>> {
        let path = format!(
            "{BATCH_PARAMETERS_PATH}/parameter[name={}]/value",
            path::quote(name)
        );
        let ids = self.select(&path)?;
        Ok(match ids.as_slice() {
            [id] => Some(self.node(id)?.text().unwrap_or("").to_string()),
            _ => None,
        })
    }

    // ---- validation -----------------------------------------------------

    /// Check `raw` against the type of the element at `path`.
    ///
    /// # Errors
    ///
    /// [`DbError::Lookup`] or [`DbError::NoSimpleContent`] when `path` does
    /// not address a single value element, [`DbError::Value`] when the value
    /// is rejected.
    pub fn validate_value(&self, path: &str, raw: &str) -> Result<Validated> {
        let id = self.single(path)?;
        let decl = self
            .schema
            .decl_for_node(&self.tree, &id)
            .ok_or_else(|| DbError::lookup(path, 0))?;
        let field = decl
            .field()
            .ok_or_else(|| DbError::NoSimpleContent { path: path.into() })?;

        let trimmed = raw.trim();
        let mut candidate = trimmed.to_string();
        let mut parameter = None;

        if decl.allows_batch_parameter() {
            if let Some(name) = trimmed.strip_prefix('$') {
                match self.batch_parameter_value(name)? {
                    Some(value) => {
                        candidate = value.trim().to_string();
                        parameter = Some(name.to_string());
                    }
                    None => warn!("{path}: batch parameter `{name}` is not declared"),
                }
            }
        }

        let value = field
            .normalize(&candidate)
            .map_err(|kind| ValueError::new(kind, path, trimmed))?;
        Ok(Validated {
            id,
            value,
            parameter,
        })
    }

    // ---- writes ---------------------------------------------------------

    /// Store a value. See [`CoreDb::set_labeled_value`].
    pub fn set_value(&mut self, path: &str, value: &str) -> Result<()> {
        self.set_labeled_value(path, value, None)
    }

    /// Validate and store a value, attaching `label` to a rejection.
    ///
    /// The change counter moves once if the stored text changed and once
    /// more if the batch parameter reference changed. Inside a transaction a
    /// rejected value is also recorded on the transaction. Outside a
    /// transaction the document is revalidated after the write.
    pub fn set_labeled_value(&mut self, path: &str, value: &str, label: Option<&str>) -> Result<()> {
        let validated = match self.validate_value(path, value) {
            Ok(v) => v,
            Err(DbError::Value(e)) => return Err(self.reject(e.with_label(label))),
            Err(e) => return Err(e),
        };
        let Validated {
            id,
            value,
            parameter,
        } = validated;

        let element = self.node_mut(&id)?;
        let old_text = element.text().map(str::to_string);
        let old_parameter = element.attribute(BATCH_PARAMETER_ATTRIBUTE).map(str::to_string);

        let mut changes = 0;
        if old_text.as_deref().unwrap_or("") != value {
            element.set_text((!value.is_empty()).then(|| value.clone()));
            changes += 1;
        }
        if old_parameter != parameter {
            match &parameter {
                Some(name) => element.set_attribute(BATCH_PARAMETER_ATTRIBUTE, name.as_str()),
                None => element.remove_attribute(BATCH_PARAMETER_ATTRIBUTE),
            };
            changes += 1;
        }
        if changes == 0 {
            return Ok(());
        }

        let revalidated = match self.txn {
            Some(_) => Ok(()),
            None => self.schema.validate(&self.tree),
        };
        if let Err(e) = revalidated {
            let element = self.node_mut(&id)?;
            element.set_text(old_text);
            match old_parameter {
                Some(name) => element.set_attribute(BATCH_PARAMETER_ATTRIBUTE, name),
                None => element.remove_attribute(BATCH_PARAMETER_ATTRIBUTE),
            };
            return Err(e);
        }

        debug!("set_value({path} -> {value}, parameter {parameter:?})");
        self.bump(changes);
        Ok(())
    }

    /// Change an existing attribute.
    pub fn set_attribute(&mut self, path: &str, name: &str, value: &str) -> Result<()> {
        let id = self.single(path)?;
        let old = self
            .node(&id)?
            .attribute(name)
            .ok_or_else(|| DbError::MissingAttribute {
                path: path.into(),
                name: name.into(),
            })?
            .to_string();

        let field = self
            .schema
            .decl_for_node(&self.tree, &id)
            .and_then(|d| d.attribute(name))
            .and_then(|a| a.field.clone());
        let value = match field {
            Some(field) => match field.normalize(value.trim()) {
                Ok(v) => v,
                Err(kind) => return Err(self.reject(ValueError::new(kind, path, value.trim()))),
            },
            None => value.to_string(),
        };

        if old != value {
            self.node_mut(&id)?.set_attribute(name, value.as_str());
            self.bump(1);
        }
        debug!("set_attribute({path}:{name} -> {value})");
        Ok(())
    }

    /// Parse `text` as an XML fragment and append it under `path`.
    pub fn add_element_from_string(&mut self, path: &str, text: &str) -> Result<()> {
        let element = xml::parse(text)?;
        self.add_element(path, element)
    }

    /// Append `element` under the single match of `path` and revalidate the
    /// whole document.
    pub fn add_element(&mut self, path: &str, element: Element) -> Result<()> {
        let parent = self.single(path)?;
        let tag = element.tag.clone();
        self.guarded(true, |db| {
            db.node_mut(&parent)?.push(element);
            Ok(())
        })?;
        debug!("add_element({path} <- {tag})");
        self.bump(1);
        Ok(())
    }

    /// Remove the first element matching `path`. Matching nothing is not an
    /// error.
    pub fn remove_element(&mut self, path: &str) -> Result<()> {
        let Some(id) = self.select(path)?.into_iter().next() else {
            debug!("remove_element({path}): nothing to remove");
            return Ok(());
        };
        if id.is_empty() {
            return Err(DbError::Misuse("the document root cannot be removed".into()));
        }
        let revalidate = self.txn.is_none();
        self.guarded(revalidate, |db| {
            db.tree.remove(&id);
            Ok(())
        })?;
        debug!("remove_element({path})");
        self.bump(1);
        Ok(())
    }

    /// Remove the attributes, children and text of the single match of
    /// `path`.
    pub fn clear_element(&mut self, path: &str) -> Result<()> {
        let id = self.single(path)?;
        let revalidate = self.txn.is_none();
        self.guarded(revalidate, |db| {
            db.node_mut(&id)?.clear();
            Ok(())
        })?;
        debug!("clear_element({path})");
        self.bump(1);
        Ok(())
    }

    /// Revalidate the document and count one change. Used by collaborators
    /// that edit through [`CoreDb::root_mut`].
    pub fn increase_config_count(&mut self) -> Result<()> {
        self.schema.validate(&self.tree)?;
        self.bump(1);
        Ok(())
    }

    /// Direct access to the tree. Only available inside a transaction, whose
    /// commit revalidates the document.
    pub fn root_mut(&mut self) -> Result<&mut Element> {
        if self.txn.is_none() {
            return Err(DbError::Misuse(
                "direct tree access outside a transaction".into(),
            ));
        }
        self.invalidate_cache();
        Ok(&mut self.tree)
    }

    // ---- ids and names --------------------------------------------------

    /// Smallest positive id not used by `attribute` among the matches of
    /// `path`.
    ///
    /// # Errors
    ///
    /// [`DbError::Overflow`] when the namespace of `attribute` is exhausted.
    pub fn available_id(&self, path: &str, attribute: &str) -> Result<String> {
        let elements = self.get_elements(path)?;
        let max = self.limits.max_for_attribute(attribute);
        ids::first_free(elements.iter().filter_map(|e| e.attribute(attribute)), max)
            .map(|id| id.to_string())
            .ok_or_else(|| DbError::Overflow {
                attribute: attribute.into(),
                max,
            })
    }

    /// `desired`, or `desired` followed by the smallest number that no
    /// element of `path` carries in its `name_field` child.
    pub fn to_unique_text(&self, path: &str, name_field: &str, desired: &str) -> Result<String> {
        let taken = |text: &str| -> Result<bool> {
            let filtered = format!("{path}[{name_field}={}]", path::quote(text));
            Ok(!self.select(&filtered)?.is_empty())
        };

        let mut text = desired.to_string();
        let mut seq = 0u32;
        while taken(&text)? {
            seq += 1;
            text = format!("{desired}{seq}");
        }
        Ok(text)
    }

    // ---- change counter -------------------------------------------------

    /// Number of counted mutations, including those pending in an open
    /// transaction.
    pub fn config_count(&self) -> u64 {
        self.config_count + self.txn.as_ref().map_or(0, |t| t.pending)
    }

    /// Whether the document changed since it was created, loaded or saved.
    pub fn is_modified(&self) -> bool {
        self.config_count() != self.saved_count
    }

    pub fn mark_saved(&mut self) {
        self.saved_count = self.config_count();
    }

    pub(crate) fn bump(&mut self, n: u64) {
        self.invalidate_cache();
        match &mut self.txn {
            Some(txn) => txn.pending += n,
            None => self.config_count += n,
        }
    }

    pub(crate) fn commit_count(&mut self, n: u64) {
        self.config_count += n;
    }

    pub(crate) fn invalidate_cache(&self) {
        self.floats.borrow_mut().clear();
    }

    /// Record a rejected value on the open transaction and turn it into an
    /// error.
    pub(crate) fn reject(&mut self, error: ValueError) -> DbError {
        debug!("rejected: {error}");
        if let Some(txn) = &mut self.txn {
            txn.errors.push(error.clone());
        }
        DbError::Value(error)
    }

    /// Run `f` on the store, restoring the tree if it fails or, with
    /// `revalidate`, if the result is not valid against the schema.
    pub(crate) fn guarded<T>(
        &mut self,
        revalidate: bool,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let backup = self.tree.clone();
        let result = f(self).and_then(|v| {
            if revalidate {
                self.schema.validate(&self.tree)?;
            }
            Ok(v)
        });
        if result.is_err() {
            self.tree = backup;
        }
        self.invalidate_cache();
        result
    }
}
