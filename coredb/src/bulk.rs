//! Subtree conversion to and from JSON values.
//!
//! Attributes become `"@name"` keys, a leaf's text becomes a bare string and
//! the text of an element that also has attributes or children is kept under
//! `"$"`. A tag repeated among siblings turns into an array under that tag.

use log::debug;
use serde_json::{Map, Value};

use crate::{
    error::{DbError, Result, ValueError, ValueErrorKind},
    store::CoreDb,
    tree::Element,
};

/// Convert an element to its bulk form.
pub fn to_value(element: &Element) -> Value {
    let mut map = Map::new();
    for (name, value) in element.attributes() {
        map.insert(format!("@{name}"), Value::String(value.to_string()));
    }

    for child in element.children() {
        let value = to_value(child);
        match map.get_mut(&child.tag) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                map.insert(child.tag.clone(), value);
            }
        }
    }

    match element.text() {
        Some(text) if map.is_empty() => Value::String(text.to_string()),
        Some(text) => {
            map.insert("$".into(), Value::String(text.to_string()));
            Value::Object(map)
        }
        None => Value::Object(map),
    }
}

/// Fill `element` from a bulk object. `element` is expected to be empty.
///
/// Returns the kind of error for malformed shapes.
pub fn fill(element: &mut Element, data: &Map<String, Value>) -> std::result::Result<(), ValueErrorKind> {
    for (key, value) in data {
        if let Some(name) = key.strip_prefix('@') {
            element.set_attribute(name, scalar(value)?);
        } else if key.starts_with('$') {
            element.set_text(text(value)?);
        } else {
            match value {
                Value::Object(map) => {
                    let mut child = Element::new(key.as_str());
                    fill(&mut child, map)?;
                    element.push(child);
                }
                Value::Array(items) if items.is_empty() => element.push(Element::new(key.as_str())),
                Value::Array(items) if items[0].is_object() => {
                    for item in items {
                        let Value::Object(map) = item else {
                            return Err(ValueErrorKind::TypeMismatch);
                        };
                        let mut child = Element::new(key.as_str());
                        fill(&mut child, map)?;
                        element.push(child);
                    }
                }
                Value::Array(items) => {
                    for item in items {
                        element.push(leaf(key, item)?);
                    }
                }
                other => element.push(leaf(key, other)?),
            }
        }
    }
    Ok(())
}

fn leaf(tag: &str, value: &Value) -> std::result::Result<Element, ValueErrorKind> {
    let mut element = Element::new(tag);
    element.set_text(text(value)?);
    Ok(element)
}

/// Empty text is stored as no text, the way it reads back from XML.
fn text(value: &Value) -> std::result::Result<Option<String>, ValueErrorKind> {
    let s = scalar(value)?;
    Ok((!s.is_empty()).then_some(s))
}

fn scalar(value: &Value) -> std::result::Result<String, ValueErrorKind> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Null => Ok(String::new()),
        Value::Array(_) | Value::Object(_) => Err(ValueErrorKind::TypeMismatch),
    }
}

impl CoreDb {
    /// The subtree at the single match of `path` in bulk form.
    pub fn get_bulk(&self, path: &str) -> Result<Value> {
        let element = self.get_element(path)?;
        Ok(to_value(element))
    }

    /// Replace the content of the single match of `path` with `value`.
    ///
    /// # Errors
    ///
    /// [`DbError::Misuse`] outside a transaction. A value that is not an
    /// object, or nests in a shape the tree cannot hold, is rejected with
    /// [`ValueErrorKind::TypeMismatch`]. The document is revalidated after
    /// the replacement.
    pub fn set_bulk(&mut self, path: &str, value: &Value) -> Result<()> {
        if !self.in_transaction() {
            return Err(DbError::Misuse("set_bulk requires an open transaction".into()));
        }
        let id = self.single(path)?;
        let Value::Object(data) = value else {
            return Err(self.reject(ValueError::new(
                ValueErrorKind::TypeMismatch,
                path,
                &value.to_string(),
            )));
        };

        let mut rebuilt = Element::new(self.node(&id)?.tag.as_str());
        if let Err(kind) = fill(&mut rebuilt, data) {
            return Err(self.reject(ValueError::new(kind, path, &value.to_string())));
        }

        self.guarded(true, |db| {
            *db.node_mut(&id)? = rebuilt;
            Ok(())
        })?;
        debug!("set_bulk({path})");
        self.bump(1);
        Ok(())
    }
}
