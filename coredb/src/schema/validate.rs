use crate::{
    error::{DbError, Result},
    tree::Element,
};

use super::{Content, ElementDecl, Schema};

impl Schema {
    /// Validate a whole document against the schema.
    ///
    /// Checks the root tag, child order and occurrence bounds, declared and
    /// required attributes, and the lexical form and facets of every value.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::SchemaViolation`] describing the first problem found.
    pub fn validate(&self, root: &Element) -> Result<()> {
        let decl = self.root();
        if root.tag != decl.name {
            return Err(DbError::SchemaViolation {
                path: "/".into(),
                reason: format!("root element must be `{}`, found `{}`", decl.name, root.tag),
            });
        }
        let mut id = Vec::new();
        self.validate_element(decl, root, root, &mut id)
    }

    fn validate_element(
        &self,
        decl: &ElementDecl,
        element: &Element,
        root: &Element,
        id: &mut Vec<usize>,
    ) -> Result<()> {
        let violation = |id: &[usize], reason: String| DbError::SchemaViolation {
            path: root.describe(id),
            reason,
        };

        for (name, value) in element.attributes() {
            let Some(attr) = decl.attribute(name) else {
                return Err(violation(id, format!("undeclared attribute `{name}`")));
            };
            if let Some(field) = &attr.field {
                if let Err(kind) = field.normalize(value.trim()) {
                    return Err(violation(
                        id,
                        format!("attribute `{name}`=\"{value}\": {kind}"),
                    ));
                }
            }
        }
        for attr in decl.attributes.iter().filter(|a| a.required) {
            if !element.has_attribute(&attr.name) {
                return Err(violation(id, format!("missing attribute `{}`", attr.name)));
            }
        }

        match &decl.content {
            Content::Simple(field) => {
                if let Some(child) = element.children().first() {
                    return Err(violation(
                        id,
                        format!("unexpected element `{}` in a value", child.tag),
                    ));
                }
                let text = element.text().unwrap_or("");
                if let Err(kind) = field.normalize(text.trim()) {
                    return Err(violation(id, format!("value \"{text}\": {kind}")));
                }
                Ok(())
            }
            Content::Elements(children) => {
                if element.text().is_some_and(|t| !t.trim().is_empty()) {
                    return Err(violation(id, "unexpected text content".into()));
                }

                let actual = element.children();
                let mut i = 0;
                for &child_id in children {
                    let child_decl = self.decl(child_id);
                    let mut count = 0u32;
                    while let Some(child) = actual.get(i).filter(|c| c.tag == child_decl.name) {
                        id.push(i);
                        self.validate_element(child_decl, child, root, id)?;
                        id.pop();
                        count += 1;
                        i += 1;
                    }
                    if count < child_decl.min_occurs {
                        return Err(violation(
                            id,
                            format!("missing element `{}`", child_decl.name),
                        ));
                    }
                    if child_decl.max_occurs.is_some_and(|max| count > max) {
                        return Err(violation(
                            id,
                            format!("too many `{}` elements", child_decl.name),
                        ));
                    }
                }
                if let Some(extra) = actual.get(i) {
                    return Err(violation(
                        id,
                        format!("unexpected element `{}`", extra.tag),
                    ));
                }
                Ok(())
            }
        }
    }
}
