/// Location of an element as child indices from the document root.
///
/// The root itself is the empty location.
pub type NodeId = Vec<usize>;

/// One node of the configuration tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Local tag name.
    pub tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: Option<String>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Builder style helper that sets the text.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder style helper that sets an attribute.
    pub fn with_attribute(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder style helper that appends a child.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn set_text(&mut self, text: Option<String>) {
        self.text = text;
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Set an attribute, returning the previous value.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) -> Option<String> {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => Some(std::mem::replace(v, value)),
            None => {
                self.attributes.push((name.to_string(), value));
                None
            }
        }
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        let idx = self.attributes.iter().position(|(k, _)| k == name)?;
        Some(self.attributes.remove(idx).1)
    }

    /// Attributes in document order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Element> {
        &mut self.children
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    /// First child with the given tag.
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.tag == tag)
    }

    pub fn child_mut(&mut self, tag: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|c| c.tag == tag)
    }

    /// Text of the first child with the given tag.
    pub fn child_text(&self, tag: &str) -> Option<&str> {
        self.child(tag).and_then(Element::text)
    }

    /// Remove attributes, children and text, keeping the tag.
    pub fn clear(&mut self) {
        self.attributes.clear();
        self.children.clear();
        self.text = None;
    }

    /// Whether the element has neither attributes, children nor text.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.children.is_empty() && self.text.is_none()
    }

    /// Element at `id` relative to `self`.
    pub fn get(&self, id: &[usize]) -> Option<&Element> {
        let mut node = self;
        for &i in id {
            node = node.children.get(i)?;
        }
        Some(node)
    }

    pub fn get_mut(&mut self, id: &[usize]) -> Option<&mut Element> {
        let mut node = self;
        for &i in id {
            node = node.children.get_mut(i)?;
        }
        Some(node)
    }

    /// Remove and return the element at `id`. The root cannot be removed.
    pub fn remove(&mut self, id: &[usize]) -> Option<Element> {
        let (last, parent) = id.split_last()?;
        let parent = self.get_mut(parent)?;
        if *last < parent.children.len() {
            Some(parent.children.remove(*last))
        } else {
            None
        }
    }

    /// Visit `self` and every descendant in document order.
    pub fn walk<'a>(&'a self, f: &mut impl FnMut(&[usize], &'a Element)) {
        fn inner<'a>(
            node: &'a Element,
            id: &mut NodeId,
            f: &mut impl FnMut(&[usize], &'a Element),
        ) {
            f(id, node);
            for (i, child) in node.children.iter().enumerate() {
                id.push(i);
                inner(child, id, f);
                id.pop();
            }
        }
        inner(self, &mut Vec::new(), f);
    }

    /// Every descendant (excluding `self`) carrying the attribute.
    pub fn descendants_with_attribute<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        self.walk(&mut |id, e| {
            if !id.is_empty() && e.has_attribute(name) {
                found.push(e);
            }
        });
        found
    }

    /// Tag names from `self` down to `id`, joined with `/`, `self` excluded.
    pub fn tag_path(&self, id: &[usize]) -> Option<String> {
        let mut node = self;
        let mut tags = Vec::with_capacity(id.len());
        for &i in id {
            node = node.children.get(i)?;
            tags.push(node.tag.as_str());
        }
        Some(tags.join("/"))
    }

    /// Readable location such as `/regions/region[2]/name` used in messages.
    pub fn describe(&self, id: &[usize]) -> String {
        let mut node = self;
        let mut out = String::new();
        for &i in id {
            let Some(child) = node.children.get(i) else {
                break;
            };
            let same = node.children.iter().filter(|c| c.tag == child.tag).count();
            out.push('/');
            out.push_str(&child.tag);
            if same > 1 {
                let pos = node.children[..i]
                    .iter()
                    .filter(|c| c.tag == child.tag)
                    .count();
                out.push_str(&format!("[{}]", pos + 1));
            }
            node = child;
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }
}
