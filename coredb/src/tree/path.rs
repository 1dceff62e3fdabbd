//! Path expressions used to address elements.
//!
//! The language is the ElementPath subset the configuration code relies on:
//! child (`a/b`) and descendant (`.//b`) steps, `*`, `.`, `..`, and the
//! predicates `[tag]`, `[tag="v"]`, `[tag!="v"]`, `[@attr]`, `[@attr="v"]`,
//! `[@attr!="v"]`, `[.="v"]`, `[N]` and `[last()]`. A leading `/` addresses
//! the children of the document root.

use crate::error::{DbError, Result};

use super::element::{Element, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    Name(String),
    Any,
    SelfNode,
    Parent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    HasChild(String),
    ChildText {
        tag: String,
        value: String,
        negate: bool,
    },
    HasAttribute(String),
    Attribute {
        name: String,
        value: String,
        negate: bool,
    },
    Text(String),
    Position(usize),
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpr {
    steps: Vec<Step>,
}

impl PathExpr {
    /// Parse an expression.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Path`] when the expression is malformed.
    pub fn parse(path: &str) -> Result<Self> {
        let err = |reason: &str| DbError::Path {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        let segments = split_segments(path.trim()).map_err(|r| err(r))?;
        let mut segments = segments.as_slice();
        if segments.first().is_some_and(|s| s.is_empty()) {
            // leading '/' or '//'
            segments = &segments[1..];
        }
        if segments.is_empty() {
            return Err(err("empty path"));
        }

        let mut steps = Vec::new();
        let mut axis = Axis::Child;
        for (i, seg) in segments.iter().enumerate() {
            if seg.is_empty() {
                if i + 1 == segments.len() || axis == Axis::Descendant {
                    return Err(err("dangling '/'"));
                }
                axis = Axis::Descendant;
                continue;
            }
            steps.push(parse_step(seg, axis).map_err(|r| err(&r))?);
            axis = Axis::Child;
        }

        Ok(Self { steps })
    }

    /// Evaluate against `root`, returning matches in document order.
    pub fn select(&self, root: &Element) -> Vec<NodeId> {
        let mut context: Vec<NodeId> = vec![Vec::new()];

        for step in &self.steps {
            let mut next = Vec::new();
            for id in &context {
                let Some(node) = root.get(id) else {
                    continue;
                };
                match (&step.test, step.axis) {
                    (NodeTest::Parent, _) => {
                        if let Some((_, parent)) = id.split_last() {
                            next.push(parent.to_vec());
                        }
                    }
                    (NodeTest::SelfNode, Axis::Child) => next.push(id.clone()),
                    (test, Axis::Child) => {
                        for (i, child) in node.children().iter().enumerate() {
                            if matches_test(test, child) {
                                let mut cid = id.clone();
                                cid.push(i);
                                next.push(cid);
                            }
                        }
                    }
                    (test, Axis::Descendant) => {
                        node.walk(&mut |rel, e| {
                            let is_self = rel.is_empty();
                            let hit = match test {
                                NodeTest::SelfNode => true,
                                _ => !is_self && matches_test(test, e),
                            };
                            if hit {
                                let mut cid = id.clone();
                                cid.extend_from_slice(rel);
                                next.push(cid);
                            }
                        });
                    }
                }
            }
            next.sort();
            next.dedup();

            for predicate in &step.predicates {
                next.retain(|id| root.get(id).is_some_and(|e| eval_predicate(predicate, root, id, e)));
            }
            context = next;
        }

        context
    }
}

/// Parse and evaluate in one go.
pub fn select(root: &Element, path: &str) -> Result<Vec<NodeId>> {
    Ok(PathExpr::parse(path)?.select(root))
}

/// Quote a literal for use inside a predicate.
///
/// Inside a literal a backslash takes the next character as is, so any text
/// can be matched.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Quote state of a scan over a path expression.
#[derive(Default)]
struct Literal {
    open: Option<char>,
    escaped: bool,
}

impl Literal {
    /// Feed `c`; returns true while `c` belongs to a literal.
    fn step(&mut self, c: char, may_open: bool) -> bool {
        match self.open {
            Some(_) if self.escaped => self.escaped = false,
            Some(_) if c == '\\' => self.escaped = true,
            Some(q) if c == q => self.open = None,
            Some(_) => {}
            None if may_open && matches!(c, '"' | '\'') => self.open = Some(c),
            None => return false,
        }
        true
    }

    fn is_open(&self) -> bool {
        self.open.is_some()
    }
}

fn matches_test(test: &NodeTest, e: &Element) -> bool {
    match test {
        NodeTest::Name(name) => &e.tag == name,
        NodeTest::Any => true,
        NodeTest::SelfNode | NodeTest::Parent => false,
    }
}

fn text_content(e: &Element) -> String {
    let mut out = String::new();
    e.walk(&mut |_, n| {
        if let Some(t) = n.text() {
            out.push_str(t);
        }
    });
    out
}

fn eval_predicate(p: &Predicate, root: &Element, id: &[usize], e: &Element) -> bool {
    match p {
        Predicate::HasChild(tag) => e.child(tag).is_some(),
        Predicate::ChildText { tag, value, negate } => e
            .children()
            .iter()
            .filter(|c| &c.tag == tag)
            .any(|c| (text_content(c) == *value) != *negate),
        Predicate::HasAttribute(name) => e.has_attribute(name),
        Predicate::Attribute {
            name,
            value,
            negate,
        } => e
            .attribute(name)
            .is_some_and(|v| (v == value) != *negate),
        Predicate::Text(value) => text_content(e) == *value,
        Predicate::Position(_) | Predicate::Last => {
            let Some((&idx, parent_id)) = id.split_last() else {
                return false;
            };
            let Some(parent) = root.get(parent_id) else {
                return false;
            };
            let same: Vec<usize> = parent
                .children()
                .iter()
                .enumerate()
                .filter(|(_, c)| c.tag == e.tag)
                .map(|(i, _)| i)
                .collect();
            let wanted = match p {
                Predicate::Position(n) => same.get(n - 1),
                _ => same.last(),
            };
            wanted == Some(&idx)
        }
    }
}

fn split_segments(path: &str) -> std::result::Result<Vec<&str>, &'static str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut literal = Literal::default();
    let mut start = 0;

    for (i, c) in path.char_indices() {
        if literal.step(c, depth > 0) {
            continue;
        }
        match c {
            '[' => depth += 1,
            ']' => depth = depth.checked_sub(1).ok_or("unbalanced ']'")?,
            '/' if depth == 0 => {
                segments.push(&path[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if literal.is_open() {
        return Err("unterminated string literal");
    }
    if depth != 0 {
        return Err("unbalanced '['");
    }
    segments.push(&path[start..]);
    Ok(segments)
}

fn parse_step(seg: &str, axis: Axis) -> std::result::Result<Step, String> {
    let (name, mut rest) = match seg.find('[') {
        Some(i) => (&seg[..i], &seg[i..]),
        None => (seg, ""),
    };

    let test = match name.trim() {
        "*" => NodeTest::Any,
        "." => NodeTest::SelfNode,
        ".." => NodeTest::Parent,
        n if is_name(n) => NodeTest::Name(n.to_string()),
        n => return Err(format!("invalid step `{n}`")),
    };

    let mut predicates = Vec::new();
    while !rest.is_empty() {
        let body = bracket_body(rest).ok_or_else(|| format!("invalid predicate in `{seg}`"))?;
        predicates.push(parse_predicate(body)?);
        rest = rest[body.len() + 2..].trim_start();
    }

    if matches!(test, NodeTest::Parent) && !predicates.is_empty() {
        return Err("predicates are not allowed on '..'".into());
    }

    Ok(Step {
        axis,
        test,
        predicates,
    })
}

/// Content of the leading `[...]` group of `s`.
fn bracket_body(s: &str) -> Option<&str> {
    let s = s.strip_prefix('[')?;
    let mut literal = Literal::default();
    for (i, c) in s.char_indices() {
        if !literal.step(c, true) && c == ']' {
            return Some(&s[..i]);
        }
    }
    None
}

fn parse_predicate(body: &str) -> std::result::Result<Predicate, String> {
    let body = body.trim();
    if body == "last()" {
        return Ok(Predicate::Last);
    }
    if let Ok(n) = body.parse::<usize>() {
        if n == 0 {
            return Err("positions start at 1".into());
        }
        return Ok(Predicate::Position(n));
    }

    let (lhs, op, value) = match body.find('=') {
        Some(i) => {
            let (lhs, negate) = match body[..i].strip_suffix('!') {
                Some(l) => (l.trim(), true),
                None => (body[..i].trim(), false),
            };
            (lhs, Some(negate), Some(unquote(body[i + 1..].trim())?))
        }
        None => (body, None, None),
    };

    if let Some(attr) = lhs.strip_prefix('@') {
        if !is_name(attr) {
            return Err(format!("invalid attribute name `{attr}`"));
        }
        return Ok(match (op, value) {
            (Some(negate), Some(value)) => Predicate::Attribute {
                name: attr.to_string(),
                value,
                negate,
            },
            _ => Predicate::HasAttribute(attr.to_string()),
        });
    }

    if lhs == "." {
        return match (op, value) {
            (Some(false), Some(value)) => Ok(Predicate::Text(value)),
            _ => Err("'.' predicates must compare with '='".into()),
        };
    }

    if !is_name(lhs) {
        return Err(format!("invalid predicate `{body}`"));
    }
    Ok(match (op, value) {
        (Some(negate), Some(value)) => Predicate::ChildText {
            tag: lhs.to_string(),
            value,
            negate,
        },
        _ => Predicate::HasChild(lhs.to_string()),
    })
}

fn unquote(s: &str) -> std::result::Result<String, String> {
    let invalid = || format!("expected a quoted literal, found `{s}`");
    let mut chars = s.chars();
    let q = chars.next().filter(|c| matches!(c, '"' | '\'')).ok_or_else(invalid)?;

    let mut out = String::new();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(chars.next().ok_or_else(invalid)?),
            c if c == q => {
                return match chars.next() {
                    None => Ok(out),
                    Some(_) => Err(invalid()),
                };
            }
            c => out.push(c),
        }
    }
    Err(invalid())
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::xml;

    fn doc() -> Element {
        xml::parse(
            r#"<configuration>
                <general><timeTransient>false</timeTransient></general>
                <regions>
                    <region>
                        <name>r1</name>
                        <cellZones>
                            <cellZone czid="1"><name>All</name><zoneType>none</zoneType></cellZone>
                            <cellZone czid="2"><name>z1</name><zoneType>mrf</zoneType></cellZone>
                        </cellZones>
                    </region>
                    <region>
                        <name>r2</name>
                        <cellZones>
                            <cellZone czid="3"><name>All</name><zoneType>none</zoneType></cellZone>
                        </cellZones>
                    </region>
                </regions>
            </configuration>"#,
        )
        .unwrap()
    }

    fn texts(root: &Element, path: &str) -> Vec<String> {
        select(root, path)
            .unwrap()
            .iter()
            .map(|id| root.get(id).and_then(Element::text).unwrap_or("").to_string())
            .collect()
    }

    #[test]
    fn test_absolute_and_relative_paths_agree() {
        let root = doc();
        assert_eq!(texts(&root, "/general/timeTransient"), ["false"]);
        assert_eq!(texts(&root, "general/timeTransient"), ["false"]);
        assert!(select(&root, "/timeTransient").unwrap().is_empty());
    }

    #[test]
    fn test_descendant_axis() {
        let root = doc();
        assert_eq!(select(&root, ".//cellZone").unwrap().len(), 3);
        assert_eq!(select(&root, "//cellZone").unwrap().len(), 3);
        assert_eq!(
            texts(&root, "regions//cellZone[@czid=\"2\"]/name"),
            ["z1"]
        );
    }

    #[test]
    fn test_predicates() {
        let root = doc();
        assert_eq!(
            texts(&root, "/regions/region[name=\"r1\"]/cellZones/cellZone/name"),
            ["All", "z1"]
        );
        assert_eq!(
            texts(&root, "/regions/region/cellZones/cellZone[zoneType!='none']/name"),
            ["z1"]
        );
        assert_eq!(select(&root, ".//*[@czid]").unwrap().len(), 3);
        assert_eq!(
            texts(&root, ".//cellZone[@czid!=\"1\"][zoneType=\"none\"]/name"),
            ["All"]
        );
        assert_eq!(texts(&root, "/regions/region[2]/name"), ["r2"]);
        assert_eq!(texts(&root, "/regions/region[last()]/name"), ["r2"]);
        assert_eq!(texts(&root, ".//name[.=\"z1\"]"), ["z1"]);
    }

    #[test]
    fn test_parent_step_deduplicates() {
        let root = doc();
        let ids = select(&root, ".//cellZone/..").unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(
            texts(&root, "/regions/region/cellZones/cellZone[@czid=\"3\"]/../../name"),
            ["r2"]
        );
    }

    #[test]
    fn test_literal_may_contain_slash_and_brackets() {
        let root = Element::new("c")
            .with_child(Element::new("m").with_child(Element::new("name").with_text("a/b[1]")));
        let path = format!("/m[name={}]", quote("a/b[1]"));
        assert_eq!(select(&root, &path).unwrap().len(), 1);
    }

    #[test]
    fn test_literal_with_both_quote_kinds() {
        for name in ["z\"1'", "a\"b'c", "back\\slash\\", "'", "\""] {
            let root = Element::new("c")
                .with_child(Element::new("m").with_child(Element::new("name").with_text(name)))
                .with_child(Element::new("m").with_child(Element::new("name").with_text("other")));
            let path = format!("/m[name={}]/name", quote(name));
            assert_eq!(texts(&root, &path), [name], "{path}");
        }
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
    }

    #[test]
    fn test_malformed_paths() {
        for bad in [
            "",
            "/",
            "a//",
            "a[",
            "a[@]",
            "a[name=x]",
            "a[0]",
            "a b",
            "..[1]",
            "a[name=\"x\\\"]",
            "a[name=\"x\"y\"]",
        ] {
            assert!(
                matches!(PathExpr::parse(bad), Err(DbError::Path { .. })),
                "accepted {bad:?}"
            );
        }
    }
}
