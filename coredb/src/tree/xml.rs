//! XML reading and writing for [`Element`] trees.
//!
//! Namespace declarations are dropped on read and tags are reduced to their
//! local name; the document namespace is written back on the root element.

use quick_xml::{
    Reader, Writer,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
};

use crate::error::{DbError, Result};

use super::element::Element;

/// Parse an XML document or fragment into its root element.
pub fn parse(text: &str) -> Result<Element> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<(Element, String)> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event().map_err(DbError::xml)? {
            Event::Start(start) => {
                if root.is_some() {
                    return Err(DbError::Xml("content after the root element".into()));
                }
                stack.push((start_element(&start)?, String::new()));
            }
            Event::Empty(start) => {
                let element = start_element(&start)?;
                close(element, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let (mut element, text) = stack
                    .pop()
                    .ok_or_else(|| DbError::Xml("unbalanced end tag".into()))?;
                if element.children().is_empty() {
                    if !text.is_empty() {
                        element.set_text(Some(text));
                    }
                } else if !text.trim().is_empty() {
                    // indentation between children is not content
                    element.set_text(Some(text.trim().to_string()));
                }
                close(element, &mut stack, &mut root)?;
            }
            Event::Text(t) => {
                let s = t.unescape().map_err(DbError::xml)?;
                if let Some((_, text)) = stack.last_mut() {
                    text.push_str(&s);
                }
            }
            Event::CData(c) => {
                let raw = c.into_inner();
                if let Some((_, text)) = stack.last_mut() {
                    text.push_str(&String::from_utf8_lossy(&raw));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DbError::Xml("unexpected end of document".into()));
    }
    root.ok_or_else(|| DbError::Xml("document has no root element".into()))
}

fn start_element(start: &BytesStart<'_>) -> Result<Element> {
    let tag = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let mut element = Element::new(tag);
    for attr in start.attributes() {
        let attr = attr.map_err(DbError::xml)?;
        let key = attr.key.as_ref();
        if key == b"xmlns" || key.starts_with(b"xmlns:") {
            continue;
        }
        let name = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value().map_err(DbError::xml)?;
        element.set_attribute(&name, value.into_owned());
    }
    Ok(element)
}

fn close(
    element: Element,
    stack: &mut [(Element, String)],
    root: &mut Option<Element>,
) -> Result<()> {
    match stack.last_mut() {
        Some((parent, _)) => parent.push(element),
        None => {
            if root.is_some() {
                return Err(DbError::Xml("multiple root elements".into()));
            }
            *root = Some(element);
        }
    }
    Ok(())
}

/// Serialize a whole document with an XML declaration.
///
/// `namespace` is declared as the default namespace on the root element.
pub fn to_document(root: &Element, namespace: Option<&str>) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(DbError::xml)?;
    write_element(&mut writer, root, namespace)?;
    finish(writer)
}

/// Serialize an element without declaration or namespace.
pub fn to_fragment(element: &Element) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_element(&mut writer, element, None)?;
    finish(writer)
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String> {
    String::from_utf8(writer.into_inner()).map_err(DbError::xml)
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    e: &Element,
    namespace: Option<&str>,
) -> Result<()> {
    let mut start = BytesStart::new(e.tag.as_str());
    if let Some(ns) = namespace {
        start.push_attribute(("xmlns", ns));
    }
    start.extend_attributes(e.attributes());

    if e.children().is_empty() && e.text().is_none() {
        return writer.write_event(Event::Empty(start)).map_err(DbError::xml);
    }

    writer.write_event(Event::Start(start)).map_err(DbError::xml)?;
    if let Some(text) = e.text() {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(DbError::xml)?;
    }
    for child in e.children() {
        write_element(writer, child, None)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(e.tag.as_str())))
        .map_err(DbError::xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_namespace_and_whitespace() {
        let doc = r#"<?xml version="1.0" encoding="UTF-8"?>
            <configuration xmlns="http://www.baramcfd.org/baram" version="2">
                <general>
                    <timeTransient>false</timeTransient>
                    <empty/>
                    <blank></blank>
                </general>
            </configuration>"#;
        let root = parse(doc).unwrap();
        assert_eq!(root.tag, "configuration");
        assert_eq!(root.attribute("version"), Some("2"));
        assert!(root.attribute("xmlns").is_none());
        assert!(root.text().is_none());

        let general = root.child("general").unwrap();
        assert!(general.text().is_none());
        assert_eq!(general.child_text("timeTransient"), Some("false"));
        assert!(general.child("empty").unwrap().text().is_none());
        assert!(general.child("blank").unwrap().text().is_none());
    }

    #[test]
    fn test_escaping_survives_a_round_trip() {
        let root = Element::new("a")
            .with_attribute("q", "x\"<y>")
            .with_child(Element::new("b").with_text("1 < 2 & 3"));
        let text = to_document(&root, Some("urn:test")).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(text.contains("xmlns=\"urn:test\""));
        assert_eq!(parse(&text).unwrap(), root);
    }

    #[test]
    fn test_mixed_content_keeps_trimmed_text() {
        let root = Element::new("a")
            .with_text("note")
            .with_child(Element::new("b").with_text("1"));
        assert_eq!(parse(&to_fragment(&root).unwrap()).unwrap(), root);
    }

    #[test]
    fn test_writer_indents_children() {
        let root = Element::new("a")
            .with_child(Element::new("b").with_child(Element::new("c").with_text("1")))
            .with_child(Element::new("d"));
        assert_eq!(
            to_fragment(&root).unwrap(),
            "<a>\n  <b>\n    <c>1</c>\n  </b>\n  <d/>\n</a>"
        );
    }

    #[test]
    fn test_malformed_input_is_rejected() {
        assert!(matches!(parse("<a><b></a>"), Err(DbError::Xml(_))));
        assert!(matches!(parse(""), Err(DbError::Xml(_))));
        assert!(matches!(parse("<a/><b/>"), Err(DbError::Xml(_))));
    }
}
