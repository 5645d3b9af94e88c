//! A small mutable XML element tree.
//!
//! Package parts are parsed with `roxmltree` into owned [`Element`]s so they can
//! be edited in place, then written back with `quick-xml`. Qualified names are
//! kept exactly as the source used them (`w:p`, `xml:space`, `xmlns:w`), which
//! keeps the template's namespace prefixes stable across a round trip.
//! Comments and processing instructions inside the root element are carried
//! through; anything outside the root besides the declaration is not.

use quick_xml::events::{BytesDecl, BytesEnd, BytesPI, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{DocxError, Result};

const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// A child of an [`Element`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    ProcessingInstruction {
        target: String,
        value: Option<String>,
    },
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }
}

impl From<Element> for Node {
    fn from(el: Element) -> Self {
        Node::Element(el)
    }
}

/// An owned XML element with its qualified name, attributes and children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder-style child append.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Builder-style text append.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(Node::Text(text.into()));
        self
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing the value if it already exists.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// Append a child element and return a mutable reference to it.
    pub fn push(&mut self, child: Element) -> &mut Element {
        self.children.push(Node::Element(child));
        match self.children.last_mut() {
            Some(Node::Element(el)) => el,
            _ => unreachable!("just pushed an element"),
        }
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(Node::Text(text.into()));
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.child_elements().filter(move |el| el.name == name)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.child_elements().find(|el| el.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.child_elements_mut().find(|el| el.name == name)
    }

    /// Return the named child, creating it at the end when absent.
    pub fn child_or_insert(&mut self, name: &str) -> &mut Element {
        let pos = self
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(el) if el.name == name));
        let idx = match pos {
            Some(idx) => idx,
            None => {
                self.children.push(Node::Element(Element::new(name)));
                self.children.len() - 1
            }
        };
        match &mut self.children[idx] {
            Node::Element(el) => el,
            _ => unreachable!("position matched an element"),
        }
    }

    /// Concatenated text of the direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children.clear();
        self.children.push(Node::Text(text.into()));
    }

    pub fn remove_children_named(&mut self, name: &str) {
        self.children
            .retain(|n| !matches!(n, Node::Element(el) if el.name == name));
    }

    /// Pre-order walk over every descendant element (self excluded).
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        fn walk<'a>(el: &'a Element, out: &mut Vec<&'a Element>) {
            for child in el.child_elements() {
                out.push(child);
                walk(child, out);
            }
        }
        walk(self, &mut out);
        out
    }

    /// Pre-order walk over every descendant element with mutable access.
    pub fn for_each_descendant_mut(&mut self, f: &mut impl FnMut(&mut Element)) {
        for child in self.child_elements_mut() {
            f(child);
            child.for_each_descendant_mut(f);
        }
    }
}

/// A parsed XML part: the root element plus the knowledge of how to write it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlDocument {
    pub root: Element,
}

impl XmlDocument {
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Parse a part. `part` only labels errors.
    pub fn parse(part: &str, bytes: &[u8]) -> Result<Self> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let text = std::str::from_utf8(bytes)?;
        let doc = roxmltree::Document::parse(text).map_err(|source| DocxError::Xml {
            part: part.to_string(),
            source,
        })?;
        let root = convert(doc.root_element(), &[]);
        Ok(Self { root })
    }

    /// Serialize with a standalone UTF-8 declaration.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new(Vec::new());
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        write_element(&mut writer, &self.root)?;
        Ok(writer.into_inner())
    }
}

type NsBinding = (Option<String>, String);

fn convert(node: roxmltree::Node<'_, '_>, parent_ns: &[NsBinding]) -> Element {
    let tag = node.tag_name();
    let name = qualify(node, tag.namespace(), tag.name());

    let in_scope: Vec<NsBinding> = node
        .namespaces()
        .filter(|ns| ns.name() != Some("xml"))
        .map(|ns| (ns.name().map(str::to_string), ns.uri().to_string()))
        .collect();

    let mut attributes = Vec::new();
    for (prefix, uri) in &in_scope {
        if parent_ns.iter().any(|(p, u)| p == prefix && u == uri) {
            continue;
        }
        let key = match prefix {
            Some(p) => format!("xmlns:{p}"),
            None => "xmlns".to_string(),
        };
        attributes.push((key, uri.clone()));
    }
    for attr in node.attributes() {
        let key = qualify(node, attr.namespace(), attr.name());
        attributes.push((key, attr.value().to_string()));
    }

    let mut children = Vec::new();
    for child in node.children() {
        if child.is_element() {
            children.push(Node::Element(convert(child, &in_scope)));
        } else if child.is_text() {
            if let Some(text) = child.text() {
                children.push(Node::Text(text.to_string()));
            }
        } else if child.is_comment() {
            children.push(Node::Comment(child.text().unwrap_or_default().to_string()));
        } else if let Some(pi) = child.pi() {
            children.push(Node::ProcessingInstruction {
                target: pi.target.to_string(),
                value: pi.value.map(str::to_string),
            });
        }
    }

    Element {
        name,
        attributes,
        children,
    }
}

fn qualify(node: roxmltree::Node<'_, '_>, ns: Option<&str>, local: &str) -> String {
    let Some(uri) = ns else {
        return local.to_string();
    };
    if uri == XML_NS {
        return format!("xml:{local}");
    }
    let prefix = node
        .namespaces()
        .filter(|binding| binding.uri() == uri)
        .find_map(|binding| binding.name());
    match prefix {
        Some(p) => format!("{p}:{local}"),
        // default namespace
        None => local.to_string(),
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, el: &Element) -> Result<()> {
    let mut start = BytesStart::new(el.name.as_str());
    for (key, value) in &el.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }
    if el.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }
    writer.write_event(Event::Start(start))?;
    for child in &el.children {
        match child {
            Node::Element(inner) => write_element(writer, inner)?,
            Node::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            Node::Comment(text) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(text.as_str())))?
            }
            Node::ProcessingInstruction { target, value } => {
                let content = match value {
                    Some(v) => format!("{target} {v}"),
                    None => target.clone(),
                };
                writer.write_event(Event::PI(BytesPI::new(content)))?
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body><w:p><w:r><w:t xml:space="preserve"> a &amp; b </w:t></w:r></w:p></w:body></w:document>"#;

    #[test]
    fn test_parse_keeps_prefixes_and_declarations() {
        let doc = XmlDocument::parse("word/document.xml", DOC.as_bytes()).unwrap();
        assert_eq!(doc.root.name, "w:document");
        assert_eq!(
            doc.root.attr("xmlns:w"),
            Some("http://schemas.openxmlformats.org/wordprocessingml/2006/main")
        );
        let body = doc.root.child("w:body").unwrap();
        let t = body.descendants().into_iter().find(|e| e.is("w:t")).unwrap();
        assert_eq!(t.attr("xml:space"), Some("preserve"));
        assert_eq!(t.text(), " a & b ");
    }

    #[test]
    fn test_write_escapes_and_reparses() {
        let doc = XmlDocument::parse("word/document.xml", DOC.as_bytes()).unwrap();
        let bytes = doc.to_bytes().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>"));
        assert!(text.contains("a &amp; b"));
        assert!(!text.contains("xmlns:xml"));
        let again = XmlDocument::parse("word/document.xml", &bytes).unwrap();
        assert_eq!(again, doc);
    }

    #[test]
    fn test_default_namespace_stays_unprefixed() {
        let xml = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="t" Target="styles.xml"/></Relationships>"#;
        let doc = XmlDocument::parse("rels", xml.as_bytes()).unwrap();
        assert_eq!(doc.root.name, "Relationships");
        let rel = doc.root.child("Relationship").unwrap();
        assert_eq!(rel.attr("Id"), Some("rId1"));
        let out = String::from_utf8(doc.to_bytes().unwrap()).unwrap();
        assert!(out.contains(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#
        ));
    }

    #[test]
    fn test_child_or_insert_and_set_attr() {
        let mut el = Element::new("w:settings");
        el.child_or_insert("w:updateFields").set_attr("w:val", "false");
        el.child_or_insert("w:updateFields").set_attr("w:val", "true");
        assert_eq!(el.children_named("w:updateFields").count(), 1);
        assert_eq!(
            el.child("w:updateFields").and_then(|u| u.attr("w:val")),
            Some("true")
        );
    }

    #[test]
    fn test_comments_and_instructions_survive_round_trip() {
        let xml = r#"<w:hdr xmlns:w="urn:w"><!-- keep <me> --><?mso-application progid="Word.Document"?><w:p/></w:hdr>"#;
        let doc = XmlDocument::parse("word/header1.xml", xml.as_bytes()).unwrap();
        assert_eq!(doc.root.children[0], Node::Comment(" keep <me> ".to_string()));
        assert_eq!(
            doc.root.children[1],
            Node::ProcessingInstruction {
                target: "mso-application".to_string(),
                value: Some(r#"progid="Word.Document""#.to_string()),
            }
        );
        assert_eq!(doc.root.child_elements().count(), 1);

        let out = String::from_utf8(doc.to_bytes().unwrap()).unwrap();
        assert!(out.contains("<!-- keep <me> -->"));
        assert!(out.contains(r#"<?mso-application progid="Word.Document"?>"#));
        assert_eq!(XmlDocument::parse("word/header1.xml", out.as_bytes()).unwrap(), doc);
    }

    #[test]
    fn test_malformed_part_reports_name() {
        let err = XmlDocument::parse("word/settings.xml", b"<a><b></a>").unwrap_err();
        assert!(err.to_string().contains("word/settings.xml"));
    }
}
