//! Typed views over the relationship and content-type parts.

use crate::error::Result;
use crate::package::{Package, CONTENT_TYPES_PART, DOCUMENT_RELS_PART};
use crate::xml::{Element, XmlDocument};

pub const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
pub const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
pub const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

/// A relationship entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
}

/// The relationships of the main document part.
#[derive(Debug, Clone)]
pub struct Relationships {
    doc: XmlDocument,
}

impl Relationships {
    /// An empty relationships part in the default namespace.
    pub fn empty() -> Self {
        let root = Element::new("Relationships").with_attr("xmlns", RELATIONSHIPS_NS);
        Self {
            doc: XmlDocument::new(root),
        }
    }

    /// Load the document relationships, or start empty when the part is absent.
    pub fn load(package: &Package) -> Result<Self> {
        Ok(match package.xml_part(DOCUMENT_RELS_PART)? {
            Some(doc) => Self { doc },
            None => Self::empty(),
        })
    }

    pub fn store(&self, package: &mut Package) -> Result<()> {
        package.set_xml_part(DOCUMENT_RELS_PART, &self.doc)
    }

    pub fn iter(&self) -> impl Iterator<Item = Relationship> + '_ {
        self.doc
            .root
            .children_named("Relationship")
            .map(|el| Relationship {
                id: el.attr("Id").unwrap_or_default().to_string(),
                rel_type: el.attr("Type").unwrap_or_default().to_string(),
                target: el.attr("Target").unwrap_or_default().to_string(),
            })
    }

    pub fn get(&self, id: &str) -> Option<Relationship> {
        self.iter().find(|rel| rel.id == id)
    }

    /// Largest numeric suffix among `rIdN` ids; ids in any other shape are ignored.
    pub fn max_numeric_id(&self) -> u32 {
        self.doc
            .root
            .children_named("Relationship")
            .filter_map(|el| el.attr("Id"))
            .filter_map(|id| id.strip_prefix("rId"))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
    }

    /// The id the next [`Relationships::add`] will allocate.
    pub fn next_id(&self) -> String {
        format!("rId{}", self.max_numeric_id() + 1)
    }

    /// Append a relationship and return its freshly allocated id.
    pub fn add(&mut self, rel_type: &str, target: &str) -> String {
        let id = self.next_id();
        self.doc.root.push(
            Element::new("Relationship")
                .with_attr("Id", id.as_str())
                .with_attr("Type", rel_type)
                .with_attr("Target", target),
        );
        id
    }
}

/// The package-level content-type declarations.
#[derive(Debug, Clone)]
pub struct ContentTypes {
    doc: XmlDocument,
}

impl ContentTypes {
    pub fn load(package: &Package) -> Result<Option<Self>> {
        Ok(package
            .xml_part(CONTENT_TYPES_PART)?
            .map(|doc| Self { doc }))
    }

    pub fn store(&self, package: &mut Package) -> Result<()> {
        package.set_xml_part(CONTENT_TYPES_PART, &self.doc)
    }

    pub fn has_default(&self, extension: &str) -> bool {
        self.doc
            .root
            .children_named("Default")
            .filter_map(|el| el.attr("Extension"))
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }

    /// Declare a default content type for an extension. Returns `true` when
    /// the declaration was added, `false` when it already existed.
    pub fn ensure_default(&mut self, extension: &str, content_type: &str) -> bool {
        if self.has_default(extension) {
            return false;
        }
        let decl = Element::new("Default")
            .with_attr("Extension", extension)
            .with_attr("ContentType", content_type);
        // Defaults conventionally precede Overrides.
        let pos = self
            .doc
            .root
            .children
            .iter()
            .position(|n| n.as_element().is_some_and(|el| el.is("Override")))
            .unwrap_or(self.doc.root.children.len());
        self.doc.root.children.insert(pos, decl.into());
        true
    }
}

/// Content type for the media extensions the generator embeds.
pub fn image_content_type(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}
