//! Consistency check between image references, relationships and media parts.

use std::collections::HashMap;

use crate::error::{DocxError, Result};
use crate::package::{Package, DOCUMENT_PART, DOCUMENT_RELS_PART};
use crate::parts::RELATIONSHIPS_NS;

pub const OFFICE_RELATIONSHIPS_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Outcome of [`validate_images`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Every `r:embed` value in document order.
    pub embeds: Vec<String>,
    /// Image relationships: id to target.
    pub image_relationships: HashMap<String, String>,
    /// Embedded ids with no image relationship.
    pub missing_relationships: Vec<String>,
    /// (id, part name) pairs whose target part is absent.
    pub missing_media: Vec<(String, String)>,
}

impl ValidationReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_relationships.is_empty() && self.missing_media.is_empty()
    }
}

fn parse<'a>(part: &str, text: &'a str) -> Result<roxmltree::Document<'a>> {
    roxmltree::Document::parse(text).map_err(|source| DocxError::Xml {
        part: part.to_string(),
        source,
    })
}

fn part_text<'a>(package: &'a Package, name: &str) -> Result<&'a str> {
    let bytes = package
        .part(name)
        .ok_or_else(|| DocxError::MissingPart(name.to_string()))?;
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    Ok(std::str::from_utf8(bytes)?)
}

/// Check that every image reference in the main document resolves to an
/// image relationship whose target part exists.
pub fn validate_images(package: &Package) -> Result<ValidationReport> {
    let rels_text = part_text(package, DOCUMENT_RELS_PART)?;
    let doc_text = part_text(package, DOCUMENT_PART)?;

    let rels = parse(DOCUMENT_RELS_PART, rels_text)?;
    let mut image_relationships = HashMap::new();
    for rel in rels
        .descendants()
        .filter(|n| n.has_tag_name((RELATIONSHIPS_NS, "Relationship")))
    {
        if rel.attribute("Type").unwrap_or_default().ends_with("/image") {
            if let Some(id) = rel.attribute("Id") {
                let target = rel.attribute("Target").unwrap_or_default();
                image_relationships.insert(id.to_string(), target.to_string());
            }
        }
    }

    let doc = parse(DOCUMENT_PART, doc_text)?;
    let embeds: Vec<String> = doc
        .descendants()
        .filter_map(|n| n.attribute((OFFICE_RELATIONSHIPS_NS, "embed")))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    let missing_relationships = embeds
        .iter()
        .filter(|id| !image_relationships.contains_key(*id))
        .cloned()
        .collect();

    let missing_media = embeds
        .iter()
        .filter_map(|id| {
            let target = image_relationships.get(id).filter(|t| !t.is_empty())?;
            let part = format!("word/{target}");
            (!package.contains(&part)).then(|| (id.clone(), part))
        })
        .collect();

    Ok(ValidationReport {
        embeds,
        image_relationships,
        missing_relationships,
        missing_media,
    })
}
