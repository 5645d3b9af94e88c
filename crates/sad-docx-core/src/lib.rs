//! Document-package primitives for the SAD report generator.
//!
//! This crate holds the pieces that know about the .docx container and
//! WordprocessingML, independent of the report being produced:
//! - `Package`: ordered in-memory parts with zip read/write and atomic save
//! - `xml`: a mutable element tree parsed with roxmltree, written with quick-xml
//! - `Relationships` / `ContentTypes`: typed views over the package-level parts
//! - `wml`: paragraph, run and table builders with RTL properties
//! - `sanitize`: text normalisation for inserted strings
//! - `jalali`: Solar Hijri dates and Persian digits
//! - `validate_images`: image reference consistency check

mod error;
pub mod jalali;
mod package;
mod parts;
mod sanitize;
mod validate;
pub mod wml;
pub mod xml;

pub use error::{DocxError, Result};
pub use jalali::{to_persian_digits, JalaliDate};
pub use package::{Package, CONTENT_TYPES_PART, DOCUMENT_PART, DOCUMENT_RELS_PART, SETTINGS_PART};
pub use parts::{
    image_content_type, ContentTypes, Relationship, Relationships, CONTENT_TYPES_NS,
    IMAGE_REL_TYPE, RELATIONSHIPS_NS,
};
pub use sanitize::sanitize;
pub use validate::{validate_images, ValidationReport, OFFICE_RELATIONSHIPS_NS};
pub use xml::{Element, Node, XmlDocument};
