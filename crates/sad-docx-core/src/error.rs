//! Error types for package and document-tree operations.

use thiserror::Error;

/// Errors raised while reading, mutating or writing a document package.
#[derive(Debug, Error)]
pub enum DocxError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML parsing error in {part}: {source}")]
    Xml {
        part: String,
        #[source]
        source: roxmltree::Error,
    },

    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::Error),

    #[error("Part is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Missing required part: {0}")]
    MissingPart(String),

    #[error("Missing required element: {0}")]
    MissingElement(String),
}

pub type Result<T> = std::result::Result<T, DocxError>;
