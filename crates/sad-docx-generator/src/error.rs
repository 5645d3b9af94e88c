//! Error types for report generation.

use std::path::PathBuf;

use thiserror::Error;

use sad_docx_core::DocxError;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Docx(#[from] DocxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template not found: {0}")]
    MissingTemplate(PathBuf),

    #[error("Required anchor paragraph not found in template: {0}")]
    MissingAnchor(String),

    #[error("Template has no w:body in {0}")]
    MissingBody(String),

    #[error("Diagram error: {0}")]
    Diagram(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GenerateError>;
