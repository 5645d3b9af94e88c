//! Error types for the companion tools.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

use sad_docx_core::DocxError;
use sad_docx_generator::GenerateError;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{program} failed with {status}")]
    CommandFailed { program: String, status: ExitStatus },

    #[error("{0} not found")]
    ToolNotFound(String),

    #[error("Timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },

    #[error("Missing input: {0}")]
    MissingInput(PathBuf),

    #[error("No manually exported diagrams (*-vp.png/jpg/jpeg/pdf) under {0}")]
    NoDiagrams(PathBuf),

    #[error("{program} finished but did not produce {path}")]
    MissingOutput { program: String, path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Docx(#[from] DocxError),

    #[error(transparent)]
    Generate(#[from] GenerateError),
}

impl ToolError {
    /// Process exit code for this error: 2 for missing input, 3 for no
    /// diagrams, the child's own code for a failed command, 1 otherwise.
    pub fn exit_code(&self) -> u8 {
        match self {
            ToolError::MissingInput(_) => 2,
            ToolError::NoDiagrams(_) => 3,
            ToolError::CommandFailed { status, .. } => status
                .code()
                .and_then(|c| u8::try_from(c).ok())
                .filter(|c| *c != 0)
                .unwrap_or(1),
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, ToolError>;
