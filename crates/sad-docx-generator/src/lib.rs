//! SAD report generator: fills the Persian RTL template with the report body,
//! figures, revision history and localized header/footer metadata.

pub mod anchors;
pub mod config;
pub mod content;
pub mod diagram;
pub mod error;
pub mod figures;
pub mod patch;
pub mod pipeline;

pub use config::{Cli, ReportConfig};
pub use content::{AssembleOptions, Block, FigureCaption, ReportContent};
pub use error::{GenerateError, Result};
pub use figures::{EmbedReport, FigureCatalog};
pub use pipeline::{generate, GenerateOptions, GenerateSummary};
