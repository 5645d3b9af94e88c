//! Companion tools for the SAD report.
//!
//! - `validate`: image reference consistency report
//! - `submission`: PDF + renamed diagrams, zipped for hand-in
//! - `render`: Mermaid sources to PNG through a headless browser
//! - `office`: headless LibreOffice conversion and field refresh

pub mod error;
pub mod filename;
pub mod office;
pub mod render;
pub mod submission;
pub mod validate;

pub use error::{Result, ToolError};


/// Initialise `tracing` for the tool binaries, honouring `RUST_LOG`.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
