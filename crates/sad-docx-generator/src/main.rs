use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sad_docx_generator::{generate, Cli, GenerateOptions, ReportConfig, ReportContent};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!("sad-docx-generate v{}", env!("CARGO_PKG_VERSION"));

    let config = match &cli.config {
        Some(path) => ReportConfig::from_json_file(path)
            .with_context(|| format!("Failed to load report settings from {}", path.display()))?,
        None => ReportConfig::default(),
    };
    let content = match &cli.content {
        Some(path) => ReportContent::from_json_file(path)
            .with_context(|| format!("Failed to load report content from {}", path.display()))?,
        None => ReportContent::builtin().context("Built-in report content is invalid")?,
    };

    let opts = GenerateOptions::from_cli(&cli, chrono::Local::now().date_naive());
    let summary = generate(&opts, &config, &content)
        .with_context(|| format!("Failed to generate {}", opts.out.display()))?;

    info!(
        "{} body elements, {} figures embedded, {} TOC entries",
        summary.content_elements,
        summary.figures.embedded.len(),
        summary.toc_entries
    );
    Ok(())
}
