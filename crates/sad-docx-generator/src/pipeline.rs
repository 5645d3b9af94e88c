use std::path::PathBuf;

use chrono::NaiveDate;
use sad_docx_core::{JalaliDate, Package, DOCUMENT_PART};
use tracing::{info, instrument};

use crate::anchors::{ORGANIZATION_PLACEHOLDER, SEASON_PLACEHOLDER, SYSTEM_PLACEHOLDER};
use crate::config::{Cli, ReportConfig};
use crate::content::{AssembleOptions, ReportContent};
use crate::diagram::LabelFont;
use crate::error::{GenerateError, Result};
use crate::figures::{embed_figures, EmbedReport, FigureCatalog};
use crate::patch::{self, HistoryEntry};

/// Run options for [`generate`].
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub template: PathBuf,
    pub out: PathBuf,
    pub diagrams_dir: PathBuf,
    pub embed_images: bool,
    pub autogen_diagrams: bool,
    pub rebuild_toc: bool,
    /// Gregorian report date, localized for the history table and headers.
    pub date: NaiveDate,
}

impl GenerateOptions {
    pub fn from_cli(cli: &Cli, today: NaiveDate) -> Self {
        Self {
            template: cli.template.clone(),
            out: cli.out.clone(),
            diagrams_dir: cli.diagrams_dir.clone(),
            embed_images: cli.embed_images,
            autogen_diagrams: !cli.no_autogen_diagrams,
            rebuild_toc: cli.rebuild_toc,
            date: cli.date.unwrap_or(today),
        }
    }
}

/// What a run did.
#[derive(Debug, Clone, Default)]
pub struct GenerateSummary {
    pub content_elements: usize,
    pub placeholders_drawn: Vec<String>,
    pub figures: EmbedReport,
    pub toc_entries: usize,
    pub header_footer_nodes: usize,
}

/// Fill the template and write the final document.
///
/// The package is edited in memory and written once, atomically, at the end;
/// a failing step leaves no output behind.
#[instrument(skip(opts, config, content), fields(template = %opts.template.display(), out = %opts.out.display()))]
pub fn generate(
    opts: &GenerateOptions,
    config: &ReportConfig,
    content: &ReportContent,
) -> Result<GenerateSummary> {
    if !opts.template.is_file() {
        return Err(GenerateError::MissingTemplate(opts.template.clone()));
    }
    let mut package = Package::open(&opts.template)?;
    let mut doc = package.required_xml_part(DOCUMENT_PART)?;
    let mut summary = GenerateSummary::default();

    let date = JalaliDate::from_gregorian(opts.date);
    let members = config.group_members();

    patch::replace_anchor_text(&mut doc, ORGANIZATION_PLACEHOLDER, &config.organization_line)?;
    patch::replace_anchor_text(&mut doc, SYSTEM_PLACEHOLDER, &config.system_line)?;
    patch::replace_anchor_text(&mut doc, SEASON_PLACEHOLDER, &config.season_line)?;
    patch::fill_cover_group_members(&mut doc, &members)?;

    let entry = HistoryEntry::new(
        date.to_persian_string(),
        &config.doc_version,
        &config.history_status,
        &members,
    );
    patch::fill_history_table(&mut doc, &entry)?;

    let elements = content.assemble(AssembleOptions {
        caption_alert: !opts.embed_images,
    });
    summary.content_elements = elements.len();
    let content_start = patch::insert_content(&mut doc, elements)?;

    let catalog = FigureCatalog::new(&opts.diagrams_dir);
    if opts.autogen_diagrams {
        summary.placeholders_drawn = catalog.ensure_placeholders(&LabelFont::load())?;
    }
    summary.figures = embed_figures(&mut doc, &mut package, &catalog, opts.embed_images)?;

    if opts.rebuild_toc {
        summary.toc_entries = patch::rebuild_toc(&mut doc, content_start)?;
    }

    package.set_xml_part(DOCUMENT_PART, &doc)?;
    patch::enable_field_update(&mut package)?;

    for part in &config.header_footer {
        let edits: Vec<(usize, String)> = part
            .edits
            .iter()
            .map(|e| (e.index, config.render_field(&e.value, &date)))
            .collect();
        summary.header_footer_nodes += patch::patch_text_nodes(&mut package, &part.part, &edits)?;
    }

    package.save_atomic(&opts.out)?;
    info!("Wrote {}", opts.out.display());
    Ok(summary)
}
