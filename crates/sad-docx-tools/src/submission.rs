//! Deliverable packaging: the final document as PDF plus the manually
//! exported diagrams, renamed after their captions and zipped.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use sad_docx_generator::ReportContent;
use tempfile::TempDir;
use tracing::info;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Result, ToolError};
use crate::filename::{figure_id_from_filename, sanitize_filename};
use crate::office::convert_to_pdf;

/// Extensions of exported diagrams, in the order they are collected.
pub const DIAGRAM_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "pdf"];

#[derive(Debug, Clone)]
pub struct SubmissionOptions {
    pub docx: PathBuf,
    pub diagrams_dir: PathBuf,
    pub student1: String,
    pub student2: String,
    pub doc_title: String,
    pub out_dir: PathBuf,
    pub zip: PathBuf,
    pub soffice: String,
}

/// Files written by [`build_submission`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionSummary {
    pub pdf: PathBuf,
    pub diagrams: Vec<PathBuf>,
    pub zip: PathBuf,
}

/// Figure id to caption title, from the report content.
pub fn caption_titles(content: &ReportContent) -> HashMap<String, String> {
    content
        .figure_captions()
        .into_iter()
        .map(|c| {
            let title = c.title().to_string();
            (c.id, title)
        })
        .collect()
}

/// `*-vp.<ext>` files in `dir`, grouped by extension in
/// [`DIAGRAM_EXTENSIONS`] order and sorted by name within each group.
pub fn vp_diagrams(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    let mut out = Vec::new();
    for ext in DIAGRAM_EXTENSIONS {
        let suffix = format!("-vp.{ext}");
        out.extend(
            files
                .iter()
                .filter(|p| p.file_name().and_then(|n| n.to_str()).is_some_and(|n| n.ends_with(&suffix)))
                .cloned(),
        );
    }
    Ok(out)
}

/// `<s1>_<s2>_<title><.ext>` for an exported diagram, the title taken from
/// its figure caption or else the file stem.
pub fn diagram_output_name(
    path: &Path,
    student1: &str,
    student2: &str,
    captions: &HashMap<String, String>,
) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let title = figure_id_from_filename(path)
        .and_then(|id| captions.get(&id).cloned())
        .unwrap_or(stem);
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default();
    format!("{student1}_{student2}_{}{ext}", sanitize_filename(&title))
}

/// Zip every file under `src_dir` (deflated, paths relative to it, sorted).
pub fn zip_dir(src_dir: &Path, zip_path: &Path) -> Result<()> {
    if let Some(parent) = zip_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut zip = ZipWriter::new(File::create(zip_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(src_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(src_dir)
            .map_err(|e| io::Error::other(e.to_string()))?;
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        zip.start_file(name, options)?;
        io::copy(&mut File::open(entry.path())?, &mut zip)?;
    }
    zip.finish()?;
    Ok(())
}

/// Recreate the staging directory and copy the PDF and diagrams into it
/// under their submission names.
pub fn stage(
    opts: &SubmissionOptions,
    pdf: &Path,
    diagrams: &[PathBuf],
    captions: &HashMap<String, String>,
) -> Result<(PathBuf, Vec<PathBuf>)> {
    if opts.out_dir.exists() {
        fs::remove_dir_all(&opts.out_dir)?;
    }
    fs::create_dir_all(&opts.out_dir)?;

    let pdf_name = format!(
        "{}_{}_{}.pdf",
        opts.student1,
        opts.student2,
        sanitize_filename(&opts.doc_title)
    );
    let staged_pdf = opts.out_dir.join(pdf_name);
    fs::copy(pdf, &staged_pdf)?;

    let mut staged = Vec::with_capacity(diagrams.len());
    for diagram in diagrams {
        let target = opts.out_dir.join(diagram_output_name(
            diagram,
            &opts.student1,
            &opts.student2,
            captions,
        ));
        fs::copy(diagram, &target)?;
        staged.push(target);
    }
    Ok((staged_pdf, staged))
}

/// Convert the document, stage it with the exported diagrams and zip the result.
pub fn build_submission(
    opts: &SubmissionOptions,
    captions: &HashMap<String, String>,
) -> Result<SubmissionSummary> {
    if !opts.docx.is_file() {
        return Err(ToolError::MissingInput(opts.docx.clone()));
    }
    let diagrams = vp_diagrams(&opts.diagrams_dir)?;
    if diagrams.is_empty() {
        return Err(ToolError::NoDiagrams(opts.diagrams_dir.clone()));
    }

    let work = TempDir::with_prefix("sad-submission-")?;
    let pdf = convert_to_pdf(&opts.soffice, &opts.docx, work.path())?;
    let (pdf, diagrams) = stage(opts, &pdf, &diagrams, captions)?;
    zip_dir(&opts.out_dir, &opts.zip)?;

    info!("Wrote folder: {}", opts.out_dir.display());
    info!("Wrote zip: {}", opts.zip.display());
    Ok(SubmissionSummary {
        pdf,
        diagrams,
        zip: opts.zip.clone(),
    })
}
