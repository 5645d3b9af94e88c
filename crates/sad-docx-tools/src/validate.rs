//! Console report for the image-reference check.

use std::path::Path;

use sad_docx_core::{validate_images, Package, ValidationReport};

use crate::error::Result;

/// At most this many missing ids / parts are listed.
pub const MAX_LISTED: usize = 20;

/// Open a document and check its image references.
pub fn check_document(path: &Path) -> Result<ValidationReport> {
    let package = Package::open(path)?;
    Ok(validate_images(&package)?)
}

/// Summary lines printed by `sad-docx-validate`.
pub fn report_lines(docx: &Path, report: &ValidationReport) -> Vec<String> {
    let mut lines = vec![
        format!("docx: {}", docx.display()),
        format!("embedded refs (r:embed): {}", report.embeds.len()),
        format!("image relationships: {}", report.image_relationships.len()),
        format!(
            "missing relationship for embed: {}",
            report.missing_relationships.len()
        ),
        format!("missing media parts: {}", report.missing_media.len()),
    ];
    if !report.missing_relationships.is_empty() {
        let listed: Vec<&str> = report
            .missing_relationships
            .iter()
            .take(MAX_LISTED)
            .map(String::as_str)
            .collect();
        lines.push(format!("missing rel ids: {}", listed.join(", ")));
    }
    for (rid, part) in report.missing_media.iter().take(MAX_LISTED) {
        lines.push(format!("missing media: {rid} -> {part}"));
    }
    lines
}

/// 0 when consistent, 2 otherwise.
pub fn exit_code(report: &ValidationReport) -> u8 {
    if report.is_consistent() {
        0
    } else {
        2
    }
}
