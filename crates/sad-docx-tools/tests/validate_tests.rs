use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use rstest::*;
use sad_docx_core::{Package, DOCUMENT_PART, DOCUMENT_RELS_PART};
use sad_docx_tools::validate::{check_document, exit_code, report_lines};
use sad_docx_tools::ToolError;
use tempfile::TempDir;

const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image-fig-2-1.png"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image-fig-2-2.png"/></Relationships>"#;

fn document(embeds: &[&str]) -> String {
    let blips: String = embeds
        .iter()
        .map(|id| format!(r#"<w:p><w:r><w:drawing><a:blip r:embed="{id}"/></w:drawing></w:r></w:p>"#))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>{blips}<w:sectPr/></w:body></w:document>"#
    )
}

struct Fixture {
    _dir: TempDir,
    path: PathBuf,
}

fn write_docx(dir: &Path, embeds: &[&str], with_second_media: bool) -> PathBuf {
    let mut pkg = Package::new();
    pkg.set_part(DOCUMENT_RELS_PART, RELS.as_bytes().to_vec());
    pkg.set_part(DOCUMENT_PART, document(embeds).into_bytes());
    pkg.set_part("word/media/image-fig-2-1.png", vec![0x89, b'P', b'N', b'G']);
    if with_second_media {
        pkg.set_part("word/media/image-fig-2-2.png", vec![0x89, b'P', b'N', b'G']);
    }
    let path = dir.join("SAD-Final.docx");
    pkg.save_atomic(&path).unwrap();
    path
}

#[fixture]
fn consistent() -> Fixture {
    let dir = TempDir::new().unwrap();
    let path = write_docx(dir.path(), &["rId2", "rId3"], true);
    Fixture { _dir: dir, path }
}

#[rstest]
fn test_consistent_document_exits_zero(consistent: Fixture) {
    let report = check_document(&consistent.path).unwrap();
    assert_eq!(exit_code(&report), 0);

    let lines = report_lines(&consistent.path, &report);
    assert_eq!(
        lines[1..].to_vec(),
        vec![
            "embedded refs (r:embed): 2",
            "image relationships: 2",
            "missing relationship for embed: 0",
            "missing media parts: 0",
        ]
    );
    assert!(lines[0].starts_with("docx: "));
}

#[rstest]
fn test_missing_relationship_is_listed() {
    let dir = TempDir::new().unwrap();
    let path = write_docx(dir.path(), &["rId2", "rId7"], true);

    let report = check_document(&path).unwrap();
    assert_eq!(report.missing_relationships, vec!["rId7".to_string()]);
    assert_eq!(exit_code(&report), 2);

    let lines = report_lines(&path, &report);
    assert!(lines.contains(&"missing relationship for embed: 1".to_string()));
    assert!(lines.contains(&"missing rel ids: rId7".to_string()));
}

#[rstest]
fn test_missing_media_part_is_listed() {
    let dir = TempDir::new().unwrap();
    let path = write_docx(dir.path(), &["rId3"], false);

    let report = check_document(&path).unwrap();
    assert_eq!(exit_code(&report), 2);
    let lines = report_lines(&path, &report);
    assert_eq!(
        lines.last().unwrap(),
        "missing media: rId3 -> word/media/image-fig-2-2.png"
    );
}

#[rstest]
fn test_missing_document_part_is_an_error() {
    let dir = TempDir::new().unwrap();
    let mut pkg = Package::new();
    pkg.set_part(DOCUMENT_RELS_PART, RELS.as_bytes().to_vec());
    let path = dir.path().join("broken.docx");
    pkg.save_atomic(&path).unwrap();

    let err = check_document(&path).unwrap_err();
    assert!(matches!(err, ToolError::Docx(_)));
    assert_eq!(err.exit_code(), 1);
}
