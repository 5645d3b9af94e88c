use pretty_assertions::assert_eq;
use rstest::*;
use sad_docx_core::wml::{self, ParagraphOptions};
use sad_docx_core::{
    validate_images, ContentTypes, Package, Relationships, XmlDocument, CONTENT_TYPES_PART,
    DOCUMENT_PART, DOCUMENT_RELS_PART, IMAGE_REL_TYPE,
};
use tempfile::TempDir;

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

const DOCUMENT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body><w:p><w:r><w:t>سلام</w:t></w:r></w:p><w:sectPr/></w:body></w:document>"#;

#[fixture]
fn package() -> Package {
    let mut pkg = Package::new();
    pkg.set_part(CONTENT_TYPES_PART, CONTENT_TYPES.as_bytes().to_vec());
    pkg.set_part(DOCUMENT_RELS_PART, RELS.as_bytes().to_vec());
    pkg.set_part(DOCUMENT_PART, DOCUMENT.as_bytes().to_vec());
    pkg
}

#[rstest]
fn test_insert_table_and_save(package: Package) {
    let mut pkg = package;
    let mut doc = pkg.required_xml_part(DOCUMENT_PART).unwrap();
    let body = doc.root.child_mut("w:body").unwrap();
    let tbl = wml::table(&["ستون ۱", "ستون ۲"], &[vec!["a", "b"]], Some(&[1, 3]));
    let p = wml::paragraph("متن", &ParagraphOptions::default());
    body.children.insert(1, p.into());
    body.children.insert(2, tbl.into());
    pkg.set_xml_part(DOCUMENT_PART, &doc).unwrap();

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("out.docx");
    pkg.save_atomic(&out).unwrap();

    let reread = Package::open(&out).unwrap();
    let doc = reread.required_xml_part(DOCUMENT_PART).unwrap();
    let body = doc.root.child("w:body").unwrap();
    let names: Vec<&str> = body.child_elements().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["w:p", "w:p", "w:tbl", "w:sectPr"]);
    let grid: Vec<&str> = body
        .child("w:tbl")
        .and_then(|t| t.child("w:tblGrid"))
        .unwrap()
        .child_elements()
        .filter_map(|c| c.attr("w:w"))
        .collect();
    assert_eq!(grid, vec!["2132", "6398"]);
}

#[rstest]
fn test_image_registration_validates(package: Package) {
    let mut pkg = package;
    let mut rels = Relationships::load(&pkg).unwrap();
    let rid = rels.add(IMAGE_REL_TYPE, "media/image-fig-2-1.png");
    assert_eq!(rid, "rId2");
    rels.store(&mut pkg).unwrap();

    let mut types = ContentTypes::load(&pkg).unwrap().unwrap();
    assert!(types.ensure_default("png", "image/png"));
    types.store(&mut pkg).unwrap();
    pkg.set_part("word/media/image-fig-2-1.png", vec![0x89, b'P', b'N', b'G']);

    let xml = DOCUMENT.replace(
        "<w:sectPr/>",
        &format!(
            r#"<w:p><w:r><w:drawing><a:blip xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" r:embed="{rid}"/></w:drawing></w:r></w:p><w:sectPr/>"#
        ),
    );
    let doc = XmlDocument::parse(DOCUMENT_PART, xml.as_bytes()).unwrap();
    pkg.set_xml_part(DOCUMENT_PART, &doc).unwrap();

    let reread = Package::from_bytes(&pkg.to_bytes().unwrap()).unwrap();
    let report = validate_images(&reread).unwrap();
    assert_eq!(report.embeds, vec![rid]);
    assert!(report.is_consistent());
}
