//! Figure files and their embedding into the document body.

use std::fs;
use std::path::{Path, PathBuf};

use sad_docx_core::wml::{self, paragraph_text, RunFormat};
use sad_docx_core::{
    image_content_type, ContentTypes, Element, Package, Relationships, XmlDocument,
    IMAGE_REL_TYPE, OFFICE_RELATIONSHIPS_NS,
};
use tracing::{debug, info, warn};

use crate::anchors::parse_figure_marker;
use crate::diagram::{Diagram, LabelFont};
use crate::error::{GenerateError, Result};

pub const WP_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
pub const DRAWING_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const PICTURE_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";

pub const EMU_PER_INCH: u64 = 914_400;
pub const ASSUMED_DPI: u64 = 96;
/// 6.5 inches, the usable width of the template page.
pub const MAX_IMAGE_WIDTH_EMU: u64 = 13 * EMU_PER_INCH / 2;
/// Pictures get drawing ids from here up, or above the template's largest.
pub const FIRST_DOCPR_ID: u64 = 1000;

/// Figure ids and the file each one is expected under.
pub const FIGURE_FILES: &[(&str, &str)] = &[
    ("2-1", "fig-2-1-context.png"),
    ("2-2", "fig-2-2-container.png"),
    ("2-3", "fig-2-3-component.png"),
    ("4-1", "fig-4-1-usecase.png"),
    ("4-2", "fig-4-2-uc01-cache-hit.png"),
    ("4-3", "fig-4-3-uc01-cache-miss.png"),
    ("4-4", "fig-4-4-activity-uc01.png"),
    ("4-5", "fig-4-5-uc02-start-pay.png"),
    ("4-6", "fig-4-6-uc02-callback-verify.png"),
    ("4-7", "fig-4-7-uc02-issue-notify.png"),
    ("4-8", "fig-4-8-activity-uc02.png"),
    ("4-9", "fig-4-9-state-booking.png"),
    ("5-1", "fig-5-1-class-analytical.png"),
    ("5-2", "fig-5-2-class-design.png"),
    ("5-3", "fig-5-3-crc-common.png"),
    ("7-1", "fig-7-1-deploy.png"),
    ("9-1", "fig-9-1-erd.png"),
];

/// The `-vp` sibling of a figure file (`fig-2-1-context-vp.png`): a manually
/// exported diagram that takes priority over the placeholder.
pub fn override_path(base: &Path) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{stem}-vp.{}", ext.to_string_lossy()),
        None => format!("{stem}-vp"),
    };
    base.with_file_name(name)
}

/// Maps figure ids to files under a diagrams directory.
#[derive(Debug, Clone)]
pub struct FigureCatalog {
    dir: PathBuf,
}

impl FigureCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The expected file for a figure id, whether or not it exists.
    pub fn path_for(&self, id: &str) -> Option<PathBuf> {
        FIGURE_FILES
            .iter()
            .find(|(fid, _)| *fid == id)
            .map(|(_, file)| self.dir.join(file))
    }

    /// The file to embed for a figure: the override if present, else the
    /// base file if present.
    pub fn resolve(&self, id: &str) -> Option<PathBuf> {
        let base = self.path_for(id)?;
        let manual = override_path(&base);
        if manual.is_file() {
            return Some(manual);
        }
        base.is_file().then_some(base)
    }

    /// Draw a placeholder for every catalogued figure whose file is missing.
    /// Existing files, hand-replaced ones included, are left untouched.
    /// Returns the ids that were drawn.
    pub fn ensure_placeholders(&self, font: &LabelFont) -> Result<Vec<String>> {
        fs::create_dir_all(&self.dir)?;
        let mut drawn = Vec::new();
        for (id, file) in FIGURE_FILES {
            let path = self.dir.join(file);
            if path.exists() {
                continue;
            }
            Diagram::placeholder(id)
                .save(&path, font)
                .map_err(|e| GenerateError::Diagram(format!("{}: {}", path.display(), e)))?;
            debug!("Drew placeholder {}", path.display());
            drawn.push((*id).to_string());
        }
        if !drawn.is_empty() {
            info!("Drew {} placeholder diagrams in {}", drawn.len(), self.dir.display());
        }
        Ok(drawn)
    }
}

/// Outcome of [`embed_figures`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedReport {
    /// (figure id, relationship id) for each picture spliced in.
    pub embedded: Vec<(String, String)>,
    /// Figure ids whose marker was dropped without a picture.
    pub removed: Vec<String>,
}

/// Picture extent in EMU at the assumed resolution, capped at the page width
/// with the aspect ratio kept.
pub fn image_extent(width_px: u32, height_px: u32) -> (u64, u64) {
    let cx = u64::from(width_px) * EMU_PER_INCH / ASSUMED_DPI;
    let cy = u64::from(height_px) * EMU_PER_INCH / ASSUMED_DPI;
    if cx > MAX_IMAGE_WIDTH_EMU {
        (MAX_IMAGE_WIDTH_EMU, cy * MAX_IMAGE_WIDTH_EMU / cx)
    } else {
        (cx, cy)
    }
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

/// Largest numeric `id` on any `docPr` element.
pub fn max_docpr_id(root: &Element) -> u64 {
    root.descendants()
        .into_iter()
        .filter(|el| local_name(&el.name) == "docPr")
        .filter_map(|el| el.attr("id")?.parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}

fn declare_namespace(root: &mut Element, prefix: &str, uri: &str) {
    let key = format!("xmlns:{prefix}");
    if root.attr(&key).is_none() {
        root.set_attr(key, uri);
    }
}

/// A centered paragraph holding an anchored picture.
pub fn picture_paragraph(rid: &str, cx: u64, cy: u64, docpr_id: u64, name: &str) -> Element {
    let (cx, cy, id) = (cx.to_string(), cy.to_string(), docpr_id.to_string());

    let ppr = Element::new("w:pPr")
        .with_child(Element::new("w:jc").with_attr("w:val", "center"))
        .with_child(
            Element::new("w:spacing")
                .with_attr("w:before", "0")
                .with_attr("w:beforeAutospacing", "1")
                .with_attr("w:after", "0")
                .with_attr("w:afterAutospacing", "1")
                .with_attr("w:line", "360")
                .with_attr("w:lineRule", "auto"),
        )
        .with_child(Element::new("w:keepNext"))
        .with_child(wml::rtl_run_properties(&RunFormat::default()));

    let pic = Element::new("pic:pic")
        .with_attr("xmlns:pic", PICTURE_NS)
        .with_child(
            Element::new("pic:nvPicPr")
                .with_child(
                    Element::new("pic:cNvPr")
                        .with_attr("id", id.as_str())
                        .with_attr("name", name)
                        .with_attr("descr", ""),
                )
                .with_child(
                    Element::new("pic:cNvPicPr").with_child(
                        Element::new("a:picLocks")
                            .with_attr("noChangeAspect", "1")
                            .with_attr("noChangeArrowheads", "1"),
                    ),
                ),
        )
        .with_child(
            Element::new("pic:blipFill")
                .with_child(
                    Element::new("a:blip")
                        .with_attr("r:embed", rid)
                        .with_attr("cstate", "print"),
                )
                .with_child(Element::new("a:stretch").with_child(Element::new("a:fillRect"))),
        )
        .with_child(
            Element::new("pic:spPr")
                .with_attr("bwMode", "auto")
                .with_child(
                    Element::new("a:xfrm")
                        .with_child(Element::new("a:off").with_attr("x", "0").with_attr("y", "0"))
                        .with_child(
                            Element::new("a:ext")
                                .with_attr("cx", cx.as_str())
                                .with_attr("cy", cy.as_str()),
                        ),
                )
                .with_child(
                    Element::new("a:prstGeom")
                        .with_attr("prst", "rect")
                        .with_child(Element::new("a:avLst")),
                ),
        );

    let graphic = Element::new("a:graphic")
        .with_attr("xmlns:a", DRAWING_NS)
        .with_child(
            Element::new("a:graphicData")
                .with_attr("uri", "http://schemas.openxmlformats.org/drawingml/2006/picture")
                .with_child(pic),
        );

    // wp:anchor rather than wp:inline: LibreOffice lays anchored pictures out
    // the way Word does.
    let anchor = Element::new("wp:anchor")
        .with_attr("behindDoc", "0")
        .with_attr("distT", "0")
        .with_attr("distB", "0")
        .with_attr("distL", "0")
        .with_attr("distR", "0")
        .with_attr("simplePos", "0")
        .with_attr("locked", "0")
        .with_attr("layoutInCell", "0")
        .with_attr("allowOverlap", "1")
        .with_attr("relativeHeight", "2")
        .with_child(Element::new("wp:simplePos").with_attr("x", "0").with_attr("y", "0"))
        .with_child(
            Element::new("wp:positionH")
                .with_attr("relativeFrom", "column")
                .with_child(Element::new("wp:align").with_text("center")),
        )
        .with_child(
            Element::new("wp:positionV")
                .with_attr("relativeFrom", "paragraph")
                .with_child(Element::new("wp:posOffset").with_text("0")),
        )
        .with_child(
            Element::new("wp:extent")
                .with_attr("cx", cx.as_str())
                .with_attr("cy", cy.as_str()),
        )
        .with_child(
            Element::new("wp:effectExtent")
                .with_attr("l", "0")
                .with_attr("t", "0")
                .with_attr("r", "0")
                .with_attr("b", "0"),
        )
        .with_child(Element::new("wp:wrapSquare").with_attr("wrapText", "largest"))
        .with_child(
            Element::new("wp:docPr")
                .with_attr("id", id.as_str())
                .with_attr("name", name)
                .with_attr("descr", ""),
        )
        .with_child(
            Element::new("wp:cNvGraphicFramePr").with_child(
                Element::new("a:graphicFrameLocks")
                    .with_attr("xmlns:a", DRAWING_NS)
                    .with_attr("noChangeAspect", "1"),
            ),
        )
        .with_child(graphic);

    let run = Element::new("w:r")
        .with_child(wml::rtl_run_properties(&RunFormat::default()))
        .with_child(Element::new("w:drawing").with_child(anchor));

    Element::new("w:p").with_child(ppr).with_child(run)
}

/// Package state loaded once, when the first picture is embedded.
struct MediaSink {
    relationships: Relationships,
    content_types: Option<ContentTypes>,
    next_docpr_id: u64,
}

impl MediaSink {
    fn load(package: &Package, max_docpr: u64) -> Result<Self> {
        Ok(Self {
            relationships: Relationships::load(package)?,
            content_types: ContentTypes::load(package)?,
            next_docpr_id: (max_docpr + 1).max(FIRST_DOCPR_ID),
        })
    }

    /// Store the image as a media part and return its picture paragraph.
    fn embed(&mut self, package: &mut Package, figure_id: &str, source: &Path) -> Result<(String, Element)> {
        let ext = source
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_else(|| "png".to_string());
        let media_name = format!("image-fig-{figure_id}.{ext}");
        let target = format!("media/{media_name}");

        let bytes = fs::read(source)?;
        let (width, height) = image::image_dimensions(source)?;
        let (cx, cy) = image_extent(width, height);

        package.set_part(&format!("word/{target}"), bytes);
        if let (Some(types), Some(mime)) = (self.content_types.as_mut(), image_content_type(&ext)) {
            if types.ensure_default(&ext, mime) {
                debug!("Declared content type {} for .{}", mime, ext);
            }
        }
        let rid = self.relationships.add(IMAGE_REL_TYPE, &target);
        let paragraph = picture_paragraph(&rid, cx, cy, self.next_docpr_id, &media_name);
        self.next_docpr_id += 1;
        Ok((rid, paragraph))
    }

    fn store(self, package: &mut Package) -> Result<()> {
        self.relationships.store(package)?;
        if let Some(types) = self.content_types {
            types.store(package)?;
        }
        Ok(())
    }
}

/// Resolve every figure marker paragraph directly under `w:body`.
///
/// With `embed_images` off, or when a figure has no file, the marker is
/// removed and its caption stays. Otherwise the image becomes a new media
/// part with a fresh relationship and a picture paragraph takes the marker's
/// place.
pub fn embed_figures(
    doc: &mut XmlDocument,
    package: &mut Package,
    catalog: &FigureCatalog,
    embed_images: bool,
) -> Result<EmbedReport> {
    let mut report = EmbedReport::default();
    let max_docpr = max_docpr_id(&doc.root);

    let body = doc
        .root
        .child_mut("w:body")
        .ok_or_else(|| GenerateError::MissingBody(sad_docx_core::DOCUMENT_PART.to_string()))?;

    let markers: Vec<(usize, String)> = body
        .children
        .iter()
        .enumerate()
        .filter_map(|(i, node)| {
            let p = node.as_element().filter(|el| el.is("w:p"))?;
            parse_figure_marker(&paragraph_text(p)).map(|id| (i, id.to_string()))
        })
        .collect();

    let mut sink: Option<MediaSink> = None;
    let mut dropped = Vec::new();
    for (i, figure_id) in markers {
        let source = if embed_images {
            catalog.resolve(&figure_id)
        } else {
            None
        };
        let Some(source) = source else {
            if embed_images {
                warn!("No image for figure {}, dropping its marker", figure_id);
            }
            dropped.push(i);
            report.removed.push(figure_id);
            continue;
        };

        let media = match sink {
            Some(ref mut media) => media,
            None => sink.insert(MediaSink::load(package, max_docpr)?),
        };
        let (rid, paragraph) = media.embed(package, &figure_id, &source)?;
        body.children[i] = paragraph.into();
        debug!("Embedded {} as {}", source.display(), rid);
        report.embedded.push((figure_id, rid));
    }

    for i in dropped.into_iter().rev() {
        body.children.remove(i);
    }

    if let Some(media) = sink {
        declare_namespace(&mut doc.root, "wp", WP_NS);
        declare_namespace(&mut doc.root, "r", OFFICE_RELATIONSHIPS_NS);
        media.store(package)?;
    }

    info!(
        "Figures: {} embedded, {} markers removed",
        report.embedded.len(),
        report.removed.len()
    );
    Ok(report)
}
