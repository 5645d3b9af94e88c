//! The report body as data, and its assembly into WordprocessingML.

use std::fs;
use std::path::Path;

use sad_docx_core::wml::{self, Alignment, ParagraphOptions};
use sad_docx_core::Element;
use serde::{Deserialize, Serialize};

use crate::anchors::figure_marker;
use crate::error::Result;

const BUILTIN_REPORT: &str = include_str!("../content/report.json");

/// Caption color used while figures are still caption-only placeholders.
pub const CAPTION_ALERT_COLOR: &str = "FF0000";

/// Paragraph alignment as written in content files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Align {
    #[default]
    LowKashida,
    Both,
    Center,
    Left,
    Right,
}

impl From<Align> for Alignment {
    fn from(align: Align) -> Self {
        match align {
            Align::LowKashida => Alignment::LowKashida,
            Align::Both => Alignment::Both,
            Align::Center => Alignment::Center,
            Align::Left => Alignment::Left,
            Align::Right => Alignment::Right,
        }
    }
}

/// One block of report content, in document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Heading {
        level: u8,
        text: String,
    },
    Paragraph {
        text: String,
        #[serde(default)]
        align: Align,
    },
    /// Bold lead-in line inside use-case descriptions.
    Label {
        text: String,
    },
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weights: Option<Vec<u32>>,
    },
    /// Expands to a figure marker followed by the caption.
    Figure {
        id: String,
        caption: String,
    },
}

/// Options for [`ReportContent::assemble`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssembleOptions {
    /// Render figure captions in the alert color.
    pub caption_alert: bool,
}

/// A figure id with its caption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FigureCaption {
    pub id: String,
    pub caption: String,
}

impl FigureCaption {
    /// The caption text after the first colon (`شکل ۲-۱: عنوان` gives `عنوان`),
    /// or the whole caption when it has none.
    pub fn title(&self) -> &str {
        match self.caption.split_once(':') {
            Some((_, title)) => title.trim(),
            None => self.caption.trim(),
        }
    }
}

/// The ordered blocks of the report body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportContent {
    pub blocks: Vec<Block>,
}

impl ReportContent {
    /// The content shipped with the generator.
    pub fn builtin() -> Result<Self> {
        Ok(serde_json::from_str(BUILTIN_REPORT)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Build the body elements. The order of the returned elements is the
    /// order of the blocks; bookmark and TOC passes rely on it.
    pub fn assemble(&self, opts: AssembleOptions) -> Vec<Element> {
        let mut out = Vec::with_capacity(self.blocks.len() + self.figure_count());
        for block in &self.blocks {
            match block {
                Block::Heading { level, text } => {
                    let style = format!("Heading{level}");
                    out.push(wml::paragraph(text, &ParagraphOptions::default().style(style)));
                }
                Block::Paragraph { text, align } => {
                    let opts = ParagraphOptions::default().align((*align).into());
                    out.push(wml::paragraph(text, &opts));
                }
                Block::Label { text } => out.push(wml::label(text)),
                Block::Table {
                    headers,
                    rows,
                    weights,
                } => out.push(wml::table(headers, rows, weights.as_deref())),
                Block::Figure { id, caption } => {
                    out.push(marker_paragraph(id));
                    out.push(caption_paragraph(caption, opts.caption_alert));
                }
            }
        }
        out
    }

    pub fn figure_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b, Block::Figure { .. }))
            .count()
    }

    /// Figure ids and captions in document order.
    pub fn figure_captions(&self) -> Vec<FigureCaption> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Figure { id, caption } => Some(FigureCaption {
                    id: id.clone(),
                    caption: caption.clone(),
                }),
                _ => None,
            })
            .collect()
    }
}

/// The transient paragraph a figure image is later spliced in at.
pub fn marker_paragraph(id: &str) -> Element {
    wml::paragraph(
        &figure_marker(id),
        &ParagraphOptions::default()
            .align(Alignment::Center)
            .spacing(0, 0),
    )
}

fn caption_paragraph(caption: &str, alert: bool) -> Element {
    let mut opts = ParagraphOptions::default()
        .italic()
        .align(Alignment::Center)
        .spacing(0, 100);
    if alert {
        opts = opts.color(CAPTION_ALERT_COLOR);
    }
    wml::paragraph(caption, &opts)
}
