use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDate;
use clap::Parser;
use regex::Regex;
use sad_docx_core::{to_persian_digits, JalaliDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;

/// Command line of the `sad-docx-generate` binary.
#[derive(Parser, Debug, Clone)]
#[command(name = "sad-docx-generate")]
#[command(about = "Fill the SAD template with report content and diagrams")]
pub struct Cli {
    /// Template document to fill
    #[arg(long, default_value = "SAD-Template.docx", env = "SAD_TEMPLATE")]
    pub template: PathBuf,

    /// Output document path
    #[arg(long, default_value = "SAD-Final.docx", env = "SAD_OUT")]
    pub out: PathBuf,

    /// Directory holding one PNG per figure (and `-vp` overrides)
    #[arg(long, default_value = "diagrams", env = "SAD_DIAGRAMS_DIR")]
    pub diagrams_dir: PathBuf,

    /// Embed diagram images instead of leaving red caption-only placeholders
    #[arg(long)]
    pub embed_images: bool,

    /// Do not draw placeholder diagrams for missing figure files
    #[arg(long)]
    pub no_autogen_diagrams: bool,

    /// Regenerate the visible table of contents from the inserted headings
    #[arg(long)]
    pub rebuild_toc: bool,

    /// Report content as JSON, replacing the built-in content
    #[arg(long, env = "SAD_CONTENT")]
    pub content: Option<PathBuf>,

    /// Report settings as JSON; missing fields keep their defaults
    #[arg(long, env = "SAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Report date (YYYY-MM-DD), defaults to today
    #[arg(long)]
    pub date: Option<NaiveDate>,
}

/// Value written into a header/footer text node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum HeaderField {
    SystemName,
    /// `نسخه <version>`
    Version,
    Classification,
    /// Two-digit Jalali day.
    Day,
    /// Two-digit Jalali month.
    Month,
    /// `/` followed by all but the last year digit.
    YearPrefix,
    /// Last digit of the year.
    YearLast,
    /// RLM followed by the full year.
    RtlYear,
    /// `، سامانه <system name>`
    SystemSuffix,
    Literal { text: String },
}

/// One positional text-node edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextNodeEdit {
    pub index: usize,
    #[serde(flatten)]
    pub value: HeaderField,
}

/// Edits applied to the `w:t` nodes of one header or footer part, by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartEdits {
    pub part: String,
    pub edits: Vec<TextNodeEdit>,
}

/// Report-wide settings passed to the assembler and the patcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub system_name: String,
    pub doc_version: String,
    pub classification: String,
    pub organization_line: String,
    pub system_line: String,
    pub season_line: String,
    pub history_status: String,
    pub group_members_fallback: String,
    /// Markdown files searched, in order, for a `- اعضای گروه: ...` line.
    pub group_member_sources: Vec<PathBuf>,
    pub header_footer: Vec<PartEdits>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            system_name: "مارکوپولو".to_string(),
            doc_version: "1.0".to_string(),
            classification: "محرمانه".to_string(),
            organization_line: "سازمان آژانس مسافرتی مارکوپولو".to_string(),
            system_line: "سامانه فروش/رزرو خدمات سفر (وب/موبایل)".to_string(),
            season_line: "زمستان ۱۴۰۴".to_string(),
            history_status: "نسخه نهایی".to_string(),
            group_members_fallback: "محمد صادقی، مهدی مالوردی".to_string(),
            group_member_sources: vec![
                PathBuf::from("SAD.md"),
                PathBuf::from("SAD-From-Template.md"),
            ],
            header_footer: default_header_footer_edits(),
        }
    }
}

fn edit(index: usize, value: HeaderField) -> TextNodeEdit {
    TextNodeEdit { index, value }
}

// Node positions follow the template's run fragmentation:
// header1: 0 'سامانه ' | 1 '...' | 2 'نسخه 1.0' | 7 'تاريخ: ' | 8 dd | 9 '/' | 10 mm | 11 '/140' | 12 '3'
// footer2: 0 'محرمانه' | 3 year | 4 '، سامانه ...' | 5 'صفحه ' | 6 PAGE | 8 NUMPAGES
fn default_header_footer_edits() -> Vec<PartEdits> {
    vec![
        PartEdits {
            part: "word/header1.xml".to_string(),
            edits: vec![
                edit(1, HeaderField::SystemName),
                edit(2, HeaderField::Version),
                edit(8, HeaderField::Day),
                edit(10, HeaderField::Month),
                edit(11, HeaderField::YearPrefix),
                edit(12, HeaderField::YearLast),
            ],
        },
        PartEdits {
            part: "word/footer2.xml".to_string(),
            edits: vec![
                edit(0, HeaderField::Classification),
                edit(3, HeaderField::RtlYear),
                edit(4, HeaderField::SystemSuffix),
            ],
        },
    ]
}

static GROUP_MEMBERS_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*-\s*اعضای گروه:\s*(.+?)\s*$")
        .unwrap_or_else(|e| panic!("invalid group-members pattern: {e}"))
});

/// The members listed on a `- اعضای گروه: ...` line, if present and non-empty.
pub fn group_members_from_markdown(text: &str) -> Option<String> {
    GROUP_MEMBERS_LINE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

impl ReportConfig {
    /// Load settings from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Group members from the first markdown source that lists them,
    /// otherwise the configured fallback. Unreadable files are skipped.
    pub fn group_members(&self) -> String {
        for source in &self.group_member_sources {
            let Ok(bytes) = fs::read(source) else {
                continue;
            };
            let text = String::from_utf8_lossy(&bytes);
            if let Some(members) = group_members_from_markdown(&text) {
                debug!("Group members read from {}", source.display());
                return members;
            }
        }
        self.group_members_fallback.clone()
    }

    /// Render a header/footer field for the report date.
    pub fn render_field(&self, field: &HeaderField, date: &JalaliDate) -> String {
        let year = date.year.to_string();
        let (year_head, year_tail) = if year.len() == 4 {
            year.split_at(3)
        } else {
            (year.as_str(), "")
        };
        match field {
            HeaderField::SystemName => self.system_name.clone(),
            HeaderField::Version => format!("نسخه {}", self.doc_version),
            HeaderField::Classification => self.classification.clone(),
            HeaderField::Day => to_persian_digits(&format!("{:02}", date.day)),
            HeaderField::Month => to_persian_digits(&format!("{:02}", date.month)),
            HeaderField::YearPrefix => to_persian_digits(&format!("/{year_head}")),
            HeaderField::YearLast => to_persian_digits(year_tail),
            HeaderField::RtlYear => format!("\u{200f}{}", to_persian_digits(&year)),
            HeaderField::SystemSuffix => format!("، سامانه {}", self.system_name),
            HeaderField::Literal { text } => text.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    fn date() -> JalaliDate {
        JalaliDate {
            year: 1404,
            month: 10,
            day: 5,
        }
    }

    #[rstest]
    #[case(HeaderField::Day, "۰۵")]
    #[case(HeaderField::Month, "۱۰")]
    #[case(HeaderField::YearPrefix, "/۱۴۰")]
    #[case(HeaderField::YearLast, "۴")]
    #[case(HeaderField::RtlYear, "\u{200f}۱۴۰۴")]
    #[case(HeaderField::Version, "نسخه 1.0")]
    #[case(HeaderField::SystemSuffix, "، سامانه مارکوپولو")]
    #[case(HeaderField::Literal { text: "x".to_string() }, "x")]
    fn test_render_field(#[case] field: HeaderField, #[case] expected: &str) {
        assert_eq!(ReportConfig::default().render_field(&field, &date()), expected);
    }

    #[test]
    fn test_group_members_regex() {
        let md = "# SAD\n\n- نام پروژه: مارکوپولو\n  - اعضای گروه:  علی، رضا  \n";
        assert_eq!(group_members_from_markdown(md), Some("علی، رضا".to_string()));
        assert_eq!(group_members_from_markdown("- اعضای گروه:   \n"), None);
        assert_eq!(group_members_from_markdown("no list here"), None);
    }

    #[test]
    fn test_group_members_source_order_and_fallback() {
        let dir = TempDir::new().unwrap();
        let first = dir.path().join("SAD.md");
        let second = dir.path().join("SAD-From-Template.md");
        fs::write(&second, "- اعضای گروه: دوم\n").unwrap();

        let mut config = ReportConfig {
            group_member_sources: vec![first.clone(), second],
            ..ReportConfig::default()
        };
        assert_eq!(config.group_members(), "دوم");

        fs::write(&first, "- اعضای گروه: اول\n").unwrap();
        assert_eq!(config.group_members(), "اول");

        config.group_member_sources.clear();
        assert_eq!(config.group_members(), "محمد صادقی، مهدی مالوردی");
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        fs::write(&path, r#"{"system_name": "نمونه", "doc_version": "2.0"}"#).unwrap();
        let config = ReportConfig::from_json_file(&path).unwrap();
        assert_eq!(config.system_name, "نمونه");
        assert_eq!(config.doc_version, "2.0");
        assert_eq!(config.classification, "محرمانه");
        assert_eq!(config.header_footer, default_header_footer_edits());
    }

    #[test]
    fn test_header_edit_json_shape() {
        let json = r#"{"part": "word/header2.xml", "edits": [{"index": 3, "field": "day"}, {"index": 4, "field": "literal", "text": "-"}]}"#;
        let edits: PartEdits = serde_json::from_str(json).unwrap();
        assert_eq!(edits.edits[0], edit(3, HeaderField::Day));
        assert_eq!(edits.edits[1], edit(4, HeaderField::Literal { text: "-".to_string() }));
    }

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["sad-docx-generate", "--date", "2025-12-26"]).unwrap();
        assert_eq!(cli.template, PathBuf::from("SAD-Template.docx"));
        assert_eq!(cli.out, PathBuf::from("SAD-Final.docx"));
        assert!(!cli.embed_images);
        assert_eq!(cli.date, NaiveDate::from_ymd_opt(2025, 12, 26));
    }
}
