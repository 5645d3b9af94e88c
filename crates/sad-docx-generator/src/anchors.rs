//! Literal paragraph texts the template is patched at.
//!
//! Matching is exact against the concatenated `w:t` text of a paragraph, so
//! these must keep the template's own letter forms (Arabic yeh U+064A in a
//! few of them).

/// Cover page organisation line.
pub const ORGANIZATION_PLACEHOLDER: &str = "سازمان ...";
/// Cover page system line.
pub const SYSTEM_PLACEHOLDER: &str = "سامانه ...";
/// Cover page season/year line.
pub const SEASON_PLACEHOLDER: &str = "پاییز 1404";
/// Label above the empty group-member lines on the cover.
pub const GROUP_MEMBERS_LABEL: &str = "نام اعضای گروه:";
/// Heading that precedes the revision history table.
pub const HISTORY_HEADING: &str = "تار\u{064a}خچه بازب\u{064a}ن\u{064a}";
/// First heading of the template body; generated content replaces everything from here on.
pub const CONTENT_START: &str = "کل\u{064a}ات سند";
/// Table of contents heading.
pub const TOC_HEADING: &str = "فهرست مطالب";
/// First paragraph after the table of contents.
pub const TOC_END: &str = "سند معماری نرم\u{200c}افزار";

/// Text of a figure marker paragraph is `[FIG:<id>]`.
pub const FIGURE_MARKER_PREFIX: &str = "[FIG:";
pub const FIGURE_MARKER_SUFFIX: &str = "]";

/// Marker text for a figure id.
pub fn figure_marker(id: &str) -> String {
    format!("{FIGURE_MARKER_PREFIX}{id}{FIGURE_MARKER_SUFFIX}")
}

/// The figure id if `text` is a marker.
pub fn parse_figure_marker(text: &str) -> Option<&str> {
    text.strip_prefix(FIGURE_MARKER_PREFIX)?
        .strip_suffix(FIGURE_MARKER_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_round_trip() {
        assert_eq!(figure_marker("4-2"), "[FIG:4-2]");
        assert_eq!(parse_figure_marker("[FIG:4-2]"), Some("4-2"));
        assert_eq!(parse_figure_marker("[FIG:4-2"), None);
        assert_eq!(parse_figure_marker("شکل ۴-۲"), None);
    }

    #[test]
    fn test_anchor_letter_forms() {
        assert!(HISTORY_HEADING.contains('\u{064a}'));
        assert!(CONTENT_START.starts_with('\u{06a9}'));
        assert!(TOC_END.contains('\u{200c}'));
    }
}
