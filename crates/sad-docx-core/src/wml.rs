//! WordprocessingML fragment builders and paragraph helpers.
//!
//! Every paragraph and run built here carries right-to-left properties
//! (`w:rtl`, complex-script font, `fa-IR` bidi language), since the report
//! body is Persian.

use crate::sanitize::sanitize;
use crate::xml::Element;

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Width of generated tables, in twentieths of a point.
pub const TABLE_TOTAL_WIDTH: u32 = 8530;
/// Lower bound for any single column width.
pub const TABLE_MIN_COLUMN_WIDTH: u32 = 300;

const COMPLEX_SCRIPT_FONT: &str = "B Nazanin";
const BIDI_LANG: &str = "fa-IR";

/// Horizontal paragraph alignment (`w:jc`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Alignment {
    /// Justified with kashida stretching, the default for Persian body text.
    #[default]
    LowKashida,
    Both,
    Center,
    Left,
    Right,
}

impl Alignment {
    pub fn as_str(self) -> &'static str {
        match self {
            Alignment::LowKashida => "lowKashida",
            Alignment::Both => "both",
            Alignment::Center => "center",
            Alignment::Left => "left",
            Alignment::Right => "right",
        }
    }
}

/// Run-level formatting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFormat {
    pub bold: bool,
    pub italic: bool,
    pub color: Option<String>,
}

/// Options for [`paragraph`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParagraphOptions {
    pub style: Option<String>,
    pub run: RunFormat,
    pub align: Alignment,
    pub spacing_before: u32,
    pub spacing_after: u32,
    pub keep_next: bool,
}

impl Default for ParagraphOptions {
    fn default() -> Self {
        Self {
            style: None,
            run: RunFormat::default(),
            align: Alignment::LowKashida,
            spacing_before: 100,
            spacing_after: 100,
            keep_next: false,
        }
    }
}

impl ParagraphOptions {
    pub fn style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn bold(mut self) -> Self {
        self.run.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.run.italic = true;
        self
    }

    pub fn color(mut self, color: impl Into<String>) -> Self {
        self.run.color = Some(color.into());
        self
    }

    pub fn align(mut self, align: Alignment) -> Self {
        self.align = align;
        self
    }

    pub fn spacing(mut self, before: u32, after: u32) -> Self {
        self.spacing_before = before;
        self.spacing_after = after;
        self
    }

    pub fn keep_next(mut self) -> Self {
        self.keep_next = true;
        self
    }
}

/// Run properties with the RTL tagging. Used for both `w:pPr` (as the
/// paragraph mark's properties) and `w:r`.
pub fn rtl_run_properties(format: &RunFormat) -> Element {
    let mut rpr = Element::new("w:rPr");
    rpr.push(Element::new("w:rFonts").with_attr("w:cs", COMPLEX_SCRIPT_FONT));
    if format.bold {
        rpr.push(Element::new("w:b"));
        rpr.push(Element::new("w:bCs"));
    }
    if format.italic {
        rpr.push(Element::new("w:i"));
        rpr.push(Element::new("w:iCs"));
    }
    if let Some(color) = &format.color {
        rpr.push(Element::new("w:color").with_attr("w:val", color.as_str()));
    }
    rpr.push(Element::new("w:rtl"));
    rpr.push(Element::new("w:lang").with_attr("w:bidi", BIDI_LANG));
    rpr
}

/// A `w:t` holding sanitised text, with `xml:space="preserve"` when the
/// text has edge spaces.
pub fn text_element(text: &str) -> Element {
    let text = sanitize(text);
    let mut t = Element::new("w:t");
    if text.starts_with(' ') || text.ends_with(' ') {
        t.set_attr("xml:space", "preserve");
    }
    if !text.is_empty() {
        t.push_text(text);
    }
    t
}

/// A run with RTL properties and a single text element.
pub fn run(text: &str, format: &RunFormat) -> Element {
    Element::new("w:r")
        .with_child(rtl_run_properties(format))
        .with_child(text_element(text))
}

fn spacing(before: u32, after: u32, line: u32, autospacing: bool) -> Element {
    let mut el = Element::new("w:spacing").with_attr("w:before", before.to_string());
    if autospacing {
        el.set_attr("w:beforeAutospacing", "1");
    }
    el.set_attr("w:after", after.to_string());
    if autospacing {
        el.set_attr("w:afterAutospacing", "1");
    }
    el.set_attr("w:line", line.to_string());
    el.set_attr("w:lineRule", "auto");
    el
}

/// Build a body paragraph. Empty text yields a paragraph with properties only.
pub fn paragraph(text: &str, opts: &ParagraphOptions) -> Element {
    let mut ppr = Element::new("w:pPr");
    if let Some(style) = &opts.style {
        ppr.push(Element::new("w:pStyle").with_attr("w:val", style.as_str()));
    }
    ppr.push(spacing(opts.spacing_before, opts.spacing_after, 360, true));
    if opts.keep_next {
        ppr.push(Element::new("w:keepNext"));
    }
    ppr.push(Element::new("w:jc").with_attr("w:val", opts.align.as_str()));
    ppr.push(rtl_run_properties(&RunFormat::default()));

    let mut p = Element::new("w:p").with_child(ppr);
    if !text.is_empty() {
        p.push(run(text, &opts.run));
    }
    p
}

/// A bold label line that keeps with the following paragraph.
pub fn label(text: &str) -> Element {
    paragraph(
        text,
        &ParagraphOptions::default().bold().spacing(200, 80).keep_next(),
    )
}

/// Column widths proportional to `weights`, each at least
/// [`TABLE_MIN_COLUMN_WIDTH`], summing exactly to [`TABLE_TOTAL_WIDTH`].
///
/// Weights whose length does not match `columns` are ignored in favour of
/// equal weighting. The last column absorbs rounding drift; when the floor
/// pushes the sum past the total, the excess comes off the widest columns.
pub fn column_widths(columns: usize, weights: Option<&[u32]>) -> Vec<u32> {
    if columns == 0 {
        return Vec::new();
    }
    let equal = vec![1u32; columns];
    let weights = match weights {
        Some(w) if w.len() == columns => w,
        _ => equal.as_slice(),
    };
    let total = u64::from(TABLE_TOTAL_WIDTH);
    let min = u64::from(TABLE_MIN_COLUMN_WIDTH);
    let floor = if min * columns as u64 > total { 0 } else { min };
    let sum: u64 = weights.iter().map(|&w| u64::from(w)).sum();
    let sum = if sum == 0 { columns as u64 } else { sum };

    let mut widths: Vec<u64> = weights
        .iter()
        .map(|&w| (total * u64::from(w) / sum).max(floor))
        .collect();

    let used: u64 = widths.iter().sum();
    if used <= total {
        if let Some(last) = widths.last_mut() {
            *last += total - used;
        }
    } else {
        let mut excess = used - total;
        while excess > 0 {
            let Some((idx, &widest)) = widths.iter().enumerate().max_by_key(|(_, w)| **w) else {
                break;
            };
            let take = (widest - floor).min(excess);
            if take == 0 {
                break;
            }
            widths[idx] -= take;
            excess -= take;
        }
    }
    widths.into_iter().map(|w| w as u32).collect()
}

fn table_properties() -> Element {
    let mut tbl_pr = Element::new("w:tblPr");
    tbl_pr.push(Element::new("w:tblStyle").with_attr("w:val", "TableGrid"));
    tbl_pr.push(Element::new("w:bidiVisual"));
    tbl_pr.push(
        Element::new("w:tblW")
            .with_attr("w:w", TABLE_TOTAL_WIDTH.to_string())
            .with_attr("w:type", "dxa"),
    );
    tbl_pr.push(Element::new("w:jc").with_attr("w:val", "center"));

    let margins = tbl_pr.push(Element::new("w:tblCellMar"));
    for side in ["left", "right", "top", "bottom"] {
        margins.push(
            Element::new(format!("w:{side}"))
                .with_attr("w:w", "0")
                .with_attr("w:type", "dxa"),
        );
    }

    let borders = tbl_pr.push(Element::new("w:tblBorders"));
    for side in ["top", "left", "bottom", "right", "insideH", "insideV"] {
        borders.push(
            Element::new(format!("w:{side}"))
                .with_attr("w:val", "single")
                .with_attr("w:sz", "6")
                .with_attr("w:space", "0")
                .with_attr("w:color", "C9C9C9")
                .with_attr("w:themeColor", "accent3")
                .with_attr("w:themeTint", "99"),
        );
    }

    tbl_pr.push(
        Element::new("w:tblLook")
            .with_attr("w:val", "04A0")
            .with_attr("w:firstRow", "1")
            .with_attr("w:lastRow", "0")
            .with_attr("w:firstColumn", "1")
            .with_attr("w:lastColumn", "0")
            .with_attr("w:noHBand", "0")
            .with_attr("w:noVBand", "1"),
    );
    tbl_pr
}

// Compact spacing inside cells keeps rows from spilling across pages.
fn cell(text: &str, width: u32, header: bool) -> Element {
    let ppr = Element::new("w:pPr")
        .with_child(spacing(0, 0, 240, false))
        .with_child(Element::new("w:jc").with_attr("w:val", "center"))
        .with_child(rtl_run_properties(&RunFormat::default()));
    let format = RunFormat {
        bold: header,
        ..RunFormat::default()
    };
    let p = Element::new("w:p")
        .with_child(ppr)
        .with_child(run(text, &format));

    let tc_pr = Element::new("w:tcPr")
        .with_child(
            Element::new("w:tcW")
                .with_attr("w:w", width.to_string())
                .with_attr("w:type", "dxa"),
        )
        .with_child(Element::new("w:vAlign").with_attr("w:val", "center"));
    Element::new("w:tc").with_child(tc_pr).with_child(p)
}

/// Build a data table. Rows are zipped against the column widths: a short
/// row yields fewer cells, a long row is truncated.
pub fn table<R, C>(headers: &[C], rows: &[R], weights: Option<&[u32]>) -> Element
where
    R: AsRef<[C]>,
    C: AsRef<str>,
{
    let widths = column_widths(headers.len(), weights);

    let mut tbl = Element::new("w:tbl").with_child(table_properties());
    let grid = tbl.push(Element::new("w:tblGrid"));
    for w in &widths {
        grid.push(Element::new("w:gridCol").with_attr("w:w", w.to_string()));
    }

    let header_row = tbl.push(Element::new("w:tr"));
    header_row.push(
        Element::new("w:trPr")
            .with_child(Element::new("w:tblHeader"))
            .with_child(Element::new("w:cantSplit")),
    );
    for (w, h) in widths.iter().zip(headers) {
        header_row.push(cell(h.as_ref(), *w, true));
    }

    for row in rows {
        let tr = tbl.push(Element::new("w:tr"));
        tr.push(Element::new("w:trPr").with_child(Element::new("w:cantSplit")));
        for (w, c) in widths.iter().zip(row.as_ref()) {
            tr.push(cell(c.as_ref(), *w, false));
        }
    }
    tbl
}

/// Concatenated text of every `w:t` under the element, trimmed.
pub fn paragraph_text(p: &Element) -> String {
    let mut out = String::new();
    for el in p.descendants() {
        if el.is("w:t") {
            out.push_str(&el.text());
        }
    }
    out.trim().to_string()
}

/// The paragraph's `w:pStyle` value, if any.
pub fn paragraph_style(p: &Element) -> Option<&str> {
    p.child("w:pPr")?.child("w:pStyle")?.attr("w:val")
}

/// The paragraph's `w:jc` value, if any.
pub fn paragraph_alignment(p: &Element) -> Option<&str> {
    p.child("w:pPr")?.child("w:jc")?.attr("w:val")
}

/// Drop every direct `w:r` of the paragraph and append a single RTL run.
pub fn replace_runs(p: &mut Element, text: &str) {
    p.remove_children_named("w:r");
    p.push(run(text, &RunFormat::default()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn rows_of(tbl: &Element) -> Vec<&Element> {
        tbl.children_named("w:tr").collect()
    }

    #[test]
    fn test_paragraph_defaults() {
        let p = paragraph("سلام", &ParagraphOptions::default());
        assert_eq!(paragraph_alignment(&p), Some("lowKashida"));
        assert_eq!(paragraph_style(&p), None);
        let spacing = p.child("w:pPr").and_then(|ppr| ppr.child("w:spacing")).unwrap();
        assert_eq!(spacing.attr("w:before"), Some("100"));
        assert_eq!(spacing.attr("w:after"), Some("100"));
        assert_eq!(spacing.attr("w:line"), Some("360"));

        let runs: Vec<&Element> = p.children_named("w:r").collect();
        assert_eq!(runs.len(), 1);
        let rpr = runs[0].child("w:rPr").unwrap();
        assert!(rpr.child("w:rtl").is_some());
        assert_eq!(rpr.child("w:lang").and_then(|l| l.attr("w:bidi")), Some("fa-IR"));
        assert_eq!(paragraph_text(&p), "سلام");
    }

    #[test]
    fn test_empty_paragraph_has_no_run() {
        let p = paragraph("", &ParagraphOptions::default().style("Heading1"));
        assert_eq!(p.children_named("w:r").count(), 0);
        assert_eq!(paragraph_style(&p), Some("Heading1"));
    }

    #[test]
    fn test_text_is_sanitized() {
        let t = text_element("  ادامه…  ");
        assert_eq!(t.text(), "ادامه...");
        assert_eq!(t.attr("xml:space"), None);
        assert!(text_element("").children.is_empty());
    }

    #[test]
    fn test_label_is_bold_and_keeps_next() {
        let p = label("کنشگرها:");
        let ppr = p.child("w:pPr").unwrap();
        assert!(ppr.child("w:keepNext").is_some());
        let spacing = ppr.child("w:spacing").unwrap();
        assert_eq!(spacing.attr("w:before"), Some("200"));
        assert_eq!(spacing.attr("w:after"), Some("80"));
        let rpr = p.child("w:r").and_then(|r| r.child("w:rPr")).unwrap();
        assert!(rpr.child("w:b").is_some());
        assert!(rpr.child("w:bCs").is_some());
    }

    #[test]
    fn test_italic_colored_run() {
        let p = paragraph(
            "شکل ۱",
            &ParagraphOptions::default()
                .italic()
                .color("FF0000")
                .align(Alignment::Center)
                .spacing(0, 100),
        );
        let rpr = p.child("w:r").and_then(|r| r.child("w:rPr")).unwrap();
        let names: Vec<&str> = rpr.child_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["w:rFonts", "w:i", "w:iCs", "w:color", "w:rtl", "w:lang"]
        );
        assert_eq!(paragraph_alignment(&p), Some("center"));
    }

    #[test]
    fn test_column_widths_weighted() {
        assert_eq!(column_widths(3, Some(&[1, 2, 1])), vec![2132, 4265, 2133]);
        assert_eq!(column_widths(2, None), vec![4265, 4265]);
    }

    #[test]
    fn test_column_widths_mismatched_weights_fall_back_to_equal() {
        assert_eq!(column_widths(2, Some(&[1, 2, 3])), column_widths(2, None));
    }

    #[test]
    fn test_column_widths_floor_applies() {
        let widths = column_widths(3, Some(&[1000, 1, 1]));
        assert_eq!(widths[1], TABLE_MIN_COLUMN_WIDTH);
        assert_eq!(widths.iter().sum::<u32>(), TABLE_TOTAL_WIDTH);
    }

    #[test]
    fn test_table_header_and_row_flags() {
        let tbl = table(
            &["الف", "ب"],
            &[vec!["1", "2"], vec!["3", "4"]],
            None,
        );
        let rows = rows_of(&tbl);
        assert_eq!(rows.len(), 3);
        let header_pr = rows[0].child("w:trPr").unwrap();
        assert!(header_pr.child("w:tblHeader").is_some());
        assert!(header_pr.child("w:cantSplit").is_some());
        for row in &rows[1..] {
            let pr = row.child("w:trPr").unwrap();
            assert!(pr.child("w:cantSplit").is_some());
            assert!(pr.child("w:tblHeader").is_none());
        }
        let header_run = rows[0]
            .child("w:tc")
            .and_then(|tc| tc.child("w:p"))
            .and_then(|p| p.child("w:r"))
            .and_then(|r| r.child("w:rPr"))
            .unwrap();
        assert!(header_run.child("w:b").is_some());
        assert_eq!(tbl.child("w:tblGrid").unwrap().children_named("w:gridCol").count(), 2);
    }

    #[test]
    fn test_ragged_rows_are_zipped_not_padded() {
        let rows = vec![vec!["a"], vec!["a", "b", "c"]];
        let tbl = table(&["h1", "h2"], &rows, None);
        let cells: Vec<usize> = rows_of(&tbl)
            .iter()
            .map(|tr| tr.children_named("w:tc").count())
            .collect();
        assert_eq!(cells, vec![2, 1, 2]);
    }

    #[test]
    fn test_replace_runs() {
        let mut p = paragraph("سازمان ...", &ParagraphOptions::default());
        p.push(run("اضافه", &RunFormat::default()));
        replace_runs(&mut p, "سازمان نمونه");
        assert_eq!(p.children_named("w:r").count(), 1);
        assert_eq!(paragraph_text(&p), "سازمان نمونه");
        assert!(p.child("w:pPr").is_some());
    }

    proptest! {
        #[test]
        fn prop_widths_sum_to_total(weights in proptest::collection::vec(1u32..50, 1..12)) {
            let widths = column_widths(weights.len(), Some(&weights));
            prop_assert_eq!(widths.len(), weights.len());
            prop_assert_eq!(widths.iter().sum::<u32>(), TABLE_TOTAL_WIDTH);
        }

        #[test]
        fn prop_ragged_rows_cap_at_min(h in 1usize..6, lens in proptest::collection::vec(0usize..9, 0..6)) {
            let headers: Vec<String> = (0..h).map(|i| format!("h{i}")).collect();
            let rows: Vec<Vec<String>> = lens
                .iter()
                .map(|&n| (0..n).map(|i| format!("c{i}")).collect())
                .collect();
            let tbl = table(&headers, &rows, None);
            let data_rows: Vec<&Element> = tbl.children_named("w:tr").skip(1).collect();
            prop_assert_eq!(data_rows.len(), rows.len());
            for (tr, n) in data_rows.iter().zip(&lens) {
                prop_assert_eq!(tr.children_named("w:tc").count(), h.min(*n));
            }
        }
    }
}
