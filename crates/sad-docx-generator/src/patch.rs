//! In-place edits of the template: cover lines, revision history, body
//! replacement, heading bookmarks, the visible TOC, settings and
//! header/footer text nodes.
//!
//! All lookups go through the direct children of `w:body` and compare the
//! trimmed paragraph text against the literals in [`crate::anchors`].

use sad_docx_core::wml::{self, paragraph_style, paragraph_text, RunFormat};
use sad_docx_core::{Element, Node, Package, XmlDocument, DOCUMENT_PART, SETTINGS_PART};
use tracing::{debug, warn};

use crate::anchors::{
    CONTENT_START, GROUP_MEMBERS_LABEL, HISTORY_HEADING, TOC_END, TOC_HEADING,
};
use crate::error::{GenerateError, Result};

/// How far below the group-members label an empty centered line is looked for.
const GROUP_MEMBERS_WINDOW: usize = 20;
/// Bookmark ids are allocated from here up, or above the template's largest.
const FIRST_BOOKMARK_ID: u64 = 1000;

fn body_mut(doc: &mut XmlDocument) -> Result<&mut Element> {
    doc.root
        .child_mut("w:body")
        .ok_or_else(|| GenerateError::MissingBody(DOCUMENT_PART.to_string()))
}

fn is_paragraph_with_text(node: &Node, text: &str) -> bool {
    node.as_element()
        .is_some_and(|el| el.is("w:p") && paragraph_text(el) == text)
}

fn position_of_paragraph(body: &Element, text: &str, from: usize) -> Option<usize> {
    body.children
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, node)| is_paragraph_with_text(node, text))
        .map(|(i, _)| i)
}

/// Replace the runs of the first body paragraph reading exactly `anchor`.
/// Returns whether the anchor was found.
pub fn replace_anchor_text(doc: &mut XmlDocument, anchor: &str, text: &str) -> Result<bool> {
    let body = body_mut(doc)?;
    let Some(idx) = position_of_paragraph(body, anchor, 0) else {
        warn!("Cover anchor {:?} not found, left as is", anchor);
        return Ok(false);
    };
    if let Some(p) = body.children[idx].as_element_mut() {
        wml::replace_runs(p, text);
    }
    Ok(true)
}

/// Write the group members into the first empty centered line below the
/// group-members label, borrowing the label's run formatting.
pub fn fill_cover_group_members(doc: &mut XmlDocument, members: &str) -> Result<bool> {
    let body = body_mut(doc)?;
    let paragraphs: Vec<usize> = body
        .children
        .iter()
        .enumerate()
        .filter(|(_, n)| n.as_element().is_some_and(|el| el.is("w:p")))
        .map(|(i, _)| i)
        .collect();

    let Some(label_pos) = paragraphs
        .iter()
        .position(|&i| is_paragraph_with_text(&body.children[i], GROUP_MEMBERS_LABEL))
    else {
        warn!("Group members label not found on the cover");
        return Ok(false);
    };
    let label_rpr = body.children[paragraphs[label_pos]]
        .as_element()
        .and_then(|p| p.child("w:r"))
        .and_then(|r| r.child("w:rPr"))
        .cloned();

    let window_end = (label_pos + GROUP_MEMBERS_WINDOW).min(paragraphs.len());
    for &idx in &paragraphs[label_pos + 1..window_end] {
        let Some(p) = body.children[idx].as_element_mut() else {
            continue;
        };
        if !paragraph_text(p).is_empty() {
            break;
        }
        if wml::paragraph_alignment(p) != Some("center") {
            continue;
        }

        if p.child("w:r").is_none() {
            p.push(Element::new("w:r"));
        }
        let Some(run) = p.child_mut("w:r") else {
            continue;
        };
        if run.child("w:rPr").is_none() {
            if let Some(rpr) = &label_rpr {
                run.children.insert(0, rpr.clone().into());
            }
        }
        run.child_or_insert("w:t").set_text(members);
        debug!("Group members written below the cover label");
        return Ok(true);
    }

    warn!("No empty centered line below the group members label");
    Ok(false)
}

/// The first data row of the revision history table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Jalali date, already in Persian digits.
    pub date: String,
    pub version: String,
    pub status: String,
    pub prepared_by: String,
}

impl HistoryEntry {
    /// Entry for a member list written with Persian commas (`الف، ب`),
    /// shown as `الف / ب`.
    pub fn new(date: String, version: &str, status: &str, members: &str) -> Self {
        Self {
            date,
            version: version.to_string(),
            status: status.to_string(),
            prepared_by: members.replace('،', " / "),
        }
    }

    fn cells(&self) -> [&str; 4] {
        [
            self.date.as_str(),
            self.version.as_str(),
            self.status.as_str(),
            self.prepared_by.as_str(),
        ]
    }
}

/// Fill the second row of the first table after the history heading.
/// Tables with fewer than two rows or four cells are left alone.
pub fn fill_history_table(doc: &mut XmlDocument, entry: &HistoryEntry) -> Result<bool> {
    let body = body_mut(doc)?;
    let Some(heading) = position_of_paragraph(body, HISTORY_HEADING, 0) else {
        warn!("Revision history heading not found");
        return Ok(false);
    };
    let Some(tbl) = body
        .children
        .iter_mut()
        .skip(heading + 1)
        .filter_map(Node::as_element_mut)
        .find(|el| el.is("w:tbl"))
    else {
        warn!("No table after the revision history heading");
        return Ok(false);
    };

    let Some(row) = tbl
        .child_elements_mut()
        .filter(|el| el.is("w:tr"))
        .nth(1)
    else {
        warn!("Revision history table has no data row");
        return Ok(false);
    };
    let mut cells: Vec<&mut Element> = row.child_elements_mut().filter(|el| el.is("w:tc")).collect();
    if cells.len() < 4 {
        warn!("Revision history row has {} cells, expected 4", cells.len());
        return Ok(false);
    }

    for (cell, value) in cells.iter_mut().zip(entry.cells()) {
        if let Some(p) = cell.child_mut("w:p") {
            wml::replace_runs(p, value);
        }
    }
    Ok(true)
}

/// Replace everything from the content-start heading up to the section
/// properties with `content`. Returns the index of the first inserted element.
pub fn insert_content(doc: &mut XmlDocument, content: Vec<Element>) -> Result<usize> {
    let body = body_mut(doc)?;
    let start = position_of_paragraph(body, CONTENT_START, 0)
        .ok_or_else(|| GenerateError::MissingAnchor(CONTENT_START.to_string()))?;
    let end = body
        .children
        .iter()
        .skip(start)
        .position(|n| n.as_element().is_some_and(|el| el.is("w:sectPr")))
        .map_or(body.children.len(), |offset| start + offset);

    let count = content.len();
    let removed: Vec<Node> = body
        .children
        .splice(start..end, content.into_iter().map(Node::from))
        .collect();
    debug!("Replaced {} template elements with {} generated ones", removed.len(), count);
    Ok(start)
}

/// A heading that gets a TOC entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocItem {
    pub level: u8,
    pub title: String,
    pub bookmark: String,
}

fn heading_level(style: &str) -> Option<u8> {
    match style {
        "Heading1" => Some(1),
        "Heading2" => Some(2),
        "Heading3" => Some(3),
        _ => None,
    }
}

fn max_bookmark_id(root: &Element) -> u64 {
    root.descendants()
        .into_iter()
        .filter(|el| el.is("w:bookmarkStart"))
        .filter_map(|el| el.attr("w:id")?.parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}

/// Make sure every non-empty level 1-3 heading at or after `from` carries a
/// bookmark, and list them in document order.
///
/// A heading that already starts a bookmark keeps it. New bookmarks are named
/// `_TocCustom<n>` and wrap the paragraph's runs.
pub fn assign_heading_bookmarks(doc: &mut XmlDocument, from: usize) -> Result<Vec<TocItem>> {
    let mut next_id = (max_bookmark_id(&doc.root) + 1).max(FIRST_BOOKMARK_ID);
    let mut seq = 1;
    let mut items = Vec::new();

    let body = body_mut(doc)?;
    for p in body
        .children
        .iter_mut()
        .skip(from)
        .filter_map(Node::as_element_mut)
        .filter(|el| el.is("w:p"))
    {
        let Some(level) = paragraph_style(p).and_then(heading_level) else {
            continue;
        };
        let title = paragraph_text(p);
        if title.is_empty() {
            continue;
        }

        let existing = p
            .child("w:bookmarkStart")
            .and_then(|bm| bm.attr("w:name"))
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let bookmark = match existing {
            Some(name) => name,
            None => {
                let name = format!("_TocCustom{seq}");
                seq += 1;
                let id = next_id.to_string();
                next_id += 1;
                // Properties stay the first child.
                let at = p
                    .children
                    .iter()
                    .position(|n| n.as_element().is_some_and(|el| el.is("w:pPr")))
                    .map_or(0, |i| i + 1);
                p.children.insert(
                    at,
                    Element::new("w:bookmarkStart")
                        .with_attr("w:id", id.as_str())
                        .with_attr("w:name", name.as_str())
                        .into(),
                );
                p.push(Element::new("w:bookmarkEnd").with_attr("w:id", id));
                name
            }
        };
        items.push(TocItem {
            level,
            title,
            bookmark,
        });
    }
    Ok(items)
}

/// Hierarchical numbering of headings: `1-`, `1-1-`, `1-1-1-`.
#[derive(Debug, Default)]
pub struct TocNumbering {
    counters: [u32; 3],
}

impl TocNumbering {
    /// Prefix for the next heading at `level` (clamped to 1..=3).
    pub fn next(&mut self, level: u8) -> String {
        let depth = usize::from(level.clamp(1, 3));
        self.counters[depth - 1] += 1;
        for deeper in &mut self.counters[depth..] {
            *deeper = 0;
        }
        self.counters[..depth]
            .iter()
            .map(|n| format!("{n}-"))
            .collect()
    }
}

fn toc_entry(item: &TocItem, prefix: &str) -> Element {
    let format = RunFormat::default();
    let mut tab = Element::new("w:r").with_child(wml::rtl_run_properties(&format));
    tab.push(Element::new("w:tab"));

    Element::new("w:p")
        .with_child(
            Element::new("w:pPr")
                .with_child(Element::new("w:pStyle").with_attr("w:val", format!("TOC{}", item.level))),
        )
        .with_child(
            Element::new("w:hyperlink")
                .with_attr("w:anchor", item.bookmark.as_str())
                .with_attr("w:history", "1")
                .with_child(wml::run(&format!("{prefix}{}", item.title), &format)),
        )
        .with_child(tab)
        .with_child(
            Element::new("w:fldSimple")
                .with_attr("w:instr", format!("PAGEREF {} \\h", item.bookmark))
                .with_child(wml::run("", &format)),
        )
}

/// Regenerate the visible table of contents between the TOC heading and the
/// paragraph that follows it in the template, from the headings inserted at
/// `content_start`. Page numbers are `PAGEREF` fields resolved on open.
///
/// Returns the number of entries written; nothing changes when either marker
/// is missing or there are no headings.
pub fn rebuild_toc(doc: &mut XmlDocument, content_start: usize) -> Result<usize> {
    let (heading, end) = {
        let body = body_mut(doc)?;
        let Some(heading) = position_of_paragraph(body, TOC_HEADING, 0) else {
            warn!("TOC heading not found, TOC left as is");
            return Ok(0);
        };
        let Some(end) = position_of_paragraph(body, TOC_END, heading + 1) else {
            warn!("End of the TOC area not found, TOC left as is");
            return Ok(0);
        };
        (heading, end)
    };

    let items = assign_heading_bookmarks(doc, content_start)?;
    if items.is_empty() {
        return Ok(0);
    }

    let body = body_mut(doc)?;
    let mut idx = heading + 1;
    let mut end = end;
    while idx < end {
        let stale = body.children[idx].as_element().is_some_and(|el| {
            el.is("w:p") && paragraph_style(el).is_some_and(|s| s.starts_with("TOC"))
        });
        if stale {
            body.children.remove(idx);
            end -= 1;
        } else {
            idx += 1;
        }
    }

    let mut numbering = TocNumbering::default();
    for (offset, item) in items.iter().enumerate() {
        let entry = toc_entry(item, &numbering.next(item.level));
        body.children.insert(heading + 1 + offset, entry.into());
    }
    debug!("Wrote {} TOC entries", items.len());
    Ok(items.len())
}

/// Ask Word/LibreOffice to refresh fields (the TOC included) on open.
/// Returns false when the package has no settings part.
pub fn enable_field_update(package: &mut Package) -> Result<bool> {
    let Some(mut settings) = package.xml_part(SETTINGS_PART)? else {
        debug!("No {}, field update not enabled", SETTINGS_PART);
        return Ok(false);
    };
    settings
        .root
        .child_or_insert("w:updateFields")
        .set_attr("w:val", "true");
    package.set_xml_part(SETTINGS_PART, &settings)?;
    Ok(true)
}

/// Overwrite `w:t` text nodes of a header/footer part by document-order
/// position. The text is written verbatim. Returns the number of nodes set.
pub fn patch_text_nodes(package: &mut Package, part: &str, edits: &[(usize, String)]) -> Result<usize> {
    let Some(mut doc) = package.xml_part(part)? else {
        debug!("No {}, header/footer edits skipped", part);
        return Ok(0);
    };

    let total = doc
        .root
        .descendants()
        .into_iter()
        .filter(|el| el.is("w:t"))
        .count();

    let mut applied = 0;
    let mut position = 0usize;
    doc.root.for_each_descendant_mut(&mut |el: &mut Element| {
        if !el.is("w:t") {
            return;
        }
        if let Some((_, value)) = edits.iter().find(|(i, _)| *i == position) {
            el.set_text(value.as_str());
            applied += 1;
        }
        position += 1;
    });

    for (index, _) in edits.iter().filter(|(i, _)| *i >= total) {
        warn!("{} has {} text nodes, index {} skipped", part, total, index);
    }
    package.set_xml_part(part, &doc)?;
    Ok(applied)
}
