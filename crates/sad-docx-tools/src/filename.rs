//! File names derived from figure captions.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// Used when a title sanitises to nothing.
pub const UNTITLED: &str = "بدون_عنوان";

static CAPTION_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*شکل\s*[۰-۹0-9\-]+\s*:\s*")
        .unwrap_or_else(|e| panic!("invalid caption prefix pattern: {e}"))
});
static RESERVED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[\\/:*?"<>|]+"#).unwrap_or_else(|e| panic!("invalid reserved pattern: {e}"))
});
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").unwrap_or_else(|e| panic!("invalid whitespace pattern: {e}")));
static UNDERSCORES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_+").unwrap_or_else(|e| panic!("invalid underscore pattern: {e}")));
static FIGURE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^fig-(\d+-\d+)-").unwrap_or_else(|e| panic!("invalid figure file pattern: {e}"))
});

const EDGE_CHARS: &[char] = &['.', '_', '-', ' ', '\u{200c}', '\u{200f}'];

/// Turn a caption or title into a file-name stem: drops a leading
/// `شکل N-M:` label, reserved and bracket characters, and joins words with
/// underscores.
pub fn sanitize_filename(text: &str) -> String {
    let text = CAPTION_PREFIX.replace(text.trim(), "");
    let text: String = text
        .chars()
        .map(|c| match c {
            '\u{2014}' | '\u{2013}' => '-',
            '(' | ')' | '+' => ' ',
            other => other,
        })
        .collect();
    let text = RESERVED.replace_all(&text, " ");
    let text = WHITESPACE.replace_all(&text, " ");
    let text = text.trim().replace(' ', "_");
    let text = UNDERSCORES.replace_all(&text, "_");
    let text = text.trim_matches(EDGE_CHARS);
    if text.is_empty() {
        UNTITLED.to_string()
    } else {
        text.to_string()
    }
}

/// `2-1` for `fig-2-1-context-vp.png`.
pub fn figure_id_from_filename(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    FIGURE_FILE
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
