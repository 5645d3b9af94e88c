//! Text normalisation applied to every string before it lands in a `w:t`.

use std::sync::LazyLock;

use regex::Regex;

/// Invisible and bidi-control marks. ZWNJ (U+200C) is deliberately absent:
/// Persian orthography needs it as the half-space.
static INVISIBLE_MARKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("[\u{200b}\u{200d}\u{200e}\u{200f}\u{feff}\u{2066}-\u{2069}\u{202a}-\u{202e}]")
        .unwrap_or_else(|e| panic!("invalid invisible-mark pattern: {e}"))
});

static HORIZONTAL_RUNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new("[ \t]{2,}").unwrap_or_else(|e| panic!("invalid whitespace pattern: {e}"))
});

/// Normalise punctuation, letter variants and whitespace.
///
/// Total and idempotent: `sanitize(&sanitize(x)) == sanitize(x)`.
pub fn sanitize(text: &str) -> String {
    let text = INVISIBLE_MARKS.replace_all(text, "");
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\u{00a0}' => out.push(' '),
            '\u{2026}' => out.push_str("..."),
            '\u{2014}' | '\u{2013}' | '\u{2212}' => out.push('-'),
            '\u{00ab}' | '\u{00bb}' => {}
            '\u{064a}' => out.push('\u{06cc}'),
            '\u{0643}' => out.push('\u{06a9}'),
            other => out.push(other),
        }
    }
    HORIZONTAL_RUNS.replace_all(&out, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case::keeps_zwnj("می\u{200c}شود", "می\u{200c}شود")]
    #[case::drops_bidi_marks("\u{200f}سلام\u{202b}\u{200e}", "سلام")]
    #[case::drops_bom_and_isolates("\u{feff}a\u{2066}b\u{2069}", "ab")]
    #[case::nbsp("a\u{00a0}b", "a b")]
    #[case::ellipsis("ادامه…", "ادامه...")]
    #[case::dashes("1—2–3−4", "1-2-3-4")]
    #[case::guillemets("«نقل»", "نقل")]
    #[case::arabic_letters("علي كتاب", "علی کتاب")]
    #[case::collapses_runs("a  \t b\t\tc", "a b c")]
    #[case::trims("  x  ", "x")]
    #[case::newlines_survive("a\n\nb", "a\n\nb")]
    fn test_sanitize_cases(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize(input), expected);
    }

    #[test]
    fn test_removed_mark_between_spaces_collapses() {
        // Removing the mark first leaves two spaces, which then collapse.
        assert_eq!(sanitize("a \u{200f} b"), "a b");
        assert_eq!(sanitize("a \u{00a0}b"), "a b");
    }

    proptest! {
        #[test]
        fn prop_sanitize_is_idempotent(s in "[ \t\u{00a0}\u{200b}-\u{200f}\u{202a}-\u{202e}\u{2066}-\u{2069}\u{feff}\u{2013}\u{2014}\u{2026}\u{2212}«»يكa-zآ-ی\n]{0,40}") {
            let once = sanitize(&s);
            prop_assert_eq!(sanitize(&once), once);
        }

        #[test]
        fn prop_sanitize_any_string_is_idempotent(s in any::<String>()) {
            let once = sanitize(&s);
            prop_assert_eq!(sanitize(&once), once);
        }
    }
}
