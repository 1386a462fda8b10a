//! Text sanitation.
//!
//! Raw input from files, flags or the web form goes through [`TextSanitizer`]
//! before it reaches an engine. The result is a [`SanitizedText`], which can
//! only be obtained from the sanitizer and is never mutated afterwards.

use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use unicode_normalization::UnicodeNormalization;

use crate::error::ValidationError;

/// Default maximum number of characters accepted for a single synthesis.
pub const DEFAULT_MAX_TEXT_LEN: usize = 8000;

/// Punctuation kept as-is. Everything else outside letters, combining marks,
/// digits and whitespace is dropped.
pub const ALLOWED_PUNCTUATION: &str = ".,;:!?'\"()[]-–—%";

/// Text that passed sanitation: only accepted characters, not empty, within
/// the configured length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedText(String);

impl SanitizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SanitizedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SanitizedText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
pub struct TextSanitizer {
    max_len: usize,
}

impl Default for TextSanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TEXT_LEN)
    }
}

impl TextSanitizer {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Clean `raw` and check the result against the length limit.
    pub fn sanitize(&self, raw: &str) -> Result<SanitizedText, ValidationError> {
        let cleaned = clean(raw);
        if cleaned.is_empty() {
            return Err(ValidationError::EmptyText);
        }

        let length = cleaned.chars().count();
        if length > self.max_len {
            return Err(ValidationError::TextTooLong {
                length,
                max: self.max_len,
            });
        }

        Ok(SanitizedText(cleaned))
    }
}

/// Strip `raw` down to characters the engines accept, keeping letters with
/// their diacritics, digits and plain punctuation.
///
/// Never fails; an empty return value means nothing usable was left.
pub fn clean(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let decoded = html_escape::decode_html_entities(raw);
    let without_tags = html_tag_re().replace_all(&decoded, " ");

    let kept = disallowed_re().replace_all(&without_tags, "");
    let mut filtered = String::with_capacity(kept.len());
    for ch in kept.chars() {
        match ch {
            '…' => filtered.push_str("..."),
            c if c.is_whitespace() => filtered.push(' '),
            c => filtered.push(c),
        }
    }

    let collapsed = whitespace_re().replace_all(&filtered, " ");
    let tightened = space_before_punct_re().replace_all(&collapsed, |caps: &Captures<'_>| {
        if caps[1].starts_with("...") {
            caps[0].to_string()
        } else {
            caps[1].to_string()
        }
    });
    let dotted = multi_dots_re().replace_all(&tightened, "...");

    // Composed last: a dropped character may have separated a letter from
    // its combining mark.
    dotted.trim().nfc().collect()
}

/// Read a UTF-8 text file.
pub fn read_text_file(path: &Path) -> std::io::Result<String> {
    log::debug!("Reading text file {}", path.display());
    std::fs::read_to_string(path)
}

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("valid tag pattern"))
}

/// Anything that is not a letter, a combining mark, a digit, whitespace or
/// allowed punctuation. Emoji are symbols (`So`, `Sk`) or carry variation
/// selectors, so they fall here even when Unicode also calls them alphabetic.
fn disallowed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let pattern = format!(
            r"\p{{Variation_Selector}}|[^\p{{L}}\p{{Mn}}\p{{Mc}}\p{{N}}\s…{}]",
            regex::escape(ALLOWED_PUNCTUATION)
        );
        Regex::new(&pattern).expect("valid character class")
    })
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid whitespace pattern"))
}

fn space_before_punct_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+([.,;:!?)\]%]+)").expect("valid punctuation pattern"))
}

fn multi_dots_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.{4,}").expect("valid ellipsis pattern"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preserves_accents() {
        let text = "Olá, coração!";
        assert_eq!(clean(text), text);
    }

    #[test]
    fn removes_emoji_and_symbols() {
        assert_eq!(clean("Olá 😀 — bem-vindo!"), "Olá — bem-vindo!");
    }

    #[test]
    fn removes_html_tags() {
        assert_eq!(
            clean("<p>Texto</p> com <strong>marcação</strong>"),
            "Texto com marcação"
        );
    }

    #[test]
    fn normalizes_whitespace_and_ellipsis() {
        assert_eq!(clean("Olá   mundo.... ...."), "Olá mundo... ...");
    }

    #[test]
    fn emoji_and_tags_around_punctuation() {
        assert_eq!(clean("Olá 😀 <b>mundo</b>!!!"), "Olá mundo!!!");
    }

    #[test]
    fn decodes_entities_before_stripping_tags() {
        assert_eq!(clean("&lt;i&gt;oi&lt;/i&gt; &amp; tchau"), "oi tchau");
    }

    #[test]
    fn composes_decomposed_diacritics() {
        assert_eq!(clean("Ola\u{0301}"), "Olá");
    }

    #[test]
    fn newlines_and_tabs_become_spaces() {
        assert_eq!(clean("linha um\nlinha\tdois\r\n"), "linha um linha dois");
    }

    #[test]
    fn drops_control_and_format_characters() {
        let out = clean("a\u{0007}b\u{200B}c\u{FEFF}d\u{0000}");
        assert_eq!(out, "abcd");
    }

    #[test]
    fn unicode_ellipsis_expands() {
        assert_eq!(clean("Então…"), "Então...");
    }

    #[test]
    fn output_has_no_forbidden_characters() {
        let forbidden =
            Regex::new(r"[\p{Cc}\p{Cf}\p{So}\p{Sk}\p{Me}\p{Variation_Selector}<>&]").unwrap();
        let inputs = [
            "👍🏽 ok <div class=\"x\">tudo</div> \u{0001}bem\u{001F}",
            "Família: 👨‍👩‍👧 <br/> & amigos © 2024 ™",
            "🇧🇷 Brasil!!! <script>alert(1)</script>",
            "\u{0085}texto\u{009F} com \u{00AD}hífen",
            "Tipo 🅰️ 🅱️ Ⓜ️ 🅿️ ok",
            "Tecla 1️⃣ e ⓜ",
        ];
        for input in inputs {
            let out = clean(input);
            assert!(!forbidden.is_match(&out), "forbidden character left in {out:?}");
        }
    }

    #[test]
    fn alphabetic_emoji_are_dropped() {
        assert_eq!(clean("Tipo 🅰️ 🅱️ Ⓜ️ 🅿️ ok"), "Tipo ok");
        assert_eq!(clean("Tecla 1️⃣!"), "Tecla 1!");
    }

    #[test]
    fn keeps_combining_marks_of_other_scripts() {
        assert_eq!(clean("নমস্কার"), "নমস্কার");
        assert_eq!(clean("ে\u{200B}\u{09BE}"), "\u{09CB}");
        assert_eq!(clean("α\u{200B}\u{0345}"), "\u{1FB3}");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let inputs = [
            "Hello, world.",
            "Olá 😀 <b>mundo</b>!!!",
            "a... . b",
            "  spaced   out ,  text ( yes ) ",
            "Olá   mundo.... ....",
            "x &amp;amp; y",
            "100 % certo ; ok ?",
            "α\u{200B}\u{0345}",
            "ে\u{200B}\u{09BE}",
            "a\u{200C}\u{0301} b",
            "Tipo 🅰️ ok",
        ];
        for input in inputs {
            let once = clean(input);
            assert_eq!(clean(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn sanitize_rejects_text_that_cleans_to_nothing() {
        let sanitizer = TextSanitizer::default();
        for input in ["", "   ", "😀😀", "<p></p>", "\u{0007}\n"] {
            assert!(matches!(
                sanitizer.sanitize(input),
                Err(ValidationError::EmptyText)
            ));
        }
    }

    #[test]
    fn sanitize_enforces_the_limit_in_characters() {
        let sanitizer = TextSanitizer::new(5);
        assert_eq!(sanitizer.sanitize("ááááá").unwrap().as_str(), "ááááá");
        match sanitizer.sanitize("áááááá") {
            Err(ValidationError::TextTooLong { length, max }) => {
                assert_eq!(length, 6);
                assert_eq!(max, 5);
            }
            other => panic!("expected TextTooLong, got {other:?}"),
        }
    }

    #[test]
    fn limit_applies_after_cleaning() {
        let sanitizer = TextSanitizer::new(4);
        let sanitized = sanitizer.sanitize("<b>abcd</b> 😀😀😀").unwrap();
        assert_eq!(sanitized.as_str(), "abcd");
        assert_eq!(sanitized.len(), 4);
    }

    #[test]
    fn reads_utf8_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entrada.txt");
        std::fs::write(&path, "Olá, coração!").unwrap();
        assert_eq!(read_text_file(&path).unwrap(), "Olá, coração!");

        std::fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        assert!(read_text_file(&path).is_err());
    }
}
