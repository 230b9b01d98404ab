use manatan_types::MERGE_MARKER;
use unicode_normalization::UnicodeNormalization;

pub trait Preprocessor {
    /// Raw OCR text as shown in a text box: merge markers become line breaks.
    fn display(&self, raw: &str) -> String {
        raw.replace(MERGE_MARKER, "\n")
    }

    /// Inverse of [`Preprocessor::display`] for edited text.
    fn storage(&self, display: &str) -> String {
        display
            .replace("\r\n", "\n")
            .replace('\n', &MERGE_MARKER.to_string())
    }

    /// Text handed to the dictionary, starting at character `offset` of the
    /// displayed text. Line breaks inside a block do not end a sentence.
    fn lookup_text(&self, display: &str, offset: usize) -> String {
        display
            .chars()
            .skip(offset)
            .filter(|c| !matches!(c, '\n' | '\r') && *c != MERGE_MARKER)
            .collect()
    }

    /// Sentence for a flashcard (NFKC, single line).
    fn sentence(&self, raw: &str) -> String {
        let mut text = raw.trim().to_string();

        if text.is_empty() {
            return text;
        }

        text = text.nfkc().collect();

        text.replace(['\n', '\r', MERGE_MARKER], "").trim().to_string()
    }
}

pub struct DefaultPreprocessor;
impl Preprocessor for DefaultPreprocessor {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_storage_are_inverse() {
        let raw = "今日は\u{200B}いい天気";
        let display = DefaultPreprocessor.display(raw);
        assert_eq!(display, "今日は\nいい天気");
        assert_eq!(DefaultPreprocessor.storage(&display), raw);
        assert_eq!(DefaultPreprocessor.storage("a\r\nb"), "a\u{200B}b");
    }

    #[test]
    fn lookup_text_skips_to_offset() {
        let text = DefaultPreprocessor.lookup_text("今日は\nいい天気", 2);
        assert_eq!(text, "はいい天気");
    }

    #[test]
    fn sentence_is_normalized() {
        assert_eq!(DefaultPreprocessor.sentence("  ｶﾀｶﾅ\u{200B}です\n "), "カタカナです");
        assert_eq!(DefaultPreprocessor.sentence("   "), "");
    }
}
