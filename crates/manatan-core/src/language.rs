use manatan_types::MERGE_MARKER;

/// Languages written without spaces between words.
const NO_SPACE_LANGUAGES: [&str; 6] = ["ja", "zh", "th", "lo", "km", "my"];

const LANGUAGE_NAMES: [(&str, &str); 8] = [
    ("japanese", "ja"),
    ("chinese", "zh"),
    ("thai", "th"),
    ("lao", "lo"),
    ("khmer", "km"),
    ("burmese", "my"),
    ("korean", "ko"),
    ("english", "en"),
];

/// Primary ISO 639-1 subtag for a language tag or English language name.
///
/// `"ja-JP"`, `"zh_Hant"` and `"Japanese"` all reduce to their two-letter code.
pub fn primary_code(language: &str) -> String {
    let lower = language.trim().to_ascii_lowercase();

    if let Some((_, code)) = LANGUAGE_NAMES.iter().find(|(name, _)| *name == lower) {
        return code.to_string();
    }

    lower
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_string()
}

pub fn uses_spaces(language: &str) -> bool {
    !NO_SPACE_LANGUAGES.contains(&primary_code(language).as_str())
}

/// Text inserted between two merged blocks.
pub fn merge_separator(language: &str) -> String {
    if uses_spaces(language) {
        " ".to_string()
    } else {
        MERGE_MARKER.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_from_tags_and_names() {
        assert_eq!(primary_code("ja-JP"), "ja");
        assert_eq!(primary_code("zh_Hant"), "zh");
        assert_eq!(primary_code(" Japanese "), "ja");
        assert_eq!(primary_code("en"), "en");
        assert_eq!(primary_code(""), "");
    }

    #[test]
    fn separator_follows_spacing() {
        assert_eq!(merge_separator("ja"), "\u{200B}");
        assert_eq!(merge_separator("zh-CN"), "\u{200B}");
        assert_eq!(merge_separator("th"), "\u{200B}");
        assert_eq!(merge_separator("ko"), " ");
        assert_eq!(merge_separator("english"), " ");
        assert!(uses_spaces("es"));
        assert!(!uses_spaces("Chinese"));
    }
}
