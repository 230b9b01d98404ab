use std::collections::BTreeMap;

use manatan_types::DictionaryResult;

/// Values available to field templates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardData {
    pub expression: String,
    pub reading: String,
    pub glossary: Vec<String>,
    pub sentence: String,
    /// Ruby markup of the sentence, when built
    pub furigana: Option<String>,
    pub frequency: Option<String>,
    pub tags: Vec<String>,
}

impl CardData {
    pub fn from_result(result: &DictionaryResult, sentence: &str) -> Self {
        Self {
            expression: result.term.clone(),
            reading: result.reading.clone(),
            glossary: result.definitions.clone(),
            sentence: sentence.to_string(),
            furigana: None,
            frequency: result
                .frequencies
                .iter()
                .find(|f| f.value.is_some())
                .map(|f| format!("{}: {}", f.dictionary, f.display)),
            tags: result.tags.clone(),
        }
    }

    /// Sentence-only card, used when no dictionary entry was chosen
    pub fn sentence_only(sentence: &str) -> Self {
        Self {
            sentence: sentence.to_string(),
            ..Self::default()
        }
    }
}

/// Fill one field template.
///
/// Supported placeholders: `{expression}`, `{reading}`, `{glossary}`,
/// `{sentence}`, `{furigana}`, `{frequency}`, `{tags}`.
pub fn render_field(template: &str, data: &CardData) -> String {
    let glossary = match data.glossary.len() {
        0 => String::new(),
        1 => data.glossary[0].clone(),
        _ => format!(
            "<ol>{}</ol>",
            data.glossary
                .iter()
                .map(|g| format!("<li>{g}</li>"))
                .collect::<String>()
        ),
    };

    template
        .replace("{expression}", &data.expression)
        .replace("{reading}", &data.reading)
        .replace("{glossary}", &glossary)
        .replace("{sentence}", &data.sentence)
        .replace("{furigana}", data.furigana.as_deref().unwrap_or(&data.sentence))
        .replace("{frequency}", data.frequency.as_deref().unwrap_or_default())
        .replace("{tags}", &data.tags.join(" "))
}

/// Render every mapped field. Fields rendering to nothing are left out.
pub fn render_fields(templates: &BTreeMap<String, String>, data: &CardData) -> BTreeMap<String, String> {
    templates
        .iter()
        .map(|(field, template)| (field.clone(), render_field(template, data)))
        .filter(|(_, value)| !value.is_empty())
        .collect()
}
