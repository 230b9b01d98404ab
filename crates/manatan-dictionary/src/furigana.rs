//! Ruby markup for a whole sentence, segmented greedily by dictionary lookups.

use manatan_types::{DictionaryResult, LookupOutcome};

use crate::Dictionary;

fn is_kanji(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}' | '\u{F900}'..='\u{FAFF}' | '々' | '〆')
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn common_prefix_len(a: &[char], b: &[char]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix_len(a: &[char], b: &[char]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

/// Ruby markup for `surface`, an inflected occurrence of `term` read as `reading`.
///
/// Kana shared by the ends of term and reading are okurigana and stay outside
/// the ruby. Falls back to plain escaped text when the surface does not start
/// with the term's kanji stem.
pub fn ruby_for(surface: &str, term: &str, reading: &str) -> String {
    let term_chars: Vec<char> = term.chars().collect();
    let reading_chars: Vec<char> = reading.chars().collect();

    if reading.is_empty() || term == reading || !term_chars.iter().copied().any(is_kanji) {
        return escape_html(surface);
    }

    let head = common_prefix_len(&term_chars, &reading_chars);
    let tail = common_suffix_len(&term_chars[head..], &reading_chars[head..]);

    let stem: String = term_chars[..term_chars.len() - tail].iter().collect();
    let stem_reading: String = reading_chars[head..reading_chars.len() - tail].iter().collect();
    let prefix: String = term_chars[..head].iter().collect();
    let core: String = term_chars[head..term_chars.len() - tail].iter().collect();

    let Some(rest) = surface.strip_prefix(stem.as_str()) else {
        return escape_html(surface);
    };

    format!(
        "{}<ruby>{}<rt>{}</rt></ruby>{}",
        escape_html(&prefix),
        escape_html(&core),
        escape_html(&stem_reading),
        escape_html(rest)
    )
}

fn best_match(results: &[DictionaryResult], remaining: usize) -> Option<&DictionaryResult> {
    results
        .iter()
        .filter(|r| r.match_len > 0 && r.match_len <= remaining)
        .max_by_key(|r| r.match_len)
}

/// Annotate every kanji run of `sentence` with its reading.
///
/// Kana and punctuation pass through untouched. Lookup failures and a
/// cold-starting backend leave the remaining text unannotated.
pub async fn build_sentence_furigana(dictionary: &dyn Dictionary, sentence: &str, language: &str) -> String {
    let chars: Vec<char> = sentence.chars().collect();
    let mut out = String::with_capacity(sentence.len() * 2);
    let mut pos = 0;

    while pos < chars.len() {
        if !is_kanji(chars[pos]) {
            out.push_str(&escape_html(&chars[pos].to_string()));
            pos += 1;
            continue;
        }

        let rest: String = chars[pos..].iter().collect();
        let results = match dictionary.lookup(&rest, language).await {
            Ok(LookupOutcome::Results(results)) => results,
            Ok(LookupOutcome::Loading) => {
                tracing::debug!("Dictionary still loading, furigana left partial");
                out.push_str(&escape_html(&rest));
                break;
            }
            Err(e) => {
                tracing::warn!("Furigana lookup failed: {e}");
                out.push_str(&escape_html(&rest));
                break;
            }
        };

        match best_match(&results, chars.len() - pos) {
            Some(entry) => {
                let surface: String = chars[pos..pos + entry.match_len].iter().collect();
                out.push_str(&ruby_for(&surface, &entry.term, &entry.reading));
                pos += entry.match_len;
            }
            None => {
                out.push_str(&escape_html(&chars[pos].to_string()));
                pos += 1;
            }
        }
    }

    out
}
