//! Carry inline emphasis from an existing field onto replacement text.

use std::sync::LazyLock;

use regex::Regex;

static EMPHASIS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)(<(b|i|u|strong|em|mark|span)(?:\s[^>]*)?>)(.*?)</(b|i|u|strong|em|mark|span)\s*>")
        .unwrap()
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
struct Run {
    open: String,
    close: String,
    text: String,
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn emphasis_runs(html: &str) -> Vec<Run> {
    EMPHASIS_RE
        .captures_iter(html)
        .filter(|caps| caps[2].eq_ignore_ascii_case(&caps[4]))
        .map(|caps| Run {
            open: caps[1].to_string(),
            close: format!("</{}>", &caps[2]),
            text: decode_entities(&TAG_RE.replace_all(&caps[3], "")),
        })
        .filter(|run| !run.text.trim().is_empty())
        .collect()
}

fn apply(old_html: &str, new_text: &str) -> Option<String> {
    let runs = emphasis_runs(old_html);
    if runs.is_empty() {
        return None;
    }

    let mut spans: Vec<(usize, usize, &Run)> = Vec::new();
    for run in &runs {
        let found = new_text
            .match_indices(run.text.as_str())
            .map(|(start, matched)| (start, start + matched.len()))
            .find(|&(start, end)| spans.iter().all(|&(s, e, _)| end <= s || start >= e));

        if let Some((start, end)) = found {
            spans.push((start, end, run));
        }
    }

    if spans.is_empty() {
        return None;
    }
    spans.sort_by_key(|&(start, _, _)| start);

    let mut out = String::with_capacity(new_text.len() + spans.len() * 16);
    let mut cursor = 0;
    for (start, end, run) in spans {
        out.push_str(new_text.get(cursor..start)?);
        out.push_str(&run.open);
        out.push_str(new_text.get(start..end)?);
        out.push_str(&run.close);
        cursor = end;
    }
    out.push_str(new_text.get(cursor..)?);

    Some(out)
}

/// `new_text` with each emphasised run of `old_html` re-applied to its first
/// plain occurrence. Returns `new_text` unchanged when nothing carries over.
pub fn inherit_emphasis(old_html: &str, new_text: &str) -> String {
    match apply(old_html, new_text) {
        Some(html) => html,
        None => {
            tracing::debug!("No emphasis inherited");
            new_text.to_string()
        }
    }
}
