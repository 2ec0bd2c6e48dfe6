//! Turns raw completion text into subtask candidates.
//!
//! Models drift from the requested format in every direction: some answer
//! with a JSON array, some with a bulleted list, some add a heading line.
//! Parsing therefore runs an ordered chain of strategies and takes the first
//! one that applies. None of them fails; the worst case is an empty list.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use super::SubtaskCandidate;
use crate::models::Priority;

/// A parsing strategy. `None` means "does not apply to this text".
type Strategy = fn(&str) -> Option<Vec<SubtaskCandidate>>;

/// Tried in order; the first `Some` wins.
const STRATEGIES: &[Strategy] = &[structured_array, delimited_lines, plain_lines];

/// Keyword table for priority inference, checked in order.
///
/// The negated forms come first because they contain the `High` keywords
/// ("неважно" contains "важн").
const PRIORITY_KEYWORDS: &[(&[&str], Priority)] = &[
    (
        &[
            "неважн",
            "не важн",
            "не срочн",
            "not important",
            "unimportant",
            "not urgent",
        ],
        Priority::Low,
    ),
    (
        &[
            "high",
            "urgent",
            "critical",
            "important",
            "важн",
            "критич",
            "высок",
            "срочн",
        ],
        Priority::High,
    ),
    (
        &["low", "minor", "optional", "низк", "мало"],
        Priority::Low,
    ),
];

/// Bullets, `1.` / `2)` / `(3)` numbering, `[ ]` / `[x]` checkboxes and stray
/// punctuation at line start.
static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\s*(?:[-*•·–—+>]+|\d+[.)]|\(\d+\)|\[[ xX]?\]|[.)]))+\s*")
        .expect("list marker pattern is valid")
});

/// Parse `raw` into candidates. Names are not truncated or deduplicated here.
pub fn parse_subtasks(raw: &str) -> Vec<SubtaskCandidate> {
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy(raw))
        .unwrap_or_default()
}

/// Map free-form priority text onto [`Priority`]. Unknown text is `Medium`.
pub fn infer_priority(text: &str) -> Priority {
    let lowered = text.to_lowercase();
    PRIORITY_KEYWORDS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(_, priority)| *priority)
        .unwrap_or_default()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StructuredItem {
    Name(String),
    Entry {
        #[serde(alias = "title")]
        name: String,
        #[serde(default)]
        priority: Option<String>,
    },
}

/// The first non-empty JSON array in the text, of strings or `{name, priority}`
/// objects.
fn structured_array(text: &str) -> Option<Vec<SubtaskCandidate>> {
    let opens = text.match_indices('[').map(|(i, _)| i);

    for start in opens {
        let closes = text[start..].match_indices(']').map(|(i, _)| start + i);
        for end in closes {
            let slice = &text[start..=end];
            let Ok(items) = serde_json::from_str::<Vec<StructuredItem>>(slice) else {
                continue;
            };
            // `[]` and `[ ]` are usually checkboxes or placeholders, not an answer.
            if items.is_empty() {
                continue;
            }
            let candidates = items
                .into_iter()
                .map(|item| match item {
                    StructuredItem::Name(name) => {
                        SubtaskCandidate::new(clean_name(&name), Priority::Medium)
                    }
                    StructuredItem::Entry { name, priority } => SubtaskCandidate::new(
                        clean_name(&name),
                        priority.as_deref().map(infer_priority).unwrap_or_default(),
                    ),
                })
                .collect();
            return Some(candidates);
        }
    }

    None
}

/// `name | priority` lines. Applies only if at least one line has a `|`;
/// lines without one fall back to the whole line at `Medium`.
fn delimited_lines(text: &str) -> Option<Vec<SubtaskCandidate>> {
    let lines = candidate_lines(text);
    if !lines.iter().any(|line| line.contains('|')) {
        return None;
    }

    let candidates = lines
        .into_iter()
        .map(|line| match line.split_once('|') {
            Some((name, rest)) => {
                let priority_text = rest.split('|').next().unwrap_or_default();
                SubtaskCandidate::new(clean_name(name), infer_priority(priority_text))
            }
            None => SubtaskCandidate::new(clean_name(line), Priority::Medium),
        })
        .collect();

    Some(candidates)
}

/// Every remaining line is a subtask.
fn plain_lines(text: &str) -> Option<Vec<SubtaskCandidate>> {
    Some(
        candidate_lines(text)
            .into_iter()
            .map(|line| SubtaskCandidate::new(clean_name(line), Priority::Medium))
            .collect(),
    )
}

/// Non-empty lines with list markers removed.
///
/// Lines with a colon are headings or commentary ("Here are the subtasks:"),
/// not subtasks, and are dropped.
fn candidate_lines(text: &str) -> Vec<&str> {
    text.lines()
        .map(|line| strip_list_marker(line).trim())
        .filter(|line| !line.is_empty() && !line.contains(':'))
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    match LIST_MARKER.find(line) {
        Some(marker) => &line[marker.end()..],
        None => line,
    }
}

/// Trim whitespace and wrapping quotes or emphasis from a name.
fn clean_name(name: &str) -> String {
    name.trim_matches(|c: char| c.is_whitespace() || matches!(c, '"' | '\'' | '`' | '*' | '«' | '»'))
        .to_string()
}
