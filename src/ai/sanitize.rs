//! Final cleanup of parsed candidates before they become tasks.

use std::collections::HashSet;

use super::prompt::MAX_SUBTASK_NAME_CHARS;
use super::SubtaskCandidate;

/// Trim, cap length, drop blanks and duplicates.
///
/// Order is preserved and the first occurrence of a name wins, priority
/// included. Names are compared after trimming and truncation, case-sensitively.
pub fn sanitize(candidates: Vec<SubtaskCandidate>) -> Vec<SubtaskCandidate> {
    let mut seen = HashSet::new();

    candidates
        .into_iter()
        .filter_map(|candidate| {
            let name = truncate_chars(candidate.name.trim(), MAX_SUBTASK_NAME_CHARS)
                .trim_end()
                .to_string();
            if name.is_empty() {
                return None;
            }
            Some(SubtaskCandidate {
                name,
                priority: candidate.priority,
            })
        })
        .filter(|candidate| seen.insert(candidate.name.clone()))
        .collect()
}

fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Priority;

    fn candidate(name: &str, priority: Priority) -> SubtaskCandidate {
        SubtaskCandidate::new(name, priority)
    }

    #[test]
    fn drops_duplicates_keeping_first_occurrence() {
        let result = sanitize(vec![
            candidate("Pack bags", Priority::High),
            candidate("Book taxi", Priority::Medium),
            candidate("  Pack bags ", Priority::Low),
        ]);
        assert_eq!(
            result,
            vec![
                candidate("Pack bags", Priority::High),
                candidate("Book taxi", Priority::Medium),
            ]
        );
    }

    #[test]
    fn comparison_is_case_sensitive() {
        let result = sanitize(vec![
            candidate("Pack bags", Priority::Medium),
            candidate("pack bags", Priority::Medium),
        ]);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn drops_blank_names_but_not_default_priority() {
        let result = sanitize(vec![
            candidate("   ", Priority::High),
            candidate("", Priority::Low),
            candidate("Call mom", Priority::Medium),
        ]);
        assert_eq!(result, vec![candidate("Call mom", Priority::Medium)]);
    }

    #[test]
    fn truncates_long_names_on_char_boundaries() {
        let long = "ы".repeat(MAX_SUBTASK_NAME_CHARS + 20);
        let result = sanitize(vec![candidate(&long, Priority::Medium)]);
        assert_eq!(result[0].name.chars().count(), MAX_SUBTASK_NAME_CHARS);
    }

    #[test]
    fn names_equal_after_truncation_are_duplicates() {
        let base = "a".repeat(MAX_SUBTASK_NAME_CHARS);
        let result = sanitize(vec![
            candidate(&format!("{}1", base), Priority::High),
            candidate(&format!("{}2", base), Priority::Low),
        ]);
        assert_eq!(result, vec![candidate(&base, Priority::High)]);
    }

    #[test]
    fn is_idempotent() {
        let input = vec![
            candidate("Pack bags", Priority::High),
            candidate("Pack bags", Priority::Low),
            candidate(" Book taxi ", Priority::Medium),
        ];
        let once = sanitize(input);
        let twice = sanitize(once.clone());
        assert_eq!(once, twice);
    }
}
