use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use docqa_core::types::{Citation, FusedCandidate};

use super::context::clean_text;

pub const SNIPPET_CHARS: usize = 200;

/// `[3]` or grouped `[1, 4]`.
static MARKER: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\[(\d+(?:\s*,\s*\d+)*)\]").ok());

fn numbers(group: &str) -> impl Iterator<Item = usize> + '_ {
    group.split(',').filter_map(|n| n.trim().parse::<usize>().ok())
}

/// Distinct marker indices in `answer` that fall within `1..=max`, ascending.
pub fn cited_indices(answer: &str, max: usize) -> Vec<usize> {
    let Some(re) = MARKER.as_ref() else { return Vec::new() };
    let mut found = BTreeSet::new();
    for caps in re.captures_iter(answer) {
        found.extend(numbers(&caps[1]).filter(|n| (1..=max).contains(n)));
    }
    found.into_iter().collect()
}

pub fn snippet(text: &str) -> String {
    let text = clean_text(text);
    if text.chars().count() <= SNIPPET_CHARS {
        return text;
    }
    let cut: String = text.chars().take(SNIPPET_CHARS).collect();
    format!("{cut}...")
}

/// Citations for the markers in `answer`, each pointing at the candidate at that position.
pub fn build_citations(answer: &str, candidates: &[FusedCandidate]) -> Vec<Citation> {
    cited_indices(answer, candidates.len())
        .into_iter()
        .map(|index| {
            let chunk = &candidates[index - 1].chunk;
            Citation {
                index,
                chunk_id: chunk.id.clone(),
                source_page: chunk.source_page,
                source_file: chunk.source_file.clone(),
                kind: chunk.kind,
                snippet: snippet(&chunk.text),
            }
        })
        .collect()
}

/// Rewrite every marker through `map`. Numbers that do not map are dropped,
/// and a marker left with no numbers is removed.
pub fn remap_markers<F>(answer: &str, map: F) -> String
where
    F: Fn(usize) -> Option<usize>,
{
    let Some(re) = MARKER.as_ref() else { return answer.to_string() };
    re.replace_all(answer, |caps: &Captures<'_>| {
        let mapped: Vec<String> = numbers(&caps[1]).filter_map(&map).map(|n| n.to_string()).collect();
        if mapped.is_empty() {
            String::new()
        } else {
            format!("[{}]", mapped.join(", "))
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_sorted_deduplicated_and_bounded() {
        let answer = "Panels face south [2]. Output peaks in June [1, 2]. See also [7] and [0].";
        assert_eq!(cited_indices(answer, 3), vec![1, 2]);
        assert!(cited_indices("no markers", 3).is_empty());
    }

    #[test]
    fn long_snippets_are_truncated() {
        let long = "x".repeat(250);
        let s = snippet(&long);
        assert_eq!(s.chars().count(), SNIPPET_CHARS + 3);
        assert!(s.ends_with("..."));
        assert_eq!(snippet("short"), "short");
    }

    #[test]
    fn remapping_rewrites_and_drops() {
        let out = remap_markers("A [1]. B [2, 3]. C [9].", |n| match n {
            1 => Some(4),
            3 => Some(1),
            _ => None,
        });
        assert_eq!(out, "A [4]. B [1]. C .");
    }
}
