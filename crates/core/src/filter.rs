use crate::RetrievalCandidate;
use std::collections::HashSet;

pub fn margin_filter(candidates: Vec<RetrievalCandidate>, margin: f32) -> Vec<RetrievalCandidate> {
    let Some(best) = candidates
        .iter()
        .map(|candidate| candidate.distance)
        .min_by(|left, right| left.total_cmp(right))
    else {
        return Vec::new();
    };

    let cutoff = best + margin;
    candidates
        .into_iter()
        .filter(|candidate| candidate.distance <= cutoff)
        .collect()
}

pub fn dedup_key(candidate: &RetrievalCandidate, prefix_chars: usize) -> (String, String) {
    (
        candidate.source_path().to_string(),
        candidate.text.chars().take(prefix_chars).collect(),
    )
}

pub fn deduplicate(candidates: Vec<RetrievalCandidate>, prefix_chars: usize) -> Vec<RetrievalCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| seen.insert(dedup_key(candidate, prefix_chars)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{deduplicate, margin_filter};
    use crate::{Metadata, RetrievalCandidate};
    use serde_json::Value;

    fn candidate(path: &str, text: &str, distance: f32) -> RetrievalCandidate {
        let mut metadata = Metadata::new();
        metadata.insert("file_path".to_string(), Value::from(path));
        RetrievalCandidate {
            text: text.to_string(),
            metadata,
            distance,
            score: None,
        }
    }

    #[test]
    fn margin_keeps_only_candidates_close_to_the_best() {
        let kept = margin_filter(
            vec![
                candidate("/a", "one", 0.10),
                candidate("/a", "two", 0.12),
                candidate("/a", "three", 0.20),
            ],
            0.05,
        );
        let texts: Vec<_> = kept.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[test]
    fn margin_on_empty_input_is_empty() {
        assert!(margin_filter(Vec::new(), 0.05).is_empty());
    }

    #[test]
    fn duplicates_collapse_to_the_earlier_candidate() {
        let prefix = "x".repeat(50);
        let kept = deduplicate(
            vec![
                candidate("/a", &format!("{prefix} first tail"), 0.1),
                candidate("/a", &format!("{prefix} second tail"), 0.2),
                candidate("/b", &format!("{prefix} other file"), 0.3),
            ],
            50,
        );
        assert_eq!(kept.len(), 2);
        assert!(kept[0].text.ends_with("first tail"));
        assert!(kept[1].text.ends_with("other file"));
    }
}
