//! Guided-mode chunking.
//!
//! Splits an exercise set into navigable steps. Chunks are a presentation
//! aid only: scoring always runs over the set's flat item list.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{count_markers, BlankRef, ExerciseSet};

/// A period and space followed by a capital letter: a sentence boundary.
static RE_SENTENCE_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\. [A-Z]").expect("valid sentence regex"));

/// Upper bound on the number of paragraphs a passage is split into.
const MAX_CHUNKS: usize = 4;

/// How a set is broken into guided-mode steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStrategy {
    /// One step per item.
    Flat,
    /// Sentence groups of the joined passage.
    #[default]
    #[serde(alias = "paragraph-split")]
    Paragraph,
}

/// One guided-mode step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Display text with blank markers.
    pub text: String,
    /// The blanks shown in this chunk, in marker order.
    pub blanks: Vec<BlankRef>,
}

/// Build the guided-mode steps for a set.
pub fn chunk_set(set: &ExerciseSet, strategy: ChunkingStrategy) -> Vec<Chunk> {
    match strategy {
        ChunkingStrategy::Flat => set
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| !item.blanks.is_empty())
            .map(|(item_idx, item)| Chunk {
                text: item.template.clone(),
                blanks: (0..item.blanks.len())
                    .map(|blank| BlankRef::new(item_idx, blank))
                    .collect(),
            })
            .collect(),
        ChunkingStrategy::Paragraph => paragraphs(set),
    }
}

fn paragraphs(set: &ExerciseSet) -> Vec<Chunk> {
    let passage = set
        .items
        .iter()
        .map(|i| i.template.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let sentences = split_sentences(&passage);
    let per_chunk = sentences_per_chunk(sentences.len());

    let mut refs = set.blank_refs();
    let mut chunks = Vec::new();
    for group in sentences.chunks(per_chunk) {
        let mut text = group.join(". ");
        if !text.ends_with('.') {
            text.push('.');
        }

        let markers = count_markers(&text);
        if markers == 0 {
            continue;
        }
        let blanks: Vec<BlankRef> = refs.by_ref().take(markers).collect();
        chunks.push(Chunk { text, blanks });
    }
    chunks
}

/// Split on `". "` followed by a capital letter, dropping the `". "`.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in RE_SENTENCE_BOUNDARY.find_iter(text) {
        sentences.push(&text[start..m.start()]);
        start = m.start() + 2;
    }
    sentences.push(&text[start..]);
    sentences
}

/// Sentences per paragraph so that a passage yields at most four paragraphs
/// of roughly three sentences each.
pub fn sentences_per_chunk(sentence_count: usize) -> usize {
    if sentence_count == 0 {
        return 1;
    }
    let target = MAX_CHUNKS.min(sentence_count.div_ceil(3));
    sentence_count.div_ceil(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnswerKey, Blank, ExerciseFormat, Item};

    fn item(template: &str) -> Item {
        let blanks = (0..count_markers(template))
            .map(|_| Blank {
                number: 0,
                key: AnswerKey::Text("x".into()),
                tag: None,
                options: vec![],
            })
            .collect();
        Item {
            template: template.into(),
            blanks,
        }
    }

    fn set(items: Vec<Item>) -> ExerciseSet {
        let gap_count = items.iter().map(|i| i.blanks.len()).sum();
        ExerciseSet {
            id: "1".into(),
            title: "t".into(),
            topic: None,
            description: None,
            format: ExerciseFormat::PlainCloze,
            items,
            gap_count,
        }
    }

    #[test]
    fn splits_only_before_capitals() {
        let parts = split_sentences("I live in St. albans. It is nice. Very nice.");
        assert_eq!(parts, vec!["I live in St. albans", "It is nice", "Very nice."]);
    }

    #[test]
    fn chunk_sizes() {
        assert_eq!(sentences_per_chunk(1), 1);
        assert_eq!(sentences_per_chunk(3), 3);
        assert_eq!(sentences_per_chunk(6), 3);
        assert_eq!(sentences_per_chunk(12), 3);
        assert_eq!(sentences_per_chunk(20), 5);
    }

    #[test]
    fn paragraphs_attribute_blanks_in_order_and_drop_empty_chunks() {
        let text = "Intro sentence. Still intro. No gaps yet. \
                    We _____ daily. They _____ often. Some _____ rarely.";
        let s = set(vec![item(text)]);
        let chunks = chunk_set(&s, ChunkingStrategy::Paragraph);
        assert_eq!(chunks.len(), 1);
        assert_eq!(
            chunks[0].blanks,
            vec![BlankRef::new(0, 0), BlankRef::new(0, 1), BlankRef::new(0, 2)]
        );
        assert!(chunks[0].text.ends_with('.'));
    }

    #[test]
    fn paragraphs_span_sentence_items() {
        let s = set(vec![
            item("I like _____."),
            item("You like _____."),
            item("We like _____."),
            item("They like _____."),
        ]);
        let chunks = chunk_set(&s, ChunkingStrategy::Paragraph);
        // 4 sentences → 2 paragraphs of 2
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].blanks, vec![BlankRef::new(0, 0), BlankRef::new(1, 0)]);
        assert_eq!(chunks[1].blanks, vec![BlankRef::new(2, 0), BlankRef::new(3, 0)]);
        let total: usize = chunks.iter().map(|c| c.blanks.len()).sum();
        assert_eq!(total, s.gap_count);
    }

    #[test]
    fn flat_is_one_chunk_per_item() {
        let s = set(vec![item("A _____."), item("B _____ and _____.")]);
        let chunks = chunk_set(&s, ChunkingStrategy::Flat);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].blanks.len(), 2);
        assert_eq!(chunks[1].text, "B _____ and _____.");
    }
}
