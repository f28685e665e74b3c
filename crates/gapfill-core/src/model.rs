//! Core data model types for gapfill.
//!
//! These are the normalized, immutable types every other module works with:
//! a `Dataset` of `ExerciseSet`s, each made of `Item`s that carry `Blank`s.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The literal placeholder that marks a blank inside an item template.
pub const BLANK_MARKER: &str = "_____";

/// Count the blank markers in a template, scanning left to right.
pub fn count_markers(text: &str) -> usize {
    text.matches(BLANK_MARKER).count()
}

/// A normalized dataset, read-only for the lifetime of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    /// Where the dataset was loaded from (path or URL).
    pub origin: String,
    /// The exercise sets, in source order.
    pub sets: Vec<ExerciseSet>,
}

impl Dataset {
    /// Total number of blanks across all sets.
    pub fn total_gaps(&self) -> usize {
        self.sets.iter().map(|s| s.gap_count).sum()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn set(&self, index: usize) -> Option<&ExerciseSet> {
        self.sets.get(index)
    }
}

/// One test or category: a titled, ordered sequence of items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseSet {
    /// Identifier from the source data (numbers are stringified).
    pub id: String,
    /// Display title.
    pub title: String,
    /// Topic or grammar focus line.
    #[serde(default)]
    pub topic: Option<String>,
    /// Longer descriptive text.
    #[serde(default)]
    pub description: Option<String>,
    /// How blanks in this set are answered.
    pub format: ExerciseFormat,
    /// The items, in document order.
    pub items: Vec<Item>,
    /// Number of blanks across all items.
    pub gap_count: usize,
}

impl ExerciseSet {
    /// Every blank reference in document order.
    pub fn blank_refs(&self) -> impl Iterator<Item = BlankRef> + '_ {
        self.items.iter().enumerate().flat_map(|(item, it)| {
            (0..it.blanks.len()).map(move |blank| BlankRef { item, blank })
        })
    }

    pub fn blank(&self, at: BlankRef) -> Option<&Blank> {
        self.items.get(at.item).and_then(|i| i.blanks.get(at.blank))
    }

    /// Find a blank by its 1-based question number.
    pub fn blank_by_number(&self, number: usize) -> Option<BlankRef> {
        self.blank_refs()
            .find(|at| self.blank(*at).is_some_and(|b| b.number == number))
    }

    /// The word pool, for word-bank sets.
    pub fn pool(&self) -> Option<&[String]> {
        match &self.format {
            ExerciseFormat::WordBank { pool } => Some(pool),
            _ => None,
        }
    }

    /// Human-readable form of a blank's correct answer.
    pub fn key_text(&self, blank: &Blank) -> String {
        match &blank.key {
            AnswerKey::Text(text) => text.clone(),
            AnswerKey::Choice(letter) => blank.choice_label(*letter),
            AnswerKey::Word(idx) => self.word(*idx),
        }
    }

    /// Human-readable form of a learner's answer.
    pub fn answer_text(&self, blank: &Blank, answer: &Answer) -> String {
        match answer {
            Answer::Text(text) => text.clone(),
            Answer::Choice(letter) => blank.choice_label(*letter),
            Answer::Word(idx) => self.word(*idx),
        }
    }

    fn word(&self, idx: usize) -> String {
        self.pool()
            .and_then(|p| p.get(idx))
            .cloned()
            .unwrap_or_default()
    }
}

/// The answering style of an exercise set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExerciseFormat {
    /// Free-text gaps compared case-insensitively.
    PlainCloze,
    /// Each blank offers lettered options.
    MultipleChoice,
    /// Blanks are filled by assigning words from a shared pool.
    WordBank { pool: Vec<String> },
}

impl ExerciseFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ExerciseFormat::PlainCloze => "cloze",
            ExerciseFormat::MultipleChoice => "multiple-choice",
            ExerciseFormat::WordBank { .. } => "word-bank",
        }
    }
}

impl fmt::Display for ExerciseFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One gap-fill unit: a template with one or more blank markers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Display text with `_____` where each blank goes.
    pub template: String,
    /// One blank per marker, in marker order.
    pub blanks: Vec<Blank>,
}

/// A single gap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blank {
    /// 1-based question number within its set.
    pub number: usize,
    /// The correct answer.
    pub key: AnswerKey,
    /// Grammar pattern or gap type, used for display grouping only.
    #[serde(default)]
    pub tag: Option<String>,
    /// Lettered options (multiple-choice sets only).
    #[serde(default)]
    pub options: Vec<Choice>,
}

impl Blank {
    pub fn has_option(&self, letter: char) -> bool {
        self.options.iter().any(|o| o.letter == letter)
    }

    fn choice_label(&self, letter: char) -> String {
        match self.options.iter().find(|o| o.letter == letter) {
            Some(choice) => format!("{letter}) {}", choice.text),
            None => letter.to_string(),
        }
    }
}

/// A lettered multiple-choice option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
    pub letter: char,
    pub text: String,
}

/// The recorded correct answer for a blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerKey {
    Text(String),
    Choice(char),
    /// Index into the set's word pool.
    Word(usize),
}

/// A learner's answer to a blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    Text(String),
    Choice(char),
    /// Index into the set's word pool.
    Word(usize),
}

/// Position of a blank: item index within the set, blank index within the item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct BlankRef {
    pub item: usize,
    pub blank: usize,
}

impl BlankRef {
    pub fn new(item: usize, blank: usize) -> Self {
        Self { item, blank }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice_blank() -> Blank {
        Blank {
            number: 1,
            key: AnswerKey::Choice('B'),
            tag: None,
            options: vec![
                Choice {
                    letter: 'A',
                    text: "go".into(),
                },
                Choice {
                    letter: 'B',
                    text: "went".into(),
                },
            ],
        }
    }

    #[test]
    fn counts_markers_left_to_right() {
        assert_eq!(count_markers("I _____ to work by _____."), 2);
        assert_eq!(count_markers("No gaps here."), 0);
    }

    #[test]
    fn blank_refs_in_document_order() {
        let set = ExerciseSet {
            id: "1".into(),
            title: "t".into(),
            topic: None,
            description: None,
            format: ExerciseFormat::PlainCloze,
            items: vec![
                Item {
                    template: "_____ and _____".into(),
                    blanks: vec![
                        Blank {
                            number: 1,
                            key: AnswerKey::Text("a".into()),
                            tag: None,
                            options: vec![],
                        },
                        Blank {
                            number: 2,
                            key: AnswerKey::Text("b".into()),
                            tag: None,
                            options: vec![],
                        },
                    ],
                },
                Item {
                    template: "_____".into(),
                    blanks: vec![Blank {
                        number: 3,
                        key: AnswerKey::Text("c".into()),
                        tag: None,
                        options: vec![],
                    }],
                },
            ],
            gap_count: 3,
        };
        let refs: Vec<_> = set.blank_refs().collect();
        assert_eq!(
            refs,
            vec![BlankRef::new(0, 0), BlankRef::new(0, 1), BlankRef::new(1, 0)]
        );
        assert_eq!(set.blank_by_number(3), Some(BlankRef::new(1, 0)));
        assert_eq!(set.blank_by_number(4), None);
    }

    #[test]
    fn choice_labels_include_option_text() {
        let set = ExerciseSet {
            id: "mc".into(),
            title: "mc".into(),
            topic: None,
            description: None,
            format: ExerciseFormat::MultipleChoice,
            items: vec![],
            gap_count: 0,
        };
        let blank = choice_blank();
        assert_eq!(set.key_text(&blank), "B) went");
        assert_eq!(set.answer_text(&blank, &Answer::Choice('A')), "A) go");
        assert!(blank.has_option('A'));
        assert!(!blank.has_option('C'));
    }

    #[test]
    fn format_names() {
        assert_eq!(ExerciseFormat::PlainCloze.to_string(), "cloze");
        assert_eq!(
            ExerciseFormat::WordBank { pool: vec![] }.to_string(),
            "word-bank"
        );
    }
}
