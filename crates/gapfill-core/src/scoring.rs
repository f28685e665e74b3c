//! Scoring engine.
//!
//! Scoring is a pure function of the answer sheet and the set's keys. The
//! only impure step, stamping the time, happens when an `AttemptRecord` is
//! built from a `ScoreOutcome`.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Answer, AnswerKey, BlankRef, ExerciseFormat, ExerciseSet};

/// How an answer is compared against its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonMode {
    /// Trimmed, case-insensitive exact text match.
    CaseInsensitiveExact,
    /// Identity of the selected option letter.
    OptionLetter,
    /// Identity of the assigned pool word.
    PoolWord,
}

impl ComparisonMode {
    /// The comparison a format's keys are written for.
    pub fn for_format(format: &ExerciseFormat) -> Self {
        match format {
            ExerciseFormat::PlainCloze => ComparisonMode::CaseInsensitiveExact,
            ExerciseFormat::MultipleChoice => ComparisonMode::OptionLetter,
            ExerciseFormat::WordBank { .. } => ComparisonMode::PoolWord,
        }
    }
}

/// Canonical form used for text comparison.
pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Whether an answer matches its key under the given comparison.
pub fn answer_matches(mode: ComparisonMode, key: &AnswerKey, answer: &Answer) -> bool {
    match (mode, key, answer) {
        (ComparisonMode::CaseInsensitiveExact, AnswerKey::Text(key), Answer::Text(answer)) => {
            normalize_text(key) == normalize_text(answer)
        }
        (ComparisonMode::OptionLetter, AnswerKey::Choice(key), Answer::Choice(answer)) => {
            key.eq_ignore_ascii_case(answer)
        }
        (ComparisonMode::PoolWord, AnswerKey::Word(key), Answer::Word(answer)) => key == answer,
        _ => false,
    }
}

/// `round(100 × correct / total)` with halves rounded up.
pub fn percentage(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((200 * correct + total) / (2 * total)) as u32
}

/// Per-blank result of a scoring run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlankOutcome {
    pub at: BlankRef,
    pub correct: bool,
}

/// The result of scoring one answer sheet, before it is stamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreOutcome {
    pub correct: usize,
    pub total: usize,
    pub percentage: u32,
    pub blanks: Vec<BlankOutcome>,
}

/// Score every blank of a set. Unanswered blanks count as incorrect.
pub fn score_set(
    set: &ExerciseSet,
    answers: &BTreeMap<BlankRef, Answer>,
    mode: ComparisonMode,
) -> ScoreOutcome {
    let blanks: Vec<BlankOutcome> = set
        .blank_refs()
        .map(|at| {
            let correct = match (set.blank(at), answers.get(&at)) {
                (Some(blank), Some(answer)) => answer_matches(mode, &blank.key, answer),
                _ => false,
            };
            BlankOutcome { at, correct }
        })
        .collect();

    let total = blanks.len();
    let correct = blanks.iter().filter(|b| b.correct).count();

    ScoreOutcome {
        correct,
        total,
        percentage: percentage(correct, total),
        blanks,
    }
}

/// One submitted answer as kept in an attempt record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedResponse {
    pub item: usize,
    pub blank: usize,
    pub answer: Answer,
    pub correct: bool,
}

/// The frozen first-attempt result of an exercise set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub correct: usize,
    pub total: usize,
    pub percentage: u32,
    pub timestamp: DateTime<Utc>,
    #[serde(default = "default_locked")]
    pub locked: bool,
    /// The answers given, so a locked set can be reviewed after a reload.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub responses: Vec<RecordedResponse>,
}

fn default_locked() -> bool {
    true
}

impl AttemptRecord {
    /// Freeze a scoring outcome together with the answers that produced it.
    pub fn from_outcome(
        outcome: &ScoreOutcome,
        answers: &BTreeMap<BlankRef, Answer>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let responses = outcome
            .blanks
            .iter()
            .filter_map(|b| {
                answers.get(&b.at).map(|answer| RecordedResponse {
                    item: b.at.item,
                    blank: b.at.blank,
                    answer: answer.clone(),
                    correct: b.correct,
                })
            })
            .collect();

        Self {
            correct: outcome.correct,
            total: outcome.total,
            percentage: outcome.percentage,
            timestamp,
            locked: true,
            responses,
        }
    }

    pub fn tier(&self) -> ScoreTier {
        ScoreTier::from_percentage(self.percentage)
    }

    pub fn is_perfect(&self) -> bool {
        self.total > 0 && self.correct == self.total
    }
}

/// Coarse score band used for set indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreTier {
    Perfect,
    High,
    Medium,
    Low,
}

impl ScoreTier {
    pub fn from_percentage(percentage: u32) -> Self {
        match percentage {
            100.. => ScoreTier::Perfect,
            80..=99 => ScoreTier::High,
            60..=79 => ScoreTier::Medium,
            _ => ScoreTier::Low,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScoreTier::Perfect => "perfect",
            ScoreTier::High => "high",
            ScoreTier::Medium => "medium",
            ScoreTier::Low => "low",
        }
    }
}

impl fmt::Display for ScoreTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Blank, Item};

    fn text_set(keys: &[&str]) -> ExerciseSet {
        ExerciseSet {
            id: "1".into(),
            title: "t".into(),
            topic: None,
            description: None,
            format: ExerciseFormat::PlainCloze,
            items: keys
                .iter()
                .enumerate()
                .map(|(i, key)| Item {
                    template: "_____".into(),
                    blanks: vec![Blank {
                        number: i + 1,
                        key: AnswerKey::Text((*key).into()),
                        tag: None,
                        options: vec![],
                    }],
                })
                .collect(),
            gap_count: keys.len(),
        }
    }

    fn text(s: &str) -> Answer {
        Answer::Text(s.into())
    }

    #[test]
    fn comparison_is_case_and_whitespace_insensitive() {
        let mode = ComparisonMode::CaseInsensitiveExact;
        let key = AnswerKey::Text("cycling".into());
        assert!(answer_matches(mode, &key, &text("Cycling")));
        assert!(answer_matches(mode, &key, &text(" cycling ")));
        assert!(!answer_matches(mode, &key, &text("cyclist")));
    }

    #[test]
    fn option_letters_compare_by_identity() {
        let mode = ComparisonMode::OptionLetter;
        assert!(answer_matches(mode, &AnswerKey::Choice('B'), &Answer::Choice('b')));
        assert!(!answer_matches(mode, &AnswerKey::Choice('B'), &Answer::Choice('C')));
        // a typed answer never matches a letter key
        assert!(!answer_matches(mode, &AnswerKey::Choice('B'), &text("B")));
    }

    #[test]
    fn pool_words_compare_by_index() {
        let mode = ComparisonMode::PoolWord;
        assert!(answer_matches(mode, &AnswerKey::Word(2), &Answer::Word(2)));
        assert!(!answer_matches(mode, &AnswerKey::Word(2), &Answer::Word(1)));
    }

    #[test]
    fn percentage_rounds_half_up() {
        assert_eq!(percentage(1, 2), 50);
        assert_eq!(percentage(2, 3), 67);
        assert_eq!(percentage(1, 8), 13); // 12.5
        assert_eq!(percentage(1, 3), 33);
        assert_eq!(percentage(0, 0), 0);
        assert_eq!(percentage(7, 7), 100);
    }

    #[test]
    fn scores_mixed_answers() {
        let set = text_set(&["cycling", "commuting"]);
        let mut answers = BTreeMap::new();
        answers.insert(BlankRef::new(0, 0), text("cycling"));
        answers.insert(BlankRef::new(1, 0), text("commute"));
        let outcome = score_set(&set, &answers, ComparisonMode::CaseInsensitiveExact);
        assert_eq!(outcome.correct, 1);
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.percentage, 50);
        assert!(outcome.blanks[0].correct);
        assert!(!outcome.blanks[1].correct);
    }

    #[test]
    fn scoring_is_pure() {
        let set = text_set(&["a", "b", "c"]);
        let mut answers = BTreeMap::new();
        answers.insert(BlankRef::new(0, 0), text("A"));
        answers.insert(BlankRef::new(1, 0), text("x"));
        answers.insert(BlankRef::new(2, 0), text("c"));
        let first = score_set(&set, &answers, ComparisonMode::CaseInsensitiveExact);
        let second = score_set(&set, &answers, ComparisonMode::CaseInsensitiveExact);
        assert_eq!(first, second);
    }

    #[test]
    fn record_keeps_responses() {
        let set = text_set(&["cycling"]);
        let mut answers = BTreeMap::new();
        answers.insert(BlankRef::new(0, 0), text("Cycling"));
        let outcome = score_set(&set, &answers, ComparisonMode::CaseInsensitiveExact);
        let record = AttemptRecord::from_outcome(&outcome, &answers, Utc::now());
        assert!(record.locked);
        assert!(record.is_perfect());
        assert_eq!(record.tier(), ScoreTier::Perfect);
        assert_eq!(record.responses.len(), 1);
        assert!(record.responses[0].correct);
    }

    #[test]
    fn record_without_responses_parses() {
        let json = r#"{"correct":3,"total":4,"percentage":75,"timestamp":"2025-01-02T10:00:00Z","locked":true}"#;
        let record: AttemptRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.percentage, 75);
        assert!(record.responses.is_empty());
        assert_eq!(record.tier(), ScoreTier::Medium);
    }

    #[test]
    fn tiers() {
        assert_eq!(ScoreTier::from_percentage(100), ScoreTier::Perfect);
        assert_eq!(ScoreTier::from_percentage(80), ScoreTier::High);
        assert_eq!(ScoreTier::from_percentage(60), ScoreTier::Medium);
        assert_eq!(ScoreTier::from_percentage(59), ScoreTier::Low);
    }
}
