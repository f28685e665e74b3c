//! Exercise session state machine.
//!
//! A `Session` owns a normalized dataset, the learner's answers for the
//! active set, and the dataset's progress map. Every user intent is a method
//! returning `Result<_, TransitionError>`; a rejected transition leaves the
//! session unchanged.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::chunking::{chunk_set, Chunk, ChunkingStrategy};
use crate::error::TransitionError;
use crate::model::{Answer, BlankRef, Dataset, ExerciseFormat, ExerciseSet};
use crate::progress::{ProgressMap, ProgressStore};
use crate::scoring::{score_set, AttemptRecord, ComparisonMode, RecordedResponse};

/// Per-skill configuration of the session engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillProfile {
    /// How answers are compared with keys.
    pub comparison: ComparisonMode,
    /// Whether blanks may be filled from a shared word pool.
    pub allows_word_pool: bool,
    /// How sets are split into guided-mode steps.
    pub chunking: ChunkingStrategy,
    /// Whether the word pool is shown in shuffled order.
    pub shuffle_pool: bool,
}

impl SkillProfile {
    /// Typed answers, passages split into paragraphs.
    pub fn gap_fill() -> Self {
        Self {
            comparison: ComparisonMode::CaseInsensitiveExact,
            allows_word_pool: false,
            chunking: ChunkingStrategy::Paragraph,
            shuffle_pool: false,
        }
    }

    /// Lettered options, one question per step.
    pub fn multiple_choice() -> Self {
        Self {
            comparison: ComparisonMode::OptionLetter,
            allows_word_pool: false,
            chunking: ChunkingStrategy::Flat,
            shuffle_pool: false,
        }
    }

    /// Words assigned from a shuffled pool.
    pub fn word_bank() -> Self {
        Self {
            comparison: ComparisonMode::PoolWord,
            allows_word_pool: true,
            chunking: ChunkingStrategy::Flat,
            shuffle_pool: true,
        }
    }

    pub fn for_format(format: &ExerciseFormat) -> Self {
        match format {
            ExerciseFormat::PlainCloze => Self::gap_fill(),
            ExerciseFormat::MultipleChoice => Self::multiple_choice(),
            ExerciseFormat::WordBank { .. } => Self::word_bank(),
        }
    }

    /// The profile for a dataset, taken from its first set.
    pub fn for_dataset(dataset: &Dataset) -> Self {
        dataset
            .sets
            .first()
            .map(|set| Self::for_format(&set.format))
            .unwrap_or_default()
    }

    /// Whether sets of this format can run under this profile.
    pub fn supports(&self, format: &ExerciseFormat) -> bool {
        let pool_ok = match format {
            ExerciseFormat::WordBank { .. } => self.allows_word_pool,
            _ => true,
        };
        pool_ok && ComparisonMode::for_format(format) == self.comparison
    }
}

impl Default for SkillProfile {
    fn default() -> Self {
        Self::gap_fill()
    }
}

/// How the active set is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// All items at once.
    #[default]
    Classic,
    /// One chunk at a time with step navigation.
    Guided,
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewMode::Classic => write!(f, "classic"),
            ViewMode::Guided => write!(f, "guided"),
        }
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "classic" => Ok(ViewMode::Classic),
            "guided" | "paragraph" => Ok(ViewMode::Guided),
            other => Err(format!("unknown view mode: {other}")),
        }
    }
}

/// Lifecycle of one exercise set within a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetPhase {
    Unstarted,
    InProgress,
    Submitted(AttemptRecord),
}

/// A pool word picked up and waiting to be placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWord {
    pub set: usize,
    pub word: usize,
}

/// The key of the first unanswered blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hint {
    pub at: BlankRef,
    pub number: usize,
    pub text: String,
}

/// An exercise session over one dataset.
pub struct Session {
    dataset: Dataset,
    profile: SkillProfile,
    progress: ProgressMap,
    store: Option<ProgressStore>,
    active: Option<usize>,
    answers: BTreeMap<BlankRef, Answer>,
    pending: Option<PendingWord>,
    revealed: bool,
    view_mode: ViewMode,
    step: usize,
    chunks: Vec<Chunk>,
    word_order: Vec<usize>,
    rng: StdRng,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("origin", &self.dataset.origin)
            .field("active", &self.active)
            .field("answers", &self.answers.len())
            .field("view_mode", &self.view_mode)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Start a session with no persisted progress.
    pub fn new(dataset: Dataset, profile: SkillProfile) -> Self {
        Self {
            dataset,
            profile,
            progress: ProgressMap::new(),
            store: None,
            active: None,
            answers: BTreeMap::new(),
            pending: None,
            revealed: false,
            view_mode: ViewMode::default(),
            step: 0,
            chunks: Vec::new(),
            word_order: Vec::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Attach a progress store and load the dataset's records from it.
    pub fn with_store(mut self, store: ProgressStore) -> Self {
        self.progress = store.load();
        info!(
            namespace = store.namespace(),
            completed = self.progress.len(),
            "progress loaded"
        );
        self.store = Some(store);
        self
    }

    /// Make word-pool shuffling reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_view_mode(mut self, mode: ViewMode) -> Self {
        self.view_mode = mode;
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn profile(&self) -> &SkillProfile {
        &self.profile
    }

    pub fn progress(&self) -> &ProgressMap {
        &self.progress
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    pub fn active_set(&self) -> Option<&ExerciseSet> {
        self.active.and_then(|idx| self.dataset.set(idx))
    }

    pub fn answers(&self) -> &BTreeMap<BlankRef, Answer> {
        &self.answers
    }

    pub fn answer(&self, at: BlankRef) -> Option<&Answer> {
        self.answers.get(&at)
    }

    pub fn pending_word(&self) -> Option<PendingWord> {
        self.pending
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn current_step(&self) -> usize {
        self.step
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn current_chunk(&self) -> Option<&Chunk> {
        self.chunks.get(self.step)
    }

    /// Pool indices in display order.
    pub fn word_order(&self) -> &[usize] {
        &self.word_order
    }

    /// The blank a pool word is currently placed in.
    pub fn word_placement(&self, word: usize) -> Option<BlankRef> {
        self.answers
            .iter()
            .find(|(_, answer)| **answer == Answer::Word(word))
            .map(|(at, _)| *at)
    }

    pub fn is_word_consumed(&self, word: usize) -> bool {
        self.word_placement(word).is_some()
    }

    pub fn is_locked(&self, set_index: usize) -> bool {
        self.progress.is_locked(set_index)
    }

    pub fn phase_of(&self, set_index: usize) -> SetPhase {
        if let Some(record) = self.progress.get(set_index) {
            SetPhase::Submitted(record.clone())
        } else if self.active == Some(set_index) {
            SetPhase::InProgress
        } else {
            SetPhase::Unstarted
        }
    }

    pub fn current_phase(&self) -> SetPhase {
        match self.active {
            Some(idx) => self.phase_of(idx),
            None => SetPhase::Unstarted,
        }
    }

    /// Number of blanks in the active set with an answer.
    pub fn answered_count(&self) -> usize {
        match self.active_set() {
            Some(set) => set
                .blank_refs()
                .filter(|at| self.answers.contains_key(at))
                .count(),
            None => 0,
        }
    }

    /// Whether every blank of the active set is answered.
    pub fn all_filled(&self) -> bool {
        match self.active_set() {
            Some(set) => set.blank_refs().all(|at| self.answers.contains_key(&at)),
            None => false,
        }
    }

    pub fn can_submit(&self) -> bool {
        matches!(self.active, Some(idx) if !self.is_locked(idx)) && self.all_filled()
    }

    // -----------------------------------------------------------------------
    // Set selection
    // -----------------------------------------------------------------------

    /// Enter an exercise set, discarding unsubmitted answers of the previous one.
    pub fn select_set(&mut self, index: usize) -> Result<(), TransitionError> {
        let Some(set) = self.dataset.set(index) else {
            return reject(TransitionError::OutOfRange { what: "set", index });
        };
        if !self.profile.supports(&set.format) {
            return reject(TransitionError::ProfileMismatch(set.format.name()));
        }

        if let Some(prev) = self.active {
            if prev != index && !self.answers.is_empty() && !self.is_locked(prev) {
                debug!(set = prev, answers = self.answers.len(), "discarding unsubmitted answers");
            }
        }

        self.chunks = chunk_set(set, self.profile.chunking);
        let mut order: Vec<usize> = (0..set.pool().map_or(0, <[String]>::len)).collect();
        if self.profile.shuffle_pool {
            order.shuffle(&mut self.rng);
        }
        self.word_order = order;

        self.answers = match self.progress.get(index) {
            Some(record) => restored_answers(set, &record.responses),
            None => BTreeMap::new(),
        };
        self.active = Some(index);
        self.pending = None;
        self.revealed = false;
        self.step = 0;

        debug!(set = index, locked = self.is_locked(index), "exercise set selected");
        Ok(())
    }

    /// Select the next set. Returns `false` at the last set.
    pub fn next_set(&mut self) -> Result<bool, TransitionError> {
        let next = self.active.map_or(0, |idx| idx + 1);
        if next >= self.dataset.len() {
            return Ok(false);
        }
        self.select_set(next)?;
        Ok(true)
    }

    /// Select the previous set. Returns `false` at the first set.
    pub fn prev_set(&mut self) -> Result<bool, TransitionError> {
        match self.active {
            Some(idx) if idx > 0 => {
                self.select_set(idx - 1)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn jump_to_set(&mut self, index: usize) -> Result<(), TransitionError> {
        self.select_set(index)
    }

    // -----------------------------------------------------------------------
    // Answering
    // -----------------------------------------------------------------------

    /// Record a typed answer or option letter. Blank input unanswers.
    pub fn set_answer(
        &mut self,
        item: usize,
        blank: usize,
        value: &str,
    ) -> Result<(), TransitionError> {
        let set = self.editable_set()?;
        let at = locate(set, item, blank)?;
        let value = value.trim();

        let answer = match &set.format {
            ExerciseFormat::WordBank { .. } => {
                return reject(TransitionError::RequiresWordSelection)
            }
            _ if value.is_empty() => None,
            ExerciseFormat::PlainCloze => Some(Answer::Text(value.to_string())),
            ExerciseFormat::MultipleChoice => {
                let mut chars = value.chars();
                let letter = match (chars.next(), chars.next()) {
                    (Some(c), None) => c.to_ascii_uppercase(),
                    _ => return reject(TransitionError::InvalidOption(value.to_string())),
                };
                let has_option = set.blank(at).is_some_and(|b| b.has_option(letter));
                if !has_option {
                    return reject(TransitionError::InvalidOption(value.to_string()));
                }
                Some(Answer::Choice(letter))
            }
        };

        match answer {
            Some(answer) => {
                self.answers.insert(at, answer);
            }
            None => {
                self.answers.remove(&at);
            }
        }
        Ok(())
    }

    /// Unanswer one blank, releasing any pool word it held.
    pub fn clear_blank(&mut self, item: usize, blank: usize) -> Result<(), TransitionError> {
        let set = self.editable_set()?;
        let at = locate(set, item, blank)?;
        self.answers.remove(&at);
        Ok(())
    }

    /// Pick up a pool word for the next `fill_blank`.
    pub fn select_word(&mut self, word: usize) -> Result<(), TransitionError> {
        let set_index = self.active.ok_or(TransitionError::NoActiveSet)?;
        let pool_len = self.pool_len()?;
        if word >= pool_len {
            return reject(TransitionError::OutOfRange { what: "word", index: word });
        }
        if self.is_word_consumed(word) {
            return reject(TransitionError::WordConsumed(word));
        }
        self.pending = Some(PendingWord {
            set: set_index,
            word,
        });
        Ok(())
    }

    pub fn deselect_word(&mut self) {
        self.pending = None;
    }

    /// Place the pending word in a blank. A word already there is released.
    pub fn fill_blank(&mut self, item: usize, blank: usize) -> Result<(), TransitionError> {
        self.pool_len()?;
        let set_index = self.active.ok_or(TransitionError::NoActiveSet)?;
        let at = locate(self.editable_set()?, item, blank)?;

        let word = match self.pending {
            Some(pending) if pending.set == set_index => pending.word,
            _ => return reject(TransitionError::NoSelection),
        };
        if self.word_placement(word).is_some_and(|placed| placed != at) {
            return reject(TransitionError::WordConsumed(word));
        }

        self.answers.insert(at, Answer::Word(word));
        self.pending = None;
        Ok(())
    }

    /// Move a placed word to another blank, emptying the blank it came from.
    pub fn move_word(&mut self, from: BlankRef, to: BlankRef) -> Result<(), TransitionError> {
        self.pool_len()?;
        let set = self.editable_set()?;
        let from = locate(set, from.item, from.blank)?;
        let to = locate(set, to.item, to.blank)?;
        if from == to {
            return Ok(());
        }

        let word = match self.answers.get(&from) {
            Some(Answer::Word(word)) => *word,
            _ => {
                let number = set.blank(from).map_or(0, |b| b.number);
                return reject(TransitionError::EmptyBlank(number));
            }
        };
        self.answers.remove(&from);
        self.answers.insert(to, Answer::Word(word));
        Ok(())
    }

    /// The key of the first unanswered blank, without recording anything.
    pub fn hint(&self) -> Result<Option<Hint>, TransitionError> {
        let set = self.editable_set()?;
        Ok(set
            .blank_refs()
            .find(|at| !self.answers.contains_key(at))
            .and_then(|at| {
                let blank = set.blank(at)?;
                Some(Hint {
                    at,
                    number: blank.number,
                    text: set.key_text(blank),
                })
            }))
    }

    /// Toggle display of keys on unanswered blanks. Returns the new state.
    pub fn reveal_key(&mut self) -> Result<bool, TransitionError> {
        self.editable_set()?;
        self.revealed = !self.revealed;
        Ok(self.revealed)
    }

    /// Reset every answer of the active set. Attempt records are untouched.
    pub fn clear(&mut self) -> Result<(), TransitionError> {
        self.editable_set()?;
        self.answers.clear();
        self.pending = None;
        self.revealed = false;
        Ok(())
    }

    /// Score the active set, record the first attempt and persist progress.
    pub fn submit(&mut self) -> Result<AttemptRecord, TransitionError> {
        let set = self.editable_set()?;
        let total = set.gap_count;
        if !self.all_filled() {
            return reject(TransitionError::Incomplete {
                answered: self.answered_count(),
                total,
            });
        }

        let outcome = score_set(set, &self.answers, self.profile.comparison);
        let record = AttemptRecord::from_outcome(&outcome, &self.answers, Utc::now());
        let set_index = self.active.ok_or(TransitionError::NoActiveSet)?;

        if !self.progress.record_first(set_index, record.clone()) {
            return reject(TransitionError::Locked(set_index));
        }
        self.pending = None;
        self.revealed = false;

        info!(
            set = set_index,
            correct = record.correct,
            total = record.total,
            percentage = record.percentage,
            "exercise set submitted"
        );
        self.persist();
        Ok(record)
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save(&self.progress) {
            warn!(
                namespace = store.namespace(),
                error = %e,
                "failed to save progress; keeping it in memory"
            );
        }
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    pub fn toggle_view_mode(&mut self) -> ViewMode {
        self.view_mode = match self.view_mode {
            ViewMode::Classic => ViewMode::Guided,
            ViewMode::Guided => ViewMode::Classic,
        };
        self.view_mode
    }

    /// Advance to the next guided step. Returns `false` at the last step.
    pub fn next_step(&mut self) -> bool {
        if self.step + 1 < self.chunks.len() {
            self.step += 1;
            true
        } else {
            false
        }
    }

    /// Go back one guided step. Returns `false` at the first step.
    pub fn prev_step(&mut self) -> bool {
        if self.step > 0 {
            self.step -= 1;
            true
        } else {
            false
        }
    }

    pub fn jump_to_step(&mut self, step: usize) -> Result<(), TransitionError> {
        if step >= self.chunks.len() {
            return reject(TransitionError::OutOfRange {
                what: "step",
                index: step,
            });
        }
        self.step = step;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Guards
    // -----------------------------------------------------------------------

    /// The active set, if it still accepts edits.
    fn editable_set(&self) -> Result<&ExerciseSet, TransitionError> {
        let index = self.active.ok_or(TransitionError::NoActiveSet)?;
        if self.is_locked(index) {
            return reject(TransitionError::Locked(index));
        }
        self.dataset
            .set(index)
            .ok_or(TransitionError::OutOfRange { what: "set", index })
    }

    /// Pool size of the active set, rejecting sets without a pool.
    fn pool_len(&self) -> Result<usize, TransitionError> {
        let set = self.editable_set()?;
        match set.pool() {
            Some(pool) if self.profile.allows_word_pool => Ok(pool.len()),
            _ => reject(TransitionError::NoWordBank),
        }
    }
}

fn locate(set: &ExerciseSet, item: usize, blank: usize) -> Result<BlankRef, TransitionError> {
    let Some(it) = set.items.get(item) else {
        return reject(TransitionError::OutOfRange { what: "item", index: item });
    };
    if blank >= it.blanks.len() {
        return reject(TransitionError::OutOfRange {
            what: "blank",
            index: blank,
        });
    }
    Ok(BlankRef::new(item, blank))
}

/// Stored responses that still fit the set: the blank exists and the answer
/// has the set's answer type. Each pool word is restored at most once.
fn restored_answers(
    set: &ExerciseSet,
    responses: &[RecordedResponse],
) -> BTreeMap<BlankRef, Answer> {
    let mut answers = BTreeMap::new();
    for r in responses {
        let at = BlankRef::new(r.item, r.blank);
        let Some(blank) = set.blank(at) else {
            warn!(item = r.item, blank = r.blank, "dropping stored response for a missing blank");
            continue;
        };
        let fits = match (&set.format, &r.answer) {
            (ExerciseFormat::PlainCloze, Answer::Text(_)) => true,
            (ExerciseFormat::MultipleChoice, Answer::Choice(letter)) => blank.has_option(*letter),
            (ExerciseFormat::WordBank { pool }, Answer::Word(word)) => {
                *word < pool.len() && !answers.values().any(|a| a == &r.answer)
            }
            _ => false,
        };
        if fits {
            answers.insert(at, r.answer.clone());
        } else {
            warn!(number = blank.number, "dropping stored response that does not fit the set");
        }
    }
    answers
}

fn reject<T>(err: TransitionError) -> Result<T, TransitionError> {
    debug!(error = %err, "transition rejected");
    Err(err)
}
