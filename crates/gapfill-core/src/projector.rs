//! Render projection.
//!
//! `project` is a pure function from a session to a view-model. Front ends
//! draw the view-model and never inspect session internals, so keys reach
//! the display only through a reveal or after submission.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Answer, BlankRef, Choice, ExerciseSet, BLANK_MARKER};
use crate::scoring::{answer_matches, ScoreTier};
use crate::session::{Session, ViewMode};

/// Everything a front end needs to draw the active set.
#[derive(Debug, Clone, Serialize)]
pub struct ViewModel {
    pub header: Header,
    pub view_mode: ViewMode,
    pub locked: bool,
    pub revealed: bool,
    pub completion: Completion,
    pub can_submit: bool,
    pub set_dots: Vec<SetDot>,
    /// Present in guided mode only.
    pub steps: Option<StepStrip>,
    pub segments: Vec<Segment>,
    /// Word chips in display order (word-bank sets only).
    pub pool: Vec<WordChip>,
    /// Present once the set is submitted.
    pub summary: Option<ScoreSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Header {
    pub index: usize,
    pub set_count: usize,
    pub title: String,
    pub topic: Option<String>,
    pub description: Option<String>,
    pub format: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Completion {
    pub answered: usize,
    pub total: usize,
}

/// One indicator per set in the dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetDot {
    pub index: usize,
    pub active: bool,
    pub tier: Option<ScoreTier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepStrip {
    pub current: usize,
    pub dots: Vec<StepDot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StepDot {
    pub active: bool,
    /// Every blank in the step is answered.
    pub complete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment {
    Text { text: String },
    Blank(BlankView),
    /// Separates items in classic mode.
    Break,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlankView {
    pub at: BlankRef,
    pub number: usize,
    pub display: BlankDisplay,
    /// Lettered options (multiple-choice sets only).
    pub options: Vec<OptionView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BlankDisplay {
    Empty,
    Filled { text: String },
    /// Key shown on an unanswered blank by a reveal.
    Revealed { text: String },
    Correct { text: String },
    Incorrect { text: String, expected: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionView {
    pub letter: char,
    pub text: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WordChip {
    pub index: usize,
    pub word: String,
    pub consumed: bool,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreSummary {
    pub correct: usize,
    pub total: usize,
    pub percentage: u32,
    pub tier: ScoreTier,
    pub timestamp: DateTime<Utc>,
}

/// Build the view-model for the active set, or `None` before any set is selected.
pub fn project(session: &Session) -> Option<ViewModel> {
    let index = session.active_index()?;
    let set = session.active_set()?;
    let locked = session.is_locked(index);
    let dataset = session.dataset();

    let header = Header {
        index,
        set_count: dataset.len(),
        title: set.title.clone(),
        topic: set.topic.clone(),
        description: set.description.clone(),
        format: set.format.name(),
    };

    let set_dots = (0..dataset.len())
        .map(|i| SetDot {
            index: i,
            active: i == index,
            tier: session.progress().get(i).map(|r| r.tier()),
        })
        .collect();

    let (steps, segments) = match session.view_mode() {
        ViewMode::Classic => (None, classic_segments(session, set, locked)),
        ViewMode::Guided => {
            let dots = session
                .chunks()
                .iter()
                .enumerate()
                .map(|(i, chunk)| StepDot {
                    active: i == session.current_step(),
                    complete: chunk.blanks.iter().all(|at| session.answer(*at).is_some()),
                })
                .collect();
            let segments = session
                .current_chunk()
                .map(|chunk| template_segments(session, set, locked, &chunk.text, &chunk.blanks))
                .unwrap_or_default();
            let strip = StepStrip {
                current: session.current_step(),
                dots,
            };
            (Some(strip), segments)
        }
    };

    let pending = session.pending_word().map(|p| p.word);
    let pool = match set.pool() {
        Some(words) => session
            .word_order()
            .iter()
            .filter_map(|&i| {
                words.get(i).map(|word| WordChip {
                    index: i,
                    word: word.clone(),
                    consumed: session.is_word_consumed(i),
                    selected: pending == Some(i),
                })
            })
            .collect(),
        None => Vec::new(),
    };

    let summary = session.progress().get(index).map(|r| ScoreSummary {
        correct: r.correct,
        total: r.total,
        percentage: r.percentage,
        tier: r.tier(),
        timestamp: r.timestamp,
    });

    Some(ViewModel {
        header,
        view_mode: session.view_mode(),
        locked,
        revealed: session.is_revealed() && !locked,
        completion: Completion {
            answered: session.answered_count(),
            total: set.gap_count,
        },
        can_submit: session.can_submit(),
        set_dots,
        steps,
        segments,
        pool,
        summary,
    })
}

fn classic_segments(session: &Session, set: &ExerciseSet, locked: bool) -> Vec<Segment> {
    let mut segments = Vec::new();
    for (item_idx, item) in set.items.iter().enumerate() {
        if item_idx > 0 {
            segments.push(Segment::Break);
        }
        let refs: Vec<BlankRef> = (0..item.blanks.len())
            .map(|b| BlankRef::new(item_idx, b))
            .collect();
        segments.extend(template_segments(session, set, locked, &item.template, &refs));
    }
    segments
}

/// Interleave the text around each marker with the blank it stands for.
fn template_segments(
    session: &Session,
    set: &ExerciseSet,
    locked: bool,
    template: &str,
    refs: &[BlankRef],
) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut refs = refs.iter();
    for (i, text) in template.split(BLANK_MARKER).enumerate() {
        if i > 0 {
            if let Some(view) = refs.next().and_then(|at| blank_view(session, set, locked, *at)) {
                segments.push(Segment::Blank(view));
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text {
                text: text.to_string(),
            });
        }
    }
    segments
}

fn blank_view(
    session: &Session,
    set: &ExerciseSet,
    locked: bool,
    at: BlankRef,
) -> Option<BlankView> {
    let blank = set.blank(at)?;
    let answer = session.answer(at);

    let display = match (answer, locked) {
        (Some(answer), true) => {
            let text = set.answer_text(blank, answer);
            if answer_matches(session.profile().comparison, &blank.key, answer) {
                BlankDisplay::Correct { text }
            } else {
                BlankDisplay::Incorrect {
                    text,
                    expected: set.key_text(blank),
                }
            }
        }
        (Some(answer), false) => BlankDisplay::Filled {
            text: set.answer_text(blank, answer),
        },
        (None, false) if session.is_revealed() => BlankDisplay::Revealed {
            text: set.key_text(blank),
        },
        (None, _) => BlankDisplay::Empty,
    };

    let selected = match answer {
        Some(Answer::Choice(letter)) => Some(*letter),
        _ => None,
    };
    let options = blank
        .options
        .iter()
        .map(|Choice { letter, text }| OptionView {
            letter: *letter,
            text: text.clone(),
            selected: selected == Some(*letter),
        })
        .collect();

    Some(BlankView {
        at,
        number: blank.number,
        display,
        options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkingStrategy;
    use crate::model::Dataset;
    use crate::normalizer::normalize;
    use crate::session::SkillProfile;
    use serde_json::json;

    fn transport() -> Dataset {
        normalize(
            &json!({
                "sets": [{
                    "id": 1,
                    "title": "Transport",
                    "topic": "Getting around",
                    "sentences": [
                        { "q": "I love _____ to work.", "answer": "cycling" },
                        { "q": "She hates _____.", "answer": "commuting" }
                    ]
                }, {
                    "id": 2,
                    "title": "Other",
                    "sentences": [{ "q": "_____", "answer": "x" }]
                }]
            }),
            "transport.json",
        )
        .unwrap()
    }

    fn blanks(vm: &ViewModel) -> Vec<&BlankView> {
        vm.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Blank(b) => Some(b),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn nothing_to_project_before_selection() {
        let s = Session::new(transport(), SkillProfile::gap_fill());
        assert!(project(&s).is_none());
    }

    #[test]
    fn keys_stay_hidden_until_revealed() {
        let mut s = Session::new(transport(), SkillProfile::gap_fill());
        s.select_set(0).unwrap();
        s.set_answer(0, 0, "cycling").unwrap();

        let vm = project(&s).unwrap();
        let views = blanks(&vm);
        assert_eq!(
            views[0].display,
            BlankDisplay::Filled {
                text: "cycling".into()
            }
        );
        assert_eq!(views[1].display, BlankDisplay::Empty);
        let json = serde_json::to_string(&vm).unwrap();
        assert!(!json.contains("commuting"));

        s.reveal_key().unwrap();
        let vm = project(&s).unwrap();
        assert_eq!(
            blanks(&vm)[1].display,
            BlankDisplay::Revealed {
                text: "commuting".into()
            }
        );
        assert_eq!(vm.completion, Completion { answered: 1, total: 2 });
        assert!(!vm.can_submit);
    }

    #[test]
    fn classic_segments_interleave_text_and_blanks() {
        let mut s = Session::new(transport(), SkillProfile::gap_fill());
        s.select_set(0).unwrap();
        let vm = project(&s).unwrap();
        assert_eq!(
            vm.segments[0],
            Segment::Text {
                text: "I love ".into()
            }
        );
        assert!(matches!(vm.segments[1], Segment::Blank(_)));
        assert_eq!(
            vm.segments[2],
            Segment::Text {
                text: " to work.".into()
            }
        );
        assert_eq!(vm.segments[3], Segment::Break);
        assert!(vm.steps.is_none());
        assert_eq!(vm.header.topic.as_deref(), Some("Getting around"));
    }

    #[test]
    fn submitted_set_shows_correctness_and_summary() {
        let mut s = Session::new(transport(), SkillProfile::gap_fill());
        s.select_set(0).unwrap();
        s.set_answer(0, 0, "Cycling").unwrap();
        s.set_answer(1, 0, "commute").unwrap();
        s.submit().unwrap();

        let vm = project(&s).unwrap();
        assert!(vm.locked);
        assert!(!vm.can_submit);
        let views = blanks(&vm);
        assert_eq!(
            views[0].display,
            BlankDisplay::Correct {
                text: "Cycling".into()
            }
        );
        assert_eq!(
            views[1].display,
            BlankDisplay::Incorrect {
                text: "commute".into(),
                expected: "commuting".into()
            }
        );
        let summary = vm.summary.unwrap();
        assert_eq!(summary.percentage, 50);
        assert_eq!(summary.tier, ScoreTier::Low);
        assert_eq!(vm.set_dots[0].tier, Some(ScoreTier::Low));
        assert_eq!(vm.set_dots[1].tier, None);
        assert!(vm.set_dots[0].active);
    }

    #[test]
    fn guided_mode_projects_current_step() {
        let profile = SkillProfile {
            chunking: ChunkingStrategy::Flat,
            ..SkillProfile::gap_fill()
        };
        let mut s = Session::new(transport(), profile);
        s.set_view_mode(ViewMode::Guided);
        s.select_set(0).unwrap();
        s.set_answer(0, 0, "cycling").unwrap();

        let vm = project(&s).unwrap();
        let strip = vm.steps.as_ref().unwrap();
        assert_eq!(strip.dots.len(), 2);
        assert!(strip.dots[0].active && strip.dots[0].complete);
        assert!(!strip.dots[1].complete);
        assert_eq!(blanks(&vm).len(), 1);
    }

    #[test]
    fn word_chips_follow_display_order() {
        let dataset = normalize(
            &json!({
                "sets": [{
                    "words": ["significant", "gradual", "sharp"],
                    "sentences": [
                        { "text": "A _____ rise.", "correct": 2 },
                        { "text": "A _____ fall.", "correct": 1 }
                    ]
                }]
            }),
            "wb.json",
        )
        .unwrap();
        let mut s = Session::new(dataset, SkillProfile::word_bank()).with_seed(3);
        s.select_set(0).unwrap();
        s.select_word(2).unwrap();
        s.fill_blank(0, 0).unwrap();
        s.select_word(0).unwrap();

        let vm = project(&s).unwrap();
        let order: Vec<usize> = vm.pool.iter().map(|c| c.index).collect();
        assert_eq!(order, s.word_order());
        let sharp = vm.pool.iter().find(|c| c.index == 2).unwrap();
        assert!(sharp.consumed);
        let significant = vm.pool.iter().find(|c| c.index == 0).unwrap();
        assert!(significant.selected && !significant.consumed);
        assert_eq!(
            blanks(&vm)[0].display,
            BlankDisplay::Filled {
                text: "sharp".into()
            }
        );
    }

    #[test]
    fn options_mark_the_selected_letter() {
        let dataset = normalize(
            &json!({
                "sets": [{
                    "sentences": [
                        { "q": "I _____ home.", "options": ["go", "went"], "answer": "B" }
                    ]
                }]
            }),
            "mc.json",
        )
        .unwrap();
        let mut s = Session::new(dataset, SkillProfile::multiple_choice());
        s.select_set(0).unwrap();
        s.set_answer(0, 0, "a").unwrap();
        let vm = project(&s).unwrap();
        let view = blanks(&vm)[0];
        assert_eq!(view.options.len(), 2);
        assert!(view.options[0].selected);
        assert!(!view.options[1].selected);
        assert_eq!(
            view.display,
            BlankDisplay::Filled {
                text: "A) go".into()
            }
        );
    }
}
