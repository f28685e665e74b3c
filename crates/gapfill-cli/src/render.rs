//! Plain-text rendering of session view-models.

use std::fmt::Write;

use gapfill_core::projector::{BlankDisplay, BlankView, Segment, ViewModel};
use gapfill_core::session::ViewMode;

/// Render a view-model as terminal text.
pub fn view(vm: &ViewModel) -> String {
    let mut out = String::new();
    let h = &vm.header;

    let _ = write!(
        out,
        "Set {}/{}: {} [{}]",
        h.index + 1,
        h.set_count,
        h.title,
        h.format
    );
    if vm.locked {
        out.push_str(" (locked)");
    }
    out.push('\n');
    if let Some(topic) = &h.topic {
        let _ = writeln!(out, "  {topic}");
    }
    if let Some(description) = &h.description {
        let _ = writeln!(out, "  {description}");
    }

    let dots: Vec<String> = vm
        .set_dots
        .iter()
        .map(|d| {
            let marker = match (&d.tier, d.active) {
                (Some(tier), _) => tier.name().to_string(),
                (None, true) => "open".to_string(),
                (None, false) => "-".to_string(),
            };
            if d.active {
                format!("*{}:{marker}", d.index + 1)
            } else {
                format!("{}:{marker}", d.index + 1)
            }
        })
        .collect();
    let _ = writeln!(out, "Sets: {}", dots.join("  "));

    let _ = writeln!(
        out,
        "Answered: {}/{}  Mode: {}",
        vm.completion.answered, vm.completion.total, vm.view_mode
    );
    if let (ViewMode::Guided, Some(steps)) = (vm.view_mode, &vm.steps) {
        let strip: String = steps
            .dots
            .iter()
            .map(|d| match (d.active, d.complete) {
                (true, _) => '@',
                (false, true) => '#',
                (false, false) => '.',
            })
            .collect();
        let _ = writeln!(
            out,
            "Step {}/{}  {strip}",
            steps.current + 1,
            steps.dots.len()
        );
    }
    out.push('\n');

    let mut line = String::new();
    let mut choice_blanks = Vec::new();
    for segment in &vm.segments {
        match segment {
            Segment::Text { text } => line.push_str(text),
            Segment::Blank(blank) => {
                line.push_str(&blank_text(blank));
                if !blank.options.is_empty() {
                    choice_blanks.push(blank);
                }
            }
            Segment::Break => {
                let _ = writeln!(out, "  {}", line.trim());
                line.clear();
            }
        }
    }
    if !line.trim().is_empty() {
        let _ = writeln!(out, "  {}", line.trim());
    }

    for blank in choice_blanks {
        let options: Vec<String> = blank
            .options
            .iter()
            .map(|o| {
                let mark = if o.selected { "*" } else { "" };
                format!("{}) {}{mark}", o.letter, o.text)
            })
            .collect();
        let _ = writeln!(out, "    {}. {}", blank.number, options.join("   "));
    }

    if !vm.pool.is_empty() {
        let chips: Vec<String> = vm
            .pool
            .iter()
            .enumerate()
            .map(|(pos, chip)| {
                if chip.consumed {
                    format!("{}:({})", pos + 1, chip.word)
                } else if chip.selected {
                    format!("{}:>{}<", pos + 1, chip.word)
                } else {
                    format!("{}:{}", pos + 1, chip.word)
                }
            })
            .collect();
        let _ = writeln!(out, "\nWords: {}", chips.join("  "));
    }

    if let Some(summary) = &vm.summary {
        let _ = writeln!(
            out,
            "\nScore: {}/{} ({}%, {}) on {}",
            summary.correct,
            summary.total,
            summary.percentage,
            summary.tier,
            summary.timestamp.format("%Y-%m-%d %H:%M")
        );
    } else if vm.can_submit {
        out.push_str("\nAll questions answered. Type 'submit' to score.\n");
    }

    out
}

fn blank_text(blank: &BlankView) -> String {
    let n = blank.number;
    match &blank.display {
        BlankDisplay::Empty => format!("({n})_____"),
        BlankDisplay::Filled { text } => format!("({n})[{text}]"),
        BlankDisplay::Revealed { text } => format!("({n})<{text}>"),
        BlankDisplay::Correct { text } => format!("({n})[{text} ok]"),
        BlankDisplay::Incorrect { text, expected } => {
            format!("({n})[{text} x, expected {expected}]")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gapfill_core::normalizer::normalize;
    use gapfill_core::projector::project;
    use gapfill_core::{Session, SkillProfile};
    use serde_json::json;

    fn session() -> Session {
        let dataset = normalize(
            &json!({
                "sets": [{
                    "id": 1,
                    "title": "Transport",
                    "sentences": [
                        { "q": "I love _____ to work.", "answer": "cycling" },
                        { "q": "She hates _____.", "answer": "commuting" }
                    ]
                }]
            }),
            "transport.json",
        )
        .unwrap();
        let mut session = Session::new(dataset, SkillProfile::gap_fill());
        session.select_set(0).unwrap();
        session
    }

    #[test]
    fn renders_blanks_by_state() {
        let mut session = session();
        session.set_answer(0, 0, "cycling").unwrap();
        let text = view(&project(&session).unwrap());
        assert!(text.starts_with("Set 1/1: Transport [cloze]"));
        assert!(text.contains("I love (1)[cycling] to work."));
        assert!(text.contains("She hates (2)_____."));
        assert!(text.contains("Answered: 1/2"));
    }

    #[test]
    fn renders_score_after_submit() {
        let mut session = session();
        session.set_answer(0, 0, "Cycling").unwrap();
        session.set_answer(1, 0, "walking").unwrap();
        session.submit().unwrap();
        let text = view(&project(&session).unwrap());
        assert!(text.contains("(locked)"));
        assert!(text.contains("(1)[Cycling ok]"));
        assert!(text.contains("(2)[walking x, expected commuting]"));
        assert!(text.contains("Score: 1/2 (50%, low)"));
    }
}
