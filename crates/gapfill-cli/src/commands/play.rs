use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use gapfill_core::model::BlankRef;
use gapfill_core::progress::ProgressStore;
use gapfill_core::projector::project;
use gapfill_core::session::ViewMode;
use gapfill_core::{Session, SkillProfile, TransitionError};
use gapfill_providers::load_config_from;

use super::{open_dataset, set_index};
use crate::render;

const HELP: &str = "\
Commands:
  a <n> <text>        answer question n (text, or an option letter)
  x <n>               clear question n
  w <k>               pick word k from the word list
  f <n>               put the picked word in question n
  m <from> <to>       move a placed word between questions
  hint                show the answer to the first open question
  reveal              toggle showing answers on open questions
  clear               reset all answers of this set
  submit              score this set (first attempt only)
  step next|prev|<k>  move between guided steps
  set next|prev|<k>   move between exercise sets
  mode [classic|guided]
  show                redraw
  help                this list
  quit";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Nav {
    Next,
    Prev,
    To(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Answer { number: usize, text: String },
    ClearBlank(usize),
    Word(usize),
    Fill(usize),
    Move { from: usize, to: usize },
    Hint,
    Reveal,
    Clear,
    Submit,
    Step(Nav),
    Set(Nav),
    Mode(Option<ViewMode>),
    Show,
    Help,
    Quit,
}

fn number(arg: Option<&str>, what: &str) -> Result<usize, String> {
    let arg = arg.ok_or_else(|| format!("missing {what}"))?;
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(format!("'{arg}' is not a valid {what}")),
    }
}

fn nav(arg: Option<&str>, what: &str) -> Result<Nav, String> {
    match arg {
        Some("next") | None => Ok(Nav::Next),
        Some("prev") => Ok(Nav::Prev),
        other => number(other, what).map(Nav::To),
    }
}

fn parse_action(line: &str) -> Result<Option<Action>, String> {
    let line = line.trim();
    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };
    let mut args = rest.split_whitespace();

    let action = match cmd {
        "" => return Ok(None),
        "a" | "answer" => {
            let n = number(args.next(), "question number")?;
            let text = rest
                .split_once(char::is_whitespace)
                .map(|(_, t)| t.trim().to_string())
                .unwrap_or_default();
            Action::Answer { number: n, text }
        }
        "x" => Action::ClearBlank(number(args.next(), "question number")?),
        "w" | "word" => Action::Word(number(args.next(), "word number")?),
        "f" | "fill" => Action::Fill(number(args.next(), "question number")?),
        "m" | "move" => Action::Move {
            from: number(args.next(), "question number")?,
            to: number(args.next(), "question number")?,
        },
        "hint" => Action::Hint,
        "reveal" => Action::Reveal,
        "clear" => Action::Clear,
        "submit" => Action::Submit,
        "step" => Action::Step(nav(args.next(), "step")?),
        "set" => Action::Set(nav(args.next(), "set")?),
        "mode" => match args.next() {
            None => Action::Mode(None),
            Some(m) => Action::Mode(Some(m.parse()?)),
        },
        "show" => Action::Show,
        "help" | "?" => Action::Help,
        "q" | "quit" | "exit" => Action::Quit,
        other => return Err(format!("unknown command '{other}' (type 'help')")),
    };
    Ok(Some(action))
}

/// Resolve a 1-based question number in the active set.
fn question(session: &Session, number: usize) -> Result<BlankRef, String> {
    session
        .active_set()
        .and_then(|set| set.blank_by_number(number))
        .ok_or_else(|| format!("question {number} does not exist"))
}

enum Outcome {
    Redraw,
    Quiet,
    Quit,
}

fn apply(session: &mut Session, action: Action) -> Result<Outcome, String> {
    let notice = |e: TransitionError| e.to_string();
    match action {
        Action::Answer { number, text } => {
            let at = question(session, number)?;
            session.set_answer(at.item, at.blank, &text).map_err(notice)?;
        }
        Action::ClearBlank(number) => {
            let at = question(session, number)?;
            session.clear_blank(at.item, at.blank).map_err(notice)?;
        }
        Action::Word(position) => {
            let word = session
                .word_order()
                .get(position - 1)
                .copied()
                .ok_or_else(|| format!("word {position} does not exist"))?;
            session.select_word(word).map_err(notice)?;
        }
        Action::Fill(number) => {
            let at = question(session, number)?;
            session.fill_blank(at.item, at.blank).map_err(notice)?;
        }
        Action::Move { from, to } => {
            let from = question(session, from)?;
            let to = question(session, to)?;
            session.move_word(from, to).map_err(notice)?;
        }
        Action::Hint => {
            match session.hint().map_err(notice)? {
                Some(hint) => println!("Hint: question {} is '{}'", hint.number, hint.text),
                None => println!("Every question is answered."),
            }
            return Ok(Outcome::Quiet);
        }
        Action::Reveal => {
            session.reveal_key().map_err(notice)?;
        }
        Action::Clear => session.clear().map_err(notice)?,
        Action::Submit => {
            let record = session.submit().map_err(notice)?;
            println!(
                "Submitted: {}/{} correct ({}%)",
                record.correct, record.total, record.percentage
            );
        }
        Action::Step(nav) => {
            if session.view_mode() != ViewMode::Guided {
                return Err("steps are only used in guided mode (type 'mode guided')".into());
            }
            let moved = match nav {
                Nav::Next => session.next_step(),
                Nav::Prev => session.prev_step(),
                Nav::To(step) if step > session.chunks().len() => {
                    return Err(format!("step {step} does not exist"));
                }
                Nav::To(step) => session.jump_to_step(step - 1).map(|()| true).map_err(notice)?,
            };
            if !moved {
                return Err("no step in that direction".into());
            }
        }
        Action::Set(nav) => {
            let moved = match nav {
                Nav::Next => session.next_set().map_err(notice)?,
                Nav::Prev => session.prev_set().map_err(notice)?,
                Nav::To(set) if set > session.dataset().len() => {
                    return Err(format!("set {set} does not exist"));
                }
                Nav::To(set) => session.jump_to_set(set - 1).map(|()| true).map_err(notice)?,
            };
            if !moved {
                return Err("no exercise set in that direction".into());
            }
        }
        Action::Mode(Some(mode)) => session.set_view_mode(mode),
        Action::Mode(None) => {
            session.toggle_view_mode();
        }
        Action::Show => {}
        Action::Help => {
            println!("{HELP}");
            return Ok(Outcome::Quiet);
        }
        Action::Quit => return Ok(Outcome::Quit),
    }
    Ok(Outcome::Redraw)
}

fn draw(session: &Session) {
    if let Some(vm) = project(session) {
        println!("{}", render::view(&vm));
    }
}

pub async fn execute(
    dataset: String,
    set: usize,
    mode: Option<String>,
    seed: Option<u64>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let (dataset, entry) = open_dataset(&config, &dataset).await?;
    let start = set_index(set, &dataset)?;

    let view_mode = match mode {
        Some(m) => m.parse::<ViewMode>().map_err(anyhow::Error::msg)?,
        None => config.default_mode,
    };
    let mut profile = SkillProfile::for_dataset(&dataset);
    if let Some(chunking) = entry.chunking {
        profile.chunking = chunking;
    }

    let store = ProgressStore::for_origin(config.storage(), &dataset.origin);
    let mut session = Session::new(dataset, profile)
        .with_store(store)
        .with_view_mode(view_mode);
    if let Some(seed) = seed {
        session = session.with_seed(seed);
    }
    session.select_set(start)?;

    println!("Type 'help' for commands.\n");
    draw(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let action = match parse_action(&line) {
            Ok(Some(action)) => action,
            Ok(None) => continue,
            Err(msg) => {
                println!("! {msg}");
                continue;
            }
        };
        match apply(&mut session, action) {
            Ok(Outcome::Redraw) => draw(&session),
            Ok(Outcome::Quiet) => {}
            Ok(Outcome::Quit) => break,
            Err(msg) => println!("! {msg}"),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_answers_with_spaces() {
        assert_eq!(
            parse_action("a 2 to take").unwrap(),
            Some(Action::Answer {
                number: 2,
                text: "to take".into()
            })
        );
        assert_eq!(
            parse_action("a 1").unwrap(),
            Some(Action::Answer {
                number: 1,
                text: String::new()
            })
        );
    }

    #[test]
    fn parses_navigation() {
        assert_eq!(parse_action("set next").unwrap(), Some(Action::Set(Nav::Next)));
        assert_eq!(parse_action("step 3").unwrap(), Some(Action::Step(Nav::To(3))));
        assert_eq!(
            parse_action("mode guided").unwrap(),
            Some(Action::Mode(Some(ViewMode::Guided)))
        );
        assert_eq!(parse_action("m 1 4").unwrap(), Some(Action::Move { from: 1, to: 4 }));
    }

    #[test]
    fn rejects_bad_input() {
        assert_eq!(parse_action("   ").unwrap(), None);
        assert!(parse_action("a 0 x").is_err());
        assert!(parse_action("w").is_err());
        assert!(parse_action("dance").is_err());
        assert!(parse_action("mode sideways").is_err());
    }
}
