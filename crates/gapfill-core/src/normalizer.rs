//! Dataset normalizer.
//!
//! Detects which of the recognized JSON shapes a dataset uses and converts it
//! into the uniform `Dataset` model. Detection is structural, deterministic,
//! and total: anything that matches no shape is an error, never an empty list.

use std::collections::HashSet;
use std::fmt;

use serde_json::{Map, Value};

use crate::error::DatasetError;
use crate::model::{
    count_markers, AnswerKey, Blank, Choice, Dataset, ExerciseFormat, ExerciseSet, Item,
};

/// The source shapes the normalizer understands, in detection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetShape {
    /// `categories[]` of sentence lists.
    Categories,
    /// `sets[]` with a full `text` and a side list of `gaps`.
    FullText,
    /// `sets[]` with a shared `words` pool per set.
    WordBank,
    /// `sets[]` of sentences carrying `options`.
    MultipleChoice,
    /// `sets[]` of sentences with inline answers.
    OpenCloze,
}

impl fmt::Display for DatasetShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DatasetShape::Categories => "categories",
            DatasetShape::FullText => "full-text",
            DatasetShape::WordBank => "word-bank",
            DatasetShape::MultipleChoice => "multiple-choice",
            DatasetShape::OpenCloze => "open-cloze",
        };
        f.write_str(name)
    }
}

/// Inspect structural markers and decide which shape a document uses.
pub fn detect_shape(data: &Value) -> Result<DatasetShape, DatasetError> {
    let Some(root) = data.as_object() else {
        return Err(DatasetError::UnrecognizedFormat(
            "top-level value is not an object".into(),
        ));
    };

    if let Some(categories) = root.get("categories") {
        return match categories.as_array() {
            Some(list) if !list.is_empty() => Ok(DatasetShape::Categories),
            _ => Err(DatasetError::UnrecognizedFormat(
                "`categories` must be a non-empty array".into(),
            )),
        };
    }

    let Some(sets) = root.get("sets") else {
        return Err(DatasetError::UnrecognizedFormat(
            "expected a `categories` or `sets` field".into(),
        ));
    };
    let first = match sets.as_array().and_then(|s| s.first()) {
        Some(first) => first,
        None => {
            return Err(DatasetError::UnrecognizedFormat(
                "`sets` must be a non-empty array".into(),
            ))
        }
    };

    if first.get("text").is_some() {
        Ok(DatasetShape::FullText)
    } else if first.get("words").is_some() {
        Ok(DatasetShape::WordBank)
    } else if first
        .get("sentences")
        .and_then(|s| s.get(0))
        .and_then(|s| s.get("options"))
        .is_some()
    {
        Ok(DatasetShape::MultipleChoice)
    } else {
        Ok(DatasetShape::OpenCloze)
    }
}

/// Parse a JSON string and normalize it.
pub fn normalize_str(content: &str, origin: &str) -> Result<Dataset, DatasetError> {
    let value: Value =
        serde_json::from_str(content).map_err(|e| DatasetError::InvalidJson(e.to_string()))?;
    normalize(&value, origin)
}

/// Normalize a parsed JSON document into a `Dataset`.
pub fn normalize(data: &Value, origin: &str) -> Result<Dataset, DatasetError> {
    let shape = detect_shape(data)?;

    let sets = match shape {
        DatasetShape::Categories => each_entry(data, "categories", category_set)?,
        DatasetShape::FullText => each_entry(data, "sets", full_text_set)?,
        DatasetShape::WordBank => each_entry(data, "sets", word_bank_set)?,
        DatasetShape::MultipleChoice => each_entry(data, "sets", multiple_choice_set)?,
        DatasetShape::OpenCloze => each_entry(data, "sets", open_cloze_set)?,
    };

    tracing::debug!(%shape, sets = sets.len(), origin, "normalized dataset");

    Ok(Dataset {
        origin: origin.to_string(),
        sets,
    })
}

fn each_entry(
    data: &Value,
    field: &str,
    convert: fn(&Value, usize, &str) -> Result<ExerciseSet, DatasetError>,
) -> Result<Vec<ExerciseSet>, DatasetError> {
    let entries = data
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| DatasetError::UnrecognizedFormat(format!("`{field}` is not an array")))?;

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            if !entry.is_object() {
                return Err(DatasetError::missing(index, format!("{field}[{index}]")));
            }
            convert(entry, index, &format!("{field}[{index}]"))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Per-shape conversion
// ---------------------------------------------------------------------------

fn category_set(cat: &Value, index: usize, path: &str) -> Result<ExerciseSet, DatasetError> {
    let sentences = array_field(cat, index, path, "sentences")?;
    let items = sentence_items(sentences, index, &format!("{path}.sentences"))?;
    finish_set(
        index,
        identifier(cat, "id", index),
        scalar(cat, "name").unwrap_or_else(|| format!("Category {}", index + 1)),
        scalar(cat, "grammarFocus").or_else(|| scalar(cat, "topic")),
        scalar(cat, "description"),
        ExerciseFormat::PlainCloze,
        items,
    )
}

fn open_cloze_set(set: &Value, index: usize, path: &str) -> Result<ExerciseSet, DatasetError> {
    let sentences = array_field(set, index, path, "sentences")?;
    let items = sentence_items(sentences, index, &format!("{path}.sentences"))?;
    finish_set(
        index,
        identifier(set, "id", index),
        title_or_default(set, index),
        scalar(set, "topic"),
        scalar(set, "description"),
        ExerciseFormat::PlainCloze,
        items,
    )
}

fn full_text_set(set: &Value, index: usize, path: &str) -> Result<ExerciseSet, DatasetError> {
    let text = string_field(set, index, path, "text")?;
    let gaps = array_field(set, index, path, "gaps")?;

    let markers = count_markers(&text);
    if markers != gaps.len() {
        return Err(DatasetError::GapCountMismatch {
            set_index: index,
            markers,
            gaps: gaps.len(),
        });
    }

    // Placeholders pair with gaps left to right, so the gap list order is
    // document order regardless of any `number` field.
    let blanks = gaps
        .iter()
        .enumerate()
        .map(|(g, gap)| {
            let gap_path = format!("{path}.gaps[{g}]");
            let answer = string_field(gap, index, &gap_path, "answer")?;
            Ok(Blank {
                number: g + 1,
                key: AnswerKey::Text(answer),
                tag: scalar(gap, "type").or_else(|| scalar(gap, "pattern")),
                options: Vec::new(),
            })
        })
        .collect::<Result<Vec<_>, DatasetError>>()?;

    finish_set(
        index,
        identifier(set, "id", index),
        title_or_default(set, index),
        scalar(set, "topic"),
        scalar(set, "description"),
        ExerciseFormat::PlainCloze,
        vec![Item {
            template: text,
            blanks,
        }],
    )
}

// `setsPerTest` is ignored; every set is scored on its own.
fn word_bank_set(set: &Value, index: usize, path: &str) -> Result<ExerciseSet, DatasetError> {
    let words = array_field(set, index, path, "words")?
        .iter()
        .enumerate()
        .map(|(w, word)| {
            word.as_str()
                .map(str::to_string)
                .ok_or_else(|| DatasetError::missing(index, format!("{path}.words[{w}]")))
        })
        .collect::<Result<Vec<_>, DatasetError>>()?;

    let sentences = array_field(set, index, path, "sentences")?;
    let items = sentences
        .iter()
        .enumerate()
        .map(|(s, sentence)| {
            let sentence_path = format!("{path}.sentences[{s}]");
            let template = string_field(sentence, index, &sentence_path, "text")?;
            let correct = sentence
                .get("correct")
                .and_then(Value::as_u64)
                .ok_or_else(|| DatasetError::missing(index, format!("{sentence_path}.correct")))?
                as usize;
            if correct >= words.len() {
                return Err(DatasetError::InvalidKey {
                    set_index: index,
                    message: format!(
                        "{sentence_path}.correct = {correct} but the pool has {} words",
                        words.len()
                    ),
                });
            }
            single_blank_item(template, AnswerKey::Word(correct), None, Vec::new(), index)
        })
        .collect::<Result<Vec<_>, DatasetError>>()?;

    let topic = scalar(set, "topic");
    let title = match (scalar(set, "setNumber"), &topic) {
        (Some(number), Some(topic)) => format!("Set {number}: {topic}"),
        (Some(number), None) => format!("Set {number}"),
        (None, _) => title_or_default(set, index),
    };
    let id = scalar(set, "id")
        .or_else(|| scalar(set, "setNumber"))
        .unwrap_or_else(|| (index + 1).to_string());

    finish_set(
        index,
        id,
        title,
        topic,
        scalar(set, "description"),
        ExerciseFormat::WordBank { pool: words },
        items,
    )
}

fn multiple_choice_set(
    set: &Value,
    index: usize,
    path: &str,
) -> Result<ExerciseSet, DatasetError> {
    let sentences = array_field(set, index, path, "sentences")?;
    let items = sentences
        .iter()
        .enumerate()
        .map(|(s, sentence)| {
            let sentence_path = format!("{path}.sentences[{s}]");
            let template = string_field(sentence, index, &sentence_path, "q")?;
            let options = parse_options(sentence, index, &sentence_path)?;
            let answer = string_field(sentence, index, &sentence_path, "answer")?;
            let letter = resolve_letter(&answer, &options).ok_or_else(|| {
                DatasetError::InvalidKey {
                    set_index: index,
                    message: format!("{sentence_path}.answer '{answer}' is not one of the options"),
                }
            })?;
            single_blank_item(
                template,
                AnswerKey::Choice(letter),
                scalar(sentence, "pattern"),
                options,
                index,
            )
        })
        .collect::<Result<Vec<_>, DatasetError>>()?;

    finish_set(
        index,
        identifier(set, "id", index),
        title_or_default(set, index),
        scalar(set, "topic"),
        scalar(set, "description"),
        ExerciseFormat::MultipleChoice,
        items,
    )
}

/// Sentence entries `{ q, answer, pattern? }` where `answer` may be a list
/// when the sentence holds several markers.
fn sentence_items(
    sentences: &[Value],
    set_index: usize,
    path: &str,
) -> Result<Vec<Item>, DatasetError> {
    sentences
        .iter()
        .enumerate()
        .map(|(s, sentence)| {
            let sentence_path = format!("{path}[{s}]");
            let template = string_field(sentence, set_index, &sentence_path, "q")?;
            let answers = match sentence.get("answer") {
                Some(Value::Array(list)) => list
                    .iter()
                    .map(scalar_value)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| {
                        DatasetError::missing(set_index, format!("{sentence_path}.answer"))
                    })?,
                Some(value) => vec![scalar_value(value).ok_or_else(|| {
                    DatasetError::missing(set_index, format!("{sentence_path}.answer"))
                })?],
                None => {
                    return Err(DatasetError::missing(
                        set_index,
                        format!("{sentence_path}.answer"),
                    ))
                }
            };

            let markers = count_markers(&template);
            if markers != answers.len() {
                return Err(DatasetError::GapCountMismatch {
                    set_index,
                    markers,
                    gaps: answers.len(),
                });
            }

            let tag = scalar(sentence, "pattern").or_else(|| scalar(sentence, "type"));
            Ok(Item {
                template,
                blanks: answers
                    .into_iter()
                    .map(|answer| Blank {
                        number: 0,
                        key: AnswerKey::Text(answer),
                        tag: tag.clone(),
                        options: Vec::new(),
                    })
                    .collect(),
            })
        })
        .collect()
}

fn single_blank_item(
    template: String,
    key: AnswerKey,
    tag: Option<String>,
    options: Vec<Choice>,
    set_index: usize,
) -> Result<Item, DatasetError> {
    let markers = count_markers(&template);
    if markers != 1 {
        return Err(DatasetError::GapCountMismatch {
            set_index,
            markers,
            gaps: 1,
        });
    }
    Ok(Item {
        template,
        blanks: vec![Blank {
            number: 0,
            key,
            tag,
            options,
        }],
    })
}

/// Number blanks across the set and record the gap count.
fn finish_set(
    set_index: usize,
    id: String,
    title: String,
    topic: Option<String>,
    description: Option<String>,
    format: ExerciseFormat,
    mut items: Vec<Item>,
) -> Result<ExerciseSet, DatasetError> {
    if items.is_empty() {
        return Err(DatasetError::EmptySet { set_index });
    }

    let mut number = 0;
    for blank in items.iter_mut().flat_map(|i| i.blanks.iter_mut()) {
        number += 1;
        blank.number = number;
    }

    Ok(ExerciseSet {
        id,
        title,
        topic,
        description,
        format,
        items,
        gap_count: number,
    })
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn array_field<'a>(
    value: &'a Value,
    set_index: usize,
    path: &str,
    field: &str,
) -> Result<&'a Vec<Value>, DatasetError> {
    value
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| DatasetError::missing(set_index, format!("{path}.{field}")))
}

fn string_field(
    value: &Value,
    set_index: usize,
    path: &str,
    field: &str,
) -> Result<String, DatasetError> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DatasetError::missing(set_index, format!("{path}.{field}")))
}

/// A string or number field rendered as a string.
fn scalar(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(scalar_value)
}

fn scalar_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn identifier(value: &Value, field: &str, index: usize) -> String {
    scalar(value, field).unwrap_or_else(|| (index + 1).to_string())
}

fn title_or_default(value: &Value, index: usize) -> String {
    scalar(value, "title")
        .or_else(|| scalar(value, "name"))
        .unwrap_or_else(|| format!("Set {}", index + 1))
}

/// Letters assigned, in order, to options given as a list.
const OPTION_LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn parse_options(
    sentence: &Value,
    set_index: usize,
    path: &str,
) -> Result<Vec<Choice>, DatasetError> {
    let missing = || DatasetError::missing(set_index, format!("{path}.options"));
    let options = match sentence.get("options") {
        Some(Value::Array(list)) if list.len() > OPTION_LETTERS.len() => {
            return Err(DatasetError::InvalidKey {
                set_index,
                message: format!(
                    "{path}.options has {} entries but at most {} can be lettered",
                    list.len(),
                    OPTION_LETTERS.len()
                ),
            });
        }
        Some(Value::Array(list)) => list
            .iter()
            .zip(OPTION_LETTERS.chars())
            .map(|(text, letter)| {
                scalar_value(text).map(|text| Choice { letter, text })
            })
            .collect::<Option<Vec<_>>>()
            .ok_or_else(missing)?,
        Some(Value::Object(map)) => lettered_map(map).ok_or_else(missing)?,
        _ => return Err(missing()),
    };
    if options.is_empty() {
        return Err(missing());
    }
    Ok(options)
}

fn lettered_map(map: &Map<String, Value>) -> Option<Vec<Choice>> {
    let mut choices = map
        .iter()
        .map(|(key, text)| {
            let letter = key.trim().chars().next()?.to_ascii_uppercase();
            Some(Choice {
                letter,
                text: scalar_value(text)?,
            })
        })
        .collect::<Option<Vec<_>>>()?;
    choices.sort_by_key(|c| c.letter);
    Some(choices)
}

/// Accept either an option letter or the full text of one option.
fn resolve_letter(answer: &str, options: &[Choice]) -> Option<char> {
    let answer = answer.trim();
    let mut chars = answer.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        let letter = c.to_ascii_uppercase();
        return options.iter().any(|o| o.letter == letter).then_some(letter);
    }
    options
        .iter()
        .find(|o| o.text.trim().eq_ignore_ascii_case(answer))
        .map(|o| o.letter)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A non-fatal issue found in a normalized dataset.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The set ID (if applicable).
    pub set_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Check a normalized dataset for issues that do not prevent a session.
pub fn validate_dataset(dataset: &Dataset) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen_ids = HashSet::new();
    for set in &dataset.sets {
        if !seen_ids.insert(set.id.as_str()) {
            warnings.push(ValidationWarning {
                set_id: Some(set.id.clone()),
                message: format!("duplicate set ID: {}", set.id),
            });
        }
    }

    for set in &dataset.sets {
        for blank in set.items.iter().flat_map(|i| &i.blanks) {
            if let AnswerKey::Text(text) = &blank.key {
                if text.trim().is_empty() {
                    warnings.push(ValidationWarning {
                        set_id: Some(set.id.clone()),
                        message: format!("question {} has an empty answer", blank.number),
                    });
                }
            }
        }
    }

    for set in &dataset.sets {
        let Some(pool) = set.pool() else { continue };

        let mut seen_words = HashSet::new();
        for word in pool {
            if !seen_words.insert(word.to_lowercase()) {
                warnings.push(ValidationWarning {
                    set_id: Some(set.id.clone()),
                    message: format!("word bank lists '{word}' more than once"),
                });
            }
        }

        let used: HashSet<usize> = set
            .items
            .iter()
            .flat_map(|i| &i.blanks)
            .filter_map(|b| match b.key {
                AnswerKey::Word(idx) => Some(idx),
                _ => None,
            })
            .collect();
        for (idx, word) in pool.iter().enumerate() {
            if !used.contains(&idx) {
                warnings.push(ValidationWarning {
                    set_id: Some(set.id.clone()),
                    message: format!("word '{word}' is never a correct answer"),
                });
            }
        }
    }

    warnings
}
