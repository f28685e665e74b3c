use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use gapfill_core::model::{Answer, BlankRef};
use gapfill_core::normalizer::normalize_str;
use gapfill_core::scoring::{score_set, ComparisonMode};
use gapfill_core::{Dataset, Session, SkillProfile};

fn dataset(blanks: usize) -> Dataset {
    let sentences: Vec<serde_json::Value> = (0..blanks)
        .map(|i| serde_json::json!({ "q": format!("Item {i}: _____."), "answer": format!("Answer{i}") }))
        .collect();
    let json = serde_json::json!({ "sets": [{ "id": 1, "title": "Bench", "sentences": sentences }] });
    normalize_str(&json.to_string(), "bench.json").unwrap()
}

fn answers(blanks: usize) -> BTreeMap<BlankRef, Answer> {
    (0..blanks)
        .map(|i| {
            let text = if i % 3 == 0 {
                format!("  answer{i} ")
            } else {
                format!("wrong{i}")
            };
            (BlankRef::new(i, 0), Answer::Text(text))
        })
        .collect()
}

fn bench_score_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("score_set");

    for size in [10, 50, 200] {
        let data = dataset(size);
        let sheet = answers(size);
        group.bench_function(format!("{size}_blanks"), |b| {
            b.iter(|| {
                score_set(
                    black_box(&data.sets[0]),
                    black_box(&sheet),
                    ComparisonMode::CaseInsensitiveExact,
                )
            })
        });
    }

    group.finish();
}

fn bench_fill_and_check(c: &mut Criterion) {
    let data = dataset(50);

    c.bench_function("session_fill_50_blanks", |b| {
        b.iter(|| {
            let mut session = Session::new(data.clone(), SkillProfile::gap_fill());
            session.select_set(0).unwrap();
            for i in 0..50 {
                session.set_answer(i, 0, "answer").unwrap();
                black_box(session.all_filled());
            }
            session
        })
    });
}

criterion_group!(benches, bench_score_set, bench_fill_and_check);
criterion_main!(benches);
