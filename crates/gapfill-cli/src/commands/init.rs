//! The `gapfill init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("gapfill.toml").exists() {
        println!("gapfill.toml already exists, skipping.");
    } else {
        std::fs::write("gapfill.toml", SAMPLE_CONFIG)?;
        println!("Created gapfill.toml");
    }

    std::fs::create_dir_all("datasets")?;
    let example_path = std::path::Path::new("datasets/example.json");
    if example_path.exists() {
        println!("datasets/example.json already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_DATASET)?;
        println!("Created datasets/example.json");
    }

    println!("\nNext steps:");
    println!("  1. Run: gapfill validate --dataset example");
    println!("  2. Run: gapfill play --dataset example");
    println!("  3. Run: gapfill progress --dataset example");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# gapfill configuration

storage_dir = "./gapfill-progress"
default_mode = "classic"
http_timeout_secs = 30

[datasets.example]
location = "datasets/example.json"
description = "Gerunds and infinitives"

# [datasets.remote]
# location = "${GAPFILL_DATA_HOST}/set01.json"
# chunking = "paragraph"

[narration]
preferred_voices = ["Kate", "Serena", "Karen", "Victoria"]
language = "en-GB"
rate = 0.9
pitch = 1.0
pause_ms = 400
"#;

const EXAMPLE_DATASET: &str = r#"{
  "sets": [
    {
      "id": 1,
      "title": "Likes and dislikes",
      "topic": "Verb + -ing",
      "sentences": [
        { "q": "I enjoy _____ in the morning.", "answer": "running", "pattern": "enjoy + -ing" },
        { "q": "He can't stand _____ for the bus.", "answer": "waiting", "pattern": "can't stand + -ing" }
      ]
    },
    {
      "id": 2,
      "title": "Plans",
      "topic": "Verb + to-infinitive",
      "sentences": [
        { "q": "They want _____ abroad next year.", "answer": "to study", "pattern": "want + to" },
        { "q": "She promised _____ us on Friday.", "answer": "to call", "pattern": "promise + to" }
      ]
    }
  ]
}
"#;
