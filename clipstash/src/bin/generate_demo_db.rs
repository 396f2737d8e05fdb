//! Generate a demo clipboard history for trying out listing, search and retention.
//!
//! Records are backdated over the last 60 days with varying occurrence counts,
//! and file records get real saved copies next to the database.
//!
//! Usage:
//!     cargo run --release --bin generate-demo-db [data_dir]
//!
//! Default data_dir: ./demo-data

use anyhow::{Context, Result};
use chrono::Duration;
use clipstash::config::DataLocation;
use clipstash::content_detection::detect_file_category;
use clipstash::database::Database;
use clipstash::models::{hash_text, now_local, saved_file_name, NewFileRecord};
use rand::Rng;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Number of distinct text records
const NUM_TEXTS: usize = 400;

/// Number of distinct file records
const NUM_FILES: usize = 40;

/// Records are spread over this many days
const MAX_AGE_DAYS: i64 = 60;

const SNIPPETS: &[&str] = &[
    "git log --oneline --graph --decorate",
    "SELECT id, content FROM text_records ORDER BY timestamp DESC LIMIT 20;",
    "https://doc.rust-lang.org/std/collections/struct.HashMap.html",
    "Meeting moved to Thursday 14:00, room 3B",
    "let mut file = File::open(path)?;",
    "kubectl get pods -n staging",
    "Thanks, I'll take a look this afternoon.",
    "export RUST_LOG=debug",
];

const WORDS: &[&str] = &[
    "invoice", "report", "draft", "budget", "notes", "summary", "roadmap", "release",
    "config", "backup", "schedule", "review", "photo", "design", "contract", "sketch",
];

const FILE_NAMES: &[&str] = &[
    "notes.txt", "slides.pptx", "budget.xlsx", "screenshot.png", "paper.pdf",
    "recording.mp3", "clip.mp4", "backup.zip", "readme.md", "unknown.bin",
];

fn generate_text(rng: &mut impl Rng, index: usize) -> String {
    if rng.gen_bool(0.3) {
        let snippet = SNIPPETS[rng.gen_range(0..SNIPPETS.len())];
        return format!("{} #{}", snippet, index);
    }
    let count = rng.gen_range(3..=40);
    let words: Vec<&str> = (0..count).map(|_| WORDS[rng.gen_range(0..WORDS.len())]).collect();
    format!("{} {}", words.join(" "), index)
}

fn main() -> Result<()> {
    let root = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("demo-data"));
    let location = DataLocation::new(&root);

    if location.database_path.exists() {
        fs::remove_file(&location.database_path)
            .with_context(|| format!("removing {}", location.database_path.display()))?;
    }
    fs::create_dir_all(&location.files_dir)
        .with_context(|| format!("creating {}", location.files_dir.display()))?;

    println!("Generating demo clipboard history...");
    println!("Output: {}", location.root.display());

    let db = Database::open(&location.database_path).context("opening demo database")?;
    let mut rng = rand::thread_rng();
    let now = now_local();
    let mut occurrences = 0u64;

    for i in 0..NUM_TEXTS {
        let text = generate_text(&mut rng, i);
        let repeats = if rng.gen_bool(0.2) { rng.gen_range(2..=6) } else { 1 };
        for _ in 0..repeats {
            let age = Duration::minutes(rng.gen_range(0..MAX_AGE_DAYS * 24 * 60));
            db.upsert_text(&text, now - age)?;
            occurrences += 1;
        }
    }

    let mut total_bytes = 0u64;
    for i in 0..NUM_FILES {
        let template = FILE_NAMES[i % FILE_NAMES.len()];
        let filename = format!("{}_{}", i, template);
        let body = format!("demo file {} generated at {}\n", filename, now);
        let content_hash = hash_text(&body);
        let category = detect_file_category(filename.as_ref());
        let age = Duration::minutes(rng.gen_range(0..MAX_AGE_DAYS * 24 * 60));

        let saved_dir = location
            .files_dir
            .join(category.as_str())
            .join((now - age).format("%Y-%m-%d").to_string());
        fs::create_dir_all(&saved_dir)?;
        let saved_path = saved_dir.join(saved_file_name(&filename, &content_hash));
        fs::write(&saved_path, &body)?;

        let record = NewFileRecord {
            original_path: PathBuf::from("/home/demo/Documents").join(&filename),
            saved_path,
            filename,
            file_size: body.len() as u64,
            file_type_category: category,
            content_hash,
        };
        db.upsert_file(&record, now - age)?;
        total_bytes += record.file_size;
    }

    let stats = db.statistics()?;
    println!();
    println!("Database created: {}", location.database_path.display());
    println!("  Text records: {} ({} captures)", stats.text_count, occurrences);
    println!("  File records: {} ({} bytes)", stats.file_count, total_bytes);
    Ok(())
}
