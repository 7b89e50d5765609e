//! Writes a few detections through a journal with a tiny size limit, so the
//! rotation from open to closed files can be watched on disk.
//!
//! ```text
//! RUST_LOG=debug cargo run -p demos --bin journal_demo -- /tmp/journal
//! ```

use event_journal::prelude::*;
use std::env;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let location = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| env::temp_dir().join("event-journal-demo"));

    let config = WriterConfig::new(&location, "Agent").with_max_file_size(300);
    let writer = Writer::with_config(config)?;
    info!(next_id = writer.next_id(), "writer ready");

    let detections = Subject::new("Detections")?;
    let processes = Subject::new("Processes")?;

    for round in 0..3u8 {
        let id = writer.insert(&detections, &[round; 64])?;
        info!(id, subject = %detections, "inserted detection");
        let id = writer.insert(&processes, &[round; 32])?;
        info!(id, subject = %processes, "inserted process event");
    }

    for subject in [&detections, &processes] {
        let dir = writer.subject_dir(subject);
        let mut names: Vec<String> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();

        println!("{}:", dir.display());
        for name in names {
            println!("  {name}");
        }
    }

    Ok(())
}
