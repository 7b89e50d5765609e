//! Prints what the writer knows about a journal file, optionally pruning a
//! truncated tail first.
//!
//! ```text
//! cargo run -p demos --bin inspect_file -- <file.bin> [--prune]
//! ```

use event_journal::prelude::*;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let mut args = env::args().skip(1);
    let Some(path) = args.next().map(PathBuf::from) else {
        eprintln!("usage: inspect_file <file.bin> [--prune]");
        return ExitCode::from(2);
    };
    let prune = args.any(|arg| arg == "--prune");

    if prune {
        match prune_truncated_events(&path) {
            Ok(outcome) => info!(?outcome, path = %path.display(), "prune finished"),
            Err(e) => {
                error!(error = %e, "prune failed");
                return ExitCode::FAILURE;
            }
        }
    }

    match inspect_file(&path, None, ScanLogging::Warn) {
        Ok(Inspection::Valid(info)) => {
            let rendered = info
                .to_json()
                .ok()
                .and_then(|json| serde_json::from_str::<serde_json::Value>(&json).ok())
                .and_then(|value| serde_json::to_string_pretty(&value).ok());
            match rendered {
                Some(text) => println!("{text}"),
                None => println!("{info:#?}"),
            }
            ExitCode::SUCCESS
        }
        Ok(Inspection::CorruptHeader(err)) => {
            println!("corrupt header: {err}");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "cannot read journal file");
            ExitCode::FAILURE
        }
    }
}
