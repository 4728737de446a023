//! Lexbeam constraint preparation tool.
//!
//! Reads tab-delimited lines on stdin (`text TAB phrase TAB phrase ...`)
//! and writes one JSON record per line for a constrained decoder driver:
//!
//! ```text
//! echo -e "Das ist ein Test .\tThis is\ttest" | lexbeam-cli
//! { "text": "Das ist ein Test .", "constraints": ["This is", "test"] }
//! ```
//!
//! With `--avoid`, phrases are emitted as negative constraints under the
//! `avoid` key instead. Apply all preprocessing (tokenization, BPE) to
//! both the text and the phrases before this step; the search core itself
//! only ever receives pre-tokenized id sequences.

use std::io::{self, BufRead, Write};

use clap::Parser;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lexbeam-cli", about = "Convert tab-delimited constraint lines to JSON records")]
struct Cli {
    /// Emit phrases as negative (avoid) constraints instead of positive ones
    #[arg(long)]
    avoid: bool,
}

#[derive(Serialize)]
struct ConstraintRecord {
    text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    constraints: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    avoid: Vec<String>,
}

fn parse_line(line: &str, avoid: bool) -> ConstraintRecord {
    let mut fields = line.split('\t');
    let text = fields.next().unwrap_or_default().to_string();
    let phrases: Vec<String> = fields.map(str::to_string).collect();
    if avoid {
        ConstraintRecord {
            text,
            constraints: Vec::new(),
            avoid: phrases,
        }
    } else {
        ConstraintRecord {
            text,
            constraints: phrases,
            avoid: Vec::new(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    let mut lines = 0usize;
    for line in stdin.lock().lines() {
        let line = line?;
        let record = parse_line(line.trim_end(), cli.avoid);
        serde_json::to_writer(&mut stdout, &record)?;
        writeln!(stdout)?;
        lines += 1;
    }
    debug!(lines, "constraint records written");

    Ok(())
}
