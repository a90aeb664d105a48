//! Word completion over the command line.
//!
//! ```text
//! word-completion "fn main() {\n    le"
//! word-completion --channel smart "let counter = count + cou"
//! word-completion --channel class_name --limit 1 "let m: Hash"
//! ```

mod query;
mod registrants;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use quill::prelude::*;

use crate::query::WordQuery;
use crate::registrants::{BufferWords, Dictionary, Keywords, TypeNames};

const DICTIONARY: &[&str] = &[
    "buffer", "channel", "collector", "complete", "completion", "context", "dispatch", "letter",
    "level", "lever", "place", "priority", "provider", "query", "registry", "result", "snapshot",
];

#[derive(Parser, Debug)]
#[command(name = "word-completion", about = "Complete the word before the cursor")]
struct Cli {
    /// Text to complete
    text: String,

    /// Byte offset of the cursor (defaults to the end of the text)
    #[arg(long)]
    offset: Option<usize>,

    /// Channel to dispatch on: basic, smart or class_name
    #[arg(short, long, default_value = "basic")]
    channel: String,

    /// Maximum number of results, overriding the configuration
    #[arg(short, long)]
    limit: Option<usize>,

    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print registry statistics after bootstrap
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut builder = CompletionService::builder()
        .registrant(Keywords)
        .registrant(Dictionary::new(DICTIONARY.iter().copied()))
        .registrant(BufferWords)
        .registrant(TypeNames)
        .init_logging();
    if let Some(path) = &cli.config {
        builder = builder.config_file(path);
    }
    let service = builder.build().context("failed to build completion service")?;
    service.bootstrap().context("failed to bootstrap providers")?;

    if cli.stats {
        println!("{}", service.stats());
    }

    let text = cli.text.replace("\\n", "\n");
    let query = match cli.offset {
        Some(offset) => WordQuery::at(text, offset),
        None => WordQuery::at_end(text),
    };

    let channel = Channel::new(cli.channel);
    let mut collector = service.collector(&channel);
    if let Some(limit) = cli.limit {
        collector = collector.limit(Some(limit));
    }

    info!(channel = %channel, prefix = query.prefix(), "Completing");
    let summary = service.complete_with(&channel, &query, &mut collector).await?;

    for item in collector.results() {
        println!("{item}");
    }
    println!(
        "-- {} result(s) on {}: {} place(s) evaluated, {} provider(s) invoked, {}",
        collector.len(),
        summary.channel,
        summary.evaluated,
        summary.invoked,
        summary.stop,
    );

    Ok(())
}
