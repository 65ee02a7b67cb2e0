use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use pageobject_gen::{chunker, fetch, generator, merger, Grammar, PromptFlowClient, Settings};

#[derive(Parser)]
#[command(name = "pageobject_gen", about = "Build one Ruby PageObject class from a web page")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a page, generate code per chunk and merge it into one class
    Run {
        /// Page to describe
        #[arg(long)]
        url: String,
        /// Class name (default: derived from the URL host)
        #[arg(long)]
        name: Option<String>,
        /// Max whitespace-delimited units per chunk
        #[arg(short = 'l', long)]
        limit: Option<usize>,
        /// Merged class output
        #[arg(short, long, default_value = "pageobject.rb")]
        out: PathBuf,
        /// Raw concatenation of every generated fragment
        #[arg(long, default_value = "combined_pageobject.rb")]
        combined: PathBuf,
    },
    /// Split a local HTML file into chunks and print a summary
    Chunk {
        #[arg(short, long)]
        input: PathBuf,
        /// Max whitespace-delimited units per chunk
        #[arg(short = 'l', long)]
        limit: Option<usize>,
    },
    /// Merge a file of concatenated fragments into one class
    Merge {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        name: String,
        /// Output file (default: stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load()?;

    let result = match cli.command {
        Commands::Run {
            url,
            name,
            limit,
            out,
            combined,
        } => {
            let grammar = settings.grammar()?;
            let (endpoint, api_key) = settings.credentials()?;
            let http = fetch::http_client(&settings)?;

            let html = fetch::fetch_html(&http, &url).await?;
            let chunks = chunker::chunk(&html, limit.unwrap_or(settings.unit_limit));
            println!("Total chunks created: {}", chunks.len());

            let client = Arc::new(PromptFlowClient::new(http, endpoint, api_key));
            let fragments = generator::generate_all(client, chunks, settings.concurrency).await;
            let empty = fragments.iter().filter(|f| f.is_empty()).count();
            if empty > 0 {
                println!("{} of {} chunks produced no code", empty, fragments.len());
            }

            let raw = generator::combine(&fragments);
            write_file(&combined, &raw)?;
            println!("Combined fragments saved to {}", combined.display());

            let name = name.unwrap_or_else(|| fetch::class_name_for(&url));
            let merged = merge_text(&raw, &name, &grammar, Some(out.as_path()))?;
            println!("Class {} ({} lines) saved to {}", name, merged.lines().count(), out.display());
            Ok(())
        }
        Commands::Chunk { input, limit } => {
            let html = read_file(&input)?;
            let limit = limit.unwrap_or(settings.unit_limit);
            let chunks = chunker::chunk_document(&html, limit);
            if chunks.is_empty() {
                println!("No content in <body>.");
                return Ok(());
            }

            println!("{:>3} | {:>6} | {:>8} |", "#", "Units", "Elements");
            println!("{}", "-".repeat(25));
            for c in &chunks {
                println!(
                    "{:>3} | {:>6} | {:>8} |{}",
                    c.index + 1,
                    c.units,
                    c.elements,
                    if c.oversized { " oversized" } else { "" }
                );
            }
            println!("\n{} chunks (limit {} units)", chunks.len(), limit);
            Ok(())
        }
        Commands::Merge { input, name, out } => {
            let grammar = settings.grammar()?;
            let raw = read_file(&input)?;
            let merged = merge_text(&raw, &name, &grammar, out.as_deref())?;
            match out {
                Some(path) => println!("Class {} saved to {}", name, path.display()),
                None => println!("{}", merged),
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        info!("Done in {:.1}s", elapsed.as_secs_f64());
    }

    result
}

/// Merge `raw` and optionally persist it. Returns the merged text.
fn merge_text(raw: &str, name: &str, grammar: &Grammar, out: Option<&Path>) -> Result<String> {
    let block = merger::merge_with(raw, name, grammar);
    info!(
        "Merged {} accessors, {} methods, {} leftover lines",
        block.accessors.len(),
        block.procedures.len(),
        block.leftovers.len()
    );
    let text = block.to_string();
    if let Some(path) = out {
        write_file(path, &text)?;
    }
    Ok(text)
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}
