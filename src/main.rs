use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use adas_extractor::config::{validate_threshold, RunConfig};
use adas_extractor::document;
use adas_extractor::output;
use adas_extractor::parser::{extract_fields, segment};
use adas_extractor::pipeline::{self, progress_bar};
use adas_extractor::scoring::bert::{BertEmbedder, ModelSource};
use adas_extractor::scoring::{OutputRow, Scorer, DEFAULT_THRESHOLD};

#[derive(Parser)]
#[command(
    name = "adas_extractor",
    about = "Extract driver-assistance functions from a customer function specification"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment, score and write the relevant functions to a table (.xlsx, .json, .sqlite/.db)
    Run {
        /// Specification document (.pdf, or .txt with already-extracted text)
        #[arg(short, long)]
        input: PathBuf,
        /// Output table; the extension selects the format
        #[arg(short, long)]
        output: PathBuf,
        /// Minimum semantic score for a function to be kept (may be negative)
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD, allow_negative_numbers = true)]
        threshold: f64,
    },
    /// List the function blocks found in a document (no scoring)
    Blocks {
        #[arg(short, long)]
        input: PathBuf,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
    /// Show every block's score against the threshold, highest first
    Score {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD, allow_negative_numbers = true)]
        threshold: f64,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            input,
            output,
            threshold,
        } => {
            let cfg = RunConfig::new(input, output, threshold)?;
            run(&cfg)
        }
        Commands::Blocks { input, limit } => {
            let text = document::extract_text(&input)?;
            let blocks = segment(&text);
            if blocks.is_empty() {
                println!("No function headings found.");
                return Ok(());
            }

            println!(
                "{:>3} | {:<6} | {:<32} | {:<20} | {:>5} | {:<10} | {:<12} | {:<16}",
                "#", "No.", "Title", "Function ID", "Lines", "Code", "Domain", "Owner"
            );
            println!("{}", "-".repeat(124));

            for (i, b) in blocks.iter().take(limit).enumerate() {
                let fields = extract_fields(&b.body);
                let lines = if b.body.is_empty() { 0 } else { b.body.lines().count() };
                println!(
                    "{:>3} | {:<6} | {:<32} | {:<20} | {:>5} | {:<10} | {:<12} | {:<16}",
                    i + 1,
                    b.number,
                    truncate(&b.title, 32),
                    truncate(&b.function_id, 20),
                    lines,
                    truncate(&fields.function_code, 10),
                    truncate(&fields.domain, 12),
                    truncate(&fields.owner_team, 16),
                );
            }

            println!("\n{} blocks", blocks.len());
            Ok(())
        }
        Commands::Score {
            input,
            threshold,
            limit,
        } => {
            let threshold = validate_threshold(threshold)?;
            let text = document::extract_text(&input)?;
            let blocks = segment(&text);
            if blocks.is_empty() {
                println!("No function headings found.");
                return Ok(());
            }

            let embedder = BertEmbedder::load(&ModelSource::default_model())?;
            let scorer = Scorer::adas(&embedder);

            let pb = progress_bar(blocks.len());
            let mut scored = Vec::with_capacity(blocks.len());
            for b in &blocks {
                scored.push((scorer.score(&b.body)?, b));
                pb.inc(1);
            }
            pb.finish_and_clear();
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));

            println!("{:>3} | {:>6} | {:<4} | {:<20} | {:<40}", "#", "Score", "Keep", "Function ID", "Title");
            println!("{}", "-".repeat(85));
            for (i, (score, b)) in scored.iter().take(limit).enumerate() {
                let keep = if f64::from(*score) >= threshold { "yes" } else { "no" };
                println!(
                    "{:>3} | {:>6.3} | {:<4} | {:<20} | {:<40}",
                    i + 1,
                    score,
                    keep,
                    truncate(&b.function_id, 20),
                    truncate(&b.title, 40),
                );
            }

            let kept = scored.iter().filter(|(s, _)| f64::from(*s) >= threshold).count();
            println!("\n{} of {} blocks at or above {}", kept, scored.len(), threshold);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn run(cfg: &RunConfig) -> anyhow::Result<()> {
    let text = document::extract_text(&cfg.input)?;

    let embedder = BertEmbedder::load(&cfg.model)
        .with_context(|| format!("loading embedding model for {}", cfg.input.display()))?;
    let scorer = Scorer::adas(&embedder);

    let outcome = pipeline::process_document(&text, &scorer, cfg.threshold)?;
    let rows: Vec<OutputRow> = outcome.records.iter().map(|r| r.to_row()).collect();
    output::write_table(&rows, &cfg.output)?;

    println!(
        "Kept {} of {} functions (threshold {}). Wrote {:?} table: {}",
        rows.len(),
        outcome.blocks_seen,
        cfg.threshold,
        cfg.output_format,
        cfg.output.display()
    );
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn negative_threshold_accepted() {
        let cli = Cli::try_parse_from(["adas_extractor", "run", "-i", "spec.pdf", "-o", "out.xlsx", "-t", "-0.2"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { threshold, .. } if threshold == -0.2));

        let cli = Cli::try_parse_from(["adas_extractor", "score", "-i", "spec.pdf", "--threshold", "-1"]).unwrap();
        assert!(matches!(cli.command, Commands::Score { threshold, .. } if threshold == -1.0));
    }

    #[test]
    fn run_takes_no_model_option() {
        assert!(Cli::try_parse_from(["adas_extractor", "run", "-i", "a.pdf", "-o", "b.json", "--model", "x"]).is_err());
        let cli = Cli::try_parse_from(["adas_extractor", "run", "-i", "a.pdf", "-o", "b.json"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { threshold, .. } if threshold == DEFAULT_THRESHOLD));
    }
}
