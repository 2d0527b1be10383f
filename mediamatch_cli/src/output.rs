//! Scan result rendering.

use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use mediamatch_core::{ItemState, ScanQueueItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub fn render(items: &[ScanQueueItem], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => render_json(items),
        OutputFormat::Text => {
            render_text(items);
            Ok(())
        }
    }
}

fn render_json(items: &[ScanQueueItem]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(items)?);
    Ok(())
}

fn render_text(items: &[ScanQueueItem]) {
    let mut matched = 0usize;
    let mut uncertain = 0usize;
    let mut errored = 0usize;
    let mut skipped = 0usize;

    for item in items {
        match item.state {
            ItemState::AutoMatched | ItemState::Manual | ItemState::Accepted => {
                matched += 1;
                println!(
                    "{} {} {}",
                    "✓".green(),
                    file_name(item),
                    describe_match(item).dimmed()
                );
            }
            ItemState::Uncertain => {
                uncertain += 1;
                println!(
                    "{} {} {}",
                    "?".yellow(),
                    file_name(item),
                    describe_match(item).dimmed()
                );
                if let Some(result) = &item.match_result {
                    for alt in result.alternatives.iter().take(3) {
                        let year = alt
                            .year
                            .map(|y| format!(" ({})", y))
                            .unwrap_or_default();
                        println!("    candidate: {}{}", alt.title, year);
                    }
                }
            }
            ItemState::Error => {
                errored += 1;
                let detail = item
                    .match_result
                    .as_ref()
                    .and_then(|r| r.error_detail.as_deref())
                    .unwrap_or("unknown error");
                println!("{} {} {}", "✗".red(), file_name(item), detail.red());
            }
            ItemState::Skipped => {
                skipped += 1;
                println!("{} {}", "-".dimmed(), file_name(item).dimmed());
            }
            ItemState::Pending => {
                println!("{} {}", "…".dimmed(), file_name(item).dimmed());
            }
        }
    }

    println!();
    println!(
        "{}: {} matched, {} need review, {} errors, {} skipped ({} total)",
        "Summary".bold(),
        matched.to_string().green(),
        uncertain.to_string().yellow(),
        errored.to_string().red(),
        skipped,
        items.len()
    );
}

fn file_name(item: &ScanQueueItem) -> String {
    item.identity
        .raw_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| item.identity.raw_path.display().to_string())
}

fn describe_match(item: &ScanQueueItem) -> String {
    let Some(result) = &item.match_result else {
        return String::new();
    };
    match &result.chosen {
        Some(candidate) => {
            let year = candidate
                .year
                .map(|y| format!(" ({})", y))
                .unwrap_or_default();
            format!(
                "→ {}{} [{:.0}%]",
                candidate.title,
                year,
                result.confidence * 100.0
            )
        }
        None => String::new(),
    }
}
