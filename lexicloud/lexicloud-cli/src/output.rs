//! Terminal output helpers for the lexicloud CLI.

use crate::pipeline::{ArtifactOutcome, RunReport};
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use console::{style, StyledObject};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt::Display;

/// Outcome tag shown in front of a console line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Done,
    Failed,
    Skipped,
    Note,
}

impl Status {
    fn tag(self) -> StyledObject<&'static str> {
        match self {
            Self::Done => style("[done]").green(),
            Self::Failed => style("[fail]").red().bold(),
            Self::Skipped => style("[skip]").yellow(),
            Self::Note => style("[note]").dim(),
        }
    }
}

pub fn status_line(status: Status, msg: impl Display) -> String {
    format!("{} {}", status.tag(), msg)
}

/// Failures go to stderr, everything else to stdout
pub fn announce(status: Status, msg: impl Display) {
    match status {
        Status::Failed => eprintln!("{}", status_line(status, msg)),
        _ => println!("{}", status_line(status, msg)),
    }
}

fn section_line(title: impl Display) -> String {
    format!("\n{} {}", style("==").dim(), style(title).bold())
}

fn field_line(key: impl Display, value: impl Display) -> String {
    format!("   {:<20} {}", format!("{}:", key), value)
}

/// Progress bar for per-document extraction; length is set by the pipeline
pub fn progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Table of the heaviest keywords per document
pub fn keyword_table(report: &RunReport, per_document: usize) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Document").fg(Color::Cyan),
            Cell::new("Keywords").fg(Color::Cyan),
            Cell::new("Top terms").fg(Color::Cyan),
        ]);

    for (name, set) in &report.keyword_sets {
        let top: Vec<String> = set
            .iter()
            .take(per_document)
            .map(|e| format!("{} ({:.3})", e.term, e.weight))
            .collect();
        table.add_row(vec![
            Cell::new(name),
            Cell::new(set.len()),
            Cell::new(top.join(", ")),
        ]);
    }
    table
}

fn artifact_line(label: &str, artifact: &ArtifactOutcome) {
    match &artifact.result {
        Ok(count) => announce(
            Status::Done,
            format!("{} {} ({})", label, artifact.path.display(), count),
        ),
        Err(e) => announce(
            Status::Failed,
            format!("{} {} not written: {}", label, artifact.path.display(), e),
        ),
    }
}

/// Print the end-of-run summary
pub fn print_summary(run: &RunReport, verbose: bool) {
    println!("{}", section_line(format!("Keyword extraction ({})", run.method)));
    println!("{}", field_line("Documents found", run.documents_found));
    println!("{}", field_line("Documents loaded", run.documents_loaded));
    println!("{}", field_line("Distinct keywords", run.distinct_terms));

    if let Some(summary) = run.failure_summary() {
        announce(Status::Skipped, summary);
        for (name, reason) in &run.parse_failures {
            println!("{}", field_line(name, reason));
        }
    }
    if !run.unusable.is_empty() {
        announce(
            Status::Skipped,
            format!("No usable text: {}", run.unusable.join(", ")),
        );
    }
    for (name, reason) in &run.extraction_failures {
        announce(Status::Skipped, format!("Extraction failed for {}: {}", name, reason));
    }
    if !run.without_keywords.is_empty() {
        announce(
            Status::Note,
            format!("No keywords: {}", run.without_keywords.join(", ")),
        );
    }

    if verbose {
        println!("{}", keyword_table(run, 5));
    }

    println!("{}", section_line("Artifacts"));
    artifact_line("Word cloud", &run.image);
    artifact_line("Keyword report", &run.report);
}
