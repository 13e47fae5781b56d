// UI layer: console narration for a sync run. The pipeline itself never
// prints; this observer turns its callbacks into a spinner and a few lines
// of colored output.

use crate::request::{FileSpec, SkippedFile};
use crate::sync::{CommitSummary, Stage, SyncObserver, SyncOutcome, UploadedFile};
use crossterm::style::Stylize;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Short form of an object id for display.
pub fn short(sha: &str) -> &str {
    sha.get(..7).unwrap_or(sha)
}

/// Observer that drives an `indicatif` spinner while the pipeline runs.
pub struct ConsoleObserver {
    spinner: ProgressBar,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        // The spinner draws to stderr and stays hidden when that is
        // not a terminal.
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        ConsoleObserver { spinner }
    }

    fn line(&self, text: String) {
        self.spinner.suspend(|| println!("{}", text));
    }
}

impl Drop for ConsoleObserver {
    fn drop(&mut self) {
        if !self.spinner.is_finished() {
            self.spinner.finish_and_clear();
        }
    }
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncObserver for ConsoleObserver {
    fn stage(&mut self, stage: Stage) {
        match stage {
            Stage::Start => {
                self.spinner.enable_steady_tick(Duration::from_millis(100));
                self.spinner.set_message("Reading branch...");
            }
            Stage::RefRead => self.spinner.set_message("Resolving base tree..."),
            Stage::TreeResolved => self.spinner.set_message("Uploading files..."),
            Stage::BlobsUploaded => self.spinner.set_message("Writing tree..."),
            Stage::TreeWritten => self.spinner.set_message("Writing commit..."),
            Stage::CommitWritten => self.spinner.set_message("Updating branch..."),
            Stage::RefUpdated | Stage::Abandoned | Stage::Failed => self.spinner.finish_and_clear(),
        }
    }

    fn skipped(&mut self, file: &SkippedFile) {
        self.line(format!(
            "{} {} ({})",
            "skip".yellow(),
            file.input.display(),
            file.reason
        ));
    }

    fn uploaded(&mut self, file: &UploadedFile) {
        self.line(format!("{} {} {}", "blob".cyan(), short(&file.blob), file.remote));
    }
}

/// Final report printed after the pipeline returns.
pub fn report(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::NothingToSync { .. } => {
            println!("{}", "Nothing to sync: none of the given files could be uploaded.".yellow());
        }
        SyncOutcome::Committed(summary) => print_summary(summary),
    }
}

fn print_summary(summary: &CommitSummary) {
    println!(
        "{} {} file(s) to {} ({} -> {})",
        "Committed".green().bold(),
        summary.files.len(),
        summary.branch,
        short(&summary.parent),
        short(&summary.commit),
    );
    if !summary.skipped.is_empty() {
        println!("{} {} file(s) skipped", "note:".yellow(), summary.skipped.len());
    }
}

/// Dry-run listing: where each file would land, and what would be skipped.
pub fn print_plan(files: &[FileSpec], skipped: &[SkippedFile]) {
    for f in files {
        println!("{} -> {}", f.input.display(), f.remote);
    }
    for s in skipped {
        println!("{} {} ({})", "skip".yellow(), s.input.display(), s.reason);
    }
    if files.is_empty() {
        println!("{}", "Nothing to sync.".yellow());
    }
}
