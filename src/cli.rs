// Command-line surface: argument definitions and the top-level flow that
// ties configuration, the API client, the pipeline and the console together.

use crate::api::ApiClient;
use crate::config::{Overrides, SyncConfig};
use crate::request::SyncRequest;
use crate::sync::sync;
use crate::ui::{self, ConsoleObserver};
use anyhow::{Context, Result};
use clap::{crate_version, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use tracing::info;

pub fn app() -> Command {
    Command::new("gitdata-sync")
        .version(crate_version!())
        .about("Commit local files to a GitHub branch without a clone")
        .after_help(
            "Credentials come from GITHUB_TOKEN (or GH_TOKEN, or ~/.github_token).\n\
             The repository comes from --repo or GITHUB_REPOSITORY.",
        )
        .arg(
            Arg::new("files")
                .value_name("FILES")
                .help("Files to upload; relative paths keep their structure")
                .num_args(1..)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("message")
                .short('m')
                .long("message")
                .value_name("TEXT")
                .help("Commit message (default: \"Update files - <timestamp>\")"),
        )
        .arg(
            Arg::new("branch")
                .short('b')
                .long("branch")
                .value_name("NAME")
                .help("Branch to update (default: GITHUB_BRANCH or main)"),
        )
        .arg(
            Arg::new("repo")
                .short('r')
                .long("repo")
                .value_name("OWNER/NAME")
                .help("Target repository (default: GITHUB_REPOSITORY)"),
        )
        .arg(
            Arg::new("dir")
                .short('C')
                .long("dir")
                .value_name("DIR")
                .help("Resolve relative paths against DIR instead of the current directory")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("dry-run")
                .short('n')
                .long("dry-run")
                .help("Show where each file would go; no network calls")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log each remote call")
                .action(ArgAction::SetTrue),
        )
}

/// Run with already-parsed arguments. "Nothing to sync" is a success.
pub fn run(matches: &ArgMatches) -> Result<()> {
    let files: Vec<PathBuf> = matches
        .get_many::<PathBuf>("files")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();
    if files.is_empty() {
        app().print_help()?;
        println!();
        return Ok(());
    }

    let cwd = match matches.get_one::<PathBuf>("dir") {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to read current directory")?,
    };
    let message = matches.get_one::<String>("message").cloned();
    let request = SyncRequest::build(&files, &cwd, message);

    if matches.get_flag("dry-run") {
        ui::print_plan(&request.files, &request.skipped);
        return Ok(());
    }

    let overrides = Overrides {
        repo: matches.get_one::<String>("repo").cloned(),
        branch: matches.get_one::<String>("branch").cloned(),
    };
    // Missing credentials stop us here, before any request is made.
    let config = SyncConfig::from_env(&overrides)?;
    info!(owner = %config.owner, repo = %config.repo, branch = %config.branch, "target");

    let client = ApiClient::new(&config)?;
    let outcome = {
        let mut observer = ConsoleObserver::new();
        sync(&client, &config.branch, &request, &mut observer)?
    };
    ui::report(&outcome);
    Ok(())
}
