// Library root
// -----------
// This crate commits local files to a GitHub branch by talking to the Git
// Data REST API directly. The binary (`main.rs`) only sets up logging and
// hands the parsed arguments to `cli::run`.
//
// Module responsibilities:
// - `config`: credential and repository coordinates, resolved once.
// - `request`: local inputs, their repository paths and the commit message.
// - `api`: the `GitData` trait and its blocking HTTP implementation.
// - `sync`: the commit pipeline (`CommitBuilder`) and its observer hooks.
// - `ui`: console narration for a run.
// - `cli`: argument definitions and the top-level flow.
//
// The pipeline only depends on `GitData` and `SyncObserver`, so it can be
// driven against an in-memory remote with no output at all.
pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod request;
pub mod sync;
pub mod ui;

pub use api::{ApiClient, GitData, TreeEntry};
pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use request::{SkipReason, SkippedFile, SyncRequest};
pub use sync::{sync, CommitBuilder, CommitSummary, Silent, Stage, SyncObserver, SyncOutcome, UploadedFile};
