// The commit pipeline. Each step feeds the next; the first failure ends the
// run. Presentation is left to a `SyncObserver` supplied by the caller.

use crate::api::{GitData, TreeEntry};
use crate::error::{Result, SyncError};
use crate::request::{FileSpec, SkipReason, SkippedFile, SyncRequest};
use tracing::{info, warn};

/// Pipeline position, reported to the observer as each step completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    RefRead,
    TreeResolved,
    BlobsUploaded,
    TreeWritten,
    CommitWritten,
    RefUpdated,
    /// Every file vanished before upload; ends the run without a commit.
    Abandoned,
    Failed,
}

/// A file that reached the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub remote: String,
    pub blob: String,
}

#[derive(Debug, Clone)]
pub struct CommitSummary {
    pub branch: String,
    pub parent: String,
    pub base_tree: String,
    pub tree: String,
    pub commit: String,
    pub files: Vec<UploadedFile>,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Clone)]
pub enum SyncOutcome {
    /// No input survived; nothing was sent to the remote.
    NothingToSync { skipped: Vec<SkippedFile> },
    Committed(CommitSummary),
}

/// Hooks for narrating a run. All methods default to doing nothing.
pub trait SyncObserver {
    fn stage(&mut self, _stage: Stage) {}
    fn skipped(&mut self, _file: &SkippedFile) {}
    fn uploaded(&mut self, _file: &UploadedFile) {}
}

/// Observer that ignores everything.
pub struct Silent;

impl SyncObserver for Silent {}

/// Drives one request through the remote, producing a single commit on
/// `branch`.
pub struct CommitBuilder<'a, G: GitData + ?Sized> {
    remote: &'a G,
    branch: &'a str,
}

impl<'a, G: GitData + ?Sized> CommitBuilder<'a, G> {
    pub fn new(remote: &'a G, branch: &'a str) -> Self {
        CommitBuilder { remote, branch }
    }

    /// Run the whole pipeline. Skipped inputs are reported first; if none
    /// remain, the remote is never contacted.
    pub fn run(&self, request: &SyncRequest, observer: &mut dyn SyncObserver) -> Result<SyncOutcome> {
        for skip in &request.skipped {
            warn!(path = %skip.input.display(), reason = %skip.reason, "skipping");
            observer.skipped(skip);
        }
        if request.is_empty() {
            info!("nothing to sync");
            return Ok(SyncOutcome::NothingToSync {
                skipped: request.skipped.clone(),
            });
        }

        observer.stage(Stage::Start);
        self.steps(request, observer).map_err(|e| {
            observer.stage(Stage::Failed);
            e
        })
    }

    fn steps(&self, request: &SyncRequest, observer: &mut dyn SyncObserver) -> Result<SyncOutcome> {
        let parent = self.remote.branch_head(self.branch)?;
        info!(branch = self.branch, %parent, "branch read");
        observer.stage(Stage::RefRead);

        let base_tree = self.remote.commit_tree(&parent)?;
        info!(%base_tree, "base tree resolved");
        observer.stage(Stage::TreeResolved);

        let mut files = Vec::with_capacity(request.files.len());
        let mut skipped = request.skipped.clone();
        for spec in &request.files {
            match self.upload(spec) {
                Ok(uploaded) => {
                    observer.uploaded(&uploaded);
                    files.push(uploaded);
                }
                // Removed after the request was built: same policy as a
                // file that was never there.
                Err(SyncError::LocalFileMissing(path)) => {
                    warn!(path = %path.display(), "file disappeared before upload, skipping");
                    let skip = SkippedFile {
                        input: spec.input.clone(),
                        reason: SkipReason::Missing,
                    };
                    observer.skipped(&skip);
                    skipped.push(skip);
                }
                Err(e) => return Err(e),
            }
        }
        if files.is_empty() {
            info!("nothing left to sync after uploads");
            observer.stage(Stage::Abandoned);
            return Ok(SyncOutcome::NothingToSync { skipped });
        }
        observer.stage(Stage::BlobsUploaded);

        let entries: Vec<TreeEntry> = files.iter().map(|f| TreeEntry::blob(&f.remote, &f.blob)).collect();
        let tree = self.remote.create_tree(&base_tree, &entries)?;
        info!(%tree, "tree written");
        observer.stage(Stage::TreeWritten);

        let commit = self
            .remote
            .create_commit(&request.message, &tree, std::slice::from_ref(&parent))?;
        info!(%commit, "commit written");
        observer.stage(Stage::CommitWritten);

        // Never forced: a moved branch surfaces as SyncError::Conflict.
        self.remote.update_branch(self.branch, &commit, false)?;
        info!(branch = self.branch, %commit, "branch updated");
        observer.stage(Stage::RefUpdated);

        Ok(SyncOutcome::Committed(CommitSummary {
            branch: self.branch.to_string(),
            parent,
            base_tree,
            tree,
            commit,
            files,
            skipped,
        }))
    }

    fn upload(&self, spec: &FileSpec) -> Result<UploadedFile> {
        let bytes = std::fs::read(&spec.local).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => SyncError::LocalFileMissing(spec.local.clone()),
            _ => SyncError::Io {
                path: spec.local.clone(),
                source,
            },
        })?;
        let blob = self.remote.create_blob(&bytes)?;
        info!(remote = %spec.remote, %blob, "blob created");
        Ok(UploadedFile {
            remote: spec.remote.clone(),
            blob,
        })
    }
}

/// Convenience wrapper: build a `CommitBuilder` and run it.
pub fn sync<G: GitData + ?Sized>(
    remote: &G,
    branch: &str,
    request: &SyncRequest,
    observer: &mut dyn SyncObserver,
) -> Result<SyncOutcome> {
    CommitBuilder::new(remote, branch).run(request, observer)
}
