#![allow(dead_code)]

// In-memory stand-in for the Git Data API. Objects are content addressed the
// way git does it, so identical content yields identical ids.

use gitdata_sync::{GitData, Result, SkippedFile, Stage, SyncError, SyncObserver, TreeEntry, UploadedFile};
use sha1::{Digest, Sha1};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    BranchHead(String),
    CommitTree(String),
    CreateBlob,
    CreateTree,
    CreateCommit,
    UpdateBranch { branch: String, commit: String, force: bool },
}

#[derive(Debug, Clone)]
pub struct Commit {
    pub tree: String,
    pub parents: Vec<String>,
    pub message: String,
}

#[derive(Default)]
struct State {
    blobs: HashMap<String, Vec<u8>>,
    trees: HashMap<String, BTreeMap<String, String>>,
    commits: HashMap<String, Commit>,
    refs: HashMap<String, String>,
    calls: Vec<Call>,
    counter: u64,
}

pub struct FakeRemote {
    state: RefCell<State>,
    /// When set, another writer pushes to the branch right after our commit
    /// is created.
    pub race_on_commit: Cell<bool>,
    /// When set, every call fails with 401.
    pub deny: Cell<bool>,
}

pub fn object_id(kind: &str, data: &[u8]) -> String {
    let mut h = Sha1::new();
    h.update(format!("{} {}\0", kind, data.len()));
    h.update(data);
    format!("{:x}", h.finalize())
}

impl FakeRemote {
    /// A repository whose `branch` holds one commit containing `files`.
    pub fn with_branch(branch: &str, files: &[(&str, &[u8])]) -> Self {
        let remote = FakeRemote {
            state: RefCell::new(State::default()),
            race_on_commit: Cell::new(false),
            deny: Cell::new(false),
        };
        {
            let mut st = remote.state.borrow_mut();
            let mut tree = BTreeMap::new();
            for (path, content) in files {
                let id = store_blob(&mut st, content);
                tree.insert(path.to_string(), id);
            }
            let tree_id = store_tree(&mut st, tree);
            let commit = store_commit(&mut st, &tree_id, vec![], "initial");
            st.refs.insert(branch.to_string(), commit);
        }
        remote
    }

    pub fn head(&self, branch: &str) -> Option<String> {
        self.state.borrow().refs.get(branch).cloned()
    }

    pub fn commit(&self, id: &str) -> Commit {
        self.state.borrow().commits[id].clone()
    }

    /// Path → blob id for the tree of `commit`.
    pub fn tree_of(&self, commit: &str) -> BTreeMap<String, String> {
        let st = self.state.borrow();
        let tree = &st.commits[commit].tree;
        st.trees[tree].clone()
    }

    pub fn blob(&self, id: &str) -> Vec<u8> {
        self.state.borrow().blobs[id].clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Simulate a concurrent push: a new commit on top of the branch.
    pub fn push_foreign_commit(&self, branch: &str) -> String {
        let mut st = self.state.borrow_mut();
        let head = st.refs[branch].clone();
        let tree = st.commits[&head].tree.clone();
        let mut entries = st.trees[&tree].clone();
        let blob = store_blob(&mut st, b"someone else");
        entries.insert("other.txt".into(), blob);
        let tree = store_tree(&mut st, entries);
        let commit = store_commit(&mut st, &tree, vec![head], "concurrent push");
        st.refs.insert(branch.to_string(), commit.clone());
        commit
    }

    fn record(&self, call: Call) -> Result<()> {
        self.state.borrow_mut().calls.push(call);
        if self.deny.get() {
            return Err(SyncError::Auth {
                status: 401,
                detail: "Bad credentials".into(),
            });
        }
        Ok(())
    }
}

fn store_blob(st: &mut State, content: &[u8]) -> String {
    let id = object_id("blob", content);
    st.blobs.insert(id.clone(), content.to_vec());
    id
}

fn store_tree(st: &mut State, entries: BTreeMap<String, String>) -> String {
    let mut body = Vec::new();
    for (path, sha) in &entries {
        body.extend_from_slice(format!("100644 {}\0{}\n", path, sha).as_bytes());
    }
    let id = object_id("tree", &body);
    st.trees.insert(id.clone(), entries);
    id
}

fn store_commit(st: &mut State, tree: &str, parents: Vec<String>, message: &str) -> String {
    st.counter += 1;
    let mut body = format!("tree {}\n", tree);
    for p in &parents {
        body.push_str(&format!("parent {}\n", p));
    }
    body.push_str(&format!("time {}\n\n{}", st.counter, message));
    let id = object_id("commit", body.as_bytes());
    st.commits.insert(
        id.clone(),
        Commit {
            tree: tree.to_string(),
            parents,
            message: message.to_string(),
        },
    );
    id
}

fn unprocessable(detail: &str) -> SyncError {
    SyncError::Api {
        status: 422,
        detail: detail.to_string(),
    }
}

impl GitData for FakeRemote {
    fn branch_head(&self, branch: &str) -> Result<String> {
        self.record(Call::BranchHead(branch.to_string()))?;
        self.head(branch)
            .ok_or_else(|| SyncError::NotFound(format!("branch `{}`", branch)))
    }

    fn commit_tree(&self, commit: &str) -> Result<String> {
        self.record(Call::CommitTree(commit.to_string()))?;
        let st = self.state.borrow();
        st.commits
            .get(commit)
            .map(|c| c.tree.clone())
            .ok_or_else(|| SyncError::NotFound(format!("commit {}", commit)))
    }

    fn create_blob(&self, content: &[u8]) -> Result<String> {
        self.record(Call::CreateBlob)?;
        Ok(store_blob(&mut self.state.borrow_mut(), content))
    }

    fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String> {
        self.record(Call::CreateTree)?;
        let mut st = self.state.borrow_mut();
        let mut tree = st
            .trees
            .get(base_tree)
            .cloned()
            .ok_or_else(|| unprocessable("Invalid tree info"))?;
        for e in entries {
            if e.mode != "100644" || e.kind != "blob" || !st.blobs.contains_key(&e.sha) {
                return Err(unprocessable("Invalid tree info"));
            }
            tree.insert(e.path.clone(), e.sha.clone());
        }
        Ok(store_tree(&mut st, tree))
    }

    fn create_commit(&self, message: &str, tree: &str, parents: &[String]) -> Result<String> {
        self.record(Call::CreateCommit)?;
        let id = {
            let mut st = self.state.borrow_mut();
            if !st.trees.contains_key(tree) || parents.iter().any(|p| !st.commits.contains_key(p)) {
                return Err(unprocessable("Object does not exist"));
            }
            store_commit(&mut st, tree, parents.to_vec(), message)
        };
        if self.race_on_commit.get() {
            let branch = self
                .state
                .borrow()
                .refs
                .iter()
                .find(|(_, head)| parents.contains(head))
                .map(|(name, _)| name.clone());
            if let Some(branch) = branch {
                self.push_foreign_commit(&branch);
            }
        }
        Ok(id)
    }

    fn update_branch(&self, branch: &str, commit: &str, force: bool) -> Result<()> {
        self.record(Call::UpdateBranch {
            branch: branch.to_string(),
            commit: commit.to_string(),
            force,
        })?;
        let mut st = self.state.borrow_mut();
        let current = st
            .refs
            .get(branch)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("branch `{}`", branch)))?;
        let parents = st
            .commits
            .get(commit)
            .map(|c| c.parents.clone())
            .ok_or_else(|| unprocessable("Object does not exist"))?;
        if !force && !parents.contains(&current) {
            return Err(SyncError::Conflict {
                branch: branch.to_string(),
                detail: "Update is not a fast forward".into(),
            });
        }
        st.refs.insert(branch.to_string(), commit.to_string());
        Ok(())
    }
}

/// Observer that remembers every callback.
#[derive(Default)]
pub struct Recorder {
    pub stages: Vec<Stage>,
    pub skipped: Vec<SkippedFile>,
    pub uploaded: Vec<UploadedFile>,
}

impl SyncObserver for Recorder {
    fn stage(&mut self, stage: Stage) {
        self.stages.push(stage);
    }

    fn skipped(&mut self, file: &SkippedFile) {
        self.skipped.push(file.clone());
    }

    fn uploaded(&mut self, file: &UploadedFile) {
        self.uploaded.push(file.clone());
    }
}
