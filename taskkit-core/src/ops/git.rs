//! Git commit and tag operations.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use git2::{Commit, ErrorCode, Oid, Repository, Signature};

use crate::error::{BoxError, Error, Result};
use crate::ops::{expand_files, expand_template};
use crate::task::{Operation, TaskContext};

/// Stages `files` and commits them with a templated message.
#[derive(Debug, Clone)]
pub struct GitCommit {
    files: Vec<String>,
    message: String,
}

impl GitCommit {
    pub fn new<I, S>(files: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Operation for GitCommit {
    async fn run(&self, ctx: &TaskContext<'_>) -> std::result::Result<(), BoxError> {
        let message = expand_template(&self.message, ctx)?;
        let files = expand_files(&self.files, ctx)?;
        if files.is_empty() {
            return Err(Error::Operation("No files to commit".to_string()).into());
        }

        let root = ctx.project_root().to_path_buf();
        let commit_message = message.clone();
        let oid = run_blocking(move || commit_files(&root, &files, &commit_message)).await?;
        ctx.reporter().task_output(
            ctx.task_name(),
            &format!("[{}] {}", short_id(oid), message),
            false,
        );
        Ok(())
    }
}

/// Creates an annotated tag on `HEAD`.
#[derive(Debug, Clone)]
pub struct GitTag {
    name: String,
    message: String,
}

impl GitTag {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl Operation for GitTag {
    async fn run(&self, ctx: &TaskContext<'_>) -> std::result::Result<(), BoxError> {
        let name = expand_template(&self.name, ctx)?;
        let message = expand_template(&self.message, ctx)?;

        let root = ctx.project_root().to_path_buf();
        let tag_name = name.clone();
        let oid = run_blocking(move || tag_head(&root, &tag_name, &message)).await?;
        ctx.reporter().task_output(
            ctx.task_name(),
            &format!("tagged {} ({})", name, short_id(oid)),
            false,
        );
        Ok(())
    }
}

/// Runs a libgit2 call on the blocking thread pool.
async fn run_blocking<F>(f: F) -> Result<Oid>
where
    F: FnOnce() -> Result<Oid> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Operation(format!("Git task did not complete: {}", e)))?
}

fn commit_files(root: &Path, files: &[PathBuf], message: &str) -> Result<Oid> {
    let repo = Repository::discover(root)?;
    let workdir = repo
        .workdir()
        .ok_or_else(|| Error::Operation("Cannot commit in a bare repository".to_string()))?
        .canonicalize()?;

    let mut index = repo.index()?;
    for file in files {
        let absolute = file.canonicalize()?;
        let relative = absolute.strip_prefix(&workdir).map_err(|_| {
            Error::Operation(format!("{} is outside the repository", file.display()))
        })?;
        index.add_path(relative)?;
    }
    index.write()?;

    let tree = repo.find_tree(index.write_tree()?)?;
    let signature = signature(&repo)?;
    let parent = match repo.head() {
        Ok(head) => Some(head.peel_to_commit()?),
        Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => None,
        Err(e) => return Err(e.into()),
    };
    let parents: Vec<&Commit<'_>> = parent.iter().collect();

    Ok(repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        message,
        &tree,
        &parents,
    )?)
}

fn tag_head(root: &Path, name: &str, message: &str) -> Result<Oid> {
    let repo = Repository::discover(root)?;
    let head = repo.head()?.peel_to_commit()?;
    let signature = signature(&repo)?;
    Ok(repo.tag(name, head.as_object(), &signature, message, false)?)
}

fn signature(repo: &Repository) -> Result<Signature<'static>> {
    match repo.signature() {
        Ok(signature) => Ok(signature),
        Err(_) => Ok(Signature::now("taskkit", "taskkit@localhost")?),
    }
}

fn short_id(oid: Oid) -> String {
    oid.to_string().chars().take(7).collect()
}
