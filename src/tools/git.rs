//! Version-control capability
//!
//! The publisher only needs a narrow slice of git. It is modelled as a trait
//! so the workflow can be exercised against a fake without a network or a
//! real repository; [`GitCli`] is the production implementation driving the
//! `git` executable.

use crate::core::error::PublishError;
use crate::tools::command::{run_captured, run_inherited};
use async_trait::async_trait;
use std::path::Path;

/// Version-control operations used by the publish workflow
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Shallow-clone (depth 1) `remote` into `dest`
    async fn clone_shallow(&self, remote: &str, dest: &Path) -> Result<(), PublishError>;

    /// Stage every change in the working tree, additions and deletions alike
    async fn add_all(&self, repo: &Path) -> Result<(), PublishError>;

    /// Whether the working tree differs from the last commit
    async fn has_changes(&self, repo: &Path) -> Result<bool, PublishError>;

    /// Commit staged changes using a message file.
    ///
    /// Empty messages are allowed and pre-commit hooks are bypassed; the
    /// commit must be created even when the message file is empty.
    async fn commit_from_file(&self, repo: &Path, message_file: &Path)
    -> Result<(), PublishError>;

    /// Create an annotated tag at the current commit using a message file
    async fn tag_annotated(
        &self,
        repo: &Path,
        tag_name: &str,
        message_file: &Path,
    ) -> Result<(), PublishError>;

    /// Force a branch reference to point at `target`
    async fn force_branch(
        &self,
        repo: &Path,
        branch: &str,
        target: &str,
    ) -> Result<(), PublishError>;

    /// Force-push HEAD plus the named branches to origin, following tags
    async fn push_force(&self, repo: &Path, extra_branches: &[String])
    -> Result<(), PublishError>;
}

/// Production implementation backed by the `git` CLI
#[derive(Debug, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn clone_shallow(&self, remote: &str, dest: &Path) -> Result<(), PublishError> {
        let dest = dest.to_string_lossy();
        // clone output goes straight to the user's terminal
        run_inherited(
            "git",
            &["clone", "--quiet", "--depth", "1", remote, &dest],
            None,
        )
        .await
    }

    async fn add_all(&self, repo: &Path) -> Result<(), PublishError> {
        run_captured("git", &["add", "--all"], Some(repo)).await?;
        Ok(())
    }

    async fn has_changes(&self, repo: &Path) -> Result<bool, PublishError> {
        let status = run_captured("git", &["status", "--porcelain"], Some(repo)).await?;
        Ok(!status.trim().is_empty())
    }

    async fn commit_from_file(
        &self,
        repo: &Path,
        message_file: &Path,
    ) -> Result<(), PublishError> {
        let file_arg = format!("--file={}", message_file.to_string_lossy());
        run_captured(
            "git",
            &["commit", &file_arg, "--allow-empty-message", "--no-verify"],
            Some(repo),
        )
        .await?;
        Ok(())
    }

    async fn tag_annotated(
        &self,
        repo: &Path,
        tag_name: &str,
        message_file: &Path,
    ) -> Result<(), PublishError> {
        let file_arg = format!("--file={}", message_file.to_string_lossy());
        run_captured("git", &["tag", "-a", &file_arg, tag_name], Some(repo)).await?;
        Ok(())
    }

    async fn force_branch(
        &self,
        repo: &Path,
        branch: &str,
        target: &str,
    ) -> Result<(), PublishError> {
        run_captured("git", &["branch", "-f", branch, target], Some(repo)).await?;
        Ok(())
    }

    async fn push_force(
        &self,
        repo: &Path,
        extra_branches: &[String],
    ) -> Result<(), PublishError> {
        let mut args = vec!["push", "--follow-tags", "--force", "origin", "HEAD"];
        for branch in extra_branches {
            args.push(branch.as_str());
        }
        // push progress belongs on the user's terminal
        run_inherited("git", &args, Some(repo)).await
    }
}
