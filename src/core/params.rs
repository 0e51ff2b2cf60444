//! Parameter resolution for publish invocations
//!
//! Merges caller-supplied options with defaults derived from the package
//! manifest. Two call conventions exist at the crate boundary (a modern
//! options form and a legacy positional form); both are resolved here into
//! one canonical [`PublishParams`] before any work starts.

use crate::core::error::PublishError;
use crate::core::manifest::{self, PackageInfo};
use std::env;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use uuid::Uuid;

/// Future returned by a prepublish hook
pub type HookFuture = Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send>>;

/// Async hook invoked with the staged working-tree path before commit.
///
/// Returning `Ok(false)` cancels the publish; the hook may freely mutate the
/// staged tree (including its manifest) before returning.
pub type PrepublishHook = Box<dyn Fn(PathBuf) -> HookFuture + Send + Sync>;

/// Final result of a publish invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A new commit was created and pushed
    Pushed,
    /// Staging produced no tree differences, nothing was committed
    Skipped,
    /// The prepublish hook declined to continue
    Cancelled,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pushed => "pushed",
            Self::Skipped => "skipped",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-facing options for the modern call convention
#[derive(Default)]
pub struct Options {
    /// Override the commit message text
    pub commit_text: Option<String>,
    /// Override the tag name
    pub tag_name: Option<String>,
    /// Override the annotated-tag message text
    pub tag_message_text: Option<String>,
    /// Branches to force-move to the new tag
    pub extra_branch_names: Vec<String>,
    /// Hook invoked with the staged path; `false` cancels the publish
    pub prepublish: Option<PrepublishHook>,
    /// Override the scratch directory location
    pub temp_dir: Option<PathBuf>,
    /// Skip the manifest read by supplying name/version directly
    pub original_package_info: Option<PackageInfo>,
}

/// Fully resolved parameters; built once per invocation, never mutated.
///
/// Text fields stay as overrides here: the defaults they fall back to depend
/// on the effective version, which is only known after the prepublish hook
/// has run (the hook may rewrite the staged manifest). [`resolved_texts`]
/// performs that final derivation.
///
/// [`resolved_texts`]: PublishParams::resolved_texts
pub struct PublishParams {
    pub commit_text: Option<String>,
    pub tag_name: Option<String>,
    pub tag_message_text: Option<String>,
    pub extra_branch_names: Vec<String>,
    pub prepublish: Option<PrepublishHook>,
    pub temp_dir: PathBuf,
    pub package: PackageInfo,
}

/// Commit/tag texts derived from the effective version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTexts {
    pub commit_text: String,
    pub tag_name: String,
    pub tag_message_text: String,
}

impl PublishParams {
    /// Resolve caller options against the package manifest.
    ///
    /// The manifest in `package_dir` is only read when
    /// `original_package_info` was not supplied.
    pub async fn resolve(package_dir: &Path, options: Options) -> Result<Self, PublishError> {
        let package = match options.original_package_info {
            Some(info) => info,
            None => manifest::read_package_info(package_dir).await?,
        };

        Ok(Self {
            commit_text: options.commit_text,
            tag_name: options.tag_name,
            tag_message_text: options.tag_message_text,
            extra_branch_names: options.extra_branch_names,
            prepublish: options.prepublish,
            temp_dir: options.temp_dir.unwrap_or_else(unique_temp_dir),
            package,
        })
    }

    /// Derive the final commit/tag texts from the effective version.
    ///
    /// Explicit overrides are carried verbatim; everything else defaults from
    /// the version. The tag message defaults to the commit text.
    pub fn resolved_texts(&self, version: &str) -> ResolvedTexts {
        let commit_text = self
            .commit_text
            .clone()
            .unwrap_or_else(|| format!("release: version {version}"));
        let tag_name = self
            .tag_name
            .clone()
            .unwrap_or_else(|| format!("v{version}"));
        let tag_message_text = self
            .tag_message_text
            .clone()
            .unwrap_or_else(|| commit_text.clone());

        ResolvedTexts {
            commit_text,
            tag_name,
            tag_message_text,
        }
    }
}

/// Generate a fresh scratch path under the OS temp directory
fn unique_temp_dir() -> PathBuf {
    env::temp_dir().join(format!("publish-to-git-{}", Uuid::new_v4()))
}
