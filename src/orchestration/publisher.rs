//! Publish orchestrator
//!
//! Drives the full workflow: resolve parameters, stage the packed tree over
//! a fresh shallow clone, then commit/tag/push if anything changed. Staging
//! overlaps the packaging and clone work and joins only where a true data
//! dependency exists; extraction needs both the tarball and the cleared
//! clone. Exactly one [`Outcome`] is produced per invocation and the scratch
//! directory is cleared on every path.

use crate::archive::unpack_tarball;
use crate::core::error::PublishError;
use crate::core::manifest::{self, PackageInfo};
use crate::core::params::{Options, Outcome, PublishParams};
use crate::orchestration::scratch::{ScratchWorkspace, strip_worktree};
use crate::tools::{GitCli, NpmCli, Packager, VersionControl};
use log::{info, warn};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;

/// Publishes a packed package tree into a target git repository
pub struct Publisher {
    git: Arc<dyn VersionControl>,
    packager: Arc<dyn Packager>,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new()
    }
}

impl Publisher {
    /// Create a publisher backed by the real `git` and `npm` executables
    pub fn new() -> Self {
        Self::with_tools(Arc::new(GitCli::new()), Arc::new(NpmCli::new()))
    }

    /// Create a publisher with substituted tool implementations
    pub fn with_tools(git: Arc<dyn VersionControl>, packager: Arc<dyn Packager>) -> Self {
        Self { git, packager }
    }

    /// Publish `package_dir` into `remote` (modern call convention).
    ///
    /// # Arguments
    ///
    /// * `package_dir` - Source package directory containing the manifest
    /// * `remote` - URL or path the version-control client can clone from
    ///   and push to
    /// * `options` - Overrides and hooks; see [`Options`]
    pub async fn publish(
        &self,
        package_dir: &Path,
        remote: &str,
        options: Options,
    ) -> Result<Outcome, PublishError> {
        let params = PublishParams::resolve(package_dir, options).await?;
        self.run(package_dir, remote, params).await
    }

    /// Legacy positional call convention.
    ///
    /// All texts and the scratch directory are explicit, no hook and no
    /// extra branches; returns whether something was pushed. The legacy
    /// shape is adapted into [`Options`] right here and never reaches the
    /// internal logic.
    pub async fn publish_legacy(
        &self,
        package_dir: &Path,
        remote: &str,
        commit_text: &str,
        tag_name: &str,
        tag_message_text: &str,
        temp_dir: &Path,
        package_info: PackageInfo,
    ) -> Result<bool, PublishError> {
        let options = Options {
            commit_text: Some(commit_text.to_string()),
            tag_name: Some(tag_name.to_string()),
            tag_message_text: Some(tag_message_text.to_string()),
            temp_dir: Some(temp_dir.to_path_buf()),
            original_package_info: Some(package_info),
            ..Default::default()
        };

        let outcome = self.publish(package_dir, remote, options).await?;
        Ok(outcome == Outcome::Pushed)
    }

    async fn run(
        &self,
        package_dir: &Path,
        remote: &str,
        params: PublishParams,
    ) -> Result<Outcome, PublishError> {
        let ws = ScratchWorkspace::new(params.temp_dir.clone());
        ws.clear().await?;

        let result = self.stage_and_finalize(package_dir, remote, &params, &ws).await;
        self.cleanup(&ws, &params.package, result).await
    }

    /// Cleanup runs on every path, success or failure
    async fn cleanup(
        &self,
        ws: &ScratchWorkspace,
        package: &PackageInfo,
        result: Result<Outcome, PublishError>,
    ) -> Result<Outcome, PublishError> {
        // cache invalidation is advisory; scratch deletion is not
        let (cache_cleaned, cleared) = tokio::join!(self.packager.clean_cache(package), ws.clear());

        if let Err(e) = cache_cleaned {
            warn!("cache invalidation for {}@{} failed: {e}", package.name, package.version);
        }

        match (cleared, result) {
            (Ok(()), result) => result,
            (Err(clear_error), Ok(_)) => Err(clear_error),
            (Err(clear_error), Err(original)) => {
                warn!("scratch cleanup failed after error: {clear_error}");
                Err(original)
            }
        }
    }

    async fn stage_and_finalize(
        &self,
        package_dir: &Path,
        remote: &str,
        params: &PublishParams,
        ws: &ScratchWorkspace,
    ) -> Result<Outcome, PublishError> {
        let repo_dir = ws.repo_dir();
        let pack_dir = ws.pack_dir();

        // pack and clone run concurrently; the clone's tracked contents are
        // removed as soon as it lands
        let pack_op = self.packager.pack(package_dir, &pack_dir, &params.package);
        let clone_op = async {
            self.git.clone_shallow(remote, &repo_dir).await?;
            strip_worktree(&repo_dir).await
        };
        let (tarball, ()) = tokio::try_join!(pack_op, clone_op)?;

        unpack_tarball(&tarball, &repo_dir).await?;
        self.finalize(params, ws).await
    }

    async fn finalize(
        &self,
        params: &PublishParams,
        ws: &ScratchWorkspace,
    ) -> Result<Outcome, PublishError> {
        let repo_dir = ws.repo_dir();
        self.git.add_all(&repo_dir).await?;

        let hook_ran = match &params.prepublish {
            Some(hook) => {
                let proceed = hook(repo_dir.clone())
                    .await
                    .map_err(|source| PublishError::Hook { source })?;
                if !proceed {
                    info!("prepublish hook declined to continue");
                    return Ok(Outcome::Cancelled);
                }
                true
            }
            None => false,
        };

        // the hook may have rewritten the staged manifest; defaults derive
        // from whatever version it left behind
        let package = if hook_ran {
            manifest::read_package_info(&repo_dir).await?
        } else {
            params.package.clone()
        };
        let texts = params.resolved_texts(&package.version);

        let commit_path = ws.commit_message_path();
        let tag_path = ws.tag_message_path();
        tokio::try_join!(
            async {
                fs::write(&commit_path, &texts.commit_text)
                    .await
                    .map_err(|source| PublishError::fs(&commit_path, source))
            },
            async {
                fs::write(&tag_path, &texts.tag_message_text)
                    .await
                    .map_err(|source| PublishError::fs(&tag_path, source))
            },
        )?;

        // re-stage to cover any mutation the hook performed
        self.git.add_all(&repo_dir).await?;
        if !self.git.has_changes(&repo_dir).await? {
            info!("staged tree matches the previous commit, nothing to publish");
            return Ok(Outcome::Skipped);
        }

        self.git.commit_from_file(&repo_dir, &commit_path).await?;
        self.git
            .tag_annotated(&repo_dir, &texts.tag_name, &tag_path)
            .await?;
        for branch in &params.extra_branch_names {
            self.git
                .force_branch(&repo_dir, branch, &texts.tag_name)
                .await?;
        }
        self.git
            .push_force(&repo_dir, &params.extra_branch_names)
            .await?;

        info!("pushed {} {}", package.name, texts.tag_name);
        Ok(Outcome::Pushed)
    }
}

/// Publish with a default [`Publisher`] (modern call convention)
pub async fn publish(
    package_dir: &Path,
    remote: &str,
    options: Options,
) -> Result<Outcome, PublishError> {
    Publisher::new().publish(package_dir, remote, options).await
}

/// Publish with a default [`Publisher`] (legacy call convention)
#[allow(clippy::too_many_arguments)]
pub async fn publish_legacy(
    package_dir: &Path,
    remote: &str,
    commit_text: &str,
    tag_name: &str,
    tag_message_text: &str,
    temp_dir: &Path,
    package_info: PackageInfo,
) -> Result<bool, PublishError> {
    Publisher::new()
        .publish_legacy(
            package_dir,
            remote,
            commit_text,
            tag_name,
            tag_message_text,
            temp_dir,
            package_info,
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::npm::tarball_name;
    use async_trait::async_trait;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Records every git operation; clone seeds a fake tracked tree
    struct FakeGit {
        calls: Mutex<Vec<String>>,
        has_changes: bool,
    }

    impl FakeGit {
        fn new(has_changes: bool) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                has_changes,
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn count_with_prefix(&self, prefix: &str) -> usize {
            self.calls()
                .iter()
                .filter(|c| c.starts_with(prefix))
                .count()
        }
    }

    #[async_trait]
    impl VersionControl for FakeGit {
        async fn clone_shallow(&self, remote: &str, dest: &Path) -> Result<(), PublishError> {
            self.record(format!("clone:{remote}"));
            std::fs::create_dir_all(dest.join(".git")).unwrap();
            std::fs::write(dest.join(".git/HEAD"), "ref: refs/heads/main").unwrap();
            std::fs::write(dest.join("old.txt"), "previous release").unwrap();
            std::fs::write(dest.join(".hidden"), "previous dotfile").unwrap();
            Ok(())
        }

        async fn add_all(&self, _repo: &Path) -> Result<(), PublishError> {
            self.record("add".to_string());
            Ok(())
        }

        async fn has_changes(&self, _repo: &Path) -> Result<bool, PublishError> {
            self.record("status".to_string());
            Ok(self.has_changes)
        }

        async fn commit_from_file(
            &self,
            _repo: &Path,
            message_file: &Path,
        ) -> Result<(), PublishError> {
            let message = std::fs::read_to_string(message_file).unwrap();
            self.record(format!("commit:{message}"));
            Ok(())
        }

        async fn tag_annotated(
            &self,
            _repo: &Path,
            tag_name: &str,
            message_file: &Path,
        ) -> Result<(), PublishError> {
            let message = std::fs::read_to_string(message_file).unwrap();
            self.record(format!("tag:{tag_name}:{message}"));
            Ok(())
        }

        async fn force_branch(
            &self,
            _repo: &Path,
            branch: &str,
            target: &str,
        ) -> Result<(), PublishError> {
            self.record(format!("branch:{branch}->{target}"));
            Ok(())
        }

        async fn push_force(
            &self,
            _repo: &Path,
            extra_branches: &[String],
        ) -> Result<(), PublishError> {
            self.record(format!("push:{}", extra_branches.join(",")));
            Ok(())
        }
    }

    /// Produces a real tarball without invoking npm
    struct FakePackager {
        manifest_json: String,
        cache_cleans: AtomicUsize,
    }

    impl FakePackager {
        fn new(manifest_json: &str) -> Self {
            Self {
                manifest_json: manifest_json.to_string(),
                cache_cleans: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Packager for FakePackager {
        async fn pack(
            &self,
            _package_dir: &Path,
            out_dir: &Path,
            info: &PackageInfo,
        ) -> Result<PathBuf, PublishError> {
            std::fs::create_dir_all(out_dir).unwrap();
            let tarball = out_dir.join(tarball_name(info));

            let encoder = GzEncoder::new(
                std::fs::File::create(&tarball).unwrap(),
                Compression::default(),
            );
            let mut builder = tar::Builder::new(encoder);
            for (name, data) in [
                ("package/package.json", self.manifest_json.as_bytes()),
                ("package/index.js", b"module.exports = {};\n".as_slice()),
            ] {
                let mut header = tar::Header::new_gnu();
                header.set_size(data.len() as u64);
                header.set_mode(0o644);
                header.set_cksum();
                builder.append_data(&mut header, name, data).unwrap();
            }
            builder.into_inner().unwrap().finish().unwrap();

            Ok(tarball)
        }

        async fn clean_cache(&self, _info: &PackageInfo) -> Result<(), PublishError> {
            self.cache_cleans.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Packager whose pack step always fails, as when npm is missing
    struct FailingPackager;

    #[async_trait]
    impl Packager for FailingPackager {
        async fn pack(
            &self,
            _package_dir: &Path,
            _out_dir: &Path,
            _info: &PackageInfo,
        ) -> Result<PathBuf, PublishError> {
            Err(PublishError::CommandSpawn {
                program: "npm".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "npm not found"),
            })
        }

        async fn clean_cache(&self, _info: &PackageInfo) -> Result<(), PublishError> {
            Ok(())
        }
    }

    /// Version control whose clone step always fails, as for a bad remote
    struct FailingGit;

    #[async_trait]
    impl VersionControl for FailingGit {
        async fn clone_shallow(&self, remote: &str, _dest: &Path) -> Result<(), PublishError> {
            Err(PublishError::CommandFailed {
                program: "git".to_string(),
                args: format!("clone --quiet --depth 1 {remote}"),
                status: std::process::Command::new("false").status().unwrap(),
            })
        }

        async fn add_all(&self, _repo: &Path) -> Result<(), PublishError> {
            Ok(())
        }

        async fn has_changes(&self, _repo: &Path) -> Result<bool, PublishError> {
            Ok(false)
        }

        async fn commit_from_file(
            &self,
            _repo: &Path,
            _message_file: &Path,
        ) -> Result<(), PublishError> {
            Ok(())
        }

        async fn tag_annotated(
            &self,
            _repo: &Path,
            _tag_name: &str,
            _message_file: &Path,
        ) -> Result<(), PublishError> {
            Ok(())
        }

        async fn force_branch(
            &self,
            _repo: &Path,
            _branch: &str,
            _target: &str,
        ) -> Result<(), PublishError> {
            Ok(())
        }

        async fn push_force(
            &self,
            _repo: &Path,
            _extra_branches: &[String],
        ) -> Result<(), PublishError> {
            Ok(())
        }
    }

    struct Harness {
        publisher: Publisher,
        git: Arc<FakeGit>,
        packager: Arc<FakePackager>,
        package_dir: PathBuf,
        scratch: PathBuf,
        _temp: TempDir,
    }

    const DEMO_MANIFEST: &str = r#"{"name": "demo", "version": "1.0.0"}"#;

    fn harness(has_changes: bool) -> Harness {
        let temp = TempDir::new().unwrap();
        let package_dir = temp.path().join("pkg");
        std::fs::create_dir_all(&package_dir).unwrap();
        std::fs::write(package_dir.join("package.json"), DEMO_MANIFEST).unwrap();
        let scratch = temp.path().join("scratch");

        let git = Arc::new(FakeGit::new(has_changes));
        let packager = Arc::new(FakePackager::new(DEMO_MANIFEST));
        let publisher = Publisher::with_tools(git.clone(), packager.clone());

        Harness {
            publisher,
            git,
            packager,
            package_dir,
            scratch,
            _temp: temp,
        }
    }

    fn options(h: &Harness) -> Options {
        Options {
            temp_dir: Some(h.scratch.clone()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_changed_tree_is_pushed_with_derived_defaults() {
        let h = harness(true);

        let outcome = h
            .publisher
            .publish(&h.package_dir, "git@example.com:demo.git", options(&h))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Pushed);
        let calls = h.git.calls();
        assert!(calls.contains(&"clone:git@example.com:demo.git".to_string()));
        assert!(calls.contains(&"commit:release: version 1.0.0".to_string()));
        assert!(calls.contains(&"tag:v1.0.0:release: version 1.0.0".to_string()));
        assert!(calls.contains(&"push:".to_string()));
        assert!(!h.scratch.exists(), "scratch must be removed after pushing");
        assert_eq!(h.packager.cache_cleans.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_extra_branches_move_to_the_tag() {
        let h = harness(true);
        let mut opts = options(&h);
        opts.extra_branch_names = vec![
            "latest".to_string(),
            "stable".to_string(),
            "next".to_string(),
        ];

        let outcome = h
            .publisher
            .publish(&h.package_dir, "remote", opts)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Pushed);
        assert_eq!(h.git.count_with_prefix("commit:"), 1);
        assert_eq!(h.git.count_with_prefix("tag:"), 1);
        let calls = h.git.calls();
        assert!(calls.contains(&"branch:latest->v1.0.0".to_string()));
        assert!(calls.contains(&"branch:stable->v1.0.0".to_string()));
        assert!(calls.contains(&"branch:next->v1.0.0".to_string()));
        assert!(calls.contains(&"push:latest,stable,next".to_string()));
    }

    #[tokio::test]
    async fn test_unchanged_tree_is_skipped() {
        let h = harness(false);

        let outcome = h
            .publisher
            .publish(&h.package_dir, "remote", options(&h))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(h.git.count_with_prefix("commit:"), 0);
        assert_eq!(h.git.count_with_prefix("tag:"), 0);
        assert_eq!(h.git.count_with_prefix("push:"), 0);
        assert!(!h.scratch.exists(), "scratch must be removed after skipping");
    }

    #[tokio::test]
    async fn test_skip_is_idempotent() {
        let h = harness(false);

        for _ in 0..2 {
            let outcome = h
                .publisher
                .publish(&h.package_dir, "remote", options(&h))
                .await
                .unwrap();
            assert_eq!(outcome, Outcome::Skipped);
        }
        assert_eq!(h.git.count_with_prefix("commit:"), 0);
    }

    #[tokio::test]
    async fn test_declining_hook_cancels() {
        let h = harness(true);
        let invocations = Arc::new(AtomicUsize::new(0));
        let counter = invocations.clone();

        let mut opts = options(&h);
        opts.prepublish = Some(Box::new(move |_path| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(false)
            })
        }));

        let outcome = h
            .publisher
            .publish(&h.package_dir, "remote", opts)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Cancelled);
        assert_eq!(invocations.load(Ordering::SeqCst), 1, "hook runs exactly once");
        assert_eq!(h.git.count_with_prefix("commit:"), 0);
        assert_eq!(h.git.count_with_prefix("tag:"), 0);
        assert_eq!(h.git.count_with_prefix("push:"), 0);
        assert!(!h.scratch.exists(), "scratch must be removed after cancelling");
    }

    #[tokio::test]
    async fn test_hook_sees_staged_tree_not_old_clone() {
        let h = harness(true);
        let mut opts = options(&h);
        opts.prepublish = Some(Box::new(|staged| {
            Box::pin(async move {
                assert!(staged.join("index.js").is_file(), "packed file present");
                assert!(staged.join(".git").is_dir(), "git metadata preserved");
                assert!(!staged.join("old.txt").exists(), "old tracked file removed");
                assert!(!staged.join(".hidden").exists(), "old dotfile removed");
                Ok(true)
            })
        }));

        let outcome = h
            .publisher
            .publish(&h.package_dir, "remote", opts)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Pushed);
    }

    #[tokio::test]
    async fn test_hook_version_bump_feeds_defaults() {
        let h = harness(true);
        let mut opts = options(&h);
        opts.prepublish = Some(Box::new(|staged| {
            Box::pin(async move {
                tokio::fs::write(
                    staged.join("package.json"),
                    r#"{"name": "demo", "version": "2.0.0"}"#,
                )
                .await?;
                Ok(true)
            })
        }));

        let outcome = h
            .publisher
            .publish(&h.package_dir, "remote", opts)
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Pushed);
        let calls = h.git.calls();
        assert!(calls.contains(&"commit:release: version 2.0.0".to_string()));
        assert!(calls.contains(&"tag:v2.0.0:release: version 2.0.0".to_string()));
    }

    #[tokio::test]
    async fn test_explicit_texts_survive_hook_version_bump() {
        let h = harness(true);
        let mut opts = options(&h);
        opts.tag_name = Some("release-7".to_string());
        opts.commit_text = Some("custom".to_string());
        opts.prepublish = Some(Box::new(|staged| {
            Box::pin(async move {
                tokio::fs::write(
                    staged.join("package.json"),
                    r#"{"name": "demo", "version": "3.0.0"}"#,
                )
                .await?;
                Ok(true)
            })
        }));

        h.publisher
            .publish(&h.package_dir, "remote", opts)
            .await
            .unwrap();

        let calls = h.git.calls();
        assert!(calls.contains(&"commit:custom".to_string()));
        assert!(calls.contains(&"tag:release-7:custom".to_string()));
    }

    #[tokio::test]
    async fn test_hook_error_propagates_and_scratch_is_removed() {
        let h = harness(true);
        let mut opts = options(&h);
        opts.prepublish = Some(Box::new(|_path| {
            Box::pin(async move { Err(anyhow::anyhow!("hook exploded")) })
        }));

        let result = h.publisher.publish(&h.package_dir, "remote", opts).await;

        assert!(matches!(result, Err(PublishError::Hook { .. })));
        assert!(!h.scratch.exists(), "scratch must be removed after failure");
    }

    #[tokio::test]
    async fn test_failed_pack_propagates_and_cleans_scratch() {
        let h = harness(true);
        let publisher =
            Publisher::with_tools(h.git.clone(), Arc::new(FailingPackager));

        let result = publisher
            .publish(&h.package_dir, "remote", options(&h))
            .await;

        assert!(matches!(result, Err(PublishError::CommandSpawn { .. })));
        assert_eq!(h.git.count_with_prefix("commit:"), 0);
        assert_eq!(h.git.count_with_prefix("push:"), 0);
        assert!(
            !h.scratch.exists(),
            "scratch must be removed after a staging failure"
        );
    }

    #[tokio::test]
    async fn test_failed_clone_propagates_and_cleans_scratch() {
        let h = harness(true);
        let publisher =
            Publisher::with_tools(Arc::new(FailingGit), h.packager.clone());

        let result = publisher
            .publish(&h.package_dir, "remote", options(&h))
            .await;

        match result {
            Err(e @ PublishError::CommandFailed { .. }) => assert!(e.is_tool_failure()),
            other => panic!("expected CommandFailed, got {other:?}"),
        }
        assert!(
            !h.scratch.exists(),
            "scratch must be removed after a staging failure"
        );
    }

    #[tokio::test]
    async fn test_legacy_convention_returns_pushed_flag() {
        let h = harness(true);

        let pushed = h
            .publisher
            .publish_legacy(
                &h.package_dir,
                "remote",
                "legacy commit",
                "legacy-tag",
                "legacy tag message",
                &h.scratch,
                PackageInfo::new("demo", "1.0.0"),
            )
            .await
            .unwrap();

        assert!(pushed);
        let calls = h.git.calls();
        assert!(calls.contains(&"commit:legacy commit".to_string()));
        assert!(calls.contains(&"tag:legacy-tag:legacy tag message".to_string()));
        assert!(!h.scratch.exists());
    }

    #[tokio::test]
    async fn test_legacy_convention_unchanged_returns_false() {
        let h = harness(false);

        let pushed = h
            .publisher
            .publish_legacy(
                &h.package_dir,
                "remote",
                "c",
                "t",
                "m",
                &h.scratch,
                PackageInfo::new("demo", "1.0.0"),
            )
            .await
            .unwrap();

        assert!(!pushed);
    }
}
