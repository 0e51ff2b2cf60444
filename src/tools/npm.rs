//! Packaging-tool capability
//!
//! Wraps the package manager's pack and cache commands behind a trait so the
//! workflow can be tested with a fake archive producer. [`NpmCli`] drives the
//! real `npm` executable.

use crate::core::error::PublishError;
use crate::core::manifest::PackageInfo;
use crate::tools::command::run_captured;
use async_trait::async_trait;
use log::debug;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Packaging operations used by the publish workflow
#[async_trait]
pub trait Packager: Send + Sync {
    /// Archive `package_dir` into a tarball under `out_dir`, returning the
    /// tarball path. Creates `out_dir` first.
    async fn pack(
        &self,
        package_dir: &Path,
        out_dir: &Path,
        info: &PackageInfo,
    ) -> Result<PathBuf, PublishError>;

    /// Drop any tool-level cache entry for the packaged name/version
    async fn clean_cache(&self, info: &PackageInfo) -> Result<(), PublishError>;
}

/// Production implementation backed by the `npm` CLI
#[derive(Debug, Default)]
pub struct NpmCli;

impl NpmCli {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Packager for NpmCli {
    async fn pack(
        &self,
        package_dir: &Path,
        out_dir: &Path,
        info: &PackageInfo,
    ) -> Result<PathBuf, PublishError> {
        fs::create_dir_all(out_dir)
            .await
            .map_err(|source| PublishError::fs(out_dir, source))?;

        let dir_arg = package_dir.to_string_lossy();
        run_captured("npm", &["pack", &dir_arg], Some(out_dir)).await?;

        let tarball = out_dir.join(tarball_name(info));
        debug!("packed {}@{} into {}", info.name, info.version, tarball.display());
        Ok(tarball)
    }

    async fn clean_cache(&self, info: &PackageInfo) -> Result<(), PublishError> {
        let spec = format!("{}@{}", info.name, info.version);
        run_captured("npm", &["cache", "clean", &spec], None).await?;
        Ok(())
    }
}

/// Tarball filename npm produces for a given package.
///
/// Scoped packages are special-cased: `@scope/name` becomes `scope-name`.
pub fn tarball_name(info: &PackageInfo) -> String {
    let name = match info.name.strip_prefix('@') {
        Some(rest) => rest.replace('/', "-"),
        None => info.name.clone(),
    };
    format!("{}-{}.tgz", name, info.version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tarball_name_plain_package() {
        let info = PackageInfo::new("demo", "1.0.0");
        assert_eq!(tarball_name(&info), "demo-1.0.0.tgz");
    }

    #[test]
    fn test_tarball_name_scoped_package() {
        let info = PackageInfo::new("@scope/demo", "2.3.4");
        assert_eq!(tarball_name(&info), "scope-demo-2.3.4.tgz");
    }

    #[test]
    fn test_tarball_name_prerelease_version() {
        let info = PackageInfo::new("demo", "1.0.0-rc.1");
        assert_eq!(tarball_name(&info), "demo-1.0.0-rc.1.tgz");
    }
}
