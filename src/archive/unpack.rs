//! Tarball extraction
//!
//! Extracts the gzipped tarball produced by the packaging tool over the
//! cleared clone. npm nests the tree inside a single `package/` directory,
//! so the first path component of every entry is stripped. Extracted entry
//! permissions are raised to a safe minimum (0644 for files, 0755 for
//! directories) by OR-ing, never reducing broader permissions already
//! present in the archive.

use crate::core::error::PublishError;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};
use tar::Archive;

const MIN_FILE_PERMS: u32 = 0o644;
const MIN_DIR_PERMS: u32 = 0o755;

/// Extract `tarball` into `dest`, stripping the single wrapping directory.
///
/// The tar/gzip work is synchronous, so it runs on the blocking pool.
pub async fn unpack_tarball(tarball: &Path, dest: &Path) -> Result<(), PublishError> {
    let tarball = tarball.to_path_buf();
    let dest = dest.to_path_buf();
    let archive = tarball.clone();

    let result = tokio::task::spawn_blocking(move || extract(&tarball, &dest))
        .await
        .map_err(|join_error| PublishError::Unpack {
            archive: archive.clone(),
            source: io::Error::other(join_error),
        })?;

    result.map_err(|source| PublishError::Unpack { archive, source })
}

fn extract(tarball: &Path, dest: &Path) -> io::Result<()> {
    let file = File::open(tarball)?;
    let mut archive = Archive::new(GzDecoder::new(file));
    // permissions are normalized below instead
    archive.set_preserve_permissions(false);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let Some(relative) = strip_wrapping_dir(&entry.path()?) else {
            continue;
        };
        // a crafted archive must not write outside the destination
        if relative
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            continue;
        }

        let target = dest.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let entry_type = entry.header().entry_type();
        let mode = entry.header().mode().unwrap_or(0);
        entry.unpack(&target)?;

        if entry_type.is_dir() || entry_type.is_file() {
            ensure_min_permissions(&target, mode, entry_type.is_dir())?;
        }
    }

    Ok(())
}

/// Drop the first path component; `None` when nothing remains
fn strip_wrapping_dir(path: &Path) -> Option<PathBuf> {
    let mut components = path.components();
    components.next()?;
    let rest = components.as_path();
    if rest.as_os_str().is_empty() {
        None
    } else {
        Some(rest.to_path_buf())
    }
}

#[cfg(unix)]
fn ensure_min_permissions(target: &Path, mode: u32, is_dir: bool) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let min = if is_dir { MIN_DIR_PERMS } else { MIN_FILE_PERMS };
    std::fs::set_permissions(target, std::fs::Permissions::from_mode(mode | min))
}

#[cfg(not(unix))]
fn ensure_min_permissions(_target: &Path, _mode: u32, _is_dir: bool) -> io::Result<()> {
    Ok(())
}
