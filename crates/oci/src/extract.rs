//! Artifact content extraction.
//!
//! Artifact layers are gzip-compressed tarballs. Content is unpacked into a
//! staging directory first and only moved into the destination once the
//! whole archive has been read.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{Error, Result};

/// Unpack a gzip-compressed tarball into `target`.
///
/// Entry paths are taken relative to `target`; entries that would escape it
/// fail the whole extraction. Symlinks, hard links and special files are
/// skipped. The token is checked between entries.
///
/// Returns the number of regular files written.
pub fn extract_layer(archive_path: &Path, target: &Path, cancel: &CancellationToken) -> Result<usize> {
    let file = File::open(archive_path)?;
    extract_archive(GzDecoder::new(file), target, cancel)
}

/// Unpack an uncompressed tar stream into `target`.
///
/// See [`extract_layer`].
pub fn extract_archive<R: Read>(
    reader: R,
    target: &Path,
    cancel: &CancellationToken,
) -> Result<usize> {
    debug!(target = %target.display(), "Extracting archive");

    let mut archive = Archive::new(reader);
    let mut files = 0;

    let entries = archive
        .entries()
        .map_err(|e| Error::extraction_failed("<archive>", e.to_string()))?;

    for entry in entries {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut entry = entry.map_err(|e| Error::extraction_failed("<archive>", e.to_string()))?;
        let raw_path = entry
            .path()
            .map_err(|e| Error::extraction_failed("<archive>", e.to_string()))?
            .into_owned();
        let entry_name = raw_path.to_string_lossy().to_string();

        let Some(relative) = sanitize_entry_path(&raw_path)? else {
            trace!(entry = %entry_name, "Skipping archive root entry");
            continue;
        };
        let dest = target.join(&relative);

        match entry.header().entry_type() {
            EntryType::Directory => {
                std::fs::create_dir_all(&dest)
                    .map_err(|e| Error::extraction_failed(&entry_name, e.to_string()))?;
            }
            EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                if let Some(parent) = dest.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| Error::extraction_failed(&entry_name, e.to_string()))?;
                }

                let mut out = File::create(&dest)
                    .map_err(|e| Error::extraction_failed(&entry_name, e.to_string()))?;
                std::io::copy(&mut entry, &mut out)
                    .map_err(|e| Error::extraction_failed(&entry_name, e.to_string()))?;

                // Preserve permission bits if available
                #[cfg(unix)]
                if let Ok(mode) = entry.header().mode() {
                    use std::os::unix::fs::PermissionsExt;
                    std::fs::set_permissions(&dest, std::fs::Permissions::from_mode(mode & 0o777))
                        .map_err(|e| Error::extraction_failed(&entry_name, e.to_string()))?;
                }

                trace!(entry = %entry_name, "Extracted file");
                files += 1;
            }
            other => {
                warn!(entry = %entry_name, entry_type = ?other, "Skipping unsupported archive entry");
            }
        }
    }

    debug!(target = %target.display(), files, "Extracted archive");
    Ok(files)
}

/// Normalise an archive entry path to a path relative to the extraction root.
///
/// Leading `./` and `/` are dropped. Returns `None` for the archive root
/// itself and an error for paths that climb out of it.
fn sanitize_entry_path(path: &Path) -> Result<Option<PathBuf>> {
    let mut relative = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir | Component::RootDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(Error::extraction_failed(
                    path.to_string_lossy(),
                    "entry path escapes the destination directory",
                ));
            }
        }
    }

    if relative.as_os_str().is_empty() {
        Ok(None)
    } else {
        Ok(Some(relative))
    }
}

/// Move everything under `staging` into `destination`.
///
/// Directories are merged into existing directories; anything else replaces
/// what is already at the target path. The token is checked before each
/// entry is moved, so nothing new lands once it has fired.
pub fn promote(staging: &Path, destination: &Path, cancel: &CancellationToken) -> Result<()> {
    for entry in std::fs::read_dir(staging)? {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let entry = entry?;
        let from = entry.path();
        let to = destination.join(entry.file_name());
        let target_name = to.display().to_string();

        let from_is_dir = entry.file_type()?.is_dir();
        match std::fs::symlink_metadata(&to) {
            Ok(existing) if existing.is_dir() && from_is_dir => {
                promote(&from, &to, cancel)?;
                continue;
            }
            Ok(existing) if existing.is_dir() => {
                std::fs::remove_dir_all(&to)
                    .map_err(|e| Error::extraction_failed(&target_name, e.to_string()))?;
            }
            Ok(_) => {
                std::fs::remove_file(&to)
                    .map_err(|e| Error::extraction_failed(&target_name, e.to_string()))?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::extraction_failed(&target_name, e.to_string())),
        }

        std::fs::rename(&from, &to).map_err(|e| Error::extraction_failed(&target_name, e.to_string()))?;
    }

    Ok(())
}
