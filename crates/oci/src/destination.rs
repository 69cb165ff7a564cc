//! Validated pull destinations.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// An existing directory that artifact content will be extracted into.
///
/// Construction checks the directory exists; it is never created here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullDestination {
    path: PathBuf,
}

impl PullDestination {
    /// Validate `path` as a pull destination.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDestination`] if the path is empty, does not
    /// exist, or is not a directory.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(Error::invalid_destination(path, "output path is required"));
        }

        let metadata = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::invalid_destination(path, "path does not exist")
            } else {
                Error::invalid_destination(path, e.to_string())
            }
        })?;

        if !metadata.is_dir() {
            return Err(Error::invalid_destination(path, "path is not a directory"));
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// The destination directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsRef<Path> for PullDestination {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}
