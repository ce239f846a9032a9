//! Path arbitration for the on-disk media tree.
//!
//! Every path the repository touches funnels through these helpers: they
//! resolve to an absolute, lexically-cleaned form and reject anything that
//! lands outside the repository root. Non-existence is legal; an existing
//! entry of the wrong flavor (file where a directory must be, or vice
//! versa) is corruption.

use std::fs::{self, DirBuilder};
use std::io::ErrorKind;
use std::path::{self, Path, PathBuf};

use anyhow::{Context, Result};
use path_clean::PathClean;

use crate::common::errors::RepoError;
use crate::common::{DATA_SEGMENT, DIR_MODE, HANDLE_PREFIX_LEN};

use super::Repository;

impl Repository {
    /// Resolve `dir` to an absolute path beneath the repository root.
    /// The directory does not have to exist, but if it does exist it must
    /// actually be a directory.
    pub(crate) fn canon_dir(&self, dir: &Path) -> Result<PathBuf> {
        let abs = path::absolute(dir)
            .context(format!("failed to resolve directory {:?}", dir))?
            .clean();
        if !abs.starts_with(self.base_directory()) {
            return Err(RepoError::PathEscape {
                path: abs,
                root: self.base_directory().to_path_buf(),
            }
            .into());
        }
        match fs::metadata(&abs) {
            Ok(meta) if !meta.is_dir() => {
                Err(RepoError::Corruption(format!("'{}' is not a directory", abs.display())).into())
            }
            Ok(_) => Ok(abs),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(abs),
            Err(err) => Err(err).context(format!("failed to stat {:?}", abs)),
        }
    }

    /// Resolve `file` to an absolute path whose parent satisfies
    /// [`canon_dir`](Self::canon_dir). The file does not have to exist, but
    /// if it does exist it must not be a directory.
    pub(crate) fn canon_file(&self, file: &Path) -> Result<PathBuf> {
        let parent = file
            .parent()
            .ok_or_else(|| RepoError::Corruption(format!("'{}' has no parent", file.display())))?;
        let parent = self.canon_dir(parent)?;

        let abs = path::absolute(file)
            .context(format!("failed to resolve file {:?}", file))?
            .clean();
        if !abs.starts_with(&parent) {
            return Err(RepoError::PathEscape {
                path: abs,
                root: self.base_directory().to_path_buf(),
            }
            .into());
        }
        match fs::metadata(&abs) {
            Ok(meta) if meta.is_dir() => {
                Err(RepoError::Corruption(format!("'{}' is a directory", abs.display())).into())
            }
            Ok(_) => Ok(abs),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(abs),
            Err(err) => Err(err).context(format!("failed to stat {:?}", abs)),
        }
    }

    /// [`canon_dir`](Self::canon_dir), then create the directory (and any
    /// missing ancestors) at mode 0770.
    pub(crate) fn assert_dir(&self, dir: &Path) -> Result<PathBuf> {
        use std::os::unix::fs::DirBuilderExt;

        let dir = self.canon_dir(dir)?;
        if !dir.exists() {
            DirBuilder::new()
                .recursive(true)
                .mode(DIR_MODE)
                .create(&dir)
                .context(format!("failed to create directory tree {:?}", dir))?;
        }
        Ok(dir)
    }

    /// Absolute path of `filename` in the canonical store of `source`,
    /// fanned out by the first three characters of the name. The fan-out
    /// directory is created on demand.
    pub(crate) fn data_path(&self, source: &str, filename: &str) -> Result<PathBuf> {
        if filename.len() < HANDLE_PREFIX_LEN {
            return Err(RepoError::Corruption(format!("filename '{}' is too short", filename)).into());
        }
        let prefix = &filename[..HANDLE_PREFIX_LEN];
        let dir = self
            .base_directory()
            .join(source)
            .join(DATA_SEGMENT)
            .join(prefix);
        let dir = self.assert_dir(&dir)?;
        Ok(dir.join(filename))
    }

    /// Directory holding `kind` references for `source`; created on demand.
    pub(crate) fn dir_for(&self, source: &str, kind: super::MediaKind) -> Result<PathBuf> {
        if kind == super::MediaKind::Unknown {
            return Err(RepoError::Corruption("cannot resolve a directory for unknown media kind".to_string()).into());
        }
        let camera_dir = self.assert_dir(&self.base_directory().join(source))?;
        self.assert_dir(&camera_dir.join(kind.segment()))
    }
}
