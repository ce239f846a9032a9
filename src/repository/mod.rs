//! Filesystem-backed, content-addressed media repository.
//!
//! The base directory for a given camera is `<root>/<camera>/data` — all
//! images received from that camera live in this tree. Images are
//! content-addressed via their SHA-256 digest, grouped into intermediate
//! directories named by the first 3 characters of the digest to keep
//! directory entries bounded:
//!
//! `<root>/dachacam/data/fee/feedface….jpg`
//!
//! Once stored, an image must be pinned or the next GC pass reclaims it.
//! Pinning is a symlink from a kind directory (no intermediate grouping)
//! to the data file:
//!
//! `<root>/dachacam/collected/feedface….jpg`
//!
//! Collected and motion references are purged every 24 hours, generated
//! timelapses after the configured retention period, and pinned (saved)
//! references never. Any data file referenced by no kind is removed on the
//! next GC run.

pub mod image;
pub mod kind;
mod paths;
mod store;

pub use self::image::{Handle, Image};
pub use self::kind::MediaKind;
pub use self::store::content_handle;

use std::collections::HashSet;
use std::fs;
use std::path::{self, Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use path_clean::PathClean;
use regex::Regex;

use crate::common::errors::RepoError;
use crate::common::{DATA_SEGMENT, HANDLE_PREFIX_LEN, RECENTS_CAP, SIDE_LIST_CAP};
use crate::system::CameraStore;
use crate::utils::PathExt;

static HANDLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new("^[0-9a-f]{64}$").unwrap());

/// Owns and oversees the directory tree where camera media is stored.
pub struct Repository {
    base_directory: PathBuf,
    retention_period: Duration,
    cameras: Arc<CameraStore>,
}

/// Recent activity for one camera, each list newest-first.
#[derive(Debug, Default)]
pub struct Recents {
    /// Mixed collected + motion, capped at 7.
    pub recents: Vec<Image>,
    /// Saved, capped at 4.
    pub saved: Vec<Image>,
    /// Generated, capped at 4.
    pub generated: Vec<Image>,
    /// Motion alone, capped at 4.
    pub motion: Vec<Image>,
}

impl Repository {
    /// Prepare the repository rooted at `base_directory`, creating the root
    /// if necessary.
    pub fn new(
        base_directory: &Path,
        retention_period: Duration,
        cameras: Arc<CameraStore>,
    ) -> Result<Self> {
        use std::os::unix::fs::DirBuilderExt;

        let base_directory = path::absolute(base_directory)
            .context(format!("failed to resolve repository root {:?}", base_directory))?
            .clean();
        if !base_directory.exists() {
            fs::DirBuilder::new()
                .recursive(true)
                .mode(crate::common::DIR_MODE)
                .create(&base_directory)
                .context(format!("failed to create repository root {:?}", base_directory))?;
        }
        Ok(Self {
            base_directory,
            retention_period,
            cameras,
        })
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    pub fn retention_period(&self) -> Duration {
        self.retention_period
    }

    pub fn cameras(&self) -> &CameraStore {
        &self.cameras
    }

    /// All images of `kind` associated with `source`. `.webm` adjuncts are
    /// not returned as handles; they mark their still as having video.
    pub fn list_kind(&self, source: &str, kind: MediaKind) -> Result<Vec<Image>> {
        if self.cameras.get_camera(source)?.is_none() {
            return Err(RepoError::UnknownCamera(source.to_string()).into());
        }

        let dir = self.dir_for(source, kind)?;
        let mut images = Vec::new();
        for entry in fs::read_dir(&dir).context(format!("failed to list {:?}", dir))? {
            let entry = entry.context(format!("failed to read an entry of {:?}", dir))?;
            let name = entry.file_name();
            let name = name.to_str().ok_or_else(|| {
                RepoError::Corruption(format!("non-unicode name in {:?}", dir))
            })?;
            let path = entry.path();
            let ext = path.ext_lower();
            if ext.is_empty() {
                return Err(RepoError::Corruption(format!(
                    "'{}' does not follow the naming convention",
                    name
                ))
                .into());
            }
            if ext != "jpg" {
                // .webm files live alongside their .jpg still images, but
                // they are not returned as handles
                continue;
            }
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            let handle = Handle::from(stem).map_err(|_| {
                RepoError::Corruption(format!("'{}' is too long to be a handle", name))
            })?;
            let has_video =
                kind == MediaKind::Generated || dir.join(format!("{}.webm", stem)).exists();
            images.push(Image {
                handle,
                source: source.to_string(),
                timestamp: entry_mtime(&dir, &entry)?,
                has_video,
            });
        }
        Ok(images)
    }

    /// Find the image whose filename begins with `handle`, looking across
    /// every kind directory of every known camera. Returns the first match
    /// in scan order; callers must not depend on which kind's record wins
    /// when several reference the same handle.
    pub fn locate(&self, handle: &str) -> Result<Option<Image>> {
        for kind in MediaKind::ALL {
            for camera in self.cameras.cameras()? {
                let dir = self.dir_for(&camera.id, kind)?;
                for entry in fs::read_dir(&dir).context(format!("failed to list {:?}", dir))? {
                    let entry = entry.context(format!("failed to read an entry of {:?}", dir))?;
                    let name = entry.file_name();
                    let Some(name) = name.to_str() else { continue };
                    if kind == MediaKind::Generated && !name.ends_with(".jpg") {
                        continue;
                    }
                    if !name.starts_with(handle) {
                        continue;
                    }
                    let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name);
                    let full_handle = Handle::from(stem).map_err(|_| {
                        RepoError::Corruption(format!("'{}' is too long to be a handle", name))
                    })?;
                    let has_video = kind == MediaKind::Generated
                        || dir.join(format!("{}.webm", stem)).exists();
                    return Ok(Some(Image {
                        handle: full_handle,
                        source: camera.id.clone(),
                        timestamp: entry_mtime(&dir, &entry)?,
                        has_video,
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Recent photo activity for `camera`: up to 7 most recent images
    /// (collected or motion), and up to 4 most recent of the others.
    pub fn recents(&self, camera: &str) -> Result<Recents> {
        let mut recents = Recents::default();

        for kind in MediaKind::ALL {
            for img in self.list_kind(camera, kind)? {
                match kind {
                    // recents is a *mix* of collected + motion
                    MediaKind::Collected => recents.recents.push(img),
                    MediaKind::Motion => {
                        recents.motion.push(img.clone());
                        recents.recents.push(img);
                    }
                    MediaKind::Saved => recents.saved.push(img),
                    MediaKind::Generated => recents.generated.push(img),
                    MediaKind::Unknown => unreachable!("ALL contains no sentinel"),
                }
            }
        }

        for list in [
            &mut recents.recents,
            &mut recents.saved,
            &mut recents.generated,
            &mut recents.motion,
        ] {
            // newest first; equal timestamps fall back to handle order so
            // the result is deterministic
            list.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(a.handle.cmp(&b.handle)));
        }
        recents.recents.truncate(RECENTS_CAP);
        recents.saved.truncate(SIDE_LIST_CAP);
        recents.generated.truncate(SIDE_LIST_CAP);
        recents.motion.truncate(SIDE_LIST_CAP);

        Ok(recents)
    }

    /// The most recent image received from `source`, across collected and
    /// motion.
    pub fn latest(&self, source: &str) -> Result<Option<Image>> {
        let mut latest: Option<Image> = None;
        for kind in [MediaKind::Collected, MediaKind::Motion] {
            for img in self.list_kind(source, kind)? {
                match &latest {
                    Some(cur) if img.timestamp <= cur.timestamp => {}
                    _ => latest = Some(img),
                }
            }
        }
        Ok(latest)
    }

    /// Remove all `kind` references older than `cutoff`, for every camera.
    /// Only the references go away; orphaned canonical bytes are the GC's
    /// problem. Saved references are never purged.
    pub fn purge_before(&self, kind: MediaKind, cutoff: DateTime<Utc>) -> Result<()> {
        if kind == MediaKind::Saved {
            return Ok(());
        }
        for camera in self.cameras.cameras()? {
            let dir = self.dir_for(&camera.id, kind)?;
            for entry in fs::read_dir(&dir).context(format!("failed to list {:?}", dir))? {
                let entry = entry.context(format!("failed to read an entry of {:?}", dir))?;
                if entry
                    .file_type()
                    .context(format!("failed to stat an entry of {:?}", dir))?
                    .is_dir()
                {
                    warn!("encountered dir '{}' where it shouldn't be", dir.display());
                    continue;
                }
                if entry_mtime(&dir, &entry)? < cutoff {
                    let file = self.canon_file(&entry.path())?;
                    fs::remove_file(&file).context(format!("failed to remove {:?}", file))?;
                }
            }
        }
        Ok(())
    }

    /// Garbage-collect canonical files that no kind references.
    ///
    /// The reference set is sampled *before* the data directories are
    /// walked, so a pin that lands mid-pass can only delay reclamation to
    /// the next cycle, never reclaim a referenced file.
    pub fn gc(&self) -> Result<()> {
        let mut referenced: HashSet<Handle> = HashSet::new();
        let cameras = self.cameras.cameras()?;
        for camera in &cameras {
            for kind in MediaKind::ALL {
                for img in self.list_kind(&camera.id, kind)? {
                    referenced.insert(img.handle);
                }
            }
        }

        for camera in &cameras {
            let data_dir = self
                .base_directory
                .join(&camera.id)
                .join(DATA_SEGMENT);
            if !data_dir.exists() {
                continue;
            }
            let data_dir = self.canon_dir(&data_dir)?;
            for entry in fs::read_dir(&data_dir).context(format!("failed to list {:?}", data_dir))? {
                let entry = entry.context(format!("failed to read an entry of {:?}", data_dir))?;
                if !entry
                    .file_type()
                    .context(format!("failed to stat an entry of {:?}", data_dir))?
                    .is_dir()
                {
                    continue;
                }
                if entry.file_name().len() != HANDLE_PREFIX_LEN {
                    // not one of our 3-character fan-out dirs
                    continue;
                }
                let subdir = self.canon_dir(&entry.path())?;
                for leaf in fs::read_dir(&subdir).context(format!("failed to list {:?}", subdir))? {
                    let leaf = leaf.context(format!("failed to read an entry of {:?}", subdir))?;
                    if leaf
                        .file_type()
                        .context(format!("failed to stat an entry of {:?}", subdir))?
                        .is_dir()
                    {
                        continue;
                    }
                    let name = leaf.file_name();
                    let Some(name) = name.to_str() else {
                        debug!("skipping non-unicode file in {:?}", subdir);
                        continue;
                    };
                    let path = leaf.path();
                    let ext = path.ext_lower();
                    let stem = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or_default();
                    if !matches!(ext.as_str(), "jpg" | "webm") || !HANDLE_RE.is_match(stem) {
                        debug!("skipping unrecognized file '{}'", name);
                        continue;
                    }
                    let handle = Handle::from(stem).expect("matched 64 hex chars");
                    if referenced.contains(&handle) {
                        debug!("skipping pinned file '{}'", name);
                        continue;
                    }
                    let file = self.canon_file(&path)?;
                    fs::remove_file(&file).context(format!("failed to remove {:?}", file))?;
                    debug!("removed unpinned file '{}'", file.display());
                }
            }
        }
        Ok(())
    }
}

/// Mtime of a directory entry, read through symlinks: the canonical file's
/// mtime is authoritative for references.
fn entry_mtime(dir: &Path, entry: &fs::DirEntry) -> Result<DateTime<Utc>> {
    let meta = fs::metadata(entry.path())
        .context(format!("failed to stat an entry of {:?}", dir))?;
    let mtime = meta
        .modified()
        .context(format!("failed to read mtime in {:?}", dir))?;
    Ok(mtime.into())
}
