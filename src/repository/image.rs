//! The in-memory record of a stored item.
//!
//! An `Image` is a value: it can outlive the lookup that produced it, and
//! every filesystem operation takes the repository explicitly instead of
//! re-deriving camera/kind/handle from a path.

use std::fs;
use std::io::ErrorKind;

use anyhow::{Context, Result};
use arrayvec::ArrayString;
use chrono::{DateTime, Utc};
use log::{debug, error};

use crate::common::errors::RepoError;
use crate::common::FILE_MODE;
use crate::system::camera::Camera;
use crate::utils::write_new_file;

use super::{MediaKind, Repository};

/// Stable content-derived identifier: 64 lowercase hex characters.
pub type Handle = ArrayString<64>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub handle: Handle,
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub has_video: bool,
}

impl Image {
    /// Fetch the canonical JPEG bytes for this image.
    pub fn retrieve(&self, repo: &Repository) -> Result<Vec<u8>> {
        let path = repo.data_path(&self.source, &format!("{}.jpg", self.handle))?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(RepoError::NotFound(format!("image '{}'", self.handle)).into())
            }
            Err(err) => Err(err).context(format!("failed to read {:?}", path)),
        }
    }

    /// Fetch the bytes of the video for which this image is a still.
    pub fn retrieve_video(&self, repo: &Repository) -> Result<Vec<u8>> {
        let path = repo.data_path(&self.source, &format!("{}.webm", self.handle))?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(RepoError::NotFound(format!("video for '{}'", self.handle)).into())
            }
            Err(err) => Err(err).context(format!("failed to read {:?}", path)),
        }
    }

    /// Associate video bytes with this image, which is understood to be a
    /// still frame from the video. Writing an adjunct that already exists
    /// is logged and ignored.
    pub fn link_video(&mut self, repo: &Repository, content: &[u8]) -> Result<()> {
        let path = repo.data_path(&self.source, &format!("{}.webm", self.handle))?;
        match write_new_file(&path, content, FILE_MODE) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                error!("image '{}' already has video", self.handle);
            }
            Err(err) => return Err(err).context(format!("failed to write {:?}", path)),
        }
        self.has_video = true;
        Ok(())
    }

    /// Pin this image into `kind`. This is a link operation, not a copy:
    /// the canonical bytes are kept around as long as at least one kind
    /// references them. Returns true if a new reference was created, false
    /// if the image was already pinned as that kind.
    ///
    /// Images are expected to be created and video (if any) linked before
    /// pinning; a video linked after the pin is not referenced by it.
    pub fn pin(&self, repo: &Repository, kind: MediaKind) -> Result<bool> {
        use std::os::unix::fs::symlink;

        let data_path = repo.data_path(&self.source, &format!("{}.jpg", self.handle))?;
        let dest_dir = repo.dir_for(&self.source, kind)?;

        let dest = repo.canon_file(&dest_dir.join(format!("{}.jpg", self.handle)))?;
        if fs::symlink_metadata(&dest).is_ok() {
            debug!("double pin of '{}' to '{}'", self.handle, kind);
            return Ok(false);
        }
        symlink(&data_path, &dest).context(format!("failed to link {:?}", dest))?;

        // also link the video adjunct, if there is one
        let video_path = repo.data_path(&self.source, &format!("{}.webm", self.handle))?;
        if fs::symlink_metadata(&video_path).is_ok() {
            let dest = repo.canon_file(&dest_dir.join(format!("{}.webm", self.handle)))?;
            if fs::symlink_metadata(&dest).is_err() {
                symlink(&video_path, &dest).context(format!("failed to link {:?}", dest))?;
            }
        }
        Ok(true)
    }

    /// Human-readable hours and minutes in the camera's local time.
    pub fn pretty_time(&self, camera: &Camera) -> String {
        self.format_local(camera, "%-I:%M%P")
    }

    /// Human-readable full date in the camera's local time.
    pub fn pretty_date(&self, camera: &Camera) -> String {
        self.format_local(camera, "%A, %-d %B, %Y")
    }

    fn format_local(&self, camera: &Camera, fmt: &str) -> String {
        match camera.location() {
            Some(tz) => self.timestamp.with_timezone(&tz).format(fmt).to_string(),
            None => self
                .timestamp
                .with_timezone(&chrono::Local)
                .format(fmt)
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn camera_at(latitude: f64, longitude: f64) -> Camera {
        Camera {
            id: "cam1".to_string(),
            name: "Test".to_string(),
            latitude,
            longitude,
            ..Camera::default()
        }
    }

    #[test]
    fn pretty_formats_use_camera_timezone() {
        // 2024-01-15 20:04 UTC is 3:04pm in New York.
        let image = Image {
            handle: Handle::from(&"0".repeat(64)).expect("handle fits"),
            source: "cam1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 20, 4, 0).unwrap(),
            has_video: false,
        };
        let camera = camera_at(40.7128, -74.0060);
        assert_eq!(image.pretty_time(&camera), "3:04pm");
        assert_eq!(image.pretty_date(&camera), "Monday, 15 January, 2024");
    }
}
