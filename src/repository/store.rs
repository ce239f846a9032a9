//! Content-addressed ingest.

use std::borrow::Cow;
use std::fs;
use std::io::ErrorKind;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::error;
use sha2::{Digest, Sha256};

use crate::common::errors::RepoError;
use crate::common::FILE_MODE;
use crate::operations::dewarp::dewarp_fisheye;
use crate::utils::write_new_file;

use super::{Handle, Image, Repository};

impl Repository {
    /// Store a still received from `source`. The bytes are hashed (after
    /// dewarping, for cameras that need it) and written to the canonical
    /// store if and only if that digest is not already present, so the
    /// operation is idempotent on identical input.
    ///
    /// The returned image is not yet referenced by any kind; callers pin
    /// it or let the next GC reclaim it.
    pub fn store(&self, source: &str, bytes: &[u8]) -> Result<Image> {
        let camera = self
            .cameras()
            .get_camera(source)?
            .ok_or_else(|| RepoError::UnknownCamera(source.to_string()))?;

        let bytes: Cow<'_, [u8]> = if camera.dewarp {
            Cow::Owned(dewarp_fisheye(bytes).context("failed to dewarp ingress image")?)
        } else {
            Cow::Borrowed(bytes)
        };

        // the image's stable identity is its digest
        let handle = content_handle(&bytes);
        let path = self.data_path(source, &format!("{}.jpg", handle))?;

        match fs::metadata(&path) {
            Ok(_) => error!("file hash collision?! '{}'", handle),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                match write_new_file(&path, &bytes, FILE_MODE) {
                    Ok(()) => {}
                    // a concurrent store of the same bytes won the race
                    Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                        error!("file hash collision?! '{}'", handle)
                    }
                    Err(err) => return Err(err).context(format!("failed to write {:?}", path)),
                }
            }
            Err(err) => return Err(err).context(format!("failed to stat {:?}", path)),
        }

        let meta = fs::metadata(&path).context(format!("failed to stat {:?}", path))?;
        let timestamp: DateTime<Utc> = meta
            .modified()
            .context(format!("failed to read mtime of {:?}", path))?
            .into();

        Ok(Image {
            handle,
            source: source.to_string(),
            timestamp,
            has_video: false,
        })
    }
}

/// Digest `bytes` into a handle: the full SHA-256, rendered as 64 lowercase
/// hex characters.
pub fn content_handle(bytes: &[u8]) -> Handle {
    let digest = Sha256::digest(bytes);
    Handle::from(&hex::encode(digest)).unwrap()
}
