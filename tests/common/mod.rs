#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use argus::repository::Repository;
use argus::system::{Camera, CameraStore};
use chrono::{DateTime, Utc};
use filetime::FileTime;
use image::{ImageBuffer, ImageFormat, Rgb};
use tempfile::TempDir;

pub struct TestSite {
    pub dir: TempDir,
    pub cameras: Arc<CameraStore>,
    pub repo: Repository,
}

/// A repository plus camera store in a fresh tempdir.
pub fn site() -> TestSite {
    let dir = TempDir::new().expect("tempdir should be created");
    let cameras =
        Arc::new(CameraStore::open(&dir.path().join("config.db")).expect("camera store should open"));
    let repo = Repository::new(
        &dir.path().join("media"),
        Duration::from_secs(14 * 24 * 3600),
        Arc::clone(&cameras),
    )
    .expect("repository should initialize");
    TestSite { dir, cameras, repo }
}

pub fn plain_camera(id: &str) -> Camera {
    Camera {
        id: id.to_string(),
        name: format!("Camera {}", id),
        ..Camera::default()
    }
}

/// A small valid JPEG whose bytes vary with `seed`.
pub fn jpeg_fixture(seed: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(16, 16, |x, y| {
        Rgb([
            ((x + seed) % 256) as u8,
            ((y + seed * 7) % 256) as u8,
            ((x + y + seed * 13) % 256) as u8,
        ])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Jpeg)
        .expect("fixture should encode");
    out.into_inner()
}

/// Canonical path of `handle`.`ext` for `camera` under the repository root.
pub fn canonical_path(repo: &Repository, camera: &str, handle: &str, ext: &str) -> PathBuf {
    repo.base_directory()
        .join(camera)
        .join("data")
        .join(&handle[..3])
        .join(format!("{}.{}", handle, ext))
}

/// Reference path of `handle`.`ext` in `segment` for `camera`.
pub fn reference_path(
    repo: &Repository,
    camera: &str,
    segment: &str,
    handle: &str,
    ext: &str,
) -> PathBuf {
    repo.base_directory()
        .join(camera)
        .join(segment)
        .join(format!("{}.{}", handle, ext))
}

pub fn set_mtime(path: &Path, when: DateTime<Utc>) {
    filetime::set_file_mtime(path, FileTime::from_unix_time(when.timestamp(), 0))
        .expect("mtime should be settable");
}

pub fn is_symlink(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|meta| meta.file_type().is_symlink())
        .unwrap_or(false)
}
