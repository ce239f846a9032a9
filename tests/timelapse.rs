//! Timelapse generation scenarios driven through a fake encoder.

mod common;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use argus::common::errors::RepoError;
use argus::operations::encoder::VideoEncoder;
use argus::operations::timelapse::generate_timelapse;
use argus::repository::MediaKind;
use argus::system::TimelapseSelector;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use common::*;

const FAKE_WEBM: &[u8] = b"\x1a\x45\xdf\xa3fake-webm";

/// Synthesizes a trivial webm and records every invocation.
#[derive(Default)]
struct FakeEncoder {
    calls: Mutex<Vec<Vec<PathBuf>>>,
}

impl FakeEncoder {
    fn calls(&self) -> Vec<Vec<PathBuf>> {
        self.calls.lock().expect("no poisoned lock").clone()
    }
}

impl VideoEncoder for FakeEncoder {
    fn encode(&self, frames: &[PathBuf], _fps: u32, output: &Path) -> Result<()> {
        self.calls
            .lock()
            .expect("no poisoned lock")
            .push(frames.to_vec());
        fs::write(output, FAKE_WEBM)?;
        Ok(())
    }
}

/// Always reports a crashed encoder binary.
struct FailingEncoder;

impl VideoEncoder for FailingEncoder {
    fn encode(&self, _frames: &[PathBuf], _fps: u32, _output: &Path) -> Result<()> {
        Err(RepoError::EncoderFailure("'mencoder' exited with status code 1".to_string()).into())
    }
}

/// Store `count` collected stills spaced `spacing_secs` apart from `base`.
fn seed_collected(
    site: &TestSite,
    camera: &str,
    base: chrono::DateTime<Utc>,
    count: u32,
    spacing_secs: i64,
) -> Vec<argus::repository::Image> {
    let mut images = Vec::new();
    for i in 0..count {
        let img = site
            .repo
            .store(camera, &jpeg_fixture(1000 + i))
            .expect("store should succeed");
        img.pin(&site.repo, MediaKind::Collected)
            .expect("pin should succeed");
        set_mtime(
            &canonical_path(&site.repo, camera, &img.handle, "jpg"),
            base + Duration::seconds(i as i64 * spacing_secs),
        );
        images.push(img);
    }
    images
}

fn greenwich_camera(id: &str) -> argus::system::Camera {
    let mut camera = plain_camera(id);
    camera.latitude = 51.4769;
    camera.longitude = -0.0005;
    camera.timelapse = TimelapseSelector::Collected;
    camera
}

#[test]
fn a_days_stills_become_one_generated_timelapse() {
    let site = site();
    let camera = greenwich_camera("cam1");
    site.cameras
        .upsert_camera(&camera)
        .expect("camera should insert");

    // 120 stills every 10 s starting 10:00 UTC (winter London == UTC)
    let base = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
    let seeded = seed_collected(&site, "cam1", base, 120, 10);

    let encoder = FakeEncoder::default();
    let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    generate_timelapse(&site.repo, &encoder, date, &camera, MediaKind::Collected)
        .expect("generation should succeed");

    // 29 s spacing over 10 s candidates keeps every third frame
    let calls = encoder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 40);

    let generated = site
        .repo
        .list_kind("cam1", MediaKind::Generated)
        .expect("list should succeed");
    assert_eq!(generated.len(), 1);
    assert!(generated[0].has_video);
    assert_eq!(
        generated[0]
            .retrieve_video(&site.repo)
            .expect("video should retrieve"),
        FAKE_WEBM
    );

    // the cover still is the middle kept frame (index 20 of 40 == still 60)
    assert_eq!(
        generated[0].retrieve(&site.repo).expect("cover should retrieve"),
        seeded[60].retrieve(&site.repo).expect("source should retrieve")
    );

    // both reference links exist
    assert!(is_symlink(&reference_path(
        &site.repo,
        "cam1",
        "generated",
        &generated[0].handle,
        "jpg"
    )));
    assert!(is_symlink(&reference_path(
        &site.repo,
        "cam1",
        "generated",
        &generated[0].handle,
        "webm"
    )));
}

#[test]
fn diurnal_cameras_only_cover_daylight() {
    let site = site();
    let mut camera = plain_camera("equator");
    camera.diurnal = true;
    camera.latitude = 0.0;
    camera.longitude = 0.0;
    camera.timelapse = TimelapseSelector::Collected;
    site.cameras
        .upsert_camera(&camera)
        .expect("camera should insert");

    // On the equinox at (0, 0): 02:00 UTC is deep night, noon is daylight,
    // 23:00 UTC is past sunset + 45 min.
    let date = NaiveDate::from_ymd_opt(2024, 3, 20).unwrap();
    let mut noon_handle = None;
    for (seed, hour) in [(1u32, 2u32), (2, 12), (3, 23)] {
        let img = site
            .repo
            .store("equator", &jpeg_fixture(seed))
            .expect("store should succeed");
        img.pin(&site.repo, MediaKind::Collected)
            .expect("pin should succeed");
        set_mtime(
            &canonical_path(&site.repo, "equator", &img.handle, "jpg"),
            Utc.with_ymd_and_hms(2024, 3, 20, hour, 0, 0).unwrap(),
        );
        if hour == 12 {
            noon_handle = Some(img.handle);
        }
    }

    let encoder = FakeEncoder::default();
    generate_timelapse(&site.repo, &encoder, date, &camera, MediaKind::Collected)
        .expect("generation should succeed");

    let calls = encoder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].len(), 1, "night samples must be excluded");
    let noon_handle = noon_handle.expect("noon image was seeded");
    assert!(calls[0][0]
        .to_string_lossy()
        .contains(noon_handle.as_str()));
}

#[test]
fn no_candidates_is_not_an_error() {
    let site = site();
    let camera = greenwich_camera("cam1");
    site.cameras
        .upsert_camera(&camera)
        .expect("camera should insert");

    let encoder = FakeEncoder::default();
    let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    generate_timelapse(&site.repo, &encoder, date, &camera, MediaKind::Collected)
        .expect("an empty day should be a no-op");
    assert!(encoder.calls().is_empty());
    assert!(site
        .repo
        .list_kind("cam1", MediaKind::Generated)
        .expect("list should succeed")
        .is_empty());
}

#[test]
fn encoder_failure_fails_the_job_and_stores_nothing() {
    let site = site();
    let camera = greenwich_camera("cam1");
    site.cameras
        .upsert_camera(&camera)
        .expect("camera should insert");

    let base = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
    seed_collected(&site, "cam1", base, 3, 60);

    let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let err = generate_timelapse(&site.repo, &FailingEncoder, date, &camera, MediaKind::Collected)
        .expect_err("encoder failure should propagate");
    assert!(matches!(
        err.downcast_ref::<RepoError>(),
        Some(RepoError::EncoderFailure(_))
    ));
    assert!(site
        .repo
        .list_kind("cam1", MediaKind::Generated)
        .expect("list should succeed")
        .is_empty());
}

#[test]
fn timelapse_of_saved_content_is_refused() {
    let site = site();
    let camera = greenwich_camera("cam1");
    site.cameras
        .upsert_camera(&camera)
        .expect("camera should insert");

    let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
    let encoder = FakeEncoder::default();
    generate_timelapse(&site.repo, &encoder, date, &camera, MediaKind::Saved)
        .expect_err("saved content cannot be timelapsed");
    assert!(encoder.calls().is_empty());
}

#[test]
fn the_core_stores_at_night_dark_hours_are_the_callers_check() {
    let site = site();
    let mut camera = plain_camera("cam1");
    camera.diurnal = true;
    camera.dewarp = true;
    camera.latitude = 40.7128;
    camera.longitude = -74.0060;
    site.cameras
        .upsert_camera(&camera)
        .expect("camera should insert");

    // 2 a.m. in New York: the ingest layer would drop this...
    let two_am_local = Utc.with_ymd_and_hms(2024, 1, 15, 7, 0, 0).unwrap();
    assert!(camera.is_dark(two_am_local));

    // ...but the repository itself stores whatever it is handed
    let img = site
        .repo
        .store("cam1", &jpeg_fixture(50))
        .expect("the core performs no dark-hour check");
    assert!(canonical_path(&site.repo, "cam1", &img.handle, "jpg").is_file());

    // and at noon the camera is not dark anyway
    let noon_local = Utc.with_ymd_and_hms(2024, 1, 15, 17, 0, 0).unwrap();
    assert!(!camera.is_dark(noon_local));
}
