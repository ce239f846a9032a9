//! Daily timelapse synthesis.
//!
//! Scans the stills a camera accumulated during one day, thins them to at
//! most two frames a minute, drives the external encoder over the surviving
//! frames, and stores the result back into the repository as generated
//! media: the middle frame becomes the cover still, the webm its adjunct.

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use log::{debug, info, warn};

use crate::common::{
    MIN_FRAME_SPACING_SECS, TIMELAPSE_FPS, TIMELAPSE_SUNRISE_LEAD_MINS, TIMELAPSE_SUNSET_LAG_MINS,
};
use crate::repository::{Image, MediaKind, Repository};
use crate::system::camera::Camera;

use super::encoder::VideoEncoder;

/// Generate a timelapse for all of `camera`'s images of `kind` taken during
/// `date`. Diurnal cameras narrow the window to the local daylight hours.
/// Finding no candidate images is not an error.
pub fn generate_timelapse(
    repo: &Repository,
    encoder: &dyn VideoEncoder,
    date: NaiveDate,
    camera: &Camera,
    kind: MediaKind,
) -> Result<()> {
    if !matches!(kind, MediaKind::Collected | MediaKind::Motion) {
        bail!("cannot generate timelapse for '{}' content", kind);
    }

    let mut bounds = day_bounds(camera, date)?;
    if camera.diurnal {
        if let Some(window) = daylight_window(camera, date) {
            bounds = window;
        }
    }
    let (start, end) = bounds;
    debug!(
        "timelapse range for '{}' on {}: [{}, {})",
        camera.id, date, start, end
    );

    let mut candidates: Vec<Image> = repo
        .list_kind(&camera.id, kind)?
        .into_iter()
        .filter(|img| img.timestamp >= start && img.timestamp < end)
        .collect();
    candidates.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.handle.cmp(&b.handle)));

    let kept = thin_frames(&candidates);
    if kept.is_empty() {
        warn!("no images from which to generate timelapse");
        return Ok(());
    }

    let frames = kept
        .iter()
        .map(|img| repo.data_path(&img.source, &format!("{}.jpg", img.handle)))
        .collect::<Result<Vec<PathBuf>>>()?;

    // temp artifacts live in the tempdir and vanish with it, success or not
    let tmp = tempfile::Builder::new()
        .prefix("timelapse-")
        .tempdir()
        .context("failed to create timelapse tempdir")?;
    let webm_path = tmp.path().join("generated.webm");

    encoder.encode(&frames, TIMELAPSE_FPS, &webm_path)?;
    let webm = fs::read(&webm_path).context("failed to read encoded timelapse")?;

    // the middle frame makes a representative cover still
    let cover = &kept[kept.len() / 2];
    let still = cover.retrieve(repo)?;

    let mut generated = repo.store(&camera.id, &still)?;
    generated.link_video(repo, &webm)?;
    generated.pin(repo, MediaKind::Generated)?;

    info!(
        "generated timelapse for '{}' from {} images",
        camera.id,
        kept.len()
    );
    Ok(())
}

/// The camera-local day `[midnight, next midnight)` as instants.
fn day_bounds(camera: &Camera, date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start_naive = date.and_hms_opt(0, 0, 0).expect("midnight is valid");
    let end_naive = date
        .succ_opt()
        .context("date out of range")?
        .and_hms_opt(0, 0, 0)
        .expect("midnight is valid");

    match camera.location() {
        Some(tz) => Ok((
            tz.from_local_datetime(&start_naive)
                .earliest()
                .context("no local midnight")?
                .with_timezone(&Utc),
            tz.from_local_datetime(&end_naive)
                .earliest()
                .context("no local midnight")?
                .with_timezone(&Utc),
        )),
        None => Ok((
            chrono::Local
                .from_local_datetime(&start_naive)
                .earliest()
                .context("no local midnight")?
                .with_timezone(&Utc),
            chrono::Local
                .from_local_datetime(&end_naive)
                .earliest()
                .context("no local midnight")?
                .with_timezone(&Utc),
        )),
    }
}

/// The daylight capture window for `date`: sunrise − 35 min to
/// sunset + 45 min. None when the camera's position resolves no timezone.
pub fn daylight_window(camera: &Camera, date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let (rise, set) = camera.local_daylight(date)?;
    Some((
        (rise - Duration::minutes(TIMELAPSE_SUNRISE_LEAD_MINS)).with_timezone(&Utc),
        (set + Duration::minutes(TIMELAPSE_SUNSET_LAG_MINS)).with_timezone(&Utc),
    ))
}

/// Walk candidates in ascending order, dropping any frame closer than
/// `MIN_FRAME_SPACING_SECS` to the previously kept one. Enforces no more
/// than 2 frames per minute.
fn thin_frames(candidates: &[Image]) -> Vec<Image> {
    let mut next: Option<DateTime<Utc>> = None;
    let mut kept = Vec::new();
    for img in candidates {
        if let Some(next) = next {
            if img.timestamp < next {
                continue;
            }
        }
        next = Some(img.timestamp + Duration::seconds(MIN_FRAME_SPACING_SECS));
        kept.push(img.clone());
    }
    kept
}
