//! Manually generate timelapses for one camera's recent days.
//!
//! Usage: `mktl <camera-id> [days-back]` — regenerates the collected
//! and/or motion timelapse (per the camera's selector) for each of the
//! last `days-back` days, default 2.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Local};
use log::info;

use argus::common::errors::RepoError;
use argus::config::Config;
use argus::operations::encoder::Mencoder;
use argus::operations::timelapse::generate_timelapse;
use argus::repository::{MediaKind, Repository};
use argus::system::CameraStore;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let camera_id = args.next().context("usage: mktl <camera-id> [days-back]")?;
    let days_back: i64 = match args.next() {
        Some(raw) => raw.parse().context("days-back must be a number")?,
        None => 2,
    };

    let config = Config::load()?;
    let cameras = Arc::new(CameraStore::open(&config.cameras.sqlite_path)?);
    let repo = Repository::new(
        &config.repository.base_directory,
        config.retention()?,
        Arc::clone(&cameras),
    )?;
    let encoder = Mencoder::new(config.encoder.program.clone());

    let camera = cameras
        .get_camera(&camera_id)?
        .ok_or_else(|| RepoError::UnknownCamera(camera_id.clone()))?;

    let today = Local::now().date_naive();
    for days_ago in 1..=days_back {
        let date = today - Duration::days(days_ago);
        for kind in [MediaKind::Collected, MediaKind::Motion] {
            if !camera.timelapse.includes(kind) {
                continue;
            }
            info!("generating {} timelapse for '{}' on {}", kind, camera.id, date);
            generate_timelapse(&repo, &encoder, date, &camera, kind)?;
        }
    }
    Ok(())
}
