//! Background schedule wiring.
//!
//! On repository start, five long-lived tasks come up: the midnight
//! timelapser (for yesterday) and the early-morning purge and GC passes.

pub mod scheduler;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDate, Utc};
use log::error;

use crate::common::SCHEDULER_RUNTIME;
use crate::operations::encoder::VideoEncoder;
use crate::operations::timelapse::generate_timelapse;
use crate::repository::{MediaKind, Repository};

use scheduler::spawn_daily;

/// Start the default daily schedule. The returned handles run forever;
/// dropping them detaches the tasks.
pub fn start_schedule(repo: Arc<Repository>, encoder: Arc<dyn VideoEncoder>) {
    {
        let repo = Arc::clone(&repo);
        spawn_daily("timelapser", 0, 0, move || {
            let yesterday = Local::now()
                .date_naive()
                .pred_opt()
                .context("no yesterday for this date")?;
            run_timelapser(&repo, &encoder, yesterday)
        });
    }

    {
        let repo = Arc::clone(&repo);
        spawn_daily("purge-collected", 4, 0, move || {
            repo.purge_before(MediaKind::Collected, Utc::now() - Duration::hours(24))
        });
    }
    {
        let repo = Arc::clone(&repo);
        spawn_daily("purge-motion", 4, 15, move || {
            repo.purge_before(MediaKind::Motion, Utc::now() - Duration::hours(24))
        });
    }
    {
        let repo = Arc::clone(&repo);
        let retention = Duration::from_std(repo.retention_period())
            .expect("retention period fits in a time delta");
        spawn_daily("purge-generated", 4, 30, move || {
            repo.purge_before(MediaKind::Generated, Utc::now() - retention)
        });
    }
    spawn_daily("gc", 4, 45, move || repo.gc());
}

/// One timelapser wake-up: fan out a generation task per camera and kind.
/// A kind the camera's timelapse selector excludes spawns nothing.
fn run_timelapser(
    repo: &Arc<Repository>,
    encoder: &Arc<dyn VideoEncoder>,
    date: NaiveDate,
) -> Result<()> {
    for camera in repo.cameras().cameras()? {
        for kind in [MediaKind::Collected, MediaKind::Motion] {
            if !camera.timelapse.includes(kind) {
                continue;
            }
            let repo = Arc::clone(repo);
            let encoder = Arc::clone(encoder);
            let camera = camera.clone();
            SCHEDULER_RUNTIME.spawn_blocking(move || {
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    generate_timelapse(&repo, encoder.as_ref(), date, &camera, kind)
                }));
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        error!("error generating timelapse for '{}': {:?}", camera.id, err)
                    }
                    Err(_) => error!("panic generating timelapse for '{}'", camera.id),
                }
            });
        }
    }
    Ok(())
}
