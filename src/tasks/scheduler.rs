//! Wall-clock daily job runner.
//!
//! Each named job is an independent, long-lived task: it sleeps until the
//! next local occurrence of its hour:minute, runs the job body on a
//! blocking thread, and repeats forever. A job that errors or panics is
//! logged and the loop keeps going; process termination is the only stop.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, Local, TimeZone};
use log::{debug, error};
use tokio::task::JoinHandle;

use crate::common::SCHEDULER_RUNTIME;

/// Spawn a task that runs `job` every day at `hour`:`minute` local time.
pub fn spawn_daily<F>(name: &'static str, hour: u32, minute: u32, job: F) -> JoinHandle<()>
where
    F: Fn() -> Result<()> + Send + Sync + 'static,
{
    SCHEDULER_RUNTIME.spawn(daily_loop(name, hour, minute, Arc::new(job)))
}

async fn daily_loop<F>(name: &'static str, hour: u32, minute: u32, job: Arc<F>)
where
    F: Fn() -> Result<()> + Send + Sync + 'static,
{
    loop {
        let now = Local::now();
        let goal = next_occurrence(&now, hour, minute);
        let delta = (goal.clone() - now).to_std().unwrap_or_default();
        debug!("{}: sleeping for {:?} until {}", name, delta, goal.to_rfc3339());
        tokio::time::sleep(delta).await;

        debug!("{}: running as configured", name);
        run_guarded(name, Arc::clone(&job)).await;
    }
}

/// Run one job invocation on a blocking thread, containing both errors and
/// panics so the calling loop survives.
pub(crate) async fn run_guarded<F>(name: &'static str, job: Arc<F>)
where
    F: Fn() -> Result<()> + Send + Sync + 'static,
{
    match tokio::task::spawn_blocking(move || job()).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!("{}: job failed: {:?}", name, err),
        Err(err) if err.is_panic() => error!("{}: panic in job", name),
        Err(err) => error!("{}: job did not complete: {}", name, err),
    }
}

/// The next wall-clock occurrence of `hour`:`minute`, advancing by a day if
/// that time already passed today.
pub(crate) fn next_occurrence<Tz: TimeZone>(
    now: &DateTime<Tz>,
    hour: u32,
    minute: u32,
) -> DateTime<Tz> {
    let mut goal = now
        .date_naive()
        .and_hms_opt(hour, minute, 0)
        .expect("scheduled hour/minute must be a valid wall-clock time");
    if goal < now.naive_local() {
        goal += Duration::days(1);
    }
    now.timezone()
        .from_local_datetime(&goal)
        .earliest()
        // a DST gap swallowed the goal; fall back to a plain 24 h sleep
        .unwrap_or_else(|| now.clone() + Duration::days(1))
}
