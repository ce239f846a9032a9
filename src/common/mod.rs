pub mod errors;

/// Length of an image handle: a full SHA-256 digest rendered as hex.
pub const HANDLE_LEN: usize = 64;

/// Leading handle characters used for the canonical-store fan-out (4096-way).
pub const HANDLE_PREFIX_LEN: usize = 3;

/// Directory segment holding the canonical content-addressed bytes.
pub const DATA_SEGMENT: &'static str = "data";

pub const DIR_MODE: u32 = 0o770;

pub const FILE_MODE: u32 = 0o660;

/// Maximum entries returned in the mixed collected+motion recents list.
pub const RECENTS_CAP: usize = 7;

/// Maximum entries returned in each of the pinned/generated/motion lists.
pub const SIDE_LIST_CAP: usize = 4;

/// Minimum spacing between kept timelapse frames (at most 2 frames/minute).
pub const MIN_FRAME_SPACING_SECS: i64 = 29;

pub const TIMELAPSE_FPS: u32 = 24;

// Daylight-window offsets. These are asymmetric across call sites on
// purpose: the timelapser opens the window wider than the ingest check.
pub const TIMELAPSE_SUNRISE_LEAD_MINS: i64 = 35;
pub const TIMELAPSE_SUNSET_LAG_MINS: i64 = 45;
pub const INGEST_DARK_MARGIN_MINS: i64 = 15;

use std::sync::LazyLock;

use rayon::{ThreadPool, ThreadPoolBuilder};
use tokio::runtime::{Builder, Runtime};

pub static CURRENT_NUM_THREADS: LazyLock<usize> = LazyLock::new(|| rayon::current_num_threads());

// Scheduler-specific Tokio Runtime
// This runtime carries the long-lived purge/GC/timelapse loops and the
// per-camera timelapse fan-out tasks.
pub static SCHEDULER_RUNTIME: LazyLock<Runtime> = LazyLock::new(|| {
    Builder::new_multi_thread()
        .worker_threads(*CURRENT_NUM_THREADS)
        .thread_name("scheduler-worker")
        .enable_all()
        .build()
        .expect("Failed to build scheduler Tokio runtime")
});

// Rayon thread pool for compute-intensive tasks
// Dedicated to per-pixel work (fisheye dewarping); it does not create a
// global Rayon pool, so it does not interfere with other threads.
pub static WORKER_RAYON_POOL: LazyLock<ThreadPool> = LazyLock::new(|| {
    ThreadPoolBuilder::new()
        .num_threads(*CURRENT_NUM_THREADS)
        .thread_name(|i| format!("cpu-intensive-worker-{}", i))
        .build()
        .expect("Failed to build worker Rayon pool")
});
