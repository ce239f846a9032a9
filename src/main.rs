use std::sync::Arc;

use anyhow::Result;
use log::info;

use argus::common::SCHEDULER_RUNTIME;
use argus::config::Config;
use argus::operations::encoder::{Mencoder, VideoEncoder};
use argus::repository::Repository;
use argus::system::CameraStore;
use argus::tasks;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::load()?;
    let retention = config.retention()?;

    let cameras = Arc::new(CameraStore::open(&config.cameras.sqlite_path)?);
    let repo = Arc::new(Repository::new(
        &config.repository.base_directory,
        retention,
        Arc::clone(&cameras),
    )?);
    let encoder: Arc<dyn VideoEncoder> = Arc::new(Mencoder::new(config.encoder.program.clone()));

    tasks::start_schedule(Arc::clone(&repo), encoder);
    info!(
        "repository ready at {:?} ({} cameras configured)",
        repo.base_directory(),
        cameras.cameras()?.len()
    );

    SCHEDULER_RUNTIME.block_on(async {
        let _ = tokio::signal::ctrl_c().await;
    });
    info!("shutting down");
    Ok(())
}
