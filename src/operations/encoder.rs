//! External video encoder invocation.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::common::errors::RepoError;

/// Capability to assemble an ordered list of still frames into a video.
/// Abstracted so tests can substitute an encoder that synthesizes a
/// trivial webm.
pub trait VideoEncoder: Send + Sync {
    fn encode(&self, frames: &[PathBuf], fps: u32, output: &Path) -> Result<()>;
}

/// The real encoder: shells out to mencoder with a frame index file.
pub struct Mencoder {
    program: String,
    // encodes are CPU-heavy and mencoder threads itself; one at a time
    serialize: Mutex<()>,
}

impl Mencoder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            serialize: Mutex::new(()),
        }
    }
}

impl VideoEncoder for Mencoder {
    fn encode(&self, frames: &[PathBuf], fps: u32, output: &Path) -> Result<()> {
        let _guard = self.serialize.lock().unwrap_or_else(|err| err.into_inner());

        // mencoder reads the frame list from a file, one path per line
        let index = output
            .parent()
            .ok_or_else(|| RepoError::Corruption(format!("'{}' has no parent", output.display())))?
            .join("index");
        let listing = frames
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(&index, listing).context(format!("failed to write frame index {:?}", index))?;

        let args = format!(
            "mf://@{} -mf fps={} -o {} -of lavf -ovc lavc -lavfopts format=webm -lavcopts threads=8:vcodec=libvpx -ffourcc VP80",
            index.display(),
            fps,
            output.display()
        );
        let status = Command::new(&self.program)
            .args(args.split(' '))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|err| {
                RepoError::EncoderFailure(format!("failed to spawn '{}': {}", self.program, err))
            })?;

        if !status.success() {
            return Err(RepoError::EncoderFailure(format!(
                "'{}' exited with status code {}",
                self.program,
                status.code().unwrap_or(-1)
            ))
            .into());
        }
        Ok(())
    }
}
