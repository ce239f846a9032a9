use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

pub trait PathExt {
    fn ext_lower(&self) -> String;
}

impl PathExt for Path {
    fn ext_lower(&self) -> String {
        self.extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default()
    }
}

/// Create a file with the given unix mode and write `bytes` to it.
/// Fails with `AlreadyExists` if the file is already present.
pub fn write_new_file(path: &Path, bytes: &[u8], mode: u32) -> io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(mode)
        .open(path)?;
    file.write_all(bytes)
}
