//! Crash-safe file output for keys and sealed messages.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::random::{OsRandom, RandomSource};

/// A file written atomically.
///
/// Data goes to a randomly named sibling temp file which is synced and then
/// renamed over the target, so readers see either the old or the new
/// content, never a partial write.
#[derive(Clone, Debug)]
pub struct AtomicFile {
    path: PathBuf,
    private: bool,
}

impl AtomicFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            private: false,
        }
    }

    /// Restricts the file to its owner (mode 0600 on Unix). Used for keys.
    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).with_context(|| format!("failed to read {}", self.path.display()))
    }

    /// Writes `data`, creating parent directories as needed.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.random_tmp_path()?;

        let mut tmp_file = self
            .open_options()
            .open(&tmp_path)
            .context("failed to create temporary file")?;

        tmp_file.write_all(data)?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e).context("atomic replace failed");
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            File::open(parent)?.sync_all()?;
        }

        Ok(())
    }

    fn open_options(&self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);

        #[cfg(unix)]
        if self.private {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        options
    }

    /// `filename.tmp.<16 hex chars>` next to the target.
    fn random_tmp_path(&self) -> Result<PathBuf> {
        let suffix = hex::encode(OsRandom.generate(8)?);

        let file_name = self
            .path
            .file_name()
            .context("output path has no file name")?
            .to_string_lossy();

        Ok(self.path.with_file_name(format!("{file_name}.tmp.{suffix}")))
    }
}
