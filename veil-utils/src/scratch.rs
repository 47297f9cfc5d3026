//! Scoped lifetimes for temporary uploads and pipeline outputs.
//!
//! Uploaded bytes land in a uniquely named temp file that is removed when the
//! [`ScratchUpload`] is dropped, on success and failure alike. Outputs are tracked by an
//! [`OutputGuard`] which deletes everything it recorded unless the run is committed.

use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{debug, warn};
use tempfile::{Builder, NamedTempFile};

/// An uploaded image spooled to a temp file.
#[derive(Debug)]
pub struct ScratchUpload {
    file: NamedTempFile,
    len: u64,
}

impl ScratchUpload {
    /// Copy everything from `reader` into a fresh temp file under the system temp dir.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_reader_in(reader, std::env::temp_dir())
    }

    /// Like [`ScratchUpload::from_reader`] but places the file inside `dir`.
    pub fn from_reader_in<R: Read, P: AsRef<Path>>(mut reader: R, dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let mut file = Builder::new()
            .prefix("veil-upload-")
            .tempfile_in(dir)
            .with_context(|| format!("failed to create upload file in {}", dir.display()))?;
        let len = io::copy(&mut reader, file.as_file_mut())
            .context("failed to spool upload to disk")?;
        debug!("Spooled {len} byte upload to {}", file.path().display());
        Ok(Self { file, len })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Number of bytes received.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Deletes recorded output files on drop unless [`OutputGuard::commit`] was called.
#[derive(Debug, Default)]
pub struct OutputGuard {
    paths: Vec<PathBuf>,
    committed: bool,
}

impl OutputGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a path that the current run is about to write.
    pub fn track<P: Into<PathBuf>>(&mut self, path: P) {
        self.paths.push(path.into());
    }

    /// Record `path` only when nothing exists there yet, so a failed run never removes a
    /// file it did not create.
    pub fn track_new<P: Into<PathBuf>>(&mut self, path: P) {
        let path = path.into();
        if !path.exists() {
            self.paths.push(path);
        }
    }

    pub fn tracked(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Keep every tracked file.
    pub fn commit(mut self) -> Vec<PathBuf> {
        self.committed = true;
        std::mem::take(&mut self.paths)
    }
}

impl Drop for OutputGuard {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        for path in &self.paths {
            match fs::remove_file(path) {
                Ok(()) => debug!("Removed partial output {}", path.display()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!("Failed to remove partial output {}: {err}", path.display()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn upload_is_removed_on_drop() {
        let dir = tempdir().expect("tempdir");
        let upload =
            ScratchUpload::from_reader_in(&b"not really a jpeg"[..], dir.path()).expect("spool");
        let path = upload.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(upload.len(), 17);
        assert_eq!(fs::read(&path).expect("read"), b"not really a jpeg");

        drop(upload);
        assert!(!path.exists());
    }

    #[test]
    fn uncommitted_outputs_are_deleted() {
        let dir = tempdir().expect("tempdir");
        let written = dir.path().join("out_blurred.jpg");
        let never_written = dir.path().join("out_mask.png");
        fs::write(&written, b"partial").expect("write");

        {
            let mut guard = OutputGuard::new();
            guard.track(&written);
            guard.track(&never_written);
            assert_eq!(guard.tracked().len(), 2);
        }

        assert!(!written.exists());
        assert!(!never_written.exists());
    }

    #[test]
    fn existing_files_are_not_tracked() {
        let dir = tempdir().expect("tempdir");
        let existing = dir.path().join("keep_masked.jpg");
        let fresh = dir.path().join("fresh_masked.jpg");
        fs::write(&existing, b"user data").expect("write");

        {
            let mut guard = OutputGuard::new();
            guard.track_new(&existing);
            guard.track_new(&fresh);
            assert_eq!(guard.tracked(), &[fresh.clone()]);
            fs::write(&fresh, b"partial").expect("write");
        }

        assert!(existing.exists());
        assert!(!fresh.exists());
    }

    #[test]
    fn committed_outputs_survive() {
        let dir = tempdir().expect("tempdir");
        let written = dir.path().join("keep.jpg");
        fs::write(&written, b"done").expect("write");

        let mut guard = OutputGuard::new();
        guard.track(&written);
        let kept = guard.commit();

        assert_eq!(kept, vec![written.clone()]);
        assert!(written.exists());
    }
}
