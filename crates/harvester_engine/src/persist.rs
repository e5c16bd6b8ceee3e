use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use engine_logging::{engine_debug, engine_error};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::filename::page_filename;
use crate::ResolvedAsset;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    // Writability check: create and drop a temp file.
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        // The rename replaces an earlier capture in one step; on failure the
        // earlier file stays in place.
        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Persists classified page assets under their canonical names.
pub struct AssetWriter {
    files: AtomicFileWriter,
}

impl AssetWriter {
    pub fn new(output_dir: PathBuf) -> Self {
        Self {
            files: AtomicFileWriter::new(output_dir),
        }
    }

    /// Write `asset` as `page_NNN<ext>`. Failures are logged and reported as
    /// `None`; the caller counts that as "not saved".
    pub fn write(&self, asset: &ResolvedAsset) -> Option<PathBuf> {
        let filename = page_filename(asset.ordinal, asset.format);
        match self.files.write(&filename, &asset.bytes) {
            Ok(path) => {
                engine_debug!("Saved {} ({} bytes)", path.display(), asset.bytes.len());
                Some(path)
            }
            Err(err) => {
                engine_error!("Failed to save {}: {}", filename, err);
                None
            }
        }
    }
}
