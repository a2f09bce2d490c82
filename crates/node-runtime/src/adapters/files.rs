//! Filesystem-backed job files and scratch space.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use cn_03_job_exchange::{FileStore, Job, JobStage};
use tracing::{debug, trace};
use uuid::Uuid;

/// Reads and writes job files directly; temporary files for incoming jobs
/// live under one scratch directory with random names.
#[derive(Debug, Clone)]
pub struct ScratchFileStore {
    scratch_dir: PathBuf,
}

impl ScratchFileStore {
    /// Use `scratch_dir`, creating it if needed.
    pub fn new(scratch_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let scratch_dir = scratch_dir.into();
        fs::create_dir_all(&scratch_dir)?;
        Ok(Self { scratch_dir })
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Whether `path` was handed out by this store.
    pub fn owns(&self, path: &Path) -> bool {
        path.starts_with(&self.scratch_dir)
    }

    /// Remove the scratch copies of a job's preprocessed input once the job
    /// leaves the exchange. A job still at `Preprocessed` is reset so that a
    /// later submit preprocesses again. Returns the number of files removed.
    pub fn release_job_files(&self, job: &mut Job) -> usize {
        let owned: Vec<PathBuf> = job
            .preprocessed_files()
            .iter()
            .filter(|path| self.owns(path))
            .cloned()
            .collect();
        let mut removed = 0;
        for path in &owned {
            match self.remove(path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Could not remove preprocessed file")
                }
            }
        }
        if !owned.is_empty() && job.stage() == JobStage::Preprocessed {
            job.reset();
        }
        removed
    }
}

impl FileStore for ScratchFileStore {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        fs::write(path, contents)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        trace!(path = %path.display(), "Removing job file");
        fs::remove_file(path)
    }

    fn create_temp_pair(
        &self,
        input_suffix: &str,
        output_suffix: &str,
    ) -> io::Result<(PathBuf, PathBuf)> {
        let stem = Uuid::new_v4().simple().to_string();
        let input = self.scratch_dir.join(format!("{stem}{input_suffix}"));
        let output = self.scratch_dir.join(format!("{stem}{output_suffix}"));
        fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&input)?;
        Ok((input, output))
    }
}
