//! # Jobs
//!
//! A [`Job`] is owned by exactly one place at a time: the job queue, an
//! outgoing delegation, an incoming delegation, or the caller once it has
//! been handed back. Moving the value between those owners is the stage
//! transition; there is no shared handle.

use std::path::{Path, PathBuf};

use shared_types::JobId;

/// Pipeline stage of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStage {
    /// Queued, not yet preprocessed.
    Waiting,
    /// Queued, the executor is preprocessing it.
    Preprocessing,
    /// Queued, preprocessed input ready to ship.
    Preprocessed,
    /// Shipped to a remote peer for execution.
    DelegatedOutgoing,
    /// Received from a remote peer, executing locally.
    DelegatedIncoming,
    Finished,
}

impl JobStage {
    /// Whether `self -> next` is one of the documented transitions.
    pub fn can_advance_to(self, next: JobStage) -> bool {
        use JobStage::*;
        matches!(
            (self, next),
            (Waiting, Preprocessing)
                | (Preprocessing, Preprocessed)
                | (Preprocessing, Finished)
                | (Preprocessing, Waiting)
                | (Preprocessed, DelegatedOutgoing)
                | (DelegatedOutgoing, Preprocessed)
                | (DelegatedOutgoing, Finished)
                | (DelegatedIncoming, Finished)
        )
    }
}

/// Exit status and captured output of a preprocessing or compilation step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobResult {
    pub return_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl JobResult {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn failure(return_code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            return_code,
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.return_code == 0
    }
}

/// A compiler installation: version string plus the binary to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub version: String,
    pub compiler_path: PathBuf,
}

impl Toolchain {
    pub fn new(version: impl Into<String>, compiler_path: impl Into<PathBuf>) -> Self {
        Self {
            version: version.into(),
            compiler_path: compiler_path.into(),
        }
    }
}

/// A unit of compilation work.
#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    pub input_files: Vec<PathBuf>,
    pub output_files: Vec<PathBuf>,
    pub preprocessor_parameters: Vec<String>,
    pub compiler_parameters: Vec<String>,
    pub toolchain: Toolchain,
    pub language: String,
    pub working_dir: PathBuf,
    pub stdin: Vec<u8>,
    preprocessed_files: Vec<PathBuf>,
    stage: JobStage,
    result: Option<JobResult>,
}

impl Job {
    /// A new local job. The id is assigned when the job is submitted.
    pub fn new(toolchain: Toolchain, language: impl Into<String>) -> Self {
        Self {
            id: JobId(0),
            input_files: Vec::new(),
            output_files: Vec::new(),
            preprocessor_parameters: Vec::new(),
            compiler_parameters: Vec::new(),
            toolchain,
            language: language.into(),
            working_dir: PathBuf::from("."),
            stdin: Vec::new(),
            preprocessed_files: Vec::new(),
            stage: JobStage::Waiting,
            result: None,
        }
    }

    /// A job received from a peer. Its inputs are already preprocessed
    /// temporary files, so they double as the preprocessed file list.
    pub fn incoming(
        id: JobId,
        toolchain: Toolchain,
        language: impl Into<String>,
        input_files: Vec<PathBuf>,
        output_files: Vec<PathBuf>,
        compiler_parameters: Vec<String>,
    ) -> Self {
        let working_dir = input_files
            .first()
            .and_then(|p| p.parent())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            id,
            preprocessed_files: input_files.clone(),
            input_files,
            output_files,
            preprocessor_parameters: Vec::new(),
            compiler_parameters,
            toolchain,
            language: language.into(),
            working_dir,
            stdin: Vec::new(),
            stage: JobStage::DelegatedIncoming,
            result: None,
        }
    }

    pub fn with_files(mut self, inputs: Vec<PathBuf>, outputs: Vec<PathBuf>) -> Self {
        self.input_files = inputs;
        self.output_files = outputs;
        self
    }

    pub fn with_compiler_parameters(mut self, params: Vec<String>) -> Self {
        self.compiler_parameters = params;
        self
    }

    pub fn with_preprocessor_parameters(mut self, params: Vec<String>) -> Self {
        self.preprocessor_parameters = params;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_stdin(mut self, stdin: Vec<u8>) -> Self {
        self.stdin = stdin;
        self
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn stage(&self) -> JobStage {
        self.stage
    }

    pub fn result(&self) -> Option<&JobResult> {
        self.result.as_ref()
    }

    pub fn preprocessed_files(&self) -> &[PathBuf] {
        &self.preprocessed_files
    }

    /// Drop preprocessing output and any result; the job starts over as
    /// `Waiting` when submitted again.
    pub fn reset(&mut self) {
        self.stage = JobStage::Waiting;
        self.preprocessed_files.clear();
        self.result = None;
    }

    pub(crate) fn assign_id(&mut self, id: JobId) {
        self.id = id;
    }

    pub(crate) fn advance(&mut self, next: JobStage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "invalid job transition {:?} -> {:?}",
            self.stage,
            next
        );
        self.stage = next;
    }

    pub(crate) fn set_preprocessed(&mut self, files: Vec<PathBuf>) {
        self.advance(JobStage::Preprocessed);
        self.preprocessed_files = files;
    }

    pub(crate) fn finish(&mut self, result: JobResult) {
        self.advance(JobStage::Finished);
        self.result = Some(result);
    }
}
