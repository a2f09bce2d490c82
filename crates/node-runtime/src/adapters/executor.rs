//! Compiler subprocesses.
//!
//! Preprocessing runs `<compiler> -E -x <language> <params> <input> -o
//! <scratch>/<uuid>.i` per input file. Execution runs `<compiler> <params>
//! -x <language> -c <input> -o <output>` per file pair. Each job is one
//! tokio task; [`cancel`](CompilerExecutor::cancel) aborts it and the child
//! is killed on drop.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use cn_03_job_exchange::{
    CompilerExecutor, ExecuteRequest, JobResult, NetworkEvent, PreprocessRequest,
};
use parking_lot::Mutex;
use shared_types::JobId;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, warn};
use uuid::Uuid;

/// Runs compilers in child processes and reports back on the event channel.
pub struct ProcessExecutor {
    events: mpsc::UnboundedSender<NetworkEvent>,
    scratch_dir: PathBuf,
    running: Arc<Mutex<HashMap<JobId, AbortHandle>>>,
    runtime: Handle,
}

impl ProcessExecutor {
    /// Must be called from within a tokio runtime.
    pub fn new(events: mpsc::UnboundedSender<NetworkEvent>, scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            events,
            scratch_dir: scratch_dir.into(),
            running: Arc::new(Mutex::new(HashMap::new())),
            runtime: Handle::current(),
        }
    }

    /// Jobs with a live task.
    pub fn running_jobs(&self) -> usize {
        self.running.lock().len()
    }

    fn spawn_job<Fut>(&self, job: JobId, work: Fut)
    where
        Fut: std::future::Future<Output = NetworkEvent> + Send + 'static,
    {
        let events = self.events.clone();
        let running = Arc::clone(&self.running);
        // Held across spawn so the task's own removal cannot run first.
        let mut table = self.running.lock();
        let task = self.runtime.spawn(async move {
            let event = work.await;
            running.lock().remove(&job);
            if events.send(event).is_err() {
                debug!(%job, "Runtime gone, dropping compiler result");
            }
        });
        if let Some(previous) = table.insert(job, task.abort_handle()) {
            warn!(%job, "Job already had a running task, aborting it");
            previous.abort();
        }
    }
}

impl CompilerExecutor for ProcessExecutor {
    fn preprocess(&self, request: PreprocessRequest) {
        let scratch_dir = self.scratch_dir.clone();
        let job = request.job;
        self.spawn_job(job, async move {
            let (result, files) = preprocess(&request, &scratch_dir).await;
            NetworkEvent::PreprocessingFinished { job, result, files }
        });
    }

    fn execute(&self, request: ExecuteRequest) {
        let job = request.job;
        self.spawn_job(job, async move {
            let result = execute(&request).await;
            NetworkEvent::ExecutionFinished { job, result }
        });
    }

    fn cancel(&self, job: JobId) {
        if let Some(task) = self.running.lock().remove(&job) {
            debug!(%job, "Aborting compiler task");
            task.abort();
        }
    }
}

fn preprocessed_suffix(language: &str) -> &'static str {
    match language {
        "c++" => ".ii",
        _ => ".i",
    }
}

async fn preprocess(request: &PreprocessRequest, scratch_dir: &Path) -> (JobResult, Vec<PathBuf>) {
    let mut result = JobResult::success();
    let mut files = Vec::with_capacity(request.input_files.len());

    for input in &request.input_files {
        let output = scratch_dir.join(format!(
            "{}{}",
            Uuid::new_v4().simple(),
            preprocessed_suffix(&request.language)
        ));
        let mut command = Command::new(&request.compiler_path);
        command
            .arg("-E")
            .arg("-x")
            .arg(&request.language)
            .args(&request.parameters)
            .arg(input)
            .arg("-o")
            .arg(&output)
            .current_dir(&request.working_dir);

        let step = run(command, &request.stdin).await;
        let failed = !step.is_success();
        merge(&mut result, step);
        if failed {
            break;
        }
        files.push(output);
    }

    (result, files)
}

async fn execute(request: &ExecuteRequest) -> JobResult {
    let mut result = JobResult::success();

    for (input, output) in request.input_files.iter().zip(&request.output_files) {
        let mut command = Command::new(&request.compiler_path);
        command
            .args(&request.parameters)
            .arg("-x")
            .arg(preprocessed_language(&request.language))
            .arg("-c")
            .arg(input)
            .arg("-o")
            .arg(output)
            .current_dir(&request.working_dir);

        let step = run(command, &[]).await;
        let failed = !step.is_success();
        merge(&mut result, step);
        if failed {
            break;
        }
    }

    result
}

/// Language name of already-preprocessed source.
fn preprocessed_language(language: &str) -> &str {
    match language {
        "c" => "cpp-output",
        "c++" => "c++-cpp-output",
        other => other,
    }
}

fn merge(total: &mut JobResult, step: JobResult) {
    total.stdout.extend_from_slice(&step.stdout);
    total.stderr.extend_from_slice(&step.stderr);
    if !step.is_success() {
        total.return_code = step.return_code;
    }
}

async fn run(mut command: Command, stdin: &[u8]) -> JobResult {
    command
        .stdin(if stdin.is_empty() {
            Stdio::null()
        } else {
            Stdio::piped()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            let program = command.as_std().get_program().to_string_lossy().into_owned();
            warn!(%program, error = %e, "Spawn failed");
            return JobResult::failure(-1, format!("compilenet: cannot run {program}: {e}\n"));
        }
    };

    if let Some(mut pipe) = child.stdin.take() {
        if let Err(e) = pipe.write_all(stdin).await {
            debug!(error = %e, "Compiler closed stdin early");
        }
    }

    match child.wait_with_output().await {
        Ok(output) => JobResult {
            return_code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        },
        Err(e) => JobResult::failure(-1, format!("compilenet: compiler wait failed: {e}\n")),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request(compiler: &str, inputs: Vec<PathBuf>, dir: &Path) -> PreprocessRequest {
        PreprocessRequest {
            job: JobId(1),
            compiler_path: compiler.into(),
            language: "c".into(),
            input_files: inputs,
            parameters: vec![],
            working_dir: dir.to_path_buf(),
            stdin: vec![],
        }
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<NetworkEvent>) -> NetworkEvent {
        tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("compiler result in time")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_preprocess_success_reports_one_file_per_input() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let executor = ProcessExecutor::new(tx, dir.path());

        executor.preprocess(request("true", vec!["a.c".into(), "b.c".into()], dir.path()));

        match next_event(&mut rx).await {
            NetworkEvent::PreprocessingFinished { job, result, files } => {
                assert_eq!(job, JobId(1));
                assert!(result.is_success());
                assert_eq!(files.len(), 2);
                assert!(files.iter().all(|f| f.starts_with(dir.path())));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(executor.running_jobs(), 0);
    }

    #[tokio::test]
    async fn test_preprocess_failure_stops_at_first_input() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let executor = ProcessExecutor::new(tx, dir.path());

        executor.preprocess(request("false", vec!["a.c".into(), "b.c".into()], dir.path()));

        match next_event(&mut rx).await {
            NetworkEvent::PreprocessingFinished { result, files, .. } => {
                assert_eq!(result.return_code, 1);
                assert!(files.is_empty());
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_compiler_is_a_failed_result() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let executor = ProcessExecutor::new(tx, dir.path());

        executor.execute(ExecuteRequest {
            job: JobId(4),
            compiler_path: dir.path().join("no-such-cc"),
            language: "c".into(),
            input_files: vec!["x.c".into()],
            output_files: vec!["x.o".into()],
            parameters: vec![],
            working_dir: dir.path().to_path_buf(),
        });

        match next_event(&mut rx).await {
            NetworkEvent::ExecutionFinished { job, result } => {
                assert_eq!(job, JobId(4));
                assert_eq!(result.return_code, -1);
                assert!(String::from_utf8_lossy(&result.stderr).contains("cannot run"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_suppresses_result() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let executor = ProcessExecutor::new(tx, dir.path());

        executor.execute(ExecuteRequest {
            job: JobId(9),
            compiler_path: "true".into(),
            language: "c".into(),
            input_files: vec!["y.c".into()],
            output_files: vec!["y.o".into()],
            parameters: vec![],
            working_dir: dir.path().to_path_buf(),
        });
        executor.cancel(JobId(9));

        let waited = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
        assert!(waited.is_err(), "cancelled job must not report");
        assert_eq!(executor.running_jobs(), 0);
    }
}
