//! Executing side: accept requests, run received jobs, report results.

use shared_types::{check_compatibility, JobId, PeerId, RequestId};
use tracing::{debug, info, warn};

use super::core::JobExchangeService;
use crate::domain::{
    IncomingJob, IncomingJobRequest, Job, JobExchangeError, JobResult, TimerKind, TimerToken,
    Toolchain,
};
use crate::ports::{CompilerExecutor, ExecuteRequest, FileStore, JobEventSink, Transport};
use crate::wire::compression;
use crate::wire::{JobDataPayload, JobFinishedPayload, Packet, RemoteResult};

/// Scratch file suffix for preprocessed input of `language`.
fn input_suffix(language: &str) -> &'static str {
    match language {
        "c" => ".c",
        "c++" => ".cpp",
        _ => ".i",
    }
}

const OUTPUT_SUFFIX: &str = ".o";

impl<T, C, F, E> JobExchangeService<T, C, F, E>
where
    T: Transport,
    C: CompilerExecutor,
    F: FileStore,
    E: JobEventSink,
{
    pub(crate) fn on_job_request(&mut self, peer: PeerId, id: RequestId) {
        if self.free_local_slots == 0 {
            debug!(%peer, request_id = %id, "Job request rejected, no free slots");
            self.send(peer, &Packet::JobRequestRejected { id: Some(id) });
            return;
        }

        let deadline = self.deadline(self.config.incoming_request_timeout);
        let timer = self
            .timers
            .schedule(deadline, TimerKind::IncomingRequest { peer, id });
        if let Some(previous) = self.requests.add_incoming(IncomingJobRequest { peer, id, timer }) {
            self.timers.cancel(previous.timer);
        }
        debug!(%peer, request_id = %id, "Job request accepted");
        self.send(peer, &Packet::JobRequestAccepted { id });
    }

    pub(crate) fn on_incoming_request_timeout(&mut self, token: TimerToken, peer: PeerId, id: RequestId) {
        if self.requests.incoming(peer, id).map(|r| r.timer) != Some(token) {
            return;
        }
        self.requests.take_incoming(peer, id);
        warn!(%peer, request_id = %id, "Accepted request received no job data");
        self.send(peer, &Packet::JobFinished(JobFinishedPayload::not_executed(id)));
    }

    /// First local toolchain able to run a job built for `requested`, plus
    /// the parameters it needs appended.
    fn match_toolchain(&self, requested: &str) -> Option<(Toolchain, Vec<String>)> {
        self.toolchains.iter().find_map(|toolchain| {
            check_compatibility(requested, &toolchain.version)
                .map(|compat| (toolchain.clone(), compat.extra_params))
        })
    }

    pub(crate) fn on_job_data(
        &mut self,
        peer: PeerId,
        data: JobDataPayload,
    ) -> Result<(), JobExchangeError> {
        let id = data.id;
        let Some(request) = self.requests.take_incoming(peer, id) else {
            debug!(%peer, request_id = %id, "Job data for unknown request dropped");
            return Ok(());
        };
        self.timers.cancel(request.timer);

        let Some((toolchain, extra_params)) = self.match_toolchain(&data.toolchain) else {
            info!(%peer, request_id = %id, toolchain = %data.toolchain, "No compatible toolchain for job");
            self.send(peer, &Packet::JobFinished(JobFinishedPayload::not_executed(id)));
            return Ok(());
        };
        if data.files.is_empty() {
            debug!(%peer, request_id = %id, "Job data without files");
            self.send(peer, &Packet::JobFinished(JobFinishedPayload::not_executed(id)));
            return Ok(());
        }

        let contents = if data.compressed {
            let limit = self.config.max_decompressed_file_size;
            match data
                .files
                .iter()
                .map(|file| compression::decompress(file, limit))
                .collect::<Result<Vec<_>, _>>()
            {
                Ok(contents) => contents,
                Err(error) => {
                    warn!(%peer, request_id = %id, %error, "Job data not decompressible");
                    self.send(peer, &Packet::JobFinished(JobFinishedPayload::not_executed(id)));
                    return Ok(());
                }
            }
        } else {
            data.files
        };

        let suffix = input_suffix(&data.language);
        let mut inputs = Vec::with_capacity(contents.len());
        let mut outputs = Vec::with_capacity(contents.len());
        for file in &contents {
            let (input, output) = self
                .files
                .create_temp_pair(suffix, OUTPUT_SUFFIX)
                .map_err(JobExchangeError::Scratch)?;
            self.files
                .write(&input, file)
                .map_err(|e| JobExchangeError::local_io(&input, e))?;
            inputs.push(input);
            outputs.push(output);
        }
        let temp_files = inputs.iter().chain(&outputs).cloned().collect();

        let mut parameters = data.parameters;
        parameters.extend(extra_params);
        let job_id = self.allocate_job_id();
        let job = Job::incoming(job_id, toolchain, data.language, inputs, outputs, parameters);

        self.executor.execute(ExecuteRequest::from(&job));
        info!(%peer, request_id = %id, job = %job_id, toolchain = %job.toolchain.version, "Executing job for peer");
        self.delegations.add_incoming(IncomingJob {
            peer,
            id,
            job,
            temp_files,
        });
        self.send(peer, &Packet::JobDataReceived { id });
        Ok(())
    }

    pub(crate) fn on_execution_finished(
        &mut self,
        job_id: JobId,
        result: JobResult,
    ) -> Result<(), JobExchangeError> {
        let Some(incoming) = self.delegations.take_incoming_by_job(job_id) else {
            debug!(job = %job_id, "Execution result for job no longer tracked");
            return Ok(());
        };

        let mut files = Vec::new();
        if result.is_success() {
            for path in &incoming.job.output_files {
                match self.files.read(path) {
                    Ok(contents) => files.push(contents),
                    Err(e) => {
                        self.remove_temp_files(&incoming.temp_files);
                        return Err(JobExchangeError::local_io(path, e));
                    }
                }
            }
        }
        self.remove_temp_files(&incoming.temp_files);

        info!(
            peer = %incoming.peer,
            request_id = %incoming.id,
            job = %job_id,
            return_code = result.return_code,
            "Job for peer finished"
        );
        let payload = JobFinishedPayload {
            id: incoming.id,
            outcome: Some(RemoteResult {
                return_code: result.return_code,
                stdout: result.stdout,
                stderr: result.stderr,
                files,
            }),
        };
        self.send(incoming.peer, &Packet::JobFinished(payload));
        Ok(())
    }

    /// The origin gave up on a request or a running job. No reply.
    pub(crate) fn on_abort_job(&mut self, peer: PeerId, id: RequestId) {
        if let Some(incoming) = self.delegations.take_incoming(peer, id) {
            info!(%peer, request_id = %id, job = %incoming.job.id(), "Job aborted by peer");
            self.executor.cancel(incoming.job.id());
            self.remove_temp_files(&incoming.temp_files);
        } else if let Some(request) = self.requests.take_incoming(peer, id) {
            debug!(%peer, request_id = %id, "Accepted request aborted by peer");
            self.timers.cancel(request.timer);
        } else {
            debug!(%peer, request_id = %id, "Abort for unknown job");
        }
    }

    /// Tear down an incoming job and tell its origin it was not executed.
    pub(crate) fn reject_incoming(&mut self, job_id: JobId) -> bool {
        let Some(incoming) = self.delegations.take_incoming_by_job(job_id) else {
            return false;
        };
        info!(peer = %incoming.peer, request_id = %incoming.id, job = %job_id, "Incoming job rejected");
        self.executor.cancel(job_id);
        self.remove_temp_files(&incoming.temp_files);
        self.send(
            incoming.peer,
            &Packet::JobFinished(JobFinishedPayload::not_executed(incoming.id)),
        );
        true
    }
}
