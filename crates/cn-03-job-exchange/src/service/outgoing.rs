//! Origin side: request slots, ship jobs, collect results.
//!
//! ```text
//! submit ─► queue ─► create_requests ─► JobRequest ──Accepted──► delegate ─► JobData
//!                         ▲                  │                                 │
//!                         └── Rejected / timeout (peer slots purged)  JobDataReceived
//!                                                                              │
//!                                                         JobFinished ◄────────┘
//! ```

use std::path::PathBuf;

use shared_types::{JobId, PeerId, RequestId};
use tracing::{debug, info, warn};

use super::core::JobExchangeService;
use crate::domain::{
    Job, JobExchangeError, JobResult, JobStage, OutgoingJob, OutgoingJobRequest, TimerKind,
    TimerToken,
};
use crate::ports::{
    CompilerExecutor, FileStore, JobEventSink, JobExchangeEvent, PreprocessRequest, Transport,
};
use crate::wire::compression;
use crate::wire::{JobDataPayload, JobFinishedPayload, Packet, RemoteResult};

impl<T, C, F, E> JobExchangeService<T, C, F, E>
where
    T: Transport,
    C: CompilerExecutor,
    F: FileStore,
    E: JobEventSink,
{
    pub(crate) fn submit(&mut self, mut job: Job) -> Result<JobId, JobExchangeError> {
        if !matches!(job.stage(), JobStage::Waiting | JobStage::Preprocessed) {
            debug!(job = %job.id(), stage = ?job.stage(), "Resubmitted job starts over");
            job.reset();
        }
        let id = self.allocate_job_id();
        job.assign_id(id);
        debug!(job = %id, toolchain = %job.toolchain.version, "Job queued for delegation");
        self.queue.enqueue(job);
        self.create_requests()?;
        Ok(id)
    }

    /// Hand a queued job back to the caller, least worked-on first.
    pub(crate) fn take_back_job(&mut self) -> Option<Job> {
        let mut job = self.queue.dequeue_any()?;
        if job.stage() == JobStage::Preprocessing {
            self.executor.cancel(job.id());
            job.advance(JobStage::Waiting);
        }
        debug!(job = %job.id(), "Queued job taken back");
        self.release_orphaned_acceptances();
        Some(job)
    }

    // =========================================================================
    // REQUEST CREATION
    // =========================================================================

    /// Re-evaluate supply and demand: refill slots, send requests for
    /// queued jobs, keep preprocessing ahead of requests.
    pub(crate) fn create_requests(&mut self) -> Result<(), JobExchangeError> {
        self.serve_parked_acceptances()?;

        // Nothing to ask for without queued jobs.
        if !self.queue.is_empty() && self.slots.needs_refill() {
            self.ask_for_free_slots();
        }

        while self.slots.free_slot_count() > 0
            && self.requests.outstanding_count() < self.queue.len()
        {
            let Some(toolchain) = self.queue.oldest_toolchain().map(str::to_owned) else {
                break;
            };
            let Some(peer) = self.slots.take(&toolchain) else {
                debug!(%toolchain, "No compatible slot for job request");
                break;
            };

            let id = self.requests.next_request_id();
            let deadline = self.deadline(self.config.outgoing_request_timeout);
            let timer = self
                .timers
                .schedule(deadline, TimerKind::OutgoingRequest { peer, id });
            self.requests.add_outgoing(OutgoingJobRequest { peer, id, timer });
            debug!(%peer, request_id = %id, %toolchain, "Job request sent");
            self.send(peer, &Packet::JobRequest { id });
        }

        self.feed_preprocessing();
        self.release_orphaned_acceptances();
        Ok(())
    }

    /// Pair parked acceptances with jobs that became shippable without
    /// passing through preprocessing, e.g. after a peer disconnect.
    fn serve_parked_acceptances(&mut self) -> Result<(), JobExchangeError> {
        while self.requests.parked_count() > 0 && self.queue.preprocessed_count() > 0 {
            let (Some(request), Some(job)) =
                (self.requests.pop_parked(), self.queue.dequeue_preprocessed())
            else {
                break;
            };
            self.delegate(job, request.peer, request.id)?;
        }
        Ok(())
    }

    /// Start preprocessing while requests outnumber jobs that are or will
    /// soon be shippable.
    fn feed_preprocessing(&mut self) {
        while self.requests.outstanding_count()
            > self.queue.preprocessed_count() + self.queue.preprocessing_count()
        {
            let Some(job) = self.queue.start_preprocessing() else {
                break;
            };
            let request = PreprocessRequest::from(job);
            debug!(job = %request.job, "Preprocessing started");
            self.executor.preprocess(request);
        }
    }

    /// Abort acceptances that no queued job will ever fill.
    fn release_orphaned_acceptances(&mut self) {
        while self.requests.parked_count() > self.queue.len() {
            let Some(request) = self.requests.pop_oldest_parked() else {
                break;
            };
            info!(peer = %request.peer, request_id = %request.id, "Accepted request released, no job left");
            self.send(request.peer, &Packet::AbortJob { id: request.id });
        }
    }

    // =========================================================================
    // REPLIES TO OUR REQUESTS
    // =========================================================================

    pub(crate) fn on_job_request_accepted(
        &mut self,
        peer: PeerId,
        id: RequestId,
    ) -> Result<(), JobExchangeError> {
        let Some(request) = self.requests.take_outgoing(peer, id) else {
            debug!(%peer, request_id = %id, "Acceptance for unknown request");
            return Ok(());
        };
        self.timers.cancel(request.timer);

        match self.queue.dequeue_preprocessed() {
            Some(job) => self.delegate(job, peer, id),
            None => {
                debug!(%peer, request_id = %id, "Request accepted, waiting for preprocessing");
                self.requests.park(request);
                self.release_orphaned_acceptances();
                Ok(())
            }
        }
    }

    pub(crate) fn on_job_request_rejected(
        &mut self,
        peer: PeerId,
        id: Option<RequestId>,
    ) -> Result<(), JobExchangeError> {
        if let Some(request) = id.and_then(|id| self.requests.take_outgoing(peer, id)) {
            self.timers.cancel(request.timer);
        }
        let purged = self.slots.discard(peer);
        debug!(%peer, request_id = ?id.map(|id| id.0), purged, "Job request rejected");
        self.create_requests()
    }

    pub(crate) fn on_outgoing_request_timeout(
        &mut self,
        token: TimerToken,
        peer: PeerId,
        id: RequestId,
    ) -> Result<(), JobExchangeError> {
        if self.requests.outgoing(peer, id).map(|r| r.timer) != Some(token) {
            return Ok(());
        }
        self.requests.take_outgoing(peer, id);
        let purged = self.slots.discard(peer);
        warn!(%peer, request_id = %id, purged, "Job request timed out");
        self.create_requests()
    }

    // =========================================================================
    // DELEGATION
    // =========================================================================

    /// Ship a preprocessed job to the peer that accepted request `id`.
    pub(crate) fn delegate(
        &mut self,
        mut job: Job,
        peer: PeerId,
        id: RequestId,
    ) -> Result<(), JobExchangeError> {
        let mut contents = Vec::with_capacity(job.preprocessed_files().len());
        for path in job.preprocessed_files() {
            let data = self
                .files
                .read(path)
                .map_err(|e| JobExchangeError::local_io(path, e))?;
            contents.push(data);
        }

        let (compressed, files) = if self.config.compress_job_data {
            match contents
                .iter()
                .map(|data| compression::compress(data))
                .collect::<Result<Vec<_>, _>>()
            {
                Ok(packed) => (true, packed),
                Err(error) => {
                    warn!(job = %job.id(), %error, "Compression failed, sending job data uncompressed");
                    (false, contents)
                }
            }
        } else {
            (false, contents)
        };

        let packet = Packet::JobData(JobDataPayload {
            id,
            toolchain: job.toolchain.version.clone(),
            language: job.language.clone(),
            parameters: job.compiler_parameters.clone(),
            compressed,
            files,
        });
        self.send(peer, &packet);

        job.advance(JobStage::DelegatedOutgoing);
        let deadline = self.deadline(self.config.outgoing_job_timeout);
        let timer = self
            .timers
            .schedule(deadline, TimerKind::OutgoingJob { peer, id });
        info!(%peer, request_id = %id, job = %job.id(), "Job delegated");
        self.delegations.add_outgoing(OutgoingJob {
            peer,
            id,
            job,
            timer,
            acknowledged: false,
        });
        Ok(())
    }

    /// The peer has the data; give it the longer compilation budget.
    pub(crate) fn on_job_data_received(&mut self, peer: PeerId, id: RequestId) {
        let deadline = self.deadline(self.config.outgoing_job_compile_timeout);
        let Some(outgoing) = self.delegations.outgoing_mut(peer, id) else {
            debug!(%peer, request_id = %id, "Data acknowledgement for unknown job");
            return;
        };
        self.timers.cancel(outgoing.timer);
        outgoing.timer = self
            .timers
            .schedule(deadline, TimerKind::OutgoingJob { peer, id });
        outgoing.acknowledged = true;
    }

    pub(crate) fn on_job_finished(
        &mut self,
        peer: PeerId,
        finished: JobFinishedPayload,
    ) -> Result<(), JobExchangeError> {
        let Some(outgoing) = self.delegations.take_outgoing(peer, finished.id) else {
            if self.requests.take_parked(peer, finished.id).is_some() {
                info!(%peer, request_id = %finished.id, "Peer gave up on accepted request");
            } else {
                debug!(%peer, request_id = %finished.id, "Result for unknown job");
            }
            return Ok(());
        };
        self.timers.cancel(outgoing.timer);
        let mut job = outgoing.job;

        match finished.outcome {
            None => {
                info!(%peer, job = %job.id(), "Peer did not execute job");
                job.advance(JobStage::Preprocessed);
                self.publish(JobExchangeEvent::LocalJobCancelled(job));
            }
            Some(remote) => {
                let result = self.materialize_outputs(&job, remote);
                info!(%peer, job = %job.id(), return_code = result.return_code, "Delegated job finished");
                job.finish(result);
                self.publish(JobExchangeEvent::LocalJobFinished(job));
            }
        }
        Ok(())
    }

    /// Write returned object files next to the job. Extra files are
    /// dropped; a failed write turns into a diagnostic on stderr.
    fn materialize_outputs(&self, job: &Job, remote: RemoteResult) -> JobResult {
        let RemoteResult {
            mut return_code,
            stdout,
            mut stderr,
            mut files,
        } = remote;

        if files.len() > job.output_files.len() {
            warn!(
                job = %job.id(),
                received = files.len(),
                expected = job.output_files.len(),
                "Peer returned too many output files, extra files dropped"
            );
            files.truncate(job.output_files.len());
        }

        for (contents, name) in files.iter().zip(&job.output_files) {
            let path: PathBuf = job.working_dir.join(name);
            if let Err(error) = self.files.write(&path, contents) {
                warn!(job = %job.id(), path = %path.display(), %error, "Output file not written");
                stderr.extend_from_slice(
                    format!("\ncompilenet: could not write output file {}: {}", path.display(), error)
                        .as_bytes(),
                );
                if return_code == 0 {
                    return_code = -1;
                }
            }
        }

        JobResult {
            return_code,
            stdout,
            stderr,
        }
    }

    pub(crate) fn on_outgoing_job_timeout(
        &mut self,
        token: TimerToken,
        peer: PeerId,
        id: RequestId,
    ) -> Result<(), JobExchangeError> {
        if self.delegations.outgoing_mut(peer, id).map(|o| o.timer) != Some(token) {
            return Ok(());
        }
        let Some(outgoing) = self.delegations.take_outgoing(peer, id) else {
            return Ok(());
        };
        warn!(
            %peer,
            request_id = %id,
            job = %outgoing.job.id(),
            acknowledged = outgoing.acknowledged,
            "Delegated job timed out"
        );
        self.send(peer, &Packet::AbortJob { id });
        self.slots.discard(peer);

        let mut job = outgoing.job;
        job.advance(JobStage::Preprocessed);
        self.publish(JobExchangeEvent::LocalJobCancelled(job));
        self.create_requests()
    }

    // =========================================================================
    // PREPROCESSING
    // =========================================================================

    pub(crate) fn on_preprocessing_finished(
        &mut self,
        job_id: JobId,
        result: JobResult,
        files: Vec<PathBuf>,
    ) -> Result<(), JobExchangeError> {
        let Some(mut job) = self.queue.finish_preprocessing(job_id) else {
            debug!(job = %job_id, "Preprocessing result for job no longer queued");
            return Ok(());
        };

        if !result.is_success() {
            warn!(job = %job_id, return_code = result.return_code, "Preprocessing failed");
            job.finish(result);
            self.publish(JobExchangeEvent::LocalJobFinished(job));
            return self.create_requests();
        }

        job.set_preprocessed(files);
        match self.requests.pop_parked() {
            Some(request) => self.delegate(job, request.peer, request.id)?,
            None => self.queue.enqueue(job),
        }
        self.create_requests()
    }
}
