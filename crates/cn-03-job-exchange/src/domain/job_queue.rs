//! # Job Queue
//!
//! Locally submitted jobs that are not yet delegated, split by how much work
//! has been done on them:
//!
//! ```text
//!   enqueue ──► waiting ──start_preprocessing──► preprocessing
//!                                                     │ finish_preprocessing
//!                                                     ▼
//!                                 (service) ──► preprocessed ──dequeue_preprocessed──► delegation
//! ```
//!
//! `dequeue_any` hands a job back to the caller, least-worked-on first.

use std::collections::VecDeque;

use shared_types::JobId;

use super::job::{Job, JobStage};

#[derive(Debug, Default)]
pub struct JobQueue {
    waiting: VecDeque<Job>,
    preprocessing: VecDeque<Job>,
    preprocessed: VecDeque<Job>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a job in the list matching its stage.
    pub fn enqueue(&mut self, job: Job) {
        match job.stage() {
            JobStage::Preprocessing => self.preprocessing.push_back(job),
            JobStage::Preprocessed => self.preprocessed.push_back(job),
            stage => {
                debug_assert_eq!(stage, JobStage::Waiting, "job {} is not queueable", job.id());
                self.waiting.push_back(job);
            }
        }
    }

    /// Take any job back, preferring the least-worked-on list and the most
    /// recently queued job within it.
    pub fn dequeue_any(&mut self) -> Option<Job> {
        self.waiting
            .pop_back()
            .or_else(|| self.preprocessing.pop_back())
            .or_else(|| self.preprocessed.pop_back())
    }

    /// Take the oldest preprocessed job.
    pub fn dequeue_preprocessed(&mut self) -> Option<Job> {
        self.preprocessed.pop_front()
    }

    /// Move the oldest waiting job to the preprocessing list and return it.
    pub fn start_preprocessing(&mut self) -> Option<&Job> {
        let mut job = self.waiting.pop_front()?;
        job.advance(JobStage::Preprocessing);
        self.preprocessing.push_back(job);
        self.preprocessing.back()
    }

    /// Remove a job whose preprocessing completed. `None` if the job was
    /// taken back in the meantime.
    pub fn finish_preprocessing(&mut self, id: JobId) -> Option<Job> {
        let index = self.preprocessing.iter().position(|j| j.id() == id)?;
        self.preprocessing.remove(index)
    }

    /// Toolchain version of the oldest job, looking at the preprocessed list
    /// first, then preprocessing, then waiting.
    pub fn oldest_toolchain(&self) -> Option<&str> {
        self.preprocessed
            .front()
            .or_else(|| self.preprocessing.front())
            .or_else(|| self.waiting.front())
            .map(|job| job.toolchain.version.as_str())
    }

    pub fn len(&self) -> usize {
        self.waiting.len() + self.preprocessing.len() + self.preprocessed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn waiting_count(&self) -> usize {
        self.waiting.len()
    }

    pub fn preprocessing_count(&self) -> usize {
        self.preprocessing.len()
    }

    pub fn preprocessed_count(&self) -> usize {
        self.preprocessed.len()
    }

    /// Stage of a queued job.
    pub fn stage_of(&self, id: JobId) -> Option<JobStage> {
        self.waiting
            .iter()
            .chain(self.preprocessing.iter())
            .chain(self.preprocessed.iter())
            .find(|j| j.id() == id)
            .map(Job::stage)
    }
}
