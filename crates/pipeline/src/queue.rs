//! In-process job queue
//!
//! A bounded channel feeds a configurable number of worker tasks (default
//! one). Enqueueing returns a job id immediately; a still-queued job can be
//! cancelled, while a started job always runs to completion or failure.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;
use videoseek_common::VideoId;

use crate::{Pipeline, ProcessOutcome};

const QUEUE_CAPACITY: usize = 1024;

/// Errors from the job queue
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("job queue is closed")]
    Closed,
}

/// Externally visible job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Cancelled,
    Completed,
    Failed,
    AlreadyProcessing,
    VideoNotFound,
}

impl From<ProcessOutcome> for JobStatus {
    fn from(outcome: ProcessOutcome) -> Self {
        match outcome {
            ProcessOutcome::Completed => Self::Completed,
            ProcessOutcome::Failed => Self::Failed,
            ProcessOutcome::AlreadyProcessing => Self::AlreadyProcessing,
            ProcessOutcome::NotFound => Self::VideoNotFound,
        }
    }
}

/// Result of a cancellation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job was still queued and will not start
    Cancelled,
    /// The job already started (or finished); it runs to completion
    AlreadyStarted,
    /// No job with this id
    Unknown,
}

#[derive(Debug, Clone, Copy)]
enum JobState {
    Queued,
    Running,
    Cancelled,
    Done(ProcessOutcome),
}

struct QueuedJob {
    id: Uuid,
    video_id: VideoId,
}

/// Fire-and-forget queue over the processing pipeline
pub struct JobQueue {
    sender: mpsc::Sender<QueuedJob>,
    jobs: Arc<Mutex<HashMap<Uuid, JobState>>>,
}

impl JobQueue {
    /// Start the queue with the given number of workers.
    ///
    /// Each worker processes one video at a time; stages inside a job run
    /// strictly sequentially.
    #[must_use]
    pub fn start(pipeline: Arc<Pipeline>, workers: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<QueuedJob>(QUEUE_CAPACITY);
        let receiver = Arc::new(Mutex::new(receiver));
        let jobs: Arc<Mutex<HashMap<Uuid, JobState>>> = Arc::new(Mutex::new(HashMap::new()));

        for worker in 0..workers {
            let receiver = Arc::clone(&receiver);
            let jobs = Arc::clone(&jobs);
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move {
                loop {
                    let job = { receiver.lock().await.recv().await };
                    let Some(job) = job else { break };

                    {
                        let mut jobs = jobs.lock().await;
                        if matches!(jobs.get(&job.id), Some(JobState::Cancelled)) {
                            info!("Job {} cancelled before start, skipping", job.id);
                            continue;
                        }
                        jobs.insert(job.id, JobState::Running);
                    }

                    debug!(
                        "Worker {} picked up job {} (video {})",
                        worker, job.id, job.video_id
                    );
                    let outcome = pipeline.process_video(job.video_id).await;
                    jobs.lock().await.insert(job.id, JobState::Done(outcome));
                }
            });
        }

        Self { sender, jobs }
    }

    /// Submit a video for asynchronous processing; returns immediately.
    ///
    /// # Errors
    /// Returns an error when the queue has shut down.
    pub async fn enqueue(&self, video_id: VideoId) -> Result<Uuid, QueueError> {
        let id = Uuid::new_v4();
        self.jobs.lock().await.insert(id, JobState::Queued);
        self.sender
            .send(QueuedJob { id, video_id })
            .await
            .map_err(|_| QueueError::Closed)?;
        info!("Enqueued video {} as job {}", video_id, id);
        Ok(id)
    }

    /// Cancel a job that has not started yet.
    pub async fn cancel(&self, id: Uuid) -> CancelOutcome {
        let mut jobs = self.jobs.lock().await;
        match jobs.get(&id) {
            None => CancelOutcome::Unknown,
            Some(JobState::Queued | JobState::Cancelled) => {
                jobs.insert(id, JobState::Cancelled);
                info!("Cancelled queued job {}", id);
                CancelOutcome::Cancelled
            }
            Some(JobState::Running | JobState::Done(_)) => CancelOutcome::AlreadyStarted,
        }
    }

    /// Externally visible status of a job.
    pub async fn status(&self, id: Uuid) -> Option<JobStatus> {
        self.jobs.lock().await.get(&id).map(|state| match state {
            JobState::Queued => JobStatus::Queued,
            JobState::Running => JobStatus::Running,
            JobState::Cancelled => JobStatus::Cancelled,
            JobState::Done(outcome) => JobStatus::from(*outcome),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IndexerConfig;
    use std::time::Duration;
    use videoseek_model_gateway::GatewayConfig;
    use videoseek_search_index::SearchIndexConfig;
    use videoseek_video_store::MemoryVideoStore;

    fn pipeline() -> Arc<Pipeline> {
        Arc::new(Pipeline::new(
            Arc::new(MemoryVideoStore::new()),
            GatewayConfig::default(),
            SearchIndexConfig::default(),
            videoseek_common::PromptLibrary::default(),
            IndexerConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_enqueue_and_run_to_done() {
        let queue = JobQueue::start(pipeline(), 1);
        // The store is empty, so the job finishes quickly as video-not-found.
        let job_id = queue.enqueue(42).await.unwrap();

        let mut status = None;
        for _ in 0..100 {
            status = queue.status(job_id).await;
            if matches!(status, Some(JobStatus::VideoNotFound)) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(status, Some(JobStatus::VideoNotFound));
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        // Zero workers: jobs stay queued forever, so cancellation wins.
        let queue = JobQueue::start(pipeline(), 0);
        let job_id = queue.enqueue(1).await.unwrap();

        assert_eq!(queue.status(job_id).await, Some(JobStatus::Queued));
        assert_eq!(queue.cancel(job_id).await, CancelOutcome::Cancelled);
        assert_eq!(queue.status(job_id).await, Some(JobStatus::Cancelled));
        // Cancelling twice stays cancelled.
        assert_eq!(queue.cancel(job_id).await, CancelOutcome::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_unknown_job() {
        let queue = JobQueue::start(pipeline(), 0);
        assert_eq!(queue.cancel(Uuid::new_v4()).await, CancelOutcome::Unknown);
    }

    #[tokio::test]
    async fn test_cancel_after_completion_reports_started() {
        let queue = JobQueue::start(pipeline(), 1);
        let job_id = queue.enqueue(7).await.unwrap();
        for _ in 0..100 {
            if matches!(
                queue.status(job_id).await,
                Some(JobStatus::VideoNotFound)
            ) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(queue.cancel(job_id).await, CancelOutcome::AlreadyStarted);
    }
}
