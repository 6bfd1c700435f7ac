//! Job queue abstraction and the in-memory queue.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use padmigrate_core::{Job, JobId};

/// A job taken off the pending list, together with the exact payload it was
/// queued with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedJob {
    pub job: Job,
    pub raw: String,
}

/// Durable FIFO queue with a processing area keyed by job id.
///
/// Every state change moves one payload atomically; a job is never in two
/// places at once.
pub trait JobQueue: Send + Sync {
    /// Append an encoded payload to the pending list.
    fn enqueue(&self, payload: &str) -> Result<(), QueueError>;

    /// Encode and enqueue `job`.
    fn enqueue_job(&self, job: &Job) -> Result<(), QueueError> {
        let payload = serde_json::to_string(&job.to_payload())
            .map_err(|e| QueueError::Command(format!("encode failed: {e}")))?;
        self.enqueue(&payload)
    }

    /// Take the oldest pending job and move it into processing.
    ///
    /// Waits up to `block` for a job to arrive. An undecodable payload is
    /// moved to the rejected list and reported as [`QueueError::Decode`].
    fn claim_next(&self, block: Duration) -> Result<Option<ClaimedJob>, QueueError>;

    /// Move a claimed job from processing to done.
    fn complete(&self, claimed: &ClaimedJob) -> Result<(), QueueError>;

    /// Move a job from processing back to the head of the pending list.
    /// Returns `false` when the job is not in processing.
    fn requeue(&self, job_id: &JobId) -> Result<bool, QueueError>;

    /// Promote jobs that were taken but never reached processing (crash
    /// between the two steps). Returns how many were promoted.
    fn recover(&self) -> Result<usize, QueueError>;

    fn stats(&self) -> Result<QueueStats, QueueError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("queue connection error: {0}")]
    Connection(String),
    #[error("queue command failed: {0}")]
    Command(String),
    #[error("rejected undecodable payload ({reason}): {payload}")]
    Decode { payload: String, reason: String },
}

/// Number of payloads per queue area.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub claimed: usize,
    pub processing: usize,
    pub done: usize,
    pub rejected: usize,
}

#[derive(Debug, Default)]
struct QueueState {
    // Producers push to the front, the worker pops from the back.
    pending: VecDeque<String>,
    processing: BTreeMap<JobId, String>,
    done: BTreeMap<JobId, String>,
    rejected: Vec<String>,
}

/// In-memory job queue for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobQueue {
    state: Mutex<QueueState>,
    arrived: Condvar,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Ids currently in processing.
    pub fn processing(&self) -> Vec<JobId> {
        self.state.lock().unwrap().processing.keys().cloned().collect()
    }

    /// Ids in done.
    pub fn done(&self) -> Vec<JobId> {
        self.state.lock().unwrap().done.keys().cloned().collect()
    }

    pub fn rejected(&self) -> Vec<String> {
        self.state.lock().unwrap().rejected.clone()
    }
}

impl JobQueue for InMemoryJobQueue {
    fn enqueue(&self, payload: &str) -> Result<(), QueueError> {
        self.state
            .lock()
            .unwrap()
            .pending
            .push_front(payload.to_string());
        self.arrived.notify_one();
        Ok(())
    }

    fn claim_next(&self, block: Duration) -> Result<Option<ClaimedJob>, QueueError> {
        let guard = self.state.lock().unwrap();
        let (mut state, _) = self
            .arrived
            .wait_timeout_while(guard, block, |s| s.pending.is_empty())
            .unwrap();

        let Some(raw) = state.pending.pop_back() else {
            return Ok(None);
        };

        match Job::decode(&raw) {
            Ok(job) => {
                state.processing.insert(job.id().clone(), raw.clone());
                Ok(Some(ClaimedJob { job, raw }))
            }
            Err(err) => {
                state.rejected.push(raw.clone());
                Err(QueueError::Decode {
                    payload: raw,
                    reason: err.to_string(),
                })
            }
        }
    }

    fn complete(&self, claimed: &ClaimedJob) -> Result<(), QueueError> {
        let mut state = self.state.lock().unwrap();
        state.processing.remove(claimed.job.id());
        state
            .done
            .insert(claimed.job.id().clone(), claimed.raw.clone());
        Ok(())
    }

    fn requeue(&self, job_id: &JobId) -> Result<bool, QueueError> {
        let mut state = self.state.lock().unwrap();
        let Some(raw) = state.processing.remove(job_id) else {
            return Ok(false);
        };
        state.pending.push_back(raw);
        drop(state);
        self.arrived.notify_one();
        Ok(true)
    }

    fn recover(&self) -> Result<usize, QueueError> {
        // Claims are promoted under the same lock; nothing can be left over.
        Ok(0)
    }

    fn stats(&self) -> Result<QueueStats, QueueError> {
        let state = self.state.lock().unwrap();
        Ok(QueueStats {
            pending: state.pending.len(),
            claimed: 0,
            processing: state.processing.len(),
            done: state.done.len(),
            rejected: state.rejected.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use padmigrate_core::JobPayload;

    fn job(id: &str) -> Job {
        Job::from_payload(JobPayload {
            from: "Jane".into(),
            email_address: "jane@x.com".into(),
            attachment: format!("/spool/{id}.zip"),
        })
        .unwrap()
    }

    const NO_WAIT: Duration = Duration::from_millis(0);

    #[test]
    fn jobs_are_claimed_in_fifo_order() {
        let queue = InMemoryJobQueue::new();
        for id in ["a", "b", "c"] {
            queue.enqueue_job(&job(id)).unwrap();
        }

        let order: Vec<String> = (0..3)
            .map(|_| queue.claim_next(NO_WAIT).unwrap().unwrap().job.id().to_string())
            .collect();

        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(queue.stats().unwrap().processing, 3);
    }

    #[test]
    fn empty_queue_times_out_with_none() {
        let queue = InMemoryJobQueue::new();
        assert!(queue.claim_next(Duration::from_millis(10)).unwrap().is_none());
    }

    #[test]
    fn complete_moves_job_to_done_with_original_payload() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue_job(&job("exp1")).unwrap();
        let claimed = queue.claim_next(NO_WAIT).unwrap().unwrap();

        queue.complete(&claimed).unwrap();

        let stats = queue.stats().unwrap();
        assert_eq!((stats.processing, stats.done), (0, 1));
        let state = queue.state.lock().unwrap();
        assert_eq!(state.done.get(claimed.job.id()), Some(&claimed.raw));
    }

    #[test]
    fn undecodable_payload_is_rejected() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue("{not json").unwrap();

        let err = queue.claim_next(NO_WAIT).unwrap_err();

        assert!(matches!(err, QueueError::Decode { .. }));
        assert_eq!(queue.rejected(), vec!["{not json".to_string()]);
        assert_eq!(queue.stats().unwrap().processing, 0);
    }

    #[test]
    fn requeued_job_is_claimed_next() {
        let queue = InMemoryJobQueue::new();
        queue.enqueue_job(&job("first")).unwrap();
        queue.enqueue_job(&job("second")).unwrap();
        let first = queue.claim_next(NO_WAIT).unwrap().unwrap();

        assert!(queue.requeue(first.job.id()).unwrap());
        assert!(!queue.requeue(first.job.id()).unwrap());

        let next = queue.claim_next(NO_WAIT).unwrap().unwrap();
        assert_eq!(next.job.id(), first.job.id());
    }

    #[test]
    fn blocked_claim_wakes_on_enqueue() {
        let queue = InMemoryJobQueue::arc();
        let producer = queue.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.enqueue_job(&job("late")).unwrap();
        });

        let claimed = queue.claim_next(Duration::from_secs(5)).unwrap();
        handle.join().unwrap();

        assert_eq!(claimed.unwrap().job.id().as_str(), "late");
    }
}
