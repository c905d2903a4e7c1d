//! FIFO job queue between the coalescer and the worker.
//!
//! The queue owns its synchronization: a mutex around the deque plus a
//! notifier for the single consumer. Enqueue never blocks. Dequeue waits
//! with a deadline so the worker loop can re-check shutdown even when no
//! jobs arrive.
//!
//! The queue is unbounded. The coalescer in front of it emits at most one
//! new pending job per expired processing window, so depth stays small in
//! practice; a physical button cannot outrun memory.

use crate::job::{Job, JobId};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;

/// FIFO queue of pending jobs.
///
/// There is exactly one consumer (the worker). Producers hand over job
/// ownership with [`JobQueue::enqueue`]; the coalescer may still bump the
/// tail job's merge count through [`JobQueue::merge_into_tail`] while the
/// job waits.
pub struct JobQueue {
    inner: Mutex<VecDeque<Job>>,
    available: Notify,
}

impl JobQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            available: Notify::new(),
        }
    }

    /// Appends a job and wakes the consumer. Never blocks.
    pub fn enqueue(&self, job: Job) {
        let depth = {
            let mut queue = self.inner.lock().unwrap();
            queue.push_back(job);
            queue.len()
        };
        self.available.notify_one();
        debug!(depth = depth, "Job enqueued");
    }

    /// Removes the oldest pending job, waiting up to `timeout` for one.
    ///
    /// Returns `None` on timeout so the caller can re-check shutdown and
    /// call again. A `notify_one` racing with the deadline is not lost: the
    /// permit is consumed by the next call's first check.
    pub async fn dequeue(&self, timeout: Duration) -> Option<Job> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(job) = self.inner.lock().unwrap().pop_front() {
                return Some(job);
            }
            if tokio::time::timeout_at(deadline, self.available.notified())
                .await
                .is_err()
            {
                return None;
            }
        }
    }

    /// Bumps the merge count of the most recently enqueued job.
    ///
    /// Returns the tail job's ID, or `None` when the queue is empty. Only
    /// queued jobs are ever touched; a dequeued job's count is frozen.
    pub fn merge_into_tail(&self) -> Option<JobId> {
        let mut queue = self.inner.lock().unwrap();
        queue.back_mut().map(|job| {
            job.record_merge();
            job.job_id
        })
    }

    /// Number of pending jobs.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// True when no jobs are pending.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue")
            .field("depth", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::TriggerEvent;
    use std::sync::Arc;

    fn test_job(sequence: u64) -> Job {
        Job::from_trigger(&TriggerEvent::new(sequence))
    }

    #[tokio::test]
    async fn test_enqueue_dequeue_fifo() {
        let queue = JobQueue::new();
        let first = test_job(1);
        let second = test_job(2);
        let first_id = first.job_id;
        let second_id = second.job_id;

        queue.enqueue(first);
        queue.enqueue(second);
        assert_eq!(queue.len(), 2);

        let a = queue.dequeue(Duration::from_millis(10)).await.unwrap();
        let b = queue.dequeue(Duration::from_millis(10)).await.unwrap();
        assert_eq!(a.job_id, first_id);
        assert_eq!(b.job_id, second_id);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_dequeue_times_out_when_empty() {
        let queue = JobQueue::new();
        let result = queue.dequeue(Duration::from_millis(20)).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_enqueue_wakes_waiting_dequeue() {
        let queue = Arc::new(JobQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.dequeue(Duration::from_secs(5)).await })
        };

        // Give the consumer time to park before producing.
        tokio::time::sleep(Duration::from_millis(20)).await;
        let job = test_job(7);
        let expected = job.job_id;
        queue.enqueue(job);

        let received = consumer.await.unwrap();
        assert_eq!(received.unwrap().job_id, expected);
    }

    #[tokio::test]
    async fn test_merge_into_tail_bumps_newest_job() {
        let queue = JobQueue::new();
        let older = test_job(1);
        let newer = test_job(2);
        let newer_id = newer.job_id;

        queue.enqueue(older);
        queue.enqueue(newer);

        assert_eq!(queue.merge_into_tail(), Some(newer_id));
        assert_eq!(queue.merge_into_tail(), Some(newer_id));

        // Count lands on the tail job only.
        let first = queue.dequeue(Duration::from_millis(10)).await.unwrap();
        let second = queue.dequeue(Duration::from_millis(10)).await.unwrap();
        assert_eq!(first.coalesced_count, 0);
        assert_eq!(second.coalesced_count, 2);
    }

    #[tokio::test]
    async fn test_merge_into_tail_empty_queue() {
        let queue = JobQueue::new();
        assert_eq!(queue.merge_into_tail(), None);
    }
}
