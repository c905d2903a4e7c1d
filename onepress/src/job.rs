//! Core identities and records for the trigger pipeline.
//!
//! A [`TriggerEvent`] is one raw observation of the physical button. The
//! coalescer collapses bursts of events into a single [`Job`], which moves
//! through the pipeline by ownership transfer:
//!
//! ```text
//! created ──► queued ──► processing ──► terminal (JobOutcome)
//! ```
//!
//! A job is never shared and never resurrected. Once it reaches a terminal
//! outcome only the [`JobOutcome`] record survives.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// =============================================================================
// Job identity
// =============================================================================

/// Global counter for allocating job IDs.
///
/// Starts at 1 so that ID 0 never appears; [`JobId::seed`] moves it forward
/// at startup so IDs stay strictly increasing across restarts.
static JOB_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a job.
///
/// IDs are strictly increasing within a process and are never reused: the
/// counter is seeded from the last persisted outcome on startup.
///
/// # Example
///
/// ```ignore
/// use onepress::job::JobId;
///
/// let first = JobId::next();
/// let second = JobId::next();
/// assert!(second > first);
/// ```
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(u64);

impl JobId {
    /// Allocates the next job ID.
    pub fn next() -> Self {
        Self(JOB_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Moves the allocator forward so the next ID is at least `next_id`.
    ///
    /// Called once at startup with `last persisted id + 1`. Never moves the
    /// counter backwards.
    pub fn seed(next_id: u64) {
        JOB_ID_COUNTER.fetch_max(next_id, Ordering::Relaxed);
    }

    /// Returns the numeric value of this ID.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Debug for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JobId({})", self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

// =============================================================================
// Trigger events
// =============================================================================

/// One raw observation of the physical trigger.
///
/// Trigger sources stamp each observation with a per-process sequence number
/// and the monotonic time it was seen. Wall-clock time never enters the
/// coalescing decision.
#[derive(Clone, Copy, Debug)]
pub struct TriggerEvent {
    /// Monotonically increasing sequence assigned by the trigger source.
    pub sequence_no: u64,

    /// When the trigger was observed (monotonic clock).
    pub observed_at: Instant,
}

impl TriggerEvent {
    /// Creates an event observed now.
    pub fn new(sequence_no: u64) -> Self {
        Self {
            sequence_no,
            observed_at: Instant::now(),
        }
    }

    /// Creates an event with an explicit observation time.
    pub fn at(sequence_no: u64, observed_at: Instant) -> Self {
        Self {
            sequence_no,
            observed_at,
        }
    }
}

// =============================================================================
// Jobs
// =============================================================================

/// The unit of work one burst of triggers collapses into.
///
/// Ownership transfers coalescer → queue → worker; a job is never shared.
/// `coalesced_count` is only bumped while the job sits in the queue; once
/// the worker dequeues it the count is frozen.
#[derive(Debug)]
pub struct Job {
    /// Unique, strictly increasing identifier.
    pub job_id: JobId,

    /// When the job was created (monotonic clock).
    pub created_at: Instant,

    /// How many triggers were merged into this job while it was pending.
    pub coalesced_count: u32,

    /// Sequence number of the trigger that created the job.
    pub origin_sequence: u64,
}

impl Job {
    /// Creates a fresh job from the trigger that opened it.
    pub fn from_trigger(event: &TriggerEvent) -> Self {
        Self {
            job_id: JobId::next(),
            created_at: event.observed_at,
            coalesced_count: 0,
            origin_sequence: event.sequence_no,
        }
    }

    /// Records one more trigger merged into this still-pending job.
    pub fn record_merge(&mut self) {
        self.coalesced_count = self.coalesced_count.saturating_add(1);
    }
}

// =============================================================================
// Worker state
// =============================================================================

/// What the worker is doing right now.
///
/// At most one job is ever `Processing`; the worker publishes transitions
/// over a watch channel and the coalescer reads point-in-time snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    /// No job in flight.
    Idle,

    /// Exactly one job in flight.
    Processing(JobId),
}

impl WorkerState {
    /// Returns true when a job is in flight.
    pub fn is_processing(&self) -> bool {
        matches!(self, WorkerState::Processing(_))
    }

    /// Returns the in-flight job ID, if any.
    pub fn processing_job(&self) -> Option<JobId> {
        match self {
            WorkerState::Idle => None,
            WorkerState::Processing(id) => Some(*id),
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Idle => write!(f, "idle"),
            WorkerState::Processing(id) => write!(f, "processing {}", id),
        }
    }
}

// =============================================================================
// Backend vocabulary
// =============================================================================

/// Identifies one backend in the output chain.
///
/// The declaration order is the chain order: script first, degraded last.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendId {
    /// External script invocation.
    Script,
    /// Local spooler-style service submission.
    Service,
    /// Direct write to a raw device node.
    RawDevice,
    /// Always-succeeds fallback that only logs the job.
    Degraded,
}

impl BackendId {
    /// Returns the lowercase name used in config and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendId::Script => "script",
            BackendId::Service => "service",
            BackendId::RawDevice => "raw_device",
            BackendId::Degraded => "degraded",
        }
    }
}

impl fmt::Display for BackendId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification of a single failed backend attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The backend did not finish within its time budget.
    Timeout,
    /// The backend ran and reported failure.
    Process,
    /// The backend's output path does not exist or is not usable.
    DeviceUnavailable,
    /// Anything that fits no other bucket.
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Process => "process",
            ErrorKind::DeviceUnavailable => "device_unavailable",
            ErrorKind::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Why a job as a whole failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Every backend in the chain failed.
    BackendExhausted,
    /// The code driving the job panicked; the worker loop survived.
    WorkerFault,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::BackendExhausted => "backend_exhausted",
            FailureKind::WorkerFault => "worker_fault",
        };
        write!(f, "{}", s)
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// One failed backend attempt, preserved in the job's final outcome.
#[derive(Clone, Debug)]
pub struct AttemptRecord {
    /// Which backend was tried.
    pub backend: BackendId,

    /// How the attempt failed.
    pub kind: ErrorKind,

    /// How long the attempt ran before failing.
    pub elapsed: Duration,

    /// Backend-specific failure detail (exit codes, stderr, paths).
    pub detail: String,
}

/// Terminal record of a job.
///
/// Exactly one outcome exists per accepted job. `backend_used` is `None`
/// precisely when no backend succeeded.
#[derive(Clone, Debug)]
pub struct JobOutcome {
    /// The job this outcome belongs to.
    pub job_id: JobId,

    /// The backend that produced the output, when one did.
    pub backend_used: Option<BackendId>,

    /// Whether the job produced an output.
    pub success: bool,

    /// True when the output came from the always-succeeds fallback.
    pub degraded: bool,

    /// Why the job failed, when it did.
    pub error: Option<FailureKind>,

    /// Every failed backend attempt, in chain order.
    pub attempts: Vec<AttemptRecord>,

    /// Wall time from dequeue to terminal outcome.
    pub duration: Duration,
}

impl JobOutcome {
    /// Outcome for a job where some backend succeeded.
    pub fn succeeded(
        job_id: JobId,
        backend: BackendId,
        attempts: Vec<AttemptRecord>,
        duration: Duration,
    ) -> Self {
        Self {
            job_id,
            backend_used: Some(backend),
            success: true,
            degraded: backend == BackendId::Degraded,
            error: None,
            attempts,
            duration,
        }
    }

    /// Outcome for a job where every backend failed.
    pub fn exhausted(job_id: JobId, attempts: Vec<AttemptRecord>, duration: Duration) -> Self {
        Self {
            job_id,
            backend_used: None,
            success: false,
            degraded: false,
            error: Some(FailureKind::BackendExhausted),
            attempts,
            duration,
        }
    }

    /// Outcome for a job whose driving task panicked.
    pub fn worker_fault(job_id: JobId, duration: Duration) -> Self {
        Self {
            job_id,
            backend_used: None,
            success: false,
            degraded: false,
            error: Some(FailureKind::WorkerFault),
            attempts: Vec::new(),
            duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_strictly_increasing() {
        let a = JobId::next();
        let b = JobId::next();
        let c = JobId::next();
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn test_job_id_seed_moves_forward_only() {
        JobId::seed(50_000);
        let id = JobId::next();
        assert!(id.as_u64() >= 50_000);

        // Seeding backwards must not hand out an already-used ID.
        JobId::seed(1);
        let later = JobId::next();
        assert!(later > id);
    }

    #[test]
    fn test_job_id_display() {
        let id = JobId::from(7);
        assert_eq!(format!("{}", id), "job-7");
        assert_eq!(format!("{:?}", id), "JobId(7)");
    }

    #[test]
    fn test_job_from_trigger() {
        let event = TriggerEvent::new(42);
        let job = Job::from_trigger(&event);
        assert_eq!(job.origin_sequence, 42);
        assert_eq!(job.coalesced_count, 0);
        assert_eq!(job.created_at, event.observed_at);
    }

    #[test]
    fn test_job_record_merge() {
        let event = TriggerEvent::new(1);
        let mut job = Job::from_trigger(&event);
        job.record_merge();
        job.record_merge();
        assert_eq!(job.coalesced_count, 2);
    }

    #[test]
    fn test_worker_state_helpers() {
        let idle = WorkerState::Idle;
        assert!(!idle.is_processing());
        assert_eq!(idle.processing_job(), None);

        let busy = WorkerState::Processing(JobId::from(3));
        assert!(busy.is_processing());
        assert_eq!(busy.processing_job(), Some(JobId::from(3)));
        assert_eq!(format!("{}", busy), "processing job-3");
    }

    #[test]
    fn test_backend_id_chain_order() {
        assert!(BackendId::Script < BackendId::Service);
        assert!(BackendId::Service < BackendId::RawDevice);
        assert!(BackendId::RawDevice < BackendId::Degraded);
    }

    #[test]
    fn test_outcome_succeeded_flags_degraded() {
        let real = JobOutcome::succeeded(
            JobId::from(1),
            BackendId::Script,
            Vec::new(),
            Duration::from_millis(10),
        );
        assert!(real.success);
        assert!(!real.degraded);
        assert_eq!(real.backend_used, Some(BackendId::Script));

        let fallback = JobOutcome::succeeded(
            JobId::from(2),
            BackendId::Degraded,
            Vec::new(),
            Duration::from_millis(10),
        );
        assert!(fallback.success);
        assert!(fallback.degraded);
    }

    #[test]
    fn test_outcome_exhausted() {
        let outcome = JobOutcome::exhausted(JobId::from(9), Vec::new(), Duration::ZERO);
        assert!(!outcome.success);
        assert_eq!(outcome.backend_used, None);
        assert!(matches!(outcome.error, Some(FailureKind::BackendExhausted)));
    }

    #[test]
    fn test_outcome_worker_fault() {
        let outcome = JobOutcome::worker_fault(JobId::from(4), Duration::from_secs(1));
        assert!(!outcome.success);
        assert!(matches!(outcome.error, Some(FailureKind::WorkerFault)));
        assert!(outcome.attempts.is_empty());
    }
}
