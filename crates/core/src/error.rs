use crate::status::JobStatus;

/// Domain error taxonomy for the queue core.
///
/// `InvalidTransition` and `NotFound` are contract violations and abort
/// the operation loudly. `Conflict` is expected under concurrent master
/// promotion and is surfaced to the caller for retry. `StaleClaim`
/// tells a worker its job was reclaimed by the staleness sweep while it
/// was still working.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid transition for {status} job {job_id}: {detail}")]
    InvalidTransition {
        job_id: String,
        status: JobStatus,
        detail: String,
    },

    #[error("Claim on job {job_id} went stale; the job was returned to the queue")]
    StaleClaim { job_id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}
