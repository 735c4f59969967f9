//! Simulation job lifecycle manager.
//!
//! Owns creation-time storage placement (inline vs blob-referenced
//! parameters), the status/timestamp rules, and the read views. Status
//! transitions are deliberately permissive here; the guarded entry points
//! are `cancel_job` and `save_result`.

use std::sync::Arc;

use serde_json::Value;
use simsvc_domain::{
    blob_reference_placeholder, JobFilter, JobRepository, JobStatus, MessageQueue, ServiceError,
    ServiceResult, SimulationJob, WorkItem, WorkMessage,
};
use simsvc_storage::{keys, BlobStorage};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Serialized parameter documents at or below this size stay inline in the
/// job row; larger ones move to the blob store.
pub const PARAMETERS_INLINE_LIMIT_BYTES: usize = 100 * 1024;

const PARAMETERS_FILENAME: &str = "parameters.json";
const RESULT_FILENAME: &str = "result.json";

/// Read view returned by `get_result`. Only a Completed job carries the
/// payload; everything else reports status plus a human-readable message.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobResultView {
    pub job_id: Uuid,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub struct SimulationService {
    jobs: Arc<dyn JobRepository>,
    storage: Arc<dyn BlobStorage>,
    queue: Arc<dyn MessageQueue>,
    inline_limit_bytes: usize,
}

impl SimulationService {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        storage: Arc<dyn BlobStorage>,
        queue: Arc<dyn MessageQueue>,
    ) -> Self {
        Self {
            jobs,
            storage,
            queue,
            inline_limit_bytes: PARAMETERS_INLINE_LIMIT_BYTES,
        }
    }

    pub fn with_inline_limit(mut self, limit_bytes: usize) -> Self {
        self.inline_limit_bytes = limit_bytes;
        self
    }

    /// Creates a Pending job and enqueues its work unit. Oversized parameter
    /// documents are written to the blob store first and replaced inline by
    /// the reference placeholder.
    #[instrument(skip(self, parameters, metadata), fields(user_id = %user_id, simulation_type = %simulation_type))]
    pub async fn create_job(
        &self,
        user_id: Uuid,
        simulation_type: String,
        parameters: Value,
        metadata: Value,
        callback_url: Option<String>,
    ) -> ServiceResult<SimulationJob> {
        let mut job = SimulationJob::new(user_id, simulation_type, parameters, metadata, callback_url);

        let serialized = serde_json::to_vec(&job.parameters)?;
        if serialized.len() > self.inline_limit_bytes {
            let key = keys::simulation_key(user_id, job.id, PARAMETERS_FILENAME);
            self.storage.put_json(&key, &job.parameters).await?;
            info!(job_id = %job.id, %key, size = serialized.len(), "parameters offloaded to blob store");
            job.parameters_blob_key = Some(key);
            job.parameters = blob_reference_placeholder();
        }

        let job = self.jobs.create(&job).await?;
        self.queue
            .publish_message(
                simsvc_domain::SIMULATION_QUEUE,
                &WorkMessage::new(WorkItem::RunSimulation { job_id: job.id }),
            )
            .await?;

        info!(job_id = %job.id, "simulation job created");
        Ok(job)
    }

    /// Owner-scoped lookup. Absent and foreign jobs are indistinguishable.
    pub async fn get_job(&self, user_id: Uuid, id: Uuid) -> ServiceResult<SimulationJob> {
        self.jobs
            .find_owned(user_id, id)
            .await?
            .ok_or(ServiceError::JobNotFound { id })
    }

    /// Lookup without an ownership check, for the task runner.
    pub async fn get_job_unchecked(&self, id: Uuid) -> ServiceResult<SimulationJob> {
        self.jobs
            .find_by_id(id)
            .await?
            .ok_or(ServiceError::JobNotFound { id })
    }

    /// Returns the full parameter document, fetching from the blob store
    /// when the job carries a reference instead of inline parameters.
    pub async fn resolve_parameters(&self, job: &SimulationJob) -> ServiceResult<Value> {
        match &job.parameters_blob_key {
            Some(key) => self.storage.get_json(key).await,
            None => Ok(job.parameters.clone()),
        }
    }

    /// Permissive status update with the timestamp rules applied. Progress is
    /// only stored when provided.
    pub async fn update_status(
        &self,
        id: Uuid,
        status: JobStatus,
        progress: Option<f64>,
    ) -> ServiceResult<SimulationJob> {
        let mut job = self.get_job_unchecked(id).await?;
        job.apply_status(status);
        if let Some(p) = progress {
            job.progress = Some(p);
        }
        self.jobs.update(&job).await
    }

    /// Marks a job Failed with a machine-readable code and message.
    #[instrument(skip(self, error_message), fields(job_id = %id, error_code))]
    pub async fn mark_failed(
        &self,
        id: Uuid,
        error_code: &str,
        error_message: String,
    ) -> ServiceResult<SimulationJob> {
        let mut job = self.get_job_unchecked(id).await?;
        job.apply_status(JobStatus::Failed);
        job.error_code = Some(error_code.to_string());
        job.error_message = Some(error_message);
        warn!(job_id = %id, "simulation job marked failed");
        self.jobs.update(&job).await
    }

    /// The sole path into Completed: persists the result document, records
    /// its size and sets progress to 1.0.
    #[instrument(skip(self, result), fields(job_id = %id))]
    pub async fn save_result(&self, id: Uuid, result: &Value) -> ServiceResult<SimulationJob> {
        let mut job = self.get_job_unchecked(id).await?;

        let key = keys::simulation_key(job.user_id, job.id, RESULT_FILENAME);
        self.storage.put_json(&key, result).await?;
        let size = serde_json::to_vec(result)?.len() as i64;

        job.result_blob_key = Some(key);
        job.result_size_bytes = Some(size);
        job.progress = Some(1.0);
        job.apply_status(JobStatus::Completed);

        info!(job_id = %id, size, "simulation result saved");
        self.jobs.update(&job).await
    }

    /// Result view. A Completed job without a stored result is an invariant
    /// violation reported as `ResultNotFound`.
    pub async fn get_result(&self, user_id: Uuid, id: Uuid) -> ServiceResult<JobResultView> {
        let job = self.get_job(user_id, id).await?;

        match job.status {
            JobStatus::Completed => {
                let key = job
                    .result_blob_key
                    .as_deref()
                    .ok_or(ServiceError::ResultNotFound { id })?;
                let result = self.storage.get_json(key).await?;
                Ok(JobResultView {
                    job_id: job.id,
                    status: job.status,
                    result: Some(result),
                    error_code: None,
                    error_message: None,
                    message: None,
                })
            }
            JobStatus::Failed => Ok(JobResultView {
                job_id: job.id,
                status: job.status,
                result: None,
                error_code: job.error_code,
                error_message: job.error_message,
                message: Some("Simulation failed".to_string()),
            }),
            status => Ok(JobResultView {
                job_id: job.id,
                status,
                result: None,
                error_code: None,
                error_message: None,
                message: Some(format!("Simulation is {status}, no result available yet")),
            }),
        }
    }

    /// Cancels a Pending or Running job; anything else is rejected with the
    /// current status in the error.
    #[instrument(skip(self), fields(user_id = %user_id, job_id = %id))]
    pub async fn cancel_job(&self, user_id: Uuid, id: Uuid) -> ServiceResult<SimulationJob> {
        let mut job = self.get_job(user_id, id).await?;
        if !job.status.is_cancellable() {
            return Err(ServiceError::InvalidStateTransition {
                operation: "cancel",
                current: job.status,
            });
        }
        job.apply_status(JobStatus::Cancelled);
        info!(job_id = %id, "simulation job cancelled");
        self.jobs.update(&job).await
    }

    pub async fn list_jobs(
        &self,
        user_id: Uuid,
        filter: &JobFilter,
    ) -> ServiceResult<Vec<SimulationJob>> {
        self.jobs.list(user_id, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simsvc_domain::{BLOB_REFERENCE_MARKER, SIMULATION_QUEUE};
    use simsvc_infrastructure::{InMemoryJobRepository, InMemoryQueue};
    use simsvc_storage::InMemoryBlobStorage;

    fn service() -> (SimulationService, Arc<InMemoryQueue>, Arc<InMemoryBlobStorage>) {
        let queue = Arc::new(InMemoryQueue::new());
        let storage = Arc::new(InMemoryBlobStorage::for_tests());
        let svc = SimulationService::new(
            Arc::new(InMemoryJobRepository::new()),
            storage.clone(),
            queue.clone(),
        );
        (svc, queue, storage)
    }

    #[tokio::test]
    async fn small_parameters_stay_inline_and_work_is_enqueued() {
        let (svc, queue, _) = service();
        let job = svc
            .create_job(
                Uuid::new_v4(),
                "monte_carlo".into(),
                serde_json::json!({"iterations": 1000}),
                serde_json::json!({}),
                None,
            )
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.parameters_blob_key.is_none());
        assert_eq!(job.parameters["iterations"], 1000);

        let messages = queue.consume_messages(SIMULATION_QUEUE).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].item,
            WorkItem::RunSimulation { job_id: job.id }
        );
    }

    #[tokio::test]
    async fn parameters_at_the_limit_stay_inline() {
        let (svc, _, storage) = service();
        // `{"blob":""}` serializes to 11 bytes; pad to land exactly on the limit
        let doc = serde_json::json!({"blob": "x".repeat(PARAMETERS_INLINE_LIMIT_BYTES - 11)});
        assert_eq!(
            serde_json::to_vec(&doc).unwrap().len(),
            PARAMETERS_INLINE_LIMIT_BYTES
        );

        let job = svc
            .create_job(Uuid::new_v4(), "mc".into(), doc.clone(), serde_json::json!({}), None)
            .await
            .unwrap();

        assert!(job.parameters_blob_key.is_none());
        assert_eq!(job.parameters, doc);
        assert_eq!(svc.resolve_parameters(&job).await.unwrap(), doc);
        let key = keys::simulation_key(job.user_id, job.id, "parameters.json");
        assert!(!storage.exists(&key).await.unwrap());
    }

    #[tokio::test]
    async fn oversized_parameters_are_offloaded() {
        let (svc, _, storage) = service();
        let big = serde_json::json!({"blob": "x".repeat(PARAMETERS_INLINE_LIMIT_BYTES + 1)});
        let job = svc
            .create_job(Uuid::new_v4(), "mc".into(), big.clone(), serde_json::json!({}), None)
            .await
            .unwrap();

        let key = job.parameters_blob_key.as_deref().expect("blob key set");
        assert_eq!(job.parameters[BLOB_REFERENCE_MARKER], true);
        assert_eq!(storage.get_json(key).await.unwrap(), big);
        assert_eq!(svc.resolve_parameters(&job).await.unwrap(), big);
    }

    #[tokio::test]
    async fn foreign_job_reads_as_not_found() {
        let (svc, _, _) = service();
        let owner = Uuid::new_v4();
        let job = svc
            .create_job(owner, "mc".into(), serde_json::json!({}), serde_json::json!({}), None)
            .await
            .unwrap();

        let err = svc.get_job(Uuid::new_v4(), job.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::JobNotFound { id } if id == job.id));
        assert!(svc.get_job(owner, job.id).await.is_ok());
    }

    #[tokio::test]
    async fn save_result_is_the_completion_path() {
        let (svc, _, _) = service();
        let owner = Uuid::new_v4();
        let job = svc
            .create_job(owner, "mc".into(), serde_json::json!({}), serde_json::json!({}), None)
            .await
            .unwrap();

        let completed = svc
            .save_result(job.id, &serde_json::json!({"mean": 0.5}))
            .await
            .unwrap();
        assert_eq!(completed.status, JobStatus::Completed);
        assert_eq!(completed.progress, Some(1.0));
        assert!(completed.result_blob_key.is_some());
        assert!(completed.completed_at.is_some());

        let view = svc.get_result(owner, job.id).await.unwrap();
        assert_eq!(view.result.unwrap()["mean"], 0.5);
    }

    #[tokio::test]
    async fn result_view_before_completion_carries_message() {
        let (svc, _, _) = service();
        let owner = Uuid::new_v4();
        let job = svc
            .create_job(owner, "mc".into(), serde_json::json!({}), serde_json::json!({}), None)
            .await
            .unwrap();

        let view = svc.get_result(owner, job.id).await.unwrap();
        assert_eq!(view.status, JobStatus::Pending);
        assert!(view.result.is_none());
        assert!(view.message.unwrap().contains("PENDING"));
    }

    #[tokio::test]
    async fn failed_result_view_carries_error_fields() {
        let (svc, _, _) = service();
        let owner = Uuid::new_v4();
        let job = svc
            .create_job(owner, "mc".into(), serde_json::json!({}), serde_json::json!({}), None)
            .await
            .unwrap();
        svc.mark_failed(job.id, "SIMULATION_ERROR", "handler exploded".into())
            .await
            .unwrap();

        let view = svc.get_result(owner, job.id).await.unwrap();
        assert_eq!(view.status, JobStatus::Failed);
        assert_eq!(view.error_code.as_deref(), Some("SIMULATION_ERROR"));
        assert_eq!(view.error_message.as_deref(), Some("handler exploded"));
    }

    #[tokio::test]
    async fn cancel_only_from_pending_or_running() {
        let (svc, _, _) = service();
        let owner = Uuid::new_v4();
        let job = svc
            .create_job(owner, "mc".into(), serde_json::json!({}), serde_json::json!({}), None)
            .await
            .unwrap();

        let cancelled = svc.cancel_job(owner, job.id).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);

        let err = svc.cancel_job(owner, job.id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::InvalidStateTransition {
                operation: "cancel",
                current: JobStatus::Cancelled,
            }
        ));
    }

    #[tokio::test]
    async fn running_transition_stamps_started_at_once() {
        let (svc, _, _) = service();
        let job = svc
            .create_job(Uuid::new_v4(), "mc".into(), serde_json::json!({}), serde_json::json!({}), None)
            .await
            .unwrap();

        let running = svc
            .update_status(job.id, JobStatus::Running, Some(0.25))
            .await
            .unwrap();
        let started = running.started_at.expect("started_at stamped");
        assert_eq!(running.progress, Some(0.25));

        let again = svc
            .update_status(job.id, JobStatus::Running, Some(0.5))
            .await
            .unwrap();
        assert_eq!(again.started_at, Some(started));
    }
}
