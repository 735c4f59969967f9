//! Report lifecycle manager.
//!
//! Creation validates every referenced job before anything is persisted, so
//! a rejected request leaves no report row behind. Downloads are served
//! through time-limited presigned URLs rather than proxied bytes.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use simsvc_domain::{
    JobRepository, JobStatus, MessageQueue, Report, ReportArtifact, ReportFilter,
    ReportRepository, ReportStatus, ServiceError, ServiceResult, WorkItem, WorkMessage,
};
use simsvc_storage::{keys, BlobStorage};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Default lifetime of a presigned download URL.
pub const DEFAULT_DOWNLOAD_TTL_SECS: u64 = 3600;

/// Read view for a single report, with download details populated only when
/// the report is Completed.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ReportDownloadView {
    #[serde(flatten)]
    pub report: Report,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_expires_at: Option<DateTime<Utc>>,
}

pub struct ReportService {
    reports: Arc<dyn ReportRepository>,
    jobs: Arc<dyn JobRepository>,
    storage: Arc<dyn BlobStorage>,
    queue: Arc<dyn MessageQueue>,
    download_ttl_secs: u64,
}

impl ReportService {
    pub fn new(
        reports: Arc<dyn ReportRepository>,
        jobs: Arc<dyn JobRepository>,
        storage: Arc<dyn BlobStorage>,
        queue: Arc<dyn MessageQueue>,
    ) -> Self {
        Self {
            reports,
            jobs,
            storage,
            queue,
            download_ttl_secs: DEFAULT_DOWNLOAD_TTL_SECS,
        }
    }

    pub fn with_download_ttl(mut self, ttl_secs: u64) -> Self {
        self.download_ttl_secs = ttl_secs;
        self
    }

    /// Validates every referenced job (owner-scoped, Completed), then
    /// persists the Pending report and enqueues its work unit. The first
    /// failing job id is named in the error and nothing is written.
    #[instrument(skip(self, parameters), fields(user_id = %user_id, report_type = %report_type))]
    pub async fn create_report(
        &self,
        user_id: Uuid,
        report_type: String,
        output_format: String,
        simulation_job_ids: Vec<Uuid>,
        parameters: Value,
    ) -> ServiceResult<Report> {
        for &job_id in &simulation_job_ids {
            let job = self
                .jobs
                .find_owned(user_id, job_id)
                .await?
                .ok_or(ServiceError::JobNotFound { id: job_id })?;
            if job.status != JobStatus::Completed {
                return Err(ServiceError::SimulationNotCompleted { id: job_id });
            }
        }

        let report = Report::new(user_id, report_type, output_format, simulation_job_ids, parameters);
        let report = self.reports.create(&report).await?;
        self.queue
            .publish_message(
                simsvc_domain::REPORT_QUEUE,
                &WorkMessage::new(WorkItem::GenerateReport { report_id: report.id }),
            )
            .await?;

        info!(report_id = %report.id, "report created");
        Ok(report)
    }

    pub async fn get_report(&self, user_id: Uuid, id: Uuid) -> ServiceResult<Report> {
        self.reports
            .find_owned(user_id, id)
            .await?
            .ok_or(ServiceError::ReportNotFound { id })
    }

    pub async fn get_report_unchecked(&self, id: Uuid) -> ServiceResult<Report> {
        self.reports
            .find_by_id(id)
            .await?
            .ok_or(ServiceError::ReportNotFound { id })
    }

    /// Report plus download details when ready. The returned expiry mirrors
    /// the URL's token lifetime.
    pub async fn get_report_with_download(
        &self,
        user_id: Uuid,
        id: Uuid,
    ) -> ServiceResult<ReportDownloadView> {
        let report = self.get_report(user_id, id).await?;

        if report.status != ReportStatus::Completed {
            return Ok(ReportDownloadView {
                report,
                download_url: None,
                download_expires_at: None,
            });
        }

        let key = report.blob_key.clone().ok_or_else(|| {
            ServiceError::internal(format!("report {id} is completed but has no stored file"))
        })?;
        let url = self
            .storage
            .presign_download(&key, self.download_ttl_secs)
            .await?;
        let expires_at = Utc::now() + Duration::seconds(self.download_ttl_secs as i64);

        Ok(ReportDownloadView {
            report,
            download_url: Some(url),
            download_expires_at: Some(expires_at),
        })
    }

    /// Permissive status update; terminal states stamp `completed_at`.
    pub async fn update_status(&self, id: Uuid, status: ReportStatus) -> ServiceResult<Report> {
        let mut report = self.get_report_unchecked(id).await?;
        report.apply_status(status);
        self.reports.update(&report).await
    }

    #[instrument(skip(self, error_message), fields(report_id = %id, error_code))]
    pub async fn mark_failed(
        &self,
        id: Uuid,
        error_code: &str,
        error_message: String,
    ) -> ServiceResult<Report> {
        let mut report = self.get_report_unchecked(id).await?;
        report.apply_status(ReportStatus::Failed);
        report.error_code = Some(error_code.to_string());
        report.error_message = Some(error_message);
        warn!(report_id = %id, "report marked failed");
        self.reports.update(&report).await
    }

    /// Persists the generated artifact and forces the report Completed.
    #[instrument(skip(self, artifact), fields(report_id = %id))]
    pub async fn save_report_file(
        &self,
        id: Uuid,
        artifact: &ReportArtifact,
    ) -> ServiceResult<Report> {
        let mut report = self.get_report_unchecked(id).await?;

        let key = keys::report_key(report.user_id, report.id, &artifact.filename);
        self.storage
            .put_bytes(&key, &artifact.content, &artifact.content_type)
            .await?;

        report.blob_key = Some(key);
        report.content_type = Some(artifact.content_type.clone());
        report.size_bytes = Some(artifact.content.len() as i64);
        report.apply_status(ReportStatus::Completed);

        info!(report_id = %id, size = artifact.content.len(), "report file saved");
        self.reports.update(&report).await
    }

    pub async fn list_reports(
        &self,
        user_id: Uuid,
        filter: &ReportFilter,
    ) -> ServiceResult<Vec<Report>> {
        self.reports.list(user_id, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simsvc_domain::REPORT_QUEUE;
    use simsvc_infrastructure::{InMemoryJobRepository, InMemoryQueue, InMemoryReportRepository};
    use simsvc_storage::InMemoryBlobStorage;

    struct Fixture {
        reports: ReportService,
        jobs: Arc<InMemoryJobRepository>,
        queue: Arc<InMemoryQueue>,
    }

    fn fixture() -> Fixture {
        let jobs = Arc::new(InMemoryJobRepository::new());
        let queue = Arc::new(InMemoryQueue::new());
        let reports = ReportService::new(
            Arc::new(InMemoryReportRepository::new()),
            jobs.clone(),
            Arc::new(InMemoryBlobStorage::for_tests()),
            queue.clone(),
        );
        Fixture { reports, jobs, queue }
    }

    async fn completed_job(jobs: &InMemoryJobRepository, user_id: Uuid) -> Uuid {
        let mut job = simsvc_domain::SimulationJob::new(
            user_id,
            "mc".into(),
            serde_json::json!({}),
            serde_json::json!({}),
            None,
        );
        job.apply_status(JobStatus::Completed);
        jobs.create(&job).await.unwrap();
        job.id
    }

    #[tokio::test]
    async fn create_report_enqueues_and_uppercases_format() {
        let fx = fixture();
        let user = Uuid::new_v4();
        let job_id = completed_job(&fx.jobs, user).await;

        let report = fx
            .reports
            .create_report(user, "summary".into(), "pdf".into(), vec![job_id], serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(report.status, ReportStatus::Pending);
        assert_eq!(report.output_format, "PDF");

        let messages = fx.queue.consume_messages(REPORT_QUEUE).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0].item,
            WorkItem::GenerateReport { report_id: report.id }
        );
    }

    #[tokio::test]
    async fn validation_failure_names_the_job_and_persists_nothing() {
        let fx = fixture();
        let user = Uuid::new_v4();
        let done = completed_job(&fx.jobs, user).await;

        let pending = simsvc_domain::SimulationJob::new(
            user,
            "mc".into(),
            serde_json::json!({}),
            serde_json::json!({}),
            None,
        );
        fx.jobs.create(&pending).await.unwrap();

        let err = fx
            .reports
            .create_report(
                user,
                "summary".into(),
                "pdf".into(),
                vec![done, pending.id],
                serde_json::json!({}),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::SimulationNotCompleted { id } if id == pending.id
        ));

        assert!(fx
            .reports
            .list_reports(user, &ReportFilter::default())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(fx.queue.queue_depth(REPORT_QUEUE).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn foreign_job_reference_reads_as_not_found() {
        let fx = fixture();
        let owner = Uuid::new_v4();
        let job_id = completed_job(&fx.jobs, owner).await;

        let err = fx
            .reports
            .create_report(
                Uuid::new_v4(),
                "summary".into(),
                "pdf".into(),
                vec![job_id],
                serde_json::json!({}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::JobNotFound { id } if id == job_id));
    }

    #[tokio::test]
    async fn download_view_populated_only_when_completed() {
        let fx = fixture();
        let user = Uuid::new_v4();
        let job_id = completed_job(&fx.jobs, user).await;
        let report = fx
            .reports
            .create_report(user, "summary".into(), "pdf".into(), vec![job_id], serde_json::json!({}))
            .await
            .unwrap();

        let view = fx
            .reports
            .get_report_with_download(user, report.id)
            .await
            .unwrap();
        assert!(view.download_url.is_none());

        fx.reports
            .save_report_file(
                report.id,
                &ReportArtifact {
                    content: b"%PDF-1.4".to_vec(),
                    content_type: "application/pdf".into(),
                    filename: "report.pdf".into(),
                },
            )
            .await
            .unwrap();

        let view = fx
            .reports
            .get_report_with_download(user, report.id)
            .await
            .unwrap();
        assert_eq!(view.report.status, ReportStatus::Completed);
        assert_eq!(view.report.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(view.report.size_bytes, Some(8));
        let url = view.download_url.expect("download url present");
        assert!(url.contains("/files/reports/"));
        assert!(view.download_expires_at.expect("expiry set") > Utc::now());
    }

    #[tokio::test]
    async fn mark_failed_stamps_completed_at() {
        let fx = fixture();
        let user = Uuid::new_v4();
        let job_id = completed_job(&fx.jobs, user).await;
        let report = fx
            .reports
            .create_report(user, "summary".into(), "pdf".into(), vec![job_id], serde_json::json!({}))
            .await
            .unwrap();

        let failed = fx
            .reports
            .mark_failed(report.id, "REPORT_ERROR", "generator crashed".into())
            .await
            .unwrap();
        assert_eq!(failed.status, ReportStatus::Failed);
        assert!(failed.completed_at.is_some());

        let view = fx
            .reports
            .get_report_with_download(user, report.id)
            .await
            .unwrap();
        assert!(view.download_url.is_none());
        assert_eq!(view.report.error_code.as_deref(), Some("REPORT_ERROR"));
    }
}
