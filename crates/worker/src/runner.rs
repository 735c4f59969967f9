//! The task runner: drains the simulation and report queues, drives each
//! work unit to a terminal state and republishes failed attempts until the
//! retry budget runs out.
//!
//! Execution is not idempotency-guarded. A redelivered message re-runs the
//! handler and overwrites the stored result; save paths double as the
//! crash-recovery path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use simsvc_domain::{
    MessageQueue, ProgressSink, ReportHandler, ReportHandlerRegistry, ReportStatus, ServiceError,
    ServiceResult, SimulationHandler, SimulationHandlerRegistry, JobStatus, WorkItem, WorkMessage,
    REPORT_QUEUE, SIMULATION_QUEUE,
};
use simsvc_services::{ReportService, SimulationService};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, the first delivery included.
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(60),
        }
    }
}

/// Persists handler progress as a Running-status update. Persistence
/// failures are logged and swallowed; progress is advisory.
struct ProgressRecorder {
    simulations: Arc<SimulationService>,
    job_id: Uuid,
}

#[async_trait]
impl ProgressSink for ProgressRecorder {
    async fn report(&self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        if let Err(e) = self
            .simulations
            .update_status(self.job_id, JobStatus::Running, Some(fraction))
            .await
        {
            warn!(job_id = %self.job_id, error = %e, "failed to persist progress");
        }
    }
}

pub struct TaskRunner {
    simulations: Arc<SimulationService>,
    reports: Arc<ReportService>,
    queue: Arc<dyn MessageQueue>,
    simulation_handlers: Arc<SimulationHandlerRegistry>,
    report_handlers: Arc<ReportHandlerRegistry>,
    default_simulation: Arc<dyn SimulationHandler>,
    default_report: Arc<dyn ReportHandler>,
    retry: RetryPolicy,
    poll_interval: Duration,
}

impl TaskRunner {
    pub fn new(
        simulations: Arc<SimulationService>,
        reports: Arc<ReportService>,
        queue: Arc<dyn MessageQueue>,
        simulation_handlers: Arc<SimulationHandlerRegistry>,
        report_handlers: Arc<ReportHandlerRegistry>,
    ) -> Self {
        Self {
            simulations,
            reports,
            queue,
            simulation_handlers,
            report_handlers,
            default_simulation: Arc::new(crate::defaults::EchoSimulationHandler::new()),
            default_report: Arc::new(crate::defaults::JsonReportHandler),
            retry: RetryPolicy::default(),
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Polls both queues until a shutdown signal arrives.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> ServiceResult<()> {
        self.queue.create_queue(SIMULATION_QUEUE, true).await?;
        self.queue.create_queue(REPORT_QUEUE, true).await?;
        info!("task runner started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("task runner shutting down");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.poll_interval) => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "queue poll failed");
                    }
                }
            }
        }
    }

    /// Drains whatever is currently available on both queues.
    pub async fn run_once(&self) -> ServiceResult<()> {
        for queue_name in [SIMULATION_QUEUE, REPORT_QUEUE] {
            for message in self.queue.consume_messages(queue_name).await? {
                self.handle_message(message).await;
            }
        }
        Ok(())
    }

    async fn handle_message(&self, message: WorkMessage) {
        debug!(message_id = %message.id, retry_count = message.retry_count, "handling work unit");
        let outcome = match &message.item {
            WorkItem::RunSimulation { job_id } => self.process_simulation(*job_id).await,
            WorkItem::GenerateReport { report_id } => self.process_report(*report_id).await,
        };

        match outcome {
            Ok(()) => {}
            // every failure is retried until the attempt budget runs out
            Err(e) if !message.is_retry_exhausted(self.retry.max_attempts) => {
                warn!(
                    message_id = %message.id,
                    attempt = message.retry_count + 1,
                    error = %e,
                    "work unit failed, scheduling retry"
                );
                self.schedule_retry(&message);
            }
            Err(e) => {
                error!(message_id = %message.id, error = %e, "work unit abandoned");
            }
        }

        if let Err(e) = self.queue.ack_message(&message.id).await {
            warn!(message_id = %message.id, error = %e, "failed to ack message");
        }
    }

    fn schedule_retry(&self, message: &WorkMessage) {
        let queue = self.queue.clone();
        let next = message.next_attempt();
        let delay = self.retry.retry_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let queue_name = next.item.queue();
            if let Err(e) = queue.publish_message(queue_name, &next).await {
                error!(message_id = %next.id, error = %e, "failed to republish retry");
            }
        });
    }

    /// Runs one simulation job to a terminal state. Any failure after the
    /// Running transition marks the job Failed before propagating.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn process_simulation(&self, job_id: Uuid) -> ServiceResult<()> {
        let result = self.run_simulation_inner(job_id).await;
        if let Err(e) = &result {
            if let Err(mark_err) = self
                .simulations
                .mark_failed(job_id, "SIMULATION_ERROR", e.to_string())
                .await
            {
                warn!(job_id = %job_id, error = %mark_err, "failed to mark job failed");
            }
        }
        result
    }

    async fn run_simulation_inner(&self, job_id: Uuid) -> ServiceResult<()> {
        self.simulations
            .update_status(job_id, JobStatus::Running, Some(0.0))
            .await?;
        let job = self.simulations.get_job_unchecked(job_id).await?;
        let parameters = self.simulations.resolve_parameters(&job).await?;

        let handler = match self.simulation_handlers.get(&job.simulation_type) {
            Some(handler) => handler,
            None => {
                warn!(
                    job_id = %job_id,
                    simulation_type = %job.simulation_type,
                    "no handler registered, using placeholder"
                );
                self.default_simulation.clone()
            }
        };

        let progress = ProgressRecorder {
            simulations: self.simulations.clone(),
            job_id,
        };
        let result = handler
            .execute(job_id, &job.simulation_type, &parameters, &progress)
            .await?;

        self.simulations.save_result(job_id, &result).await?;
        info!(job_id = %job_id, "simulation completed");
        Ok(())
    }

    /// Runs one report to a terminal state.
    #[instrument(skip(self), fields(report_id = %report_id))]
    pub async fn process_report(&self, report_id: Uuid) -> ServiceResult<()> {
        let result = self.run_report_inner(report_id).await;
        if let Err(e) = &result {
            if let Err(mark_err) = self
                .reports
                .mark_failed(report_id, "REPORT_ERROR", e.to_string())
                .await
            {
                warn!(report_id = %report_id, error = %mark_err, "failed to mark report failed");
            }
        }
        result
    }

    async fn run_report_inner(&self, report_id: Uuid) -> ServiceResult<()> {
        self.reports
            .update_status(report_id, ReportStatus::Generating)
            .await?;
        let report = self.reports.get_report_unchecked(report_id).await?;

        let mut simulation_results: Vec<Value> = Vec::with_capacity(report.simulation_job_ids.len());
        for &job_id in &report.simulation_job_ids {
            let view = self.simulations.get_result(report.user_id, job_id).await?;
            let payload = view
                .result
                .ok_or(ServiceError::SimulationNotCompleted { id: job_id })?;
            simulation_results.push(payload);
        }

        let handler = match self.report_handlers.get(&report.report_type) {
            Some(handler) => handler,
            None => {
                warn!(
                    report_id = %report_id,
                    report_type = %report.report_type,
                    "no handler registered, using placeholder"
                );
                self.default_report.clone()
            }
        };

        let artifact = handler
            .generate(
                report_id,
                &report.report_type,
                &report.output_format,
                &report.parameters,
                &simulation_results,
            )
            .await?;

        self.reports.save_report_file(report_id, &artifact).await?;
        info!(report_id = %report_id, "report completed");
        Ok(())
    }
}
