//! Placeholder handlers used when no handler is registered for a type tag.
//! They keep the pipeline exercisable end to end without domain plugins.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use simsvc_domain::{ProgressSink, ReportArtifact, ReportHandler, ServiceResult, SimulationHandler};
use uuid::Uuid;

/// Sleeps briefly, reports halfway progress and echoes the input back,
/// tagged as a placeholder result.
pub struct EchoSimulationHandler {
    delay: Duration,
}

impl EchoSimulationHandler {
    pub fn new() -> Self {
        Self {
            delay: Duration::from_millis(50),
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for EchoSimulationHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimulationHandler for EchoSimulationHandler {
    async fn execute(
        &self,
        job_id: Uuid,
        simulation_type: &str,
        parameters: &Value,
        progress: &dyn ProgressSink,
    ) -> ServiceResult<Value> {
        tokio::time::sleep(self.delay).await;
        progress.report(0.5).await;

        Ok(json!({
            "placeholder": true,
            "job_id": job_id.to_string(),
            "simulation_type": simulation_type,
            "parameters": parameters,
            "message": format!("no handler registered for '{simulation_type}', input echoed"),
        }))
    }
}

/// Emits a JSON document embedding the raw inputs.
#[derive(Default)]
pub struct JsonReportHandler;

#[async_trait]
impl ReportHandler for JsonReportHandler {
    async fn generate(
        &self,
        report_id: Uuid,
        report_type: &str,
        output_format: &str,
        parameters: &Value,
        simulation_results: &[Value],
    ) -> ServiceResult<ReportArtifact> {
        let document = json!({
            "placeholder": true,
            "report_id": report_id.to_string(),
            "report_type": report_type,
            "requested_format": output_format,
            "parameters": parameters,
            "simulation_results": simulation_results,
        });
        let content = serde_json::to_vec_pretty(&document)
            .map_err(simsvc_domain::ServiceError::from)?;

        Ok(ReportArtifact {
            content,
            content_type: "application/json".to_string(),
            filename: "report.json".to_string(),
        })
    }
}
