//! Handler contracts and the type-keyed registries that bind them.
//!
//! The core is simulation- and report-agnostic: concrete behavior is
//! supplied by handler implementations registered against an opaque type
//! tag at process startup. Registries are plain injected objects, not
//! globals, so tests can construct isolated instances.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::ServiceResult;

/// Receives incremental progress from a running simulation handler.
/// Invoked synchronously from the handler's task, zero or more times.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, fraction: f64);
}

/// Sink that discards progress updates.
pub struct NoopProgress;

#[async_trait]
impl ProgressSink for NoopProgress {
    async fn report(&self, _fraction: f64) {}
}

/// Executes one simulation type. Implementations interpret `parameters`
/// themselves; the core passes the document through opaquely.
#[async_trait]
pub trait SimulationHandler: Send + Sync {
    async fn execute(
        &self,
        job_id: Uuid,
        simulation_type: &str,
        parameters: &serde_json::Value,
        progress: &dyn ProgressSink,
    ) -> ServiceResult<serde_json::Value>;

    /// Optional pre-validation hook. The task runner does not call this;
    /// callers wanting fail-fast validation invoke it before enqueueing.
    fn validate_parameters(&self, _parameters: &serde_json::Value) -> bool {
        true
    }
}

/// Output of a report handler: raw file bytes plus metadata for storage.
#[derive(Debug, Clone)]
pub struct ReportArtifact {
    pub content: Vec<u8>,
    pub content_type: String,
    pub filename: String,
}

/// Generates one report type from the referenced jobs' result payloads.
#[async_trait]
pub trait ReportHandler: Send + Sync {
    async fn generate(
        &self,
        report_id: Uuid,
        report_type: &str,
        output_format: &str,
        parameters: &serde_json::Value,
        simulation_results: &[serde_json::Value],
    ) -> ServiceResult<ReportArtifact>;

    fn validate_parameters(&self, _parameters: &serde_json::Value) -> bool {
        true
    }
}

/// Type-keyed handler table. Re-registering a tag overwrites the previous
/// handler (last write wins). Registration is expected to finish before
/// concurrent dispatch begins; the interior lock only protects the map
/// itself.
pub struct HandlerRegistry<H: ?Sized> {
    handlers: RwLock<HashMap<String, Arc<H>>>,
}

impl<H: ?Sized> HandlerRegistry<H> {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, tag: &str, handler: Arc<H>) {
        let mut map = self.handlers.write().expect("handler registry poisoned");
        if map.insert(tag.to_string(), handler).is_some() {
            tracing::info!(tag, "Replaced existing handler registration");
        } else {
            tracing::info!(tag, "Registered handler");
        }
    }

    pub fn unregister(&self, tag: &str) {
        let mut map = self.handlers.write().expect("handler registry poisoned");
        if map.remove(tag).is_some() {
            tracing::info!(tag, "Unregistered handler");
        }
    }

    pub fn get(&self, tag: &str) -> Option<Arc<H>> {
        self.handlers
            .read()
            .expect("handler registry poisoned")
            .get(tag)
            .cloned()
    }

    pub fn list_tags(&self) -> BTreeSet<String> {
        self.handlers
            .read()
            .expect("handler registry poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Test support: drop every registration.
    pub fn clear(&self) {
        self.handlers
            .write()
            .expect("handler registry poisoned")
            .clear();
    }
}

impl<H: ?Sized> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

pub type SimulationHandlerRegistry = HandlerRegistry<dyn SimulationHandler>;
pub type ReportHandlerRegistry = HandlerRegistry<dyn ReportHandler>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ServiceError;

    struct StubHandler(&'static str);

    #[async_trait]
    impl SimulationHandler for StubHandler {
        async fn execute(
            &self,
            _job_id: Uuid,
            _simulation_type: &str,
            _parameters: &serde_json::Value,
            _progress: &dyn ProgressSink,
        ) -> ServiceResult<serde_json::Value> {
            Ok(serde_json::json!({ "who": self.0 }))
        }
    }

    #[tokio::test]
    async fn register_get_unregister() {
        let registry = SimulationHandlerRegistry::new();
        assert!(registry.get("monte_carlo").is_none());

        registry.register("monte_carlo", Arc::new(StubHandler("first")));
        assert!(registry.get("monte_carlo").is_some());
        assert_eq!(
            registry.list_tags(),
            BTreeSet::from(["monte_carlo".to_string()])
        );

        registry.unregister("monte_carlo");
        assert!(registry.get("monte_carlo").is_none());
    }

    #[tokio::test]
    async fn last_registration_wins() {
        let registry = SimulationHandlerRegistry::new();
        registry.register("mc", Arc::new(StubHandler("first")));
        registry.register("mc", Arc::new(StubHandler("second")));

        let handler = registry.get("mc").unwrap();
        let out = handler
            .execute(
                Uuid::new_v4(),
                "mc",
                &serde_json::json!({}),
                &NoopProgress,
            )
            .await
            .unwrap();
        assert_eq!(out["who"], "second");
    }

    #[test]
    fn clear_resets_everything() {
        let registry = SimulationHandlerRegistry::new();
        registry.register("a", Arc::new(StubHandler("a")));
        registry.register("b", Arc::new(StubHandler("b")));
        registry.clear();
        assert!(registry.list_tags().is_empty());
    }

    #[test]
    fn validate_parameters_defaults_to_true() {
        let handler = StubHandler("x");
        assert!(handler.validate_parameters(&serde_json::json!({"anything": 1})));
    }

    struct FailingHandler;

    #[async_trait]
    impl SimulationHandler for FailingHandler {
        async fn execute(
            &self,
            _job_id: Uuid,
            _simulation_type: &str,
            _parameters: &serde_json::Value,
            _progress: &dyn ProgressSink,
        ) -> ServiceResult<serde_json::Value> {
            Err(ServiceError::HandlerExecutionFailed("boom".into()))
        }
    }

    #[tokio::test]
    async fn handler_failure_surfaces_as_typed_error() {
        let registry = SimulationHandlerRegistry::new();
        registry.register("bad", Arc::new(FailingHandler));
        let err = registry
            .get("bad")
            .unwrap()
            .execute(Uuid::new_v4(), "bad", &serde_json::json!({}), &NoopProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::HandlerExecutionFailed(_)));
    }
}
