//! Application wiring: builds the port implementations the configuration
//! asks for, assembles the services on top and runs the selected
//! components.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use simsvc_api::{create_routes, AppState};
use simsvc_domain::{
    JobRepository, MessageQueue, ReportHandlerRegistry, ReportRepository,
    SimulationHandlerRegistry, UserRepository,
};
use simsvc_infrastructure::{
    InMemoryJobRepository, InMemoryQueue, InMemoryReportRepository, InMemoryUserRepository,
    PostgresJobRepository, PostgresReportRepository, PostgresUserRepository, RabbitMqQueue,
};
use simsvc_services::{AuthConfig, ReportService, SimulationService, UserService};
use simsvc_storage::{BlobStorage, DownloadTokenSigner, InMemoryBlobStorage, LocalBlobStorage};
use simsvc_worker::{RetryPolicy, TaskRunner};
use sqlx::postgres::PgPoolOptions;
use tokio::{net::TcpListener, sync::broadcast};
use tracing::info;

use crate::config::AppConfig;

#[derive(Debug, Clone)]
pub enum AppMode {
    Api,
    Worker,
    All,
}

struct Repositories {
    jobs: Arc<dyn JobRepository>,
    reports: Arc<dyn ReportRepository>,
    users: Arc<dyn UserRepository>,
}

pub struct Application {
    config: AppConfig,
    mode: AppMode,
    state: AppState,
    runner: Arc<TaskRunner>,
    simulation_handlers: Arc<SimulationHandlerRegistry>,
    report_handlers: Arc<ReportHandlerRegistry>,
}

impl Application {
    pub async fn new(config: AppConfig, mode: AppMode) -> Result<Self> {
        info!(?mode, "initializing application");

        let signer = DownloadTokenSigner::new(
            &config.storage.presign_secret,
            &config.storage.public_base_url,
        );
        let storage = create_storage(&config, signer.clone());
        let repos = create_repositories(&config).await?;
        let queue = create_queue(&config).await?;

        let simulations = Arc::new(
            SimulationService::new(repos.jobs.clone(), storage.clone(), queue.clone())
                .with_inline_limit(config.storage.inline_limit_bytes),
        );
        let reports = Arc::new(
            ReportService::new(
                repos.reports.clone(),
                repos.jobs.clone(),
                storage.clone(),
                queue.clone(),
            )
            .with_download_ttl(config.storage.presign_ttl_seconds),
        );
        let users = Arc::new(UserService::new(
            repos.users.clone(),
            AuthConfig::new(&config.auth.token_secret, config.auth.token_ttl_seconds),
        ));

        // registries are rebuilt at startup; plugins register before run()
        let simulation_handlers = Arc::new(SimulationHandlerRegistry::new());
        let report_handlers = Arc::new(ReportHandlerRegistry::new());

        let runner = Arc::new(
            TaskRunner::new(
                simulations.clone(),
                reports.clone(),
                queue,
                simulation_handlers.clone(),
                report_handlers.clone(),
            )
            .with_retry_policy(RetryPolicy {
                max_attempts: config.worker.max_attempts,
                retry_delay: Duration::from_secs(config.worker.retry_delay_seconds),
            })
            .with_poll_interval(Duration::from_millis(config.worker.poll_interval_ms)),
        );

        let state = AppState {
            simulations,
            reports,
            users,
            storage,
            download_tokens: signer,
        };

        Ok(Self {
            config,
            mode,
            state,
            runner,
            simulation_handlers,
            report_handlers,
        })
    }

    pub fn simulation_handlers(&self) -> Arc<SimulationHandlerRegistry> {
        self.simulation_handlers.clone()
    }

    pub fn report_handlers(&self) -> Arc<ReportHandlerRegistry> {
        self.report_handlers.clone()
    }

    pub async fn run(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        match self.mode {
            AppMode::Api => self.run_api(shutdown_rx).await,
            AppMode::Worker => self.run_worker(shutdown_rx).await,
            AppMode::All => {
                let worker_rx = shutdown_rx.resubscribe();
                let runner = self.runner.clone();
                let worker_handle = tokio::spawn(async move { runner.run(worker_rx).await });

                self.run_api(shutdown_rx).await?;
                worker_handle
                    .await
                    .context("worker task panicked")?
                    .context("worker loop failed")?;
                Ok(())
            }
        }
    }

    async fn run_api(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let router = create_routes(self.state.clone());
        let listener = TcpListener::bind(&self.config.api.bind_address)
            .await
            .with_context(|| format!("failed to bind {}", self.config.api.bind_address))?;
        info!(address = %self.config.api.bind_address, "api server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await
            .context("api server failed")
    }

    async fn run_worker(&self, shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.runner
            .run(shutdown_rx)
            .await
            .context("worker loop failed")
    }
}

fn create_storage(config: &AppConfig, signer: DownloadTokenSigner) -> Arc<dyn BlobStorage> {
    match config.storage.backend.as_str() {
        "memory" => Arc::new(InMemoryBlobStorage::new(signer)),
        _ => Arc::new(LocalBlobStorage::new(&config.storage.root, signer)),
    }
}

async fn create_repositories(config: &AppConfig) -> Result<Repositories> {
    if config.database.backend == "memory" {
        info!("using in-memory repositories");
        return Ok(Repositories {
            jobs: Arc::new(InMemoryJobRepository::new()),
            reports: Arc::new(InMemoryReportRepository::new()),
            users: Arc::new(InMemoryUserRepository::new()),
        });
    }

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_seconds))
        .connect(&config.database.url)
        .await
        .context("failed to connect to the database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run migrations")?;
    info!("database ready");

    Ok(Repositories {
        jobs: Arc::new(PostgresJobRepository::new(pool.clone())),
        reports: Arc::new(PostgresReportRepository::new(pool.clone())),
        users: Arc::new(PostgresUserRepository::new(pool)),
    })
}

async fn create_queue(config: &AppConfig) -> Result<Arc<dyn MessageQueue>> {
    let queue: Arc<dyn MessageQueue> = match config.queue.backend.as_str() {
        "memory" => {
            info!("using in-memory message queue");
            Arc::new(InMemoryQueue::new())
        }
        _ => Arc::new(
            RabbitMqQueue::connect(&config.queue.url)
                .await
                .context("failed to connect to RabbitMQ")?,
        ),
    };
    queue.create_queue(simsvc_domain::SIMULATION_QUEUE, true).await?;
    queue.create_queue(simsvc_domain::REPORT_QUEUE, true).await?;
    Ok(queue)
}
