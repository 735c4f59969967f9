//! Persistence ports. Implementations live in the infrastructure crate;
//! everything above depends only on these traits.

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{JobFilter, Report, ReportFilter, SimulationJob, User};
use crate::errors::ServiceResult;

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn create(&self, job: &SimulationJob) -> ServiceResult<SimulationJob>;
    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<SimulationJob>>;
    /// Owner-scoped lookup; returns None for both absent and foreign jobs.
    async fn find_owned(&self, user_id: Uuid, id: Uuid) -> ServiceResult<Option<SimulationJob>>;
    async fn update(&self, job: &SimulationJob) -> ServiceResult<SimulationJob>;
    /// Newest-created first.
    async fn list(&self, user_id: Uuid, filter: &JobFilter) -> ServiceResult<Vec<SimulationJob>>;
}

#[async_trait]
pub trait ReportRepository: Send + Sync {
    async fn create(&self, report: &Report) -> ServiceResult<Report>;
    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<Report>>;
    async fn find_owned(&self, user_id: Uuid, id: Uuid) -> ServiceResult<Option<Report>>;
    async fn update(&self, report: &Report) -> ServiceResult<Report>;
    async fn list(&self, user_id: Uuid, filter: &ReportFilter) -> ServiceResult<Vec<Report>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> ServiceResult<User>;
    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>>;
}
