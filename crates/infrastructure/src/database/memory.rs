//! In-memory repositories for tests and embedded (zero-dependency) mode.
//!
//! Filtering and ordering mirror the Postgres implementations so the two
//! are interchangeable behind the repository traits.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use simsvc_domain::{
    JobFilter, JobRepository, Report, ReportFilter, ReportRepository, ServiceError, ServiceResult,
    SimulationJob, User, UserRepository,
};
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryJobRepository {
    jobs: RwLock<HashMap<Uuid, SimulationJob>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, job: &SimulationJob) -> ServiceResult<SimulationJob> {
        self.jobs
            .write()
            .expect("job map poisoned")
            .insert(job.id, job.clone());
        Ok(job.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<SimulationJob>> {
        Ok(self.jobs.read().expect("job map poisoned").get(&id).cloned())
    }

    async fn find_owned(&self, user_id: Uuid, id: Uuid) -> ServiceResult<Option<SimulationJob>> {
        Ok(self
            .jobs
            .read()
            .expect("job map poisoned")
            .get(&id)
            .filter(|j| j.user_id == user_id)
            .cloned())
    }

    async fn update(&self, job: &SimulationJob) -> ServiceResult<SimulationJob> {
        let mut map = self.jobs.write().expect("job map poisoned");
        if !map.contains_key(&job.id) {
            return Err(ServiceError::JobNotFound { id: job.id });
        }
        map.insert(job.id, job.clone());
        Ok(job.clone())
    }

    async fn list(&self, user_id: Uuid, filter: &JobFilter) -> ServiceResult<Vec<SimulationJob>> {
        let map = self.jobs.read().expect("job map poisoned");
        let mut jobs: Vec<SimulationJob> = map
            .values()
            .filter(|j| j.user_id == user_id)
            .filter(|j| filter.status.is_none_or(|s| j.status == s))
            .filter(|j| {
                filter
                    .simulation_type
                    .as_ref()
                    .is_none_or(|t| &j.simulation_type == t)
            })
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.unwrap_or(100).max(0) as usize;
        Ok(jobs.into_iter().skip(offset).take(limit).collect())
    }
}

#[derive(Default)]
pub struct InMemoryReportRepository {
    reports: RwLock<HashMap<Uuid, Report>>,
}

impl InMemoryReportRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportRepository for InMemoryReportRepository {
    async fn create(&self, report: &Report) -> ServiceResult<Report> {
        self.reports
            .write()
            .expect("report map poisoned")
            .insert(report.id, report.clone());
        Ok(report.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<Report>> {
        Ok(self
            .reports
            .read()
            .expect("report map poisoned")
            .get(&id)
            .cloned())
    }

    async fn find_owned(&self, user_id: Uuid, id: Uuid) -> ServiceResult<Option<Report>> {
        Ok(self
            .reports
            .read()
            .expect("report map poisoned")
            .get(&id)
            .filter(|r| r.user_id == user_id)
            .cloned())
    }

    async fn update(&self, report: &Report) -> ServiceResult<Report> {
        let mut map = self.reports.write().expect("report map poisoned");
        if !map.contains_key(&report.id) {
            return Err(ServiceError::ReportNotFound { id: report.id });
        }
        map.insert(report.id, report.clone());
        Ok(report.clone())
    }

    async fn list(&self, user_id: Uuid, filter: &ReportFilter) -> ServiceResult<Vec<Report>> {
        let map = self.reports.read().expect("report map poisoned");
        let mut reports: Vec<Report> = map
            .values()
            .filter(|r| r.user_id == user_id)
            .filter(|r| filter.status.is_none_or(|s| r.status == s))
            .filter(|r| {
                filter
                    .report_type
                    .as_ref()
                    .is_none_or(|t| &r.report_type == t)
            })
            .cloned()
            .collect();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.unwrap_or(100).max(0) as usize;
        Ok(reports.into_iter().skip(offset).take(limit).collect())
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: &User) -> ServiceResult<User> {
        let mut map = self.users.write().expect("user map poisoned");
        if map.values().any(|u| u.email == user.email) {
            return Err(ServiceError::EmailTaken {
                email: user.email.clone(),
            });
        }
        map.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<User>> {
        Ok(self
            .users
            .read()
            .expect("user map poisoned")
            .get(&id)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        Ok(self
            .users
            .read()
            .expect("user map poisoned")
            .values()
            .find(|u| u.email == email)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use simsvc_domain::JobStatus;

    fn job(user_id: Uuid, sim_type: &str) -> SimulationJob {
        SimulationJob::new(
            user_id,
            sim_type.to_string(),
            serde_json::json!({}),
            serde_json::json!({}),
            None,
        )
    }

    #[tokio::test]
    async fn owned_lookup_hides_foreign_jobs() {
        let repo = InMemoryJobRepository::new();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let created = repo.create(&job(owner, "mc")).await.unwrap();

        assert!(repo.find_owned(owner, created.id).await.unwrap().is_some());
        assert!(repo.find_owned(stranger, created.id).await.unwrap().is_none());
        assert!(repo.find_by_id(created.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_filters_and_orders_newest_first() {
        let repo = InMemoryJobRepository::new();
        let owner = Uuid::new_v4();

        let mut first = job(owner, "alpha");
        first.created_at = chrono::Utc::now() - chrono::Duration::seconds(30);
        let mut second = job(owner, "beta");
        second.created_at = chrono::Utc::now() - chrono::Duration::seconds(20);
        let mut third = job(owner, "alpha");
        third.created_at = chrono::Utc::now() - chrono::Duration::seconds(10);
        for j in [&first, &second, &third] {
            repo.create(j).await.unwrap();
        }

        let all = repo.list(owner, &JobFilter::default()).await.unwrap();
        assert_eq!(
            all.iter().map(|j| j.id).collect::<Vec<_>>(),
            vec![third.id, second.id, first.id]
        );

        let alphas = repo
            .list(
                owner,
                &JobFilter {
                    simulation_type: Some("alpha".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(alphas.len(), 2);

        let page = repo
            .list(
                owner,
                &JobFilter {
                    limit: Some(1),
                    offset: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, second.id);
    }

    #[tokio::test]
    async fn status_filter_applies() {
        let repo = InMemoryJobRepository::new();
        let owner = Uuid::new_v4();
        let mut done = job(owner, "mc");
        done.apply_status(JobStatus::Completed);
        repo.create(&done).await.unwrap();
        repo.create(&job(owner, "mc")).await.unwrap();

        let completed = repo
            .list(
                owner,
                &JobFilter {
                    status: Some(JobStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, done.id);
    }

    #[tokio::test]
    async fn duplicate_email_is_conflict() {
        let repo = InMemoryUserRepository::new();
        let user = User::new("a@b.c".into(), "hash".into(), "A".into());
        repo.create(&user).await.unwrap();

        let dup = User::new("a@b.c".into(), "hash2".into(), "B".into());
        assert!(matches!(
            repo.create(&dup).await,
            Err(ServiceError::EmailTaken { .. })
        ));
    }
}
