pub mod database;
pub mod queue;

pub use database::memory::{InMemoryJobRepository, InMemoryReportRepository, InMemoryUserRepository};
pub use database::postgres::{PostgresJobRepository, PostgresReportRepository, PostgresUserRepository};
pub use queue::memory::InMemoryQueue;
pub use queue::rabbitmq::RabbitMqQueue;
