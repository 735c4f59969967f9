//! Queue-driven task execution: the runner that turns Pending jobs and
//! reports into terminal states, plus the placeholder handlers used when no
//! real handler is registered for a type tag.

pub mod defaults;
pub mod runner;

pub use defaults::{EchoSimulationHandler, JsonReportHandler};
pub use runner::{RetryPolicy, TaskRunner};
