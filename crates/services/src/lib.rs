//! Lifecycle managers sitting between the transport layer and the ports:
//! job and report state machines, storage placement, and user accounts.

pub mod report;
pub mod simulation;
pub mod user;

pub use report::{ReportDownloadView, ReportService, DEFAULT_DOWNLOAD_TTL_SECS};
pub use simulation::{JobResultView, SimulationService, PARAMETERS_INLINE_LIMIT_BYTES};
pub use user::{AuthConfig, UserService};
