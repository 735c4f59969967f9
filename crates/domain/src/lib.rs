pub mod entities;
pub mod errors;
pub mod handlers;
pub mod messaging;
pub mod repositories;

pub use entities::*;
pub use errors::{ServiceError, ServiceResult};
pub use handlers::*;
pub use messaging::*;
pub use repositories::*;
