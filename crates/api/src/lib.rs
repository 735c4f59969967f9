//! HTTP surface: versioned JSON API for jobs, reports and accounts, plus
//! the presigned-download redemption route.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;

pub use auth::CurrentUser;
pub use error::ApiError;
pub use routes::{create_routes, AppState};
