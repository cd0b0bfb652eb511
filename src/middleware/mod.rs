pub mod auth;
pub mod response;
pub mod roles;

pub use auth::AuthUser;
pub use response::{ApiResponse, ApiResult};
