pub mod manager;
pub mod sql;

pub use manager::{DatabaseError, DatabaseManager};
