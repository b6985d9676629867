pub mod operations;
pub mod pool;

pub use operations::DatabaseOperations;
pub use pool::{create_pool, health_check};
