pub mod postgres;
pub mod redis;
mod store;

pub use postgres::{create_pool, PgCourseStore};
pub use redis::create_redis_client;
pub use redis::Cache;
pub use redis::CacheKey;
pub use redis::CacheWriterHandle;
pub use store::CourseStore;

#[cfg(test)]
pub use store::MockCourseStore;
