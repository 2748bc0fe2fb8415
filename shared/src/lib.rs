pub mod config;
pub mod database;
pub mod entity;
pub mod logging;
pub mod models;
pub mod redis;

pub use config::{Config, ExecutionConfig};
pub use database::get_db_connection;
pub use logging::init_tracing;
pub use models::*;
pub use redis::{get_redis_client, Redis, RunLock};
