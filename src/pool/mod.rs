pub mod config;
pub mod manager;

pub use manager::{ConnectionProvider, DbPool, PooledConnection};
