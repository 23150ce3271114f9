//! Database layer
//!
//! This module provides database abstraction for the media tag service.
//! It supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (the platform's production database)
//!
//! The database driver is selected based on configuration.
//!
//! # Usage
//!
//! ```ignore
//! use media_tags::config::DatabaseConfig;
//! use media_tags::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
