//! # Database Plumbing
//!
//! Connection pooling and schema migrations for the PostgreSQL backend. The
//! queries themselves live with the repository that owns them.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use screening_core::config::DatabaseConfig;
//! use screening_core::database::{create_pool, DatabaseMigrations};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DatabaseConfig {
//!     url: "postgresql://localhost/screening_development".to_string(),
//!     ..DatabaseConfig::default()
//! };
//! let pool = create_pool(&config).await?;
//! DatabaseMigrations::run_all(&pool).await?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod migrations;

pub use connection::create_pool;
pub use migrations::DatabaseMigrations;
