//! Shared test utilities backed by testcontainers
//!
//! - `TestDatabase`: PostgreSQL container with the notifications schema migrated (feature: "postgres")
//! - `TestNats`: NATS container with JetStream enabled (feature: "nats")
//!
//! Both containers are removed when the wrapper is dropped. Tests using them need
//! a running Docker daemon and are marked `#[ignore]` so they only run on request:
//!
//! ```bash
//! cargo test -p domain_notifications -- --ignored
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use test_utils::TestDatabase;
//!
//! #[tokio::test]
//! #[ignore = "requires Docker"]
//! async fn my_postgres_test() {
//!     let db = TestDatabase::new().await;
//!     let connection = db.connection();
//! }
//! ```
//!
//! For NATS add `features = ["nats"]` to your dev-dependencies:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { workspace = true, features = ["nats"] }
//! ```

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "nats")]
mod nats;

#[cfg(feature = "postgres")]
pub use postgres::TestDatabase;

#[cfg(feature = "nats")]
pub use nats::TestNats;
