//! Repository implementations for database access.
//!
//! Each repository wraps a SQLx connection, provides strongly-typed CRUD
//! operations, and returns models from [`crate::db::models`]. All repositories
//! implement the common [`Repository`] trait plus entity-specific lookups
//! (by-email, by-identification-number, active-enrollment, ...).
//!
//! Usage pattern:
//!
//! ```ignore
//! use carelink::db::handlers::{Clients, Repository};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut conn = pool.acquire().await?;
//!     let mut repo = Clients::new(&mut conn);
//!     let client = repo.get_by_id(id).await?;
//!     Ok(())
//! }
//! ```

pub mod clients;
pub mod enrollments;
pub mod programs;
pub mod repository;
pub mod tokens;
pub mod users;

pub use clients::Clients;
pub use enrollments::Enrollments;
pub use programs::Programs;
pub use repository::Repository;
pub use tokens::Tokens;
pub use users::Users;
