//! HTTP request handlers for all API endpoints.
//!
//! Each handler is responsible for:
//! - Request validation and deserialization
//! - Authentication checks (via the [`CurrentUser`] extractor)
//! - Business logic execution via database repositories
//! - Response serialization
//!
//! # Handler Modules
//!
//! - [`auth`]: Signup, signin, token refresh/rotation, logout, and password management
//! - [`clients`]: Client CRUD, search, and identification-number lookup
//! - [`enrollments`]: Enrollment CRUD with the one-active-per-program rule
//! - [`programs`]: Program CRUD
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which automatically converts to
//! appropriate HTTP status codes and JSON error responses.
//!
//! [`CurrentUser`]: crate::api::models::users::CurrentUser

pub mod auth;
pub mod clients;
pub mod enrollments;
pub mod programs;
