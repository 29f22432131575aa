//! API request/response models (DTOs) grouped by resource.

pub mod auth;
pub mod clients;
pub mod enrollments;
pub mod pagination;
pub mod programs;
pub mod users;
