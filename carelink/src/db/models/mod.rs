//! Database-facing models: create/update requests and row entities per table.

pub mod clients;
pub mod enrollments;
pub mod programs;
pub mod tokens;
pub mod users;
