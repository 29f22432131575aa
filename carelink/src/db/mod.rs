//! Database layer: repositories, models, and error categorization.

pub mod errors;
pub mod handlers;
pub mod models;
