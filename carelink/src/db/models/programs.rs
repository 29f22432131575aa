//! Database models for programs.

use crate::api::models::programs::{ProgramCreate, ProgramUpdate};
use crate::types::ProgramId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new program
#[derive(Debug, Clone)]
pub struct ProgramCreateDBRequest {
    pub name: String,
    pub description: Option<String>,
}

impl From<ProgramCreate> for ProgramCreateDBRequest {
    fn from(api: ProgramCreate) -> Self {
        Self {
            name: api.name,
            description: api.description,
        }
    }
}

/// Database request for updating a program (partial)
#[derive(Debug, Clone, Default)]
pub struct ProgramUpdateDBRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

impl From<ProgramUpdate> for ProgramUpdateDBRequest {
    fn from(api: ProgramUpdate) -> Self {
        Self {
            name: api.name,
            description: api.description,
            active: api.active,
        }
    }
}

/// Database response for a program
#[derive(Debug, Clone, FromRow)]
pub struct ProgramDBResponse {
    pub id: ProgramId,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
