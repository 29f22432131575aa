//! API request/response models for health programs.

use super::pagination::Pagination;
use crate::db::models::programs::ProgramDBResponse;
use crate::errors::Error;
use crate::types::ProgramId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProgramCreate {
    pub name: String,
    pub description: Option<String>,
}

impl ProgramCreate {
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            let mut field_errors = HashMap::new();
            field_errors.insert("name".to_string(), "Program name is required".to_string());
            return Err(Error::Validation {
                message: "Invalid program data".to_string(),
                field_errors,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ProgramUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

impl ProgramUpdate {
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            let mut field_errors = HashMap::new();
            field_errors.insert("name".to_string(), "Program name must not be empty".to_string());
            return Err(Error::Validation {
                message: "Invalid program data".to_string(),
                field_errors,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProgramResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ProgramId,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProgramDBResponse> for ProgramResponse {
    fn from(db: ProgramDBResponse) -> Self {
        Self {
            id: db.id,
            name: db.name,
            description: db.description,
            active: db.active,
            created_at: db.created_at,
            updated_at: db.updated_at,
        }
    }
}

/// Query parameters for listing programs
#[serde_as]
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListProgramsQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Filter programs by name (case-insensitive substring match)
    pub search: Option<String>,

    /// Only return programs with this active flag
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub active: Option<bool>,
}
