//! API request/response models for enrollments.

use super::pagination::Pagination;
use crate::db::models::enrollments::EnrollmentDBResponse;
use crate::types::{ClientId, EnrollmentId, ProgramId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Enrollment lifecycle: active -> completed | withdrawn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "enrollment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Withdrawn,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentCreate {
    #[schema(value_type = String, format = "uuid")]
    pub client_id: ClientId,
    #[schema(value_type = String, format = "uuid")]
    pub program_id: ProgramId,
    /// Defaults to today when omitted
    pub enrollment_date: Option<NaiveDate>,
    /// Defaults to `active` when omitted
    pub status: Option<EnrollmentStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentUpdate {
    pub enrollment_date: Option<NaiveDate>,
    pub exit_date: Option<NaiveDate>,
    pub status: Option<EnrollmentStatus>,
    pub notes: Option<String>,
}

/// Compact client representation embedded in enrollment responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClientSummary {
    #[schema(value_type = String, format = "uuid")]
    pub id: ClientId,
    pub first_name: String,
    pub last_name: String,
    pub identification_number: String,
}

/// Compact program representation embedded in enrollment responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProgramSummary {
    #[schema(value_type = String, format = "uuid")]
    pub id: ProgramId,
    pub name: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: EnrollmentId,
    #[schema(value_type = String, format = "uuid")]
    pub client_id: ClientId,
    #[schema(value_type = String, format = "uuid")]
    pub program_id: ProgramId,
    pub enrollment_date: NaiveDate,
    pub exit_date: Option<NaiveDate>,
    pub status: EnrollmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub client: ClientSummary,
    pub program: ProgramSummary,
}

impl From<EnrollmentDBResponse> for EnrollmentResponse {
    fn from(db: EnrollmentDBResponse) -> Self {
        Self {
            id: db.id,
            client_id: db.client_id,
            program_id: db.program_id,
            enrollment_date: db.enrollment_date,
            exit_date: db.exit_date,
            status: db.status,
            notes: db.notes,
            created_at: db.created_at,
            updated_at: db.updated_at,
            client: ClientSummary {
                id: db.client_id,
                first_name: db.client_first_name,
                last_name: db.client_last_name,
                identification_number: db.client_identification_number,
            },
            program: ProgramSummary {
                id: db.program_id,
                name: db.program_name,
                active: db.program_active,
            },
        }
    }
}

/// Compact enrollment representation embedded in client responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentSummary {
    #[schema(value_type = String, format = "uuid")]
    pub id: EnrollmentId,
    #[schema(value_type = String, format = "uuid")]
    pub program_id: ProgramId,
    pub program_name: String,
    pub status: EnrollmentStatus,
    pub enrollment_date: NaiveDate,
    pub exit_date: Option<NaiveDate>,
}

impl From<EnrollmentDBResponse> for EnrollmentSummary {
    fn from(db: EnrollmentDBResponse) -> Self {
        Self {
            id: db.id,
            program_id: db.program_id,
            program_name: db.program_name,
            status: db.status,
            enrollment_date: db.enrollment_date,
            exit_date: db.exit_date,
        }
    }
}

/// Query parameters for listing enrollments
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListEnrollmentsQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Only return enrollments with this status
    pub status: Option<EnrollmentStatus>,
}
