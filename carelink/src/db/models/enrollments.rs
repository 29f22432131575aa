//! Database models for enrollments.

use crate::api::models::enrollments::EnrollmentStatus;
use crate::types::{ClientId, EnrollmentId, ProgramId};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

/// Database request for creating a new enrollment
#[derive(Debug, Clone)]
pub struct EnrollmentCreateDBRequest {
    pub client_id: ClientId,
    pub program_id: ProgramId,
    pub enrollment_date: NaiveDate,
    pub status: EnrollmentStatus,
    pub notes: Option<String>,
}

/// Database request for updating an enrollment.
///
/// `exit_date` is doubly optional: `None` keeps the stored value,
/// `Some(None)` clears it, `Some(Some(date))` sets it.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentUpdateDBRequest {
    pub enrollment_date: Option<NaiveDate>,
    pub exit_date: Option<Option<NaiveDate>>,
    pub status: Option<EnrollmentStatus>,
    pub notes: Option<String>,
}

/// Database response for an enrollment, hydrated with the client and program
/// columns the dashboard renders alongside it.
#[derive(Debug, Clone, FromRow)]
pub struct EnrollmentDBResponse {
    pub id: EnrollmentId,
    pub client_id: ClientId,
    pub program_id: ProgramId,
    pub enrollment_date: NaiveDate,
    pub exit_date: Option<NaiveDate>,
    pub status: EnrollmentStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub client_first_name: String,
    pub client_last_name: String,
    pub client_identification_number: String,
    pub program_name: String,
    pub program_active: bool,
}
