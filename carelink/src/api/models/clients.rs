//! API request/response models for clients.

use super::enrollments::EnrollmentSummary;
use super::pagination::Pagination;
use crate::db::models::clients::ClientDBResponse;
use crate::errors::Error;
use crate::types::ClientId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "gender", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

// Client request models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClientCreate {
    pub first_name: String,
    pub last_name: String,
    pub identification_number: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub address: Option<String>,
}

impl ClientCreate {
    /// Field-level validation, collected into a per-field error map.
    pub fn validate(&self) -> Result<(), Error> {
        let mut field_errors = HashMap::new();

        if self.first_name.trim().len() < 3 {
            field_errors.insert("first_name".to_string(), "First name should be at least 3 characters".to_string());
        }
        if self.last_name.trim().len() < 3 {
            field_errors.insert("last_name".to_string(), "Last name should be at least 3 characters".to_string());
        }
        if self.identification_number.trim().is_empty() {
            field_errors.insert(
                "identification_number".to_string(),
                "Identification number is required".to_string(),
            );
        }
        if let Some(email) = &self.email
            && !is_valid_email(email)
        {
            field_errors.insert("email".to_string(), "Email must be valid".to_string());
        }
        if let Some(phone) = &self.phone
            && !is_valid_phone(phone)
        {
            field_errors.insert("phone".to_string(), "Phone number must be valid".to_string());
        }
        if self.email.is_none() && self.phone.is_none() {
            field_errors.insert(
                "contact".to_string(),
                "Either email or phone must be provided, or both, but you cannot have both missing".to_string(),
            );
        }

        if field_errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation {
                message: "Invalid client data".to_string(),
                field_errors,
            })
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ClientUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub identification_number: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub address: Option<String>,
}

impl ClientUpdate {
    pub fn validate(&self) -> Result<(), Error> {
        let mut field_errors = HashMap::new();

        if let Some(first_name) = &self.first_name
            && first_name.trim().len() < 3
        {
            field_errors.insert("first_name".to_string(), "First name should be at least 3 characters".to_string());
        }
        if let Some(last_name) = &self.last_name
            && last_name.trim().len() < 3
        {
            field_errors.insert("last_name".to_string(), "Last name should be at least 3 characters".to_string());
        }
        if let Some(id_number) = &self.identification_number
            && id_number.trim().is_empty()
        {
            field_errors.insert(
                "identification_number".to_string(),
                "Identification number must not be empty".to_string(),
            );
        }
        if let Some(email) = &self.email
            && !is_valid_email(email)
        {
            field_errors.insert("email".to_string(), "Email must be valid".to_string());
        }
        if let Some(phone) = &self.phone
            && !is_valid_phone(phone)
        {
            field_errors.insert("phone".to_string(), "Phone number must be valid".to_string());
        }

        if field_errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation {
                message: "Invalid client data".to_string(),
                field_errors,
            })
        }
    }
}

// Client response models
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClientResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: ClientId,
    pub first_name: String,
    pub last_name: String,
    pub identification_number: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Enrollments for this client (only included if requested)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(no_recursion)]
    pub enrollments: Option<Vec<EnrollmentSummary>>,
}

impl From<ClientDBResponse> for ClientResponse {
    fn from(db: ClientDBResponse) -> Self {
        Self {
            id: db.id,
            first_name: db.first_name,
            last_name: db.last_name,
            identification_number: db.identification_number,
            email: db.email,
            phone: db.phone,
            date_of_birth: db.date_of_birth,
            gender: db.gender,
            address: db.address,
            created_at: db.created_at,
            updated_at: db.updated_at,
            enrollments: None, // By default, relationships are not included
        }
    }
}

impl ClientResponse {
    /// Create a response with enrollments included
    pub fn with_enrollments(mut self, enrollments: Vec<EnrollmentSummary>) -> Self {
        self.enrollments = Some(enrollments);
        self
    }
}

/// Query parameters for listing clients
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct ListClientsQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// Include related data (comma-separated: "enrollments")
    pub include: Option<String>,

    /// Filter clients by first name, last name, identification number, email
    /// or phone (case-insensitive substring match)
    pub search: Option<String>,
}

/// Query parameters for the client search endpoint
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct SearchClientsQuery {
    /// Pagination parameters
    #[serde(flatten)]
    #[param(inline)]
    pub pagination: Pagination,

    /// The search query
    pub q: Option<String>,
}

fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    digits >= 7 && phone.chars().all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
}
