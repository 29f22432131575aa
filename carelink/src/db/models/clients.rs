//! Database models for clients.

use crate::api::models::clients::{ClientCreate, ClientUpdate, Gender};
use crate::types::ClientId;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

/// Database request for creating a new client
#[derive(Debug, Clone)]
pub struct ClientCreateDBRequest {
    pub first_name: String,
    pub last_name: String,
    pub identification_number: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub address: Option<String>,
}

impl From<ClientCreate> for ClientCreateDBRequest {
    fn from(api: ClientCreate) -> Self {
        Self {
            first_name: api.first_name,
            last_name: api.last_name,
            identification_number: api.identification_number,
            email: api.email,
            phone: api.phone,
            date_of_birth: api.date_of_birth,
            gender: api.gender,
            address: api.address,
        }
    }
}

/// Database request for updating a client (partial)
#[derive(Debug, Clone, Default)]
pub struct ClientUpdateDBRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub identification_number: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub address: Option<String>,
}

impl From<ClientUpdate> for ClientUpdateDBRequest {
    fn from(api: ClientUpdate) -> Self {
        Self {
            first_name: api.first_name,
            last_name: api.last_name,
            identification_number: api.identification_number,
            email: api.email,
            phone: api.phone,
            date_of_birth: api.date_of_birth,
            gender: api.gender,
            address: api.address,
        }
    }
}

/// Database response for a client
#[derive(Debug, Clone, FromRow)]
pub struct ClientDBResponse {
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
}
