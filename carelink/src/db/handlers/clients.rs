//! Database repository for clients.

use std::collections::HashMap;

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::clients::{ClientCreateDBRequest, ClientDBResponse, ClientUpdateDBRequest},
    },
    types::{ClientId, abbrev_uuid},
};

/// Filter for listing/searching clients
#[derive(Debug, Clone)]
pub struct ClientFilter {
    pub skip: i64,
    pub limit: i64,
    /// Case-insensitive substring match across first name, last name,
    /// identification number, email, and phone
    pub search: Option<String>,
}

impl ClientFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            search: None,
        }
    }

    pub fn with_search(mut self, query: impl Into<String>) -> Self {
        self.search = Some(query.into());
        self
    }
}

const SEARCH_CONDITION: &str = "(first_name ILIKE $1 OR last_name ILIKE $1 OR identification_number ILIKE $1 \
     OR email ILIKE $1 OR phone ILIKE $1)";

pub struct Clients<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Clients<'c> {
    type CreateRequest = ClientCreateDBRequest;
    type UpdateRequest = ClientUpdateDBRequest;
    type Response = ClientDBResponse;
    type Id = ClientId;
    type Filter = ClientFilter;

    #[instrument(skip(self, request), fields(identification_number = %request.identification_number), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let client_id = Uuid::new_v4();

        let client = sqlx::query_as::<_, ClientDBResponse>(
            r#"
            INSERT INTO clients
                (id, first_name, last_name, identification_number, email, phone, date_of_birth, gender, address)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(client_id)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.identification_number)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(request.date_of_birth)
        .bind(request.gender)
        .bind(&request.address)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(client)
    }

    #[instrument(skip(self), fields(client_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let client = sqlx::query_as::<_, ClientDBResponse>("SELECT * FROM clients WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(client)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<ClientId>) -> Result<HashMap<Self::Id, ClientDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let clients = sqlx::query_as::<_, ClientDBResponse>("SELECT * FROM clients WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(clients.into_iter().map(|c| (c.id, c)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip, search = filter.search.is_some()), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let clients = match &filter.search {
            Some(query) => {
                let sql = format!(
                    "SELECT * FROM clients WHERE {SEARCH_CONDITION} ORDER BY created_at DESC LIMIT $2 OFFSET $3"
                );
                sqlx::query_as::<_, ClientDBResponse>(&sql)
                    .bind(like_pattern(query))
                    .bind(filter.limit)
                    .bind(filter.skip)
                    .fetch_all(&mut *self.db)
                    .await?
            }
            None => {
                sqlx::query_as::<_, ClientDBResponse>("SELECT * FROM clients ORDER BY created_at DESC LIMIT $1 OFFSET $2")
                    .bind(filter.limit)
                    .bind(filter.skip)
                    .fetch_all(&mut *self.db)
                    .await?
            }
        };

        Ok(clients)
    }

    #[instrument(skip(self), fields(client_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM clients WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(client_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let client = sqlx::query_as::<_, ClientDBResponse>(
            r#"
            UPDATE clients SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                identification_number = COALESCE($4, identification_number),
                email = COALESCE($5, email),
                phone = COALESCE($6, phone),
                date_of_birth = COALESCE($7, date_of_birth),
                gender = COALESCE($8, gender),
                address = COALESCE($9, address),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.first_name)
        .bind(&request.last_name)
        .bind(&request.identification_number)
        .bind(&request.email)
        .bind(&request.phone)
        .bind(request.date_of_birth)
        .bind(request.gender)
        .bind(&request.address)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(client)
    }
}

impl<'c> Clients<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Total rows matching the filter, for pagination metadata
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &ClientFilter) -> Result<i64> {
        let count = match &filter.search {
            Some(query) => {
                let sql = format!("SELECT COUNT(*) FROM clients WHERE {SEARCH_CONDITION}");
                sqlx::query_scalar::<_, i64>(&sql)
                    .bind(like_pattern(query))
                    .fetch_one(&mut *self.db)
                    .await?
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM clients")
                    .fetch_one(&mut *self.db)
                    .await?
            }
        };

        Ok(count)
    }

    /// Look up a client by its unique identification number
    #[instrument(skip(self, id_number), err)]
    pub async fn get_by_identification_number(&mut self, id_number: &str) -> Result<Option<ClientDBResponse>> {
        let client = sqlx::query_as::<_, ClientDBResponse>("SELECT * FROM clients WHERE identification_number = $1")
            .bind(id_number)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(client)
    }
}

/// Escape LIKE wildcards in the user's query, then wrap for substring matching
fn like_pattern(query: &str) -> String {
    let escaped = query.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}
