//! Database repository for programs.

use std::collections::HashMap;

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::programs::{ProgramCreateDBRequest, ProgramDBResponse, ProgramUpdateDBRequest},
    },
    types::{ProgramId, abbrev_uuid},
};

/// Filter for listing programs
#[derive(Debug, Clone)]
pub struct ProgramFilter {
    pub skip: i64,
    pub limit: i64,
    pub search: Option<String>,
    pub active: Option<bool>,
}

impl ProgramFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            search: None,
            active: None,
        }
    }
}

pub struct Programs<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Programs<'c> {
    type CreateRequest = ProgramCreateDBRequest;
    type UpdateRequest = ProgramUpdateDBRequest;
    type Response = ProgramDBResponse;
    type Id = ProgramId;
    type Filter = ProgramFilter;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let program_id = Uuid::new_v4();

        let program = sqlx::query_as::<_, ProgramDBResponse>(
            r#"
            INSERT INTO programs (id, name, description)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(program_id)
        .bind(&request.name)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(program)
    }

    #[instrument(skip(self), fields(program_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let program = sqlx::query_as::<_, ProgramDBResponse>("SELECT * FROM programs WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(program)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<ProgramId>) -> Result<HashMap<Self::Id, ProgramDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let programs = sqlx::query_as::<_, ProgramDBResponse>("SELECT * FROM programs WHERE id = ANY($1)")
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(programs.into_iter().map(|p| (p.id, p)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        // Conditions are assembled dynamically; bind positions follow the
        // order the conditions are pushed.
        let mut sql = String::from("SELECT * FROM programs WHERE 1=1");
        let mut bind_idx = 0;

        if filter.search.is_some() {
            bind_idx += 1;
            sql.push_str(&format!(" AND name ILIKE ${bind_idx}"));
        }
        if filter.active.is_some() {
            bind_idx += 1;
            sql.push_str(&format!(" AND active = ${bind_idx}"));
        }
        sql.push_str(&format!(" ORDER BY name ASC LIMIT ${} OFFSET ${}", bind_idx + 1, bind_idx + 2));

        let mut query = sqlx::query_as::<_, ProgramDBResponse>(&sql);
        if let Some(search) = &filter.search {
            query = query.bind(format!("%{search}%"));
        }
        if let Some(active) = filter.active {
            query = query.bind(active);
        }
        let programs = query.bind(filter.limit).bind(filter.skip).fetch_all(&mut *self.db).await?;

        Ok(programs)
    }

    #[instrument(skip(self), fields(program_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM programs WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(program_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let program = sqlx::query_as::<_, ProgramDBResponse>(
            r#"
            UPDATE programs SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                active = COALESCE($4, active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(request.active)
        .fetch_optional(&mut *self.db)
        .await?
        .ok_or(DbError::NotFound)?;

        Ok(program)
    }
}

impl<'c> Programs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Total rows matching the filter, for pagination metadata
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &ProgramFilter) -> Result<i64> {
        let mut sql = String::from("SELECT COUNT(*) FROM programs WHERE 1=1");
        let mut bind_idx = 0;

        if filter.search.is_some() {
            bind_idx += 1;
            sql.push_str(&format!(" AND name ILIKE ${bind_idx}"));
        }
        if filter.active.is_some() {
            bind_idx += 1;
            sql.push_str(&format!(" AND active = ${bind_idx}"));
        }

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        if let Some(search) = &filter.search {
            query = query.bind(format!("%{search}%"));
        }
        if let Some(active) = filter.active {
            query = query.bind(active);
        }

        Ok(query.fetch_one(&mut *self.db).await?)
    }

    /// Case-insensitive lookup by program name
    #[instrument(skip(self, name), err)]
    pub async fn get_by_name(&mut self, name: &str) -> Result<Option<ProgramDBResponse>> {
        let program = sqlx::query_as::<_, ProgramDBResponse>("SELECT * FROM programs WHERE LOWER(name) = LOWER($1)")
            .bind(name)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(program)
    }
}
