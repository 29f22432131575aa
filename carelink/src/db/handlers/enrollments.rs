//! Database repository for enrollments.
//!
//! Every read returns rows hydrated with the client and program columns the
//! API embeds in its responses, so callers never need a second query.

use std::collections::HashMap;

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    api::models::enrollments::EnrollmentStatus,
    db::{
        errors::{DbError, Result},
        handlers::repository::Repository,
        models::enrollments::{EnrollmentCreateDBRequest, EnrollmentDBResponse, EnrollmentUpdateDBRequest},
    },
    types::{ClientId, EnrollmentId, ProgramId, abbrev_uuid},
};

const ENROLLMENT_SELECT: &str = "SELECT e.id, e.client_id, e.program_id, e.enrollment_date, e.exit_date, e.status, e.notes, \
            e.created_at, e.updated_at, \
            c.first_name AS client_first_name, c.last_name AS client_last_name, \
            c.identification_number AS client_identification_number, \
            p.name AS program_name, p.active AS program_active \
     FROM enrollments e \
     JOIN clients c ON c.id = e.client_id \
     JOIN programs p ON p.id = e.program_id";

/// Filter for listing enrollments
#[derive(Debug, Clone)]
pub struct EnrollmentFilter {
    pub skip: i64,
    pub limit: i64,
    pub status: Option<EnrollmentStatus>,
}

impl EnrollmentFilter {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self {
            skip,
            limit,
            status: None,
        }
    }
}

pub struct Enrollments<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Enrollments<'c> {
    type CreateRequest = EnrollmentCreateDBRequest;
    type UpdateRequest = EnrollmentUpdateDBRequest;
    type Response = EnrollmentDBResponse;
    type Id = EnrollmentId;
    type Filter = EnrollmentFilter;

    #[instrument(skip(self, request), fields(client_id = %abbrev_uuid(&request.client_id), program_id = %abbrev_uuid(&request.program_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let enrollment_id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO enrollments (id, client_id, program_id, enrollment_date, status, notes)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(enrollment_id)
        .bind(request.client_id)
        .bind(request.program_id)
        .bind(request.enrollment_date)
        .bind(request.status)
        .bind(&request.notes)
        .execute(&mut *self.db)
        .await?;

        // Re-read through the join so the response carries client/program columns
        self.get_by_id(enrollment_id).await?.ok_or(DbError::NotFound)
    }

    #[instrument(skip(self), fields(enrollment_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let sql = format!("{ENROLLMENT_SELECT} WHERE e.id = $1");
        let enrollment = sqlx::query_as::<_, EnrollmentDBResponse>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(enrollment)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<EnrollmentId>) -> Result<HashMap<Self::Id, EnrollmentDBResponse>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let sql = format!("{ENROLLMENT_SELECT} WHERE e.id = ANY($1)");
        let enrollments = sqlx::query_as::<_, EnrollmentDBResponse>(&sql)
            .bind(&ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(enrollments.into_iter().map(|e| (e.id, e)).collect())
    }

    #[instrument(skip(self, filter), fields(limit = filter.limit, skip = filter.skip), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let enrollments = match filter.status {
            Some(status) => {
                let sql = format!("{ENROLLMENT_SELECT} WHERE e.status = $1 ORDER BY e.created_at DESC LIMIT $2 OFFSET $3");
                sqlx::query_as::<_, EnrollmentDBResponse>(&sql)
                    .bind(status)
                    .bind(filter.limit)
                    .bind(filter.skip)
                    .fetch_all(&mut *self.db)
                    .await?
            }
            None => {
                let sql = format!("{ENROLLMENT_SELECT} ORDER BY e.created_at DESC LIMIT $1 OFFSET $2");
                sqlx::query_as::<_, EnrollmentDBResponse>(&sql)
                    .bind(filter.limit)
                    .bind(filter.skip)
                    .fetch_all(&mut *self.db)
                    .await?
            }
        };

        Ok(enrollments)
    }

    #[instrument(skip(self), fields(enrollment_id = %abbrev_uuid(&id)), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM enrollments WHERE id = $1")
            .bind(id)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, request), fields(enrollment_id = %abbrev_uuid(&id)), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        // exit_date uses a flag + value pair so the caller can clear it,
        // which COALESCE cannot express
        let (set_exit_date, exit_date) = match request.exit_date {
            Some(value) => (true, value),
            None => (false, None),
        };

        let result = sqlx::query(
            r#"
            UPDATE enrollments SET
                enrollment_date = COALESCE($2, enrollment_date),
                status = COALESCE($3, status),
                notes = COALESCE($4, notes),
                exit_date = CASE WHEN $5 THEN $6 ELSE exit_date END,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(request.enrollment_date)
        .bind(request.status)
        .bind(&request.notes)
        .bind(set_exit_date)
        .bind(exit_date)
        .execute(&mut *self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound);
        }

        self.get_by_id(id).await?.ok_or(DbError::NotFound)
    }
}

impl<'c> Enrollments<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Total rows matching the filter, for pagination metadata
    #[instrument(skip(self, filter), err)]
    pub async fn count(&mut self, filter: &EnrollmentFilter) -> Result<i64> {
        let count = match filter.status {
            Some(status) => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM enrollments WHERE status = $1")
                    .bind(status)
                    .fetch_one(&mut *self.db)
                    .await?
            }
            None => {
                sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM enrollments")
                    .fetch_one(&mut *self.db)
                    .await?
            }
        };

        Ok(count)
    }

    /// All enrollments for a client, newest first
    #[instrument(skip(self), fields(client_id = %abbrev_uuid(&client_id)), err)]
    pub async fn list_by_client(&mut self, client_id: ClientId) -> Result<Vec<EnrollmentDBResponse>> {
        let sql = format!("{ENROLLMENT_SELECT} WHERE e.client_id = $1 ORDER BY e.created_at DESC");
        let enrollments = sqlx::query_as::<_, EnrollmentDBResponse>(&sql)
            .bind(client_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(enrollments)
    }

    /// All enrollments for a program, newest first
    #[instrument(skip(self), fields(program_id = %abbrev_uuid(&program_id)), err)]
    pub async fn list_by_program(&mut self, program_id: ProgramId) -> Result<Vec<EnrollmentDBResponse>> {
        let sql = format!("{ENROLLMENT_SELECT} WHERE e.program_id = $1 ORDER BY e.created_at DESC");
        let enrollments = sqlx::query_as::<_, EnrollmentDBResponse>(&sql)
            .bind(program_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(enrollments)
    }

    /// The client's current ACTIVE enrollment in a program, if any.
    /// Completed or withdrawn history does not count.
    #[instrument(skip(self), fields(client_id = %abbrev_uuid(&client_id), program_id = %abbrev_uuid(&program_id)), err)]
    pub async fn find_active(&mut self, client_id: ClientId, program_id: ProgramId) -> Result<Option<EnrollmentDBResponse>> {
        let sql = format!("{ENROLLMENT_SELECT} WHERE e.client_id = $1 AND e.program_id = $2 AND e.status = $3");
        let enrollment = sqlx::query_as::<_, EnrollmentDBResponse>(&sql)
            .bind(client_id)
            .bind(program_id)
            .bind(EnrollmentStatus::Active)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(enrollment)
    }
}

#[cfg(test)]
mod tests {
    use super::super::repository::Repository;
    use super::*;
    use crate::api::models::clients::Gender;
    use crate::db::{
        handlers::{clients::Clients, programs::Programs},
        models::{clients::ClientCreateDBRequest, programs::ProgramCreateDBRequest},
    };
    use chrono::NaiveDate;
    use sqlx::PgPool;

    async fn seed(pool: &PgPool) -> (ClientId, ProgramId) {
        let mut conn = pool.acquire().await.unwrap();

        let mut clients = Clients::new(&mut conn);
        let client = clients
            .create(&ClientCreateDBRequest {
                first_name: "Naomi".to_string(),
                last_name: "Barasa".to_string(),
                identification_number: format!("ID-{}", Uuid::new_v4().simple()),
                email: Some(format!("{}@example.com", Uuid::new_v4().simple())),
                phone: None,
                date_of_birth: NaiveDate::from_ymd_opt(1992, 2, 2).unwrap(),
                gender: Gender::Female,
                address: None,
            })
            .await
            .unwrap();

        let mut programs = Programs::new(&mut conn);
        let program = programs
            .create(&ProgramCreateDBRequest {
                name: format!("Program {}", Uuid::new_v4().simple()),
                description: None,
            })
            .await
            .unwrap();

        (client.id, program.id)
    }

    fn create_request(client_id: ClientId, program_id: ProgramId) -> EnrollmentCreateDBRequest {
        EnrollmentCreateDBRequest {
            client_id,
            program_id,
            enrollment_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            status: EnrollmentStatus::Active,
            notes: None,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_create_hydrates_relations(pool: PgPool) {
        let (client_id, program_id) = seed(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Enrollments::new(&mut conn);

        let enrollment = repo.create(&create_request(client_id, program_id)).await.unwrap();

        assert_eq!(enrollment.client_id, client_id);
        assert_eq!(enrollment.program_id, program_id);
        assert_eq!(enrollment.client_first_name, "Naomi");
        assert!(enrollment.program_active);
        assert_eq!(enrollment.status, EnrollmentStatus::Active);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_active_duplicate_blocked_by_index(pool: PgPool) {
        let (client_id, program_id) = seed(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Enrollments::new(&mut conn);

        repo.create(&create_request(client_id, program_id)).await.unwrap();
        let result = repo.create(&create_request(client_id, program_id)).await;

        match result.unwrap_err() {
            DbError::UniqueViolation { table, .. } => {
                assert_eq!(table.as_deref(), Some("enrollments"));
            }
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_completed_history_allows_reenrollment(pool: PgPool) {
        let (client_id, program_id) = seed(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Enrollments::new(&mut conn);

        let first = repo.create(&create_request(client_id, program_id)).await.unwrap();

        // Complete the first enrollment
        repo.update(
            first.id,
            &EnrollmentUpdateDBRequest {
                status: Some(EnrollmentStatus::Completed),
                exit_date: Some(Some(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert!(repo.find_active(client_id, program_id).await.unwrap().is_none());

        // A new active enrollment is now allowed
        let second = repo.create(&create_request(client_id, program_id)).await.unwrap();
        assert_ne!(second.id, first.id);

        let active = repo.find_active(client_id, program_id).await.unwrap().unwrap();
        assert_eq!(active.id, second.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_clears_exit_date(pool: PgPool) {
        let (client_id, program_id) = seed(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Enrollments::new(&mut conn);

        let enrollment = repo.create(&create_request(client_id, program_id)).await.unwrap();

        let withdrawn = repo
            .update(
                enrollment.id,
                &EnrollmentUpdateDBRequest {
                    status: Some(EnrollmentStatus::Withdrawn),
                    exit_date: Some(Some(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(withdrawn.exit_date.is_some());

        // Re-activation clears the exit date
        let reactivated = repo
            .update(
                enrollment.id,
                &EnrollmentUpdateDBRequest {
                    status: Some(EnrollmentStatus::Active),
                    exit_date: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(reactivated.status, EnrollmentStatus::Active);
        assert!(reactivated.exit_date.is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_by_client_and_program(pool: PgPool) {
        let (client_id, program_id) = seed(&pool).await;
        let (other_client, other_program) = seed(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Enrollments::new(&mut conn);

        repo.create(&create_request(client_id, program_id)).await.unwrap();
        repo.create(&create_request(client_id, other_program)).await.unwrap();
        repo.create(&create_request(other_client, program_id)).await.unwrap();

        assert_eq!(repo.list_by_client(client_id).await.unwrap().len(), 2);
        assert_eq!(repo.list_by_program(program_id).await.unwrap().len(), 2);
        assert_eq!(repo.list_by_client(other_client).await.unwrap().len(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_list_with_status_filter(pool: PgPool) {
        let (client_id, program_id) = seed(&pool).await;
        let (_, other_program) = seed(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Enrollments::new(&mut conn);

        repo.create(&create_request(client_id, program_id)).await.unwrap();
        let second = repo.create(&create_request(client_id, other_program)).await.unwrap();
        repo.update(
            second.id,
            &EnrollmentUpdateDBRequest {
                status: Some(EnrollmentStatus::Withdrawn),
                exit_date: Some(Some(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let mut filter = EnrollmentFilter::new(0, 10);
        filter.status = Some(EnrollmentStatus::Active);
        assert_eq!(repo.list(&filter).await.unwrap().len(), 1);
        assert_eq!(repo.count(&filter).await.unwrap(), 1);

        filter.status = Some(EnrollmentStatus::Withdrawn);
        let withdrawn = repo.list(&filter).await.unwrap();
        assert_eq!(withdrawn.len(), 1);
        assert_eq!(withdrawn[0].id, second.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_deleting_client_cascades(pool: PgPool) {
        let (client_id, program_id) = seed(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = Enrollments::new(&mut conn);

        let enrollment = repo.create(&create_request(client_id, program_id)).await.unwrap();

        let mut clients = Clients::new(&mut conn);
        assert!(clients.delete(client_id).await.unwrap());

        let mut repo = Enrollments::new(&mut conn);
        assert!(repo.get_by_id(enrollment.id).await.unwrap().is_none());
    }
}
