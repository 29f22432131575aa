use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        pagination::PaginatedResponse,
        programs::{ListProgramsQuery, ProgramCreate, ProgramResponse, ProgramUpdate},
        users::CurrentUser,
    },
    db::{
        handlers::{Programs, Repository, programs::ProgramFilter},
        models::programs::{ProgramCreateDBRequest, ProgramUpdateDBRequest},
    },
    errors::Error,
    types::ProgramId,
};

/// Create a new health program
#[utoipa::path(
    post,
    path = "/api/v1/program",
    request_body = ProgramCreate,
    tag = "programs",
    responses(
        (status = 201, description = "Program created", body = ProgramResponse),
        (status = 409, description = "Program name already in use"),
        (status = 422, description = "Field validation failed"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_program(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(request): Json<ProgramCreate>,
) -> Result<(StatusCode, Json<ProgramResponse>), Error> {
    request.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Programs::new(&mut conn);

    if repo.get_by_name(&request.name).await?.is_some() {
        return Err(Error::Conflict {
            message: "A program with this name already exists".to_string(),
        });
    }

    let created = repo.create(&ProgramCreateDBRequest::from(request)).await?;

    Ok((StatusCode::CREATED, Json(ProgramResponse::from(created))))
}

/// List programs with pagination, optional name search, and active filter
#[utoipa::path(
    get,
    path = "/api/v1/program",
    params(ListProgramsQuery),
    tag = "programs",
    responses(
        (status = 200, description = "Paginated programs", body = PaginatedResponse<ProgramResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_programs(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListProgramsQuery>,
) -> Result<Json<PaginatedResponse<ProgramResponse>>, Error> {
    let page = query.pagination.page();
    let page_size = query.pagination.page_size();

    let mut filter = ProgramFilter::new(query.pagination.offset(), page_size);
    filter.search = query.search.filter(|s| !s.trim().is_empty());
    filter.active = query.active;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Programs::new(&mut conn);

    let programs = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let responses: Vec<ProgramResponse> = programs.into_iter().map(ProgramResponse::from).collect();

    Ok(Json(PaginatedResponse::new(responses, total_count, page, page_size)))
}

/// Fetch a program by ID
#[utoipa::path(
    get,
    path = "/api/v1/program/{id}",
    tag = "programs",
    responses(
        (status = 200, description = "The program", body = ProgramResponse),
        (status = 404, description = "Program not found"),
    )
)]
#[tracing::instrument(skip_all, fields(program_id = %id))]
pub async fn get_program(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<ProgramId>,
) -> Result<Json<ProgramResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Programs::new(&mut conn);

    let program = repo.get_by_id(id).await?.ok_or_else(|| Error::not_found("Program", id))?;

    Ok(Json(ProgramResponse::from(program)))
}

/// Update a program
#[utoipa::path(
    put,
    path = "/api/v1/program/{id}",
    request_body = ProgramUpdate,
    tag = "programs",
    responses(
        (status = 200, description = "Program updated", body = ProgramResponse),
        (status = 404, description = "Program not found"),
        (status = 409, description = "Program name already in use"),
    )
)]
#[tracing::instrument(skip_all, fields(program_id = %id))]
pub async fn update_program(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<ProgramId>,
    Json(request): Json<ProgramUpdate>,
) -> Result<Json<ProgramResponse>, Error> {
    request.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Programs::new(&mut conn);

    let existing = repo.get_by_id(id).await?.ok_or_else(|| Error::not_found("Program", id))?;

    // Reject renaming onto another program (case-insensitive)
    if let Some(name) = &request.name
        && !name.eq_ignore_ascii_case(&existing.name)
        && repo.get_by_name(name).await?.is_some()
    {
        return Err(Error::Conflict {
            message: "A program with this name already exists".to_string(),
        });
    }

    let updated = repo.update(id, &ProgramUpdateDBRequest::from(request)).await?;

    Ok(Json(ProgramResponse::from(updated)))
}

/// Delete a program and its enrollments
#[utoipa::path(
    delete,
    path = "/api/v1/program/{id}",
    tag = "programs",
    responses(
        (status = 204, description = "Program deleted"),
        (status = 404, description = "Program not found"),
    )
)]
#[tracing::instrument(skip_all, fields(program_id = %id))]
pub async fn delete_program(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<ProgramId>,
) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Programs::new(&mut conn);

    if !repo.delete(id).await? {
        return Err(Error::not_found("Program", id));
    }

    Ok(StatusCode::NO_CONTENT)
}
