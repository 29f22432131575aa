use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

use crate::{
    AppState,
    api::models::{
        clients::{ClientCreate, ClientResponse, ClientUpdate, ListClientsQuery, SearchClientsQuery},
        enrollments::EnrollmentSummary,
        pagination::PaginatedResponse,
        users::CurrentUser,
    },
    db::{
        handlers::{Clients, Enrollments, Repository, clients::ClientFilter},
        models::clients::{ClientCreateDBRequest, ClientUpdateDBRequest},
    },
    errors::Error,
    types::ClientId,
};

/// Register a new client
#[utoipa::path(
    post,
    path = "/api/v1/client",
    request_body = ClientCreate,
    tag = "clients",
    responses(
        (status = 201, description = "Client created", body = ClientResponse),
        (status = 409, description = "Identification number already in use"),
        (status = 422, description = "Field validation failed"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_client(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Json(request): Json<ClientCreate>,
) -> Result<(StatusCode, Json<ClientResponse>), Error> {
    request.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Clients::new(&mut conn);

    // Check if identification number already exists
    if repo
        .get_by_identification_number(&request.identification_number)
        .await?
        .is_some()
    {
        return Err(Error::Conflict {
            message: "A client with this identification number already exists".to_string(),
        });
    }

    let created = repo.create(&ClientCreateDBRequest::from(request)).await?;

    Ok((StatusCode::CREATED, Json(ClientResponse::from(created))))
}

/// List clients with pagination and optional search
#[utoipa::path(
    get,
    path = "/api/v1/client",
    params(ListClientsQuery),
    tag = "clients",
    responses(
        (status = 200, description = "Paginated clients", body = PaginatedResponse<ClientResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_clients(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<ListClientsQuery>,
) -> Result<Json<PaginatedResponse<ClientResponse>>, Error> {
    let include_enrollments = query
        .include
        .as_deref()
        .is_some_and(|include| include.split(',').any(|part| part.trim() == "enrollments"));

    let page = query.pagination.page();
    let page_size = query.pagination.page_size();

    let mut filter = ClientFilter::new(query.pagination.offset(), page_size);
    if let Some(search) = normalize_query(query.search.as_deref()) {
        filter = filter.with_search(search);
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Clients::new(&mut conn);

    let clients = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let mut responses = Vec::with_capacity(clients.len());
    if include_enrollments {
        let mut enrollment_repo = Enrollments::new(&mut conn);
        for client in clients {
            let enrollments = enrollment_repo.list_by_client(client.id).await?;
            responses.push(
                ClientResponse::from(client).with_enrollments(enrollments.into_iter().map(EnrollmentSummary::from).collect()),
            );
        }
    } else {
        responses.extend(clients.into_iter().map(ClientResponse::from));
    }

    Ok(Json(PaginatedResponse::new(responses, total_count, page, page_size)))
}

/// Search clients by name, identification number, email, or phone
#[utoipa::path(
    get,
    path = "/api/v1/client/search",
    params(SearchClientsQuery),
    tag = "clients",
    responses(
        (status = 200, description = "Matching clients", body = PaginatedResponse<ClientResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn search_clients(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<SearchClientsQuery>,
) -> Result<Json<PaginatedResponse<ClientResponse>>, Error> {
    let page = query.pagination.page();
    let page_size = query.pagination.page_size();

    // An empty query degrades to a plain listing
    let mut filter = ClientFilter::new(query.pagination.offset(), page_size);
    if let Some(q) = normalize_query(query.q.as_deref()) {
        filter = filter.with_search(q);
    }

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Clients::new(&mut conn);

    let clients = repo.list(&filter).await?;
    let total_count = repo.count(&filter).await?;

    let responses: Vec<ClientResponse> = clients.into_iter().map(ClientResponse::from).collect();

    Ok(Json(PaginatedResponse::new(responses, total_count, page, page_size)))
}

/// Fetch a client by ID, enrollments included
#[utoipa::path(
    get,
    path = "/api/v1/client/{id}",
    tag = "clients",
    responses(
        (status = 200, description = "The client", body = ClientResponse),
        (status = 404, description = "Client not found"),
    )
)]
#[tracing::instrument(skip_all, fields(client_id = %id))]
pub async fn get_client(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<ClientId>,
) -> Result<Json<ClientResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Clients::new(&mut conn);

    let client = repo.get_by_id(id).await?.ok_or_else(|| Error::not_found("Client", id))?;

    let mut enrollment_repo = Enrollments::new(&mut conn);
    let enrollments = enrollment_repo.list_by_client(client.id).await?;

    Ok(Json(
        ClientResponse::from(client).with_enrollments(enrollments.into_iter().map(EnrollmentSummary::from).collect()),
    ))
}

/// Fetch a client by its unique identification number
#[utoipa::path(
    get,
    path = "/api/v1/client/identification/{id_number}",
    tag = "clients",
    responses(
        (status = 200, description = "The client", body = ClientResponse),
        (status = 404, description = "Client not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_client_by_identification(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id_number): Path<String>,
) -> Result<Json<ClientResponse>, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Clients::new(&mut conn);

    let client = repo
        .get_by_identification_number(&id_number)
        .await?
        .ok_or_else(|| Error::not_found("Client", &id_number))?;

    let mut enrollment_repo = Enrollments::new(&mut conn);
    let enrollments = enrollment_repo.list_by_client(client.id).await?;

    Ok(Json(
        ClientResponse::from(client).with_enrollments(enrollments.into_iter().map(EnrollmentSummary::from).collect()),
    ))
}

/// Partially update a client
#[utoipa::path(
    patch,
    path = "/api/v1/client/{id}",
    request_body = ClientUpdate,
    tag = "clients",
    responses(
        (status = 200, description = "Client updated", body = ClientResponse),
        (status = 404, description = "Client not found"),
        (status = 409, description = "Identification number already in use"),
        (status = 422, description = "Field validation failed"),
    )
)]
#[tracing::instrument(skip_all, fields(client_id = %id))]
pub async fn update_client(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<ClientId>,
    Json(request): Json<ClientUpdate>,
) -> Result<Json<ClientResponse>, Error> {
    request.validate()?;

    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Clients::new(&mut conn);

    let existing = repo.get_by_id(id).await?.ok_or_else(|| Error::not_found("Client", id))?;

    // Check if the identification number is being changed to one already in use
    if let Some(id_number) = &request.identification_number
        && id_number != &existing.identification_number
        && repo.get_by_identification_number(id_number).await?.is_some()
    {
        return Err(Error::Conflict {
            message: "A client with this identification number already exists".to_string(),
        });
    }

    // The record must still carry at least one contact method after the update
    let effective_email = request.email.as_ref().or(existing.email.as_ref());
    let effective_phone = request.phone.as_ref().or(existing.phone.as_ref());
    if effective_email.is_none() && effective_phone.is_none() {
        return Err(Error::BadRequest {
            message: "Either email or phone must be provided".to_string(),
        });
    }

    let updated = repo.update(id, &ClientUpdateDBRequest::from(request)).await?;

    Ok(Json(ClientResponse::from(updated)))
}

/// Delete a client and its enrollments
#[utoipa::path(
    delete,
    path = "/api/v1/client/{id}",
    tag = "clients",
    responses(
        (status = 204, description = "Client deleted"),
        (status = 404, description = "Client not found"),
    )
)]
#[tracing::instrument(skip_all, fields(client_id = %id))]
pub async fn delete_client(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(id): Path<ClientId>,
) -> Result<StatusCode, Error> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Clients::new(&mut conn);

    if !repo.delete(id).await? {
        return Err(Error::not_found("Client", id));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Trim surrounding whitespace and quotes from a search query; empty queries
/// become None
fn normalize_query(query: Option<&str>) -> Option<String> {
    let trimmed = query?.trim().trim_matches(['"', '\'']);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
