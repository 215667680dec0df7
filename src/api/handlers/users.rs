//! User CRUD handlers: create, list, get, update, delete.
//!
//! Every handler validates its input, then forwards the command over the
//! broker through [`crate::client::UserClient`].

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::app_state::AppState;
use crate::contract::DeleteResult;
use crate::domain::{CreateUserInput, UpdateUserInput, User};
use crate::error::{ErrorResponse, GatewayError};
use crate::validation::{parse_user_id, validate_create, validate_update};

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, GatewayError> {
    payload
        .map(|Json(value)| value)
        .map_err(|_| GatewayError::InvalidRequest("invalid request body".to_string()))
}

/// `POST /users` — Create a user.
///
/// # Errors
///
/// Returns [`GatewayError`] on invalid input, a taken e-mail or an
/// unreachable user service.
#[utoipa::path(
    post,
    path = "/users",
    tag = "Users",
    summary = "Create a user",
    description = "Validates the input and creates a user. Connected WebSocket clients receive a `user.created` event.",
    request_body = CreateUserInput,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid input or e-mail already exists", body = ErrorResponse),
        (status = 500, description = "User service failure", body = ErrorResponse),
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    payload: Result<Json<CreateUserInput>, JsonRejection>,
) -> Result<impl IntoResponse, GatewayError> {
    let input = body(payload)?;
    validate_create(&input)?;

    let user = state.users.create(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// `GET /users` — List all users.
///
/// # Errors
///
/// Returns [`GatewayError`] if the user service fails.
#[utoipa::path(
    get,
    path = "/users",
    tag = "Users",
    summary = "List users",
    responses(
        (status = 200, description = "All users, oldest first", body = Vec<User>),
        (status = 500, description = "User service failure", body = ErrorResponse),
    )
)]
pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, GatewayError> {
    let users = state.users.list().await?;
    Ok(Json(users))
}

/// `GET /users/{id}` — Fetch one user.
///
/// # Errors
///
/// Returns [`GatewayError`] on a malformed id or a missing user.
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "Users",
    summary = "Get a user",
    params(
        ("id" = String, Path, description = "User UUID"),
    ),
    responses(
        (status = 200, description = "The user", body = User),
        (status = 400, description = "Malformed id", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let id = parse_user_id(&id)?;
    let user = state.users.get(id).await?;
    Ok(Json(user))
}

/// `PATCH /users/{id}` — Partially update a user.
///
/// # Errors
///
/// Returns [`GatewayError`] on invalid input, a missing user or a taken
/// e-mail.
#[utoipa::path(
    patch,
    path = "/users/{id}",
    tag = "Users",
    summary = "Update a user",
    description = "Changes only the fields present in the body; at least one is required. An empty `phone` clears it.",
    params(
        ("id" = String, Path, description = "User UUID"),
    ),
    request_body = UpdateUserInput,
    responses(
        (status = 200, description = "The updated user", body = User),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateUserInput>, JsonRejection>,
) -> Result<impl IntoResponse, GatewayError> {
    let changes = body(payload)?;
    validate_update(&changes)?;
    let id = parse_user_id(&id)?;

    let user = state.users.update(id, changes).await?;
    Ok(Json(user))
}

/// `DELETE /users/{id}` — Delete a user.
///
/// # Errors
///
/// Returns [`GatewayError`] on a malformed id or a missing user.
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "Users",
    summary = "Delete a user",
    params(
        ("id" = String, Path, description = "User UUID"),
    ),
    responses(
        (status = 200, description = "User deleted", body = DeleteResult),
        (status = 400, description = "Malformed id", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse),
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let id = parse_user_id(&id)?;
    let result = state.users.delete(id).await?;
    Ok(Json(result))
}

/// User routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
}
