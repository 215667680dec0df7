//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::handlers::{system, users};
use crate::contract::DeleteResult;
use crate::domain::{CreateUserInput, UpdateUserInput, User, UserStatus};
use crate::error::{ErrorBody, ErrorResponse};

/// Path of the served OpenAPI JSON document.
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// OpenAPI description of every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "User Gateway API",
        description = "REST and WebSocket gateway in front of the user command bus."
    ),
    paths(
        users::create_user,
        users::list_users,
        users::get_user,
        users::update_user,
        users::delete_user,
        system::health_handler,
    ),
    components(
        schemas(
            User,
            UserStatus,
            CreateUserInput,
            UpdateUserInput,
            DeleteResult,
            ErrorResponse,
            ErrorBody,
            system::HealthResponse,
        )
    ),
    tags(
        (name = "Users", description = "User management"),
        (name = "System", description = "Service status"),
    )
)]
pub struct ApiDoc;
