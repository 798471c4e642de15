use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};

use crate::auth::AuthUser;
use crate::entities::user::Role;
use crate::errors::ServiceError;
use crate::services::users::{Credentials, NewUser, ResetPassword, UpdateUser};
use crate::AppState;

const MANAGE_USERS: &[Role] = &[Role::Admin];
const CREATE_USERS: &[Role] = &[Role::Admin, Role::HumanResourcesManager];

async fn authenticate(
    State(state): State<AppState>,
    Json(credentials): Json<Credentials>,
) -> Result<impl IntoResponse, ServiceError> {
    let token = state.users().authenticate(&credentials).await?;
    Ok(Json(token))
}

async fn create_user(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NewUser>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(CREATE_USERS)?;
    let created = state.users().create_user(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(MANAGE_USERS)?;
    let users = state.users().list_users().await?;
    Ok(Json(users))
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(MANAGE_USERS)?;
    let found = state.users().get_user(id).await?;
    Ok(Json(found))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
    Json(payload): Json<UpdateUser>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(MANAGE_USERS)?;
    let updated = state.users().update_user(id, payload).await?;
    Ok(Json(updated))
}

async fn reset_password(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
    Json(payload): Json<ResetPassword>,
) -> Result<impl IntoResponse, ServiceError> {
    // Users may reset their own password; changing someone else's is
    // an admin operation.
    if user.id != id {
        user.require_role(MANAGE_USERS)?;
    }
    state.users().reset_password(id, payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(MANAGE_USERS)?;
    state.users().delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/authenticate", post(authenticate))
        .route("/", post(create_user))
        .route("/", get(list_users))
        .route("/:id", get(get_user))
        .route("/:id", put(update_user))
        .route("/:id", delete(delete_user))
        .route("/:id/reset-password", put(reset_password))
}
