use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::entities::user::Role;
use crate::errors::ServiceError;
use crate::services::roles::{NewStaffRole, UpdateStaffRole};
use crate::services::staff::{NewScheduleEntry, NewStaffMember, UpdateStaffMember};
use crate::AppState;

const STAFF: &[Role] = &[Role::Admin, Role::HumanResourcesManager];
const ROLE_CATALOGUE: &[Role] = &[Role::Admin];

#[derive(Debug, Deserialize)]
struct ScheduleQuery {
    staff_id: Option<i32>,
}

async fn create_staff(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NewStaffMember>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(STAFF)?;
    let created = state.staff().create_staff(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_staff(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(STAFF)?;
    let members = state.staff().list_staff().await?;
    Ok(Json(members))
}

async fn get_staff(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(STAFF)?;
    let details = state.staff().get_staff(id).await?;
    Ok(Json(details))
}

async fn update_staff(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
    Json(payload): Json<UpdateStaffMember>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(STAFF)?;
    let updated = state.staff().update_staff(id, payload).await?;
    Ok(Json(updated))
}

async fn delete_staff(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(STAFF)?;
    state.staff().delete_staff(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_schedule(
    State(state): State<AppState>,
    Query(query): Query<ScheduleQuery>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(STAFF)?;
    let entries = state.staff().list_schedule(query.staff_id).await?;
    Ok(Json(entries))
}

async fn update_schedule(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NewScheduleEntry>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(STAFF)?;
    let entry = state.staff().add_schedule_entry(payload).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn create_role(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NewStaffRole>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(ROLE_CATALOGUE)?;
    let created = state.roles().create_role(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_roles(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(ROLE_CATALOGUE)?;
    let roles = state.roles().list_roles().await?;
    Ok(Json(roles))
}

async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
    Json(payload): Json<UpdateStaffRole>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(ROLE_CATALOGUE)?;
    let updated = state.roles().update_role(id, payload).await?;
    Ok(Json(updated))
}

async fn delete_role(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(ROLE_CATALOGUE)?;
    state.roles().delete_role(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn staff_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_staff))
        .route("/", get(list_staff))
        .route("/schedule", get(list_schedule))
        .route("/schedule/update", post(update_schedule))
        .route("/roles", get(list_roles))
        .route("/roles", post(create_role))
        .route("/roles/:id", put(update_role))
        .route("/roles/:id", delete(delete_role))
        .route("/:id", get(get_staff))
        .route("/:id", put(update_staff))
        .route("/:id", delete(delete_staff))
}
