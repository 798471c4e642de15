use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};

use crate::auth::AuthUser;
use crate::entities::user::Role;
use crate::errors::ServiceError;
use crate::services::inventory::{InventoryFilter, NewInventoryItem, UpdateInventoryItem};
use crate::AppState;

const INVENTORY: &[Role] = &[Role::Admin, Role::InventoryManager];

async fn create_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NewInventoryItem>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(INVENTORY)?;
    let created = state.inventory().create_item(user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_items(
    State(state): State<AppState>,
    Query(filter): Query<InventoryFilter>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(INVENTORY)?;
    let items = state.inventory().list_items(filter).await?;
    Ok(Json(items))
}

async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(INVENTORY)?;
    let item = state.inventory().get_item(id).await?;
    Ok(Json(item))
}

async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
    Json(payload): Json<UpdateInventoryItem>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(INVENTORY)?;
    let updated = state.inventory().update_item(user.id, id, payload).await?;
    Ok(Json(updated))
}

async fn delete_item(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(INVENTORY)?;
    state.inventory().delete_item(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_item))
        .route("/", get(list_items))
        .route("/:id", get(get_item))
        .route("/:id", put(update_item))
        .route("/:id", delete(delete_item))
}
