use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;

use super::common::PaginationParams;
use crate::auth::AuthUser;
use crate::entities::order::OrderStatus;
use crate::entities::user::Role;
use crate::errors::ServiceError;
use crate::services::orders::{NewOrder, UpdateOrder};
use crate::AppState;

const ORDER_READ: &[Role] = &[Role::Admin, Role::SalesManager, Role::CustomerServiceRep];
const ORDER_WRITE: &[Role] = &[Role::Admin, Role::OrderFulfillmentOfficer];

#[derive(Debug, Deserialize)]
struct OrderListQuery {
    status: Option<OrderStatus>,
}

async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NewOrder>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(ORDER_WRITE)?;
    let created = state.orders().create_order(user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_orders(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    Query(query): Query<OrderListQuery>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(ORDER_READ)?;
    let orders = state
        .orders()
        .list_orders(pagination.per_page, pagination.offset(), query.status)
        .await?;
    Ok(Json(orders))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(ORDER_READ)?;
    let details = state.orders().get_order(id).await?;
    Ok(Json(details))
}

async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
    Json(payload): Json<UpdateOrder>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(ORDER_WRITE)?;
    let updated = state.orders().update_order(id, payload).await?;
    Ok(Json(updated))
}

async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(ORDER_WRITE)?;
    state.orders().delete_order(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order))
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id", put(update_order))
        .route("/:id", delete(delete_order))
}
