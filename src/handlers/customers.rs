use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};

use super::common::PaginationParams;
use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::customers::{NewCustomer, UpdateCustomer};
use crate::AppState;

// Customer records are readable and writable by any authenticated actor.

async fn create_customer(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<NewCustomer>,
) -> Result<impl IntoResponse, ServiceError> {
    let created = state.customers().create_customer(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_customers(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    _user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let customers = state
        .customers()
        .list_customers(pagination.per_page, pagination.offset())
        .await?;
    Ok(Json(customers))
}

async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    _user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let found = state.customers().get_customer(id).await?;
    Ok(Json(found))
}

async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    _user: AuthUser,
    Json(payload): Json<UpdateCustomer>,
) -> Result<impl IntoResponse, ServiceError> {
    let updated = state.customers().update_customer(id, payload).await?;
    Ok(Json(updated))
}

async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    _user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    state.customers().delete_customer(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn customer_orders(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    _user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.customers().customer_orders(id).await?;
    Ok(Json(orders))
}

pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_customer))
        .route("/", get(list_customers))
        .route("/:id", get(get_customer))
        .route("/:id", put(update_customer))
        .route("/:id", delete(delete_customer))
        .route("/:id/orders", get(customer_orders))
}
