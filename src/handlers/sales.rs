use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::common::PaginationParams;
use crate::auth::AuthUser;
use crate::entities::user::Role;
use crate::errors::ServiceError;
use crate::services::sales::{NewSalesRecord, UpdateSalesRecord};
use crate::AppState;

const SALES: &[Role] = &[Role::Admin, Role::SalesManager];
const TRENDS: &[Role] = &[Role::SalesManager, Role::AnalyticsManager];

#[derive(Debug, Deserialize)]
struct TrendsQuery {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    product: Option<String>,
    segment: Option<String>,
}

async fn add_sales_record(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NewSalesRecord>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(SALES)?;
    let record = state.sales().add_sales_record(user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_sales(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(SALES)?;
    let records = state
        .sales()
        .list_sales(pagination.per_page, pagination.offset())
        .await?;
    Ok(Json(records))
}

async fn update_sales_record(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
    Json(payload): Json<UpdateSalesRecord>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(SALES)?;
    let updated = state.sales().update_sales_record(user.id, id, payload).await?;
    Ok(Json(updated))
}

async fn delete_sales_record(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(SALES)?;
    state.sales().delete_sales_record(user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn sales_trends(
    State(state): State<AppState>,
    Query(query): Query<TrendsQuery>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(TRENDS)?;
    let report = state
        .analytics()
        .sales_trends(
            query.start,
            query.end,
            query.product.as_deref(),
            query.segment.as_deref(),
        )
        .await?;
    Ok(Json(report))
}

pub fn sales_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(add_sales_record))
        .route("/", get(list_sales))
        .route("/trends", get(sales_trends))
        .route("/:id", put(update_sales_record))
        .route("/:id", delete(delete_sales_record))
}
