use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::entities::user::Role;
use crate::errors::ServiceError;
use crate::services::reports::NewCustomReport;
use crate::AppState;

const REPORTS: &[Role] = &[Role::Admin, Role::AnalyticsManager];

#[derive(Debug, Deserialize)]
struct RangeQuery {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct OperationalQuery {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    #[serde(default)]
    include_financials: bool,
}

async fn financial_report(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(REPORTS)?;
    let report = state.reports().financial_report(query.start, query.end).await?;
    Ok(Json(report))
}

async fn operational_report(
    State(state): State<AppState>,
    Query(query): Query<OperationalQuery>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(REPORTS)?;
    let report = state
        .reports()
        .operational_report(query.start, query.end, query.include_financials)
        .await?;
    Ok(Json(report))
}

async fn create_custom_report(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NewCustomReport>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(REPORTS)?;
    let created = state.reports().create_custom_report(user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_custom_reports(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(REPORTS)?;
    let reports = state.reports().list_custom_reports().await?;
    Ok(Json(reports))
}

async fn delete_custom_report(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(REPORTS)?;
    state.reports().delete_custom_report(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/financial", get(financial_report))
        .route("/operational", get(operational_report))
        .route("/custom", post(create_custom_report))
        .route("/custom", get(list_custom_reports))
        .route("/custom/:id", delete(delete_custom_report))
}
