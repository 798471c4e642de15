use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::entities::shipment::ShipmentStatus;
use crate::entities::user::Role;
use crate::errors::ServiceError;
use crate::services::shipments::{NewShipment, UpdateShipment};
use crate::services::suppliers::{NewSupplier, UpdateSupplier};
use crate::AppState;

const SUPPLIERS: &[Role] = &[Role::Admin, Role::SupplyChainCoordinator];
const SHIPMENT_READ: &[Role] = &[
    Role::Admin,
    Role::InventoryManager,
    Role::SupplyChainCoordinator,
];
const SHIPMENT_WRITE: &[Role] = &[Role::InventoryManager, Role::SupplyChainCoordinator];

#[derive(Debug, Deserialize)]
struct ShipmentListQuery {
    status: Option<ShipmentStatus>,
}

async fn create_supplier(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NewSupplier>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(SUPPLIERS)?;
    let created = state.suppliers().create_supplier(payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_suppliers(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(SUPPLIERS)?;
    let suppliers = state.suppliers().list_suppliers().await?;
    Ok(Json(suppliers))
}

async fn update_supplier(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
    Json(payload): Json<UpdateSupplier>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(SUPPLIERS)?;
    let updated = state.suppliers().update_supplier(id, payload).await?;
    Ok(Json(updated))
}

async fn delete_supplier(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(SUPPLIERS)?;
    state.suppliers().delete_supplier(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_shipment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<NewShipment>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(SHIPMENT_WRITE)?;
    let created = state.shipments().create_shipment(user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_shipments(
    State(state): State<AppState>,
    Query(query): Query<ShipmentListQuery>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(SHIPMENT_READ)?;
    let shipments = state.shipments().list_shipments(query.status).await?;
    Ok(Json(shipments))
}

async fn get_shipment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(SHIPMENT_READ)?;
    let details = state.shipments().get_shipment(id).await?;
    Ok(Json(details))
}

async fn update_shipment(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    user: AuthUser,
    Json(payload): Json<UpdateShipment>,
) -> Result<impl IntoResponse, ServiceError> {
    user.require_role(SHIPMENT_WRITE)?;
    let updated = state.shipments().update_shipment(id, payload).await?;
    Ok(Json(updated))
}

pub fn supply_chain_routes() -> Router<AppState> {
    Router::new()
        .route("/suppliers", post(create_supplier))
        .route("/suppliers", get(list_suppliers))
        .route("/suppliers/:id", put(update_supplier))
        .route("/suppliers/:id", delete(delete_supplier))
        .route("/shipments", post(create_shipment))
        .route("/shipments", get(list_shipments))
        .route("/shipments/:id", get(get_shipment))
        .route("/shipments/:id", put(update_shipment))
}
