/*!
 * Evergreen API: farm-operations backend covering inventory, sales,
 * customers, orders, staff, suppliers, shipments and reporting.
 *
 * Handlers stay thin: resolve the actor, check the allow set, call a
 * service. Services own the queries and transactions.
 */

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod migrator;
pub mod services;

use auth::AuthService;
use config::AppConfig;
use db::DbPool;
use errors::ServiceError;
use services::analytics::AnalyticsService;
use services::customers::CustomerService;
use services::inventory::InventoryService;
use services::orders::OrderService;
use services::reports::ReportService;
use services::roles::StaffRoleService;
use services::sales::SalesService;
use services::shipments::ShipmentService;
use services::staff::StaffService;
use services::suppliers::SupplierService;
use services::users::UserService;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub auth: AuthService,
}

impl AppState {
    pub fn new(db: Arc<DbPool>, config: AppConfig) -> Self {
        let auth = AuthService::new(config.jwt_secret.clone(), config.jwt_expiration as i64);
        Self {
            db,
            config: Arc::new(config),
            auth,
        }
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.db.clone(), self.auth.clone())
    }

    pub fn customers(&self) -> CustomerService {
        CustomerService::new(self.db.clone())
    }

    pub fn inventory(&self) -> InventoryService {
        InventoryService::new(self.db.clone())
    }

    pub fn sales(&self) -> SalesService {
        SalesService::new(self.db.clone())
    }

    pub fn analytics(&self) -> AnalyticsService {
        AnalyticsService::new(self.db.clone())
    }

    pub fn orders(&self) -> OrderService {
        OrderService::new(self.db.clone())
    }

    pub fn staff(&self) -> StaffService {
        StaffService::new(self.db.clone())
    }

    pub fn roles(&self) -> StaffRoleService {
        StaffRoleService::new(self.db.clone())
    }

    pub fn suppliers(&self) -> SupplierService {
        SupplierService::new(self.db.clone())
    }

    pub fn shipments(&self) -> ShipmentService {
        ShipmentService::new(self.db.clone())
    }

    pub fn reports(&self) -> ReportService {
        ReportService::new(self.db.clone())
    }
}

async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    db::check_connection(&state.db).await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/users", handlers::users::user_routes())
        .nest("/inventory", handlers::inventory::inventory_routes())
        .nest("/sales", handlers::sales::sales_routes())
        .nest("/orders", handlers::orders::order_routes())
        .nest("/customers", handlers::customers::customer_routes())
        .nest("/staff", handlers::staff::staff_routes())
        .nest("/supply-chain", handlers::supply_chain::supply_chain_routes())
        .nest("/reports", handlers::reports::report_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
