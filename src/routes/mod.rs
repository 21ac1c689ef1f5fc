//! Routers HTTP por área
//!
//! Todas las rutas de negocio viven bajo `/api/v1` y pasan por el
//! middleware JWT; `/health` queda público.

pub mod dashboard_routes;
pub mod fine_routes;
pub mod freight_order_routes;
pub mod inventory_routes;
pub mod journey_routes;
pub mod vehicle_routes;

use axum::{middleware, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::middleware::auth_middleware;
use crate::state::AppState;

pub fn create_api_router(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .nest("/vehicles", vehicle_routes::create_vehicle_router())
        .nest("/journeys", journey_routes::create_journey_router())
        .nest("/freight-orders", freight_order_routes::create_freight_order_router())
        .nest("/inventory", inventory_routes::create_inventory_router())
        .nest("/fines", fine_routes::create_fine_router())
        .nest("/costs", fine_routes::create_cost_router())
        .nest("/dashboard", dashboard_routes::create_dashboard_router())
        .nest("/notifications", dashboard_routes::create_notification_router())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", protected)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
