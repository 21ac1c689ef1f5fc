use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::dto::dashboard_dto::{PeriodQuery, UnreadCount};
use crate::dto::{ApiResponse, PageQuery};
use crate::models::auth::Principal;
use crate::models::dashboard::{DemoStats, DriverDashboard, ManagerDashboard, VehiclePosition};
use crate::models::notification::Notification;
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_dashboard_router() -> Router<AppState> {
    Router::new()
        .route("/", get(manager_dashboard))
        .route("/driver", get(driver_dashboard))
        .route("/demo-stats", get(demo_stats))
        .route("/positions", get(vehicle_positions))
}

pub fn create_notification_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/unread-count", get(unread_count))
        .route("/:id/read", post(mark_as_read))
}

async fn manager_dashboard(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<ApiResponse<ManagerDashboard>>, AppError> {
    let dashboard = state
        .services
        .dashboard
        .manager_dashboard(&principal, query.period)
        .await?;
    Ok(Json(ApiResponse::success(dashboard)))
}

async fn driver_dashboard(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<ApiResponse<DriverDashboard>>, AppError> {
    let dashboard = state
        .services
        .dashboard
        .driver_dashboard(&principal, query.period)
        .await?;
    Ok(Json(ApiResponse::success(dashboard)))
}

async fn demo_stats(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<DemoStats>>, AppError> {
    let stats = state.services.dashboard.demo_stats(&principal).await?;
    Ok(Json(ApiResponse::success(stats)))
}

async fn vehicle_positions(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<Vec<VehiclePosition>>>, AppError> {
    let positions = state.services.dashboard.vehicle_positions(&principal).await?;
    Ok(Json(ApiResponse::success(positions)))
}

async fn list_notifications(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ApiResponse<Vec<Notification>>>, AppError> {
    let notifications = state
        .services
        .notifications
        .list(&principal, page.into())
        .await?;
    Ok(Json(ApiResponse::success(notifications)))
}

async fn unread_count(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<UnreadCount>>, AppError> {
    let unread = state.services.notifications.unread_count(&principal).await?;
    Ok(Json(ApiResponse::success(UnreadCount { unread })))
}

async fn mark_as_read(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Notification>>, AppError> {
    let notification = state
        .services
        .notifications
        .mark_as_read(&principal, id)
        .await?;
    Ok(Json(ApiResponse::success(notification)))
}
