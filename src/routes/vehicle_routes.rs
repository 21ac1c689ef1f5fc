use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::dto::vehicle_dto::{CreateVehicleRequest, PositionRequest};
use crate::dto::ApiResponse;
use crate::models::auth::Principal;
use crate::models::vehicle::Vehicle;
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::utils::validation::validated;

pub fn create_vehicle_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_vehicle).get(list_vehicles))
        .route("/:id", get(get_vehicle).delete(delete_vehicle))
        .route("/:id/maintenance", post(enter_maintenance))
        .route("/:id/maintenance", delete(leave_maintenance))
        .route("/:id/position", post(record_position))
}

async fn create_vehicle(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CreateVehicleRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Vehicle>>), AppError> {
    let request = validated(request)?;
    let vehicle = state
        .services
        .vehicles
        .create(&principal, request.into_new(principal.organization_id))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(vehicle, "Vehicle created")),
    ))
}

async fn list_vehicles(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<Vec<Vehicle>>>, AppError> {
    let vehicles = state.services.vehicles.list(&principal).await?;
    Ok(Json(ApiResponse::success(vehicles)))
}

async fn get_vehicle(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vehicle>>, AppError> {
    let vehicle = state.services.vehicles.get(&principal, id).await?;
    Ok(Json(ApiResponse::success(vehicle)))
}

async fn delete_vehicle(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.services.vehicles.delete(&principal, id).await?;
    Ok(Json(ApiResponse::done("Vehicle deleted")))
}

async fn enter_maintenance(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vehicle>>, AppError> {
    let vehicle = state.services.vehicles.enter_maintenance(&principal, id).await?;
    Ok(Json(ApiResponse::success(vehicle)))
}

async fn leave_maintenance(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vehicle>>, AppError> {
    let vehicle = state.services.vehicles.leave_maintenance(&principal, id).await?;
    Ok(Json(ApiResponse::success(vehicle)))
}

/// Acepta el ping sin esperar a que se persista
async fn record_position(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(request): Json<PositionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<()>>), AppError> {
    let request = validated(request)?;
    let queued = state
        .services
        .gps
        .record_position(&principal, id, request.latitude, request.longitude);
    let message = if queued {
        "Position queued"
    } else {
        "Position dropped"
    };
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::done(message))))
}
