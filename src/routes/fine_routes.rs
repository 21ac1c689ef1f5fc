use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::dto::fine_dto::{CostsQuery, CreateCostRequest, CreateFineRequest, FineWithCost};
use crate::dto::{ApiResponse, PageQuery};
use crate::models::auth::Principal;
use crate::models::fine::{Fine, FinePatch};
use crate::models::vehicle_cost::VehicleCost;
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::utils::validation::validated;

pub fn create_fine_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_fine).get(list_fines))
        .route("/:id", get(get_fine).put(update_fine).delete(delete_fine))
}

pub fn create_cost_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_cost).get(list_costs))
        .route("/:id", get(get_cost).delete(delete_cost))
}

async fn create_fine(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CreateFineRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FineWithCost>>), AppError> {
    let request = validated(request)?;
    let created = state
        .services
        .fines
        .create(&principal, request.into_new(principal.organization_id))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(created.into(), "Fine registered")),
    ))
}

async fn list_fines(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ApiResponse<Vec<Fine>>>, AppError> {
    let fines = state.services.fines.list(&principal, page.into()).await?;
    Ok(Json(ApiResponse::success(fines)))
}

async fn get_fine(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Fine>>, AppError> {
    let fine = state.services.fines.get(&principal, id).await?;
    Ok(Json(ApiResponse::success(fine)))
}

async fn update_fine(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(patch): Json<FinePatch>,
) -> Result<Json<ApiResponse<FineWithCost>>, AppError> {
    let updated = state.services.fines.update(&principal, id, patch).await?;
    Ok(Json(ApiResponse::success(updated.into())))
}

async fn delete_fine(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.services.fines.delete(&principal, id).await?;
    Ok(Json(ApiResponse::done("Fine deleted")))
}

async fn create_cost(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CreateCostRequest>,
) -> Result<(StatusCode, Json<ApiResponse<VehicleCost>>), AppError> {
    let request = validated(request)?;
    let cost = state
        .services
        .costs
        .create(&principal, request.into_new(principal.organization_id))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(cost))))
}

async fn list_costs(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<CostsQuery>,
) -> Result<Json<ApiResponse<Vec<VehicleCost>>>, AppError> {
    let costs = state
        .services
        .costs
        .list(&principal, query.from, query.to)
        .await?;
    Ok(Json(ApiResponse::success(costs)))
}

async fn get_cost(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<VehicleCost>>, AppError> {
    let cost = state.services.costs.get(&principal, id).await?;
    Ok(Json(ApiResponse::success(cost)))
}

async fn delete_cost(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.services.costs.delete(&principal, id).await?;
    Ok(Json(ApiResponse::done("Vehicle cost deleted")))
}
