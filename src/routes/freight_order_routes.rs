use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::dto::freight_order_dto::{
    ClaimFreightOrderRequest, CompleteStopRequest, CreateFreightOrderRequest, StartStopRequest,
};
use crate::dto::{ApiResponse, PageQuery};
use crate::models::auth::Principal;
use crate::models::freight_order::FreightOrder;
use crate::models::journey::JourneyEnd;
use crate::repositories::LegOutcome;
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::utils::validation::validated;

pub fn create_freight_order_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/open", get(list_open))
        .route("/pending", get(list_pending))
        .route("/:id", get(get_order))
        .route("/:id/claim", post(claim_order))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/stops/:stop_id/start", post(start_stop))
        .route("/:id/stops/:stop_id/complete", post(complete_stop))
}

async fn create_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CreateFreightOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<FreightOrder>>), AppError> {
    let request = validated(request)?;
    let order = state
        .services
        .freight_orders
        .create(&principal, request.into_new(principal.organization_id))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(order, "Freight order created")),
    ))
}

async fn list_orders(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ApiResponse<Vec<FreightOrder>>>, AppError> {
    let orders = state
        .services
        .freight_orders
        .list(&principal, page.into())
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

async fn list_open(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<Vec<FreightOrder>>>, AppError> {
    let orders = state.services.freight_orders.list_open(&principal).await?;
    Ok(Json(ApiResponse::success(orders)))
}

async fn list_pending(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<Vec<FreightOrder>>>, AppError> {
    let orders = state
        .services
        .freight_orders
        .list_pending_for_driver(&principal)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

async fn get_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FreightOrder>>, AppError> {
    let order = state.services.freight_orders.get(&principal, id).await?;
    Ok(Json(ApiResponse::success(order)))
}

async fn claim_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(request): Json<ClaimFreightOrderRequest>,
) -> Result<Json<ApiResponse<FreightOrder>>, AppError> {
    let order = state
        .services
        .freight_orders
        .claim(&principal, id, request.vehicle_id)
        .await?;
    Ok(Json(ApiResponse::success_with_message(order, "Freight order claimed")))
}

async fn cancel_order(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<FreightOrder>>, AppError> {
    let order = state.services.freight_orders.cancel(&principal, id).await?;
    Ok(Json(ApiResponse::success_with_message(order, "Freight order canceled")))
}

async fn start_stop(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((id, stop_id)): Path<(Uuid, Uuid)>,
    body: Option<Json<StartStopRequest>>,
) -> Result<(StatusCode, Json<ApiResponse<LegOutcome>>), AppError> {
    let request = validated(body.map(|Json(b)| b).unwrap_or_default())?;
    let outcome = state
        .services
        .freight_orders
        .start_journey_for_stop(&principal, id, stop_id, request.into())
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(outcome))))
}

async fn complete_stop(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((id, stop_id)): Path<(Uuid, Uuid)>,
    Json(request): Json<CompleteStopRequest>,
) -> Result<Json<ApiResponse<LegOutcome>>, AppError> {
    let request = validated(request)?;
    let end = JourneyEnd {
        end_mileage: request.end_mileage,
        end_engine_hours: request.end_engine_hours,
    };
    let outcome = state
        .services
        .freight_orders
        .complete_stop_point(&principal, id, stop_id, request.journey_id, end)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}
