use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::dto::journey_dto::{
    EndJourneyRequest, JourneyListQuery, JourneyWithVehicle, StartJourneyRequest,
};
use crate::dto::ApiResponse;
use crate::models::auth::Principal;
use crate::models::journey::Journey;
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::utils::validation::validated;

pub fn create_journey_router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_journey).get(list_journeys))
        .route("/active", get(active_journey))
        .route("/:id", get(get_journey).delete(delete_journey))
        .route("/:id/end", post(end_journey))
}

async fn start_journey(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<StartJourneyRequest>,
) -> Result<(StatusCode, Json<ApiResponse<JourneyWithVehicle>>), AppError> {
    let request = validated(request)?;
    let started = state
        .services
        .journeys
        .start(&principal, request.vehicle_id, request.details.into())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(started.into(), "Journey started")),
    ))
}

async fn end_journey(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    body: Option<Json<EndJourneyRequest>>,
) -> Result<Json<ApiResponse<JourneyWithVehicle>>, AppError> {
    let request = validated(body.map(|Json(b)| b).unwrap_or_default())?;
    let ended = state
        .services
        .journeys
        .end(&principal, id, request.into())
        .await?;
    Ok(Json(ApiResponse::success_with_message(ended.into(), "Journey ended")))
}

async fn active_journey(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<ApiResponse<Option<Journey>>>, AppError> {
    let journey = state
        .services
        .journeys
        .active_for_current_driver(&principal)
        .await?;
    Ok(Json(ApiResponse::success(journey)))
}

async fn list_journeys(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<JourneyListQuery>,
) -> Result<Json<ApiResponse<Vec<Journey>>>, AppError> {
    let (filters, page) = query.split();
    let journeys = state
        .services
        .journeys
        .list(&principal, filters, page.into())
        .await?;
    Ok(Json(ApiResponse::success(journeys)))
}

async fn get_journey(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Journey>>, AppError> {
    let journey = state.services.journeys.get(&principal, id).await?;
    Ok(Json(ApiResponse::success(journey)))
}

async fn delete_journey(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    state.services.journeys.delete(&principal, id).await?;
    Ok(Json(ApiResponse::done("Journey deleted")))
}
