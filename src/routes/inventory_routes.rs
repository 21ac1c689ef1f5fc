use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use uuid::Uuid;

use crate::dto::inventory_dto::{
    AddItemsRequest, CreatePartRequest, ItemsQuery, PartCreatedResponse, PartsQuery,
    SetItemStatusRequest,
};
use crate::dto::{ApiResponse, PageQuery};
use crate::models::auth::Principal;
use crate::models::inventory::{
    InventoryItem, InventoryTransaction, ItemStatusOutcome, PartWithStock,
};
use crate::repositories::Page;
use crate::state::AppState;
use crate::utils::errors::AppError;
use crate::utils::validation::validated;

pub fn create_inventory_router() -> Router<AppState> {
    Router::new()
        .route("/parts", post(create_part).get(list_parts))
        .route("/parts/:id", get(get_part))
        .route("/parts/:id/items", post(add_items).get(list_items))
        .route("/parts/:id/history", get(part_history))
        .route("/items/:id/status", put(set_item_status))
}

async fn create_part(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(request): Json<CreatePartRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PartCreatedResponse>>), AppError> {
    let request = validated(request)?;
    let (new_part, quantity) = request.into_new(principal.organization_id);
    let (part, items) = state
        .services
        .inventory
        .create_part(&principal, new_part, quantity)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(
            PartCreatedResponse { part, items },
            "Part created",
        )),
    ))
}

async fn list_parts(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<PartsQuery>,
) -> Result<Json<ApiResponse<Vec<PartWithStock>>>, AppError> {
    let parts = state
        .services
        .inventory
        .list_parts(
            &principal,
            query.search.as_deref(),
            Page::new(query.skip, query.limit),
        )
        .await?;
    Ok(Json(ApiResponse::success(parts)))
}

async fn get_part(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PartWithStock>>, AppError> {
    let part = state.services.inventory.get_part(&principal, id).await?;
    Ok(Json(ApiResponse::success(part)))
}

async fn add_items(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(request): Json<AddItemsRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Vec<InventoryItem>>>), AppError> {
    let request = validated(request)?;
    let items = state
        .services
        .inventory
        .add_items(&principal, id, request.quantity, request.notes)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(items))))
}

async fn list_items(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Query(query): Query<ItemsQuery>,
) -> Result<Json<ApiResponse<Vec<InventoryItem>>>, AppError> {
    let items = state
        .services
        .inventory
        .items_for_part(&principal, id, query.status)
        .await?;
    Ok(Json(ApiResponse::success(items)))
}

async fn part_history(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ApiResponse<Vec<InventoryTransaction>>>, AppError> {
    let history = state
        .services
        .inventory
        .history(&principal, id, page.into())
        .await?;
    Ok(Json(ApiResponse::success(history)))
}

async fn set_item_status(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetItemStatusRequest>,
) -> Result<Json<ApiResponse<ItemStatusOutcome>>, AppError> {
    let request = validated(request)?;
    let outcome = state
        .services
        .inventory
        .set_item_status(
            &principal,
            id,
            request.status,
            request.related_vehicle_id,
            request.notes,
        )
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}
