use crate::assets::{self, AssetPaths};
use crate::broadcaster::Subscription;
use crate::errors::AppResult;
use crate::models::{
    CreateItemPayload, CreateListPayload, CreatedItemResponse, CreatedListResponse, DeleteItemQuery, HistoryEntry,
    ItemRecord, ListItemsQuery, ListSummary, ReorderListsPayload, SettingsUpdatePayload, SuccessResponse,
    UpdateItemPayload, UpdateListPayload,
};
use crate::service::TickrCore;
use axum::extract::{Path, Query, Request, State};
use axum::http::header::CACHE_CONTROL;
use axum::http::HeaderName;
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use futures::stream::{self, Stream};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub core: TickrCore,
    pub assets: Arc<AssetPaths>,
}

impl AppState {
    pub fn new(core: TickrCore, assets: AssetPaths) -> Self {
        Self {
            core,
            assets: Arc::new(assets),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/lists", get(get_lists).post(create_list))
        .route("/api/lists/reorder", post(reorder_lists))
        .route("/api/lists/{list_id}", put(update_list).delete(delete_list))
        .route("/api/lists/{list_id}/items", get(get_items).post(create_item))
        .route("/api/lists/{list_id}/history", get(get_history))
        .route("/api/items/{item_id}", put(update_item).delete(delete_item))
        .route("/api/settings", get(get_settings).put(update_settings))
        .route("/api/events", get(events))
        .route("/", get(index_page))
        .route("/manifest.json", get(manifest))
        .route("/sw.js", get(service_worker))
        .route("/static/{*path}", get(static_asset))
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(request).await;
    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request handled"
    );
    response
}

async fn get_lists(State(state): State<AppState>) -> AppResult<Json<Vec<ListSummary>>> {
    state.core.list_lists().map(Json)
}

async fn create_list(
    State(state): State<AppState>,
    Json(payload): Json<CreateListPayload>,
) -> AppResult<Json<CreatedListResponse>> {
    state.core.create_list(payload).map(Json)
}

async fn update_list(
    State(state): State<AppState>,
    Path(list_id): Path<i64>,
    Json(payload): Json<UpdateListPayload>,
) -> AppResult<Json<SuccessResponse>> {
    state.core.update_list(list_id, payload)?;
    Ok(Json(SuccessResponse::ok()))
}

async fn delete_list(State(state): State<AppState>, Path(list_id): Path<i64>) -> AppResult<Json<SuccessResponse>> {
    state.core.delete_list(list_id)?;
    Ok(Json(SuccessResponse::ok()))
}

async fn reorder_lists(
    State(state): State<AppState>,
    Json(payload): Json<ReorderListsPayload>,
) -> AppResult<Json<SuccessResponse>> {
    state.core.reorder_lists(payload)?;
    Ok(Json(SuccessResponse::ok()))
}

async fn get_items(
    State(state): State<AppState>,
    Path(list_id): Path<i64>,
    Query(query): Query<ListItemsQuery>,
) -> AppResult<Json<Vec<ItemRecord>>> {
    state.core.list_items(list_id, query.include_completed).map(Json)
}

async fn create_item(
    State(state): State<AppState>,
    Path(list_id): Path<i64>,
    Json(payload): Json<CreateItemPayload>,
) -> AppResult<Json<CreatedItemResponse>> {
    state.core.create_item(list_id, payload).map(Json)
}

async fn update_item(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
    Json(payload): Json<UpdateItemPayload>,
) -> AppResult<Json<SuccessResponse>> {
    state.core.update_item(item_id, payload)?;
    Ok(Json(SuccessResponse::ok()))
}

async fn delete_item(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
    Query(query): Query<DeleteItemQuery>,
) -> AppResult<Json<SuccessResponse>> {
    state.core.delete_item(item_id, query.undo)?;
    Ok(Json(SuccessResponse::ok()))
}

async fn get_settings(State(state): State<AppState>) -> AppResult<Json<BTreeMap<String, String>>> {
    state.core.get_settings().map(Json)
}

async fn update_settings(
    State(state): State<AppState>,
    Json(payload): Json<SettingsUpdatePayload>,
) -> AppResult<Json<SuccessResponse>> {
    state.core.update_settings(payload)?;
    Ok(Json(SuccessResponse::ok()))
}

async fn get_history(State(state): State<AppState>, Path(list_id): Path<i64>) -> AppResult<Json<Vec<HistoryEntry>>> {
    state.core.list_history(list_id).map(Json)
}

/// Live-update stream. The subscription lives inside the stream, so it is
/// dropped (and unregistered) however the response ends.
async fn events(State(state): State<AppState>) -> impl IntoResponse {
    let subscription = state.core.subscribe();
    tracing::info!(
        subscriber = subscription.id(),
        subscribers = state.core.broadcaster().subscriber_count(),
        "live-update stream opened"
    );

    let headers = [
        (CACHE_CONTROL, "no-cache"),
        (HeaderName::from_static("x-accel-buffering"), "no"),
    ];
    (headers, Sse::new(change_stream(subscription)).keep_alive(KeepAlive::default()))
}

fn change_stream(
    subscription: Subscription,
) -> impl Stream<Item = Result<Event, axum::Error>> + Send + 'static {
    stream::unfold(subscription, |mut subscription| async move {
        let change = subscription.recv().await?;
        Some((Event::default().json_data(change), subscription))
    })
}

async fn index_page(State(state): State<AppState>) -> AppResult<Response> {
    assets::index_page(&state.assets).await
}

async fn manifest(State(state): State<AppState>) -> AppResult<Response> {
    assets::manifest(&state.assets).await
}

async fn service_worker(State(state): State<AppState>) -> AppResult<Response> {
    assets::service_worker(&state.assets).await
}

async fn static_asset(State(state): State<AppState>, Path(path): Path<String>) -> AppResult<Response> {
    assets::static_asset(&state.assets, &path).await
}
