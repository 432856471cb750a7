mod draft;
mod http;
mod idempotency;
mod media_host;
mod metrics;
mod models;
mod orders;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use draft::{
    DraftError, DraftStore, FlowKind, ItemPatch, MediaKind, MediaLimits, PredefinedAttribute,
    RequestDraft, RowPatch, RowSelection, SelectedFile, Step,
};
use media_host::MediaHostClient;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use models::{ApiError, DraftPatch, ImportStub, SubmissionReceipt};
use orders::{OrderIntakeClient, OrderIntakeError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{collections::HashMap, net::SocketAddr, sync::Arc};
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        error!(target = "porter.api", "server crashed: {err}");
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let media = Arc::new(MediaHostClient::from_env());
    let orders = OrderIntakeClient::from_env();
    let openapi_raw = include_str!("../docs/openapi.yaml");
    let openapi: serde_json::Value =
        serde_yaml::from_str(openapi_raw).unwrap_or(serde_json::json!({"openapi":"3.0.3"}));
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("prom recorder");
    let redis = std::env::var("REDIS_URL")
        .ok()
        .and_then(|u| redis::Client::open(u).ok());

    let state = AppState {
        drafts: Arc::new(Mutex::new(HashMap::new())),
        media,
        orders,
        openapi: Arc::new(openapi),
        idempotency: Arc::new(Mutex::new(HashMap::new())),
        prometheus_handle,
        redis,
    };

    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
        .route("/drafts", post(create_draft))
        .route(
            "/drafts/{id}",
            get(get_draft).patch(patch_draft).delete(delete_draft),
        )
        .route("/drafts/{id}/reset", post(reset_draft))
        .route("/drafts/{id}/items", post(add_item))
        .route(
            "/drafts/{id}/items/{item_id}",
            axum::routing::patch(patch_item).delete(delete_item),
        )
        .route("/drafts/{id}/items/{item_id}/media", post(select_media))
        .route(
            "/drafts/{id}/items/{item_id}/media/{index}",
            axum::routing::delete(remove_media),
        )
        .route(
            "/drafts/{id}/items/{item_id}/attributes",
            post(add_attribute).get(available_attributes),
        )
        .route(
            "/drafts/{id}/items/{item_id}/attributes/{index}",
            axum::routing::patch(patch_attribute).delete(remove_attribute),
        )
        .route("/drafts/{id}/current/commit", post(commit_current))
        .route("/drafts/{id}/import", post(import_products))
        .route("/drafts/{id}/advance", post(advance_step))
        .route("/drafts/{id}/back", post(back_step))
        .route("/drafts/{id}/submit", post(submit_draft))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit_from_env()));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8000);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target = "porter.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

type DraftRegistry = Arc<Mutex<HashMap<Uuid, DraftStore<MediaHostClient>>>>;

#[derive(Clone)]
struct AppState {
    drafts: DraftRegistry,
    media: Arc<MediaHostClient>,
    orders: OrderIntakeClient,
    openapi: Arc<serde_json::Value>,
    idempotency: Arc<Mutex<HashMap<String, SubmissionReceipt>>>,
    prometheus_handle: PrometheusHandle,
    redis: Option<redis::Client>,
}

async fn store_for(state: &AppState, id: Uuid) -> Result<DraftStore<MediaHostClient>, AppError> {
    state
        .drafts
        .lock()
        .await
        .get(&id)
        .cloned()
        .ok_or(AppError::NotFound("no draft with that id"))
}

#[derive(Debug)]
enum AppError {
    Draft(DraftError),
    Intake(OrderIntakeError),
    NotFound(&'static str),
    BadRequest(String),
}

impl From<DraftError> for AppError {
    fn from(value: DraftError) -> Self {
        Self::Draft(value)
    }
}

impl From<OrderIntakeError> for AppError {
    fn from(value: OrderIntakeError) -> Self {
        Self::Intake(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, payload) = match self {
            AppError::Draft(err) => {
                let status = match &err {
                    DraftError::UnknownItem(_) => StatusCode::NOT_FOUND,
                    _ => StatusCode::BAD_REQUEST,
                };
                (
                    status,
                    ApiError {
                        error: err.code().to_string(),
                        detail: Some(err.to_string()),
                    },
                )
            }
            AppError::Intake(err) => (
                StatusCode::BAD_GATEWAY,
                ApiError {
                    error: "order_intake_failed".to_string(),
                    detail: Some(err.to_string()),
                },
            ),
            AppError::NotFound(detail) => (
                StatusCode::NOT_FOUND,
                ApiError {
                    error: "not_found".to_string(),
                    detail: Some(detail.to_string()),
                },
            ),
            AppError::BadRequest(detail) => (
                StatusCode::BAD_REQUEST,
                ApiError {
                    error: "bad_request".to_string(),
                    detail: Some(detail),
                },
            ),
        };
        (status, Json(payload)).into_response()
    }
}

/// Health and readiness check.
///
/// - Method: `GET`
/// - Path: `/health`
/// - Auth: none
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "porter-api-rs",
    }))
}

async fn openapi_json(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Ok(key) = std::env::var("OPENAPI_KEY") {
        let presented = headers
            .get("X-Docs-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != key {
            return Err(AppError::BadRequest("unauthorized".to_string()));
        }
    }
    Ok(Json((*state.openapi).clone()))
}

async fn swagger_ui() -> axum::http::Response<String> {
    let html = r#"<!doctype html>
<html>
<head>
  <meta charset='utf-8'/>
  <title>Porter API Docs</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({ url: '/openapi.json', dom_id: '#swagger-ui' });
    };
  </script>
</body>
</html>"#;
    axum::http::Response::builder()
        .header("Content-Type", "text/html; charset=utf-8")
        .body(html.to_string())
        .unwrap()
}

async fn metrics_endpoint(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
) -> axum::http::Response<String> {
    if let Ok(secret) = std::env::var("METRICS_KEY") {
        let presented = headers
            .get("X-Metrics-Key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if presented != secret {
            return axum::http::Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .body("unauthorized".into())
                .unwrap();
        }
    }
    let body = state.prometheus_handle.render();
    axum::http::Response::builder()
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .unwrap()
}

fn body_limit_from_env() -> usize {
    std::env::var("REQUEST_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(64 * 1024 * 1024)
}

// -------- Draft lifecycle --------

#[derive(Debug, Deserialize)]
struct CreateDraftRequest {
    #[serde(default)]
    flow: FlowKind,
    #[serde(default)]
    shop_info: Option<models::ShopInfo>,
    #[serde(default)]
    shipping_address_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct DraftCreated {
    id: Uuid,
    step: Step,
}

/// Open a fresh draft.
///
/// - Method: `POST`
/// - Path: `/drafts`
/// - Body: `CreateDraftRequest`
async fn create_draft(
    State(state): State<AppState>,
    Json(payload): Json<CreateDraftRequest>,
) -> Json<DraftCreated> {
    crate::metrics::inc_requests("/drafts");
    let store = DraftStore::new(payload.flow, state.media.clone());
    if payload.shop_info.is_some() || payload.shipping_address_id.is_some() {
        store
            .update_meta(DraftPatch {
                shop_info: payload.shop_info,
                shipping_address_id: payload.shipping_address_id,
            })
            .await;
    }
    let snapshot = store.snapshot().await;
    state.drafts.lock().await.insert(snapshot.id, store);
    info!(target = "porter.api", draft = %snapshot.id, flow = ?snapshot.flow, "draft opened");
    Json(DraftCreated {
        id: snapshot.id,
        step: snapshot.step,
    })
}

async fn get_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestDraft>, AppError> {
    let store = store_for(&state, id).await?;
    Ok(Json(store.snapshot().await))
}

async fn patch_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<DraftPatch>,
) -> Result<Json<RequestDraft>, AppError> {
    let store = store_for(&state, id).await?;
    store.update_meta(patch).await;
    Ok(Json(store.snapshot().await))
}

async fn reset_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestDraft>, AppError> {
    let store = store_for(&state, id).await?;
    store.reset().await;
    Ok(Json(store.snapshot().await))
}

async fn delete_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if state.drafts.lock().await.remove(&id).is_none() {
        return Err(AppError::NotFound("no draft with that id"));
    }
    Ok(Json(json!({ "status": "deleted" })))
}

// -------- Items --------

#[derive(Debug, Deserialize)]
struct AddItemRequest {
    #[serde(default)]
    link: String,
}

#[derive(Debug, Serialize)]
struct ItemCreated {
    id: Uuid,
    source_platform: String,
}

async fn add_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddItemRequest>,
) -> Result<Json<ItemCreated>, AppError> {
    crate::metrics::inc_requests("/drafts/items");
    let store = store_for(&state, id).await?;
    let item_id = store.add_linked_item(&payload.link).await;
    Ok(Json(ItemCreated {
        id: item_id,
        source_platform: draft::item::source_platform(&payload.link),
    }))
}

async fn patch_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(patch): Json<ItemPatch>,
) -> Result<Json<RequestDraft>, AppError> {
    let store = store_for(&state, id).await?;
    store.update_item(item_id, patch).await?;
    Ok(Json(store.snapshot().await))
}

/// Removal by id is a no-op when the item is already gone; the surviving
/// items keep their identity either way.
async fn delete_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<RequestDraft>, AppError> {
    let store = store_for(&state, id).await?;
    store.remove_item(item_id).await;
    Ok(Json(store.snapshot().await))
}

#[derive(Debug, Serialize)]
struct CommitResponse {
    id: Uuid,
}

async fn commit_current(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CommitResponse>, AppError> {
    crate::metrics::inc_requests("/drafts/commit");
    let store = store_for(&state, id).await?;
    let committed = store.commit_current().await?;
    Ok(Json(CommitResponse { id: committed }))
}

// -------- Media --------

#[derive(Debug, Deserialize)]
struct FilePayload {
    file_name: String,
    content_type: String,
    data_base64: String,
}

#[derive(Debug, Deserialize)]
struct SelectFilesRequest {
    #[serde(default = "SelectFilesRequest::default_kind")]
    kind: MediaKind,
    files: Vec<FilePayload>,
}

impl SelectFilesRequest {
    fn default_kind() -> MediaKind {
        MediaKind::Image
    }
}

#[derive(Debug, Serialize)]
struct MediaSelection {
    previews: Vec<String>,
    tickets: Vec<Uuid>,
}

/// Accept a file batch for one item. The response carries the preview
/// handles minted before any upload started; uploads keep running after
/// the response and reconcile through the draft store.
async fn select_media(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<SelectFilesRequest>,
) -> Result<Json<MediaSelection>, AppError> {
    crate::metrics::inc_requests("/drafts/media");
    let store = store_for(&state, id).await?;
    let mut files = Vec::with_capacity(payload.files.len());
    for file in payload.files {
        let bytes = BASE64.decode(file.data_base64.as_bytes()).map_err(|_| {
            AppError::BadRequest(format!("`{}` is not valid base64", file.file_name))
        })?;
        files.push(SelectedFile {
            file_name: file.file_name,
            content_type: file.content_type,
            bytes,
        });
    }
    let limits = MediaLimits::from_env(payload.kind);
    let batch = store
        .select_files(item_id, payload.kind, limits, files)
        .await?;
    Ok(Json(MediaSelection {
        previews: batch.previews,
        tickets: batch.tickets,
    }))
}

#[derive(Debug, Deserialize)]
struct RemoveMediaQuery {
    #[serde(default)]
    preview: bool,
}

async fn remove_media(
    State(state): State<AppState>,
    Path((id, item_id, index)): Path<(Uuid, Uuid, usize)>,
    Query(query): Query<RemoveMediaQuery>,
) -> Result<Json<RequestDraft>, AppError> {
    let store = store_for(&state, id).await?;
    store
        .remove_attachment(item_id, index, query.preview)
        .await?;
    Ok(Json(store.snapshot().await))
}

// -------- Variant attributes --------

#[derive(Debug, Deserialize)]
struct AddRowRequest {
    selection: String,
}

fn parse_selection(input: &str) -> Result<RowSelection, AppError> {
    if input.trim().eq_ignore_ascii_case("other") {
        return Ok(RowSelection::Other);
    }
    PredefinedAttribute::from_label(input)
        .map(RowSelection::Predefined)
        .ok_or_else(|| AppError::BadRequest(format!("unknown attribute selection `{input}`")))
}

#[derive(Debug, Serialize)]
struct AvailableAttributes {
    available: Vec<PredefinedAttribute>,
}

/// Predefined names the add-row menu may still offer, alongside "Other".
async fn available_attributes(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<AvailableAttributes>, AppError> {
    let store = store_for(&state, id).await?;
    let available = store.available_attributes(item_id).await?;
    Ok(Json(AvailableAttributes { available }))
}

async fn add_attribute(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<AddRowRequest>,
) -> Result<Json<RequestDraft>, AppError> {
    let store = store_for(&state, id).await?;
    let selection = parse_selection(&payload.selection)?;
    // a duplicate predefined name is silently refused, not an error
    store.add_variant_row(item_id, selection).await?;
    Ok(Json(store.snapshot().await))
}

async fn patch_attribute(
    State(state): State<AppState>,
    Path((id, item_id, index)): Path<(Uuid, Uuid, usize)>,
    Json(patch): Json<RowPatch>,
) -> Result<Json<RequestDraft>, AppError> {
    let store = store_for(&state, id).await?;
    store.update_variant_row(item_id, index, patch).await?;
    Ok(Json(store.snapshot().await))
}

async fn remove_attribute(
    State(state): State<AppState>,
    Path((id, item_id, index)): Path<(Uuid, Uuid, usize)>,
) -> Result<Json<RequestDraft>, AppError> {
    let store = store_for(&state, id).await?;
    store.remove_variant_row(item_id, index).await?;
    Ok(Json(store.snapshot().await))
}

// -------- Import --------

#[derive(Debug, Deserialize)]
struct ImportRequest {
    #[serde(default)]
    products: Vec<ImportStub>,
}

#[derive(Debug, Serialize)]
struct ImportOutcome {
    imported: usize,
}

/// Merge a batch from the companion browser tool. An empty batch leaves
/// the draft untouched; a non-empty batch replaces the item list.
async fn import_products(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ImportRequest>,
) -> Result<Json<ImportOutcome>, AppError> {
    crate::metrics::inc_requests("/drafts/import");
    let store = store_for(&state, id).await?;
    let imported = store.import_batch(&payload.products).await;
    crate::metrics::import_batch_size(imported);
    Ok(Json(ImportOutcome { imported }))
}

// -------- Step flow --------

#[derive(Debug, Serialize)]
struct StepResponse {
    step: Step,
    can_advance: bool,
}

async fn advance_step(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StepResponse>, AppError> {
    let store = store_for(&state, id).await?;
    let step = store.advance().await?;
    Ok(Json(StepResponse {
        step,
        can_advance: store.can_advance().await,
    }))
}

async fn back_step(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<StepResponse>, AppError> {
    let store = store_for(&state, id).await?;
    let step = store.back().await;
    Ok(Json(StepResponse {
        step,
        can_advance: store.can_advance().await,
    }))
}

// -------- Submission --------

/// Submit the draft to the order-intake service.
///
/// - Method: `POST`
/// - Path: `/drafts/{id}/submit`
/// - Honors `Idempotency-Key` (Redis when configured, else in-memory).
async fn submit_draft(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    headers: axum::http::HeaderMap,
) -> Result<Json<SubmissionReceipt>, AppError> {
    crate::metrics::inc_requests("/drafts/submit");
    let store = store_for(&state, id).await?;

    if let Some(key) = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    {
        if let Some(client) = &state.redis {
            if let Some(existing) = idempotency::redis_get(client, &key).await {
                return Ok(Json(existing));
            }
            let receipt = run_submission(&state, &store).await?;
            let ttl = std::env::var("IDEMPOTENCY_TTL_SECS")
                .ok()
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(3600);
            idempotency::redis_set(client, &key, &receipt, ttl).await;
            return Ok(Json(receipt));
        }
        if let Some(existing) = state.idempotency.lock().await.get(&key).cloned() {
            return Ok(Json(existing));
        }
        let receipt = run_submission(&state, &store).await?;
        state.idempotency.lock().await.insert(key, receipt.clone());
        return Ok(Json(receipt));
    }

    let receipt = run_submission(&state, &store).await?;
    Ok(Json(receipt))
}

async fn run_submission(
    state: &AppState,
    store: &DraftStore<MediaHostClient>,
) -> Result<SubmissionReceipt, AppError> {
    let payload = store.submission_payload().await?;
    let receipt = state.orders.submit(&payload).await?;
    store.finish_submission().await;
    Ok(receipt)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}
