//! HTTP API for daftar

use axum::{
    async_trait,
    extract::{
        multipart::MultipartError, DefaultBodyLimit, FromRequestParts, Multipart,
        Path as AxumPath, Query, State,
    },
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::UploadConfig,
    intake::IncomingFile,
    library::{Library, ListParams},
    search::SearchFilters,
    stats::StatsOverview,
    taxonomy::Category,
    types::{Categorization, Document, OwnerId, Page},
};

/// Multipart field carrying uploaded files
const UPLOAD_FIELD: &str = "documents";

pub struct AppState {
    pub library: Arc<Library>,
}

/// The authenticated owner, as passed on by the identity proxy
#[derive(Debug, Clone)]
pub struct Owner(pub OwnerId);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header_name = state.library.config().auth.owner_header.as_str();

        parts
            .headers
            .get(header_name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Owner(v.to_string()))
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Errors returned by handlers
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    BadRequest(String),
    Multipart(MultipartError),
    Library(crate::Error),
}

impl From<crate::Error> for ApiError {
    fn from(err: crate::Error) -> Self {
        ApiError::Library(err)
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Multipart(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Multipart(err) => (err.status(), format!("Multipart error: {}", err.body_text())),
            ApiError::Library(err) => {
                let status = match &err {
                    crate::Error::NotFound(_) => StatusCode::NOT_FOUND,
                    crate::Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
                    crate::Error::UnsupportedFileType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    crate::Error::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("Request failed: {}", err);
                }
                (status, err.to_string())
            }
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizeRequest {
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub documents: Vec<Document>,
    pub count: usize,
}

#[derive(Deserialize)]
pub struct ListQuery {
    category: Option<String>,
    #[serde(default)]
    search: String,
    /// Comma separated
    tags: Option<String>,
    limit: Option<usize>,
    #[serde(default)]
    offset: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub documents: Vec<Document>,
    pub total: usize,
    pub has_more: bool,
}

impl From<Page<Document>> for ListResponse {
    fn from(page: Page<Document>) -> Self {
        Self {
            documents: page.items,
            total: page.total,
            has_more: page.has_more,
        }
    }
}

#[derive(Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    query: String,
    #[serde(default)]
    filters: SearchFilters,
    #[serde(default)]
    offset: usize,
    limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<Document>,
    pub total: usize,
    pub has_more: bool,
    pub query: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryUpdateResponse {
    pub message: String,
    pub document_id: String,
    pub new_category: String,
    pub document: Document,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagsResponse {
    pub message: String,
    pub document_id: String,
    pub tags: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub message: String,
    pub document_id: String,
}

/// Largest multipart body accepted: every file at full size plus framing
fn upload_body_limit(upload: &UploadConfig) -> usize {
    usize::try_from(upload.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_mul(upload.max_files)
        .saturating_add(64 * 1024)
}

/// Build the application router
pub fn router(library: Arc<Library>) -> Router {
    let upload_limit = upload_body_limit(&library.config().upload);
    let state = Arc::new(AppState { library });

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/categories", get(handle_categories))
        .route("/api/categorize", post(handle_categorize))
        .route("/api/documents", get(handle_list))
        .route(
            "/api/documents/upload",
            post(handle_upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/documents/search", post(handle_search))
        .route("/api/documents/stats/overview", get(handle_stats))
        .route("/api/documents/:id", get(handle_get).delete(handle_delete))
        .route("/api/documents/:id/download", get(handle_download))
        .route("/api/documents/:id/category", put(handle_update_category))
        .route("/api/documents/:id/tags", post(handle_add_tags))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Start the web server
pub async fn serve(library: Arc<Library>, port: u16) -> crate::Result<()> {
    let app = router(library.clone());

    let addr = format!("0.0.0.0:{}", port);
    println!("\n📂 daftar server starting...");
    println!("   Local:    http://localhost:{}", port);
    println!("   Network:  http://<your-ip>:{}", port);
    println!("   Press Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    library.persist().await?;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn handle_health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn handle_categories(State(state): State<Arc<AppState>>) -> Json<Vec<Category>> {
    Json(state.library.taxonomy().categories().to_vec())
}

/// Preview the category a file would get, without storing anything
async fn handle_categorize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CategorizeRequest>,
) -> Json<Categorization> {
    Json(state.library.categorizer().categorize_opt(
        req.filename.as_deref(),
        req.mime_type.as_deref().unwrap_or_default(),
    ))
}

async fn handle_upload(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    mut multipart: Multipart,
) -> ApiResult<UploadResponse> {
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue; // ignore unknown fields
        }

        let filename = field.file_name().map(|n| n.to_string());
        let declared_type = field.content_type().map(|c| c.to_string());
        let bytes = field.bytes().await?.to_vec();

        files.push(IncomingFile {
            filename,
            declared_type,
            bytes,
        });
    }

    let documents = state.library.ingest_batch(&owner, files).await?;

    Ok(Json(UploadResponse {
        message: "Documents uploaded successfully".to_string(),
        count: documents.len(),
        documents,
    }))
}

async fn handle_list(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Query(params): Query<ListQuery>,
) -> ApiResult<ListResponse> {
    let tags = params.tags.map(|raw| {
        raw.split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
    });

    let list_params = ListParams {
        query: params.search,
        filters: SearchFilters {
            category: params.category.filter(|c| !c.is_empty()),
            tags,
        },
        offset: params.offset,
        limit: params.limit,
    };

    let page = state.library.list(&owner, &list_params).await;
    Ok(Json(page.into()))
}

async fn handle_search(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    Json(req): Json<SearchRequest>,
) -> ApiResult<SearchResponse> {
    let list_params = ListParams {
        query: req.query,
        filters: req.filters,
        offset: req.offset,
        limit: req.limit,
    };

    let page = state.library.list(&owner, &list_params).await;
    Ok(Json(SearchResponse {
        results: page.items,
        total: page.total,
        has_more: page.has_more,
        query: list_params.query,
    }))
}

async fn handle_stats(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
) -> ApiResult<StatsOverview> {
    Ok(Json(state.library.stats(&owner).await))
}

async fn handle_get(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Document> {
    Ok(Json(state.library.get(&owner, &id).await?))
}

/// Serve a document's stored bytes
async fn handle_download(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    AxumPath(id): AxumPath<String>,
) -> Result<Response, ApiError> {
    let (document, bytes) = state.library.read_content(&owner, &id).await?;

    let filename: String = document
        .name
        .chars()
        .map(|c| if c == '"' || c.is_control() { '_' } else { c })
        .collect();

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, document.mime_type),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn handle_update_category(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    AxumPath(id): AxumPath<String>,
    Json(body): Json<Value>,
) -> ApiResult<CategoryUpdateResponse> {
    let category = body
        .get("category")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Category is required".to_string()))?;

    let document = state.library.recategorize(&owner, &id, category).await?;

    Ok(Json(CategoryUpdateResponse {
        message: "Document category updated successfully".to_string(),
        document_id: id,
        new_category: document.category.clone(),
        document,
    }))
}

async fn handle_add_tags(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    AxumPath(id): AxumPath<String>,
    Json(body): Json<Value>,
) -> ApiResult<TagsResponse> {
    let tags: Vec<String> = body
        .get("tags")
        .and_then(Value::as_array)
        .and_then(|tags| {
            tags.iter()
                .map(|t| t.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
        })
        .ok_or_else(|| ApiError::BadRequest("Tags must be an array".to_string()))?;

    let document = state.library.add_tags(&owner, &id, &tags).await?;

    Ok(Json(TagsResponse {
        message: "Tags added successfully".to_string(),
        document_id: id,
        tags: document.tags,
    }))
}

async fn handle_delete(
    State(state): State<Arc<AppState>>,
    Owner(owner): Owner,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<DeleteResponse> {
    state.library.delete(&owner, &id).await?;

    Ok(Json(DeleteResponse {
        message: "Document deleted successfully".to_string(),
        document_id: id,
    }))
}
