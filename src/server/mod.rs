//! HTTP front end.
//!
//! Serves the recommendation page (title dropdown, Recommend action, results
//! in rows of three with a retailer search button per book) and a small JSON
//! API over the same recommender. All shared state is immutable after
//! startup, so handlers only need an `Arc`.

pub mod handlers;
pub mod views;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::signal;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::models::RecommendedBook;
use crate::recommend::{RecommendError, Recommender};
use views::Views;

/// Books per display row.
pub const BOOKS_PER_ROW: usize = 3;

/// Errors that can occur while starting or running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Templates failed to compile
    #[error("Template error: {0}")]
    TemplateError(String),

    /// Listener could not be bound
    #[error("Initialization error: {0}")]
    InitializationError(String),

    /// The serve loop failed
    #[error("Server error: {0}")]
    Other(String),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Network settings for the HTTP front end.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Directory served under `/static`
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            static_dir: PathBuf::from("static"),
        }
    }
}

impl ServerConfig {
    /// Read `BOOKREC_HOST`, `BOOKREC_PORT` and `BOOKREC_STATIC_DIR`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(host) = lookup("BOOKREC_HOST") {
            config.host = host;
        }
        if let Some(val) = lookup("BOOKREC_PORT") {
            match val.parse::<u16>() {
                Ok(port) => config.port = port,
                Err(_) => warn!(
                    "Ignoring BOOKREC_PORT={:?}: not a port number, using {}",
                    val, config.port
                ),
            }
        }
        if let Some(dir) = lookup("BOOKREC_STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }

        config
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// State shared by every handler.
pub struct AppState {
    /// The recommender answering requests
    pub recommender: Arc<dyn Recommender>,

    /// Compiled page templates
    views: Views,
}

impl AppState {
    /// Wrap a recommender and compile the templates.
    ///
    /// # Errors
    /// Returns `ServerError::TemplateError` if a template fails to compile
    pub fn new(recommender: Arc<dyn Recommender>) -> ServerResult<Self> {
        Ok(Self {
            recommender,
            views: Views::new()?,
        })
    }

    pub fn views(&self) -> &Views {
        &self.views
    }
}

/// Handler state type.
pub type SharedState = Arc<AppState>;

/// Request body for `POST /api/recommend`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendRequest {
    /// Exact title from the title list
    pub title: String,
}

/// One recommended book as rendered or returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookCard {
    pub title: String,
    pub author: String,
    pub year: String,
    pub cover_url: Option<String>,
    pub search_url: String,
    pub distance: f32,
}

impl From<RecommendedBook> for BookCard {
    fn from(book: RecommendedBook) -> Self {
        Self {
            author: book.author_or_unknown().to_string(),
            year: book.year_or_unknown().to_string(),
            cover_url: book.cover_url().map(str::to_string),
            title: book.title,
            search_url: book.search_url,
            distance: book.distance,
        }
    }
}

/// Response body for `POST /api/recommend`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendResponse {
    /// The title that was asked for
    pub query: String,

    /// Number of results
    pub count: usize,

    /// Recommended books, nearest first, the query book included
    pub results: Vec<BookCard>,
}

/// Response body for `GET /api/titles`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitlesResponse {
    pub titles: Vec<String>,
    pub count: usize,
}

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub titles: usize,
}

/// Structured error body returned by the API.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable message
    pub message: String,
}

/// Handler error with an HTTP status and error code.
#[derive(Debug)]
pub enum AppError {
    /// Request failed validation (400)
    InvalidInput { field: String, reason: String },

    /// Title is not in the title list (404)
    TitleNotFound(String),

    /// Anything else (500)
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "INVALID_INPUT",
            Self::TitleNotFound(_) => "TITLE_NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Self::TitleNotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::InvalidInput { field, reason } => {
                format!("Invalid input for field '{field}': {reason}")
            }
            Self::TitleNotFound(title) => format!("Book not found in the dataset: {title}"),
            Self::Internal(msg) => format!("Internal error: {msg}"),
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.code().to_string(),
            message: self.message(),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AppError {}

impl From<RecommendError> for AppError {
    fn from(err: RecommendError) -> Self {
        match err {
            RecommendError::TitleNotFound(title) => Self::TitleNotFound(title),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Self::Internal(msg) = &self {
            error!("Request failed: {}", msg);
        }
        (self.status_code(), Json(self.to_response())).into_response()
    }
}

/// Group items into display rows of `per_row`, the last row possibly shorter.
pub fn rows_of<T: Clone>(items: &[T], per_row: usize) -> Vec<Vec<T>> {
    items.chunks(per_row.max(1)).map(<[T]>::to_vec).collect()
}

/// Build the router. `static_dir`, when set, is served under `/static`.
pub fn build_router(state: SharedState, static_dir: Option<&Path>) -> Router {
    let router = Router::new()
        .route("/", get(handlers::index))
        .route("/recommend", get(handlers::recommend_page))
        .route("/api/titles", get(handlers::list_titles))
        .route("/api/recommend", post(handlers::recommend))
        .route("/health", get(handlers::health));

    let router = match static_dir {
        Some(dir) => router.nest_service("/static", ServeDir::new(dir)),
        None => router,
    };

    router.with_state(state)
}

/// Bind and serve until Ctrl+C or SIGTERM.
///
/// # Errors
/// Returns `ServerError` if the address cannot be bound or the serve loop
/// fails
pub async fn serve(config: &ServerConfig, state: SharedState) -> ServerResult<()> {
    let app = build_router(state, Some(&config.static_dir));
    let addr = config.bind_addr();

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ServerError::InitializationError(format!("bind {}: {}", addr, e)))?;

    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Other(e.to_string()))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
