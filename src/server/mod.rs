//! HTTP front end: an upload form, an upload endpoint and a health check.
//!
//! ```text
//! GET  /        upload form, shows one pending flash message
//! POST /upload  multipart `file` field ─▶ STL download, or 303 back to `/`
//! GET  /health  {"status":"healthy", ..., "openscad_available": bool}
//! ```
//!
//! Requests share nothing but the scratch directory and the cached OpenSCAD
//! location; every file a request creates is named after its own UUID.

pub mod error;
pub mod flash;
pub mod handlers;
pub mod scratch;

use crate::config::ServerConfig;
use crate::convert::Converter;
use crate::error::Svg2StlError;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use flash::FlashKey;
use minijinja::{context, Environment};
use std::future::Future;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

const INDEX_TEMPLATE: &str = "index.html";

/// Shared, cheaply cloned application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub converter: Arc<Converter>,
    pub flash: FlashKey,
    templates: Arc<Environment<'static>>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Result<Self, Svg2StlError> {
        let flash = FlashKey::new(&config.secret_key)
            .map_err(|e| Svg2StlError::InvalidConfig(format!("secret key: {e}")))?;

        let mut templates = Environment::new();
        templates
            .add_template(INDEX_TEMPLATE, include_str!("templates/index.html"))
            .map_err(|e| Svg2StlError::Internal(format!("template: {e}")))?;

        Ok(Self {
            converter: Arc::new(Converter::new(config.conversion.clone())),
            config: Arc::new(config),
            flash,
            templates: Arc::new(templates),
        })
    }

    /// Render the upload form. `message` is HTML-escaped.
    pub fn render_index(&self, message: Option<&str>) -> Result<String, minijinja::Error> {
        self.templates.get_template(INDEX_TEMPLATE)?.render(context! {
            message => message,
            height => self.config.conversion.extrude_height,
            max_upload_mb => self.config.max_upload_bytes / (1024 * 1024),
        })
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;
    Router::new()
        .route("/", get(handlers::index))
        .route("/health", get(handlers::health))
        .route(
            "/upload",
            post(handlers::upload).layer(DefaultBodyLimit::max(body_limit)),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Prepare the scratch directory, bind, and serve until `shutdown` resolves.
pub async fn serve<F>(config: ServerConfig, shutdown: F) -> Result<(), Svg2StlError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let swept = scratch::prepare_scratch_dir(&config.scratch_dir, config.stale_after)
        .await
        .map_err(|e| Svg2StlError::io(&config.scratch_dir, e))?;
    info!(
        dir = %config.scratch_dir.display(),
        swept,
        "scratch directory ready"
    );

    let addr = config.bind;
    let state = AppState::new(config)?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| Svg2StlError::Bind { addr, source })?;
    info!("Listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Svg2StlError::Internal(format!("server: {e}")))?;

    info!("Server stopped");
    Ok(())
}
