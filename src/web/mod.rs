//! HTTP front end: upload form, result page, error page.

use std::num::NonZeroU16;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::pipeline::Pipeline;

mod views;

use views::{generate_handler, index_handler};

#[derive(Clone, Debug)]
pub(crate) struct AppState {
    pipeline: Arc<Pipeline>,
}

impl AppState {
    fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

fn create_router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", axum::routing::get(index_handler))
        .route("/generate", axum::routing::post(generate_handler))
        .route("/static/styles.css", axum::routing::get(styles_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
}

async fn styles_handler() -> impl IntoResponse {
    const STYLES: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/static/styles.css"));
    ([(CONTENT_TYPE, "text/css")], STYLES)
}

/// Binds `listen_addr:port` and serves until the process is stopped.
pub async fn setup_server(
    listen_addr: &str,
    port: NonZeroU16,
    pipeline: Pipeline,
    max_upload_bytes: usize,
) -> Result<(), anyhow::Error> {
    let app = create_router(max_upload_bytes).with_state(AppState::new(pipeline));

    let addr = format!("{}:{}", listen_addr, port);
    info!("Starting server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    if let Err(err) = axum::serve(listener, app).await {
        error!("Server error: {}", err);
    }
    Ok(())
}
