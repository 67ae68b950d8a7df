use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use classifier::build_classifier;
use gallery_api::{
    gallery_response, render_error_page, render_gallery, GalleryContext, TemplateRenderer,
};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{gallery_route, health_route, GalleryResponse},
};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::load_settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings();
    settings.validate().context("invalid server settings")?;
    let classifier = build_classifier(&settings.classifier_settings())
        .context("failed to set up image classifier")?;
    let renderer = TemplateRenderer::new().context("failed to load gallery templates")?;
    let gallery = GalleryContext {
        source: settings.image_source(),
        classifier,
        failure_policy: settings.failure_policy,
        renderer: Arc::new(renderer),
    };

    if !gallery.source.root.is_dir() {
        warn!(
            root = %gallery.source.root.display(),
            "image directory does not exist; gallery requests will fail until it is created"
        );
    }

    let addr: SocketAddr = settings
        .server_bind
        .parse()
        .with_context(|| format!("invalid bind address '{}'", settings.server_bind))?;
    info!(
        %addr,
        root = %gallery.source.root.display(),
        failure_policy = %gallery.failure_policy,
        "gallery server listening"
    );

    let app = build_router(Arc::new(AppState { gallery }));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    let image_route = format!("/{}", state.gallery.source.public_prefix);
    let images = ServeDir::new(&state.gallery.source.root);

    Router::new()
        .route("/", get(http_gallery_page))
        .route(gallery_route(), get(http_gallery))
        .route(health_route(), get(healthz))
        .nest_service(&image_route, images)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn http_gallery_page(State(state): State<Arc<AppState>>) -> Response {
    match render_gallery(&state.gallery).await {
        Ok(html) => Html(html).into_response(),
        Err(err) => error_page(&state, err),
    }
}

async fn http_gallery(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GalleryResponse>, (StatusCode, Json<ApiError>)> {
    let response = gallery_response(&state.gallery)
        .await
        .map_err(|e| (status_for(e.code), Json(e)))?;
    Ok(Json(response))
}

fn error_page(state: &AppState, err: ApiError) -> Response {
    let status = status_for(err.code);
    match render_error_page(&state.gallery, &err) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(render_err) => {
            error!(error = %render_err, "failed to render error page");
            (status, err.message).into_response()
        }
    }
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Classification => StatusCode::BAD_GATEWAY,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
