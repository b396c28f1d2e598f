//! HTTP surface: the cron trigger plus a read-only view of stored activities.

use std::sync::Arc;

use actsync_core::Activity;
use actsync_storage::ActivityStore;
use actsync_sync::SyncPipeline;
use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{error, info};

pub const CRATE_NAME: &str = "actsync-web";

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SyncPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<SyncPipeline>) -> Self {
        Self { pipeline }
    }
}

#[derive(Template)]
#[template(path = "activities.html")]
struct ActivitiesTemplate {
    total: usize,
    activities_json: String,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/api/cron", get(cron_handler))
        .route("/api/activities", get(activities_handler))
        .with_state(Arc::new(state))
}

pub fn web_port_from_env() -> u16 {
    std::env::var("ACTSYNC_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000)
}

pub async fn serve(pipeline: Arc<SyncPipeline>, port: u16) -> anyhow::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "serving activity sync http api");
    axum::serve(listener, app(AppState::new(pipeline))).await?;
    Ok(())
}

/// Run one sync and answer with its outcome. The run executes on its own task
/// so a panic inside it becomes a 500 rather than a dropped connection.
async fn cron_handler(State(state): State<Arc<AppState>>) -> Response {
    let pipeline = state.pipeline.clone();
    let outcome = tokio::spawn(async move { pipeline.run_once().await }).await;

    match outcome {
        Ok(Ok(summary)) => {
            let mut body = serde_json::to_value(&summary).unwrap_or_else(|_| json!({}));
            if let Value::Object(map) = &mut body {
                map.insert("message".into(), json!("Crawling completed successfully"));
            }
            (StatusCode::OK, Json(body)).into_response()
        }
        Ok(Err(err)) => crawl_failed(err.to_string()),
        Err(join_err) => {
            error!(error = %join_err, "sync run task aborted");
            crawl_failed(format!("sync run aborted: {join_err}"))
        }
    }
}

fn crawl_failed(error: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "Crawling failed", "error": error })),
    )
        .into_response()
}

async fn activities_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.pipeline.store().list().await {
        Ok(activities) => Json(activities).into_response(),
        Err(err) => server_error(anyhow::Error::new(err)),
    }
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.pipeline.store().list().await {
        Ok(activities) => match render_activities(&activities) {
            Ok(tpl) => render_html(tpl),
            Err(err) => server_error(err),
        },
        Err(err) => server_error(anyhow::Error::new(err)),
    }
}

fn render_activities(activities: &[Activity]) -> anyhow::Result<ActivitiesTemplate> {
    Ok(ActivitiesTemplate {
        total: activities.len(),
        activities_json: serde_json::to_string_pretty(activities)?,
    })
}

fn render_html<T: Template>(tpl: T) -> Response {
    match tpl.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => server_error(anyhow::anyhow!(err.to_string())),
    }
}

fn server_error(err: anyhow::Error) -> Response {
    error!(error = %err, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(format!("Server error: {}", err)),
    )
        .into_response()
}
