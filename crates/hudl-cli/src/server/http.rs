// Copyright 2024-2026 The hudl authors
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Development HTTP server: the render endpoint, health/introspection APIs,
//! the live-reload event stream and preview-data persistence.
//!
//! Every request pins one registry snapshot at entry and uses it for its
//! whole lifetime, so a concurrent reload never tears a render.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use futures_util::Stream;
use hudl::{decode_message, ComponentLookup, HudlError, Registry, RegistrySnapshot, Renderer, Value};
use serde::Deserialize;
use serde_json::json;
use time::format_description::well_known::Rfc3339;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::preview;

/// Header naming the component to render.
pub const COMPONENT_HEADER: &str = "x-hudl-component";
/// Response header carrying the render wall-clock time.
pub const RENDER_TIME_HEADER: &str = "x-hudl-render-time-ms";

/// Shared application state for the development server.
pub struct AppState {
    /// The template registry.
    pub registry: Arc<Registry>,
    /// Reload notifications, one component name per event.
    pub reload_tx: Arc<broadcast::Sender<String>>,
    /// Application configuration.
    pub config: Config,
}

/// Builds the axum application.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/render", axum::routing::post(render_handler))
        .route("/health", get(health_handler))
        .route("/events", get(events_handler))
        .route("/api/components", get(components_handler))
        .route(
            "/api/preview-files/:component",
            get(preview_files_handler).post(preview_create_handler),
        )
        .route(
            "/api/preview-data/:component",
            get(preview_data_get).put(preview_data_put),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Creates and starts the development HTTP server.
pub async fn create_server(addr: &str, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn error_body(status: StatusCode, message: &str, file: &str, line: usize, column: usize) -> Response {
    let body = json!({
        "error": message,
        "file": file,
        "line": line,
        "column": column,
    });
    (status, Json(body)).into_response()
}

fn hudl_error_response(status: StatusCode, err: &HudlError, file: &str) -> Response {
    let (line, column) = err.location().unwrap_or((0, 0));
    error_body(status, &err.to_string(), file, line, column)
}

async fn render_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(component_name) = headers
        .get(COMPONENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        return error_body(
            StatusCode::BAD_REQUEST,
            "missing X-Hudl-Component header",
            "",
            0,
            0,
        );
    };

    let snapshot = state.registry.snapshot();
    let Some(resolved) = snapshot.documents.resolve(None, &component_name) else {
        return error_body(
            StatusCode::NOT_FOUND,
            &format!("unknown component {component_name:?}"),
            "",
            0,
            0,
        );
    };

    let document_name = resolved.document.to_string();
    let data_type = resolved.component.data_type.clone();
    let file = snapshot
        .documents
        .document(&document_name)
        .and_then(|d| d.path.as_ref())
        .map(|p| p.display().to_string())
        .unwrap_or_default();

    let input = match &data_type {
        Some(ty) if !body.is_empty() => {
            match decode_message(&body, ty, resolved.schema) {
                Ok(value) => value,
                Err(e) => return hudl_error_response(StatusCode::BAD_REQUEST, &e, &file),
            }
        }
        _ => Value::Null,
    };

    let started = Instant::now();
    let deadline = Duration::from_millis(state.config.render.deadline_ms);
    let rendered = Renderer::new(&snapshot.documents)
        .with_deadline(deadline)
        .render(&component_name, input);
    let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

    let rendered = match rendered {
        Ok(rendered) => rendered,
        Err(e) => return hudl_error_response(StatusCode::BAD_REQUEST, &e, &file),
    };

    for error in &rendered.errors {
        tracing::warn!(component = %component_name, "{error}");
    }
    tracing::debug!(component = %component_name, elapsed_ms, "rendered");

    let is_page = snapshot
        .documents
        .resolve(None, &component_name)
        .map(|r| r.component.is_page())
        .unwrap_or(false);
    let html = if is_page {
        inject_livereload(&rendered.html)
    } else {
        rendered.html
    };

    (
        [
            (header::CONTENT_TYPE.as_str(), "text/html; charset=utf-8".to_string()),
            (RENDER_TIME_HEADER, format!("{elapsed_ms:.3}")),
        ],
        html,
    )
        .into_response()
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let snapshot = state.registry.snapshot();
    let last_reload = snapshot
        .last_reload
        .format(&Rfc3339)
        .unwrap_or_else(|_| snapshot.last_reload.unix_timestamp().to_string());
    Json(json!({
        "status": "ok",
        "templates_loaded": snapshot.documents.component_count(),
        "last_reload": last_reload,
    }))
}

async fn events_handler(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.reload_tx.subscribe();
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(component) => {
                    let payload = json!({ "type": "reload", "component": component });
                    return Some((Ok(Event::default().data(payload.to_string())), rx));
                }
                // Slow subscribers skip missed events rather than erroring.
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn components_handler(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let snapshot = state.registry.snapshot();
    let components: Vec<serde_json::Value> = snapshot
        .documents
        .components()
        .map(|(doc, component)| {
            json!({
                "name": component.name,
                "file": doc.path.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
                "data_type": component.data_type,
            })
        })
        .collect();
    Json(json!(components))
}

#[derive(Deserialize)]
struct PreviewQuery {
    #[serde(default)]
    label: String,
}

/// Finds the document defining a component in the pinned snapshot.
fn find_component(
    snapshot: &RegistrySnapshot,
    name: &str,
) -> Option<(Arc<hudl::Document>, Option<String>)> {
    snapshot.documents.documents().find_map(|doc| {
        doc.component(name)
            .map(|c| (doc.clone(), c.data_type.clone()))
    })
}

async fn preview_files_handler(
    State(state): State<Arc<AppState>>,
    UrlPath(component): UrlPath<String>,
) -> Response {
    let snapshot = state.registry.snapshot();
    let Some((doc, _)) = find_component(&snapshot, &component) else {
        return error_body(StatusCode::NOT_FOUND, "unknown component", "", 0, 0);
    };
    Json(json!(preview::list_previews(&doc, &component))).into_response()
}

#[derive(Deserialize)]
struct CreatePreview {
    label: String,
}

async fn preview_create_handler(
    State(state): State<Arc<AppState>>,
    UrlPath(component): UrlPath<String>,
    Json(request): Json<CreatePreview>,
) -> Response {
    let snapshot = state.registry.snapshot();
    let Some((doc, data_type)) = find_component(&snapshot, &component) else {
        return error_body(StatusCode::NOT_FOUND, "unknown component", "", 0, 0);
    };

    let content = preview::default_content(data_type.as_deref(), &doc.schema);
    match preview::write_preview(&doc, &component, &request.label, &content) {
        Ok(path) => Json(json!({
            "label": request.label,
            "file": path.display().to_string(),
        }))
        .into_response(),
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string(), "", 0, 0),
    }
}

async fn preview_data_get(
    State(state): State<Arc<AppState>>,
    UrlPath(component): UrlPath<String>,
    Query(query): Query<PreviewQuery>,
) -> Response {
    let snapshot = state.registry.snapshot();
    let Some((doc, data_type)) = find_component(&snapshot, &component) else {
        return error_body(StatusCode::NOT_FOUND, "unknown component", "", 0, 0);
    };

    match preview::read_or_create(&doc, &component, &query.label, data_type.as_deref(), &doc.schema)
    {
        Ok(content) => (
            [(header::CONTENT_TYPE.as_str(), "text/plain; charset=utf-8")],
            content,
        )
            .into_response(),
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string(), "", 0, 0),
    }
}

async fn preview_data_put(
    State(state): State<Arc<AppState>>,
    UrlPath(component): UrlPath<String>,
    Query(query): Query<PreviewQuery>,
    body: String,
) -> Response {
    let snapshot = state.registry.snapshot();
    let Some((doc, data_type)) = find_component(&snapshot, &component) else {
        return error_body(StatusCode::NOT_FOUND, "unknown component", "", 0, 0);
    };

    // Validate against the declared type before persisting.
    if let Some(message) = data_type.as_deref().and_then(|ty| doc.schema.message(ty)) {
        if let Err(e) = hudl::schema::textpb::parse_text(&body, message, &doc.schema) {
            return hudl_error_response(StatusCode::BAD_REQUEST, &e, "");
        }
    }

    match preview::write_preview(&doc, &component, &query.label, &body) {
        Ok(path) => Json(json!({ "file": path.display().to_string() })).into_response(),
        Err(e) => error_body(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string(), "", 0, 0),
    }
}

/// The live-reload client: connects to `/events` and reloads on any reload
/// message. Injected just before `</body>` on full-page renders only.
const LIVERELOAD_SCRIPT: &str = r#"
<script>
(function() {
    const source = new EventSource('/events');
    source.onmessage = function(event) {
        try {
            if (JSON.parse(event.data).type === 'reload') {
                window.location.reload();
            }
        } catch (_) {}
    };
    source.onerror = function() {
        source.close();
        setTimeout(function() { window.location.reload(); }, 1000);
    };
})();
</script>
"#;

fn inject_livereload(html: &str) -> String {
    if let Some(pos) = html.to_lowercase().rfind("</body>") {
        let mut result = html.to_string();
        result.insert_str(pos, LIVERELOAD_SCRIPT);
        result
    } else if let Some(pos) = html.to_lowercase().rfind("</html>") {
        let mut result = html.to_string();
        result.insert_str(pos, LIVERELOAD_SCRIPT);
        result
    } else {
        format!("{html}{LIVERELOAD_SCRIPT}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn livereload_injects_before_body_close() {
        let html = "<html><body><p>hi</p></body></html>";
        let injected = inject_livereload(html);
        assert!(injected.contains("EventSource('/events')"));
        assert!(injected.ends_with("</body></html>"));
        let script_pos = injected.find("<script>").unwrap();
        let body_close = injected.rfind("</body>").unwrap();
        assert!(script_pos < body_close);
    }

    #[test]
    fn livereload_appends_without_body() {
        let injected = inject_livereload("<p>fragment</p>");
        assert!(injected.starts_with("<p>fragment</p>"));
        assert!(injected.contains("EventSource"));
    }
}
