use crate::http_api::{build_response, error_envelope, index_error_response, invalid_request};
use crate::server_security;
use anyhow::{Context as AnyhowContext, Result};
use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Query, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use recall_index::{IndexManager, DEFAULT_TOP_K};
use recall_protocol::{DescribeResponse, HealthResponse};
use std::collections::HashMap;
use std::sync::Arc;

pub(crate) const DEFAULT_UPLOAD_LABEL: &str = "uploaded";

struct HttpState {
    manager: Arc<IndexManager>,
}

/// Routes of the image index API over a shared manager.
pub fn build_router(manager: Arc<IndexManager>, max_upload_bytes: usize) -> Router {
    let state = Arc::new(HttpState { manager });
    Router::new()
        .route("/describe-image", post(describe_image))
        .route("/add-image", post(add_image))
        .route("/search-images", post(search_images))
        .route("/index-stats", get(index_stats))
        .route("/index-list", get(index_list))
        .route("/checkpoint", post(checkpoint))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

pub(crate) async fn serve(
    manager: Arc<IndexManager>,
    bind: &str,
    public: bool,
    max_upload_bytes: usize,
) -> Result<()> {
    let addrs = server_security::resolve_guarded_bind_addrs(bind, public).await?;

    let app = build_router(manager.clone(), max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    let local_addr = listener.local_addr()?;
    let base_url = format!("http://{local_addr}");

    crate::print_stdout(&format!("Serving image index API: {base_url}"))?;
    if public {
        let addrs = addrs
            .iter()
            .map(|a| a.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        crate::print_stdout(&format!(
            "Public bind enabled (--public). Resolved addresses: {addrs}"
        ))?;
    }
    crate::print_stdout(&format!("Try: curl {base_url}/health"))?;
    crate::print_stdout(&format!(
        "Try: curl -F file=@1_dish.jpg {base_url}/add-image"
    ))?;

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;
    manager.shutdown().await;
    served.context("HTTP server failed")
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM. A handler that cannot be
/// installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                log::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    log::info!("Shutdown requested, saving index");
}

struct Upload {
    file: Bytes,
    file_name: Option<String>,
    fields: HashMap<String, String>,
}

impl Upload {
    fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, Response> {
    let mut file = None;
    let mut file_name = None;
    let mut fields = HashMap::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            file_name = field.file_name().map(str::to_string);
            file = Some(field.bytes().await.map_err(multipart_error)?);
        } else {
            let value = field.text().await.map_err(multipart_error)?;
            fields.insert(name, value);
        }
    }

    let file = file.ok_or_else(|| invalid_request("Missing multipart field 'file'"))?;
    if file.is_empty() {
        return Err(invalid_request("Uploaded file is empty"));
    }
    Ok(Upload {
        file,
        file_name,
        fields,
    })
}

fn multipart_error(err: MultipartError) -> Response {
    let status = err.status();
    let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
        "payload_too_large"
    } else {
        "invalid_request"
    };
    log::debug!("Rejected upload ({status}): {}", err.body_text());
    build_response(status, &error_envelope(code, err.body_text()))
}

async fn describe_image(State(state): State<Arc<HttpState>>, multipart: Multipart) -> Response {
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(response) => return response,
    };
    match state.manager.describe(&upload.file).await {
        Ok(description) => build_response(StatusCode::OK, &DescribeResponse { description }),
        Err(err) => index_error_response(&err),
    }
}

async fn add_image(State(state): State<Arc<HttpState>>, multipart: Multipart) -> Response {
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(response) => return response,
    };
    let label = upload
        .field("image_path")
        .map(str::to_string)
        .or_else(|| upload.file_name.clone().filter(|n| !n.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_UPLOAD_LABEL.to_string());

    match state.manager.add(upload.file, &label).await {
        Ok(result) => build_response(StatusCode::OK, &result),
        Err(err) => index_error_response(&err),
    }
}

async fn search_images(
    State(state): State<Arc<HttpState>>,
    Query(query): Query<HashMap<String, String>>,
    multipart: Multipart,
) -> Response {
    let upload = match read_upload(multipart).await {
        Ok(upload) => upload,
        Err(response) => return response,
    };
    let raw_top_k = upload
        .field("top_k")
        .or_else(|| query.get("top_k").map(String::as_str));
    let top_k = match parse_top_k(raw_top_k) {
        Ok(top_k) => top_k,
        Err(message) => return invalid_request(message),
    };

    match state.manager.search(&upload.file, top_k).await {
        Ok(result) => build_response(StatusCode::OK, &result),
        Err(err) => index_error_response(&err),
    }
}

fn parse_top_k(raw: Option<&str>) -> Result<usize, String> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_TOP_K);
    };
    match raw.trim().parse::<usize>() {
        Ok(0) => Err("top_k must be at least 1".to_string()),
        Ok(top_k) => Ok(top_k),
        Err(_) => Err(format!("top_k must be a positive integer, got '{raw}'")),
    }
}

async fn index_stats(State(state): State<Arc<HttpState>>) -> Response {
    build_response(StatusCode::OK, &state.manager.stats().await)
}

async fn index_list(State(state): State<Arc<HttpState>>) -> Response {
    build_response(StatusCode::OK, &state.manager.list().await)
}

async fn checkpoint(State(state): State<Arc<HttpState>>) -> Response {
    match state.manager.checkpoint().await {
        Ok(outcome) => build_response(StatusCode::OK, &outcome),
        Err(err) => index_error_response(&err),
    }
}

async fn health(State(state): State<Arc<HttpState>>) -> Response {
    let size = state.manager.stats().await.size;
    build_response(StatusCode::OK, &HealthResponse::ok(size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_k_defaults_and_validates() {
        assert_eq!(parse_top_k(None), Ok(DEFAULT_TOP_K));
        assert_eq!(parse_top_k(Some(" 3 ")), Ok(3));
        assert!(parse_top_k(Some("0")).is_err());
        assert!(parse_top_k(Some("-1")).is_err());
        assert!(parse_top_k(Some("many")).is_err());
    }
}
