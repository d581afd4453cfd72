use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use recall_index::IndexError;
use recall_protocol::{serialize_json, ErrorEnvelope};
use serde::Serialize;

pub(crate) fn status_for(err: &IndexError) -> StatusCode {
    match err {
        IndexError::EmptyIndex => StatusCode::BAD_REQUEST,
        IndexError::DescriberFailure(_) | IndexError::EmbedderFailure(_) => StatusCode::BAD_GATEWAY,
        IndexError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        IndexError::DimensionMismatch { .. }
        | IndexError::OutOfRange { .. }
        | IndexError::Storage(_)
        | IndexError::InvalidConfig(_)
        | IndexError::ReadOnly(_)
        | IndexError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn error_envelope(code: &str, message: String) -> ErrorEnvelope {
    let hint = match code {
        "empty_index" => Some("Add images with POST /add-image before searching."),
        "invalid_request" => Some("Send multipart/form-data with the image in a 'file' field."),
        "payload_too_large" => Some("Raise the limit with serve-http --max-upload-mb."),
        "describer_failure" | "embedder_failure" | "upstream_timeout" => {
            Some("The upstream model call failed; retrying the request is safe.")
        }
        "dimension_mismatch" => Some(
            "The embedding model changed since the index was created; use another --snapshot-dir.",
        ),
        _ => None,
    };

    let envelope = ErrorEnvelope::new(code, message);
    match hint {
        Some(hint) => envelope.with_hint(hint),
        None => envelope,
    }
}

pub(crate) fn index_error_response(err: &IndexError) -> Response {
    let status = status_for(err);
    if status.is_server_error() {
        log::warn!("Request failed ({}): {err}", err.code());
    } else {
        log::debug!("Request rejected ({}): {err}", err.code());
    }
    build_response(status, &error_envelope(err.code(), err.to_string()))
}

pub(crate) fn invalid_request(message: impl Into<String>) -> Response {
    let message = message.into();
    log::debug!("Invalid request: {message}");
    build_response(
        StatusCode::BAD_REQUEST,
        &error_envelope("invalid_request", message),
    )
}

pub(crate) fn build_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serialize_json(body) {
        Ok(json) => (status, [(CONTENT_TYPE, "application/json")], json).into_response(),
        Err(err) => {
            log::error!("Failed to serialize response: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
