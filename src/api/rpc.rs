//! `/api/rpc`: rate-limited JSON-RPC passthrough to the Shape node.
//!
//! Responses use the bare `{error, message, details}` shape that wallet
//! providers expect instead of the `ApiResponse` envelope.

use axum::{
    body::Bytes,
    extract::State,
    http::{
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, RETRY_AFTER,
        },
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use super::AppState;
use crate::{constants::RATE_LIMIT_UNKNOWN_CLIENT, services::ForwardError};

#[derive(Debug, Serialize)]
pub struct RpcErrorBody {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Every way a proxied call can fail before or after reaching the upstream.
#[derive(Debug)]
pub enum ProxyRejection {
    RateLimited { retry_after_secs: u64 },
    InvalidBody(String),
    Upstream(ForwardError),
}

impl IntoResponse for ProxyRejection {
    fn into_response(self) -> Response {
        let mut retry_after = None;
        let (status, body) = match self {
            ProxyRejection::RateLimited { retry_after_secs } => {
                retry_after = Some(retry_after_secs);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    RpcErrorBody {
                        error: "Too many requests".to_string(),
                        message: "Rate limit exceeded. Please try again later.".to_string(),
                        details: None,
                    },
                )
            }
            ProxyRejection::InvalidBody(message) => (
                StatusCode::BAD_REQUEST,
                RpcErrorBody {
                    error: "Invalid JSON-RPC request body".to_string(),
                    message,
                    details: None,
                },
            ),
            ProxyRejection::Upstream(ForwardError::Forbidden { details }) => (
                StatusCode::FORBIDDEN,
                RpcErrorBody {
                    error: "RPC access forbidden".to_string(),
                    message: "The RPC endpoint requires authentication or has access restrictions"
                        .to_string(),
                    details: Some(details),
                },
            ),
            ProxyRejection::Upstream(ForwardError::UpstreamStatus {
                status,
                status_text,
                details,
            }) => (
                status,
                RpcErrorBody {
                    error: "RPC request failed".to_string(),
                    message: status_text,
                    details: Some(details),
                },
            ),
            ProxyRejection::Upstream(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                RpcErrorBody {
                    error: "Failed to proxy RPC request".to_string(),
                    message: err.to_string(),
                    details: None,
                },
            ),
        };

        let mut response = (status, Json(body)).into_response();
        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        if let Some(secs) = retry_after {
            headers.insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Limiter key for a caller: first `x-forwarded-for` hop, else `x-real-ip`,
/// else the shared unknown bucket.
pub fn client_key(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    if let Some(first) = header("x-forwarded-for")
        .and_then(|raw| raw.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        return first.to_string();
    }
    header("x-real-ip")
        .map(str::to_string)
        .unwrap_or_else(|| RATE_LIMIT_UNKNOWN_CLIENT.to_string())
}

fn with_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

/// POST /api/rpc
pub async fn proxy_rpc(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProxyRejection> {
    let client = client_key(&headers);
    let decision = state.limiter.check(&client).await;
    if !decision.allowed {
        return Err(ProxyRejection::RateLimited {
            retry_after_secs: state.limiter.window_secs(),
        });
    }

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ProxyRejection::InvalidBody(e.to_string()))?;

    let method = payload
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or("batch");
    tracing::debug!(
        "rpc proxy client={} method={} count={}",
        client,
        method,
        decision.count
    );

    let reply = state
        .forwarder
        .forward(&payload)
        .await
        .map_err(ProxyRejection::Upstream)?;
    Ok(with_cors(Json(reply).into_response()))
}

/// OPTIONS /api/rpc
pub async fn rpc_preflight() -> Response {
    with_cors(StatusCode::OK.into_response())
}
