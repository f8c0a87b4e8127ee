// ============================================================================
// Service Client - Forwarding Proxy
// ============================================================================
//
// HTTP client for forwarding admitted requests to the downstream service.
// Handles:
// - Request forwarding (method, path, query, headers, body)
// - Identity propagation (x-user-id, x-request-id)
// - Response relaying
// - Timeout (504) vs. transport failure (502)
//
// ============================================================================

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, Response, header};
use gatekeeper_config::MAX_REQUEST_BODY_SIZE;
use gatekeeper_error::AppError;
use gatekeeper_metrics::{PROXY_REQUEST_DURATION_SECONDS, PROXY_REQUESTS_TOTAL};
use gatekeeper_types::Identity;
use std::time::{Duration, Instant};
use tracing::{debug, error};
use uuid::Uuid;

// Header names for identity propagation (Trust Boundary pattern)
pub const HEADER_USER_ID: &str = "x-user-id";
pub const HEADER_REQUEST_ID: &str = "x-request-id";

/// Connection-scoped headers that must not be forwarded by a proxy
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// HTTP client for forwarding requests to the downstream service
pub struct ServiceClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ServiceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        // Configure connection pooling and keep-alive
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Forward an admitted request on behalf of `identity` and relay the response
    pub async fn forward_request(
        &self,
        identity: &Identity,
        request: Request<Body>,
    ) -> Result<Response<Body>, AppError> {
        // Build target URL
        let path = request.uri().path();
        let target_url = match request.uri().query() {
            Some(query) => format!("{}{}?{}", self.base_url, path, query),
            None => format!("{}{}", self.base_url, path),
        };

        let (parts, body) = request.into_parts();
        let body_bytes = axum::body::to_bytes(body, MAX_REQUEST_BODY_SIZE)
            .await
            .map_err(|_| AppError::PayloadTooLarge(MAX_REQUEST_BODY_SIZE))?;

        let headers = forwarded_headers(&parts.headers, identity)?;

        let mut downstream = self
            .client
            .request(parts.method.clone(), &target_url)
            .headers(headers);
        if !body_bytes.is_empty() {
            downstream = downstream.body(body_bytes);
        }

        let started = Instant::now();
        let result = downstream.send().await;
        PROXY_REQUEST_DURATION_SECONDS.observe(started.elapsed().as_secs_f64());

        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                PROXY_REQUESTS_TOTAL.with_label_values(&["timeout"]).inc();
                error!(
                    target_url = %target_url,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Downstream request timed out"
                );
                return Err(AppError::DownstreamTimeout(self.timeout.as_millis() as u64));
            }
            Err(e) => {
                PROXY_REQUESTS_TOTAL.with_label_values(&["error"]).inc();
                error!(target_url = %target_url, error = %e, "Failed to forward request to downstream");
                return Err(AppError::downstream_unavailable(e.to_string()));
            }
        };

        let status = response.status();
        PROXY_REQUESTS_TOTAL
            .with_label_values(&[status.as_str()])
            .inc();

        let mut relayed = Response::builder().status(status);
        for (key, value) in response.headers().iter() {
            if !is_hop_by_hop(key) {
                relayed = relayed.header(key, value);
            }
        }

        let body_bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                AppError::DownstreamTimeout(self.timeout.as_millis() as u64)
            } else {
                AppError::downstream_unavailable(e.to_string())
            }
        })?;

        debug!(
            method = %parts.method,
            target_url = %target_url,
            status = status.as_u16(),
            user_id = %identity,
            "Request forwarded"
        );

        relayed
            .body(Body::from(body_bytes))
            .map_err(|e| AppError::internal(format!("Failed to build response: {}", e)))
    }
}

/// Headers sent downstream: the client's headers minus host, content-length and
/// hop-by-hop headers, with `x-user-id` overwritten and `x-request-id` ensured
fn forwarded_headers(incoming: &HeaderMap, identity: &Identity) -> Result<HeaderMap, AppError> {
    let mut headers = HeaderMap::with_capacity(incoming.len() + 2);
    for (key, value) in incoming.iter() {
        if *key != header::HOST && *key != header::CONTENT_LENGTH && !is_hop_by_hop(key) {
            headers.append(key.clone(), value.clone());
        }
    }

    // ALWAYS overwrite to prevent injection of a foreign identity
    let user_id = HeaderValue::from_str(identity.as_str())
        .map_err(|_| AppError::internal("identity is not a valid header value"))?;
    headers.insert(HeaderName::from_static(HEADER_USER_ID), user_id);

    if !headers.contains_key(HEADER_REQUEST_ID) {
        let request_id = Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            headers.insert(HeaderName::from_static(HEADER_REQUEST_ID), value);
        }
    }

    Ok(headers)
}
