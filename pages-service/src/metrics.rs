use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

const AUTH_ERROR_CODES: &[&str] = &[
    "malformed_token",
    "unknown_signing_key",
    "invalid_signature",
    "token_expired",
    "wrong_token_purpose",
    "audience_mismatch",
    "issuer_mismatch",
    "missing_credential",
    "missing_claim",
    "key_fetch_timeout",
    "key_provider_unavailable",
];

#[derive(Clone)]
pub struct ServiceMetrics {
    registry: Registry,
    auth_rejections: IntCounterVec,
    page_requests: IntCounterVec,
    http_errors: IntCounterVec,
}

impl ServiceMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let auth_rejections = IntCounterVec::new(
            Opts::new(
                "auth_rejections_total",
                "Requests rejected by the authorization gate, by error code",
            ),
            &["code"],
        )?;
        registry.register(Box::new(auth_rejections.clone()))?;

        let page_requests = IntCounterVec::new(
            Opts::new("pages_requests_total", "Page operations served"),
            &["operation"],
        )?;
        registry.register(Box::new(page_requests.clone()))?;

        let http_errors = IntCounterVec::new(
            Opts::new("http_errors_total", "Error responses by code and status"),
            &["code", "status"],
        )?;
        registry.register(Box::new(http_errors.clone()))?;

        Ok(Self {
            registry,
            auth_rejections,
            page_requests,
            http_errors,
        })
    }

    pub fn page_request(&self, operation: &str) {
        self.page_requests.with_label_values(&[operation]).inc();
    }

    pub fn auth_rejection(&self, code: &str) {
        self.auth_rejections.with_label_values(&[code]).inc();
    }

    pub fn auth_rejections(&self, code: &str) -> u64 {
        self.auth_rejections.with_label_values(&[code]).get()
    }

    pub fn page_requests(&self, operation: &str) -> u64 {
        self.page_requests.with_label_values(&[operation]).get()
    }

    fn record_error(&self, code: &str, status: StatusCode) {
        self.http_errors
            .with_label_values(&[code, status.as_str()])
            .inc();
        if AUTH_ERROR_CODES.contains(&code) {
            self.auth_rejection(code);
        }
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}

/// Counts error responses using the `X-Error-Code` header set by the error types.
pub async fn track_http_errors(
    State(metrics): State<Arc<ServiceMetrics>>,
    req: Request,
    next: Next,
) -> Response {
    let resp = next.run(req).await;
    let status = resp.status();
    if status.is_client_error() || status.is_server_error() {
        let code = resp
            .headers()
            .get("x-error-code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        metrics.record_error(code, status);
    }
    resp
}
