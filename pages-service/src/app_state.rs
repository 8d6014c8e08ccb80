use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use common_auth::{AuthGate, JwtVerifier};

use crate::analytics::AnalyticsRepository;
use crate::metrics::ServiceMetrics;
use crate::pages::PageRepository;
use crate::store::KeyValueStore;
use crate::uploads::UploadUrlIssuer;

/// Upload issuer plus the bucket and lifetime it signs for.
#[derive(Clone)]
pub struct UploadSettings {
    pub issuer: Arc<dyn UploadUrlIssuer>,
    pub bucket: String,
    pub ttl: Duration,
}

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AuthGate>,
    pub pages: PageRepository,
    pub analytics: AnalyticsRepository,
    pub uploads: Option<UploadSettings>,
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    pub fn new(
        verifier: Arc<JwtVerifier>,
        store: Arc<dyn KeyValueStore>,
        pages_table: &str,
        analytics_table: &str,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            gate: Arc::new(AuthGate::new(verifier)),
            pages: PageRepository::new(store.clone(), pages_table),
            analytics: AnalyticsRepository::new(store, analytics_table),
            uploads: None,
            metrics,
        }
    }

    pub fn with_uploads(mut self, uploads: UploadSettings) -> Self {
        self.uploads = Some(uploads);
        self
    }
}

impl FromRef<AppState> for Arc<AuthGate> {
    fn from_ref(state: &AppState) -> Self {
        state.gate.clone()
    }
}

impl FromRef<AppState> for Arc<ServiceMetrics> {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}
