//! HTTP client for the VeriNews verification service.
//!
//! One JSON `POST` per operation: `/ingest`, `/claims`, `/evidence`, `/verify`,
//! plus `GET /health`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use verinews_core::{EvidenceItem, Verdict, VerifyError};

use crate::service::{IngestResponse, VerificationService};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Longest raw (non-JSON) error body passed through as a message.
const MAX_RAW_DETAIL: usize = 200;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service root like `http://localhost:8000` (trailing slash is trimmed).
    pub base_url: String,
    /// Per-request timeout covering connect, send and body read.
    pub timeout: Duration,
    /// Honour `HTTP_PROXY`/`HTTPS_PROXY` from the environment.
    pub proxy_from_env: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            proxy_from_env: true,
        }
    }
}

/// reqwest-backed [`VerificationService`].
pub struct HttpVerificationClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct IngestRequest<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct ClaimsRequest<'a> {
    content: &'a str,
}

#[derive(Deserialize)]
struct ClaimsResponse {
    #[serde(default)]
    claims: Vec<String>,
}

#[derive(Serialize)]
struct EvidenceRequest<'a> {
    claim: &'a str,
}

#[derive(Deserialize)]
struct EvidenceResponse {
    #[serde(default)]
    evidence: Vec<EvidenceItem>,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    claim: &'a str,
    evidence: &'a [EvidenceItem],
}

#[derive(Deserialize)]
struct VerdictPayload {
    verdict: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    confidence: Option<f32>,
}

impl HttpVerificationClient {
    pub fn new(config: ClientConfig) -> Result<Self, VerifyError> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout);
        if !config.proxy_from_env {
            builder = builder.no_proxy();
        }
        let client = builder.build().map_err(classify_transport)?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, op: &'static str, body: &B) -> Result<R, VerifyError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, op);
        debug!(url = %url, "posting to verification service");
        self.send(op, self.client.post(&url).json(body)).await
    }

    async fn get<R: DeserializeOwned>(&self, op: &'static str) -> Result<R, VerifyError> {
        let url = format!("{}/{}", self.base_url, op);
        debug!(url = %url, "querying verification service");
        self.send(op, self.client.get(&url)).await
    }

    async fn send<R: DeserializeOwned>(
        &self,
        op: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<R, VerifyError> {
        let resp = request.send().await.map_err(classify_transport)?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = resp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok());
            warn!(op, retry_after_secs, "rate limited");
            return Err(VerifyError::RateLimited { retry_after_secs });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = service_message(status.as_u16(), &body);
            warn!(op, status = status.as_u16(), message = %message, "service returned an error");
            return Err(VerifyError::service(Some(status.as_u16()), message));
        }

        let bytes = resp.bytes().await.map_err(classify_transport)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            VerifyError::service(Some(status.as_u16()), format!("malformed {op} response: {e}"))
        })
    }
}

#[async_trait]
impl VerificationService for HttpVerificationClient {
    async fn health(&self) -> Result<(), VerifyError> {
        let resp: HealthResponse = self.get("health").await?;
        if resp.status != "ok" {
            warn!(status = %resp.status, "service reports unhealthy");
            return Err(VerifyError::service(
                Some(StatusCode::OK.as_u16()),
                format!("service reports status {:?}", resp.status),
            ));
        }
        info!(url = %self.base_url, "service healthy");
        Ok(())
    }

    async fn ingest(&self, text: &str) -> Result<IngestResponse, VerifyError> {
        if text.trim().is_empty() {
            return Err(VerifyError::Validation("article text is empty".into()));
        }
        let resp: IngestResponse = self.post("ingest", &IngestRequest { text }).await?;
        info!(chars = resp.content.chars().count(), "ingested article");
        Ok(resp)
    }

    async fn extract_claims(&self, content: &str) -> Result<Vec<String>, VerifyError> {
        let resp: ClaimsResponse = self.post("claims", &ClaimsRequest { content }).await?;
        info!(count = resp.claims.len(), "extracted claims");
        Ok(resp.claims)
    }

    async fn fetch_evidence(&self, claim: &str) -> Result<Vec<EvidenceItem>, VerifyError> {
        let resp: EvidenceResponse = self.post("evidence", &EvidenceRequest { claim }).await?;
        let received = resp.evidence.len();
        let evidence: Vec<EvidenceItem> = resp
            .evidence
            .into_iter()
            .filter(|item| match reqwest::Url::parse(&item.url) {
                Ok(_) => true,
                Err(e) => {
                    warn!(url = %item.url, title = %item.title, error = %e, "dropping evidence with invalid url");
                    false
                }
            })
            .collect();
        info!(received, kept = evidence.len(), "fetched evidence");
        Ok(evidence)
    }

    async fn verify(&self, claim: &str, evidence: &[EvidenceItem]) -> Result<Verdict, VerifyError> {
        let payload: VerdictPayload = self
            .post("verify", &VerifyRequest { claim, evidence })
            .await?;
        let verdict = Verdict::new(payload.verdict, payload.reason, payload.confidence);
        info!(label = %verdict.label, confidence = ?verdict.confidence, "received verdict");
        Ok(verdict)
    }
}

fn classify_transport(e: reqwest::Error) -> VerifyError {
    VerifyError::Transport {
        message: e.to_string(),
        timed_out: e.is_timeout(),
    }
}

/// Pull a human-readable message out of an error body.
///
/// Understands FastAPI's `{"detail": "..."}` and `{"detail": [{"msg": ...}]}`
/// plus the common `message`/`error` keys. Short plain-text bodies pass
/// through; anything else yields a generic message.
fn service_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(detail) = value.get("detail") {
            if let Some(s) = detail.as_str() {
                return s.to_string();
            }
            if let Some(items) = detail.as_array() {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|i| i.get("msg").and_then(|m| m.as_str()))
                    .collect();
                if !msgs.is_empty() {
                    return msgs.join("; ");
                }
            }
        }
        for key in ["message", "error"] {
            if let Some(s) = value.get(key).and_then(|v| v.as_str()) {
                return s.to_string();
            }
        }
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() <= MAX_RAW_DETAIL && !trimmed.starts_with('<') {
        return trimmed.to_string();
    }
    format!("service returned status {status}")
}
