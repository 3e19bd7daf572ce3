use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use verinews_core::{EvidenceItem, Verdict, VerifyError};

/// Normalised article content returned by `ingest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub content: String,
}

/// The request/response operations of the remote verification service.
///
/// Implementations never retry: every failure is returned classified and the
/// caller decides whether to re-invoke.
#[async_trait]
pub trait VerificationService: Send + Sync {
    /// `Ok` when the service is up and reports itself healthy.
    async fn health(&self) -> Result<(), VerifyError>;

    /// Normalise raw article text. Empty text is a validation failure.
    async fn ingest(&self, text: &str) -> Result<IngestResponse, VerifyError>;

    /// Extract claim sentences. An empty result is not an error.
    async fn extract_claims(&self, content: &str) -> Result<Vec<String>, VerifyError>;

    async fn fetch_evidence(&self, claim: &str) -> Result<Vec<EvidenceItem>, VerifyError>;

    async fn verify(&self, claim: &str, evidence: &[EvidenceItem]) -> Result<Verdict, VerifyError>;
}
