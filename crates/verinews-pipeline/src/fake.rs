//! Scripted in-process verification service for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use verinews_client::{IngestResponse, VerificationService};
use verinews_core::{EvidenceItem, Verdict, VerifyError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Ingest(String),
    Extract(String),
    Evidence(String),
    /// Claim text and the number of evidence items passed along.
    Verify(String, usize),
}

/// Echoes ingest input, splits claims on full stops, returns one evidence item
/// per claim and a SUPPORTED verdict, unless scripted otherwise.
#[derive(Default)]
pub(crate) struct FakeService {
    calls: Mutex<Vec<Call>>,
    claims: Option<Vec<String>>,
    ingest_failure: Option<VerifyError>,
    extract_failure: Option<VerifyError>,
    evidence_failures: Failures,
    verify_failures: Failures,
    ingest_gates: HashMap<String, Arc<Notify>>,
    evidence_gates: HashMap<String, Arc<Notify>>,
}

impl FakeService {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_claims(mut self, claims: Vec<String>) -> Self {
        self.claims = Some(claims);
        self
    }

    pub(crate) fn fail_ingest(mut self, error: VerifyError) -> Self {
        self.ingest_failure = Some(error);
        self
    }

    pub(crate) fn fail_extract(mut self, error: VerifyError) -> Self {
        self.extract_failure = Some(error);
        self
    }

    /// Fail the next evidence fetch for `claim`; later fetches succeed.
    pub(crate) fn fail_evidence_once(self, claim: &str, error: VerifyError) -> Self {
        push_failure(&self.evidence_failures, claim, error);
        self
    }

    /// Fail the next verdict for `claim` after its evidence was fetched.
    pub(crate) fn fail_verify_once(self, claim: &str, error: VerifyError) -> Self {
        push_failure(&self.verify_failures, claim, error);
        self
    }

    /// Hold ingest of `text` until `gate` is notified.
    pub(crate) fn gate_ingest(mut self, text: &str, gate: Arc<Notify>) -> Self {
        self.ingest_gates.insert(text.to_string(), gate);
        self
    }

    /// Hold evidence for `claim` until `gate` is notified.
    pub(crate) fn gate_evidence(mut self, claim: &str, gate: Arc<Notify>) -> Self {
        self.evidence_gates.insert(claim.to_string(), gate);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub(crate) fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    /// Yield until a matching call has been recorded.
    pub(crate) async fn wait_for(&self, pred: impl Fn(&Call) -> bool) {
        while self.count(&pred) == 0 {
            tokio::task::yield_now().await;
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

type Failures = Mutex<HashMap<String, VecDeque<VerifyError>>>;

fn push_failure(failures: &Failures, claim: &str, error: VerifyError) {
    failures
        .lock()
        .unwrap()
        .entry(claim.to_string())
        .or_default()
        .push_back(error);
}

fn pop_failure(failures: &Failures, claim: &str) -> Option<VerifyError> {
    failures.lock().unwrap().get_mut(claim).and_then(|q| q.pop_front())
}

#[async_trait]
impl VerificationService for FakeService {
    async fn health(&self) -> Result<(), VerifyError> {
        Ok(())
    }

    async fn ingest(&self, text: &str) -> Result<IngestResponse, VerifyError> {
        self.record(Call::Ingest(text.to_string()));
        if let Some(gate) = self.ingest_gates.get(text) {
            gate.notified().await;
        }
        if let Some(e) = &self.ingest_failure {
            return Err(e.clone());
        }
        Ok(IngestResponse {
            content: text.trim().to_string(),
        })
    }

    async fn extract_claims(&self, content: &str) -> Result<Vec<String>, VerifyError> {
        self.record(Call::Extract(content.to_string()));
        if let Some(e) = &self.extract_failure {
            return Err(e.clone());
        }
        if let Some(claims) = &self.claims {
            return Ok(claims.clone());
        }
        Ok(content
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("{s}."))
            .collect())
    }

    async fn fetch_evidence(&self, claim: &str) -> Result<Vec<EvidenceItem>, VerifyError> {
        self.record(Call::Evidence(claim.to_string()));
        if let Some(gate) = self.evidence_gates.get(claim) {
            gate.notified().await;
        }
        if let Some(e) = pop_failure(&self.evidence_failures, claim) {
            return Err(e);
        }
        Ok(vec![EvidenceItem {
            title: claim.to_string(),
            url: "https://en.wikipedia.org/wiki/Special:Search".to_string(),
            snippet: format!("Background reading for: {claim}"),
            source: Some("Wikipedia".to_string()),
        }])
    }

    async fn verify(&self, claim: &str, evidence: &[EvidenceItem]) -> Result<Verdict, VerifyError> {
        self.record(Call::Verify(claim.to_string(), evidence.len()));
        if let Some(e) = pop_failure(&self.verify_failures, claim) {
            return Err(e);
        }
        Ok(Verdict::new(
            "SUPPORTED",
            format!("{} evidence item(s) agree with the claim.", evidence.len()),
            Some(75.0),
        ))
    }
}
