//! Verification orchestrator.
//!
//! Drives ingest → extract for a session and evidence → verify per claim.
//! All session state (status, registry, cache) lives behind one mutex that is
//! only ever held between suspension points, never across a remote call.
//!
//! Every call captures the session generation when it starts and compares it
//! before writing anything back. A newer `analyze` bumps the generation, so a
//! late response from an older session is dropped instead of landing in the
//! new session's cache.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use verinews_client::VerificationService;
use verinews_core::{
    CacheError, Claim, ClaimId, ClaimRegistry, EvidenceItem, ResultCache, SessionStatus, Verdict,
    VerificationRecord, VerifyError,
};

use crate::error::PipelineError;

pub const DEFAULT_MAX_INPUT_CHARS: usize = 10_000;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Upper bound on article length, in characters, checked before ingest.
    pub max_input_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
        }
    }
}

/// Result of a successful `analyze`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Extraction succeeded but found nothing to check.
    NoClaims,
    Found(Vec<Claim>),
}

impl AnalysisOutcome {
    pub fn claims(&self) -> &[Claim] {
        match self {
            Self::NoClaims => &[],
            Self::Found(claims) => claims,
        }
    }

    pub fn claim_count(&self) -> usize {
        self.claims().len()
    }
}

struct Session {
    generation: u64,
    status: SessionStatus,
    source_text: String,
    registry: ClaimRegistry,
    cache: ResultCache,
    last_error: Option<VerifyError>,
}

impl Session {
    fn new() -> Self {
        Self {
            generation: 0,
            status: SessionStatus::Idle,
            source_text: String::new(),
            registry: ClaimRegistry::new(),
            cache: ResultCache::new(),
            last_error: None,
        }
    }

    /// Discard claims and records and move to a new generation.
    fn restart(&mut self, status: SessionStatus, source_text: String) -> u64 {
        self.generation += 1;
        self.status = status;
        self.source_text = source_text;
        self.registry.clear();
        self.cache.reset();
        self.last_error = None;
        self.generation
    }

    fn check_current(&self, started: u64) -> Result<(), PipelineError> {
        if self.generation != started {
            return Err(PipelineError::Superseded {
                started,
                current: self.generation,
            });
        }
        Ok(())
    }
}

struct Shared {
    service: Arc<dyn VerificationService>,
    config: PipelineConfig,
    session: Mutex<Session>,
    changes: watch::Sender<u64>,
}

/// Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Shared>,
}

impl Orchestrator {
    pub fn new(service: Arc<dyn VerificationService>, config: PipelineConfig) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            inner: Arc::new(Shared {
                service,
                config,
                session: Mutex::new(Session::new()),
                changes,
            }),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    /// Start a new session from `text`.
    ///
    /// Invalid input fails with [`VerifyError::Validation`] before any remote
    /// call and leaves the current session untouched. Otherwise the previous
    /// session's claims and records are discarded and ingest then extraction
    /// run in order. A failure at either step marks the session `Failed` and
    /// keeps no partial claims.
    pub async fn analyze(&self, text: &str) -> Result<AnalysisOutcome, PipelineError> {
        self.validate(text)?;

        let generation = self.session().restart(SessionStatus::Analyzing, text.to_string());
        self.notify();
        info!(generation, chars = text.chars().count(), "analysis started");

        let content = match self.inner.service.ingest(text).await {
            Ok(resp) => resp.content,
            Err(e) => return self.finish_analysis(generation, Err(e)),
        };
        self.session().check_current(generation)?;

        let extracted = self.inner.service.extract_claims(&content).await;
        self.finish_analysis(generation, extracted)
    }

    fn finish_analysis(
        &self,
        generation: u64,
        extracted: Result<Vec<String>, VerifyError>,
    ) -> Result<AnalysisOutcome, PipelineError> {
        let outcome = {
            let mut session = self.session();
            session.check_current(generation)?;
            match extracted {
                Ok(texts) => {
                    let claims = session.registry.register(texts).to_vec();
                    session.status = SessionStatus::Ready;
                    Ok(claims)
                }
                Err(e) => {
                    session.status = SessionStatus::Failed;
                    session.last_error = Some(e.clone());
                    Err(e)
                }
            }
        };
        self.notify();

        match outcome {
            Ok(claims) if claims.is_empty() => {
                info!(generation, "analysis found no claims");
                Ok(AnalysisOutcome::NoClaims)
            }
            Ok(claims) => {
                info!(generation, count = claims.len(), "analysis ready");
                Ok(AnalysisOutcome::Found(claims))
            }
            Err(e) => {
                warn!(generation, error = %e, kind = e.kind(), "analysis failed");
                Err(e.into())
            }
        }
    }

    /// Fetch evidence and a verdict for one claim, at most once per session.
    ///
    /// When the claim is already loading or done the stored record is
    /// returned as is and no remote call is made. A failed claim is retried.
    /// Dropping the returned future before it finishes fails the record, so
    /// the claim can be verified again.
    pub async fn verify(&self, id: ClaimId) -> Result<VerificationRecord, PipelineError> {
        self.verify_claim(None, id).await
    }

    /// [`verify`](Self::verify) scoped to session `generation`.
    ///
    /// Fails with [`PipelineError::Superseded`] before any remote call once a
    /// newer analysis has replaced that session.
    pub async fn verify_in(
        &self,
        generation: u64,
        id: ClaimId,
    ) -> Result<VerificationRecord, PipelineError> {
        self.verify_claim(Some(generation), id).await
    }

    async fn verify_claim(
        &self,
        expected: Option<u64>,
        id: ClaimId,
    ) -> Result<VerificationRecord, PipelineError> {
        let (generation, claim_text) = {
            let mut session = self.session();
            if let Some(expected) = expected {
                session.check_current(expected)?;
            }
            if session.status != SessionStatus::Ready {
                return Err(PipelineError::NotReady(session.status));
            }
            let text = session
                .registry
                .lookup(id)
                .ok_or(PipelineError::UnknownClaim(id))?
                .text
                .clone();
            if !session.cache.ensure_loading(id) {
                return session
                    .cache
                    .get(id)
                    .cloned()
                    .ok_or(PipelineError::Cache(CacheError::Missing(id)));
            }
            (session.generation, text)
        };
        self.notify();
        debug!(generation, claim = %id, "verification started");

        let mut pending = PendingVerification {
            orchestrator: self,
            generation,
            id,
            armed: true,
        };
        let result = self.fetch_verdict(&claim_text).await;
        pending.armed = false;

        let stored = {
            let mut session = self.session();
            if let Err(e) = session.check_current(generation) {
                debug!(generation, claim = %id, "dropping verification from an older session");
                return Err(e);
            }
            match result {
                Ok((evidence, verdict)) => session
                    .cache
                    .complete(id, evidence, verdict)
                    .cloned()
                    .map_err(PipelineError::from),
                Err(e) => match session.cache.fail(id, e.clone()) {
                    Ok(_) => Err(PipelineError::from(e)),
                    Err(cache_err) => Err(cache_err.into()),
                },
            }
        };
        self.notify();

        match &stored {
            Ok(record) => info!(
                claim = %id,
                verdict = record.verdict.as_ref().map(|v| v.label.as_str()).unwrap_or(""),
                kind = record.verdict.as_ref().map(|v| v.kind().as_str()).unwrap_or(""),
                evidence = record.evidence.len(),
                "claim verified"
            ),
            Err(e) => warn!(claim = %id, error = %e, "claim verification failed"),
        }
        stored
    }

    /// Evidence strictly before the verdict: the verdict call needs it.
    async fn fetch_verdict(&self, claim: &str) -> Result<(Vec<EvidenceItem>, Verdict), VerifyError> {
        let evidence = self.inner.service.fetch_evidence(claim).await?;
        let verdict = self.inner.service.verify(claim, &evidence).await?;
        Ok((evidence, verdict))
    }

    /// Verify every claim of the current session concurrently.
    ///
    /// Results come back in claim order regardless of completion order.
    pub async fn verify_all(&self) -> Vec<(Claim, Result<VerificationRecord, PipelineError>)> {
        let claims = self.claims();
        let results = join_all(claims.iter().map(|c| self.verify(c.id))).await;
        claims.into_iter().zip(results).collect()
    }

    /// Back to `Idle`; in-flight calls from the old session are discarded.
    pub fn reset(&self) {
        let generation = self.session().restart(SessionStatus::Idle, String::new());
        self.notify();
        debug!(generation, "session reset");
    }

    pub fn status(&self) -> SessionStatus {
        self.session().status
    }

    pub fn generation(&self) -> u64 {
        self.session().generation
    }

    pub fn source_text(&self) -> String {
        self.session().source_text.clone()
    }

    pub fn last_error(&self) -> Option<VerifyError> {
        self.session().last_error.clone()
    }

    pub fn claims(&self) -> Vec<Claim> {
        self.session().registry.claims().to_vec()
    }

    pub fn claim(&self, id: ClaimId) -> Option<Claim> {
        self.session().registry.lookup(id).cloned()
    }

    pub fn record(&self, id: ClaimId) -> Option<VerificationRecord> {
        self.session().cache.get(id).cloned()
    }

    /// Claim and record for `id`, read together, if `generation` is current.
    pub fn view(&self, generation: u64, id: ClaimId) -> Option<(Claim, Option<VerificationRecord>)> {
        let session = self.session();
        if session.generation != generation {
            return None;
        }
        let claim = session.registry.lookup(id)?.clone();
        Some((claim, session.cache.get(id).cloned()))
    }

    /// The claim after `from`, or the first claim when nothing is selected.
    pub fn next_claim(&self, from: Option<ClaimId>) -> Option<ClaimId> {
        let session = self.session();
        match from {
            Some(id) => session.registry.next_id(id),
            None => session.registry.first_id(),
        }
    }

    /// The claim before `from`, or the last claim when nothing is selected.
    pub fn previous_claim(&self, from: Option<ClaimId>) -> Option<ClaimId> {
        let session = self.session();
        match from {
            Some(id) => session.registry.previous_id(id),
            None => session.registry.last_id(),
        }
    }

    /// Ticks on every session or cache change. Read records by claim id
    /// after each tick.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.changes.subscribe()
    }

    fn validate(&self, text: &str) -> Result<(), VerifyError> {
        if text.trim().is_empty() {
            return Err(VerifyError::Validation("article text is empty".into()));
        }
        let max = self.inner.config.max_input_chars;
        let chars = text.chars().count();
        if chars > max {
            return Err(VerifyError::Validation(format!(
                "article text is {chars} characters, the limit is {max}"
            )));
        }
        Ok(())
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.inner.changes.send_modify(|rev| *rev += 1);
    }
}

/// A record claimed by `verify` whose remote calls have not returned yet.
///
/// If the verify future is dropped while armed (timeout, abort, panic) the
/// record is failed so it does not stay Loading for the rest of the session.
struct PendingVerification<'a> {
    orchestrator: &'a Orchestrator,
    generation: u64,
    id: ClaimId,
    armed: bool,
}

impl Drop for PendingVerification<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let failed = {
            let mut session = self.orchestrator.session();
            session.generation == self.generation
                && session
                    .cache
                    .fail(self.id, VerifyError::transport("verification cancelled"))
                    .is_ok()
        };
        if failed {
            warn!(generation = self.generation, claim = %self.id, "verification cancelled before completion");
            self.orchestrator.notify();
        }
    }
}
