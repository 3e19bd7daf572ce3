//! Per-claim result cache.
//!
//! One [`VerificationRecord`] per claim id. The state machine is
//!
//! ```text
//! NotStarted ─┐
//!             ├─ ensure_loading ─▶ Loading ─┬─ complete ─▶ Done (terminal)
//! Failed ─────┘                             └─ fail ─────▶ Failed
//! ```
//!
//! `ensure_loading` is the de-duplication point: it returns `true` to exactly
//! one caller per round trip, so at most one verification per claim is ever in
//! flight.

use std::collections::HashMap;

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use crate::error::VerifyError;
use crate::types::{ClaimId, EvidenceItem, RecordState, Verdict, VerificationRecord};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("no verification record for claim {0}")]
    Missing(ClaimId),

    #[error("claim {id} is {} and cannot accept a result", .state.as_str())]
    NotLoading { id: ClaimId, state: RecordState },
}

#[derive(Debug, Default)]
pub struct ResultCache {
    records: HashMap<ClaimId, VerificationRecord>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ClaimId) -> Option<&VerificationRecord> {
        self.records.get(&id)
    }

    /// Claim a round trip for `id`.
    ///
    /// Absent, NotStarted and Failed records move to Loading and `true` is
    /// returned. Loading and Done records are left alone and `false` tells the
    /// caller not to issue remote calls.
    pub fn ensure_loading(&mut self, id: ClaimId) -> bool {
        let record = self
            .records
            .entry(id)
            .or_insert_with(|| VerificationRecord::new(id));
        if !record.state.is_retryable() {
            debug!(claim = %id, state = record.state.as_str(), "verification already claimed");
            return false;
        }
        record.state = RecordState::Loading;
        record.error = None;
        record.evidence.clear();
        record.verdict = None;
        record.attempts += 1;
        record.started_at = Some(Utc::now());
        record.finished_at = None;
        true
    }

    /// Loading → Done. Any other state is rejected and the record is kept.
    pub fn complete(
        &mut self,
        id: ClaimId,
        evidence: Vec<EvidenceItem>,
        verdict: Verdict,
    ) -> Result<&VerificationRecord, CacheError> {
        let record = self.loading_record(id)?;
        record.evidence = evidence;
        record.verdict = Some(verdict);
        record.state = RecordState::Done;
        record.finished_at = Some(Utc::now());
        Ok(record)
    }

    /// Loading → Failed. The claim may be retried afterwards.
    pub fn fail(&mut self, id: ClaimId, error: VerifyError) -> Result<&VerificationRecord, CacheError> {
        let record = self.loading_record(id)?;
        record.state = RecordState::Failed;
        record.error = Some(error);
        record.finished_at = Some(Utc::now());
        Ok(record)
    }

    pub fn reset(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn loading_record(&mut self, id: ClaimId) -> Result<&mut VerificationRecord, CacheError> {
        let record = self.records.get_mut(&id).ok_or(CacheError::Missing(id))?;
        if record.state != RecordState::Loading {
            return Err(CacheError::NotLoading {
                id,
                state: record.state,
            });
        }
        Ok(record)
    }
}
