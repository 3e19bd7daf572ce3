//! Selection and keyboard-style navigation over the current session's claims.

use tokio::task::JoinHandle;
use tracing::debug;
use verinews_core::{Claim, ClaimId, VerificationRecord};

use crate::error::PipelineError;
use crate::orchestrator::{AnalysisOutcome, Orchestrator};

/// Handle to a spawned verification; dropping it detaches the task.
pub type VerifyHandle = JoinHandle<Result<VerificationRecord, PipelineError>>;

/// What the presentation layer shows: the selected claim and its own record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayState {
    pub selected: Option<Claim>,
    /// `None` until the selected claim's verification has been claimed.
    pub record: Option<VerificationRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Selection {
    generation: u64,
    id: ClaimId,
}

pub struct SelectionController {
    orchestrator: Orchestrator,
    selected: Option<Selection>,
}

impl SelectionController {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator,
            selected: None,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Clear the selection and start a new analysis.
    pub async fn analyze(&mut self, text: &str) -> Result<AnalysisOutcome, PipelineError> {
        self.selected = None;
        self.orchestrator.analyze(text).await
    }

    /// The selected id, if it belongs to the current session.
    pub fn selected_id(&self) -> Option<ClaimId> {
        let current = self.orchestrator.generation();
        self.selected
            .filter(|s| s.generation == current)
            .map(|s| s.id)
    }

    /// Select `id` and start its verification on the runtime.
    ///
    /// Verifications of previously selected claims keep running and fill the
    /// cache. The verification is bound to the session the claim was selected
    /// in; after a re-analysis it ends as superseded without touching the new
    /// session. Must be called from within a tokio runtime.
    pub fn select(&mut self, id: ClaimId) -> Result<VerifyHandle, PipelineError> {
        let generation = self.orchestrator.generation();
        if self.orchestrator.view(generation, id).is_none() {
            return Err(PipelineError::UnknownClaim(id));
        }
        self.selected = Some(Selection { generation, id });
        debug!(claim = %id, generation, "claim selected");

        let orchestrator = self.orchestrator.clone();
        Ok(tokio::spawn(async move { orchestrator.verify_in(generation, id).await }))
    }

    /// Move to the next claim; no-op on the last one. With nothing selected,
    /// selects the first claim.
    pub fn next(&mut self) -> Result<Option<VerifyHandle>, PipelineError> {
        match self.orchestrator.next_claim(self.selected_id()) {
            Some(id) => self.select(id).map(Some),
            None => Ok(None),
        }
    }

    /// Move to the previous claim; no-op on the first one. With nothing
    /// selected, selects the last claim.
    pub fn previous(&mut self) -> Result<Option<VerifyHandle>, PipelineError> {
        match self.orchestrator.previous_claim(self.selected_id()) {
            Some(id) => self.select(id).map(Some),
            None => Ok(None),
        }
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Read the selected claim's record. Never reflects another claim's
    /// completion, however recent.
    pub fn display_state(&self) -> DisplayState {
        let Some(sel) = self.selected else {
            return DisplayState::default();
        };
        match self.orchestrator.view(sel.generation, sel.id) {
            Some((claim, record)) => DisplayState {
                selected: Some(claim),
                record,
            },
            None => DisplayState::default(),
        }
    }

    /// Wait until the selected claim's record is done or failed.
    ///
    /// Returns immediately with nothing selected. Returns the current state if
    /// the selection is abandoned or the session changes while waiting.
    pub async fn wait_settled(&self) -> DisplayState {
        let mut changes = self.orchestrator.subscribe();
        loop {
            let state = self.display_state();
            let settled = match &state.record {
                Some(record) => record.state.is_settled(),
                None => state.selected.is_none(),
            };
            if settled {
                return state;
            }
            if changes.changed().await.is_err() {
                return state;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::Notify;
    use verinews_core::{RecordState, VerifyError};

    use super::*;
    use crate::fake::{Call, FakeService};
    use crate::orchestrator::PipelineConfig;

    const THREE_CLAIMS: &str =
        "Cats are mammals. The moon is made of cheese. Water boils at 100 degrees at sea level.";

    async fn controller(fake: &Arc<FakeService>) -> SelectionController {
        let orch = Orchestrator::new(fake.clone(), PipelineConfig::default());
        let mut ctl = SelectionController::new(orch);
        ctl.analyze(THREE_CLAIMS).await.unwrap();
        ctl
    }

    #[tokio::test]
    async fn select_verifies_once_and_reuses_record() {
        let fake = Arc::new(FakeService::new());
        let mut ctl = controller(&fake).await;

        let first = ctl.select(ClaimId(0)).unwrap().await.unwrap().unwrap();
        assert_eq!(first.state, RecordState::Done);

        let again = ctl.select(ClaimId(0)).unwrap().await.unwrap().unwrap();
        assert_eq!(again, first);
        assert_eq!(fake.count(|c| matches!(c, Call::Evidence(_))), 1);
        assert_eq!(fake.count(|c| matches!(c, Call::Verify(..))), 1);

        let state = ctl.display_state();
        assert_eq!(state.selected.unwrap().id, ClaimId(0));
        assert_eq!(state.record.unwrap(), first);
    }

    #[tokio::test]
    async fn unknown_claim_is_rejected_and_selection_kept() {
        let fake = Arc::new(FakeService::new());
        let mut ctl = controller(&fake).await;
        ctl.select(ClaimId(1)).unwrap().await.unwrap().unwrap();

        assert!(matches!(
            ctl.select(ClaimId(9)),
            Err(PipelineError::UnknownClaim(ClaimId(9)))
        ));
        assert_eq!(ctl.selected_id(), Some(ClaimId(1)));
    }

    #[tokio::test]
    async fn navigation_stops_at_boundaries() {
        let fake = Arc::new(FakeService::new());
        let mut ctl = controller(&fake).await;

        ctl.next().unwrap().unwrap().await.unwrap().unwrap();
        assert_eq!(ctl.selected_id(), Some(ClaimId(0)));
        assert!(ctl.previous().unwrap().is_none());
        assert_eq!(ctl.selected_id(), Some(ClaimId(0)));

        ctl.next().unwrap().unwrap().await.unwrap().unwrap();
        ctl.next().unwrap().unwrap().await.unwrap().unwrap();
        assert_eq!(ctl.selected_id(), Some(ClaimId(2)));
        assert!(ctl.next().unwrap().is_none());
        assert_eq!(ctl.selected_id(), Some(ClaimId(2)));

        ctl.previous().unwrap().unwrap().await.unwrap().unwrap();
        assert_eq!(ctl.selected_id(), Some(ClaimId(1)));
    }

    #[tokio::test]
    async fn previous_with_nothing_selected_picks_last() {
        let fake = Arc::new(FakeService::new());
        let mut ctl = controller(&fake).await;
        ctl.previous().unwrap().unwrap().await.unwrap().unwrap();
        assert_eq!(ctl.selected_id(), Some(ClaimId(2)));
    }

    #[tokio::test]
    async fn no_claims_nothing_to_navigate() {
        let fake = Arc::new(FakeService::new().with_claims(Vec::new()));
        let orch = Orchestrator::new(fake.clone(), PipelineConfig::default());
        let mut ctl = SelectionController::new(orch);
        let outcome = ctl.analyze("Opinions only").await.unwrap();
        assert_eq!(outcome.claim_count(), 0);

        assert!(ctl.next().unwrap().is_none());
        assert!(ctl.previous().unwrap().is_none());
        assert!(ctl.select(ClaimId(0)).is_err());
        assert_eq!(ctl.display_state(), DisplayState::default());
    }

    #[tokio::test]
    async fn switching_away_does_not_cancel_or_leak() {
        let gate = Arc::new(Notify::new());
        let fake = Arc::new(FakeService::new().gate_evidence("Cats are mammals.", gate.clone()));
        let mut ctl = controller(&fake).await;

        // Slow claim 0 is left in flight; the handle is dropped.
        drop(ctl.select(ClaimId(0)).unwrap());
        fake.wait_for(|c| matches!(c, Call::Evidence(_))).await;

        let fast = ctl.select(ClaimId(1)).unwrap().await.unwrap().unwrap();
        let shown = ctl.display_state();
        assert_eq!(shown.selected.as_ref().unwrap().id, ClaimId(1));
        assert_eq!(shown.record.as_ref(), Some(&fast));

        gate.notify_one();
        let mut changes = ctl.orchestrator().subscribe();
        while ctl.orchestrator().record(ClaimId(0)).unwrap().state != RecordState::Done {
            changes.changed().await.unwrap();
        }

        // Claim 0 finished later but the display still shows claim 1.
        let shown = ctl.display_state();
        assert_eq!(shown.selected.unwrap().id, ClaimId(1));
        assert_eq!(shown.record.unwrap(), fast);

        // Selecting claim 0 now is a cache hit.
        let cached = ctl.select(ClaimId(0)).unwrap().await.unwrap().unwrap();
        assert_eq!(cached.state, RecordState::Done);
        assert_eq!(fake.count(|c| matches!(c, Call::Evidence(_))), 2);
    }

    #[tokio::test]
    async fn wait_settled_reports_failure() {
        let fake = Arc::new(FakeService::new().fail_evidence_once(
            "The moon is made of cheese.",
            VerifyError::RateLimited { retry_after_secs: Some(2) },
        ));
        let mut ctl = controller(&fake).await;

        drop(ctl.select(ClaimId(1)).unwrap());
        let state = ctl.wait_settled().await;
        let record = state.record.unwrap();
        assert_eq!(record.state, RecordState::Failed);
        assert_eq!(
            record.error,
            Some(VerifyError::RateLimited { retry_after_secs: Some(2) })
        );

        // Re-selecting a failed claim retries.
        let retried = ctl.select(ClaimId(1)).unwrap().await.unwrap().unwrap();
        assert_eq!(retried.state, RecordState::Done);
    }

    #[tokio::test]
    async fn reanalysis_clears_selection() {
        let fake = Arc::new(FakeService::new());
        let mut ctl = controller(&fake).await;
        ctl.select(ClaimId(2)).unwrap().await.unwrap().unwrap();

        ctl.analyze("Water boils at 100 degrees at sea level.").await.unwrap();
        assert_eq!(ctl.selected_id(), None);
        assert_eq!(ctl.display_state(), DisplayState::default());
        assert_eq!(ctl.wait_settled().await, DisplayState::default());
    }

    #[tokio::test]
    async fn pending_selection_never_verifies_the_next_session() {
        let gate = Arc::new(Notify::new());
        let fake = Arc::new(FakeService::new().gate_evidence("Cats are mammals.", gate.clone()));
        let mut ctl = controller(&fake).await;

        let pending = ctl.select(ClaimId(0)).unwrap();
        ctl.analyze("Water boils at 100 degrees at sea level.").await.unwrap();
        gate.notify_one();

        assert!(matches!(
            pending.await.unwrap(),
            Err(PipelineError::Superseded { .. })
        ));
        assert!(ctl.orchestrator().record(ClaimId(0)).is_none());
        let new_claim = "Water boils at 100 degrees at sea level.";
        assert_eq!(fake.count(|c| *c == Call::Evidence(new_claim.into())), 0);
        assert_eq!(fake.count(|c| matches!(c, Call::Verify(text, _) if text == new_claim)), 0);
    }

    #[tokio::test]
    async fn selection_from_older_session_reads_as_none() {
        let fake = Arc::new(FakeService::new());
        let mut ctl = controller(&fake).await;
        ctl.select(ClaimId(0)).unwrap().await.unwrap().unwrap();

        // Re-analysis through the orchestrator directly, bypassing the controller.
        ctl.orchestrator().analyze(THREE_CLAIMS).await.unwrap();
        assert_eq!(ctl.selected_id(), None);
        assert_eq!(ctl.display_state(), DisplayState::default());
    }
}
