//! Shared claim, evidence and verdict types.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::VerifyError;

/// Position of a claim in the ordered extraction result of one session.
///
/// Unique within a session, reused across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimId(pub usize);

impl ClaimId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<usize> for ClaimId {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

/// A short factual assertion extracted from the source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub id: ClaimId,
    pub text: String,
}

/// A titled, URL-linked snippet supporting or contradicting a claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
    /// Evidence provider, e.g. "Wikipedia".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Display grouping for a free-form verdict label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerdictKind {
    Supported,
    Contradicted,
    /// Unclear, unverified, insufficient evidence.
    Unverified,
    /// Anything else the service chooses to send.
    Other,
}

impl VerdictKind {
    /// Classify a service label. Case and separators are ignored.
    pub fn from_label(label: &str) -> Self {
        let norm: String = label
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match norm.as_str() {
            "supported" | "support" | "true" | "accurate" | "confirmed" => Self::Supported,
            "contradicted" | "refuted" | "false" | "inaccurate" | "disputed" => {
                Self::Contradicted
            }
            "unverified" | "unclear" | "unknown" | "insufficientevidence" | "notenoughinfo"
            | "mixed" => Self::Unverified,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Supported => "supported",
            Self::Contradicted => "contradicted",
            Self::Unverified => "unverified",
            Self::Other => "other",
        }
    }
}

/// The service's classification of a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    /// Free-form label as sent by the service (e.g. "SUPPORTED", "UNCLEAR").
    pub label: String,
    pub reason: String,
    /// Confidence in [0, 100], when the service reports one.
    pub confidence: Option<f32>,
}

impl Verdict {
    pub const MAX_CONFIDENCE: f32 = 100.0;

    /// Build a verdict, clamping `confidence` into [0, 100]. NaN is dropped.
    pub fn new(label: impl Into<String>, reason: impl Into<String>, confidence: Option<f32>) -> Self {
        Self {
            label: label.into(),
            reason: reason.into(),
            confidence: confidence
                .filter(|c| !c.is_nan())
                .map(|c| c.clamp(0.0, Self::MAX_CONFIDENCE)),
        }
    }

    pub fn kind(&self) -> VerdictKind {
        VerdictKind::from_label(&self.label)
    }
}

/// Lifecycle of one analysis session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Analyzing,
    Ready,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Analyzing => "analyzing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

/// Verification progress for one claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordState {
    #[default]
    NotStarted,
    Loading,
    Done,
    Failed,
}

impl RecordState {
    /// NotStarted and Failed may start a new round trip.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotStarted | Self::Failed)
    }

    /// Done or Failed.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not-started",
            Self::Loading => "loading",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// Evidence and verdict for one claim in one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub claim_id: ClaimId,
    pub evidence: Vec<EvidenceItem>,
    pub verdict: Option<Verdict>,
    pub state: RecordState,
    /// Classified failure of the latest attempt when `state` is `Failed`.
    pub error: Option<VerifyError>,
    /// Number of round trips started for this claim.
    pub attempts: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl VerificationRecord {
    pub fn new(claim_id: ClaimId) -> Self {
        Self {
            claim_id,
            evidence: Vec::new(),
            verdict: None,
            state: RecordState::NotStarted,
            error: None,
            attempts: 0,
            started_at: None,
            finished_at: None,
        }
    }
}
