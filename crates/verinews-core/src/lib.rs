//! Core types, claim registry, per-claim result cache and error taxonomy.

pub mod cache;
mod error;
pub mod registry;
pub mod types;

pub use cache::{CacheError, ResultCache};
pub use error::VerifyError;
pub use registry::ClaimRegistry;
pub use types::{
    Claim, ClaimId, EvidenceItem, RecordState, SessionStatus, Verdict, VerdictKind,
    VerificationRecord,
};
