//! Claim registry: stable per-session ids for extracted claim texts.

use crate::types::{Claim, ClaimId};

/// Ordered claims of the current analysis session.
///
/// Ids are positions in the extraction result, so `claims[i].id == ClaimId(i)`
/// always holds and lookups are direct indexing.
#[derive(Debug, Default, Clone)]
pub struct ClaimRegistry {
    claims: Vec<Claim>,
}

impl ClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign ids 0..n-1 in input order, replacing any prior contents.
    pub fn register<I, S>(&mut self, texts: I) -> &[Claim]
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.claims = texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Claim {
                id: ClaimId(i),
                text: text.into(),
            })
            .collect();
        &self.claims
    }

    pub fn lookup(&self, id: ClaimId) -> Option<&Claim> {
        self.claims.get(id.index())
    }

    pub fn claims(&self) -> &[Claim] {
        &self.claims
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }

    pub fn clear(&mut self) {
        self.claims.clear();
    }

    pub fn first_id(&self) -> Option<ClaimId> {
        self.claims.first().map(|c| c.id)
    }

    pub fn last_id(&self) -> Option<ClaimId> {
        self.claims.last().map(|c| c.id)
    }

    /// The id after `id`, or `None` at the end (or for an unknown id).
    pub fn next_id(&self, id: ClaimId) -> Option<ClaimId> {
        self.lookup(id)?;
        self.lookup(ClaimId(id.index() + 1)).map(|c| c.id)
    }

    /// The id before `id`, or `None` at the start (or for an unknown id).
    pub fn previous_id(&self, id: ClaimId) -> Option<ClaimId> {
        self.lookup(id)?;
        let prev = id.index().checked_sub(1)?;
        self.lookup(ClaimId(prev)).map(|c| c.id)
    }
}
