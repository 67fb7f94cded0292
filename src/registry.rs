//! Claim registry for shared remote resources
//!
//! Parallel test cases draw documents from the same remote pools. Before a test touches
//! a resource it claims the id here, and every other test filters claimed ids out of
//! its candidates. Claims are never released during a run, so a resource mutated by
//! one test is not handed to another.

use log::debug;
use parking_lot::RwLock;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Identifier of a remote resource (e.g. a document id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// How a survivor is chosen from the unclaimed candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionStrategy {
    /// First unclaimed candidate in input order
    First,
    #[default]
    Random,
}

/// Process-wide set of claimed resource ids, cheap to clone and share
#[derive(Debug, Clone, Default)]
pub struct ResourceAllocationRegistry {
    claimed: Arc<RwLock<HashSet<ResourceId>>>,
}

impl ResourceAllocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `id` as in use. Returns `false` if it was already claimed.
    pub fn claim(&self, id: impl Into<ResourceId>) -> bool {
        let id = id.into();
        let inserted = self.claimed.write().insert(id.clone());
        if inserted {
            debug!("Claimed resource {}", id);
        }
        inserted
    }

    pub fn claim_all<I>(&self, ids: I)
    where
        I: IntoIterator,
        I::Item: Into<ResourceId>,
    {
        let mut claimed = self.claimed.write();
        for id in ids {
            claimed.insert(id.into());
        }
    }

    /// Candidates not claimed yet, in input order. Does not claim anything.
    pub fn filter_unclaimed(&self, candidates: &[ResourceId]) -> Vec<ResourceId> {
        let claimed = self.claimed.read();
        candidates
            .iter()
            .filter(|id| !claimed.contains(*id))
            .cloned()
            .collect()
    }

    /// In-place variant of [`filter_unclaimed`](Self::filter_unclaimed)
    pub fn retain_unclaimed(&self, candidates: &mut Vec<ResourceId>) {
        let claimed = self.claimed.read();
        candidates.retain(|id| !claimed.contains(id));
    }

    /// Filter, choose and claim in one step.
    ///
    /// Holding the write lock across all three is what keeps two concurrent callers
    /// from walking away with the same id.
    pub fn pick_unclaimed(
        &self,
        candidates: &[ResourceId],
        strategy: SelectionStrategy,
    ) -> Option<ResourceId> {
        let mut claimed = self.claimed.write();
        let available: Vec<&ResourceId> = candidates
            .iter()
            .filter(|id| !claimed.contains(*id))
            .collect();

        let chosen = match strategy {
            SelectionStrategy::First => available.first().copied(),
            SelectionStrategy::Random => available.choose(&mut rand::thread_rng()).copied(),
        }?
        .clone();

        claimed.insert(chosen.clone());
        debug!(
            "Picked resource {} ({} of {} candidates were free)",
            chosen,
            available.len(),
            candidates.len()
        );
        Some(chosen)
    }

    /// Pick an unclaimed candidate, or create a new resource and claim it.
    pub async fn acquire_or_create<F, Fut>(
        &self,
        candidates: &[ResourceId],
        strategy: SelectionStrategy,
        create: F,
    ) -> anyhow::Result<ResourceId>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<ResourceId>>,
    {
        if let Some(id) = self.pick_unclaimed(candidates, strategy) {
            return Ok(id);
        }

        debug!("No unclaimed candidates among {}, creating a new resource", candidates.len());
        let id = create().await?;
        self.claim(id.clone());
        Ok(id)
    }

    pub fn is_claimed(&self, id: &ResourceId) -> bool {
        self.claimed.read().contains(id)
    }

    pub fn len(&self) -> usize {
        self.claimed.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.claimed.read().is_empty()
    }
}
