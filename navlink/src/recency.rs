//! "Most recently active panel" oracle, used only to break ties.

use crate::error::LinkingResult;
use crate::types::PanelId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

#[async_trait]
pub trait RecencyOracle: Send + Sync {
    /// The most recently active of `candidates`; `None` only when empty.
    async fn most_recently_active(&self, candidates: &[PanelId])
        -> LinkingResult<Option<PanelId>>;
}

/// Stamps each activation with an increasing counter.
///
/// Highest stamp wins. Panels never activated rank below all others, and
/// equal stamps go to the lowest panel id, so a fixed activation history
/// always yields the same choice.
#[derive(Default)]
pub struct ActivityTracker {
    clock: AtomicU64,
    stamps: RwLock<HashMap<PanelId, u64>>,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&self, panel: &PanelId) {
        let stamp = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        let mut stamps = self.stamps.write().unwrap_or_else(PoisonError::into_inner);
        stamps.insert(panel.clone(), stamp);
    }

    pub fn forget(&self, panel: &PanelId) {
        let mut stamps = self.stamps.write().unwrap_or_else(PoisonError::into_inner);
        stamps.remove(panel);
    }

    pub fn stamp(&self, panel: &PanelId) -> u64 {
        let stamps = self.stamps.read().unwrap_or_else(PoisonError::into_inner);
        stamps.get(panel).copied().unwrap_or(0)
    }

    pub fn pick(&self, candidates: &[PanelId]) -> Option<PanelId> {
        let stamps = self.stamps.read().unwrap_or_else(PoisonError::into_inner);
        candidates
            .iter()
            .max_by(|a, b| {
                let sa = stamps.get(*a).copied().unwrap_or(0);
                let sb = stamps.get(*b).copied().unwrap_or(0);
                sa.cmp(&sb).then_with(|| b.cmp(a))
            })
            .cloned()
    }
}

#[async_trait]
impl RecencyOracle for ActivityTracker {
    async fn most_recently_active(
        &self,
        candidates: &[PanelId],
    ) -> LinkingResult<Option<PanelId>> {
        Ok(self.pick(candidates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<PanelId> {
        names.iter().map(|n| PanelId::from(*n)).collect()
    }

    #[test]
    fn test_latest_activation_wins() {
        let tracker = ActivityTracker::new();
        tracker.activate(&PanelId::from("b"));
        tracker.activate(&PanelId::from("a"));
        assert_eq!(tracker.pick(&ids(&["a", "b"])), Some(PanelId::from("a")));
        tracker.activate(&PanelId::from("b"));
        assert_eq!(tracker.pick(&ids(&["a", "b"])), Some(PanelId::from("b")));
    }

    #[test]
    fn test_unactivated_ties_go_to_lowest_id() {
        let tracker = ActivityTracker::new();
        assert_eq!(
            tracker.pick(&ids(&["q3", "q1", "q2"])),
            Some(PanelId::from("q1"))
        );
        assert_eq!(tracker.pick(&[]), None);
    }

    #[test]
    fn test_pick_is_order_independent() {
        let tracker = ActivityTracker::new();
        tracker.activate(&PanelId::from("m"));
        let forward = tracker.pick(&ids(&["x", "m", "a"]));
        let backward = tracker.pick(&ids(&["a", "m", "x"]));
        assert_eq!(forward, backward);
        assert_eq!(forward, Some(PanelId::from("m")));
    }
}
