use crate::error::ResourceError;
use crate::io::{Playback, StimulusCatalog};
use perch_core::{PerchId, StimulusId};
use rand::Rng;
use rand::seq::IndexedRandom;
use std::time::Duration;
use tracing::debug;

/// A stimulus chosen for a pool but not yet marked as played.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub pool: PerchId,
    pub stimulus: StimulusId,
    catalog: Vec<StimulusId>,
}

/// Draws stimuli per pool without repeats until the pool's catalog is exhausted.
pub struct StimulusLibrary<R: Rng> {
    rng: R,
    played: [Vec<StimulusId>; 2],
}

impl<R: Rng> StimulusLibrary<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            played: [Vec::new(), Vec::new()],
        }
    }

    /// Stimuli played from `pool` since its last reset, in play order.
    pub fn played(&self, pool: PerchId) -> &[StimulusId] {
        &self.played[pool.index()]
    }

    /// Picks uniformly among the catalog members not yet played this cycle.
    /// Leaves the played-set untouched; see [`commit`](Self::commit).
    pub fn select(
        &mut self,
        pool: PerchId,
        catalog: &dyn StimulusCatalog,
    ) -> Result<Selection, ResourceError> {
        let catalog = catalog.list(pool)?;
        self.select_from(pool, catalog)
    }

    /// Like [`select`](Self::select), over a catalog listing the caller already holds.
    pub fn select_from(
        &mut self,
        pool: PerchId,
        catalog: Vec<StimulusId>,
    ) -> Result<Selection, ResourceError> {
        let played = &self.played[pool.index()];
        let available: Vec<&StimulusId> =
            catalog.iter().filter(|s| !played.contains(s)).collect();

        let stimulus = if available.is_empty() {
            catalog.choose(&mut self.rng).cloned()
        } else {
            available.choose(&mut self.rng).map(|s| (*s).clone())
        }
        .ok_or(ResourceError::EmptyPool { pool })?;

        Ok(Selection {
            pool,
            stimulus,
            catalog,
        })
    }

    /// Marks a selection as played. When this completes a cycle through the
    /// catalog the played-set is cleared.
    pub fn commit(&mut self, selection: Selection) {
        let Selection {
            pool,
            stimulus,
            catalog,
        } = selection;
        let played = &mut self.played[pool.index()];
        played.retain(|s| catalog.contains(s));
        if played.contains(&stimulus) {
            // only reachable when the catalog shrank to already-played items
            played.clear();
        }
        played.push(stimulus);
        if catalog.iter().all(|s| played.contains(s)) {
            debug!(pool = %pool, size = catalog.len(), "stimulus pool exhausted, resetting");
            played.clear();
        }
    }

    /// Selects, queries the playback duration, and commits in one step.
    pub fn draw(
        &mut self,
        pool: PerchId,
        catalog: &dyn StimulusCatalog,
        playback: &dyn Playback,
    ) -> Result<(StimulusId, Duration), ResourceError> {
        let selection = self.select(pool, catalog)?;
        let duration = playback.duration_of(&selection.stimulus, pool)?;
        let stimulus = selection.stimulus.clone();
        self.commit(selection);
        Ok((stimulus, duration))
    }
}
