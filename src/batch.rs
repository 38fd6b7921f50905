//! Spot cache and bulk solving.
//!
//! `SpotCache` memoizes solutions by the content hash of their root state.
//! `bulk_solve` fans a list of spots out over a worker pool; every spot gets
//! its own solver, so a failure in one never touches the others.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{info, warn};
use lru::LruCache;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{GtoError, GtoResult};
use crate::game_state::GameState;
use crate::parallel::build_pool;
use crate::solver::{solve_spot_with, Solution, SolverConfig};

// ---------------------------------------------------------------------------
// Spot cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Most solutions kept in memory before the least recently used is
    /// evicted.
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig { capacity: 1024 }
    }
}

/// Thread-safe LRU of solved spots, keyed by `GameState::to_hash`.
///
/// Solves run outside the lock. Two threads racing on the same state may
/// both solve it; the first to finish is kept and returned to both.
pub struct SpotCache {
    entries: Mutex<LruCache<u64, Arc<Solution>>>,
}

impl SpotCache {
    pub fn new(config: CacheConfig) -> GtoResult<Self> {
        let capacity = NonZeroUsize::new(config.capacity)
            .ok_or_else(|| GtoError::InvalidValue("cache capacity must be > 0".to_string()))?;
        Ok(SpotCache {
            entries: Mutex::new(LruCache::new(capacity)),
        })
    }

    // A panic mid-insert cannot leave the LRU half-updated, so a poisoned
    // lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, LruCache<u64, Arc<Solution>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, state: &GameState) -> Option<Arc<Solution>> {
        self.lock().get(&state.to_hash()).cloned()
    }

    /// Stores `solution` unless an entry for the same state already exists,
    /// and returns whichever is cached.
    pub fn insert(&self, state: &GameState, solution: Solution) -> Arc<Solution> {
        let key = state.to_hash();
        let mut entries = self.lock();
        if let Some(existing) = entries.get(&key) {
            return Arc::clone(existing);
        }
        let solution = Arc::new(solution);
        if let Some((evicted, _)) = entries.push(key, Arc::clone(&solution)) {
            if evicted != key {
                warn!("spot cache full, evicted {:016x}", evicted);
            }
        }
        solution
    }

    /// Cached solution for `state`, solving and caching it on a miss.
    /// Failed solves are not cached.
    pub fn get_or_solve(
        &self,
        state: &GameState,
        iterations: Option<u32>,
        config: &SolverConfig,
    ) -> GtoResult<Arc<Solution>> {
        if let Some(hit) = self.get(state) {
            return Ok(hit);
        }
        let solution = solve_spot_with(state, iterations, config)?;
        Ok(self.insert(state, solution))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

// ---------------------------------------------------------------------------
// Bulk runner
// ---------------------------------------------------------------------------

/// Position of a spot in the caller's input list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpotId(pub usize);

struct Progress {
    results: HashMap<SpotId, GtoResult<Solution>>,
    done: usize,
}

/// Solves every state on `workers` threads. Each spot's outcome is
/// reported on its own; the outer error is only for pool setup.
///
/// Cancelling `config.cancel` makes spots that have not started yet
/// report `Cancelled` and stops running ones at their next iteration.
pub fn bulk_solve(
    states: &[GameState],
    iterations: Option<u32>,
    config: &SolverConfig,
    workers: usize,
    cache: Option<&SpotCache>,
) -> GtoResult<HashMap<SpotId, GtoResult<Solution>>> {
    let pool = build_pool(workers)?;
    let total = states.len();
    info!("bulk solve: {} spots on {} workers", total, workers.max(1));

    let progress = Mutex::new(Progress {
        results: HashMap::with_capacity(total),
        done: 0,
    });

    pool.install(|| {
        states.par_iter().enumerate().for_each(|(i, state)| {
            let outcome = config.cancel.check().and_then(|()| match cache {
                Some(c) => c
                    .get_or_solve(state, iterations, config)
                    .map(|s| Solution::clone(&s)),
                None => solve_spot_with(state, iterations, config),
            });
            if let Err(e) = &outcome {
                warn!("spot {} failed: {}", i, e);
            }

            let mut p = progress.lock().unwrap_or_else(|e| e.into_inner());
            p.results.insert(SpotId(i), outcome);
            p.done += 1;
            info!("bulk solve progress: {}/{}", p.done, total);
        });
    });

    let progress = progress.into_inner().unwrap_or_else(|e| e.into_inner());
    Ok(progress.results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::{parse_board, parse_hand, Board};
    use crate::game_state::{BetMenu, ClosureRule};

    fn spot(pot: f64) -> GameState {
        let mut state = GameState::new(
            vec![50.0, 50.0],
            pot,
            Board::Single(parse_board("Ts9s2d4c").unwrap()),
        );
        state.ranges = vec![
            vec![parse_hand("AsKsQhJh").unwrap()],
            vec![parse_hand("TcThTd8c").unwrap()],
        ];
        state
    }

    fn config() -> SolverConfig {
        SolverConfig {
            bet_menu: BetMenu {
                fractions: vec![1.0],
                ..BetMenu::default()
            },
            closure: ClosureRule::MatchedBets,
            showdown_samples: 4,
            max_depth: 3,
            ..SolverConfig::with_seed(3)
        }
    }

    #[test]
    fn zero_capacity_is_rejected() {
        assert!(SpotCache::new(CacheConfig { capacity: 0 }).is_err());
    }

    #[test]
    fn cache_returns_same_solution() {
        let cache = SpotCache::new(CacheConfig::default()).unwrap();
        let a = cache.get_or_solve(&spot(10.0), Some(10), &config()).unwrap();
        let b = cache.get_or_solve(&spot(10.0), Some(10), &config()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_evicts_least_recent() {
        let cache = SpotCache::new(CacheConfig { capacity: 1 }).unwrap();
        cache.get_or_solve(&spot(10.0), Some(5), &config()).unwrap();
        cache.get_or_solve(&spot(12.0), Some(5), &config()).unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&spot(10.0)).is_none());
        assert!(cache.get(&spot(12.0)).is_some());
    }

    #[test]
    fn failed_solves_are_not_cached() {
        let cache = SpotCache::new(CacheConfig::default()).unwrap();
        let mut bad = spot(10.0);
        bad.player_position = 7;
        assert!(cache.get_or_solve(&bad, Some(5), &config()).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn bulk_failure_is_isolated() {
        let mut bad = spot(10.0);
        bad.active_players.clear();
        let states = vec![spot(10.0), bad, spot(20.0)];
        let results = bulk_solve(&states, Some(10), &config(), 2, None).unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[&SpotId(0)].is_ok());
        assert!(matches!(results[&SpotId(1)], Err(GtoError::SolverConstruction(_))));
        assert!(results[&SpotId(2)].is_ok());
    }
}
