use std::sync::Arc;

use plo_gto::batch::*;
use plo_gto::cards::{parse_board, parse_hand, Board};
use plo_gto::error::GtoError;
use plo_gto::game_state::{Action, BetMenu, ClosureRule, GameState};
use plo_gto::solver::{solve_spot_with, SolverConfig};

fn turn_spot(pot: f64) -> GameState {
    let mut state = GameState::new(
        vec![60.0, 60.0],
        pot,
        Board::Single(parse_board("Ts9s2d4c").unwrap()),
    );
    state.ranges = vec![
        vec![parse_hand("AsKsQhJh").unwrap(), parse_hand("8h7h6d5d").unwrap()],
        vec![parse_hand("TcThTd8c").unwrap()],
    ];
    state
}

fn quick_config() -> SolverConfig {
    SolverConfig {
        bet_menu: BetMenu {
            fractions: vec![0.5, 1.0],
            ..BetMenu::default()
        },
        closure: ClosureRule::MatchedBets,
        max_depth: 3,
        showdown_samples: 3,
        ..SolverConfig::with_seed(21)
    }
}

#[test]
fn test_bulk_matches_individual_solves() {
    let states: Vec<GameState> = [10.0, 20.0, 30.0, 40.0].iter().map(|&p| turn_spot(p)).collect();
    let config = quick_config();
    let results = bulk_solve(&states, Some(15), &config, 3, None).unwrap();
    assert_eq!(results.len(), states.len());

    for (i, state) in states.iter().enumerate() {
        let expected = solve_spot_with(state, Some(15), &config).unwrap();
        let got = results[&SpotId(i)].as_ref().unwrap();
        assert_eq!(*got, expected, "spot {}", i);
    }
}

#[test]
fn test_bulk_isolates_failures() {
    let mut broken = turn_spot(10.0);
    broken.stacks = vec![60.0];
    let states = vec![turn_spot(10.0), broken, turn_spot(30.0)];
    let results = bulk_solve(&states, Some(5), &quick_config(), 2, None).unwrap();

    assert!(results[&SpotId(0)].is_ok());
    assert!(matches!(results[&SpotId(1)], Err(GtoError::SolverConstruction(_))));
    assert!(results[&SpotId(2)].is_ok());
}

#[test]
fn test_bulk_with_no_spots() {
    let results = bulk_solve(&[], Some(5), &quick_config(), 2, None).unwrap();
    assert!(results.is_empty());
}

#[test]
fn test_bulk_cancelled_reports_every_spot() {
    let config = quick_config();
    config.cancel.cancel();
    let states = vec![turn_spot(10.0), turn_spot(20.0)];
    let results = bulk_solve(&states, Some(5), &config, 2, None).unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.values().all(|r| matches!(r, Err(GtoError::Cancelled))));
}

#[test]
fn test_bulk_shares_cache_between_duplicates() {
    let cache = SpotCache::new(CacheConfig::default()).unwrap();
    let states = vec![turn_spot(10.0), turn_spot(10.0), turn_spot(20.0), turn_spot(10.0)];
    let results = bulk_solve(&states, Some(5), &quick_config(), 4, Some(&cache)).unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(cache.len(), 2);
    let first = results[&SpotId(0)].as_ref().unwrap();
    assert_eq!(results[&SpotId(1)].as_ref().unwrap(), first);
    assert_eq!(results[&SpotId(3)].as_ref().unwrap(), first);
}

#[test]
fn test_cache_returns_stored_solution() {
    let cache = SpotCache::new(CacheConfig { capacity: 4 }).unwrap();
    let state = turn_spot(10.0);
    assert!(cache.get(&state).is_none());

    let a = cache.get_or_solve(&state, Some(5), &quick_config()).unwrap();
    let b = cache.get(&state).unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    // A different seed would produce a different solve, but the hit wins.
    let c = cache
        .get_or_solve(&state, Some(5), &SolverConfig::with_seed(99))
        .unwrap();
    assert!(Arc::ptr_eq(&a, &c));
}

#[test]
fn test_cache_hits_after_json_reload() {
    let cache = SpotCache::new(CacheConfig::default()).unwrap();
    let state = turn_spot(10.0)
        .apply(Action::Bet { to: 5.0 })
        .unwrap()
        .apply(Action::Raise { to: 15.0 })
        .unwrap();
    let solved = cache.get_or_solve(&state, Some(3), &quick_config()).unwrap();

    let reloaded = GameState::from_json(&serde_json::to_string(&state).unwrap()).unwrap();
    let hit = cache.get(&reloaded).expect("reloaded state should hit the cache");
    assert!(Arc::ptr_eq(&solved, &hit));
}

#[test]
fn test_cache_evicts_least_recent() {
    let cache = SpotCache::new(CacheConfig { capacity: 2 }).unwrap();
    let (a, b, c) = (turn_spot(10.0), turn_spot(20.0), turn_spot(30.0));
    let config = quick_config();
    cache.get_or_solve(&a, Some(3), &config).unwrap();
    cache.get_or_solve(&b, Some(3), &config).unwrap();
    // Touch `a` so `b` is the oldest.
    assert!(cache.get(&a).is_some());
    cache.get_or_solve(&c, Some(3), &config).unwrap();

    assert_eq!(cache.len(), 2);
    assert!(cache.get(&a).is_some());
    assert!(cache.get(&b).is_none());
    assert!(cache.get(&c).is_some());

    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn test_cache_config_from_json() {
    let config: CacheConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config.capacity, 1024);
    let config: CacheConfig = serde_json::from_str(r#"{"capacity": 0}"#).unwrap();
    assert!(SpotCache::new(config).is_err());
}
