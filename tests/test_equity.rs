use approx::assert_relative_eq;
use plo_gto::cards::*;
use plo_gto::equity::*;
use plo_gto::error::GtoError;

fn h(notation: &str) -> Hand {
    parse_hand(notation).unwrap()
}

fn seeded(seed: u64) -> SimulationConfig {
    SimulationConfig {
        workers: Some(2),
        ..SimulationConfig::with_seed(seed)
    }
}

#[test]
fn test_complete_board_is_deterministic() {
    // Trip aces against a pair of queens on a finished board.
    let board = Board::Single(parse_board("Ah7d2c9sKh").unwrap());
    let result = simulate_equity(&[h("AsAdKcKd"), h("QhQdJcJs")], &board, 1, &seeded(1)).unwrap();
    assert_eq!(result.equity_pct(), vec![100.0, 0.0]);
    assert_eq!(result.tie_pct(), vec![0.0, 0.0]);
}

#[test]
fn test_full_double_board_is_deterministic() {
    let board = Board::Double {
        top: parse_board("Ah7d2c9sKh").unwrap(),
        bottom: parse_board("Ac8d3h4s5c").unwrap(),
    };
    let result = simulate_equity(&[h("AsAdKcKd"), h("QhQdJcJs")], &board, 1, &seeded(1)).unwrap();
    // Aces make trips on top and trips on the bottom.
    assert_eq!(result.equity_pct(), vec![100.0, 0.0]);
}

#[test]
fn test_aces_favoured_preflop() {
    let board = Board::Single(Vec::new());
    let result = simulate_equity(&[h("AsAhKsKh"), h("7c6d3h2s")], &board, 4000, &seeded(7)).unwrap();
    let eq = result.equity_pct();
    assert!(eq[0] > 65.0, "aces only at {:.1}%", eq[0]);
    assert_eq!(result.iterations, 4000);
}

#[test]
fn test_co_winner_equity_sums_to_hundred() {
    let config = SimulationConfig {
        tie_credit: TieCredit::CoWinners,
        ..seeded(3)
    };
    let board = Board::Single(parse_board("Th9h2c").unwrap());
    let hands = [h("AsKsQdJd"), h("AcKcQhJh"), h("8s8d7c6c")];
    let result = simulate_equity(&hands, &board, 3000, &config).unwrap();
    let total: f64 = result.equity_pct().iter().sum();
    assert_relative_eq!(total, 100.0, epsilon = 1e-6);
}

#[test]
fn test_pot_share_never_exceeds_hundred() {
    let board = Board::Single(parse_board("Th9h2c").unwrap());
    let hands = [h("AsKsQdJd"), h("AcKcQhJh"), h("8s8d7c6c")];
    let result = simulate_equity(&hands, &board, 3000, &seeded(3)).unwrap();
    let total: f64 = result.equity_pct().iter().sum();
    assert!(total <= 100.0 + 1e-6);
    for (w, (t, l)) in result.wins.iter().zip(result.ties.iter().zip(result.losses())) {
        assert_eq!(w + t + l, 3000);
    }
}

#[test]
fn test_same_seed_same_counts() {
    let board = Board::Single(parse_board("Ts9s2d").unwrap());
    let hands = [h("AsKsQhJh"), h("TcThTd8c")];
    let a = simulate_equity(&hands, &board, 2000, &seeded(42)).unwrap();
    let b = simulate_equity(&hands, &board, 2000, &seeded(42)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_duplicate_between_hands_rejected() {
    let board = Board::Single(Vec::new());
    let err = simulate_equity(&[h("AsKsQhJh"), h("AsQdJd2c")], &board, 10, &seeded(1)).unwrap_err();
    assert!(matches!(err, GtoError::DuplicateCard(_)));
}

#[test]
fn test_duplicate_between_boards_rejected() {
    let board = Board::Double {
        top: parse_board("2c3c4c").unwrap(),
        bottom: parse_board("4c5c6c").unwrap(),
    };
    let err = simulate_equity(&[h("AsKsQhJh")], &board, 10, &seeded(1)).unwrap_err();
    assert!(matches!(err, GtoError::DuplicateCard(_)));
}

#[test]
fn test_bad_board_length_rejected() {
    let board = Board::Single(parse_board("2c3c").unwrap());
    let err = simulate_equity(&[h("AsKsQhJh"), h("TcThTd8c")], &board, 10, &seeded(1)).unwrap_err();
    assert!(matches!(err, GtoError::InvalidBoardLength { len: 2 }));
}

#[test]
fn test_zero_iterations_rejected() {
    let board = Board::Single(Vec::new());
    assert!(simulate_equity(&[h("AsKsQhJh")], &board, 0, &seeded(1)).is_err());
}

#[test]
fn test_estimate_breakdowns_count_every_hand() {
    let board = parse_board("Ts9s2d").unwrap();
    let result =
        simulate_estimated_equity(&h("AsKsQhJh"), &board, 1000, &[], 0, 2, &seeded(5)).unwrap();
    assert_eq!(result.opponents, 2);
    assert_eq!(result.hand_breakdown.total(), 1000);
    assert_eq!(result.opponent_breakdown.total(), 2000);
    assert!(result.equity_pct() > 0.0 && result.equity_pct() < 100.0);
}

#[test]
fn test_estimate_caps_iterations_by_combinations() {
    let board = parse_board("Ts9s2d").unwrap();
    let result =
        simulate_estimated_equity(&h("AsKsQhJh"), &board, 1000, &[], 250, 1, &seeded(5)).unwrap();
    assert_eq!(result.iterations, 250);
}

#[test]
fn test_estimate_caps_opponents_by_deck() {
    // 45 cards left, 2 go to the board: 43 / 4 = 10 opponents.
    let board = parse_board("Ts9s2d").unwrap();
    let result =
        simulate_estimated_equity(&h("AsKsQhJh"), &board, 100, &[], 0, 15, &seeded(5)).unwrap();
    assert_eq!(result.opponents, 10);
}

#[test]
fn test_folded_card_duplicate_rejected() {
    let board = parse_board("Ts9s2d").unwrap();
    let folded = parse_board("Ts").unwrap();
    let err = simulate_estimated_equity(&h("AsKsQhJh"), &board, 100, &folded, 0, 1, &seeded(5))
        .unwrap_err();
    assert!(matches!(err, GtoError::DuplicateCard(_)));
}

fn nearly_empty_deck() -> (Hand, Vec<Card>, Vec<Card>) {
    let hero = h("AsKsQhJh");
    let board = parse_board("Ts9s2d3c4c").unwrap();
    let mut used = CardSet::new();
    used.insert_all(hero.cards()).unwrap();
    used.insert_all(&board).unwrap();
    let folded: Vec<Card> = (0..52u8)
        .map(|i| Card::from_index(i).unwrap())
        .filter(|c| !used.contains(*c))
        .take(40)
        .collect();
    (hero, board, folded)
}

#[test]
fn test_short_deck_rejected_by_default() {
    let (hero, board, folded) = nearly_empty_deck();
    let err = simulate_estimated_equity(&hero, &board, 100, &folded, 0, 1, &seeded(1)).unwrap_err();
    assert!(matches!(err, GtoError::InsufficientCards { .. }));
}

#[test]
fn test_short_deck_counted_as_loss() {
    let (hero, board, folded) = nearly_empty_deck();
    let config = SimulationConfig {
        short_deck: ShortDeckPolicy::CountAsLoss,
        ..seeded(1)
    };
    let result = simulate_estimated_equity(&hero, &board, 100, &folded, 0, 1, &config).unwrap();
    assert_eq!(result.opponents, 0);
    assert_eq!(result.losses(), 100);
    assert_eq!(result.equity_pct(), 0.0);
}

#[test]
fn test_double_board_invariants() {
    let hands = [h("AsKsQhJh"), h("TcThTd8c"), h("7s6s5d4d")];
    let top = parse_board("Ts9s2d").unwrap();
    let bottom = parse_board("Kd8h3c").unwrap();
    let stats = calculate_double_board_stats(&hands, &top, &bottom, 2000, &seeded(9)).unwrap();
    assert_eq!(stats.iterations, 2000);

    for i in 0..hands.len() {
        assert!(stats.scoop_both[i] <= stats.split_top[i].min(stats.split_bottom[i]) + 1e-12);
        assert!(stats.chop_both[i] <= stats.split_top[i].min(stats.split_bottom[i]) + 1e-12);
        assert!(stats.scoop_both[i] + stats.chop_both[i] <= 1.0 + 1e-12);
    }
    // Every board has at least one winner each iteration.
    assert!(stats.split_top.iter().sum::<f64>() >= 1.0 - 1e-12);
    assert!(stats.split_bottom.iter().sum::<f64>() >= 1.0 - 1e-12);
    assert!(stats.scoop_both.iter().sum::<f64>() <= 1.0 + 1e-12);
}

#[test]
fn test_double_board_identical_hands_always_chop() {
    // Same ranks in different suits; neither hand can make a flush.
    let hands = [h("AsKdQs9d"), h("AcKhQc9h")];
    let top = parse_board("2s3d4c5h7s").unwrap();
    let bottom = parse_board("2h3c4d5s7d").unwrap();
    let stats = calculate_double_board_stats(&hands, &top, &bottom, 5, &seeded(2)).unwrap();
    assert_eq!(stats.chop_both, vec![1.0, 1.0]);
    assert_eq!(stats.scoop_both, vec![0.0, 0.0]);
}

#[test]
fn test_showdown_equity_splits_between_boards() {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    let board = Board::Double {
        top: parse_board("Ah7d2c9sKh").unwrap(),
        bottom: parse_board("QcJd3h4s5c").unwrap(),
    };
    let mut rng = StdRng::seed_from_u64(0);
    let shares = showdown_equity(&[h("AsAdKcKd"), h("QhQdJcJs")], &board, 10, &mut rng).unwrap();
    // Aces scoop the top, queens take the bottom with a set.
    assert_relative_eq!(shares[0], 0.5);
    assert_relative_eq!(shares[1], 0.5);
}

#[test]
fn test_cancelled_simulation_stops() {
    let config = seeded(1);
    config.cancel.cancel();
    let board = Board::Single(Vec::new());
    let err = simulate_equity(&[h("AsKsQhJh"), h("TcThTd8c")], &board, 5000, &config).unwrap_err();
    assert!(matches!(err, GtoError::Cancelled));
}
