use itertools::Itertools;
use plo_gto::cards::*;
use plo_gto::error::GtoError;
use plo_gto::hand_evaluator::*;

fn five(notation: &str) -> [Card; 5] {
    let v = parse_board(notation).unwrap();
    [v[0], v[1], v[2], v[3], v[4]]
}

fn plo(hole: &str, board: &str) -> HandScore {
    let hole = parse_board(hole).unwrap();
    let board = parse_board(board).unwrap();
    evaluate_plo_best(&hole, &board).unwrap()
}

#[test]
fn test_royal_flush_is_best() {
    assert_eq!(evaluate_5(&five("AsKsQsJsTs")), HandScore::BEST);
}

#[test]
fn test_seven_high_is_worst() {
    assert_eq!(evaluate_5(&five("7h5d4c3s2h")), HandScore::WORST);
}

#[test]
fn test_category_boundaries() {
    // (last score of the stronger category, first of the weaker one)
    let edges = [
        ("5h4h3h2hAh", "AhAdAcAsKh"),
        ("2h2d2c2s3h", "AhAdAcKsKh"),
        ("2h2d2c3s3h", "AhKhQhJh9h"),
        ("7h5h4h3h2h", "AhKdQcJsTh"),
        ("5h4d3c2sAh", "AhAdAcKsQh"),
        ("3h3d2c2s4h", "AhAdKcQsJh"),
        ("2h2d5c4s3h", "AhKdQcJs9h"),
    ];
    for (last, first) in edges {
        let a = evaluate_5(&five(last));
        let b = evaluate_5(&five(first));
        assert_eq!(b.value(), a.value() + 1, "{} then {}", last, first);
        assert_ne!(a.category(), b.category());
        assert!(a.beats(b));
    }
}

#[test]
fn test_categorize_table_edges() {
    let cases = [
        (10, HandCategory::StraightFlush),
        (11, HandCategory::FourOfAKind),
        (166, HandCategory::FourOfAKind),
        (167, HandCategory::FullHouse),
        (322, HandCategory::FullHouse),
        (323, HandCategory::Flush),
        (1599, HandCategory::Flush),
        (1600, HandCategory::Straight),
        (1609, HandCategory::Straight),
        (1610, HandCategory::ThreeOfAKind),
        (2467, HandCategory::ThreeOfAKind),
        (2468, HandCategory::TwoPair),
        (3325, HandCategory::TwoPair),
        (3326, HandCategory::OnePair),
        (6185, HandCategory::OnePair),
        (6186, HandCategory::HighCard),
        (7462, HandCategory::HighCard),
    ];
    for (score, category) in cases {
        assert_eq!(categorize(HandScore(score)), category, "score {}", score);
    }
}

#[test]
fn test_kickers_break_ties() {
    assert!(evaluate_5(&five("AhAdKcQsJh")).beats(evaluate_5(&five("AsAcKdQhTh"))));
    assert_eq!(
        evaluate_5(&five("AhAdKcQsJh")),
        evaluate_5(&five("AsAcKdQhJd"))
    );
}

#[test]
fn test_wheel_ranks_below_six_high_straight() {
    assert!(evaluate_5(&five("6h5d4c3s2h")).beats(evaluate_5(&five("5h4d3c2sAh"))));
}

#[test]
fn test_must_use_exactly_two_hole_cards() {
    // Four hearts in hand and only two on board: no flush.
    let score = plo("AhKhQhJh", "2h7h9cTd3s");
    assert_ne!(score.category(), HandCategory::Flush);
    // One heart in hand with four on board: still no flush.
    let score = plo("Ah2c3d4s", "KhQhJh9h8c");
    assert_ne!(score.category(), HandCategory::Flush);
    // Two in hand plus three on board.
    assert_eq!(plo("AhKh2c3d", "QhJh9h8c7s").category(), HandCategory::Flush);
}

#[test]
fn test_board_quads_do_not_play_alone() {
    // Only three board cards play, so four nines on board are just trips.
    let score = plo("AhKd3c2s", "9h9d9c9sTd");
    assert_eq!(score.category(), HandCategory::ThreeOfAKind);
    // A pocket pair fills up with three of them.
    let boat = plo("TcTh3c2s", "9h9d9c9sAd");
    assert_eq!(boat.category(), HandCategory::FullHouse);
}

#[test]
fn test_result_is_order_invariant() {
    let hole = parse_board("AsKdQh9c").unwrap();
    let board = parse_board("Ts8d7c2h3s").unwrap();
    let expected = evaluate_plo_best(&hole, &board).unwrap();
    for h in hole.iter().copied().permutations(4) {
        for b in board.iter().copied().permutations(5).step_by(7) {
            assert_eq!(evaluate_plo_best(&h, &b).unwrap(), expected);
        }
    }
}

#[test]
fn test_three_and_four_card_boards() {
    assert_eq!(plo("AsAdKcKd", "Ah7d2c").category(), HandCategory::ThreeOfAKind);
    assert_eq!(plo("AsAdKcKd", "Ah7d2cKh").category(), HandCategory::ThreeOfAKind);
    assert_eq!(plo("9s8sKcKd", "7s6s5s").category(), HandCategory::StraightFlush);
}

#[test]
fn test_wrong_hole_count_is_an_error() {
    let board = parse_board("Ah7d2c").unwrap();
    let three = parse_board("AsKsQs").unwrap();
    assert!(matches!(
        evaluate_plo_best(&three, &board),
        Err(GtoError::InvalidHoleCards { got: 3 })
    ));
}

#[test]
fn test_short_board_is_an_error() {
    let hole = parse_board("AsKsQsJs").unwrap();
    for board in ["", "Ah", "Ah7d"] {
        let board = parse_board(board).unwrap();
        assert!(matches!(
            evaluate_plo_best(&hole, &board),
            Err(GtoError::InvalidBoardLength { .. })
        ));
    }
    let six = parse_board("Ah7d2c3c4c5c").unwrap();
    assert!(evaluate_plo_best(&hole, &six).is_err());
}
