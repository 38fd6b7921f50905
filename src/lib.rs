//! Monte-Carlo equity and CFR strategy engine for Pot-Limit Omaha.

pub mod api;
pub mod batch;
pub mod cards;
pub mod equity;
pub mod error;
pub mod game_state;
pub mod hand_evaluator;
pub mod math_engine;
pub mod nodes;
pub mod parallel;
pub mod solver;
pub mod texture;
