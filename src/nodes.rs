//! Regret and strategy storage for the CFR solver.
//!
//! Nodes live in one contiguous arena; a map from information-set key to
//! arena slot is the only hashed lookup on the hot path.
//!
//! Invariants: `regret_sum` and `strategy_sum` have one entry per action;
//! every strategy handed out is a probability vector (entries in [0, 1]
//! summing to one).

use std::collections::HashMap;

use crate::game_state::{Action, InfoSet};

/// Accumulators for one information set.
#[derive(Debug, Clone)]
pub struct StrategyNode {
    pub actions: Vec<Action>,
    regret_sum: Vec<f64>,
    strategy_sum: Vec<f64>,
    visits: u64,
}

impl StrategyNode {
    pub fn new(actions: Vec<Action>) -> Self {
        let na = actions.len();
        StrategyNode {
            actions,
            regret_sum: vec![0.0; na],
            strategy_sum: vec![0.0; na],
            visits: 0,
        }
    }

    pub fn num_actions(&self) -> usize {
        self.actions.len()
    }

    pub fn visits(&self) -> u64 {
        self.visits
    }

    /// Regret matching: proportional to positive regret, uniform when no
    /// action has any.
    pub fn current_strategy(&self) -> Vec<f64> {
        let na = self.num_actions();
        let positive_sum: f64 = self.regret_sum.iter().map(|r| r.max(0.0)).sum();
        if positive_sum > 0.0 {
            self.regret_sum
                .iter()
                .map(|r| r.max(0.0) / positive_sum)
                .collect()
        } else {
            vec![1.0 / na as f64; na]
        }
    }

    /// Normalized cumulative strategy; uniform before any weight arrives.
    pub fn average_strategy(&self) -> Vec<f64> {
        let na = self.num_actions();
        let total: f64 = self.strategy_sum.iter().sum();
        if total > 0.0 {
            self.strategy_sum.iter().map(|s| s / total).collect()
        } else {
            vec![1.0 / na as f64; na]
        }
    }

    /// Accumulates one visit.
    ///
    /// - `action_values`: the acting player's utility after each action
    /// - `node_value`: their utility under `strategy`
    /// - `cf_reach`: product of every other player's reach probability
    /// - `own_reach`: the acting player's reach, weighting the strategy sum
    ///
    /// With `floor` set, cumulative regrets are clamped at zero (CFR+).
    pub fn update(
        &mut self,
        action_values: &[f64],
        node_value: f64,
        cf_reach: f64,
        strategy: &[f64],
        own_reach: f64,
        floor: bool,
    ) {
        for i in 0..self.num_actions() {
            let regret = self.regret_sum[i] + cf_reach * (action_values[i] - node_value);
            self.regret_sum[i] = if floor { regret.max(0.0) } else { regret };
            self.strategy_sum[i] += own_reach * strategy[i];
        }
        self.visits += 1;
    }

    /// Shannon entropy of the average strategy divided by `ln(actions)`,
    /// so 0 is pure and 1 is uniform.
    pub fn normalized_entropy(&self) -> f64 {
        let na = self.num_actions();
        if na < 2 {
            return 0.0;
        }
        let h: f64 = self
            .average_strategy()
            .iter()
            .filter(|&&p| p > 0.0)
            .map(|&p| -p * p.ln())
            .sum();
        (h / (na as f64).ln()).clamp(0.0, 1.0)
    }
}

/// Arena of strategy nodes keyed by information set.
#[derive(Debug, Clone, Default)]
pub struct NodeTable {
    index: HashMap<InfoSet, usize>,
    keys: Vec<InfoSet>,
    nodes: Vec<StrategyNode>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Slot for `key`, creating a node over `actions` on first sight.
    pub fn get_or_insert(&mut self, key: InfoSet, actions: &[Action]) -> usize {
        if let Some(&slot) = self.index.get(&key) {
            return slot;
        }
        let slot = self.nodes.len();
        self.nodes.push(StrategyNode::new(actions.to_vec()));
        self.keys.push(key.clone());
        self.index.insert(key, slot);
        slot
    }

    pub fn get(&self, key: &InfoSet) -> Option<&StrategyNode> {
        self.index.get(key).map(|&slot| &self.nodes[slot])
    }

    pub fn node(&self, slot: usize) -> &StrategyNode {
        &self.nodes[slot]
    }

    pub fn node_mut(&mut self, slot: usize) -> &mut StrategyNode {
        &mut self.nodes[slot]
    }

    /// Nodes in creation order with their keys.
    pub fn iter(&self) -> impl Iterator<Item = (&InfoSet, &StrategyNode)> {
        self.keys.iter().zip(self.nodes.iter())
    }

    /// Visit-weighted mean normalized entropy over all nodes with a real
    /// choice. Zero for an empty table.
    pub fn mean_entropy(&self) -> f64 {
        let (weighted, visits) = self
            .nodes
            .iter()
            .filter(|n| n.num_actions() > 1 && n.visits > 0)
            .fold((0.0, 0u64), |(w, v), n| {
                (w + n.normalized_entropy() * n.visits as f64, v + n.visits)
            });
        if visits == 0 {
            0.0
        } else {
            weighted / visits as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_way() -> StrategyNode {
        StrategyNode::new(vec![Action::Check, Action::Bet { to: 10.0 }])
    }

    #[test]
    fn initial_strategy_is_uniform() {
        let node = StrategyNode::new(vec![Action::Fold, Action::Call, Action::Raise { to: 30.0 }]);
        for p in node.current_strategy() {
            assert_relative_eq!(p, 1.0 / 3.0);
        }
        for p in node.average_strategy() {
            assert_relative_eq!(p, 1.0 / 3.0);
        }
    }

    #[test]
    fn update_shifts_strategy() {
        let mut node = two_way();
        let s = node.current_strategy();
        node.update(&[1.0, -1.0], 0.0, 1.0, &s, 1.0, false);
        let cur = node.current_strategy();
        assert_relative_eq!(cur[0], 1.0);
        assert_relative_eq!(cur[1], 0.0);
        assert_eq!(node.visits(), 1);
    }

    #[test]
    fn vanilla_keeps_negative_regret() {
        let mut node = two_way();
        let s = node.current_strategy();
        node.update(&[-1.0, 1.0], 0.0, 1.0, &s, 1.0, false);
        // Second visit favours action 0 by less than the first penalised it.
        let s = node.current_strategy();
        node.update(&[0.5, 0.0], 0.0, 1.0, &s, 1.0, false);
        assert_relative_eq!(node.current_strategy()[1], 1.0);
    }

    #[test]
    fn floor_clamps_regret_at_zero() {
        let mut node = two_way();
        let s = node.current_strategy();
        node.update(&[-1.0, 1.0], 0.0, 1.0, &s, 1.0, true);
        let s = node.current_strategy();
        node.update(&[0.5, 0.0], 0.0, 1.0, &s, 1.0, true);
        let cur = node.current_strategy();
        assert!(cur[0] > 0.0);
        assert_relative_eq!(cur.iter().sum::<f64>(), 1.0);
    }

    #[test]
    fn counterfactual_reach_scales_regret() {
        let mut a = two_way();
        let mut b = two_way();
        let s = a.current_strategy();
        a.update(&[1.0, 0.0], 0.5, 0.1, &s, 1.0, false);
        b.update(&[1.0, 0.0], 0.5, 1.0, &s, 1.0, false);
        b.update(&[0.0, 1.0], 0.5, 0.5, &s, 1.0, false);
        assert_relative_eq!(a.current_strategy()[0], 1.0);
        assert!(b.current_strategy()[0] > 0.5);
    }

    #[test]
    fn average_strategy_is_probability_vector() {
        let mut node = StrategyNode::new(vec![Action::Check, Action::Bet { to: 5.0 }, Action::Bet { to: 10.0 }]);
        for (i, values) in [[1.0, 0.0, -1.0], [0.0, 2.0, 0.5], [-1.0, 0.0, 3.0]]
            .iter()
            .enumerate()
        {
            let s = node.current_strategy();
            node.update(values, 0.3, 1.0, &s, 0.5 + i as f64, false);
        }
        let avg = node.average_strategy();
        assert!(avg.iter().all(|p| (0.0..=1.0).contains(p)));
        assert_relative_eq!(avg.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn entropy_bounds() {
        let uniform = two_way();
        assert_relative_eq!(uniform.normalized_entropy(), 1.0);
        let mut pure = two_way();
        let s = vec![1.0, 0.0];
        pure.update(&[1.0, 0.0], 1.0, 1.0, &s, 1.0, false);
        assert_relative_eq!(pure.normalized_entropy(), 0.0);
        assert_eq!(StrategyNode::new(vec![Action::Check]).normalized_entropy(), 0.0);
    }

    #[test]
    fn table_reuses_slots() {
        let mut table = NodeTable::new();
        let key = InfoSet::from("p0|f|abc");
        let a = table.get_or_insert(key.clone(), &[Action::Check, Action::Bet { to: 3.0 }]);
        let b = table.get_or_insert(key.clone(), &[Action::Check]);
        assert_eq!(a, b);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(&key).unwrap().num_actions(), 2);
        assert_eq!(table.mean_entropy(), 0.0);
    }
}
