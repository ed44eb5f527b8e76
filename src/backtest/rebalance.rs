//! 再平衡策略
//!
//! 對單一再平衡日的分數做穩定降序排名，選出多/空兩腿並產生等權重
//! 目標權重。每次再平衡都是權重的整組重建，不做增量調整。

use std::collections::HashMap;

use crate::domain_types::Weights;

/// 缺少外部分數的商品使用的哨兵值：保證排在所有真實分數之後，
/// 永遠不會擠掉有真實分數的商品進入多頭腿
pub const MISSING_SCORE: f64 = f64::NEG_INFINITY;

/// 再平衡選擇策略
#[derive(Debug, Clone, Copy)]
pub struct RebalancePolicy {
    long_count: usize,
    short_count: usize,
}

impl RebalancePolicy {
    /// 多/空腿大小下限均為 1
    pub fn new(long_count: usize, short_count: usize) -> Self {
        Self {
            long_count: long_count.max(1),
            short_count: short_count.max(1),
        }
    }

    /// 依分數選出目標權重
    ///
    /// 排名為分數降序，平手以 `symbols` 的輸入順序決定（穩定排序）。
    /// 多頭腿各得 +1/longCount，空頭腿各得 −1/shortCount，其餘為 0。
    pub fn select_weights(&self, symbols: &[String], scores: &HashMap<String, f64>) -> Weights {
        let mut ranked: Vec<&String> = symbols.iter().collect();
        // sort_by 是穩定排序；缺分的商品以哨兵值墊底
        ranked.sort_by(|a, b| {
            let sa = scores.get(*a).copied().unwrap_or(MISSING_SCORE);
            let sb = scores.get(*b).copied().unwrap_or(MISSING_SCORE);
            sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut weights: Weights = symbols.iter().map(|s| (s.clone(), 0.0)).collect();

        let long_weight = 1.0 / self.long_count as f64;
        for symbol in ranked.iter().take(self.long_count) {
            weights.insert((*symbol).clone(), long_weight);
        }

        let short_weight = -1.0 / self.short_count as f64;
        for symbol in ranked.iter().rev().take(self.short_count) {
            weights.insert((*symbol).clone(), short_weight);
        }

        weights
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn scores(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(s, v)| (s.to_string(), *v)).collect()
    }

    #[test]
    fn test_legs_are_equal_weighted_and_sum_to_unit() {
        let policy = RebalancePolicy::new(2, 1);
        let universe = symbols(&["A", "B", "C", "D", "E"]);
        let weights = policy.select_weights(
            &universe,
            &scores(&[("A", 0.5), ("B", 0.3), ("C", 0.1), ("D", -0.2), ("E", -0.6)]),
        );

        assert_eq!(weights["A"], 0.5);
        assert_eq!(weights["B"], 0.5);
        assert_eq!(weights["C"], 0.0);
        assert_eq!(weights["D"], 0.0);
        assert_eq!(weights["E"], -1.0);

        let long_sum: f64 = weights.values().filter(|w| **w > 0.0).sum();
        let short_sum: f64 = weights.values().filter(|w| **w < 0.0).sum();
        assert!((long_sum - 1.0).abs() < 1e-12);
        assert!((short_sum + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ties_broken_by_input_order() {
        let policy = RebalancePolicy::new(1, 1);
        let universe = symbols(&["X", "Y", "Z"]);
        // X 與 Y 同分：穩定排序下 X 在前，入選多頭腿
        let weights =
            policy.select_weights(&universe, &scores(&[("X", 1.0), ("Y", 1.0), ("Z", 0.0)]));

        assert_eq!(weights["X"], 1.0);
        assert_eq!(weights["Y"], 0.0);
        assert_eq!(weights["Z"], -1.0);
    }

    #[test]
    fn test_missing_scores_never_selected_long_over_real_scores() {
        let policy = RebalancePolicy::new(2, 1);
        let universe = symbols(&["A", "B", "C", "D"]);
        // C、D 無分數：即使 A、B 分數為負仍優先進多頭腿
        let weights = policy.select_weights(&universe, &scores(&[("A", -0.9), ("B", -0.5)]));

        assert!(weights["A"] > 0.0);
        assert!(weights["B"] > 0.0);
        assert!(weights["C"] <= 0.0);
        assert!(weights["D"] < 0.0);
    }

    #[test]
    fn test_leg_sizes_clamped_to_minimum_one() {
        let policy = RebalancePolicy::new(0, 0);
        let universe = symbols(&["A", "B", "C"]);
        let weights =
            policy.select_weights(&universe, &scores(&[("A", 1.0), ("B", 0.5), ("C", 0.0)]));

        assert_eq!(weights["A"], 1.0);
        assert_eq!(weights["C"], -1.0);
    }
}
