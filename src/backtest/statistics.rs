//! 統計引擎
//!
//! 對截至當日累積的報酬歷史計算風險/報酬統計。所有函數皆為純函數，
//! 每次調用都從頭重算，不維護運行中的累加器，避免增量更新造成的
//! 數值漂移。所有比率在退化分母（零變異、零歷史）下取 0，絕不產生
//! 非有限值。

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::domain_types::{Weights, TRADING_DAYS_PER_YEAR};

/// 逐日發佈的核心指標快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub nav: f64,
    pub total_return: f64,
    pub cagr: f64,
    pub annual_volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown: f64,
    pub calmar: f64,
    pub hit_rate: f64,
    pub turnover_pct: f64,
    pub gross_leverage: f64,
}

/// 逐日發佈的延伸統計快照
///
/// R² 作為穩定性代理填入 `r_squared`，真正的資訊比率有自己的欄位。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub information_ratio: f64,
    pub alpha: f64,
    pub beta: f64,
    pub r_squared: f64,
    pub idiosyncratic_vol: f64,
    pub omega_ratio: f64,
    pub tail_ratio: f64,
    pub common_sense_ratio: f64,
    pub daily_var_95: f64,
    pub skew: f64,
    pub kurtosis: f64,
}

/// 由累積歷史重算核心指標快照
pub fn compute_metrics(
    initial_capital: f64,
    navs: &[f64],
    returns: &[f64],
    total_turnover: f64,
    weights: &Weights,
) -> MetricsSnapshot {
    let nav = navs.last().copied().unwrap_or(initial_capital);
    let total_return = if initial_capital > 0.0 {
        nav / initial_capital - 1.0
    } else {
        0.0
    };
    let cagr = cagr(initial_capital, nav, returns.len());
    let max_drawdown = max_drawdown(navs);

    MetricsSnapshot {
        nav,
        total_return,
        cagr,
        annual_volatility: std_dev(returns) * TRADING_DAYS_PER_YEAR.sqrt(),
        sharpe: sharpe(returns),
        sortino: sortino(returns),
        max_drawdown,
        calmar: calmar(cagr, max_drawdown),
        hit_rate: hit_rate(returns),
        turnover_pct: turnover_pct(total_turnover, returns.len()),
        gross_leverage: gross_leverage(weights),
    }
}

/// 由累積歷史重算延伸統計快照
pub fn compute_stats(returns: &[f64], benchmark_returns: &[f64]) -> StatsSnapshot {
    let (alpha, beta, r_squared, idiosyncratic_vol) = alpha_beta(returns, benchmark_returns);
    let tail = tail_ratio(returns);

    StatsSnapshot {
        information_ratio: information_ratio(returns, benchmark_returns),
        alpha,
        beta,
        r_squared,
        idiosyncratic_vol,
        omega_ratio: omega_ratio(returns),
        tail_ratio: tail,
        common_sense_ratio: tail * gain_to_pain(returns).max(0.0),
        daily_var_95: percentile(returns, 0.05),
        skew: skew(returns),
        kurtosis: excess_kurtosis(returns),
    }
}

/// 平均日報酬，空歷史取 0
pub fn mean(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        0.0
    } else {
        returns.iter().mean()
    }
}

/// 日報酬標準差（母體），不足兩筆取 0
pub fn std_dev(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        0.0
    } else {
        returns.iter().population_std_dev()
    }
}

/// 年化複合報酬率，years = max(1/252, n/252)
pub fn cagr(start_nav: f64, end_nav: f64, num_days: usize) -> f64 {
    if start_nav <= 0.0 || end_nav <= 0.0 {
        return 0.0;
    }
    let years = (num_days as f64 / TRADING_DAYS_PER_YEAR).max(1.0 / TRADING_DAYS_PER_YEAR);
    (end_nav / start_nav).powf(1.0 / years) - 1.0
}

/// 夏普比率 = (mean/stdev) × √252，零變異取 0
pub fn sharpe(returns: &[f64]) -> f64 {
    let sd = std_dev(returns);
    if sd == 0.0 {
        0.0
    } else {
        mean(returns) / sd * TRADING_DAYS_PER_YEAR.sqrt()
    }
}

/// 索提諾比率：分母只取負報酬子集的標準差
pub fn sortino(returns: &[f64]) -> f64 {
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let sd = std_dev(&downside);
    if sd == 0.0 {
        0.0
    } else {
        mean(returns) / sd * TRADING_DAYS_PER_YEAR.sqrt()
    }
}

/// 最大回撤：min over time of nav/runningPeak − 1，恆 ≤ 0
pub fn max_drawdown(navs: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0f64;
    for &nav in navs {
        peak = peak.max(nav);
        if peak > 0.0 {
            worst = worst.min(nav / peak - 1.0);
        }
    }
    worst
}

/// 卡瑪比率 = CAGR / |max drawdown|，回撤為零取 0
pub fn calmar(cagr: f64, max_drawdown: f64) -> f64 {
    if max_drawdown == 0.0 {
        0.0
    } else {
        cagr / max_drawdown.abs()
    }
}

/// 正報酬日佔比
pub fn hit_rate(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|r| **r > 0.0).count() as f64 / returns.len() as f64
}

/// 換手率百分比 = 累計換手 / 模擬天數 × 100
pub fn turnover_pct(total_turnover: f64, num_days: usize) -> f64 {
    if num_days == 0 {
        0.0
    } else {
        total_turnover / num_days as f64 * 100.0
    }
}

/// 總曝險 = Σ|weight|；尚未首次再平衡（全零）時默認 2
pub fn gross_leverage(weights: &Weights) -> f64 {
    let gross: f64 = weights.values().map(|w| w.abs()).sum();
    if gross == 0.0 {
        2.0
    } else {
        gross
    }
}

/// 資訊比率：對共同長度的配對窗口計算超額報酬的 mean/stdev × √252
pub fn information_ratio(returns: &[f64], benchmark_returns: &[f64]) -> f64 {
    let diffs: Vec<f64> = returns
        .iter()
        .zip(benchmark_returns.iter())
        .map(|(r, b)| r - b)
        .collect();
    let sd = std_dev(&diffs);
    if sd == 0.0 {
        0.0
    } else {
        mean(&diffs) / sd * TRADING_DAYS_PER_YEAR.sqrt()
    }
}

/// 對基準日報酬做普通最小二乘回歸
///
/// 回傳 (年化 alpha ×252, beta, R² 下夾 0, 殘差標準差 ×√252)。
/// 樣本不足或基準零變異時全取 0。
pub fn alpha_beta(returns: &[f64], benchmark_returns: &[f64]) -> (f64, f64, f64, f64) {
    let n = returns.len().min(benchmark_returns.len());
    if n < 2 {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let y = &returns[..n];
    let x = &benchmark_returns[..n];

    let mean_x = mean(x);
    let mean_y = mean(y);
    let var_x: f64 = x.iter().map(|v| (v - mean_x).powi(2)).sum::<f64>() / n as f64;
    if var_x == 0.0 {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let cov: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(xv, yv)| (xv - mean_x) * (yv - mean_y))
        .sum::<f64>()
        / n as f64;

    let beta = cov / var_x;
    let alpha_daily = mean_y - beta * mean_x;

    let residuals: Vec<f64> = x
        .iter()
        .zip(y.iter())
        .map(|(xv, yv)| yv - (alpha_daily + beta * xv))
        .collect();
    let ssr: f64 = residuals.iter().map(|e| e * e).sum();
    let sst: f64 = y.iter().map(|v| (v - mean_y).powi(2)).sum();
    let r_squared = if sst == 0.0 {
        0.0
    } else {
        (1.0 - ssr / sst).max(0.0)
    };
    let idio_vol = std_dev(&residuals) * TRADING_DAYS_PER_YEAR.sqrt();

    (
        alpha_daily * TRADING_DAYS_PER_YEAR,
        beta,
        r_squared,
        idio_vol,
    )
}

/// 歐米伽比率 = Σ正報酬 / |Σ負報酬|，無負報酬取 0
pub fn omega_ratio(returns: &[f64]) -> f64 {
    let pos: f64 = returns.iter().filter(|r| **r > 0.0).sum();
    let neg: f64 = returns.iter().filter(|r| **r < 0.0).sum();
    if neg == 0.0 {
        0.0
    } else {
        pos / neg.abs()
    }
}

/// 線性插值百分位數，q ∈ [0, 1]
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

/// 尾部比率 = P95 / |P5|，左尾為零取 0
pub fn tail_ratio(returns: &[f64]) -> f64 {
    let p95 = percentile(returns, 0.95);
    let p5 = percentile(returns, 0.05);
    if p5 == 0.0 {
        0.0
    } else {
        p95 / p5.abs()
    }
}

/// 盈痛比 = (Σ正 − |Σ負|) / |Σ負|，無負報酬取 0
pub fn gain_to_pain(returns: &[f64]) -> f64 {
    let pos: f64 = returns.iter().filter(|r| **r > 0.0).sum();
    let neg: f64 = returns.iter().filter(|r| **r < 0.0).sum::<f64>().abs();
    if neg == 0.0 {
        0.0
    } else {
        (pos - neg) / neg
    }
}

/// 偏度：三階標準化動差，零變異取 0
pub fn skew(returns: &[f64]) -> f64 {
    standardized_moment(returns, 3)
}

/// 超額峰度：四階標準化動差 − 3，零變異取 0
pub fn excess_kurtosis(returns: &[f64]) -> f64 {
    let m4 = standardized_moment(returns, 4);
    if m4 == 0.0 {
        0.0
    } else {
        m4 - 3.0
    }
}

fn standardized_moment(returns: &[f64], order: i32) -> f64 {
    let n = returns.len();
    if n < 2 {
        return 0.0;
    }
    let mu = mean(returns);
    let m2: f64 = returns.iter().map(|r| (r - mu).powi(2)).sum::<f64>() / n as f64;
    if m2 == 0.0 {
        return 0.0;
    }
    let mk: f64 = returns.iter().map(|r| (r - mu).powi(order)).sum::<f64>() / n as f64;
    mk / m2.powf(order as f64 / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_zero_variance_ratios_are_zero() {
        let flat = vec![0.0; 20];
        assert_eq!(sharpe(&flat), 0.0);
        assert_eq!(sortino(&flat), 0.0);
        assert_eq!(calmar(cagr(100.0, 100.0, 20), max_drawdown(&[100.0; 20])), 0.0);
    }

    #[test]
    fn test_empty_history_is_all_zero_and_finite() {
        let metrics = compute_metrics(100_000.0, &[], &[], 0.0, &HashMap::new());
        let stats = compute_stats(&[], &[]);
        for v in [
            metrics.total_return,
            metrics.cagr,
            metrics.sharpe,
            metrics.sortino,
            metrics.max_drawdown,
            stats.information_ratio,
            stats.alpha,
            stats.beta,
            stats.omega_ratio,
            stats.tail_ratio,
            stats.skew,
            stats.kurtosis,
        ] {
            assert!(v.is_finite());
            assert_eq!(v, 0.0);
        }
    }

    #[test]
    fn test_max_drawdown_is_nonpositive_and_zero_at_peak() {
        let navs = vec![100.0, 110.0, 99.0, 120.0, 90.0];
        let dd = max_drawdown(&navs);
        assert!(dd <= 0.0);
        assert!((dd - (90.0 / 120.0 - 1.0)).abs() < EPS);

        // 單調上升序列的回撤為 0
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_hit_rate() {
        let returns = vec![0.01, -0.02, 0.03, 0.0];
        assert!((hit_rate(&returns) - 0.5).abs() < EPS);
    }

    #[rstest]
    #[case(&[1.0, 2.0, 3.0, 4.0, 5.0], 0.5, 3.0)]
    #[case(&[1.0, 2.0, 3.0, 4.0], 0.5, 2.5)]
    #[case(&[10.0], 0.95, 10.0)]
    fn test_percentile_linear_interpolation(
        #[case] values: &[f64],
        #[case] q: f64,
        #[case] expected: f64,
    ) {
        assert!((percentile(values, q) - expected).abs() < EPS);
    }

    #[test]
    fn test_beta_of_identical_series_is_one() {
        let series = vec![0.01, -0.02, 0.015, 0.003, -0.007, 0.012];
        let (alpha, beta, r_squared, idio) = alpha_beta(&series, &series);
        assert!(alpha.abs() < EPS);
        assert!((beta - 1.0).abs() < EPS);
        assert!((r_squared - 1.0).abs() < EPS);
        assert!(idio.abs() < 1e-6);
    }

    #[test]
    fn test_flat_benchmark_degenerates_to_zero() {
        let strategy = vec![0.01, -0.02, 0.015];
        let flat = vec![0.0, 0.0, 0.0];
        assert_eq!(alpha_beta(&strategy, &flat), (0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn test_omega_and_gain_to_pain() {
        let returns = vec![0.02, -0.01, 0.03, -0.01];
        assert!((omega_ratio(&returns) - 2.5).abs() < EPS);
        assert!((gain_to_pain(&returns) - 1.5).abs() < EPS);

        // 無負報酬：兩者皆取 0
        let up_only = vec![0.01, 0.02];
        assert_eq!(omega_ratio(&up_only), 0.0);
        assert_eq!(gain_to_pain(&up_only), 0.0);
    }

    #[test]
    fn test_gross_leverage_defaults_to_two_when_flat() {
        assert_eq!(gross_leverage(&HashMap::new()), 2.0);

        let mut weights = HashMap::new();
        weights.insert("A".to_string(), 0.5);
        weights.insert("B".to_string(), -0.5);
        assert!((gross_leverage(&weights) - 1.0).abs() < EPS);
    }

    #[test]
    fn test_cagr_one_year_doubling() {
        // 252 個交易日翻倍 → CAGR = 100%
        assert!((cagr(100.0, 200.0, 252) - 1.0).abs() < EPS);
        // 短於一日的歷史以 1/252 年下限計
        assert!(cagr(100.0, 101.0, 0) > 0.0);
    }

    #[test]
    fn test_skew_and_kurtosis_of_symmetric_series() {
        let symmetric = vec![-0.02, -0.01, 0.0, 0.01, 0.02];
        assert!(skew(&symmetric).abs() < EPS);
        // 常數序列退化為 0
        assert_eq!(skew(&[0.01; 10]), 0.0);
        assert_eq!(excess_kurtosis(&[0.01; 10]), 0.0);
    }
}
