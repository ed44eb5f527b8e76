//! 回測結果類型

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::statistics::{MetricsSnapshot, StatsSnapshot};
use crate::domain_types::Transaction;
use crate::sandbox::ScoringSummary;

/// 單日淨值點
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub nav: f64,
    /// 基準以相同初始資金獨立複利的淨值，僅供比較
    pub benchmark_nav: f64,
}

/// 單日回撤點，恆 ≤ 0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawdownPoint {
    pub date: NaiveDate,
    pub drawdown: f64,
}

/// 單日組合報酬點
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// 期末持倉：非零權重按絕對值排名
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Holding {
    pub symbol: String,
    pub weight: f64,
    /// 粗略貢獻估計 = weight × CAGR
    pub contribution: f64,
}

/// 完整的回測最終結果
///
/// 失敗的回測不產生部分結果；已發佈的進度事件不會被撤回。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub run_id: Uuid,
    pub equity: Vec<EquityPoint>,
    pub drawdowns: Vec<DrawdownPoint>,
    pub returns: Vec<ReturnPoint>,
    pub transactions: Vec<Transaction>,
    pub final_metrics: MetricsSnapshot,
    pub final_stats: StatsSnapshot,
    pub top_holdings: Vec<Holding>,
    pub scoring: ScoringSummary,
}
