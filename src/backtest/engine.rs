//! 組合模擬引擎
//!
//! 逐日驅動迴圈的狀態機：`NotStarted → Running → {Completed, Failed,
//! Cancelled}`，不可重入，每個回測一個實例。引擎獨佔自己的權重映射
//! 與淨值/報酬歷史；對齊後的價格序列全程唯讀，可在併發回測間共享。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::rebalance::{RebalancePolicy, MISSING_SCORE};
use super::results::{BacktestResult, DrawdownPoint, EquityPoint, Holding, ReturnPoint};
use super::statistics::{compute_metrics, compute_stats};
use crate::domain_types::{
    AlignedSeries, DomainError, ScoreMap, SymbolScores, TradeSide, Transaction, Weights,
};
use crate::event::{ProgressEvent, ProgressSink};
use crate::sandbox::{ScoringErrorKind, ScoringSandbox, ScoringSummary};
use crate::utils::time_utils::format_date;

/// 權重變化視為交易的最小閾值
const WEIGHT_EPSILON: f64 = 1e-12;

/// 單次回測的輸入合約
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub symbols: Vec<String>,
    pub benchmark_symbol: String,
    pub start_date: chrono::NaiveDate,
    pub end_date: chrono::NaiveDate,
    pub initial_capital: f64,
    pub lookback_days: usize,
    pub rebalance_frequency_days: usize,
    pub long_count: usize,
    pub short_count: usize,
    /// 外部評分代碼（自由文本，大小受沙箱限制）
    #[serde(default)]
    pub scoring_code: Option<String>,
    /// 外部評分參數（嵌套結構，深度/大小受沙箱限制）
    #[serde(default = "default_params")]
    pub scoring_params: serde_json::Value,
    /// 評分失敗時是否回退到內建規則
    #[serde(default)]
    pub fallback_on_scoring_error: bool,
}

fn default_params() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

impl BacktestConfig {
    /// 設置層驗證，在任何模擬步驟之前執行
    pub fn validate(&self) -> Result<(), EngineError> {
        let min_symbols = 3usize.max(self.long_count + self.short_count);
        if self.symbols.len() < min_symbols {
            return Err(EngineError::Setup(format!(
                "商品數量不足: {}，至少需要 {}",
                self.symbols.len(),
                min_symbols
            )));
        }
        if self.initial_capital <= 0.0 {
            return Err(EngineError::Setup("初始資金必須為正".to_string()));
        }
        if self.lookback_days == 0 {
            return Err(EngineError::Setup("回看窗口必須至少 1 天".to_string()));
        }
        if self.rebalance_frequency_days == 0 {
            return Err(EngineError::Setup("再平衡頻率必須至少 1 天".to_string()));
        }
        if self.start_date >= self.end_date {
            return Err(EngineError::Setup("開始日期必須早於結束日期".to_string()));
        }
        Ok(())
    }
}

/// 引擎錯誤；`kind()` 對應對外的錯誤分類
#[derive(Error, Debug)]
pub enum EngineError {
    /// 商品或日期覆蓋不足，在模擬開始前浮現
    #[error("回測設置錯誤: {0}")]
    Setup(String),

    /// 評分失敗且未啟用回退
    #[error("評分失敗 ({kind}): {message}")]
    Scoring {
        kind: ScoringErrorKind,
        message: String,
        excerpt: Option<String>,
    },

    /// 協作式取消：終態而非錯誤
    #[error("回測已取消")]
    Cancelled,

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl EngineError {
    /// 對外錯誤分類字串
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Setup(_) | EngineError::Domain(_) => "setup",
            EngineError::Scoring { kind, .. } => kind.as_str(),
            EngineError::Cancelled => "cancelled",
        }
    }

    /// 有界診斷摘要（僅評分失敗攜帶）
    pub fn excerpt(&self) -> Option<&str> {
        match self {
            EngineError::Scoring { excerpt, .. } => excerpt.as_deref(),
            _ => None,
        }
    }
}

/// 協作式取消旗標，每個迴圈迭代邊界檢查一次
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// 模擬器狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulatorState {
    NotStarted,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// 組合模擬器
pub struct PortfolioSimulator {
    config: BacktestConfig,
    aligned: AlignedSeries,
    sandbox: ScoringSandbox,
    policy: RebalancePolicy,
    state: SimulatorState,
}

impl PortfolioSimulator {
    /// 建立模擬器並執行設置層驗證
    ///
    /// 對齊日曆至少需要 `lookback_days + 2` 個交易日。
    pub fn new(
        config: BacktestConfig,
        aligned: AlignedSeries,
        sandbox: ScoringSandbox,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        if aligned.len() < config.lookback_days + 2 {
            return Err(EngineError::Setup(format!(
                "對齊後的交易日不足: {}，至少需要 {}",
                aligned.len(),
                config.lookback_days + 2
            )));
        }
        let policy = RebalancePolicy::new(config.long_count, config.short_count);
        Ok(Self {
            config,
            aligned,
            sandbox,
            policy,
            state: SimulatorState::NotStarted,
        })
    }

    pub fn state(&self) -> SimulatorState {
        self.state
    }

    /// 執行完整的逐日迴圈
    ///
    /// 每個模擬日恰好發佈一次進度事件，按日期嚴格遞增。失敗即
    /// 全有全無：不回傳部分結果，已發佈的事件不撤回。
    pub async fn run(
        &mut self,
        run_id: Uuid,
        cancel: &CancelFlag,
        sink: &dyn ProgressSink,
    ) -> Result<BacktestResult, EngineError> {
        if self.state != SimulatorState::NotStarted {
            return Err(EngineError::Setup("模擬器不可重入".to_string()));
        }
        self.state = SimulatorState::Running;

        // 評分在迴圈開始前執行一次，對整段歷史產生逐日分數
        let (outcome, mut score_map) = self
            .sandbox
            .evaluate(
                self.config.scoring_code.as_deref(),
                &self.config.scoring_params,
                &self.aligned,
            )
            .await;

        let mut used_fallback = false;
        if !outcome.succeeded {
            if self.config.fallback_on_scoring_error {
                // 回退覆蓋整個回測，而非逐日
                warn!(run_id = %run_id, "評分失敗，整個回測回退到內建規則");
                used_fallback = true;
                score_map = None;
            } else {
                self.state = SimulatorState::Failed;
                let kind = outcome.error_kind.unwrap_or(ScoringErrorKind::Exception);
                return Err(EngineError::Scoring {
                    kind,
                    message: outcome
                        .message
                        .clone()
                        .unwrap_or_else(|| "評分失敗".to_string()),
                    excerpt: outcome.excerpt.clone(),
                });
            }
        }
        let signal_dates = score_map
            .as_ref()
            .map(ScoreMap::signal_date_count)
            .unwrap_or(0);

        let lookback = self.config.lookback_days;
        let calendar = self.aligned.calendar().to_vec();
        let total_steps = calendar.len() - lookback;

        let mut weights: Weights = Weights::new();
        let mut nav = self.config.initial_capital;
        let mut benchmark_nav = self.config.initial_capital;
        let mut peak = nav;
        let mut total_turnover = 0.0f64;

        let mut navs: Vec<f64> = Vec::with_capacity(total_steps);
        let mut returns: Vec<f64> = Vec::with_capacity(total_steps);
        let mut benchmark_returns: Vec<f64> = Vec::with_capacity(total_steps);
        let mut equity: Vec<EquityPoint> = Vec::with_capacity(total_steps);
        let mut drawdowns: Vec<DrawdownPoint> = Vec::with_capacity(total_steps);
        let mut return_points: Vec<ReturnPoint> = Vec::with_capacity(total_steps);
        let mut transactions: Vec<Transaction> = Vec::new();

        for (step, t) in (lookback..calendar.len()).enumerate() {
            // 協作式取消：不再發佈任何事件，立即收斂
            if cancel.is_cancelled() {
                self.state = SimulatorState::Cancelled;
                info!(run_id = %run_id, "回測在第 {} 步被取消", step);
                return Err(EngineError::Cancelled);
            }

            let date = calendar[t];

            // 1. 以當前權重計算組合日報酬（首個模擬日權重為零 → 報酬 0）
            let daily_return: f64 = self
                .aligned
                .symbols()
                .iter()
                .map(|symbol| {
                    weights.get(symbol).copied().unwrap_or(0.0)
                        * self.aligned.symbol_return(symbol, t)
                })
                .sum();

            // 2. 淨值遞推：nav[i] = nav[i-1] × (1 + r[i])
            nav *= 1.0 + daily_return;
            peak = peak.max(nav);
            let drawdown = if peak > 0.0 { nav / peak - 1.0 } else { 0.0 };

            // 3. 基準獨立複利，僅供比較，不進入組合數學
            benchmark_nav *= 1.0 + self.aligned.benchmark_return(t);

            navs.push(nav);
            returns.push(daily_return);
            benchmark_returns.push(self.aligned.benchmark_return(t));
            equity.push(EquityPoint {
                date,
                nav,
                benchmark_nav,
            });
            drawdowns.push(DrawdownPoint { date, drawdown });
            return_points.push(ReturnPoint {
                date,
                value: daily_return,
            });

            // 4. 再平衡邊界：自首個模擬日起每 rebalanceFrequencyDays 步
            if step % self.config.rebalance_frequency_days == 0 {
                let scores = self.scores_for(t, score_map.as_ref());
                let new_weights = self.policy.select_weights(self.aligned.symbols(), &scores);
                self.record_trades(
                    date,
                    t,
                    nav,
                    &weights,
                    &new_weights,
                    &mut transactions,
                    &mut total_turnover,
                );
                weights = new_weights;
                debug!(run_id = %run_id, date = %format_date(date), "再平衡完成");
            }

            // 5. 快照每日從頭重算，避免增量漂移
            let metrics = compute_metrics(
                self.config.initial_capital,
                &navs,
                &returns,
                total_turnover,
                &weights,
            );
            let stats = compute_stats(&returns, &benchmark_returns);

            let progress_pct =
                ((step + 1) as f64 / total_steps as f64 * 100.0 * 100.0).round() / 100.0;
            sink.publish(ProgressEvent {
                run_id,
                progress_pct,
                date: format_date(date),
                equity: equity[step],
                drawdown: drawdowns[step],
                daily_return: return_points[step],
                metrics,
                stats,
            })
            .await;
        }

        // 完成：最終快照與期末持倉
        let final_metrics = compute_metrics(
            self.config.initial_capital,
            &navs,
            &returns,
            total_turnover,
            &weights,
        );
        let final_stats = compute_stats(&returns, &benchmark_returns);
        let top_holdings = top_holdings(&weights, final_metrics.cagr);

        sink.completed(run_id).await;
        self.state = SimulatorState::Completed;
        info!(run_id = %run_id, nav, "回測完成");

        Ok(BacktestResult {
            run_id,
            equity,
            drawdowns,
            returns: return_points,
            transactions,
            final_metrics,
            final_stats,
            top_holdings,
            scoring: ScoringSummary::from_outcome(&outcome, used_fallback, signal_dates),
        })
    }

    /// 當日分數：外部 ScoreMap 有該日期時使用（缺分商品墊哨兵值），
    /// 否則採內建規則（截至當日的回看窗口總報酬）
    fn scores_for(&self, t: usize, score_map: Option<&ScoreMap>) -> SymbolScores {
        let date = self.aligned.calendar()[t];
        if let Some(per_date) = score_map.and_then(|m| m.get(&date)) {
            return self
                .aligned
                .symbols()
                .iter()
                .map(|symbol| {
                    (
                        symbol.clone(),
                        per_date.get(symbol).copied().unwrap_or(MISSING_SCORE),
                    )
                })
                .collect();
        }
        self.aligned
            .symbols()
            .iter()
            .map(|symbol| {
                (
                    symbol.clone(),
                    self.aligned
                        .trailing_return(symbol, t, self.config.lookback_days),
                )
            })
            .collect()
    }

    /// 對每個權重變化的商品產生一筆交易並累計換手
    #[allow(clippy::too_many_arguments)]
    fn record_trades(
        &self,
        date: chrono::NaiveDate,
        t: usize,
        nav: f64,
        old: &Weights,
        new: &Weights,
        transactions: &mut Vec<Transaction>,
        total_turnover: &mut f64,
    ) {
        // 以商品清單順序走訪，保證輸出確定性
        for symbol in self.aligned.symbols() {
            let before = old.get(symbol).copied().unwrap_or(0.0);
            let after = new.get(symbol).copied().unwrap_or(0.0);
            let delta = after - before;
            if delta.abs() <= WEIGHT_EPSILON {
                continue;
            }

            let price = self.aligned.close(symbol, t);
            let turnover_usd = delta.abs() * nav;
            let shares = if price > 0.0 { turnover_usd / price } else { 0.0 };
            transactions.push(Transaction {
                date,
                symbol: symbol.clone(),
                side: TradeSide::from_weight_change(delta, after),
                shares,
                price,
                turnover_usd,
            });
            *total_turnover += delta.abs();
        }
    }
}

/// 期末持倉：非零權重按 |weight| 降序，貢獻估計 = weight × CAGR
fn top_holdings(weights: &Weights, cagr: f64) -> Vec<Holding> {
    let mut holdings: Vec<Holding> = weights
        .iter()
        .filter(|(_, w)| w.abs() > WEIGHT_EPSILON)
        .map(|(symbol, w)| Holding {
            symbol: symbol.clone(),
            weight: *w,
            contribution: w * cagr,
        })
        .collect();
    holdings.sort_by(|a, b| {
        b.weight
            .abs()
            .partial_cmp(&a.weight.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    holdings
}
