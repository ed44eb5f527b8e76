//! 整合測試共用工具：合成價格數據與事件收集器

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use parking_lot::Mutex;
use uuid::Uuid;

use portsim_server::backtest::BacktestConfig;
use portsim_server::data_provider::InMemoryDataFeed;
use portsim_server::domain_types::PriceBar;
use portsim_server::event::{ProgressEvent, ProgressSink};

pub const INITIAL_CAPITAL: f64 = 100_000.0;

pub fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

pub fn calendar(num_days: usize) -> Vec<NaiveDate> {
    (0..num_days)
        .map(|d| start_date() + Days::new(d as u64))
        .collect()
}

/// 確定性的合成收盤價：每個商品有不同的趨勢與小幅鋸齒
pub fn synthetic_close(symbol_index: usize, day: usize) -> f64 {
    let base = 50.0 + 10.0 * symbol_index as f64;
    let trend = day as f64 * 0.1 * (symbol_index as f64 + 1.0);
    let wiggle = ((day * 7 + symbol_index * 3) % 5) as f64 * 0.3;
    base + trend + wiggle
}

pub fn synthetic_bars(symbol_index: usize, num_days: usize) -> Vec<PriceBar> {
    calendar(num_days)
        .into_iter()
        .enumerate()
        .map(|(day, date)| {
            let close = synthetic_close(symbol_index, day);
            PriceBar {
                date,
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 10_000.0,
            }
        })
        .collect()
}

/// 固定收盤價的價格條，用於零變異場景
pub fn flat_bars(close: f64, num_days: usize) -> Vec<PriceBar> {
    calendar(num_days)
        .into_iter()
        .map(|date| PriceBar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 10_000.0,
        })
        .collect()
}

/// {A..E} 五商品 + 基準 SPY 的合成數據源
pub fn five_symbol_feed(num_days: usize) -> InMemoryDataFeed {
    let mut feed = InMemoryDataFeed::new();
    for (i, symbol) in ["A", "B", "C", "D", "E"].iter().enumerate() {
        feed.insert(*symbol, synthetic_bars(i, num_days));
    }
    feed.insert("SPY", synthetic_bars(5, num_days));
    feed
}

pub fn five_symbol_config(num_days: usize) -> BacktestConfig {
    BacktestConfig {
        symbols: ["A", "B", "C", "D", "E"].iter().map(|s| s.to_string()).collect(),
        benchmark_symbol: "SPY".to_string(),
        start_date: start_date(),
        end_date: start_date() + Days::new(num_days as u64),
        initial_capital: INITIAL_CAPITAL,
        lookback_days: 5,
        rebalance_frequency_days: 5,
        long_count: 2,
        short_count: 1,
        scoring_code: None,
        scoring_params: serde_json::json!({}),
        fallback_on_scoring_error: false,
    }
}

/// 收集所有進度事件的接收器
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ProgressEvent>>,
    completed: Mutex<Vec<Uuid>>,
}

impl CollectingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    pub fn completed_runs(&self) -> Vec<Uuid> {
        self.completed.lock().clone()
    }
}

#[async_trait]
impl ProgressSink for CollectingSink {
    async fn publish(&self, event: ProgressEvent) {
        self.events.lock().push(event);
    }

    async fn completed(&self, run_id: Uuid) {
        self.completed.lock().push(run_id);
    }
}
