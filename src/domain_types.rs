//! 領域數據類型模組
//!
//! 此模組定義回測模擬所需的核心數據模型：單日價格條、對齊後的
//! 價格序列、每日報酬、評分映射、持倉權重與交易記錄。

pub mod bars;
pub mod scores;
pub mod series;
pub mod types;

// 重新導出主要類型和結構
pub use bars::{daily_returns, DailyReturn, PriceBar};
pub use scores::{ScoreMap, ScoreParseError, ScorePayload, SymbolScores};
pub use series::{AlignedSeries, PriceSeries};
pub use types::{DomainError, TradeSide, Transaction, Weights, TRADING_DAYS_PER_YEAR};
