//! 回測模擬模組
//!
//! 此模組負責逐日重放歷史：維護持倉權重、按固定節奏依排名分數
//! 再平衡、增量累積風險/報酬統計，並在每個模擬日發佈一次快照。
//! 包含模擬引擎、再平衡策略、統計引擎與結果類型。

pub mod engine;
pub mod rebalance;
pub mod results;
pub mod statistics;

// 重新導出主要類型和結構
pub use engine::{BacktestConfig, CancelFlag, EngineError, PortfolioSimulator, SimulatorState};
pub use rebalance::RebalancePolicy;
pub use results::{BacktestResult, DrawdownPoint, EquityPoint, Holding, ReturnPoint};
pub use statistics::{MetricsSnapshot, StatsSnapshot};
