//! 評分沙箱模組
//!
//! 在隔離的子進程中執行外部提供的評分程序：先做結構驗證（代碼大小、
//! 參數數量、鍵長、嵌套深度與節點數），再於獨佔的臨時工作目錄內以
//! 硬性牆鐘超時執行，輸出解析為 `ScoreMap`。任何失敗都在沙箱邊界
//! 內轉換為結構化結果，絕不向呼叫端拋出未捕獲的錯誤。

pub mod executor;
pub mod limits;
pub mod protocol;

pub use executor::ScoringSandbox;
pub use limits::{validate_scoring_input, LimitViolation};
pub use protocol::{ExecutionRequest, ScoringErrorKind, ScoringOutcome, ScoringSummary};
