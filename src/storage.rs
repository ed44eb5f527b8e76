//! 回測記錄儲存模組
//!
//! 以顯式注入的 `RunStore` 邊界取代全局單例：併發安全的鍵值映射，
//! 供驅動回測的任何一層使用。核心本身不持久化回測，只接受取消
//! 信號並產生一個終態結果或一個終態錯誤。

pub mod run_store;

pub use run_store::{InMemoryRunStore, RunError, RunRecord, RunStatus, RunStore, StoreError};
