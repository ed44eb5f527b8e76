//! 回測記錄儲存

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::backtest::{BacktestResult, CancelFlag};

/// 回測生命週期狀態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Created,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// 終態失敗的描述：單一訊息 + 錯誤分類 + 可選的有界診斷摘要，
/// 不暴露堆疊或內部路徑
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub kind: String,
    pub message: String,
    pub excerpt: Option<String>,
}

/// 一筆回測記錄
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub error: Option<RunError>,
    pub result: Option<BacktestResult>,
}

impl RunRecord {
    fn new(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: RunStatus::Created,
            created_at: now,
            updated_at: now,
            error: None,
            result: None,
        }
    }
}

/// 儲存錯誤
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("找不到回測記錄: {0}")]
    NotFound(Uuid),
}

/// 回測記錄儲存邊界
#[async_trait]
pub trait RunStore: Send + Sync {
    /// 建立一筆新記錄並回傳其識別碼
    async fn create(&self) -> Uuid;

    async fn get(&self, id: Uuid) -> Result<RunRecord, StoreError>;

    async fn mark_running(&self, id: Uuid) -> Result<(), StoreError>;

    async fn mark_completed(&self, id: Uuid, result: BacktestResult) -> Result<(), StoreError>;

    async fn mark_failed(&self, id: Uuid, error: RunError) -> Result<(), StoreError>;

    async fn mark_cancelled(&self, id: Uuid) -> Result<(), StoreError>;

    /// 取得該回測的協作式取消旗標
    async fn cancel_flag(&self, id: Uuid) -> Result<CancelFlag, StoreError>;

    /// 請求取消：設置旗標，迴圈在下個迭代邊界收斂
    async fn request_cancel(&self, id: Uuid) -> Result<(), StoreError>;
}

/// 以 DashMap 為後端的記憶體內實現
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    runs: DashMap<Uuid, RunRecord>,
    cancel_flags: DashMap<Uuid, CancelFlag>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(
        &self,
        id: Uuid,
        apply: impl FnOnce(&mut RunRecord),
    ) -> Result<(), StoreError> {
        let mut entry = self.runs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        apply(&mut entry);
        entry.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.runs.insert(id, RunRecord::new(id));
        self.cancel_flags.insert(id, CancelFlag::new());
        id
    }

    async fn get(&self, id: Uuid) -> Result<RunRecord, StoreError> {
        self.runs
            .get(&id)
            .map(|r| r.clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn mark_running(&self, id: Uuid) -> Result<(), StoreError> {
        self.update(id, |r| r.status = RunStatus::Running)
    }

    async fn mark_completed(&self, id: Uuid, result: BacktestResult) -> Result<(), StoreError> {
        self.update(id, |r| {
            r.status = RunStatus::Completed;
            r.result = Some(result);
        })
    }

    async fn mark_failed(&self, id: Uuid, error: RunError) -> Result<(), StoreError> {
        self.update(id, |r| {
            r.status = RunStatus::Failed;
            r.error = Some(error);
        })
    }

    async fn mark_cancelled(&self, id: Uuid) -> Result<(), StoreError> {
        self.update(id, |r| r.status = RunStatus::Cancelled)
    }

    async fn cancel_flag(&self, id: Uuid) -> Result<CancelFlag, StoreError> {
        self.cancel_flags
            .get(&id)
            .map(|f| f.clone())
            .ok_or(StoreError::NotFound(id))
    }

    async fn request_cancel(&self, id: Uuid) -> Result<(), StoreError> {
        let flag = self.cancel_flag(id).await?;
        flag.cancel();
        Ok(())
    }
}
