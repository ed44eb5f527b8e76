//! 回測執行協調器
//!
//! 將外部協作者串成一次完整的回測：向 DataFeed 取價、對齊日曆、
//! 建立模擬器並驅動逐日迴圈，最後把終態寫回 RunStore。多個回測
//! 作為互相獨立的任務併發執行，彼此只共享唯讀價格數據。

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::backtest::{
    BacktestConfig, BacktestResult, CancelFlag, EngineError, PortfolioSimulator,
};
use crate::config::SandboxConfig;
use crate::data_provider::DataFeed;
use crate::domain_types::PriceSeries;
use crate::event::ProgressSink;
use crate::sandbox::ScoringSandbox;
use crate::storage::{RunError, RunStore};

/// 回測執行器
pub struct RunExecutor {
    feed: Arc<dyn DataFeed>,
    store: Arc<dyn RunStore>,
    sandbox_cfg: SandboxConfig,
}

impl RunExecutor {
    pub fn new(feed: Arc<dyn DataFeed>, store: Arc<dyn RunStore>, sandbox_cfg: SandboxConfig) -> Self {
        Self {
            feed,
            store,
            sandbox_cfg,
        }
    }

    /// 建立記錄並同步執行一次回測，回傳記錄識別碼與引擎結果
    pub async fn execute(
        &self,
        config: BacktestConfig,
        sink: Arc<dyn ProgressSink>,
    ) -> (Uuid, Result<BacktestResult, EngineError>) {
        let run_id = self.store.create().await;
        let result = self.drive(run_id, config, sink).await;

        // 終態寫回儲存；儲存錯誤只記錄，不覆蓋引擎結果
        let store_result = match &result {
            Ok(result) => self.store.mark_completed(run_id, result.clone()).await,
            Err(EngineError::Cancelled) => self.store.mark_cancelled(run_id).await,
            Err(e) => {
                self.store
                    .mark_failed(
                        run_id,
                        RunError {
                            kind: e.kind().to_string(),
                            message: e.to_string(),
                            excerpt: e.excerpt().map(str::to_string),
                        },
                    )
                    .await
            }
        };
        if let Err(e) = store_result {
            error!(%run_id, "無法寫回終態: {}", e);
        }

        (run_id, result)
    }

    async fn drive(
        &self,
        run_id: Uuid,
        config: BacktestConfig,
        sink: Arc<dyn ProgressSink>,
    ) -> Result<BacktestResult, EngineError> {
        self.store
            .mark_running(run_id)
            .await
            .map_err(|e| EngineError::Setup(e.to_string()))?;
        let cancel = self
            .store
            .cancel_flag(run_id)
            .await
            .unwrap_or_else(|_| CancelFlag::new());

        // 迴圈開始前唯一的等待點之一：向數據協作者取價
        let aligned = self.fetch_aligned(&config).await?;
        info!(%run_id, days = aligned.len(), symbols = aligned.symbols().len(), "價格序列對齊完成");

        let sandbox = ScoringSandbox::new(self.sandbox_cfg.clone());
        let mut simulator = PortfolioSimulator::new(config, aligned, sandbox)?;
        simulator.run(run_id, &cancel, sink.as_ref()).await
    }

    async fn fetch_aligned(
        &self,
        config: &BacktestConfig,
    ) -> Result<crate::domain_types::AlignedSeries, EngineError> {
        let mut series = PriceSeries::new();
        for symbol in &config.symbols {
            let bars = self
                .feed
                .get_bars(symbol, config.start_date, config.end_date)
                .await
                .map_err(|e| EngineError::Setup(e.to_string()))?;
            series.insert(symbol.clone(), bars)?;
        }
        let benchmark_bars = self
            .feed
            .get_bars(&config.benchmark_symbol, config.start_date, config.end_date)
            .await
            .map_err(|e| EngineError::Setup(e.to_string()))?;
        series.set_benchmark(benchmark_bars)?;

        Ok(series.align(&config.symbols)?)
    }

    /// 取得底層儲存的共享引用
    pub fn store(&self) -> Arc<dyn RunStore> {
        self.store.clone()
    }
}
