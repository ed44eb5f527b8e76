//! 進度事件類型與內建接收器

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::backtest::results::{DrawdownPoint, EquityPoint, ReturnPoint};
use crate::backtest::statistics::{MetricsSnapshot, StatsSnapshot};

/// 單一模擬日的進度事件
///
/// 事件是增量歷史（nav/drawdown/return 序列）的唯一事實來源；
/// 核心對每個事件恰好發佈一次。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub run_id: Uuid,
    /// 完成百分比，四捨五入到小數點後兩位
    pub progress_pct: f64,
    /// 當前日期（ISO 8601）
    pub date: String,
    pub equity: EquityPoint,
    pub drawdown: DrawdownPoint,
    pub daily_return: ReturnPoint,
    pub metrics: MetricsSnapshot,
    pub stats: StatsSnapshot,
}

/// 進度接收邊界
///
/// 核心不假設下游的投遞語義；接收器自行處理緩衝與丟棄。
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// 每個模擬日恰好調用一次
    async fn publish(&self, event: ProgressEvent);

    /// 終態「完成」信號，除 run_id 外不攜帶負載
    async fn completed(&self, run_id: Uuid);
}

/// 以 tokio mpsc 通道為後端的接收器
pub struct ChannelProgressSink {
    sender: mpsc::Sender<ProgressEvent>,
}

impl ChannelProgressSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl ProgressSink for ChannelProgressSink {
    async fn publish(&self, event: ProgressEvent) {
        if self.sender.send(event).await.is_err() {
            warn!("進度事件接收端已關閉，事件被丟棄");
        }
    }

    async fn completed(&self, run_id: Uuid) {
        // 通道關閉即代表結束；僅記錄日誌
        info!(%run_id, "回測完成信號");
    }
}

/// 將進度寫入日誌的接收器，供命令行工具使用
#[derive(Debug, Default)]
pub struct LogProgressSink;

#[async_trait]
impl ProgressSink for LogProgressSink {
    async fn publish(&self, event: ProgressEvent) {
        info!(
            run_id = %event.run_id,
            date = %event.date,
            progress = event.progress_pct,
            nav = event.equity.nav,
            drawdown = event.drawdown.drawdown,
            "模擬進度"
        );
    }

    async fn completed(&self, run_id: Uuid) {
        info!(%run_id, "回測完成");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_event(run_id: Uuid) -> ProgressEvent {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        ProgressEvent {
            run_id,
            progress_pct: 50.0,
            date: "2024-01-02".to_string(),
            equity: EquityPoint {
                date,
                nav: 101_000.0,
                benchmark_nav: 100_500.0,
            },
            drawdown: DrawdownPoint {
                date,
                drawdown: 0.0,
            },
            daily_return: ReturnPoint { date, value: 0.01 },
            metrics: crate::backtest::statistics::compute_metrics(
                100_000.0,
                &[101_000.0],
                &[0.01],
                0.0,
                &Default::default(),
            ),
            stats: crate::backtest::statistics::compute_stats(&[0.01], &[0.005]),
        }
    }

    #[tokio::test]
    async fn test_channel_sink_delivers_events() {
        let (sink, mut receiver) = ChannelProgressSink::new(8);
        let run_id = Uuid::new_v4();

        sink.publish(sample_event(run_id)).await;
        let received = receiver.recv().await.unwrap();
        assert_eq!(received.run_id, run_id);
        assert_eq!(received.date, "2024-01-02");
    }

    #[tokio::test]
    async fn test_channel_sink_survives_closed_receiver() {
        let (sink, receiver) = ChannelProgressSink::new(1);
        drop(receiver);
        // 不應 panic
        sink.publish(sample_event(Uuid::new_v4())).await;
    }
}
