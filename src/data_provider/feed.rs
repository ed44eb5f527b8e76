//! DataFeed 邊界定義與記憶體內實現

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::domain_types::{DomainError, PriceBar};

/// 數據提供錯誤
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("找不到商品數據: {0}")]
    SymbolNotFound(String),

    #[error("數據源讀取失敗: {0}")]
    Io(#[from] std::io::Error),

    #[error("數據源格式錯誤: {0}")]
    Format(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// 市場數據提供者邊界
///
/// 回傳的價格條必須按日期遞增；允許假日缺口。
#[async_trait]
pub trait DataFeed: Send + Sync {
    async fn get_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, FeedError>;
}

/// 記憶體內數據提供者，供測試與合成數據使用
#[derive(Debug, Clone, Default)]
pub struct InMemoryDataFeed {
    bars: HashMap<String, Vec<PriceBar>>,
}

impl InMemoryDataFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入一個商品的完整價格條序列
    pub fn insert(&mut self, symbol: impl Into<String>, bars: Vec<PriceBar>) {
        self.bars.insert(symbol.into(), bars);
    }
}

#[async_trait]
impl DataFeed for InMemoryDataFeed {
    async fn get_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, FeedError> {
        let bars = self
            .bars
            .get(symbol)
            .ok_or_else(|| FeedError::SymbolNotFound(symbol.to_string()))?;
        Ok(bars
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .copied()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> PriceBar {
        let date = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        PriceBar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }

    #[tokio::test]
    async fn test_in_memory_feed_filters_by_range() {
        let mut feed = InMemoryDataFeed::new();
        feed.insert("A", vec![bar(2, 1.0), bar(3, 2.0), bar(4, 3.0)]);

        let start = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        let bars = feed.get_bars("A", start, end).await.unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 2.0);
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_an_error() {
        let feed = InMemoryDataFeed::new();
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let result = feed.get_bars("Z", start, start).await;
        assert!(matches!(result, Err(FeedError::SymbolNotFound(_))));
    }
}
