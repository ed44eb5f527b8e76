//! CSV 檔案數據提供者
//!
//! 每個商品對應數據目錄下的一個 `{symbol}.csv`，欄位為
//! `date,open,high,low,close,volume`，日期採 ISO 8601。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use super::feed::{DataFeed, FeedError};
use crate::domain_types::{DomainError, PriceBar};
use crate::utils::time_utils::parse_date;

/// CSV 行格式
#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// 以目錄為後端的 CSV 數據提供者
#[derive(Debug, Clone)]
pub struct CsvDataFeed {
    data_dir: PathBuf,
}

impl CsvDataFeed {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", symbol))
    }

    fn read_file(path: &Path) -> Result<Vec<PriceBar>, FeedError> {
        let mut reader =
            csv::Reader::from_path(path).map_err(|e| FeedError::Format(e.to_string()))?;
        let mut bars = Vec::new();
        for row in reader.deserialize::<CsvRow>() {
            let row = row.map_err(|e| FeedError::Format(e.to_string()))?;
            let date = parse_date(&row.date)?;
            bars.push(PriceBar {
                date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        // 按日期遞增是 DataFeed 合約的一部分
        if bars.windows(2).any(|w| w[0].date >= w[1].date) {
            return Err(FeedError::Domain(DomainError::UnorderedBars(
                path.display().to_string(),
            )));
        }
        Ok(bars)
    }
}

#[async_trait]
impl DataFeed for CsvDataFeed {
    async fn get_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, FeedError> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(FeedError::SymbolNotFound(symbol.to_string()));
        }

        // CSV 解析是同步 IO，移到阻塞線程池執行
        let bars = tokio::task::spawn_blocking(move || Self::read_file(&path))
            .await
            .map_err(|e| FeedError::Format(format!("讀取任務失敗: {}", e)))??;

        Ok(bars
            .into_iter()
            .filter(|b| b.date >= start && b.date <= end)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &Path, symbol: &str, rows: &str) {
        let mut file = std::fs::File::create(dir.join(format!("{}.csv", symbol))).unwrap();
        writeln!(file, "date,open,high,low,close,volume").unwrap();
        write!(file, "{}", rows).unwrap();
    }

    #[tokio::test]
    async fn test_csv_feed_reads_and_filters() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "AAPL",
            "2024-01-02,1,1,1,100.0,10\n2024-01-03,1,1,1,101.0,11\n2024-01-04,1,1,1,102.0,12\n",
        );

        let feed = CsvDataFeed::new(dir.path());
        let start = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        let bars = feed.get_bars("AAPL", start, end).await.unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].close, 102.0);
    }

    #[tokio::test]
    async fn test_csv_feed_rejects_unordered_dates() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(
            dir.path(),
            "MSFT",
            "2024-01-03,1,1,1,100.0,10\n2024-01-02,1,1,1,101.0,11\n",
        );

        let feed = CsvDataFeed::new(dir.path());
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert!(feed.get_bars("MSFT", start, end).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_file_is_symbol_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let feed = CsvDataFeed::new(dir.path());
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert!(matches!(
            feed.get_bars("NOPE", day, day).await,
            Err(FeedError::SymbolNotFound(_))
        ));
    }
}
