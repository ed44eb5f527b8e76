//! 市場數據提供模組
//!
//! 定義核心消費的 `DataFeed` 邊界：按商品與日期範圍取回遞增排序的
//! 價格條序列。序列可含假日缺口，由核心以日期交集調和，不做前向填補。

pub mod csv_feed;
pub mod feed;

pub use csv_feed::CsvDataFeed;
pub use feed::{DataFeed, FeedError, InMemoryDataFeed};
