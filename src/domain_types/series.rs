//! 價格序列與交易日對齊
//!
//! 模擬只使用所有商品與基準的交易日**交集**：僅出現在部分商品的日期
//! 一律剔除，對齊後的日曆嚴格遞增且無重複。缺漏日期以交集處理，
//! 絕不向前填補。

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;

use super::bars::{simple_return, PriceBar};
use super::types::{DomainError, Result};
use crate::utils::time_utils::is_strictly_ascending;

/// 商品代碼 → 價格條序列的映射，外加基準商品自身的序列
#[derive(Debug, Clone, Default)]
pub struct PriceSeries {
    bars: HashMap<String, Vec<PriceBar>>,
    benchmark: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入一個商品的價格條序列，要求日期嚴格遞增
    pub fn insert(&mut self, symbol: impl Into<String>, bars: Vec<PriceBar>) -> Result<()> {
        let symbol = symbol.into();
        Self::check_ordered(&symbol, &bars)?;
        self.bars.insert(symbol, bars);
        Ok(())
    }

    /// 設定基準商品的價格條序列
    pub fn set_benchmark(&mut self, bars: Vec<PriceBar>) -> Result<()> {
        Self::check_ordered("benchmark", &bars)?;
        self.benchmark = bars;
        Ok(())
    }

    fn check_ordered(symbol: &str, bars: &[PriceBar]) -> Result<()> {
        let dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();
        if !is_strictly_ascending(&dates) {
            return Err(DomainError::UnorderedBars(symbol.to_string()));
        }
        Ok(())
    }

    /// 按給定的商品順序對齊所有序列
    ///
    /// `symbol_order` 同時決定下游排序的平手順位，故由呼叫端顯式給定。
    pub fn align(&self, symbol_order: &[String]) -> Result<AlignedSeries> {
        if symbol_order.is_empty() {
            return Err(DomainError::DataRangeError("商品清單為空".to_string()));
        }

        // 交集從基準日曆出發，逐商品收斂
        let mut calendar: BTreeSet<NaiveDate> = self.benchmark.iter().map(|b| b.date).collect();
        for symbol in symbol_order {
            let bars = self
                .bars
                .get(symbol)
                .ok_or_else(|| DomainError::MissingSymbol(symbol.clone()))?;
            let dates: BTreeSet<NaiveDate> = bars.iter().map(|b| b.date).collect();
            calendar = calendar.intersection(&dates).copied().collect();
        }
        if calendar.is_empty() {
            return Err(DomainError::EmptyIntersection);
        }

        let calendar: Vec<NaiveDate> = calendar.into_iter().collect();

        let mut closes = HashMap::with_capacity(symbol_order.len());
        for symbol in symbol_order {
            let by_date: HashMap<NaiveDate, f64> = self.bars[symbol]
                .iter()
                .map(|b| (b.date, b.close))
                .collect();
            let aligned: Vec<f64> = calendar.iter().map(|d| by_date[d]).collect();
            closes.insert(symbol.clone(), aligned);
        }

        let benchmark_by_date: HashMap<NaiveDate, f64> =
            self.benchmark.iter().map(|b| (b.date, b.close)).collect();
        let benchmark_closes: Vec<f64> = calendar.iter().map(|d| benchmark_by_date[d]).collect();

        Ok(AlignedSeries {
            calendar,
            symbols: symbol_order.to_vec(),
            closes,
            benchmark_closes,
        })
    }
}

/// 對齊到共同交易日曆的收盤價視圖
///
/// 模擬期間唯讀，可在多個併發回測之間共享。
#[derive(Debug, Clone)]
pub struct AlignedSeries {
    calendar: Vec<NaiveDate>,
    symbols: Vec<String>,
    closes: HashMap<String, Vec<f64>>,
    benchmark_closes: Vec<f64>,
}

impl AlignedSeries {
    pub fn calendar(&self) -> &[NaiveDate] {
        &self.calendar
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.calendar.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calendar.is_empty()
    }

    /// 日曆中最後一個交易日
    ///
    /// `align` 拒絕空交集，因此日曆由建構保證非空。
    pub fn latest_date(&self) -> NaiveDate {
        debug_assert!(!self.calendar.is_empty());
        self.calendar[self.calendar.len() - 1]
    }

    /// 指定商品在日曆索引 t 的收盤價
    pub fn close(&self, symbol: &str, t: usize) -> f64 {
        self.closes[symbol][t]
    }

    /// 指定商品由 t-1 至 t 的單日報酬，前收為零時取 0
    pub fn symbol_return(&self, symbol: &str, t: usize) -> f64 {
        let series = &self.closes[symbol];
        simple_return(series[t - 1], series[t])
    }

    /// 基準由 t-1 至 t 的單日報酬
    pub fn benchmark_return(&self, t: usize) -> f64 {
        simple_return(self.benchmark_closes[t - 1], self.benchmark_closes[t])
    }

    /// 截至索引 t 的回看窗口總報酬（內建評分規則）
    pub fn trailing_return(&self, symbol: &str, t: usize, lookback: usize) -> f64 {
        let series = &self.closes[symbol];
        let base = series[t - lookback];
        simple_return(base, series[t])
    }

    /// 收盤價表（商品 → 對齊序列），供沙箱輸入序列化
    pub fn close_table(&self) -> &HashMap<String, Vec<f64>> {
        &self.closes
    }

    /// 報酬表（商品 → 對齊序列），首日以 0 補位
    pub fn return_table(&self) -> HashMap<String, Vec<f64>> {
        self.symbols
            .iter()
            .map(|symbol| {
                let series = &self.closes[symbol];
                let mut returns = Vec::with_capacity(series.len());
                returns.push(0.0);
                for t in 1..series.len() {
                    returns.push(simple_return(series[t - 1], series[t]));
                }
                (symbol.clone(), returns)
            })
            .collect()
    }
}
