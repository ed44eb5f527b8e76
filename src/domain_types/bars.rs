//! 單日價格條與每日報酬

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 單一商品、單一交易日的 OHLCV 價格條
///
/// 一經取得即不可變。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// 單日報酬點：value = close[t]/close[t-1] - 1，分母為零時取 0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyReturn {
    pub date: NaiveDate,
    pub value: f64,
}

/// 從收盤價序列推導每日報酬
///
/// 報酬永遠從價格條即時推導，不獨立儲存，避免與來源脫節。
pub fn daily_returns(bars: &[PriceBar]) -> Vec<DailyReturn> {
    bars.windows(2)
        .map(|w| DailyReturn {
            date: w[1].date,
            value: simple_return(w[0].close, w[1].close),
        })
        .collect()
}

/// 單期簡單報酬，前值為零時取 0
pub fn simple_return(prev_close: f64, close: f64) -> f64 {
    if prev_close == 0.0 {
        0.0
    } else {
        close / prev_close - 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn bar(day: u32, close: f64) -> PriceBar {
        let date = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        PriceBar {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_daily_returns_basic() {
        let bars = vec![bar(2, 100.0), bar(3, 110.0), bar(4, 99.0)];
        let returns = daily_returns(&bars);

        assert_eq!(returns.len(), 2);
        assert!((returns[0].value - 0.10).abs() < 1e-12);
        assert!((returns[1].value - (99.0 / 110.0 - 1.0)).abs() < 1e-12);
        assert_eq!(returns[0].date, bars[1].date);
    }

    #[test]
    fn test_zero_denominator_yields_zero_return() {
        let bars = vec![bar(2, 0.0), bar(3, 50.0)];
        let returns = daily_returns(&bars);
        assert_eq!(returns[0].value, 0.0);
    }

    #[test]
    fn test_single_bar_has_no_returns() {
        assert!(daily_returns(&[bar(2, 100.0)]).is_empty());
    }
}
