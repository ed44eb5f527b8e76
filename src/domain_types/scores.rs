//! 評分映射與外部評分輸出的解析
//!
//! 外部評分程序的輸出是鬆散類型的 JSON，接受四種形狀，於攝取邊界
//! 一次性解析為帶標籤的 `ScorePayload`，再正規化為下游唯一使用的
//! `ScoreMap`：
//!
//! 1. `[{date, symbol, score}, ...]` 扁平記錄陣列
//! 2. `{date: {symbol: score}}` 先日期後商品的表
//! 3. `{symbol: score}` 單一映射，只套用到日曆中**最近**的日期
//! 4. 值為子映射（視同形狀 2）或數值（視同形狀 3）的映射，
//!    以第一個值的型別消歧

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::utils::time_utils::parse_date;

/// 單一日期上的商品 → 分數映射
pub type SymbolScores = HashMap<String, f64>;

/// 日期 → (商品 → 分數)；缺少某日期代表該日無自訂訊號，
/// 該次再平衡回退到內建規則
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreMap(BTreeMap<NaiveDate, SymbolScores>);

impl ScoreMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate, scores: SymbolScores) {
        self.0.insert(date, scores);
    }

    pub fn get(&self, date: &NaiveDate) -> Option<&SymbolScores> {
        self.0.get(date)
    }

    /// 有訊號的日期數
    pub fn signal_date_count(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 評分輸出解析錯誤
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoreParseError {
    #[error("評分輸出不是有效的 JSON: {0}")]
    InvalidJson(String),

    #[error("評分輸出形狀無法辨識: {0}")]
    UnrecognizedShape(String),

    #[error("評分記錄缺少欄位或型別錯誤: {0}")]
    MalformedRecord(String),

    #[error("評分表的日期鍵無效: {0}")]
    InvalidDateKey(String),

    #[error("評分值不是數值: {0}")]
    NonNumericScore(String),
}

/// 扁平記錄（形狀 1）
#[derive(Debug, Clone, Deserialize)]
pub struct ScoreRecord {
    pub date: String,
    pub symbol: String,
    pub score: f64,
}

/// 解析後、尚未正規化的評分輸出
///
/// 鬆散的 duck-typed 合約在此一次性解析為帶標籤的聯合型別，
/// 下游只處理正規化後的 `ScoreMap`。
#[derive(Debug, Clone)]
pub enum ScorePayload {
    /// 形狀 1：扁平記錄陣列
    Records(Vec<ScoreRecord>),
    /// 形狀 2 / 形狀 4 的多日分支
    ByDate(BTreeMap<String, SymbolScores>),
    /// 形狀 3 / 形狀 4 的單日分支：只套用到最近的日曆日期
    LatestOnly(SymbolScores),
}

impl ScorePayload {
    /// 從原始 JSON 文本解析
    pub fn from_json(raw: &str) -> Result<Self, ScoreParseError> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ScoreParseError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    /// 從 JSON 值解析，依第一個值的型別消歧
    pub fn from_value(value: Value) -> Result<Self, ScoreParseError> {
        match value {
            Value::Array(items) => {
                let mut records = Vec::with_capacity(items.len());
                for item in items {
                    let record: ScoreRecord = serde_json::from_value(item)
                        .map_err(|e| ScoreParseError::MalformedRecord(e.to_string()))?;
                    records.push(record);
                }
                Ok(ScorePayload::Records(records))
            }
            Value::Object(map) => {
                if map.is_empty() {
                    return Ok(ScorePayload::LatestOnly(SymbolScores::new()));
                }
                // 形狀 2/3/4 的消歧：第一個值是映射則按日期解讀，
                // 是數值則視為單日的商品 → 分數映射
                let first_is_map = map
                    .values()
                    .next()
                    .map(Value::is_object)
                    .unwrap_or(false);
                if first_is_map {
                    let mut by_date = BTreeMap::new();
                    for (date_key, inner) in map {
                        let scores = symbol_scores_from(inner)?;
                        by_date.insert(date_key, scores);
                    }
                    Ok(ScorePayload::ByDate(by_date))
                } else {
                    let mut scores = SymbolScores::with_capacity(map.len());
                    for (symbol, inner) in map {
                        scores.insert(symbol, number_from(inner)?);
                    }
                    Ok(ScorePayload::LatestOnly(scores))
                }
            }
            other => Err(ScoreParseError::UnrecognizedShape(format!(
                "期望陣列或映射，收到 {}",
                json_type_name(&other)
            ))),
        }
    }

    /// 正規化為 `ScoreMap`
    ///
    /// `latest_date` 是對齊日曆中最近的交易日，供單日形狀套用。
    pub fn normalize(self, latest_date: NaiveDate) -> Result<ScoreMap, ScoreParseError> {
        let mut map = ScoreMap::new();
        match self {
            ScorePayload::Records(records) => {
                for record in records {
                    let date = parse_date(&record.date)
                        .map_err(|_| ScoreParseError::InvalidDateKey(record.date.clone()))?;
                    map.0
                        .entry(date)
                        .or_default()
                        .insert(record.symbol, record.score);
                }
            }
            ScorePayload::ByDate(by_date) => {
                for (date_key, scores) in by_date {
                    let date = parse_date(&date_key)
                        .map_err(|_| ScoreParseError::InvalidDateKey(date_key.clone()))?;
                    map.insert(date, scores);
                }
            }
            ScorePayload::LatestOnly(scores) => {
                if !scores.is_empty() {
                    map.insert(latest_date, scores);
                }
            }
        }
        Ok(map)
    }
}

fn symbol_scores_from(value: Value) -> Result<SymbolScores, ScoreParseError> {
    match value {
        Value::Object(inner) => {
            let mut scores = SymbolScores::with_capacity(inner.len());
            for (symbol, score) in inner {
                scores.insert(symbol, number_from(score)?);
            }
            Ok(scores)
        }
        other => Err(ScoreParseError::UnrecognizedShape(format!(
            "期望商品 → 分數映射，收到 {}",
            json_type_name(&other)
        ))),
    }
}

fn number_from(value: Value) -> Result<f64, ScoreParseError> {
    value
        .as_f64()
        .ok_or_else(|| ScoreParseError::NonNumericScore(value.to_string()))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn latest() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
    }

    #[test]
    fn test_flat_records_shape() {
        let raw = r#"[
            {"date": "2024-06-27", "symbol": "AAPL", "score": 1.5},
            {"date": "2024-06-28", "symbol": "MSFT", "score": -0.25}
        ]"#;
        let map = ScorePayload::from_json(raw).unwrap().normalize(latest()).unwrap();

        assert_eq!(map.signal_date_count(), 2);
        let d = NaiveDate::from_ymd_opt(2024, 6, 27).unwrap();
        assert_eq!(map.get(&d).unwrap()["AAPL"], 1.5);
    }

    #[test]
    fn test_date_keyed_table_shape() {
        let raw = r#"{"2024-06-27": {"AAPL": 2.0, "MSFT": 1.0}}"#;
        let map = ScorePayload::from_json(raw).unwrap().normalize(latest()).unwrap();

        let d = NaiveDate::from_ymd_opt(2024, 6, 27).unwrap();
        assert_eq!(map.get(&d).unwrap().len(), 2);
    }

    #[test]
    fn test_latest_only_shape_applies_to_latest_date() {
        let raw = r#"{"AAPL": 3.0, "MSFT": 1.0}"#;
        let map = ScorePayload::from_json(raw).unwrap().normalize(latest()).unwrap();

        assert_eq!(map.signal_date_count(), 1);
        assert_eq!(map.get(&latest()).unwrap()["AAPL"], 3.0);
        // 較早的日期沒有任何訊號
        let earlier = NaiveDate::from_ymd_opt(2024, 6, 27).unwrap();
        assert!(map.get(&earlier).is_none());
    }

    #[test]
    fn test_ambiguous_shape_disambiguated_by_first_value() {
        // 第一個值是映射 → 按日期解讀
        let by_date = ScorePayload::from_json(r#"{"2024-06-27": {"A": 1.0}}"#).unwrap();
        assert_matches!(by_date, ScorePayload::ByDate(_));

        // 第一個值是數值 → 單日商品映射
        let latest_only = ScorePayload::from_json(r#"{"A": 1.0}"#).unwrap();
        assert_matches!(latest_only, ScorePayload::LatestOnly(_));
    }

    #[test]
    fn test_integer_scores_accepted() {
        let map = ScorePayload::from_json(r#"{"A": 2, "B": -1}"#)
            .unwrap()
            .normalize(latest())
            .unwrap();
        assert_eq!(map.get(&latest()).unwrap()["A"], 2.0);
    }

    #[test]
    fn test_unparseable_payloads_rejected() {
        assert_matches!(
            ScorePayload::from_json("not json"),
            Err(ScoreParseError::InvalidJson(_))
        );
        assert_matches!(
            ScorePayload::from_json("42"),
            Err(ScoreParseError::UnrecognizedShape(_))
        );
        assert_matches!(
            ScorePayload::from_json(r#"{"A": "high"}"#),
            Err(ScoreParseError::NonNumericScore(_))
        );
        assert_matches!(
            ScorePayload::from_json(r#"[{"symbol": "A"}]"#),
            Err(ScoreParseError::MalformedRecord(_))
        );
    }

    #[test]
    fn test_bad_date_key_rejected_at_normalization() {
        let payload = ScorePayload::from_json(r#"{"junk": {"A": 1.0}}"#).unwrap();
        assert_matches!(
            payload.normalize(latest()),
            Err(ScoreParseError::InvalidDateKey(_))
        );
    }

    #[test]
    fn test_empty_object_yields_empty_map() {
        let map = ScorePayload::from_json("{}").unwrap().normalize(latest()).unwrap();
        assert!(map.is_empty());
    }
}
