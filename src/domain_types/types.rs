//! 基本領域類型定義

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 年化換算使用的交易日數
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// 持倉權重：商品代碼 → 帶號比例（約在 [-1, 1] 內）
///
/// 等權重配置下多頭腿合計 +1、空頭腿合計 -1，雙腿齊備時總曝險約為 2。
/// 權重只在再平衡邊界被整組重建，兩次再平衡之間保持不變。
pub type Weights = HashMap<String, f64>;

/// 交易方向
///
/// 由權重變化量的正負與變化後權重的正負共同決定：
/// 增加且結果為多頭 → Buy；增加且結果仍為空頭 → Cover；
/// 減少且結果為空頭 → Short；減少且結果為多頭（或歸零）→ Sell。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
    Short,
    Cover,
}

impl TradeSide {
    /// 從權重變化量與變化後權重推導交易方向
    pub fn from_weight_change(delta: f64, resulting: f64) -> Self {
        if delta > 0.0 {
            if resulting >= 0.0 {
                TradeSide::Buy
            } else {
                TradeSide::Cover
            }
        } else if resulting < 0.0 {
            TradeSide::Short
        } else {
            TradeSide::Sell
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
            TradeSide::Short => write!(f, "SHORT"),
            TradeSide::Cover => write!(f, "COVER"),
        }
    }
}

/// 再平衡時產生的單筆交易記錄
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub date: NaiveDate,
    pub symbol: String,
    pub side: TradeSide,
    pub shares: f64,
    pub price: f64,
    pub turnover_usd: f64,
}

/// 領域錯誤類型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("無效的數據格式: {0}")]
    InvalidDataFormat(String),

    #[error("價格序列未按日期遞增: {0}")]
    UnorderedBars(String),

    #[error("缺少商品數據: {0}")]
    MissingSymbol(String),

    #[error("商品與基準的交易日交集為空")]
    EmptyIntersection,

    #[error("數據範圍錯誤: {0}")]
    DataRangeError(String),
}

/// 領域結果類型
pub type Result<T> = std::result::Result<T, DomainError>;
