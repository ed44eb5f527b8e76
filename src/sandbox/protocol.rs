//! 沙箱執行協議
//!
//! 定義傳入子進程的執行請求（評分代碼、參數、對齊後歷史的唯讀快照）
//! 與傳回呼叫端的結構化執行結果。評分程序從工作目錄讀取
//! `input.json`，將分數寫入 `output.json`（或標準輸出）。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain_types::AlignedSeries;
use crate::utils::time_utils::format_date;

/// 序列化後送入子進程的執行請求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// 使用者提供的評分參數
    pub params: Value,
    /// 對齊後的交易日曆（ISO 8601 字串）
    pub dates: Vec<String>,
    /// 商品清單
    pub symbols: Vec<String>,
    /// 收盤價表：商品 → 對齊序列
    pub closes: HashMap<String, Vec<f64>>,
    /// 每日報酬表：商品 → 對齊序列（首日以 0 補位）
    pub returns: HashMap<String, Vec<f64>>,
}

impl ExecutionRequest {
    /// 由對齊後的序列建立唯讀快照
    pub fn from_aligned(params: Value, aligned: &AlignedSeries) -> Self {
        Self {
            params,
            dates: aligned.calendar().iter().map(|d| format_date(*d)).collect(),
            symbols: aligned.symbols().to_vec(),
            closes: aligned.close_table().clone(),
            returns: aligned.return_table(),
        }
    }
}

/// 評分失敗的分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringErrorKind {
    /// 結構驗證失敗（未生成子進程）
    Validation,
    /// 超過牆鐘時間預算
    Timeout,
    /// 評分程序非零退出
    Runtime,
    /// 輸出無法解析為任何接受的形狀
    Output,
    /// 準備或調用期間的非預期內部錯誤
    Exception,
}

impl ScoringErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringErrorKind::Validation => "validation",
            ScoringErrorKind::Timeout => "timeout",
            ScoringErrorKind::Runtime => "runtime",
            ScoringErrorKind::Output => "output",
            ScoringErrorKind::Exception => "exception",
        }
    }
}

impl std::fmt::Display for ScoringErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 單次沙箱調用的結構化結果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringOutcome {
    /// 是否配置了外部評分代碼
    pub requested: bool,
    /// 是否實際生成了子進程
    pub executed: bool,
    /// 調用是否成功
    pub succeeded: bool,
    /// 失敗分類（成功時為 None）
    pub error_kind: Option<ScoringErrorKind>,
    /// 人類可讀的說明
    pub message: Option<String>,
    /// 有界長度的診斷摘要（stderr 首尾片段）
    pub excerpt: Option<String>,
}

impl ScoringOutcome {
    /// 未配置外部評分：視為成功，呼叫端全程使用內建規則
    pub fn not_requested() -> Self {
        Self {
            requested: false,
            executed: false,
            succeeded: true,
            error_kind: None,
            message: None,
            excerpt: None,
        }
    }

    pub fn success() -> Self {
        Self {
            requested: true,
            executed: true,
            succeeded: true,
            error_kind: None,
            message: None,
            excerpt: None,
        }
    }

    pub fn failure(
        kind: ScoringErrorKind,
        executed: bool,
        message: impl Into<String>,
        excerpt: Option<String>,
    ) -> Self {
        Self {
            requested: true,
            executed,
            succeeded: false,
            error_kind: Some(kind),
            message: Some(message.into()),
            excerpt,
        }
    }
}

/// 附加在回測結果上的評分執行摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringSummary {
    pub requested: bool,
    pub executed: bool,
    pub succeeded: bool,
    pub used_fallback: bool,
    pub message: Option<String>,
    pub signal_date_count: usize,
    pub excerpt: Option<String>,
    pub error_kind: Option<ScoringErrorKind>,
}

impl ScoringSummary {
    pub fn from_outcome(outcome: &ScoringOutcome, used_fallback: bool, signal_dates: usize) -> Self {
        Self {
            requested: outcome.requested,
            executed: outcome.executed,
            succeeded: outcome.succeeded,
            used_fallback,
            message: outcome.message.clone(),
            signal_date_count: signal_dates,
            excerpt: outcome.excerpt.clone(),
            error_kind: outcome.error_kind,
        }
    }
}

/// 取字串的首尾各 `half` 個字符作為有界診斷摘要
pub fn bounded_excerpt(raw: &str, half: usize) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= half * 2 {
        return Some(trimmed.to_string());
    }
    let head: String = chars[..half].iter().collect();
    let tail: String = chars[chars.len() - half..].iter().collect();
    Some(format!("{} ... {}", head, tail))
}
