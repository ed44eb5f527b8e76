// time_utils.rs
//
// 提供交易日期相關的工具函數，用於在系統不同層之間轉換日期格式。
// 主要功能：
// 1. 在外部接口層（ISO 8601 字串）和領域模型層（NaiveDate）之間轉換
// 2. 日曆序列的嚴格遞增檢查

use chrono::NaiveDate;

use crate::domain_types::types::{DomainError, Result};

/// 將 ISO 8601 日期字串（YYYY-MM-DD）解析為 NaiveDate
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| DomainError::InvalidDataFormat(format!("無效的日期 '{}': {}", raw, e)))
}

/// 將 NaiveDate 格式化為 ISO 8601 日期字串
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// 檢查日期序列是否嚴格遞增（無重複、無回退）
pub fn is_strictly_ascending(dates: &[NaiveDate]) -> bool {
    dates.windows(2).all(|w| w[0] < w[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format_roundtrip() {
        let date = parse_date("2024-03-15").unwrap();
        assert_eq!(format_date(date), "2024-03-15");
    }

    #[test]
    fn test_parse_rejects_invalid_input() {
        assert!(parse_date("2024/03/15").is_err());
        assert!(parse_date("not-a-date").is_err());
    }

    #[test]
    fn test_strictly_ascending() {
        let a = parse_date("2024-01-02").unwrap();
        let b = parse_date("2024-01-03").unwrap();
        let c = parse_date("2024-01-06").unwrap();

        assert!(is_strictly_ascending(&[a, b, c]));
        assert!(is_strictly_ascending(&[]));
        assert!(is_strictly_ascending(&[a]));

        // 重複日期不合法
        assert!(!is_strictly_ascending(&[a, a, b]));
        // 回退日期不合法
        assert!(!is_strictly_ascending(&[b, a]));
    }
}
