// 工具模組
//
// 提供跨層共用的輔助函數。

pub mod time_utils;

pub use time_utils::{format_date, parse_date};
