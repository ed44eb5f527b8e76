// 模組定義
pub mod backtest;
pub mod config;
pub mod data_provider;
pub mod domain_types;
pub mod event;
pub mod execution;
pub mod sandbox;
pub mod storage;
pub mod utils;
