use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use portsim_server::backtest::BacktestConfig;
use portsim_server::config;
use portsim_server::data_provider::CsvDataFeed;
use portsim_server::event::LogProgressSink;
use portsim_server::execution::RunExecutor;
use portsim_server::storage::InMemoryRunStore;

/// 組合回測模擬伺服器：以 TOML 描述的回測規格對 CSV 數據目錄執行一次回測
#[derive(Debug, Parser)]
#[command(name = "portsim_server", version)]
struct Cli {
    /// 回測規格檔（TOML，對應 BacktestConfig）
    #[arg(long)]
    run_spec: PathBuf,

    /// 每商品一個 {symbol}.csv 的數據目錄
    #[arg(long)]
    data_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 初始化配置
    let app_config = config::init_config()?;

    // 初始化日誌系統
    init_logging(&app_config.log)?;

    // 讀取回測規格
    let raw = std::fs::read_to_string(&cli.run_spec)
        .with_context(|| format!("無法讀取回測規格: {}", cli.run_spec.display()))?;
    let backtest_config: BacktestConfig =
        toml::from_str(&raw).context("回測規格格式錯誤")?;

    info!(
        symbols = backtest_config.symbols.len(),
        start = %backtest_config.start_date,
        end = %backtest_config.end_date,
        "載入回測規格"
    );

    // 組裝執行器：CSV 數據源 + 記憶體內記錄儲存 + 日誌進度接收器
    let feed = Arc::new(CsvDataFeed::new(&cli.data_dir));
    let store = Arc::new(InMemoryRunStore::new());
    let executor = RunExecutor::new(feed, store, app_config.sandbox.clone());

    let (run_id, result) = executor
        .execute(backtest_config, Arc::new(LogProgressSink))
        .await;

    match result {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            info!(%run_id, "回測成功結束");
            Ok(())
        }
        Err(e) => Err(anyhow!("回測失敗 (kind={}): {}", e.kind(), e)),
    }
}

// 初始化日誌系統
fn init_logging(log_config: &config::LogConfig) -> Result<()> {
    let level = match log_config.level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO, // 默認為INFO
    };

    let builder = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_max_level(level);

    if log_config.format == "json" {
        tracing::subscriber::set_global_default(builder.json().finish())
            .map_err(|e| anyhow!("設置日誌系統失敗: {}", e))?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())
            .map_err(|e| anyhow!("設置日誌系統失敗: {}", e))?;
    }

    info!("日誌系統初始化完成");
    Ok(())
}
