use serde::{Deserialize, Serialize};

use crate::config::validation::{ValidationError, ValidationUtils, Validator};

/// 應用程序配置結構
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub log: LogConfig,
    pub app: AppConfig,
    pub sandbox: SandboxConfig,
    pub simulation: SimulationConfig,
}

impl Validator for ApplicationConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        // 驗證各個部分的配置
        self.log.validate()?;
        self.app.validate()?;
        self.sandbox.validate()?;
        self.simulation.validate()?;

        Ok(())
    }
}

/// 日誌配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Validator for LogConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationUtils::one_of(
            &self.log_level(),
            &["trace", "debug", "info", "warn", "error"],
            "log.level",
        )?;
        ValidationUtils::one_of(&self.log_format(), &["pretty", "json"], "log.format")?;

        Ok(())
    }
}

impl LogConfig {
    fn log_level(&self) -> String {
        self.level.to_lowercase()
    }

    fn log_format(&self) -> String {
        self.format.to_lowercase()
    }
}

/// 應用程序配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub worker_threads: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { worker_threads: 4 }
    }
}

impl Validator for AppConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationUtils::in_range(self.worker_threads, 1, 256, "app.worker_threads")?;

        Ok(())
    }
}

/// 評分沙箱配置
///
/// 結構限制在任何子進程生成之前執行，防止以超深或超大的參數
/// 負載耗盡資源。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// 解釋器可執行檔名稱（例如 python3）
    pub interpreter: String,
    /// 硬性牆鐘超時（秒）
    pub timeout_secs: u64,
    /// 評分代碼大小上限（位元組）
    pub max_code_bytes: usize,
    /// 頂層參數鍵數量上限
    pub max_param_keys: usize,
    /// 參數鍵長度上限（位元組）
    pub max_key_bytes: usize,
    /// 嵌套參數結構深度上限
    pub max_param_depth: usize,
    /// 嵌套參數結構節點數上限
    pub max_param_nodes: usize,
    /// 診斷摘要保留的首尾字符數
    pub excerpt_chars: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout_secs: 15,
            max_code_bytes: 65_536,
            max_param_keys: 100,
            max_key_bytes: 128,
            max_param_depth: 8,
            max_param_nodes: 10_000,
            excerpt_chars: 400,
        }
    }
}

impl Validator for SandboxConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationUtils::not_empty(&self.interpreter, "sandbox.interpreter")?;
        ValidationUtils::in_range(self.timeout_secs, 1, 600, "sandbox.timeout_secs")?;
        ValidationUtils::in_range(self.max_param_depth, 1, 64, "sandbox.max_param_depth")?;
        ValidationUtils::in_range(
            self.max_param_nodes,
            1,
            1_000_000,
            "sandbox.max_param_nodes",
        )?;

        Ok(())
    }
}

/// 模擬執行配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// 同時執行的回測數量上限
    pub max_concurrent_runs: u32,
    /// 進度事件通道容量
    pub progress_channel_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 8,
            progress_channel_capacity: 1024,
        }
    }
}

impl Validator for SimulationConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        ValidationUtils::in_range(self.max_concurrent_runs, 1, 128, "simulation.max_concurrent_runs")?;
        ValidationUtils::in_range(
            self.progress_channel_capacity,
            1,
            1_048_576,
            "simulation.progress_channel_capacity",
        )?;

        Ok(())
    }
}
