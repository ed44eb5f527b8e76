/// 配置管理模組
///
/// 本模組負責加載、驗證和管理系統配置。
/// 支持從開發和生產兩種環境中加載不同的配置。
// 宣告子模組
pub mod loader;
pub mod types;
pub mod validation;

// 重新導出常用組件
pub use loader::{ConfigLoader, Environment};
pub use types::*;
pub use validation::{ValidationError, ValidationUtils, Validator};

use config::ConfigError;
use once_cell::sync::OnceCell;
use tracing::debug;

// 全局配置實例
static CONFIG: OnceCell<ApplicationConfig> = OnceCell::new();

/// 初始化配置（在應用程序啟動時調用）
///
/// 重複調用回傳首次初始化的實例。
pub fn init_config() -> Result<&'static ApplicationConfig, ConfigError> {
    CONFIG.get_or_try_init(|| {
        debug!("配置初始化，環境：{:?}", Environment::from_env());
        ApplicationConfig::load_from_env()
    })
}

/// ApplicationConfig 加載方法實現
impl ApplicationConfig {
    /// 從環境變數指定的環境加載配置
    pub fn load_from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::from_env())
    }

    /// 從指定環境加載配置
    pub fn load(env: Environment) -> Result<Self, ConfigError> {
        let config_source = ConfigLoader::load(env)?;
        let app_config: ApplicationConfig = config_source.try_deserialize()?;

        if let Err(err) = app_config.validate() {
            return Err(ConfigError::Message(format!("配置驗證失敗: {}", err)));
        }

        Ok(app_config)
    }
}
