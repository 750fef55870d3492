use crate::domain::ports::ConfigProvider;
use crate::utils::error::{IngestError, Result};
use crate::utils::validation::Validate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const DEFAULT_ORACLE_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_ORACLE_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_DATA_DIR: &str = "./famcal-data";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub store: StoreConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "famcal".to_string(),
            description: None,
            version: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ORACLE_ENDPOINT.to_string(),
            model: DEFAULT_ORACLE_MODEL.to_string(),
            api_key: None,
            timeout_seconds: None,
            headers: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub fallback_to_rules: Option<bool>,
    pub detect_conflicts: Option<bool>,
    pub default_reminder_minutes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub data_dir: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: DEFAULT_DATA_DIR.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
    pub json_logs: Option<bool>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(IngestError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| IngestError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${OPENAI_API_KEY})；未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| IngestError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        crate::utils::validation::validate_url("oracle.endpoint", &self.oracle.endpoint)?;
        crate::utils::validation::validate_non_empty_string("oracle.model", &self.oracle.model)?;
        crate::utils::validation::validate_path("store.data_dir", &self.store.data_dir)?;

        if let Some(timeout) = self.oracle.timeout_seconds {
            crate::utils::validation::validate_positive_number(
                "oracle.timeout_seconds",
                timeout,
                1,
            )?;
        }

        if let Some(minutes) = self.pipeline.default_reminder_minutes {
            crate::utils::validation::validate_range(
                "pipeline.default_reminder_minutes",
                minutes,
                1,
                7 * 24 * 60,
            )?;
        }

        if let Some(level) = self.monitoring.as_ref().and_then(|m| m.log_level.as_ref()) {
            let valid_levels = ["trace", "debug", "info", "warn", "error"];
            if !valid_levels.contains(&level.to_lowercase().as_str()) {
                return Err(IngestError::InvalidConfigValueError {
                    field: "monitoring.log_level".to_string(),
                    value: level.clone(),
                    reason: format!("Valid levels: {}", valid_levels.join(", ")),
                });
            }
        }

        Ok(())
    }

    pub fn oracle(&self) -> &OracleConfig {
        &self.oracle
    }

    /// 沒有 API key 時只能走規則式分類
    pub fn has_oracle_credentials(&self) -> bool {
        self.oracle
            .api_key
            .as_deref()
            .map(|key| !key.trim().is_empty() && !key.starts_with("${"))
            .unwrap_or(false)
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.json_logs)
            .unwrap_or(false)
    }
}

impl ConfigProvider for TomlConfig {
    fn data_dir(&self) -> &str {
        &self.store.data_dir
    }

    fn fallback_to_rules(&self) -> bool {
        self.pipeline.fallback_to_rules.unwrap_or(true)
    }

    fn detect_conflicts(&self) -> bool {
        self.pipeline.detect_conflicts.unwrap_or(false)
    }

    fn default_reminder_minutes(&self) -> Option<u32> {
        self.pipeline.default_reminder_minutes
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
