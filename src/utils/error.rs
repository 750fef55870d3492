use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Oracle request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[cfg(feature = "cli")]
    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required input: {field}")]
    MissingInputError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Record store error: {message}")]
    StoreError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Input,
    Processing,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl IngestError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            IngestError::ApiError(_) => ErrorCategory::Network,
            IngestError::ConfigError { .. }
            | IngestError::ConfigValidationError { .. }
            | IngestError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            IngestError::MissingInputError { .. } | IngestError::ValidationError { .. } => {
                ErrorCategory::Input
            }
            #[cfg(feature = "cli")]
            IngestError::CsvError(_) => ErrorCategory::Processing,
            IngestError::SerializationError(_) | IngestError::ProcessingError { .. } => {
                ErrorCategory::Processing
            }
            IngestError::IoError(_) | IngestError::StoreError { .. } => ErrorCategory::Storage,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Input | ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "檢查網路連線與 oracle endpoint 設定後重試",
            ErrorCategory::Configuration => "檢查設定檔內容與環境變數 (例如 ${FAMCAL_API_KEY})",
            ErrorCategory::Input => "確認輸入內容不是空的，照片分析需附上圖片檔",
            ErrorCategory::Processing => "檢查輸入資料格式，或使用 --verbose 查看詳細日誌",
            ErrorCategory::Storage => "確認資料目錄存在且可寫入",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            IngestError::MissingInputError { field } => {
                format!("Nothing to analyze: '{}' is required", field)
            }
            IngestError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting '{}': {}", field, reason)
            }
            IngestError::ApiError(_) => {
                "Could not reach the classification service".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
