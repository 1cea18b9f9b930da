use thiserror::Error;

#[derive(Error, Debug)]
pub enum QaError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Shapefile error: {0}")]
    ShapefileError(#[from] shapefile::Error),

    #[error("DBF table error: {0}")]
    DbaseError(#[from] shapefile::dbase::Error),

    #[error("Working store error: {0}")]
    StoreError(#[from] rusqlite::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing configuration value: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Layer {layer} is not available: {reason}")]
    LayerError { layer: String, reason: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Storage,
    Network,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl QaError {
    pub fn processing(message: impl Into<String>) -> Self {
        QaError::ProcessingError {
            message: message.into(),
        }
    }

    pub fn layer(layer: impl Into<String>, reason: impl Into<String>) -> Self {
        QaError::LayerError {
            layer: layer.into(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            QaError::ConfigValidationError { .. }
            | QaError::MissingConfigError { .. }
            | QaError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            QaError::ShapefileError(_)
            | QaError::DbaseError(_)
            | QaError::CsvError(_)
            | QaError::LayerError { .. }
            | QaError::ValidationError { .. } => ErrorCategory::Input,
            QaError::StoreError(_) | QaError::IoError(_) | QaError::ZipError(_) => {
                ErrorCategory::Storage
            }
            QaError::HttpError(_) => ErrorCategory::Network,
            QaError::SerializationError(_) | QaError::ProcessingError { .. } => {
                ErrorCategory::Processing
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Input | ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            QaError::ConfigValidationError { field, message } => {
                format!("The configuration value '{}' is not valid: {}", field, message)
            }
            QaError::MissingConfigError { field } => {
                format!("The configuration value '{}' is required", field)
            }
            QaError::InvalidConfigValueError { field, reason, .. } => {
                format!("The configuration value '{}' is not valid: {}", field, reason)
            }
            QaError::LayerError { layer, reason } => {
                format!("The layer '{}' could not be used: {}", layer, reason)
            }
            QaError::HttpError(_) => "The reference data service could not be reached".to_string(),
            QaError::StoreError(_) => "The working geodata store could not be accessed".to_string(),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => "Review the TOML configuration file and environment variables",
            ErrorCategory::Input => "Review the layers and tables delivered in the line folder",
            ErrorCategory::Storage => "Check that the working directories and the store file are writable",
            ErrorCategory::Network => "Check the reference service URL and credentials, then retry",
            ErrorCategory::Processing => "Check the log file for the failing step",
        }
    }

    /// Process exit code for command line tools.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, QaError>;
