use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsctError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Stage '{stage}' failed: {details}")]
    StageError { stage: String, details: String },

    #[error("Stage '{stage}' did not finish within {seconds}s")]
    StageTimeoutError { stage: String, seconds: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Io,
    Serialization,
    Stage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FsctError {
    pub fn config(message: impl Into<String>) -> Self {
        FsctError::ConfigError {
            message: message.into(),
        }
    }

    pub fn stage(stage: impl Into<String>, details: impl Into<String>) -> Self {
        FsctError::StageError {
            stage: stage.into(),
            details: details.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            FsctError::IoError(_) => ErrorCategory::Io,
            FsctError::SerializationError(_) => ErrorCategory::Serialization,
            FsctError::TomlError(_)
            | FsctError::ConfigError { .. }
            | FsctError::InvalidConfigValueError { .. }
            | FsctError::MissingConfigError { .. } => ErrorCategory::Configuration,
            FsctError::StageError { .. } | FsctError::StageTimeoutError { .. } => {
                ErrorCategory::Stage
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            FsctError::StageTimeoutError { .. } => ErrorSeverity::Medium,
            FsctError::StageError { .. }
            | FsctError::TomlError(_)
            | FsctError::ConfigError { .. }
            | FsctError::InvalidConfigValueError { .. }
            | FsctError::MissingConfigError { .. } => ErrorSeverity::High,
            FsctError::IoError(_) | FsctError::SerializationError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            FsctError::IoError(_) => {
                "Check that the paths exist and that the process may read and write them".to_string()
            }
            FsctError::SerializationError(_) => {
                "Make sure every parameter value can be represented as JSON".to_string()
            }
            FsctError::TomlError(_) => "Fix the syntax of the TOML configuration file".to_string(),
            FsctError::ConfigError { .. } => "Review the run configuration".to_string(),
            FsctError::InvalidConfigValueError { field, .. } => {
                format!("Correct the value of '{}' in the configuration", field)
            }
            FsctError::MissingConfigError { field } => {
                format!("Add '{}' to the configuration", field)
            }
            FsctError::StageError { stage, .. } => format!(
                "Inspect the output of the {} stage above; earlier stages are kept, rerun with the completed ones skipped",
                stage
            ),
            FsctError::StageTimeoutError { stage, .. } => format!(
                "Raise timeout_seconds for [stages.{}] or reduce the point cloud size",
                stage
            ),
        }
    }

    /// Process exit code for the binary, 0 for warnings.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Io => format!("File system problem: {}", self),
            ErrorCategory::Serialization => format!("Could not encode parameters: {}", self),
            ErrorCategory::Stage => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FsctError>;
