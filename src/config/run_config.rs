use crate::domain::model::{Parameters, RunOptions, StageKind};
use crate::utils::error::{FsctError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_POINT_CLOUD_EXTENSIONS: [&str; 2] = ["las", "laz"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default)]
    pub run: RunSection,
    pub parameters: Parameters,
    #[serde(default)]
    pub stages: StagesConfig,
    pub input: Option<InputConfig>,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSection {
    pub preprocess: Option<bool>,
    pub segmentation: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StagesConfig {
    pub preprocessing: Option<StageCommand>,
    pub segmentation: Option<StageCommand>,
}

/// An external program acting as one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageCommand {
    pub program: String,
    /// May contain `{key}` placeholders filled from the parameters.
    #[serde(default)]
    pub args: Vec<String>,
    pub working_directory: Option<String>,
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl StageCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_directory: None,
            timeout_seconds: None,
            env: BTreeMap::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub allowed_extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
}

impl RunConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;
        Ok(toml::from_str(&processed_content)?)
    }

    /// Replaces `${VAR}` with the environment value, unknown variables stay as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")
            .map_err(|e| FsctError::config(format!("invalid substitution pattern: {}", e)))?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        let filename = &self.parameters.point_cloud_filename;
        validation::validate_path("parameters.point_cloud_filename", filename)?;
        validation::validate_file_extension(
            "parameters.point_cloud_filename",
            filename,
            &self.allowed_extensions(),
        )?;

        let options = self.run_options();
        for kind in StageKind::ALL {
            let field = format!("stages.{}", kind);
            let command = self.stage_command(kind);
            if !kind.is_enabled(&options) {
                continue;
            }

            let command = validation::validate_required_field(&field, &command)?;
            validation::validate_non_empty_string(&format!("{}.program", field), &command.program)?;
            if let Some(timeout) = command.timeout_seconds {
                validation::validate_positive_number(&format!("{}.timeout_seconds", field), timeout, 1)?;
            }
        }

        Ok(())
    }

    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            preprocess: self.run.preprocess.unwrap_or(true),
            segmentation: self.run.segmentation.unwrap_or(true),
        }
    }

    pub fn stage_command(&self, kind: StageKind) -> Option<&StageCommand> {
        match kind {
            StageKind::Preprocessing => self.stages.preprocessing.as_ref(),
            StageKind::SemanticSegmentation => self.stages.segmentation.as_ref(),
        }
    }

    pub fn allowed_extensions(&self) -> Vec<String> {
        self.input
            .as_ref()
            .and_then(|i| i.allowed_extensions.clone())
            .unwrap_or_else(|| {
                DEFAULT_POINT_CLOUD_EXTENSIONS
                    .iter()
                    .map(|e| e.to_string())
                    .collect()
            })
    }

    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }
}

impl Validate for RunConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
