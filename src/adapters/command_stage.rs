use crate::config::StageCommand;
use crate::domain::model::{Parameters, StageKind};
use crate::domain::ports::{Stage, StageFactory};
use crate::utils::error::{FsctError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

pub const ENV_STAGE: &str = "FSCT_STAGE";
pub const ENV_POINT_CLOUD_FILENAME: &str = "FSCT_POINT_CLOUD_FILENAME";
pub const ENV_NUM_CPU_CORES: &str = "FSCT_NUM_CPU_CORES";
pub const ENV_PARAMETERS: &str = "FSCT_PARAMETERS";

/// Builds stages that run an external program.
#[derive(Debug, Clone)]
pub struct CommandStageFactory {
    kind: StageKind,
    command: StageCommand,
}

impl CommandStageFactory {
    pub fn new(kind: StageKind, command: StageCommand) -> Self {
        Self { kind, command }
    }

    /// Resolves every `{key}` placeholder against `parameters`.
    pub fn prepare(&self, parameters: &Parameters) -> Result<CommandStage> {
        let field = format!("stages.{}", self.kind);
        let placeholders = placeholder_pattern()?;

        let args = self
            .command
            .args
            .iter()
            .map(|arg| fill_placeholders(&placeholders, &field, arg, parameters))
            .collect::<Result<Vec<_>>>()?;

        let working_directory = self
            .command
            .working_directory
            .as_deref()
            .map(|dir| fill_placeholders(&placeholders, &field, dir, parameters).map(PathBuf::from))
            .transpose()?;

        let mut env = vec![
            (ENV_STAGE.to_string(), self.kind.to_string()),
            (
                ENV_POINT_CLOUD_FILENAME.to_string(),
                parameters.point_cloud_filename.clone(),
            ),
            (
                ENV_NUM_CPU_CORES.to_string(),
                parameters.num_cpu_cores.to_string(),
            ),
            (ENV_PARAMETERS.to_string(), parameters.to_json()?),
        ];
        for (key, value) in &self.command.env {
            env.push((
                key.clone(),
                fill_placeholders(&placeholders, &field, value, parameters)?,
            ));
        }

        Ok(CommandStage {
            kind: self.kind,
            program: self.command.program.clone(),
            args,
            working_directory,
            timeout: self.command.timeout_seconds.map(Duration::from_secs),
            env,
        })
    }
}

impl StageFactory for CommandStageFactory {
    fn kind(&self) -> StageKind {
        self.kind
    }

    fn build(&self, parameters: &Parameters) -> Result<Box<dyn Stage>> {
        Ok(Box::new(self.prepare(parameters)?))
    }
}

fn placeholder_pattern() -> Result<Regex> {
    Regex::new(r"\{([A-Za-z0-9_]+)\}")
        .map_err(|e| FsctError::config(format!("invalid placeholder pattern: {}", e)))
}

fn fill_placeholders(
    re: &Regex,
    field: &str,
    template: &str,
    parameters: &Parameters,
) -> Result<String> {
    let mut missing = None;
    let filled = re.replace_all(template, |caps: &regex::Captures| {
        let key = &caps[1];
        parameters.placeholder_value(key).unwrap_or_else(|| {
            missing.get_or_insert_with(|| key.to_string());
            String::new()
        })
    });

    match missing {
        Some(key) => Err(FsctError::InvalidConfigValueError {
            field: field.to_string(),
            value: template.to_string(),
            reason: format!("placeholder {{{}}} has no scalar parameter value", key),
        }),
        None => Ok(filled.into_owned()),
    }
}

/// One external program invocation, constructed for a single run.
#[derive(Debug)]
pub struct CommandStage {
    kind: StageKind,
    program: String,
    args: Vec<String>,
    working_directory: Option<PathBuf>,
    timeout: Option<Duration>,
    env: Vec<(String, String)>,
}

impl CommandStage {
    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn working_directory(&self) -> Option<&PathBuf> {
        self.working_directory.as_ref()
    }

    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn wait_error(&self, e: std::io::Error) -> FsctError {
        FsctError::stage(
            self.kind.as_str(),
            format!("waiting for '{}' failed: {}", self.program, e),
        )
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_directory {
            command.current_dir(dir);
        }
        command
    }
}

#[async_trait]
impl Stage for CommandStage {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    async fn run(&mut self) -> Result<()> {
        tracing::debug!(
            "Spawning {} {:?} for stage {}",
            self.program,
            self.args,
            self.kind
        );

        let mut child = self.command().spawn().map_err(|e| {
            FsctError::stage(
                self.kind.as_str(),
                format!("failed to start '{}': {}", self.program, e),
            )
        })?;

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status.map_err(|e| self.wait_error(e))?,
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        tracing::warn!("Could not kill timed out {} stage: {}", self.kind, e);
                    }
                    return Err(FsctError::StageTimeoutError {
                        stage: self.kind.to_string(),
                        seconds: limit.as_secs(),
                    });
                }
            },
            None => child.wait().await.map_err(|e| self.wait_error(e))?,
        };

        if !status.success() {
            return Err(FsctError::stage(
                self.kind.as_str(),
                format!("'{}' exited with {}", self.program, status),
            ));
        }

        tracing::debug!("Stage {} exited cleanly", self.kind);
        Ok(())
    }
}
