use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

/// The parameter mapping handed to every stage.
///
/// Only `point_cloud_filename` and `num_cpu_cores` are interpreted by the
/// runner. Every other key is carried in `extra` and forwarded untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub point_cloud_filename: String,
    /// 0 means "use all available cores".
    #[serde(default)]
    pub num_cpu_cores: usize,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Parameters {
    pub fn new(point_cloud_filename: impl Into<String>) -> Self {
        Self {
            point_cloud_filename: point_cloud_filename.into(),
            num_cpu_cores: 0,
            extra: Map::new(),
        }
    }

    pub fn with_cpu_cores(mut self, num_cpu_cores: usize) -> Self {
        self.num_cpu_cores = num_cpu_cores;
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "point_cloud_filename" => Some(Value::String(self.point_cloud_filename.clone())),
            "num_cpu_cores" => Some(Value::from(self.num_cpu_cores)),
            _ => self.extra.get(key).cloned(),
        }
    }

    /// Text form of a scalar value, as substituted into command arguments.
    pub fn placeholder_value(&self, key: &str) -> Option<String> {
        match self.get(key)? {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Which stages a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOptions {
    pub preprocess: bool,
    pub segmentation: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            preprocess: true,
            segmentation: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Preprocessing,
    #[serde(rename = "segmentation")]
    SemanticSegmentation,
}

impl StageKind {
    pub const ALL: [StageKind; 2] = [StageKind::Preprocessing, StageKind::SemanticSegmentation];

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Preprocessing => "preprocessing",
            StageKind::SemanticSegmentation => "segmentation",
        }
    }

    pub fn is_enabled(&self, options: &RunOptions) -> bool {
        match self {
            StageKind::Preprocessing => options.preprocess,
            StageKind::SemanticSegmentation => options.segmentation,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    Completed { duration_ms: u64 },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: StageKind,
    #[serde(flatten)]
    pub status: StageStatus,
}

impl StageReport {
    pub fn completed(stage: StageKind, duration: Duration) -> Self {
        Self {
            stage,
            status: StageStatus::Completed {
                duration_ms: duration.as_millis() as u64,
            },
        }
    }

    pub fn skipped(stage: StageKind) -> Self {
        Self {
            stage,
            status: StageStatus::Skipped,
        }
    }

    pub fn was_run(&self) -> bool {
        matches!(self.status, StageStatus::Completed { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub point_cloud_filename: String,
    pub num_cpu_cores: usize,
    pub available_cpu_cores: usize,
    pub used_default_cores: bool,
    pub started_at: DateTime<Utc>,
    pub total_duration_ms: u64,
    pub stages: Vec<StageReport>,
}

impl RunSummary {
    pub fn executed_stages(&self) -> Vec<StageKind> {
        self.stages
            .iter()
            .filter(|r| r.was_run())
            .map(|r| r.stage)
            .collect()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
