pub mod run_config;

pub use run_config::{RunConfig, StageCommand};

#[cfg(feature = "cli")]
use clap::Parser;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "fsct-runner")]
#[command(about = "Runs point cloud preprocessing and semantic segmentation")]
pub struct CliConfig {
    /// Path to the TOML run configuration
    #[arg(short, long, default_value = "fsct-config.toml")]
    pub config: String,

    /// Point cloud to process, overrides parameters.point_cloud_filename
    #[arg(long)]
    pub point_cloud: Option<String>,

    /// CPU cores handed to the stages, 0 uses all of them
    #[arg(long)]
    pub num_cpu_cores: Option<usize>,

    #[arg(long, help = "Do not run the preprocessing stage")]
    pub skip_preprocess: bool,

    #[arg(long, help = "Do not run the semantic segmentation stage")]
    pub skip_segmentation: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    pub monitor: Option<bool>,

    /// Write the run summary as JSON to this path
    #[arg(long)]
    pub summary: Option<String>,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    /// Show what would be run without starting any stage
    #[arg(long)]
    pub dry_run: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// Applies command line overrides on top of the file configuration.
    pub fn apply_to(&self, config: &mut RunConfig) {
        if let Some(point_cloud) = &self.point_cloud {
            tracing::info!("🔧 Point cloud overridden to: {}", point_cloud);
            config.parameters.point_cloud_filename = point_cloud.clone();
        }
        if let Some(cores) = self.num_cpu_cores {
            tracing::info!("🔧 CPU cores overridden to: {}", cores);
            config.parameters.num_cpu_cores = cores;
        }
        if self.skip_preprocess {
            config.run.preprocess = Some(false);
        }
        if self.skip_segmentation {
            config.run.segmentation = Some(false);
        }
        if let Some(enabled) = self.monitor {
            config.monitoring = Some(run_config::MonitoringConfig { enabled });
        }
    }
}
