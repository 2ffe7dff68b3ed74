use anyhow::Context;
use clap::Parser;
use fsct_runner::core::cores::available_cpu_cores;
use fsct_runner::utils::{logger, validation::Validate};
use fsct_runner::{CliConfig, CommandStageFactory, FsctRunner, RunConfig, RunSummary, StageKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("🚀 Starting fsct-runner");
    tracing::info!("📁 Loading configuration from: {}", cli.config);

    let mut config = match RunConfig::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("❌ Failed to load config file '{}': {}", cli.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(e.exit_code());
        }
    };

    cli.apply_to(&mut config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.exit_code());
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    if cli.verbose {
        tracing::debug!("Run config: {:?}", config);
    }

    if cli.dry_run {
        tracing::info!("🔍 DRY RUN MODE - no stage will be started");
        display_plan(&config);
        return Ok(());
    }

    let monitor_enabled = config.monitoring_enabled();
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let mut runner = FsctRunner::new().with_monitoring(monitor_enabled);
    for kind in StageKind::ALL {
        if let Some(command) = config.stage_command(kind) {
            runner = runner.with_stage(Box::new(CommandStageFactory::new(kind, command.clone())));
        }
    }

    let options = config.run_options();
    match runner.run(&mut config.parameters, options).await {
        Ok(summary) => {
            tracing::info!(
                "✅ Run completed in {}ms (stages: {:?})",
                summary.total_duration_ms,
                summary.executed_stages()
            );
            if let Some(path) = &cli.summary {
                write_summary(path, &summary).await?;
                tracing::info!("📁 Summary saved to: {}", path);
            }
        }
        Err(e) => {
            tracing::error!(
                "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = e.exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

async fn write_summary(path: &str, summary: &RunSummary) -> anyhow::Result<()> {
    let json = summary.to_json_pretty()?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("writing run summary to {}", path))
}

fn display_plan(config: &RunConfig) {
    let options = config.run_options();
    let available = available_cpu_cores();
    let requested = config.parameters.num_cpu_cores;

    println!("📋 Run plan:");
    println!("  Point cloud: {}", config.parameters.point_cloud_filename);
    if requested == 0 {
        println!("  CPU cores: all ({} available)", available);
    } else {
        println!("  CPU cores: {} / {}", requested, available);
    }

    for kind in StageKind::ALL {
        match (kind.is_enabled(&options), config.stage_command(kind)) {
            (true, Some(command)) => {
                println!("  {}: {} {}", kind, command.program, command.args.join(" "))
            }
            (true, None) => println!("  {}: enabled, no command", kind),
            (false, _) => println!("  {}: skipped", kind),
        }
    }
}
