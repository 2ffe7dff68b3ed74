use crate::core::cores::{available_cpu_cores, resolve_cpu_cores};
use crate::domain::model::{Parameters, RunOptions, RunSummary, StageKind, StageReport};
use crate::domain::ports::StageFactory;
use crate::utils::error::{FsctError, Result};
use crate::utils::monitor::SystemMonitor;
use chrono::Utc;
use std::time::{Duration, Instant};

/// Runs preprocessing and then semantic segmentation on one point cloud.
pub struct FsctRunner {
    preprocessing: Option<Box<dyn StageFactory>>,
    segmentation: Option<Box<dyn StageFactory>>,
    monitor: Option<SystemMonitor>,
    available_cpu_cores: usize,
}

impl Default for FsctRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FsctRunner {
    pub fn new() -> Self {
        Self {
            preprocessing: None,
            segmentation: None,
            monitor: None,
            available_cpu_cores: available_cpu_cores(),
        }
    }

    /// Registers the factory for its stage, replacing an earlier one.
    pub fn with_stage(mut self, factory: Box<dyn StageFactory>) -> Self {
        match factory.kind() {
            StageKind::Preprocessing => self.preprocessing = Some(factory),
            StageKind::SemanticSegmentation => self.segmentation = Some(factory),
        }
        self
    }

    pub fn with_monitoring(mut self, enabled: bool) -> Self {
        self.monitor = enabled.then(|| SystemMonitor::new(true));
        self
    }

    /// Overrides the detected host core count.
    pub fn with_available_cores(mut self, available_cpu_cores: usize) -> Self {
        self.available_cpu_cores = available_cpu_cores.max(1);
        self
    }

    pub fn available_cpu_cores(&self) -> usize {
        self.available_cpu_cores
    }

    /// Resolves the core count in `parameters`, then runs the enabled stages
    /// in order. The first failing stage aborts the run.
    pub async fn run(&self, parameters: &mut Parameters, options: RunOptions) -> Result<RunSummary> {
        self.check_registered(&options)?;

        let started_at = Utc::now();
        let start = Instant::now();

        println!(
            "Current point cloud being processed:  {}",
            parameters.point_cloud_filename
        );
        if parameters.num_cpu_cores == 0 {
            println!("Using default number of CPU cores (all of them).");
        }
        let cores = resolve_cpu_cores(parameters, self.available_cpu_cores);
        println!(
            "Processing using  {} / {}  CPU cores.",
            cores.num_cpu_cores, cores.available_cpu_cores
        );

        self.log_stats("Run started");

        let mut stages = Vec::with_capacity(2);
        for kind in StageKind::ALL {
            if !kind.is_enabled(&options) {
                tracing::info!("⏭️ Skipping stage: {}", kind);
                stages.push(StageReport::skipped(kind));
                continue;
            }

            let factory = self.registered(kind)?;
            match self.run_stage(factory, parameters).await {
                Ok(duration) => {
                    tracing::info!("✅ Stage finished: {} (duration: {:?})", kind, duration);
                    self.log_stats(&format!("After {}", kind));
                    stages.push(StageReport::completed(kind, duration));
                }
                Err(e) => {
                    tracing::error!("❌ Stage {} failed: {}", kind, e);
                    return Err(e);
                }
            }
        }

        if let Some(monitor) = &self.monitor {
            monitor.log_final_stats();
        }

        Ok(RunSummary {
            point_cloud_filename: parameters.point_cloud_filename.clone(),
            num_cpu_cores: cores.num_cpu_cores,
            available_cpu_cores: cores.available_cpu_cores,
            used_default_cores: cores.used_default,
            started_at,
            total_duration_ms: start.elapsed().as_millis() as u64,
            stages,
        })
    }

    async fn run_stage(&self, factory: &dyn StageFactory, parameters: &Parameters) -> Result<Duration> {
        let start = Instant::now();

        let mut stage = factory.build(parameters)?;
        tracing::info!("▶️ Running stage: {}", stage.name());
        stage.run().await?;
        drop(stage);

        Ok(start.elapsed())
    }

    /// Every enabled stage needs a factory before the first one starts.
    fn check_registered(&self, options: &RunOptions) -> Result<()> {
        for kind in StageKind::ALL {
            if kind.is_enabled(options) {
                self.registered(kind)?;
            }
        }
        Ok(())
    }

    fn registered(&self, kind: StageKind) -> Result<&dyn StageFactory> {
        let factory = match kind {
            StageKind::Preprocessing => self.preprocessing.as_deref(),
            StageKind::SemanticSegmentation => self.segmentation.as_deref(),
        };
        factory.ok_or_else(|| FsctError::MissingConfigError {
            field: format!("stages.{}", kind),
        })
    }

    fn log_stats(&self, phase: &str) {
        if let Some(monitor) = &self.monitor {
            monitor.log_stats(phase);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::Stage;
    use std::sync::{Arc, Mutex};

    type Events = Arc<Mutex<Vec<String>>>;

    struct MockFactory {
        kind: StageKind,
        events: Events,
        fail_run: bool,
    }

    impl MockFactory {
        fn new(kind: StageKind, events: &Events) -> Self {
            Self {
                kind,
                events: events.clone(),
                fail_run: false,
            }
        }

        fn failing(mut self) -> Self {
            self.fail_run = true;
            self
        }
    }

    impl StageFactory for MockFactory {
        fn kind(&self) -> StageKind {
            self.kind
        }

        fn build(&self, parameters: &Parameters) -> Result<Box<dyn Stage>> {
            self.events.lock().unwrap().push(format!(
                "build {} cores={}",
                self.kind, parameters.num_cpu_cores
            ));
            Ok(Box::new(MockStage {
                name: self.kind.to_string(),
                events: self.events.clone(),
                fail: self.fail_run,
            }))
        }
    }

    struct MockStage {
        name: String,
        events: Events,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl Stage for MockStage {
        fn name(&self) -> &str {
            &self.name
        }

        async fn run(&mut self) -> Result<()> {
            self.events.lock().unwrap().push(format!("start {}", self.name));
            tokio::task::yield_now().await;
            if self.fail {
                return Err(FsctError::stage(self.name.clone(), "exit status: 1"));
            }
            self.events.lock().unwrap().push(format!("end {}", self.name));
            Ok(())
        }
    }

    impl Drop for MockStage {
        fn drop(&mut self) {
            self.events.lock().unwrap().push(format!("drop {}", self.name));
        }
    }

    fn runner(events: &Events) -> FsctRunner {
        FsctRunner::new()
            .with_stage(Box::new(MockFactory::new(StageKind::Preprocessing, events)))
            .with_stage(Box::new(MockFactory::new(StageKind::SemanticSegmentation, events)))
            .with_available_cores(8)
    }

    fn recorded(events: &Events) -> Vec<String> {
        events.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn test_both_stages_run_in_order() {
        let events = Events::default();
        let mut params = Parameters::new("T1.las").with_cpu_cores(2);

        let summary = runner(&events).run(&mut params, RunOptions::default()).await.unwrap();

        assert_eq!(
            recorded(&events),
            vec![
                "build preprocessing cores=2",
                "start preprocessing",
                "end preprocessing",
                "drop preprocessing",
                "build segmentation cores=2",
                "start segmentation",
                "end segmentation",
                "drop segmentation",
            ]
        );
        assert_eq!(
            summary.executed_stages(),
            vec![StageKind::Preprocessing, StageKind::SemanticSegmentation]
        );
        assert!(!summary.used_default_cores);
    }

    #[tokio::test]
    async fn test_zero_cores_resolved_before_stages_are_built() {
        let events = Events::default();
        let mut params = Parameters::new("T1.las");

        let summary = runner(&events).run(&mut params, RunOptions::default()).await.unwrap();

        assert_eq!(params.num_cpu_cores, 8);
        assert_eq!(summary.num_cpu_cores, 8);
        assert_eq!(summary.available_cpu_cores, 8);
        assert!(summary.used_default_cores);
        assert_eq!(recorded(&events)[0], "build preprocessing cores=8");
    }

    #[tokio::test]
    async fn test_preprocess_flag_false_skips_preprocessing() {
        let events = Events::default();
        let mut params = Parameters::new("T1.las").with_cpu_cores(1);
        let options = RunOptions {
            preprocess: false,
            segmentation: true,
        };

        let summary = runner(&events).run(&mut params, options).await.unwrap();

        assert!(recorded(&events).iter().all(|e| !e.contains("preprocessing")));
        assert_eq!(summary.executed_stages(), vec![StageKind::SemanticSegmentation]);
        assert_eq!(summary.stages[0], StageReport::skipped(StageKind::Preprocessing));
    }

    #[tokio::test]
    async fn test_segmentation_flag_false_skips_segmentation() {
        let events = Events::default();
        let mut params = Parameters::new("T1.las").with_cpu_cores(1);
        let options = RunOptions {
            preprocess: true,
            segmentation: false,
        };

        let summary = runner(&events).run(&mut params, options).await.unwrap();

        assert!(recorded(&events).iter().all(|e| !e.contains("segmentation")));
        assert_eq!(summary.executed_stages(), vec![StageKind::Preprocessing]);
    }

    #[tokio::test]
    async fn test_both_flags_false_still_resolves_cores() {
        let events = Events::default();
        let mut params = Parameters::new("T1.las");
        let options = RunOptions {
            preprocess: false,
            segmentation: false,
        };

        let summary = runner(&events).run(&mut params, options).await.unwrap();

        assert!(recorded(&events).is_empty());
        assert!(summary.executed_stages().is_empty());
        assert_eq!(params.num_cpu_cores, 8);
    }

    #[tokio::test]
    async fn test_failed_preprocessing_stops_the_run() {
        let events = Events::default();
        let runner = FsctRunner::new()
            .with_stage(Box::new(
                MockFactory::new(StageKind::Preprocessing, &events).failing(),
            ))
            .with_stage(Box::new(MockFactory::new(StageKind::SemanticSegmentation, &events)))
            .with_available_cores(4);
        let mut params = Parameters::new("T1.las");

        let err = runner.run(&mut params, RunOptions::default()).await.unwrap_err();

        assert!(matches!(err, FsctError::StageError { ref stage, .. } if stage == "preprocessing"));
        assert_eq!(
            recorded(&events),
            vec![
                "build preprocessing cores=4",
                "start preprocessing",
                "drop preprocessing",
            ]
        );
    }

    #[tokio::test]
    async fn test_enabled_stage_without_factory_is_missing_config() {
        let events = Events::default();
        let runner = FsctRunner::new()
            .with_stage(Box::new(MockFactory::new(StageKind::Preprocessing, &events)))
            .with_available_cores(2);
        let mut params = Parameters::new("T1.las");

        let err = runner.run(&mut params, RunOptions::default()).await.unwrap_err();

        assert!(matches!(
            err,
            FsctError::MissingConfigError { ref field } if field == "stages.segmentation"
        ));
        assert!(recorded(&events).is_empty());
        assert_eq!(params.num_cpu_cores, 0);
    }

    #[tokio::test]
    async fn test_unregistered_stage_is_fine_when_disabled() {
        let events = Events::default();
        let runner = FsctRunner::new()
            .with_stage(Box::new(MockFactory::new(StageKind::SemanticSegmentation, &events)))
            .with_available_cores(2);
        let mut params = Parameters::new("T1.las");
        let options = RunOptions {
            preprocess: false,
            segmentation: true,
        };

        let summary = runner.run(&mut params, options).await.unwrap();

        assert_eq!(summary.executed_stages(), vec![StageKind::SemanticSegmentation]);
    }

    #[test]
    fn test_available_cores_never_zero() {
        let events = Events::default();
        assert_eq!(runner(&events).with_available_cores(0).available_cpu_cores(), 1);
    }
}
