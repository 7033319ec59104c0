use crate::core::Pipeline;
use crate::domain::model::PackageReport;
use crate::utils::error::Result;
use crate::utils::fs_tree::mib;
use crate::utils::monitor::SystemMonitor;
use std::time::Instant;

/// Drives a [`Pipeline`] through fetch, prepare and package.
pub struct ArchiveEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> ArchiveEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub async fn run(&self) -> Result<PackageReport> {
        let start = Instant::now();
        match self.run_phases().await {
            Ok(report) => {
                tracing::info!(
                    "✅ Packaged {} ({:.2} MB) in {:.1}s",
                    report.archive_name,
                    mib(report.size),
                    start.elapsed().as_secs_f64()
                );
                self.monitor.log_final_stats();
                Ok(report)
            }
            Err(e) => {
                tracing::error!("❌ Pipeline failed after {:.1}s: {}", start.elapsed().as_secs_f64(), e);
                self.pipeline.abort().await;
                Err(e)
            }
        }
    }

    async fn run_phases(&self) -> Result<PackageReport> {
        // Fetch
        tracing::info!("⬇️  Phase 1/3: fetch");
        let phase = Instant::now();
        let extracted = self.pipeline.fetch().await?;
        tracing::info!("Fetched {} in {:.1}s", extracted.display(), phase.elapsed().as_secs_f64());
        self.monitor.log_stats("fetch");

        // Prepare
        tracing::info!("🔧 Phase 2/3: prepare");
        let phase = Instant::now();
        let staged = self.pipeline.prepare(extracted).await?;
        tracing::info!("Staged {} in {:.1}s", staged.root.display(), phase.elapsed().as_secs_f64());
        self.monitor.log_stats("prepare");

        // Package
        tracing::info!("📦 Phase 3/3: package");
        let phase = Instant::now();
        let report = self.pipeline.package(staged).await?;
        tracing::info!("Packaged in {:.1}s", phase.elapsed().as_secs_f64());
        self.monitor.log_stats("package");

        Ok(report)
    }
}
