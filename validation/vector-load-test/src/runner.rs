//! Harness orchestration: setup, measured rounds, export.

use std::sync::Arc;
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, instrument};

use crate::backend::{RestBackend, VectorBackend};
use crate::config::RunConfig;
use crate::context::RunContext;
use crate::error::{HarnessError, Result};
use crate::export::{ExportedSeries, ResultExporter};
use crate::metrics::RunSummary;
use crate::scheduler::RoundScheduler;
use crate::setup;
use crate::workload::OperationClass;

/// Result of a run that reached the export stage.
///
/// `error` holds the fatal error that ended the run early, if any. The
/// samples recorded before it are still exported.
#[derive(Debug)]
pub struct RunOutcome {
    pub summary: RunSummary,
    pub exported: Vec<ExportedSeries>,
    pub error: Option<HarnessError>,
}

/// Executes a load run with one writer and one reader connection.
pub struct LoadRunner {
    config: Arc<RunConfig>,
    writer: Arc<dyn VectorBackend>,
    reader: Arc<dyn VectorBackend>,
    show_progress: bool,
}

impl LoadRunner {
    /// Create a runner talking to the configured Milvus REST endpoint.
    pub fn new(config: RunConfig) -> Result<Self> {
        let writer = RestBackend::new(&config.backend)
            .map_err(|e| HarnessError::setup("connect", e))?;
        let reader = RestBackend::new(&config.backend)
            .map_err(|e| HarnessError::setup("connect", e))?;
        Ok(Self::with_backends(config, Arc::new(writer), Arc::new(reader)))
    }

    /// Create a runner over caller-supplied backends.
    pub fn with_backends(
        config: RunConfig,
        writer: Arc<dyn VectorBackend>,
        reader: Arc<dyn VectorBackend>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            writer,
            reader,
            show_progress: false,
        }
    }

    /// Show a per-round progress bar on stderr.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Run the whole harness.
    ///
    /// Returns `Err` only when exporting fails; run failures are reported
    /// through [`RunOutcome::error`] after the partial results are written.
    #[instrument(skip(self), fields(scenario = %self.config.name))]
    pub async fn run(&self) -> Result<RunOutcome> {
        let ctx = Arc::new(RunContext::new(
            self.config.clone(),
            self.writer.clone(),
            self.reader.clone(),
        ));
        let mut scheduler = RoundScheduler::new(ctx.clone()).with_progress(self.progress_bar());

        let workload = &self.config.workload;
        info!(
            address = %self.config.backend.address,
            rounds = workload.total_rounds,
            units_per_round = workload.units_per_round,
            selection = ?workload.selection,
            recording = ?workload.latency_recording,
            "Starting load run"
        );

        let start = Instant::now();
        let result = async {
            setup::prepare_collection(ctx.writer(), &self.config).await?;
            setup::preload(&ctx).await?;
            scheduler.run().await
        }
        .await;
        let duration = start.elapsed();

        if let Err(ref e) = result {
            error!(error = %e, "Run ended early, exporting partial results");
        }

        let exporter = ResultExporter::new(&self.config.output);
        let exported = exporter.export(ctx.recorder())?;

        let recorder = ctx.recorder();
        let summary = RunSummary {
            timestamp: chrono::Utc::now().to_rfc3339(),
            scenario_name: self.config.name.clone(),
            backend_address: self.config.backend.address.clone(),
            duration_secs: duration.as_secs_f64(),
            total_rounds: workload.total_rounds,
            units_per_round: workload.units_per_round,
            rounds_completed: scheduler.rounds_completed(),
            invocations_issued: scheduler.invocations_issued(),
            iterations_consumed: ctx.iterations_consumed(),
            writes: recorder.summary(OperationClass::Write),
            queries: recorder.summary(OperationClass::Query),
            aborted: result.as_ref().err().map(|e| e.to_string()),
        };

        if self.config.output.write_summary {
            let path = exporter.write_summary(&summary)?;
            info!(path = %path.display(), "Wrote run summary");
        }

        Ok(RunOutcome {
            summary,
            exported,
            error: result.err(),
        })
    }

    fn progress_bar(&self) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(self.config.workload.total_rounds);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} rounds {msg}")
        {
            pb.set_style(style.progress_chars("##-"));
        }
        pb
    }
}
