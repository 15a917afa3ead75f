//! Round-based fan-out of concurrent invocations.
//!
//! The run is split into `total_rounds` sequential rounds. Each round
//! spawns `units_per_round` invocations into a [`JoinSet`], picks write or
//! query for each one, and joins every task before the next round starts.
//! Peak concurrency is therefore exactly `units_per_round`, and rounds are
//! never pipelined.
//!
//! A failed invocation stops further issuance in its round. Tasks that
//! were already spawned are still awaited, then the run aborts with the
//! round index and operation class of the first failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indicatif::ProgressBar;
use rand::prelude::*;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ClassSelection;
use crate::context::RunContext;
use crate::error::{HarnessError, Result};
use crate::executor;
use crate::workload::OperationClass;

/// RNG stream reserved for class selection.
const SELECTION_STREAM: u64 = u64::MAX;

/// Lifecycle of a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    RoundRunning { round: u64 },
    RoundComplete { round: u64 },
    Finished,
    Aborted { round: u64 },
}

/// Picks the operation class for each invocation.
pub struct ClassSelector {
    selection: ClassSelection,
    rng: StdRng,
}

impl ClassSelector {
    pub fn new(selection: ClassSelection, rng: StdRng) -> Self {
        Self { selection, rng }
    }

    pub fn next_class(&mut self) -> OperationClass {
        match self.selection {
            ClassSelection::Random { write_ratio } => {
                if self.rng.gen_bool(write_ratio) {
                    OperationClass::Write
                } else {
                    OperationClass::Query
                }
            }
            ClassSelection::Always { class } => class,
        }
    }
}

/// Drives the measured phase of a run.
pub struct RoundScheduler {
    ctx: Arc<RunContext>,
    total_rounds: u64,
    units_per_round: usize,
    selector: ClassSelector,
    state: SchedulerState,
    progress: ProgressBar,
    rounds_completed: u64,
    invocations_issued: u64,
}

impl RoundScheduler {
    /// Create a scheduler for the round layout in the context's configuration.
    pub fn new(ctx: Arc<RunContext>) -> Self {
        let workload = &ctx.config().workload;
        let total_rounds = workload.total_rounds;
        let units_per_round = workload.units_per_round;
        let selector = ClassSelector::new(
            workload.selection.clone(),
            ctx.generator().rng_for(SELECTION_STREAM),
        );

        Self {
            ctx,
            total_rounds,
            units_per_round,
            selector,
            state: SchedulerState::Idle,
            progress: ProgressBar::hidden(),
            rounds_completed: 0,
            invocations_issued: 0,
        }
    }

    /// Advance the given progress bar once per completed round.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn rounds_completed(&self) -> u64 {
        self.rounds_completed
    }

    pub fn invocations_issued(&self) -> u64 {
        self.invocations_issued
    }

    /// Run every round, stopping at the first fatal error.
    #[instrument(skip(self), fields(rounds = self.total_rounds, units = self.units_per_round))]
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting measured rounds");

        for round in 0..self.total_rounds {
            self.state = SchedulerState::RoundRunning { round };
            if let Err(e) = self.run_round(round).await {
                self.state = SchedulerState::Aborted { round };
                self.progress.abandon_with_message(format!("aborted in round {}", round));
                error!(round, error = %e, "Run aborted");
                return Err(e);
            }
            self.state = SchedulerState::RoundComplete { round };
            self.rounds_completed += 1;
            self.progress.inc(1);
        }

        self.state = SchedulerState::Finished;
        self.progress.finish_with_message("complete");
        info!(
            rounds = self.rounds_completed,
            invocations = self.invocations_issued,
            "All rounds complete"
        );
        Ok(())
    }

    /// Fan out one round and wait for all of it.
    async fn run_round(&mut self, round: u64) -> Result<()> {
        let abort = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();

        for unit in 0..self.units_per_round {
            if abort.load(Ordering::Acquire) {
                warn!(
                    round,
                    skipped = self.units_per_round - unit,
                    "Invocation failed, not issuing the rest of the round"
                );
                break;
            }

            let class = self.selector.next_class();
            let sequence = round * self.units_per_round as u64 + unit as u64;
            let ctx = self.ctx.clone();
            let abort = abort.clone();

            tasks.spawn(async move {
                let work = ctx.build_unit(class, sequence);
                let result = executor::execute(&ctx, work).await;
                if result.is_err() {
                    abort.store(true, Ordering::Release);
                }
                (class, result)
            });
            self.invocations_issued += 1;
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let failure = match joined {
                Ok((_, Ok(()))) => continue,
                Ok((class, Err(source))) => {
                    warn!(round, %class, error = %source, "Invocation failed");
                    HarnessError::Backend {
                        class,
                        round,
                        source,
                    }
                }
                Err(e) => HarnessError::TaskJoin {
                    round,
                    message: e.to_string(),
                },
            };
            first_error.get_or_insert(failure);
        }

        debug!(round, "Round drained");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
