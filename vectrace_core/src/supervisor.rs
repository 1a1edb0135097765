use crate::config::HarnessSettings;
use crate::context::RunContext;
use crate::executor::{ExecutionStatus, InProcessExecutor, install_panic_hook};
use crate::guard::GuardTable;
use crate::record::RunRecord;
use crate::source::RandomSource;
use crate::store::{PersistError, VectorStore};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal harness conditions. Anything recoverable (a rejected run, an
/// aborting target) is reported through [`StepOutcome`] instead.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Invalid harness settings: {0}")]
    InvalidSettings(String),
    #[error("Failed to persist vector: {0}")]
    Persist(#[from] PersistError),
    #[error("Failed to arm run checkpoint: {0}")]
    CheckpointArm(#[source] std::io::Error),
    #[error("Harness has already terminated: {0}")]
    Terminated(TerminationReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// The target completed with the success status.
    TargetSucceeded,
    /// `max-accepted-runs` vectors have been written.
    AcceptedRunLimit,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::TargetSucceeded => write!(f, "target succeeded"),
            TerminationReason::AcceptedRunLimit => write!(f, "accepted-run limit reached"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Running,
    Terminated(TerminationReason),
}

/// Result of one iteration of the capture loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Accepted {
        index: u64,
        path: PathBuf,
        status: ExecutionStatus,
    },
    Rejected {
        status: ExecutionStatus,
    },
}

impl StepOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, StepOutcome::Accepted { .. })
    }

    pub fn status(&self) -> &ExecutionStatus {
        match self {
            StepOutcome::Accepted { status, .. } | StepOutcome::Rejected { status } => status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessSummary {
    pub seed: u64,
    pub executions: u64,
    pub accepted_runs: u64,
    pub discovered_locations: usize,
    pub reason: TerminationReason,
}

/// Drives the capture loop: run the target behind a checkpoint, keep the run's
/// vector if it found new coverage, repeat until a bound is hit.
///
/// The supervisor owns every piece of cross-run state (random source, guard
/// table, counters) and lends it to one run at a time.
pub struct Supervisor<F>
where
    F: FnMut(&mut RunContext<'_>) -> i32 + Send,
{
    settings: HarnessSettings,
    source: RandomSource,
    guards: GuardTable,
    store: VectorStore,
    executor: InProcessExecutor<F>,
    state: SupervisorState,
    run_index: u64,
    accepted_runs: u64,
    executions: u64,
}

impl<F> Supervisor<F>
where
    F: FnMut(&mut RunContext<'_>) -> i32 + Send,
{
    pub fn new(
        settings: HarnessSettings,
        store: VectorStore,
        target: F,
    ) -> Result<Self, HarnessError> {
        settings.validate().map_err(HarnessError::InvalidSettings)?;
        let source = RandomSource::from_mode(&settings.seed);
        Ok(Self {
            settings,
            source,
            guards: GuardTable::new(),
            store,
            executor: InProcessExecutor::new(target),
            state: SupervisorState::Idle,
            run_index: 0,
            accepted_runs: 0,
            executions: 0,
        })
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn seed(&self) -> u64 {
        self.source.seed()
    }

    /// Index the next accepted run will be persisted under.
    pub fn run_index(&self) -> u64 {
        self.run_index
    }

    pub fn accepted_runs(&self) -> u64 {
        self.accepted_runs
    }

    pub fn executions(&self) -> u64 {
        self.executions
    }

    pub fn guards(&self) -> &GuardTable {
        &self.guards
    }

    /// For instrumentation that registers its locations before the first run.
    pub fn guards_mut(&mut self) -> &mut GuardTable {
        &mut self.guards
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    fn setup(&mut self) {
        install_panic_hook();
        log::info!(
            "Capturing into {:?} with seed {} (max {} bytes per run, {} accepted runs)",
            self.store.dir(),
            self.source.seed(),
            self.settings.max_run_bytes,
            self.settings.max_accepted_runs
        );
        self.state = SupervisorState::Running;
    }

    /// Runs the target once and persists or discards the result.
    pub fn step(&mut self) -> Result<StepOutcome, HarnessError> {
        match self.state {
            SupervisorState::Terminated(reason) => return Err(HarnessError::Terminated(reason)),
            SupervisorState::Idle => self.setup(),
            SupervisorState::Running => {}
        }

        let mut record = RunRecord::new(self.run_index);
        let ctx = RunContext::new(
            &mut record,
            &mut self.source,
            &mut self.guards,
            self.settings.max_run_bytes,
        );
        let status = self
            .executor
            .execute(ctx)
            .map_err(HarnessError::CheckpointArm)?;
        self.executions += 1;

        let accept = match &status {
            ExecutionStatus::Success => true,
            ExecutionStatus::SizeBound(_) => false,
            _ => record.is_new(),
        };
        if !accept {
            log::debug!(
                "Run {} rejected ({:?}, {} bytes)",
                self.executions,
                status,
                record.byte_count()
            );
            return Ok(StepOutcome::Rejected { status });
        }

        let path = self.store.persist(&record)?;
        let index = self.run_index;
        self.run_index += 1;
        self.accepted_runs += 1;
        log::info!(
            "Accepted run {} as {:?} ({:?}, {} fields, {} locations discovered)",
            self.executions,
            path,
            status,
            record.fields().len(),
            self.guards.discovered()
        );

        if status.is_success() {
            self.state = SupervisorState::Terminated(TerminationReason::TargetSucceeded);
        } else if self.accepted_runs >= self.settings.max_accepted_runs {
            self.state = SupervisorState::Terminated(TerminationReason::AcceptedRunLimit);
        }

        Ok(StepOutcome::Accepted {
            index,
            path,
            status,
        })
    }

    /// Loops until the target succeeds or the accepted-run limit is reached.
    pub fn run(&mut self) -> Result<HarnessSummary, HarnessError> {
        loop {
            if let SupervisorState::Terminated(reason) = self.state {
                let summary = self.summary(reason);
                log::info!("Capture finished: {reason} after {} executions", summary.executions);
                return Ok(summary);
            }
            self.step()?;
        }
    }

    fn summary(&self, reason: TerminationReason) -> HarnessSummary {
        HarnessSummary {
            seed: self.source.seed(),
            executions: self.executions,
            accepted_runs: self.accepted_runs,
            discovered_locations: self.guards.discovered(),
            reason,
        }
    }
}
