pub mod config;
pub mod context;
pub mod executor;
pub mod guard;
pub mod record;
pub mod source;
pub mod store;
pub mod supervisor;
pub mod vector;

pub use config::{HarnessSettings, SeedMode, VectraceConfig};
pub use context::{BoundViolation, Nondet, RequestError, RunContext, Termination};
pub use executor::{ExecutionStatus, InProcessExecutor, SUCCESS_STATUS};
pub use guard::{CoverageHooks, GuardTable};
pub use record::{Field, RunRecord};
pub use source::{ByteSource, RandomSource, ReplaySource};
pub use store::{PersistError, StagedVector, VectorStore};
pub use supervisor::{
    HarnessError, HarnessSummary, StepOutcome, Supervisor, SupervisorState, TerminationReason,
};
pub use vector::{Vector, VectorParseError};
