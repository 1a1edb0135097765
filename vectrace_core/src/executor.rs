use crate::context::{BoundViolation, RunContext, Termination};
use crate::guard::GuardTable;
use crate::record::RunRecord;
use crate::vector::Vector;
use std::any::Any;
use std::panic;
use std::sync::Once;
use std::thread;

/// Name given to every run thread; the panic hook keys off it.
pub const RUN_THREAD_NAME: &str = "vectrace-run";

/// Status the target must return (or pass to `exit`) to signal success.
pub const SUCCESS_STATUS: i32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Returned or exited with [`SUCCESS_STATUS`].
    Success,
    /// Returned or exited with any other status.
    Exit(i32),
    Abort,
    /// The target panicked.
    Crash(String),
    SizeBound(BoundViolation),
    /// A replayed vector ran out of bytes for this field.
    ReplayExhausted { field: String },
}

impl ExecutionStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }

    fn from_status_code(code: i32) -> Self {
        if code == SUCCESS_STATUS {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Exit(code)
        }
    }

    fn from_unwind(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<Termination>() {
            Ok(reason) => {
                return match *reason {
                    Termination::Exit(code) => Self::from_status_code(code),
                    Termination::Abort => ExecutionStatus::Abort,
                    Termination::SizeBound(violation) => ExecutionStatus::SizeBound(violation),
                    Termination::SourceExhausted { field } => {
                        ExecutionStatus::ReplayExhausted { field }
                    }
                };
            }
            Err(other) => other,
        };
        let msg = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic type".to_string()
        };
        ExecutionStatus::Crash(msg)
    }
}

/// Routes panics raised on run threads to the log instead of stderr. Panics on
/// any other thread still reach the previously installed hook. Idempotent.
pub fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if thread::current().name() == Some(RUN_THREAD_NAME) {
                log::debug!("Target panicked: {info}");
            } else {
                previous(info);
            }
        }));
    });
}

/// Invokes the target entry point behind a checkpoint.
///
/// Each invocation runs on a fresh scoped thread that borrows the run context.
/// Whatever way the target leaves, returning, `exit`/`abort`, a bound
/// violation deep inside `request_bytes`, or a plain panic, control comes back
/// here at the join and is turned into an [`ExecutionStatus`].
///
/// A target that never returns blocks the harness: there is no timeout.
pub struct InProcessExecutor<F>
where
    F: FnMut(&mut RunContext<'_>) -> i32 + Send,
{
    target: F,
}

impl<F> InProcessExecutor<F>
where
    F: FnMut(&mut RunContext<'_>) -> i32 + Send,
{
    pub fn new(target: F) -> Self {
        Self { target }
    }

    /// Runs the target once. The only error is failing to arm the checkpoint,
    /// i.e. failing to spawn the run thread.
    pub fn execute(&mut self, ctx: RunContext<'_>) -> std::io::Result<ExecutionStatus> {
        let target = &mut self.target;
        let joined = thread::scope(|scope| {
            let handle = thread::Builder::new()
                .name(RUN_THREAD_NAME.to_string())
                .spawn_scoped(scope, move || {
                    let mut ctx = ctx;
                    target(&mut ctx)
                })?;
            Ok::<_, std::io::Error>(handle.join())
        })?;

        Ok(match joined {
            Ok(code) => ExecutionStatus::from_status_code(code),
            Err(payload) => ExecutionStatus::from_unwind(payload),
        })
    }

    /// Re-runs the target over a captured vector. Coverage is tracked in a
    /// throwaway guard table, so the caller's discovery state is untouched.
    pub fn replay(
        &mut self,
        vector: &Vector,
        max_run_bytes: usize,
    ) -> std::io::Result<(ExecutionStatus, RunRecord)> {
        let mut source = vector.replay_source();
        let mut guards = GuardTable::new();
        let mut record = RunRecord::new(0);
        let ctx = RunContext::new(&mut record, &mut source, &mut guards, max_run_bytes);
        let status = self.execute(ctx)?;
        Ok((status, record))
    }
}
