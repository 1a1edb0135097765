use crate::guard::{CoverageHooks, GuardTable};
use crate::record::{Field, RunRecord};
use crate::source::ByteSource;
use std::panic::resume_unwind;
use thiserror::Error;

/// Why a run stopped before its entry point returned.
///
/// Carried as the unwind payload from the point of termination up to the
/// checkpoint, where the executor turns it into an `ExecutionStatus`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Exit(i32),
    Abort,
    SizeBound(BoundViolation),
    SourceExhausted { field: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Field '{field}' requests {requested} bytes with {used} of {limit} already used")]
pub struct BoundViolation {
    pub field: String,
    pub requested: usize,
    pub used: usize,
    pub limit: usize,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Run byte bound exceeded: {0}")]
    Bound(#[from] BoundViolation),
    #[error("Byte source exhausted while filling field '{0}'")]
    Exhausted(String),
}

/// The target's view of the harness for the duration of one run.
///
/// Input reads go through [`RunContext::request_bytes`], coverage goes through
/// [`CoverageHooks`], and [`RunContext::exit`] / [`RunContext::abort`] leave the
/// run from any call depth.
pub struct RunContext<'a> {
    record: &'a mut RunRecord,
    source: &'a mut dyn ByteSource,
    guards: &'a mut GuardTable,
    max_run_bytes: usize,
}

impl<'a> RunContext<'a> {
    pub fn new(
        record: &'a mut RunRecord,
        source: &'a mut dyn ByteSource,
        guards: &'a mut GuardTable,
        max_run_bytes: usize,
    ) -> Self {
        Self {
            record,
            source,
            guards,
            max_run_bytes,
        }
    }

    /// Hands `size` fresh bytes to the target and records them as `name`.
    ///
    /// Never returns a short buffer: if the run's byte bound would be
    /// exceeded, or the source runs dry, the run is terminated instead.
    pub fn request_bytes(&mut self, size: usize, name: &str) -> Vec<u8> {
        match self.try_request_bytes(size, name) {
            Ok(bytes) => bytes,
            Err(RequestError::Bound(violation)) => terminate(Termination::SizeBound(violation)),
            Err(RequestError::Exhausted(field)) => {
                terminate(Termination::SourceExhausted { field })
            }
        }
    }

    /// Like [`RunContext::request_bytes`] but reports failures to the caller.
    /// Nothing is recorded when an error is returned.
    pub fn try_request_bytes(&mut self, size: usize, name: &str) -> Result<Vec<u8>, RequestError> {
        let used = self.record.byte_count();
        if size > self.max_run_bytes.saturating_sub(used) {
            return Err(BoundViolation {
                field: name.to_string(),
                requested: size,
                used,
                limit: self.max_run_bytes,
            }
            .into());
        }

        // Byte i is the i-th draw, so the latest draw ends up most significant.
        let mut bytes = Vec::with_capacity(size);
        for _ in 0..size {
            match self.source.draw() {
                Some(byte) => bytes.push(byte),
                None => return Err(RequestError::Exhausted(name.to_string())),
            }
        }
        self.record.push_field(Field::new(name, bytes.clone()));
        Ok(bytes)
    }

    /// Reads a typed value; see [`Nondet`].
    pub fn nondet<T: Nondet>(&mut self, name: &str) -> T {
        let bytes = self.request_bytes(T::SIZE, name);
        T::from_le_slice(&bytes)
    }

    /// Reports that `location` executed.
    #[inline]
    pub fn trace(&mut self, location: usize) {
        if self.guards.trace(location) {
            self.record.mark_new();
        }
    }

    /// Ends the run as if the target called `exit(status)`.
    pub fn exit(&mut self, status: i32) -> ! {
        terminate(Termination::Exit(status))
    }

    /// Ends the run as if the target called `abort()`.
    pub fn abort(&mut self) -> ! {
        terminate(Termination::Abort)
    }

    pub fn record(&self) -> &RunRecord {
        self.record
    }

    pub fn remaining_bytes(&self) -> usize {
        self.max_run_bytes.saturating_sub(self.record.byte_count())
    }
}

impl CoverageHooks for RunContext<'_> {
    fn on_guard_table_init(&mut self, locations: usize) {
        self.guards.init(locations);
    }

    fn on_guard_hit(&mut self, location: usize) {
        self.trace(location);
    }
}

// `resume_unwind` skips the panic hook: deliberate terminations are silent.
fn terminate(reason: Termination) -> ! {
    resume_unwind(Box::new(reason))
}

/// Values the target can request by type instead of by size.
pub trait Nondet: Sized {
    const SIZE: usize;
    fn from_le_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_nondet_le {
    ($($ty:ty),*) => {
        $(
            impl Nondet for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();
                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_nondet_le!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64);

impl Nondet for bool {
    const SIZE: usize = 1;
    fn from_le_slice(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}
