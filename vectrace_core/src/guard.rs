/// The two callbacks a coverage instrumentation collaborator drives.
///
/// The harness only reacts to these; who calls them (compiler-inserted
/// guards, a hand-instrumented target, a test) is outside its control.
pub trait CoverageHooks {
    /// Announces how many instrumented locations exist.
    fn on_guard_table_init(&mut self, locations: usize);

    /// Reports that `location` just executed.
    fn on_guard_hit(&mut self, location: usize);
}

/// Per-location guard identifiers.
///
/// Identifiers `1..=locations` are assigned once by [`GuardTable::init`]. A
/// non-zero identifier means the location has never been observed; the first
/// [`GuardTable::trace`] of that location clears it to zero for good, so each
/// location counts as new coverage at most once for the lifetime of the table.
#[derive(Debug, Clone, Default)]
pub struct GuardTable {
    guards: Vec<u32>,
    discovered: usize,
}

impl GuardTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns identifiers to `locations` guards. Returns `false` without
    /// touching the table if identifiers were already assigned.
    pub fn init(&mut self, locations: usize) -> bool {
        if !self.guards.is_empty() || locations == 0 {
            return false;
        }
        self.guards = (1..=locations).map(|id| id as u32).collect();
        true
    }

    pub fn is_initialized(&self) -> bool {
        !self.guards.is_empty()
    }

    /// Clears the guard at `location`; returns `true` if this was its first hit.
    #[inline]
    pub fn trace(&mut self, location: usize) -> bool {
        match self.guards.get_mut(location) {
            Some(guard) if *guard != 0 => {
                *guard = 0;
                self.discovered += 1;
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Number of locations observed so far.
    pub fn discovered(&self) -> usize {
        self.discovered
    }
}
