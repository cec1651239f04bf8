//! Optional counters for instrumentation.

#[derive(Clone, Debug, Default)]
pub struct Counters {
    pub tokens_emitted: u64,
    pub parse_errors: u64,
    pub pumps: u64,
    pub yields: u64,
    /// Highest number of pumps ever active at once; anything above 1 is a bug.
    pub max_active_pumps: u64,
}
