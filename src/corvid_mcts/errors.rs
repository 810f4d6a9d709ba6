//! Error taxonomy for the search engine. Most faults are recovered from
//! without surfacing to the caller -- see the doc comment on each variant
//! for its actual disposition, which mirrors the teacher crate's habit of
//! treating most worker-loop faults as conditions to route around rather
//! than to unwind on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// The node arena could not grow to hold a new child. Recovered from by
    /// treating the expansion as a `FailNode` and retrying selection from
    /// the parent; never propagated past a single worker tick.
    #[error("node arena allocation failed")]
    AllocationFailed,

    /// The configured time budget elapsed before a single simulation
    /// completed. Fatal: the driver aborts the search and returns this to
    /// the caller rather than reporting a move chosen from zero evidence.
    #[error("search budget exhausted before any simulation completed")]
    NoSimulationsCompleted,
}
