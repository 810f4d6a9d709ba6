//! Shared, dependency-light helpers used by the rest of the workspace:
//! logging setup and the packed atomic running-mean primitive the search
//! tree's node record relies on. Nothing here is process-global mutable
//! state other than the logger -- configuration itself is an immutable
//! value constructed by the caller (see `corvid_mcts::options`), not a
//! `lazy_static` the way the teacher crate's own config module works.

pub mod atomic_mean;

pub use atomic_mean::AtomicMean;

/// Initializes the global logger exactly once; safe to call from multiple
/// crates (tests, the demo binary) without double-init panics.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(cfg!(test)).try_init();
}
