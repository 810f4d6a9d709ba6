//! Search configuration. Unlike the teacher crate, which reads these values
//! from a process-wide `lazy_static` parsed out of environment variables,
//! this is a plain immutable value constructed by the caller and handed
//! down into `SearchState` and every worker -- config parsing is out of
//! scope here, so there is nothing to parse.
//!
//! Spec §6 names `searchThreads` alongside `numWorkers` as distinct UCI
//! options, but on this synchronous-predictor design (the predictor call in
//! `worker.rs` is inline, not dispatched to its own thread pool) there is no
//! second thread count for it to name -- `numWorkers` spawns the only
//! threads a search has, and `searchParallelism` already controls the
//! in-flight batch width per worker. Adding a `search_threads` field with no
//! call site would recreate the exact "declared but never read" problem
//! this config previously had for `num_simulations`/`max_moves`, so it is
//! deliberately not represented here.

#[derive(Debug, Clone)]
pub struct Config {
    pub num_workers: usize,
    pub search_parallelism: usize,
    pub prediction_batch_size: usize,

    pub num_simulations: Option<u32>,
    pub max_moves: u32,
    pub num_sampling_moves: u32,

    pub root_dirichlet_alpha: f32,
    pub root_exploration_fraction: f32,

    pub exploration_rate_base: f32,
    pub exploration_rate_init: f32,

    pub use_sble_puct: bool,
    pub linear_exploration_rate: f32,
    pub linear_exploration_base: f32,

    pub virtual_loss_coefficient: f32,
    pub moving_average_build: i32,
    pub moving_average_cap: i32,
    pub backpropagation_puct_threshold: f32,

    pub prediction_cache_request_gibibytes: f32,
    pub prediction_cache_min_gibibytes: f32,
    pub prediction_cache_max_ply: u32,

    pub time_control_safety_buffer_milliseconds: u64,
    pub time_control_fraction_of_remaining: f32,

    pub search_gui_update_interval_nodes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_workers: 4,
            search_parallelism: 8,
            prediction_batch_size: 16,

            num_simulations: None,
            max_moves: 512,
            num_sampling_moves: 0,

            root_dirichlet_alpha: 0.3,
            root_exploration_fraction: 0.25,

            exploration_rate_base: 19652.0,
            exploration_rate_init: 1.25,

            use_sble_puct: false,
            linear_exploration_rate: 0.0,
            linear_exploration_base: 0.5,

            virtual_loss_coefficient: 1.0,
            moving_average_build: 8,
            moving_average_cap: 4096,
            backpropagation_puct_threshold: 0.0,

            prediction_cache_request_gibibytes: 1.0,
            prediction_cache_min_gibibytes: 0.125,
            prediction_cache_max_ply: 30,

            time_control_safety_buffer_milliseconds: 50,
            time_control_fraction_of_remaining: 20.0,

            search_gui_update_interval_nodes: 1000,
        }
    }
}

impl Config {
    /// Number of (fingerprint, value, prior) slots the prediction cache
    /// should hold, derived from the requested byte budget rather than a
    /// hardcoded slot count -- see `corvid_mcts::cache`.
    pub fn cache_slot_count(&self) -> usize {
        const BYTES_PER_SLOT: f32 = 64.0;
        let gib = self.prediction_cache_request_gibibytes.max(self.prediction_cache_min_gibibytes);
        let bytes = gib * 1024.0 * 1024.0 * 1024.0;

        ((bytes / BYTES_PER_SLOT) as usize).max(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_cache_size() {
        let config = Config::default();
        assert!(config.cache_slot_count() >= 1024);
    }

    #[test]
    fn cache_size_respects_minimum_floor() {
        let config = Config {
            prediction_cache_request_gibibytes: 0.0,
            prediction_cache_min_gibibytes: 0.5,
            ..Config::default()
        };

        let floor = Config { prediction_cache_request_gibibytes: 0.5, ..Config::default() }.cache_slot_count();
        assert_eq!(config.cache_slot_count(), floor);
    }
}
