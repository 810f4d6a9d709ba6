//! Thin demo binary: runs one search from the starting position against the
//! uniform predictor and prints the chosen move. No UCI/CLI surface -- that
//! is explicitly out of scope (spec.md's "command-line surface" Non-goal).

use cpu_time::ProcessTime;

use corvid_mcts::{search, Config, TimeControl};
use corvid_position::Board;
use corvid_predictor::UniformPredictor;

fn main() {
    corvid_utils::init_logging();

    let config = Config::default();
    let predictor = UniformPredictor::new(config.prediction_batch_size);
    let time_control = TimeControl { nodes: Some(20_000), ..TimeControl::default() };

    let position = Board::starting_position();
    let started = ProcessTime::now();

    match search(position, &config, &predictor, &time_control, &[]) {
        Ok(outcome) => {
            let cpu_seconds = started.elapsed().as_secs_f64().max(1e-6);
            let nps = outcome.total_nodes as f64 / cpu_seconds;

            match outcome.best_move {
                Some(mv) => log::info!(
                    "bestmove {} ({} nodes, {:.0} nodes/cpu-sec, value {:.3})",
                    mv,
                    outcome.total_nodes,
                    nps,
                    outcome.root_value
                ),
                None => log::info!("no legal move (terminal: {:?})", outcome.terminal),
            }
        }
        Err(err) => log::error!("search failed: {}", err),
    }
}
