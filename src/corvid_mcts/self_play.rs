//! Self-play game driving (spec §4.F step 3): repeatedly search from the
//! current position, pick a move, advance the tree, and continue until the
//! game ends or `maxMoves` plies pass. Named after the teacher crate's own
//! `self_play` module, which plays the analogous role generating full games
//! for training data rather than a single best move.

use rand::rngs::SmallRng;
use rand::SeedableRng;

use corvid_position::{Move, Position};
use corvid_predictor::Predictor;

use crate::driver::SearchTree;
use crate::errors::SearchError;
use crate::options::Config;
use crate::terminal::TerminalValue;
use crate::time_control::TimeControl;

/// One finished self-play game.
#[derive(Debug, Clone)]
pub struct SelfPlayRecord {
    pub moves: Vec<Move>,
    pub outcome: TerminalValue,
}

/// Plays one game to completion. The first `config.num_sampling_moves`
/// plies sample a move proportional to its root child's visit count; every
/// move after that is the plain visit-count argmax. Each move's search
/// runs until `config.num_simulations` simulations complete (unbounded if
/// `None`, relying on `config.max_moves` alone to end the game).
pub fn play_self_play_game<P>(start_position: P, config: &Config, predictor: &dyn Predictor) -> Result<SelfPlayRecord, SearchError>
where
    P: Position + Clone + Send,
{
    let mut position = start_position;
    let mut tree = SearchTree::new(config);
    let mut moves = Vec::new();
    let mut rng = SmallRng::from_entropy();

    let time_control = TimeControl { simulations: config.num_simulations.map(u64::from), ..TimeControl::default() };

    for ply in 0..config.max_moves {
        let outcome = tree.search(position.clone(), config, predictor, &time_control, &[])?;

        if let Some(terminal) = outcome.terminal {
            return Ok(SelfPlayRecord { moves, outcome: terminal });
        }

        let legal_moves = position.legal_moves();
        let chosen = if ply < config.num_sampling_moves {
            tree.sample_move(&legal_moves, &mut rng).or(outcome.best_move)
        } else {
            outcome.best_move
        };

        let mv = match chosen {
            Some(mv) => mv,
            None => return Ok(SelfPlayRecord { moves, outcome: TerminalValue::Draw }),
        };

        tree.advance(mv);
        position.apply_move(mv);
        moves.push(mv);
    }

    Ok(SelfPlayRecord { moves, outcome: TerminalValue::Draw })
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_position::Board;
    use corvid_predictor::UniformPredictor;

    #[test]
    fn a_game_against_the_uniform_predictor_terminates_within_max_moves() {
        let config = Config {
            num_workers: 2,
            search_parallelism: 4,
            num_simulations: Some(64),
            max_moves: 12,
            num_sampling_moves: 4,
            ..Config::default()
        };
        let predictor = UniformPredictor::new(8);

        let record = play_self_play_game(Board::starting_position(), &config, &predictor).unwrap();

        assert!(record.moves.len() <= config.max_moves as usize);
    }

    #[test]
    fn sampling_moves_stay_within_the_legal_move_list() {
        let config = Config {
            num_workers: 1,
            search_parallelism: 2,
            num_simulations: Some(32),
            max_moves: 3,
            num_sampling_moves: 3,
            ..Config::default()
        };
        let predictor = UniformPredictor::new(8);

        let mut position = Board::starting_position();
        let record = play_self_play_game(position.clone(), &config, &predictor).unwrap();

        for mv in &record.moves {
            assert!(position.legal_moves().contains(mv));
            position.apply_move(*mv);
        }
    }
}
