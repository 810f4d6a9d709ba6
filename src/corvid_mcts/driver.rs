//! `WorkerGroup` / search driver (spec §4.H): owns the worker threads and
//! the shared `SearchState` for one search, expands the root once up front
//! (dirichlet noise, `searchMoves` filtering) so workers never race the
//! very first expansion, then polls the time control until it is time to
//! flip the stop flag.

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use rand::distributions::WeightedIndex;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rand_distr::{Dirichlet, Distribution};

use corvid_position::{Move, Position};
use corvid_predictor::{PredictionInput, Predictor};

use crate::cache::PredictionCache;
use crate::coordinator::WorkCoordinator;
use crate::errors::SearchError;
use crate::game::softmax_priors;
use crate::node::{self, allocate_children, populate_tablebase_probes, Node};
use crate::options::Config;
use crate::terminal::TerminalValue;
use crate::time_control::{SearchClock, TimeControl};
use crate::worker::{SelfPlayWorker, SharedCounters};

/// How often the driver thread wakes to evaluate the time control and
/// print an updated principal variation, independent of how many nodes a
/// worker processed in that interval.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

pub struct SearchOutcome {
    pub best_move: Option<Move>,
    pub root_value: f32,
    pub total_nodes: u64,
    pub failed_node_count: u64,
    pub terminal: Option<TerminalValue>,
}

/// Runs one search to completion against a fresh, unexpanded root. Most
/// callers that only ever search once from a given position want this; a
/// caller that wants the tree to survive across moves (spec §8 scenario 3,
/// "tree reuse after move") should use `SearchTree` instead.
pub fn search<P>(
    root_position: P,
    config: &Config,
    predictor: &dyn Predictor,
    time_control: &TimeControl,
    search_moves: &[Move],
) -> Result<SearchOutcome, SearchError>
where
    P: Position + Clone + Send,
{
    let root = Node::root();
    let cache = PredictionCache::new(config.cache_slot_count());
    search_at(&root, &cache, root_position, config, predictor, time_control, search_moves)
}

/// A search tree that survives across moves. Each `search` call grows the
/// current root in place rather than starting over; `advance` promotes the
/// chosen child to the new root and releases every sibling subtree, per the
/// tree-reuse correctness property in spec §8. The prediction cache is also
/// kept across calls -- a position already evaluated on a previous move
/// should not cost a second predictor round-trip just because the search
/// that reaches it again is a new call.
pub struct SearchTree {
    root: Node,
    cache: PredictionCache,
}

impl SearchTree {
    pub fn new(config: &Config) -> Self {
        Self { root: Node::root(), cache: PredictionCache::new(config.cache_slot_count()) }
    }

    pub fn root_visit_count(&self) -> i32 {
        self.root.visit_count()
    }

    /// Drops every cached prediction. Useful after a configuration change
    /// that would make stale entries misleading; throttled internally by
    /// `PredictionCache::reset`.
    pub fn reset_cache(&self) {
        self.cache.reset();
    }

    pub fn search<P>(
        &self,
        root_position: P,
        config: &Config,
        predictor: &dyn Predictor,
        time_control: &TimeControl,
        search_moves: &[Move],
    ) -> Result<SearchOutcome, SearchError>
    where
        P: Position + Clone + Send,
    {
        search_at(&self.root, &self.cache, root_position, config, predictor, time_control, search_moves)
    }

    /// Samples a root move with probability proportional to its child's
    /// visit count (spec §4.F step 3, "temperature-sampled diversity in
    /// early self-play"), falling back to the visit-count argmax if no
    /// child has any visits yet. An own-mate always wins outright, exactly
    /// as `SelectMove`'s plain argmax does -- sampling exists to diversify
    /// among comparable moves, not to pass up a proven win.
    pub fn sample_move(&self, legal_moves: &[Move], rng: &mut SmallRng) -> Option<Move> {
        select_move_sampled(&self.root, legal_moves, rng)
    }

    /// Promotes the child reached by `mv` to the new root. Every sibling
    /// subtree is dropped (and its memory released) as part of
    /// `node::prune_except`. If `mv` does not name an expanded child (the
    /// tree was never searched, or the move fell outside what was ever
    /// explored), starts over from a fresh root instead.
    pub fn advance(&mut self, mv: Move) {
        let keep_index = self.root.children().and_then(|children| children.iter().position(|c| c.mv() == mv.encode()));

        let kept = node::prune_except(&self.root, keep_index);
        self.root = match kept {
            Some(boxed) => *boxed,
            None => Node::root(),
        };
    }
}

impl Default for SearchTree {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

/// Runs one search to completion, growing `root` in place. `root_position`
/// is the position `root` represents; `search_moves`, if non-empty,
/// restricts the root's children to only those moves (UCI `go searchmoves`).
/// Returns `Err(SearchError::NoSimulationsCompleted)` if the time budget
/// expired before a single simulation backpropagated -- per spec §7 this is
/// the one error kind the driver surfaces rather than recovers from
/// silently.
fn search_at<P>(
    root: &Node,
    cache: &PredictionCache,
    root_position: P,
    config: &Config,
    predictor: &dyn Predictor,
    time_control: &TimeControl,
    search_moves: &[Move],
) -> Result<SearchOutcome, SearchError>
where
    P: Position + Clone + Send,
{
    let legal_moves = root_position.legal_moves();

    if let Some(terminal) = terminal_outcome(&root_position) {
        root.publish_terminal(terminal);
        return Ok(SearchOutcome {
            best_move: None,
            root_value: terminal.immediate_value(),
            total_nodes: 0,
            failed_node_count: 0,
            terminal: Some(terminal),
        });
    }

    expand_root(root, &root_position, predictor, config, search_moves, &legal_moves);

    let coordinator = WorkCoordinator::new();
    let counters = SharedCounters::new();
    let side_to_move_index = if matches!(root_position.side_to_move(), corvid_position::Color::White) { 0 } else { 1 };

    thread::scope(|scope| {
        for _ in 0..config.num_workers {
            let root_ref = root;
            let cache_ref = cache;
            let coordinator_ref = &coordinator;
            let counters_ref = &counters;
            let position = root_position.clone();

            scope.spawn(move || {
                let mut worker = SelfPlayWorker::new(
                    root_ref,
                    config,
                    predictor,
                    cache_ref,
                    coordinator_ref,
                    counters_ref,
                    position,
                    config.search_parallelism,
                );

                while !coordinator_ref.should_shut_down() {
                    worker.tick();
                }
            });
        }

        let mut clock = SearchClock::start(time_control.effective_budget(side_to_move_index, config));

        loop {
            thread::sleep(POLL_INTERVAL);

            let total_nodes = counters.total_nodes.load(Ordering::Relaxed);
            let total_simulations = counters.simulations_completed.load(Ordering::Relaxed);

            if counters.principal_variation_changed.swap(false, Ordering::AcqRel) {
                log_principal_variation(root, total_nodes);
            }

            if clock.is_done(root, total_nodes, total_simulations, time_control) {
                coordinator.request_shutdown();
                break;
            }
        }
    });

    let total_nodes = counters.total_nodes.load(Ordering::Relaxed);
    if total_nodes == 0 {
        return Err(SearchError::NoSimulationsCompleted);
    }

    let best = select_move(root, &legal_moves);

    Ok(SearchOutcome {
        best_move: best,
        root_value: root.value_average(),
        total_nodes,
        failed_node_count: counters.failed_node_count.load(Ordering::Relaxed),
        terminal: root.terminal_value(),
    })
}

fn terminal_outcome<P: Position>(position: &P) -> Option<TerminalValue> {
    let class = position.terminal_class();

    if !class.is_terminal() {
        return None;
    }

    Some(match class {
        corvid_position::TerminalClass::Checkmate => TerminalValue::OpponentMateIn(0),
        _ => TerminalValue::Draw,
    })
}

fn expand_root<P: Position + Clone>(
    root: &Node,
    position: &P,
    predictor: &dyn Predictor,
    config: &Config,
    search_moves: &[Move],
    legal_moves: &[Move],
) {
    if !root.try_begin_expansion() {
        return;
    }

    let filtered: Vec<Move> = if search_moves.is_empty() {
        legal_moves.to_vec()
    } else {
        legal_moves.iter().filter(|m| search_moves.contains(m)).copied().collect()
    };

    if filtered.is_empty() {
        root.abandon_expansion();
        return;
    }

    let input = PredictionInput {
        fingerprint: position.fingerprint(),
        side_to_move: position.side_to_move(),
        legal_moves: filtered.clone(),
        material_balance: 0,
    };

    let output = predictor.predict(std::slice::from_ref(&input)).into_iter().next().expect("predictor returned no output for a single-input batch");
    let mut priors = softmax_priors(&output.logits);

    apply_dirichlet_noise(&mut priors, config);

    let children = allocate_children(filtered.iter().zip(priors.into_iter()).map(|(mv, p)| (mv.encode(), p)).collect());

    match children {
        Ok(children) => {
            populate_tablebase_probes(&children, position, &filtered);
            root.publish_children(children);
        }
        Err(_) => root.abandon_expansion(),
    }
}

/// Mixes Dirichlet(`root_dirichlet_alpha`) exploration noise into the root
/// priors at `root_exploration_fraction`, per spec §4.A's root-specific
/// step. Seeded from system entropy (via `SmallRng::from_entropy`) since
/// root noise exists precisely to decorrelate repeated searches, unlike
/// the fixed-seed Zobrist table used for fingerprinting.
fn apply_dirichlet_noise(priors: &mut [f32], config: &Config) {
    if priors.len() < 2 || config.root_exploration_fraction <= 0.0 {
        return;
    }

    let alpha = vec![config.root_dirichlet_alpha as f64; priors.len()];
    let dirichlet = match Dirichlet::new(&alpha) {
        Ok(d) => d,
        Err(_) => return,
    };

    let mut rng = SmallRng::from_entropy();
    let noise: Vec<f64> = dirichlet.sample(&mut rng);
    let fraction = config.root_exploration_fraction;

    for (prior, n) in priors.iter_mut().zip(noise.into_iter()) {
        *prior = (1.0 - fraction) * *prior + fraction * (n as f32);
    }
}

fn select_move(root: &Node, legal_moves: &[Move]) -> Option<Move> {
    let children = root.children()?;
    if children.is_empty() {
        return None;
    }

    let mut best_index = 0;
    for (i, child) in children.iter().enumerate() {
        if child.terminal_value().map(TerminalValue::is_own_mate).unwrap_or(false) {
            best_index = i;
            break;
        }
        if child.visit_count() > children[best_index].visit_count() {
            best_index = i;
        }
    }

    legal_moves.iter().find(|m| m.encode() == children[best_index].mv()).copied()
}

fn select_move_sampled(root: &Node, legal_moves: &[Move], rng: &mut SmallRng) -> Option<Move> {
    let children = root.children()?;
    if children.is_empty() {
        return None;
    }

    if let Some(mate_index) = children.iter().position(|c| c.terminal_value().map(TerminalValue::is_own_mate).unwrap_or(false)) {
        return legal_moves.iter().find(|m| m.encode() == children[mate_index].mv()).copied();
    }

    let weights: Vec<u32> = children.iter().map(|c| c.visit_count().max(0) as u32).collect();
    let total: u32 = weights.iter().sum();

    let index = if total == 0 {
        0
    } else {
        match WeightedIndex::new(&weights) {
            Ok(dist) => dist.sample(rng),
            Err(_) => 0,
        }
    };

    legal_moves.iter().find(|m| m.encode() == children[index].mv()).copied()
}

fn log_principal_variation(root: &Node, total_nodes: u64) {
    let mut line = Vec::new();
    let mut current = root;

    while let Some(best) = current.best_child() {
        line.push(Move::decode(best.mv()));
        current = best;

        if line.len() >= 32 {
            break;
        }
    }

    log::info!(
        "info nodes {} score cp {} pv {}",
        total_nodes,
        ((root.value_average() - 0.5) * 200.0) as i32,
        line.iter().map(Move::to_string).collect::<Vec<_>>().join(" ")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_position::Board;
    use corvid_predictor::UniformPredictor;

    #[test]
    fn finds_mate_in_one() {
        let config = Config { num_workers: 2, search_parallelism: 4, ..Config::default() };
        let predictor = UniformPredictor::new(8);
        let position = Board::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1").unwrap();
        let time_control = TimeControl { nodes: Some(2000), infinite: false, ..Default::default() };

        let outcome = search(position, &config, &predictor, &time_control, &[]).unwrap();

        let a1a8 = Move::quiet(corvid_position::Square::from_algebraic("a1").unwrap(), corvid_position::Square::from_algebraic("a8").unwrap());
        assert_eq!(outcome.best_move, Some(a1a8));
    }

    #[test]
    fn stalemate_root_returns_immediately_with_no_move() {
        let config = Config::default();
        let predictor = UniformPredictor::new(8);
        let position = Board::from_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        let time_control = TimeControl { nodes: Some(1), infinite: false, ..Default::default() };

        let outcome = search(position, &config, &predictor, &time_control, &[]).unwrap();

        assert!(outcome.best_move.is_none());
        assert_eq!(outcome.terminal, Some(TerminalValue::Draw));
        assert_eq!(outcome.root_value, 0.5);
    }

    #[test]
    fn search_tree_reuses_its_root_across_calls() {
        let config = Config { num_workers: 2, search_parallelism: 4, ..Config::default() };
        let predictor = UniformPredictor::new(8);
        let position = Board::starting_position();
        let time_control = TimeControl { nodes: Some(500), infinite: false, ..Default::default() };

        let tree = SearchTree::new(&config);
        assert_eq!(tree.root_visit_count(), 0);

        let outcome = tree.search(position, &config, &predictor, &time_control, &[]).unwrap();
        assert!(tree.root_visit_count() > 0);
        assert!(outcome.best_move.is_some());
    }
}
