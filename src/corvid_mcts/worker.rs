//! `SelfPlayWorker` (spec §4.F): runs `parallelism` games in lock-step, one
//! MCTS step per game per tick, batching leaf evaluations against the
//! external predictor.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use corvid_position::{Move, Position, TerminalClass};
use corvid_predictor::{PredictionInput, Predictor};

use crate::cache::{PredictionCache, ReservationHandle};
use crate::coordinator::WorkCoordinator;
use crate::errors::SearchError;
use crate::game::{softmax_priors, Phase, SelfPlayGame};
use crate::node::{allocate_children, populate_tablebase_probes, Node};
use crate::options::Config;
use crate::puct::select_child;
use crate::terminal::TerminalValue;

fn terminal_value_from_class(class: TerminalClass) -> TerminalValue {
    match class {
        TerminalClass::Checkmate => TerminalValue::OpponentMateIn(0),
        TerminalClass::None => unreachable!("terminal_value_from_class called on a non-terminal class"),
        _ => TerminalValue::Draw,
    }
}

/// A leaf suspended waiting on the batch predictor: which game it belongs
/// to, the cache slot reserved for its result (if the chunk wasn't
/// contended), and the inputs the predictor needs.
struct PendingLeaf {
    game_index: usize,
    node: *const Node,
    reservation: Option<ReservationHandle>,
    input: PredictionInput,
}

pub struct SharedCounters {
    pub total_nodes: AtomicU64,
    pub failed_node_count: AtomicU64,
    pub simulations_completed: AtomicU64,
    pub principal_variation_changed: AtomicBool,
}

impl SharedCounters {
    pub fn new() -> Self {
        Self {
            total_nodes: AtomicU64::new(0),
            failed_node_count: AtomicU64::new(0),
            simulations_completed: AtomicU64::new(0),
            principal_variation_changed: AtomicBool::new(false),
        }
    }
}

impl Default for SharedCounters {
    fn default() -> Self {
        Self::new()
    }
}

pub struct SelfPlayWorker<'a, P: Position + Clone> {
    root: &'a Node,
    config: &'a Config,
    predictor: &'a dyn Predictor,
    cache: &'a PredictionCache,
    coordinator: &'a WorkCoordinator,
    counters: &'a SharedCounters,
    games: Vec<SelfPlayGame<P>>,
    root_template: P,
    search_root_ply: usize,
}

impl<'a, P: Position + Clone> SelfPlayWorker<'a, P> {
    pub fn new(
        root: &'a Node,
        config: &'a Config,
        predictor: &'a dyn Predictor,
        cache: &'a PredictionCache,
        coordinator: &'a WorkCoordinator,
        counters: &'a SharedCounters,
        root_position: P,
        parallelism: usize,
    ) -> Self {
        let search_root_ply = root_position.ply();
        let games = (0..parallelism).map(|_| SelfPlayGame::new(root_position.clone())).collect();

        Self { root, config, predictor, cache, coordinator, counters, games, root_template: root_position, search_root_ply }
    }

    /// Runs one tick: advances every `Working` game by one MCTS step,
    /// services any games that ended up `WaitingForPrediction`, and returns
    /// the number of simulations that completed a full backprop this tick.
    pub fn tick(&mut self) -> u32 {
        let mut pending = Vec::new();
        let mut completed = 0;

        for game_index in 0..self.games.len() {
            if self.coordinator.should_shut_down() {
                break;
            }

            if self.games[game_index].phase != Phase::Working {
                continue;
            }

            match self.step(game_index) {
                StepOutcome::Completed => {
                    completed += 1;
                    self.start_next_simulation(game_index);
                }
                StepOutcome::Suspended(leaf) => pending.push(leaf),
                StepOutcome::Failed => {
                    self.counters.failed_node_count.fetch_add(1, Ordering::Relaxed);
                    self.start_next_simulation(game_index);
                }
            }
        }

        if !pending.is_empty() {
            self.service_batch(pending);
        }

        completed
    }

    fn start_next_simulation(&mut self, game_index: usize) {
        self.games[game_index].reset_for_next_simulation(self.root_template.clone());
    }

    /// Runs the descent + expand-or-suspend portion of one MCTS step for a
    /// single `Working` game.
    fn step(&mut self, game_index: usize) -> StepOutcome {
        let mut current = self.root;

        loop {
            match current.children() {
                Some(children) if !children.is_empty() => {
                    let selected = match select_child(current, self.config) {
                        Some(s) => s,
                        None => return StepOutcome::Failed,
                    };
                    let child = &children[selected.index];

                    child.apply_virtual_loss();

                    let game = &mut self.games[game_index];
                    let mv = Move::decode(child.mv());
                    game.position.apply_move(mv);
                    game.record_step(child as *const Node);

                    let since = self.search_root_ply;
                    if game.position.repetition_count(since) >= 3 {
                        if child.try_begin_expansion() {
                            child.publish_terminal(TerminalValue::Draw);
                        }
                        return self.finish_with_value(game_index, 0.5);
                    }

                    current = child;
                }
                Some(_) => {
                    // Expanded with zero children: a published terminal leaf.
                    return self.finish_from_terminal(game_index, current);
                }
                None => {
                    return self.expand_leaf(game_index, current);
                }
            }
        }
    }

    fn finish_from_terminal(&mut self, game_index: usize, node: &Node) -> StepOutcome {
        let value = node.terminal_value().map(TerminalValue::immediate_value).unwrap_or(0.5);
        self.finish_with_value(game_index, value)
    }

    fn finish_with_value(&mut self, game_index: usize, value: f32) -> StepOutcome {
        self.backpropagate(game_index, value);
        self.counters.simulations_completed.fetch_add(1, Ordering::Relaxed);
        StepOutcome::Completed
    }

    fn expand_leaf(&mut self, game_index: usize, node: &Node) -> StepOutcome {
        let game = &mut self.games[game_index];
        let fingerprint = game.position.fingerprint();

        let terminal_class = game.position.terminal_class();
        if terminal_class.is_terminal() {
            let value = terminal_value_from_class(terminal_class);
            if node.try_begin_expansion() {
                node.publish_terminal(value);
            }
            return self.finish_with_value(game_index, value.immediate_value());
        }

        if let Some((value, priors)) = self.cache.lookup(fingerprint) {
            let legal_moves = game.position.legal_moves();
            let position = game.position.clone();
            self.publish_expansion(node, &position, &legal_moves, &priors);
            return self.finish_with_value(game_index, value);
        }

        let legal_moves = game.position.legal_moves();
        let reservation = self.cache.reserve(fingerprint);
        let input = game.prediction_input(fingerprint, legal_moves.clone(), 0);

        game.suspend(crate::game::PendingExpansion { fingerprint, legal_moves, material_balance: 0 });

        StepOutcome::Suspended(PendingLeaf { game_index, node: node as *const Node, reservation, input })
    }

    fn publish_expansion(&self, node: &Node, position: &P, legal_moves: &[Move], priors: &[f32]) {
        if !node.try_begin_expansion() {
            return;
        }

        let priors = if priors.len() == legal_moves.len() {
            priors.to_vec()
        } else {
            softmax_priors(&vec![0.0; legal_moves.len()])
        };

        let children: Result<_, SearchError> = allocate_children(
            legal_moves.iter().zip(priors.into_iter()).map(|(mv, prior)| (mv.encode(), prior)).collect(),
        );

        match children {
            Ok(children) => {
                populate_tablebase_probes(&children, position, legal_moves);
                node.publish_children(children);
            }
            Err(_) => node.abandon_expansion(),
        }
    }

    fn service_batch(&mut self, pending: Vec<PendingLeaf>) {
        let inputs: Vec<PredictionInput> = pending.iter().map(|leaf| leaf.input.clone()).collect();
        let outputs = self.predictor.predict(&inputs);

        for (leaf, output) in pending.into_iter().zip(outputs.into_iter()) {
            let priors = softmax_priors(&output.logits);
            let node = unsafe { &*leaf.node };

            if let Some(reservation) = leaf.reservation {
                reservation.publish(self.cache, output.value, priors.clone());
            }

            let legal_moves = leaf.input.legal_moves.clone();
            let position = self.games[leaf.game_index].position.clone();
            self.publish_expansion(node, &position, &legal_moves, &priors);

            let pending_state = self.games[leaf.game_index].resume();
            debug_assert_eq!(pending_state.fingerprint, leaf.input.fingerprint);

            self.finish_with_value(leaf.game_index, output.value);
        }
    }

    fn backpropagate(&mut self, game_index: usize, leaf_value: f32) {
        let game = &mut self.games[game_index];
        let mut value_for_side = leaf_value;

        for step in game.path.iter().rev() {
            let node = unsafe { &*step.node };
            node.backpropagate(value_for_side, 1, self.config.moving_average_build, self.config.moving_average_cap);
            node.revert_virtual_loss();
            self.counters.total_nodes.fetch_add(1, Ordering::Relaxed);

            // Values are stored from the mover-at-that-node's perspective;
            // flip for the parent, whose mover is the opponent.
            value_for_side = 1.0 - value_for_side;
        }

        // The root itself is never pushed onto `game.path` (only its
        // children are, since descent starts at `self.root`), so it needs
        // its own backpropagate call here or its `visitCount` would never
        // move -- `SearchClock`'s elimination check and tree-reuse both
        // read it. `value_for_side` is already flipped to root's
        // perspective by the loop above; every simulation passes through
        // the root exactly once, so its credit is a single visit too.
        if !game.path.is_empty() {
            self.root.backpropagate(value_for_side, 1, self.config.moving_average_build, self.config.moving_average_cap);
        }

        // Mate distances flow upward independently of the value average:
        // every ancestor on this path (root included) gets a chance to
        // promote its terminalValue from what its children now show.
        try_promote_mate(self.root);
        for step in &game.path {
            let node = unsafe { &*step.node };
            try_promote_mate(node);
        }

        refresh_best_child(self.root, self.config, self.counters);
        game.finish();
    }
}

/// Derives the mate candidate `node` should promote its `terminalValue` to,
/// from its children's own terminal values (spec §4.B): an own-mate-in-k+1
/// if some child already forces the opponent into mate-in-k, else an
/// opponent-mate-in-k+1 if every child is already a proven own-mate for the
/// opponent (i.e. every reply loses).
fn derive_mate_candidate(node: &Node) -> Option<TerminalValue> {
    let children = node.children()?;
    if children.is_empty() {
        return None;
    }

    let mut best_opponent_mate: Option<u16> = None;
    for child in children {
        if let Some(k) = child.terminal_value().and_then(TerminalValue::opponent_mate_distance) {
            if best_opponent_mate.map(|best| k < best).unwrap_or(true) {
                best_opponent_mate = Some(k);
            }
        }
    }

    if let Some(k) = best_opponent_mate {
        return Some(TerminalValue::MateIn(k + 1));
    }

    let mut max_own_mate: u16 = 0;
    for child in children {
        match child.terminal_value().and_then(TerminalValue::own_mate_distance) {
            Some(k) => max_own_mate = max_own_mate.max(k),
            None => return None,
        }
    }

    Some(TerminalValue::OpponentMateIn(max_own_mate + 1))
}

fn try_promote_mate(node: &Node) {
    if let Some(candidate) = derive_mate_candidate(node) {
        node.promote_terminal(candidate);
    }
}

enum StepOutcome {
    Completed,
    Suspended(PendingLeaf),
    Failed,
}

/// Rescans `node`'s children for the highest visit count and republishes
/// `bestChild`; flips `principal_variation_changed` if the winner moved.
/// `bestChild` is advisory (spec §5) so this never blocks a concurrent
/// reader. Per the `backpropagationPuctThreshold` resolution (spec §9),
/// the refresh itself -- not backprop weight -- is what the threshold
/// gates: a PUCT race too close to call is left showing the previous
/// advisory winner rather than flickering between near-tied children.
fn refresh_best_child(node: &Node, config: &Config, counters: &SharedCounters) {
    let children = match node.children() {
        Some(c) if !c.is_empty() => c,
        _ => return,
    };

    if !crate::puct::best_child_margin_clears_threshold(node, config) {
        return;
    }

    let mut best = &children[0];
    for child in &children[1..] {
        if child.visit_count() > best.visit_count() {
            best = child;
        }
    }

    let previous = node.best_child().map(|c| c as *const Node);
    let candidate = best as *const Node;

    if previous != Some(candidate) {
        node.set_best_child(candidate);
        counters.principal_variation_changed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corvid_position::Board;
    use corvid_predictor::UniformPredictor;

    #[test]
    fn one_tick_completes_a_simulation_against_a_fresh_root() {
        let root = Node::root();
        let config = Config::default();
        let predictor = UniformPredictor::new(4);
        let cache = PredictionCache::new(64);
        let coordinator = WorkCoordinator::new();
        let counters = SharedCounters::new();

        let mut worker = SelfPlayWorker::new(&root, &config, &predictor, &cache, &coordinator, &counters, Board::starting_position(), 2);

        // First tick expands the root leaf and suspends on the cache miss.
        let completed_first = worker.tick();
        assert_eq!(completed_first, 2, "uniform predictor answers synchronously within the same tick");
        assert!(root.children().is_some());
    }

    #[test]
    fn mate_in_one_root_is_recognized_as_terminal_after_expansion() {
        let root = Node::root();
        let config = Config::default();
        let predictor = UniformPredictor::new(1);
        let cache = PredictionCache::new(64);
        let coordinator = WorkCoordinator::new();
        let counters = SharedCounters::new();

        let position = Board::from_fen("6k1/5ppp/8/8/8/8/5PPP/R5K1 w - - 0 1").unwrap();
        let mut worker = SelfPlayWorker::new(&root, &config, &predictor, &cache, &coordinator, &counters, position, 1);

        for _ in 0..200 {
            worker.tick();
        }

        assert!(root.children().is_some());
        assert_eq!(root.terminal_value(), Some(TerminalValue::MateIn(1)));
    }
}
