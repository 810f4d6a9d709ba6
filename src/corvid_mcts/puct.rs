//! PUCT child selection (spec §4.C): AZ-PUCT and the SBLE linear-exploration
//! variant, virtual loss, terminal/mate dominance, and tablebase-bounded
//! truncation of the value term.

use crate::node::{Node, TablebaseBound, TablebaseScore};
use crate::options::Config;
use crate::terminal::TerminalValue;

/// The result of `select_child`: which child to descend into. Every
/// selection counts as exactly one visit toward backprop's exact
/// `visitCount` accounting (spec §8, "Visit accounting":
/// `visitCount >= sum(child.visitCount)`); nothing about how convincingly
/// a child won the PUCT comparison changes that.
#[derive(Debug, Clone, Copy)]
pub struct SelectedChild {
    pub index: usize,
}

/// Per-child virtual-loss-adjusted value, tablebase-clamped if the child
/// carries a tablebase probe result.
fn adjusted_value(child: &Node, virtual_loss_coefficient: f32) -> f32 {
    let (mean, weight) = (child.value_average(), child.value_weight());
    let visiting = child.visiting_count() as f32;
    let w = weight as f32;

    let value = if w + visiting > 0.0 {
        (mean * w - virtual_loss_coefficient * visiting) / (w + visiting)
    } else {
        mean
    };

    match child.tablebase() {
        Some((score, bound, _)) => clamp_to_tablebase(value, score, bound),
        None => value,
    }
}

fn clamp_to_tablebase(value: f32, score: TablebaseScore, bound: TablebaseBound) -> f32 {
    let (lo, hi) = match score {
        TablebaseScore::Win => (0.999, 1.0),
        TablebaseScore::CursedWin => (0.5, 1.0),
        TablebaseScore::Draw => (0.5, 0.5),
        TablebaseScore::BlessedLoss => (0.0, 0.5),
        TablebaseScore::Loss => (0.0, 0.001),
    };

    match bound {
        TablebaseBound::Exact => value.clamp(lo, hi),
        TablebaseBound::LowerBound => value.max(lo),
        TablebaseBound::UpperBound => value.min(hi),
    }
}

fn virtual_visits(child: &Node) -> f32 {
    child.visit_count() as f32 + child.visiting_count() as f32
}

fn az_puct_score(child: &Node, parent_virtual_visits: f32, c_puct: f32, virtual_loss_coefficient: f32) -> f32 {
    let v = adjusted_value(child, virtual_loss_coefficient);
    let n_tilde = virtual_visits(child);

    v + c_puct * child.prior() * parent_virtual_visits.sqrt() / (1.0 + n_tilde)
}

fn sble_term(child: &Node, parent_virtual_visits: f32, rate: f32, base: f32) -> f32 {
    if parent_virtual_visits <= 0.0 {
        return 0.0;
    }

    let n_tilde = virtual_visits(child);
    rate * (base - n_tilde / parent_virtual_visits)
}

/// Selects the best child of an expanded `parent` per spec §4.C: terminal
/// children dominate non-terminal ones (own-mate with the smallest
/// distance wins outright; if every child is an opponent-mate the one with
/// the largest distance -- i.e. the most delayed loss -- wins), otherwise
/// the highest PUCT score wins, ties broken by lower index.
pub fn select_child(parent: &Node, config: &Config) -> Option<SelectedChild> {
    let children = parent.children()?;
    if children.is_empty() {
        return None;
    }

    if let Some(selected) = select_by_terminal_dominance(children) {
        return Some(selected);
    }

    let parent_virtual_visits: f32 = children.iter().map(virtual_visits).sum::<f32>().max(0.0);
    let c_puct = ((parent_virtual_visits + config.exploration_rate_base + 1.0) / config.exploration_rate_base).ln()
        + config.exploration_rate_init;

    let mut best_index = 0;
    let mut best_score = f32::NEG_INFINITY;

    for (i, child) in children.iter().enumerate() {
        // A child already proven to be an opponent mate is never selected
        // while any non-terminal or own-mate sibling exists.
        if child.terminal_value().map(|t| t.is_opponent_mate()).unwrap_or(false) {
            continue;
        }

        let mut score = az_puct_score(child, parent_virtual_visits, c_puct, config.virtual_loss_coefficient);

        if config.use_sble_puct {
            score += sble_term(child, parent_virtual_visits, config.linear_exploration_rate, config.linear_exploration_base);
        }

        if score > best_score {
            best_score = score;
            best_index = i;
        }
    }

    Some(SelectedChild { index: best_index })
}

/// Open-question resolution (spec §9, `backpropagationPuctThreshold`): the
/// threshold gates only `bestChild`'s advisory refresh, never backprop
/// weight (visit counting must stay exact). Returns whether `parent`'s top
/// two children by AZ-PUCT score are separated by at least the threshold --
/// a close race means the choice hasn't really converged yet, so the
/// advisory pointer should hold off on moving.
pub fn best_child_margin_clears_threshold(parent: &Node, config: &Config) -> bool {
    let children = match parent.children() {
        Some(c) if c.len() >= 2 => c,
        _ => return true,
    };

    let parent_virtual_visits: f32 = children.iter().map(virtual_visits).sum::<f32>().max(0.0);
    let c_puct = ((parent_virtual_visits + config.exploration_rate_base + 1.0) / config.exploration_rate_base).ln()
        + config.exploration_rate_init;

    let mut best_score = f32::NEG_INFINITY;
    let mut second_best_score = f32::NEG_INFINITY;

    for child in children {
        let score = az_puct_score(child, parent_virtual_visits, c_puct, config.virtual_loss_coefficient);

        if score > best_score {
            second_best_score = best_score;
            best_score = score;
        } else if score > second_best_score {
            second_best_score = score;
        }
    }

    best_score - second_best_score >= config.backpropagation_puct_threshold
}

fn select_by_terminal_dominance(children: &[Node]) -> Option<SelectedChild> {
    let mut best_own_mate: Option<(usize, u16)> = None;

    for (i, child) in children.iter().enumerate() {
        if let Some(n) = child.terminal_value().and_then(TerminalValue::own_mate_distance) {
            if best_own_mate.map(|(_, best_n)| n < best_n).unwrap_or(true) {
                best_own_mate = Some((i, n));
            }
        }
    }

    if let Some((index, _)) = best_own_mate {
        return Some(SelectedChild { index });
    }

    let all_opponent_mate = children.iter().all(|c| c.terminal_value().map(|t| t.is_opponent_mate()).unwrap_or(false));

    if all_opponent_mate && !children.is_empty() {
        let (index, _) = children
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.terminal_value().and_then(TerminalValue::opponent_mate_distance).map(|n| (i, n)))
            .max_by_key(|&(_, n)| n)
            .expect("all_opponent_mate implies at least one opponent mate distance");

        return Some(SelectedChild { index });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::allocate_children;
    use corvid_position::EncodedMove;

    fn expanded_parent(priors: &[f32]) -> Node {
        let parent = Node::root();
        parent.try_begin_expansion();
        let children = allocate_children(priors.iter().enumerate().map(|(i, &p)| (EncodedMove(i as u16), p)).collect()).unwrap();
        parent.publish_children(children);
        parent
    }

    #[test]
    fn prefers_higher_prior_when_unvisited() {
        let parent = expanded_parent(&[0.1, 0.9]);
        let config = Config::default();
        let selected = select_child(&parent, &config).unwrap();
        assert_eq!(selected.index, 1);
    }

    #[test]
    fn own_mate_always_wins() {
        let parent = expanded_parent(&[0.9, 0.1]);
        let config = Config::default();

        parent.children().unwrap()[1].set_terminal(TerminalValue::MateIn(1));
        let selected = select_child(&parent, &config).unwrap();
        assert_eq!(selected.index, 1);
    }

    #[test]
    fn shortest_own_mate_wins_among_several() {
        let parent = expanded_parent(&[0.1, 0.1, 0.1]);
        let config = Config::default();

        parent.children().unwrap()[0].set_terminal(TerminalValue::MateIn(3));
        parent.children().unwrap()[1].set_terminal(TerminalValue::MateIn(1));
        let selected = select_child(&parent, &config).unwrap();
        assert_eq!(selected.index, 1);
    }

    #[test]
    fn virtual_loss_discourages_revisiting_the_same_child() {
        let parent = expanded_parent(&[0.5, 0.5]);
        let config = Config::default();

        let first = select_child(&parent, &config).unwrap();
        parent.children().unwrap()[first.index].apply_virtual_loss();

        let second = select_child(&parent, &config).unwrap();
        assert_ne!(first.index, second.index, "virtual loss should have pushed selection to the sibling");
    }
}
