//! Terminal value encoding (spec §4.B): a signed distance packed into a
//! 16-bit atomic slot. Absent means non-terminal; zero is a draw; positive
//! is "side to move at this node delivers mate in N"; negative is "the
//! opponent delivers mate in N".

use std::sync::atomic::{AtomicU16, Ordering};

const SENTINEL_ABSENT: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalValue {
    Draw,
    MateIn(u16),
    OpponentMateIn(u16),
}

impl TerminalValue {
    fn encode(self) -> u16 {
        match self {
            TerminalValue::Draw => 0x4000,
            TerminalValue::MateIn(n) => 0x4000 + n,
            TerminalValue::OpponentMateIn(n) => 0x4000 - n,
        }
    }

    fn decode(bits: u16) -> Self {
        if bits == 0x4000 {
            TerminalValue::Draw
        } else if bits > 0x4000 {
            TerminalValue::MateIn(bits - 0x4000)
        } else {
            TerminalValue::OpponentMateIn(0x4000 - bits)
        }
    }

    /// The unconditional scalar value of this terminal outcome, ignoring
    /// mate distance: used when backpropagating before any exploration-rate
    /// scaling is applied.
    pub fn immediate_value(self) -> f32 {
        match self {
            TerminalValue::Draw => 0.5,
            TerminalValue::MateIn(_) => 1.0,
            TerminalValue::OpponentMateIn(_) => 0.0,
        }
    }

    /// If `self` is a terminal mate value, shift its distance by one extra
    /// ply -- used when promoting a mate discovered at a child up to its
    /// parent during backpropagation.
    pub fn one_ply_further(self) -> Option<TerminalValue> {
        match self {
            TerminalValue::MateIn(n) => Some(TerminalValue::OpponentMateIn(n.checked_add(1)?)),
            TerminalValue::OpponentMateIn(n) => Some(TerminalValue::MateIn(n.checked_add(1)?)),
            TerminalValue::Draw => None,
        }
    }

    pub fn is_own_mate(self) -> bool {
        matches!(self, TerminalValue::MateIn(_))
    }

    pub fn is_opponent_mate(self) -> bool {
        matches!(self, TerminalValue::OpponentMateIn(_))
    }

    /// Own-mate distance ordering: a smaller `n` is a stronger claim.
    /// Returns `None` when `self` is not an own mate.
    pub fn own_mate_distance(self) -> Option<u16> {
        match self {
            TerminalValue::MateIn(n) => Some(n),
            _ => None,
        }
    }

    pub fn opponent_mate_distance(self) -> Option<u16> {
        match self {
            TerminalValue::OpponentMateIn(n) => Some(n),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct AtomicTerminalValue(AtomicU16);

impl AtomicTerminalValue {
    pub fn absent() -> Self {
        Self(AtomicU16::new(SENTINEL_ABSENT))
    }

    pub fn load(&self, order: Ordering) -> Option<TerminalValue> {
        let bits = self.0.load(order);

        if bits == SENTINEL_ABSENT {
            None
        } else {
            Some(TerminalValue::decode(bits))
        }
    }

    pub fn store(&self, value: TerminalValue, order: Ordering) {
        self.0.store(value.encode(), order);
    }

    /// Replaces the stored value with `candidate` only if `candidate`
    /// represents a monotonically non-worsening claim: an own-mate-in-k may
    /// only be replaced by an own-mate-in-<=k or left alone, matching the
    /// "monotone mate" property.
    pub fn promote(&self, candidate: TerminalValue) {
        loop {
            let old_bits = self.0.load(Ordering::Acquire);
            let old = if old_bits == SENTINEL_ABSENT { None } else { Some(TerminalValue::decode(old_bits)) };

            let should_replace = match (old, candidate) {
                (None, _) => true,
                (Some(TerminalValue::MateIn(old_n)), TerminalValue::MateIn(new_n)) => new_n < old_n,
                (Some(TerminalValue::MateIn(_)), _) => false,
                (Some(_), TerminalValue::MateIn(_)) => true,
                (Some(TerminalValue::OpponentMateIn(old_n)), TerminalValue::OpponentMateIn(new_n)) => new_n > old_n,
                (Some(_), _) => false,
            };

            if !should_replace {
                return;
            }

            let new_bits = candidate.encode();
            if self.0.compare_exchange_weak(old_bits, new_bits, Ordering::AcqRel, Ordering::Acquire).is_ok() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotone_mate_never_regresses() {
        let slot = AtomicTerminalValue::absent();
        slot.promote(TerminalValue::MateIn(3));
        slot.promote(TerminalValue::MateIn(5));
        assert_eq!(slot.load(Ordering::Acquire), Some(TerminalValue::MateIn(3)));

        slot.promote(TerminalValue::MateIn(1));
        assert_eq!(slot.load(Ordering::Acquire), Some(TerminalValue::MateIn(1)));
    }

    #[test]
    fn one_ply_further_flips_sign_and_increments() {
        assert_eq!(TerminalValue::MateIn(2).one_ply_further(), Some(TerminalValue::OpponentMateIn(3)));
        assert_eq!(TerminalValue::OpponentMateIn(2).one_ply_further(), Some(TerminalValue::MateIn(3)));
        assert_eq!(TerminalValue::Draw.one_ply_further(), None);
    }
}
