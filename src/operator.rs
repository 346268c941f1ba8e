//! Second-quantized operator strings (spec.md section 3 "Operator", section
//! 4.1 "Operator algebra and diagram construction").

use crate::index::Index;

/// The role a slot plays in a second-quantized operator string. An
/// operator starts out with only `Creation`/`Annihilation` slots; the Wick
/// engine (C5) rewrites contracted pairs to `ContractedLeft`/
/// `ContractedRight` in place so later passes can tell which slots are
/// still free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DaggerKind {
    Creation,
    Annihilation,
    ContractedLeft,
    ContractedRight,
}

impl DaggerKind {
    pub fn is_creation_like(&self) -> bool {
        matches!(self, DaggerKind::Creation | DaggerKind::ContractedLeft)
    }
}

/// One (index-slot, dagger-kind, rho) triple, per spec.md section 4.1.
/// `rho` flags whether this slot's index lives in the active subspace —
/// it is cached alongside the index because the permutation sign rule
/// only cares about this one bit, not the full `Space`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperatorSlot {
    pub index: Index,
    pub kind: DaggerKind,
    pub rho: bool,
}

impl OperatorSlot {
    pub fn new(index: Index, kind: DaggerKind) -> Self {
        let rho = index.is_active();
        OperatorSlot { index, kind, rho }
    }
}

/// An ordered sequence of operator slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Operator {
    slots: Vec<OperatorSlot>,
}

impl Operator {
    pub fn new(slots: Vec<OperatorSlot>) -> Self {
        Operator { slots }
    }

    pub fn slots(&self) -> &[OperatorSlot] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [OperatorSlot] {
        &mut self.slots
    }

    /// Removes and returns the slot at `idx`. Used by the RDM resolver once
    /// an active slot has been folded into a γ tensor.
    pub fn remove_slot(&mut self, idx: usize) -> OperatorSlot {
        self.slots.remove(idx)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn has_active_creation(&self) -> bool {
        self.slots.iter().any(|s| s.rho && s.kind.is_creation_like())
    }

    pub fn has_active_annihilation(&self) -> bool {
        self.slots.iter().any(|s| s.rho && !s.kind.is_creation_like())
    }

    /// Produces the lexicographically next permutation of this operator's
    /// slots (ordered by index id), returning `(has_next, sign)`.
    ///
    /// Per spec.md section 4.1: when `project` is true and the operator
    /// contains both active creation and active annihilation slots, a
    /// further permutation would change the expression's value (the
    /// projection manifold fixes their relative order), so this returns
    /// `(false, 1)` without mutating `self`.
    ///
    /// Sign rule (spec.md section 4.1, authoritative over the literal
    /// source per the open question in section 9): for each position
    /// whose slot is active (`rho == true`), count the active positions to
    /// its left whose slot-id is greater than its own; the parity of the
    /// total determines the sign.
    pub fn permute(&mut self, project: bool) -> (bool, i32) {
        if project && self.has_active_creation() && self.has_active_annihilation() {
            return (false, 1);
        }

        let old = self.slots.clone();
        let has_next = next_permutation_by_key(&mut self.slots, |s| s.index.id());
        let sign = permutation_sign(&old, &self.slots);
        (has_next, sign)
    }
}

/// Computes the sign contributed by going from `old` to `new`, per the
/// invariant of spec.md sections 3/4.1: a crossing only flips the sign
/// when exactly one of the two crossing slots is active. Concretely: for
/// every unordered pair of slots where exactly one is active, the pair
/// contributes a flip iff their relative left-right order differs between
/// `old` and `new`. This is well-defined independent of which sequence of
/// adjacent transpositions realizes the permutation, and reduces to the
/// stated invariant for a single adjacent swap.
fn permutation_sign(old: &[OperatorSlot], new: &[OperatorSlot]) -> i32 {
    let mut flips = 0usize;
    for i in 0..old.len() {
        for j in (i + 1)..old.len() {
            if old[i].rho == old[j].rho {
                continue;
            }
            let pos_i = new.iter().position(|s| s.index.id() == old[i].index.id()).unwrap();
            let pos_j = new.iter().position(|s| s.index.id() == old[j].index.id()).unwrap();
            // old[i] precedes old[j] in `old` (i < j); a flip means that
            // order is reversed in `new`.
            if pos_i > pos_j {
                flips += 1;
            }
        }
    }
    if flips % 2 == 0 {
        1
    } else {
        -1
    }
}

/// Standard `std::next_permutation`-style successor, ordered by `key`.
/// Returns `true` if a next permutation existed (and was applied); if the
/// sequence was already the last permutation, it is reset to the first
/// (sorted ascending) and `false` is returned, mirroring the C++ idiom
/// this is ported from.
fn next_permutation_by_key<T: Clone, K: Ord>(slots: &mut [T], key: impl Fn(&T) -> K) -> bool {
    if slots.len() < 2 {
        return false;
    }
    let mut i = slots.len() - 1;
    while i > 0 && key(&slots[i - 1]) >= key(&slots[i]) {
        i -= 1;
    }
    if i == 0 {
        slots.reverse();
        return false;
    }
    let pivot = i - 1;
    let mut j = slots.len() - 1;
    while key(&slots[j]) <= key(&slots[pivot]) {
        j -= 1;
    }
    slots.swap(pivot, j);
    slots[pivot + 1..].reverse();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Space;

    #[test]
    fn refuses_to_permute_active_creation_and_annihilation_under_projection() {
        let c1 = Index::new(Space::Active, true);
        let a1 = Index::new(Space::Active, false);
        let mut op = Operator::new(vec![
            OperatorSlot::new(c1, DaggerKind::Creation),
            OperatorSlot::new(a1, DaggerKind::Annihilation),
        ]);
        let (more, sign) = op.permute(true);
        assert!(!more);
        assert_eq!(sign, 1);
    }

    #[test]
    fn permits_permutation_without_projection() {
        let c1 = Index::new(Space::Active, true);
        let a1 = Index::new(Space::Active, false);
        let mut op = Operator::new(vec![
            OperatorSlot::new(c1, DaggerKind::Creation),
            OperatorSlot::new(a1, DaggerKind::Annihilation),
        ]);
        let original = op.clone();
        let (more, _sign) = op.permute(false);
        assert!(more || op.slots() != original.slots());
    }

    #[test]
    fn swapping_one_active_and_one_non_active_slot_flips_sign() {
        let active = Index::new(Space::Active, false);
        let non_active = Index::new(Space::Virtual, false);
        // Build two slots so the "next" lexicographic arrangement swaps
        // them: put the larger id first so next_permutation must descend
        // to the reversed (sorted-ascending) order, then re-ascend.
        let (lo, hi) = if active.id() < non_active.id() {
            (active, non_active)
        } else {
            (non_active, active)
        };
        let mut op = Operator::new(vec![
            OperatorSlot::new(hi, DaggerKind::Creation),
            OperatorSlot::new(lo, DaggerKind::Annihilation),
        ]);
        let (_more, sign) = op.permute(false);
        // Exactly one of the two positions is active, so the crossing
        // must flip the sign.
        assert_eq!(sign, -1);
    }

    #[test]
    fn swapping_two_active_slots_does_not_flip_sign() {
        let a = Index::new(Space::Active, false);
        let b = Index::new(Space::Active, false);
        let (lo, hi) = if a.id() < b.id() { (a, b) } else { (b, a) };
        let mut op = Operator::new(vec![
            OperatorSlot::new(hi, DaggerKind::Creation),
            OperatorSlot::new(lo, DaggerKind::Annihilation),
        ]);
        let (_more, sign) = op.permute(false);
        assert_eq!(sign, 1);
    }
}
