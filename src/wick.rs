//! Wick engine (C5, spec.md section 4.2): enumerates all ways to fully
//! contract the non-active creation/annihilation operators attached to a
//! diagram's tensors, turning each matching into its own output Diagram
//! carrying the new δ-pairs and the fermion sign of that contraction.
//!
//! Active-active pairs are never matched here — they are left on the
//! tensors' operators for the RDM resolver ([`crate::rdm`]) to absorb into
//! a γ.

use crate::diagram::{DeltaPair, Diagram};
use crate::error::Result;
use crate::index::Index;
use crate::operator::DaggerKind;

#[derive(Debug, Clone, Copy)]
struct SlotInfo {
    tensor: usize,
    slot: usize,
    pos: usize,
    index: Index,
    rho: bool,
}

/// Produces every Diagram obtainable by fully contracting `diagram`'s
/// non-active operator pairs across distinct tensors.
pub fn contract(diagram: &Diagram) -> Result<Vec<Diagram>> {
    let mut creations = Vec::new();
    let mut annihilations = Vec::new();
    let mut pos = 0usize;
    for (t_idx, tensor) in diagram.tensors().iter().enumerate() {
        if let Some(op) = tensor.operator() {
            for (s_idx, slot) in op.slots().iter().enumerate() {
                let info = SlotInfo { tensor: t_idx, slot: s_idx, pos, index: slot.index, rho: slot.rho };
                match slot.kind {
                    DaggerKind::Creation => creations.push(info),
                    DaggerKind::Annihilation => annihilations.push(info),
                    DaggerKind::ContractedLeft | DaggerKind::ContractedRight => {},
                }
                pos += 1;
            }
        }
    }

    let matchings = enumerate_matchings(&creations, &annihilations);
    let mut out = Vec::with_capacity(matchings.len());
    for matching in matchings {
        let mut next = diagram.clone();
        let sign = wick_sign(&matching);
        for (c, a) in &matching {
            mark_contracted(&mut next, c, DaggerKind::ContractedLeft);
            mark_contracted(&mut next, a, DaggerKind::ContractedRight);
            next.add_delta(DeltaPair::new(c.index, a.index))?;
        }
        next.scale(sign as f64);
        out.push(next);
    }
    Ok(out)
}

fn mark_contracted(diagram: &mut Diagram, slot: &SlotInfo, kind: DaggerKind) {
    let tensor = &mut diagram.tensors_mut()[slot.tensor];
    if let Some(op) = tensor.operator_mut() {
        op.slots_mut()[slot.slot].kind = kind;
    }
}

/// Recursively pairs every non-active creation slot with a non-active
/// annihilation slot on a distinct tensor of a compatible space, branching
/// over every valid choice. A branch with leftover unmatched non-active
/// annihilations after all non-active creations are placed is invalid and
/// dropped. Active slots are left untouched (their absence from both
/// remaining lists at the end is the expected terminal case).
fn enumerate_matchings(creations: &[SlotInfo], annihilations: &[SlotInfo]) -> Vec<Vec<(SlotInfo, SlotInfo)>> {
    match creations.iter().position(|c| !c.rho) {
        Some(pos) => {
            let c = creations[pos];
            let mut rest_creations = creations.to_vec();
            rest_creations.remove(pos);

            let mut results = Vec::new();
            for (i, a) in annihilations.iter().enumerate() {
                if a.tensor == c.tensor || a.rho {
                    continue;
                }
                if !c.index.space().matches(&a.index.space()) {
                    continue;
                }
                let mut rest_ann = annihilations.to_vec();
                rest_ann.remove(i);
                for mut sub in enumerate_matchings(&rest_creations, &rest_ann) {
                    sub.push((c, *a));
                    results.push(sub);
                }
            }
            results
        },
        None => {
            if annihilations.iter().any(|a| !a.rho) {
                Vec::new()
            } else {
                vec![Vec::new()]
            }
        },
    }
}

/// Fermion sign of a full contraction: `(-1)^crossings`, where two
/// contraction arcs cross when exactly one endpoint of the second lies
/// strictly between the endpoints of the first in the operators' original
/// linear order. This is the standard diagrammatic rule for the sign of a
/// Wick contraction.
fn wick_sign(matching: &[(SlotInfo, SlotInfo)]) -> i32 {
    let arcs: Vec<(usize, usize)> = matching
        .iter()
        .map(|(c, a)| if c.pos < a.pos { (c.pos, a.pos) } else { (a.pos, c.pos) })
        .collect();

    let mut crossings = 0usize;
    for i in 0..arcs.len() {
        for j in (i + 1)..arcs.len() {
            let (a0, a1) = arcs[i];
            let (b0, b1) = arcs[j];
            let b0_between = a0 < b0 && b0 < a1;
            let b1_between = a0 < b1 && b1 < a1;
            if b0_between != b1_between {
                crossings += 1;
            }
        }
    }
    if crossings % 2 == 0 {
        1
    } else {
        -1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Space;
    use crate::operator::{Operator, OperatorSlot};
    use crate::tensor::Tensor;

    #[test]
    fn contracts_a_pair_across_two_tensors() {
        let p = Index::new(Space::Virtual, true);
        let q = Index::new(Space::Virtual, false);
        let t1 = Tensor::new("f1", vec![p])
            .with_operator(Operator::new(vec![OperatorSlot::new(p, DaggerKind::Creation)]));
        let t2 = Tensor::new("t2", vec![q])
            .with_operator(Operator::new(vec![OperatorSlot::new(q, DaggerKind::Annihilation)]));
        let diagram = Diagram::new("d", vec![t1, t2], 1.0);

        let out = contract(&diagram).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].deltas().len(), 1);
    }

    #[test]
    fn leaves_active_pairs_for_the_rdm_resolver() {
        let x1 = Index::new(Space::Active, true);
        let x2 = Index::new(Space::Active, false);
        let t1 = Tensor::new("v2", vec![x1])
            .with_operator(Operator::new(vec![OperatorSlot::new(x1, DaggerKind::Creation)]));
        let t2 = Tensor::new("t2", vec![x2])
            .with_operator(Operator::new(vec![OperatorSlot::new(x2, DaggerKind::Annihilation)]));
        let diagram = Diagram::new("d", vec![t1, t2], 1.0);

        let out = contract(&diagram).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out[0].deltas().is_empty());
    }

    #[test]
    fn enumerates_multiple_matchings_when_more_than_one_is_valid() {
        let a1 = Index::new(Space::Virtual, true);
        let q1 = Index::new(Space::Virtual, false);
        let q2 = Index::new(Space::Virtual, false);
        let t1 = Tensor::new("f1", vec![a1])
            .with_operator(Operator::new(vec![OperatorSlot::new(a1, DaggerKind::Creation)]));
        let t2 = Tensor::new("t2", vec![q1, q2]).with_operator(Operator::new(vec![
            OperatorSlot::new(q1, DaggerKind::Annihilation),
            OperatorSlot::new(q2, DaggerKind::Annihilation),
        ]));
        let diagram = Diagram::new("d", vec![t1, t2], 1.0);

        let out = contract(&diagram).unwrap();
        assert_eq!(out.len(), 2);
    }
}
