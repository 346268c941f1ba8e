//! Active / RDM resolver (C6, spec.md section 4.3): replaces the active
//! operators left over after Wick contraction with a single reduced
//! density matrix tensor `Gamma<n>`.

use std::collections::HashMap;

use crate::diagram::Diagram;
use crate::error::{Error, Result};
use crate::index::Index;
use crate::operator::DaggerKind;
use crate::tensor::Tensor;

struct ActiveSlot {
    tensor: usize,
    slot: usize,
    index: Index,
    kind: DaggerKind,
}

/// Folds every remaining active creation/annihilation operator in
/// `diagram` into one `Gamma<n>` tensor, where `n` is the number of
/// creation/annihilation pairs. Diagrams with no leftover active operators
/// are returned unchanged — this is the `rdm0` case (spec.md section 4.3,
/// 8): no γ tensor is introduced, since there is nothing to resolve.
pub fn resolve(diagram: &Diagram) -> Result<Diagram> {
    let mut next = diagram.clone();

    let mut found = Vec::new();
    for (t_idx, tensor) in next.tensors().iter().enumerate() {
        if let Some(op) = tensor.operator() {
            for (s_idx, slot) in op.slots().iter().enumerate() {
                if slot.rho && matches!(slot.kind, DaggerKind::Creation | DaggerKind::Annihilation) {
                    found.push(ActiveSlot { tensor: t_idx, slot: s_idx, index: slot.index, kind: slot.kind });
                }
            }
        }
    }

    if found.is_empty() {
        return Ok(next);
    }

    let creation_count = found.iter().filter(|s| s.kind == DaggerKind::Creation).count();
    let annihilation_count = found.len() - creation_count;
    if creation_count != annihilation_count {
        return Err(Error::UnresolvedActive(found.len()));
    }
    let rank = creation_count;

    let gamma_indices: Vec<Index> = found.iter().map(|s| s.index).collect();

    let mut by_tensor: HashMap<usize, Vec<usize>> = HashMap::new();
    for slot in &found {
        by_tensor.entry(slot.tensor).or_default().push(slot.slot);
    }
    for (tensor_idx, mut slot_idxs) in by_tensor {
        slot_idxs.sort_unstable_by(|a, b| b.cmp(a));
        let tensor = &mut next.tensors_mut()[tensor_idx];
        for slot_idx in slot_idxs {
            let removed = tensor.operator_mut().expect("active slot implies an operator").remove_slot(slot_idx);
            tensor.remove_index(removed.index.id());
        }
    }

    next.tensors_mut().push(Tensor::new(format!("Gamma{rank}"), gamma_indices));
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Space;
    use crate::operator::{Operator, OperatorSlot};

    #[test]
    fn diagram_with_no_active_operators_is_unchanged() {
        let p = Index::new(Space::Virtual, true);
        let t = Tensor::new("f1", vec![p])
            .with_operator(Operator::new(vec![OperatorSlot::new(p, DaggerKind::ContractedLeft)]));
        let diagram = Diagram::new("d", vec![t], 1.0);
        let resolved = resolve(&diagram).unwrap();
        assert!(!resolved.tensors().iter().any(|t| t.is_rdm()));
    }

    #[test]
    fn two_body_active_run_resolves_to_gamma2() {
        let x1 = Index::new(Space::Active, true);
        let x2 = Index::new(Space::Active, true);
        let x3 = Index::new(Space::Active, false);
        let x4 = Index::new(Space::Active, false);
        let v2 = Tensor::new("v2", vec![x1, x2]).with_operator(Operator::new(vec![
            OperatorSlot::new(x1, DaggerKind::Creation),
            OperatorSlot::new(x2, DaggerKind::Creation),
        ]));
        let t2 = Tensor::new("t2", vec![x3, x4]).with_operator(Operator::new(vec![
            OperatorSlot::new(x3, DaggerKind::Annihilation),
            OperatorSlot::new(x4, DaggerKind::Annihilation),
        ]));
        let diagram = Diagram::new("d", vec![v2, t2], 1.0);

        let resolved = resolve(&diagram).unwrap();
        let gamma = resolved.tensors().iter().find(|t| t.is_rdm()).expect("gamma tensor present");
        assert_eq!(gamma.rdm_rank(), Some(2));
        assert_eq!(gamma.indices().len(), 4);
        for t in resolved.tensors() {
            if !t.is_rdm() {
                assert!(t.indices().is_empty());
            }
        }
    }

    #[test]
    fn mismatched_creation_annihilation_counts_fail() {
        let x1 = Index::new(Space::Active, true);
        let x2 = Index::new(Space::Active, true);
        let v2 = Tensor::new("v2", vec![x1, x2]).with_operator(Operator::new(vec![
            OperatorSlot::new(x1, DaggerKind::Creation),
            OperatorSlot::new(x2, DaggerKind::Creation),
        ]));
        let diagram = Diagram::new("d", vec![v2], 1.0);
        assert_eq!(resolve(&diagram), Err(Error::UnresolvedActive(2)));
    }
}
