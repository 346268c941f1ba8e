//! Diagrams: a product of tensors with a sign, a set of contraction
//! delta-pairs, and an optional bra/ket flag.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::index::Index;
use crate::tensor::Tensor;

/// A single contraction identity between two index ids (an unordered
/// delta-pair).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeltaPair(pub Index, pub Index);

impl DeltaPair {
    pub fn new(a: Index, b: Index) -> Self {
        DeltaPair(a, b)
    }

    /// The index that survives this delta-pair under the fixed space
    /// priority `c < x < a` (general is permissive and always yields to a
    /// concrete space); ties keep the lower id deterministically.
    pub fn surviving(&self) -> Index {
        let (a, b) = (self.0, self.1);
        match a.space().priority().cmp(&b.space().priority()) {
            std::cmp::Ordering::Less => a,
            std::cmp::Ordering::Greater => b,
            std::cmp::Ordering::Equal => {
                if a.id() <= b.id() {
                    a
                } else {
                    b
                }
            },
        }
    }
}

/// A product of tensors with a sign, contraction constraints, and an
/// optional `(bra, ket)` flag marking CI-derivative context.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagram {
    label: String,
    tensors: Vec<Tensor>,
    factor: f64,
    deltas: Vec<DeltaPair>,
    braket: Option<(bool, bool)>,
}

impl Diagram {
    pub fn new(label: impl Into<String>, tensors: Vec<Tensor>, factor: f64) -> Self {
        Diagram { label: label.into(), tensors, factor, deltas: Vec::new(), braket: None }
    }

    pub fn with_braket(mut self, braket: (bool, bool)) -> Self {
        self.braket = Some(braket);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn tensors(&self) -> &[Tensor] {
        &self.tensors
    }

    pub fn tensors_mut(&mut self) -> &mut Vec<Tensor> {
        &mut self.tensors
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn set_factor(&mut self, factor: f64) {
        self.factor = factor;
    }

    pub fn scale(&mut self, by: f64) {
        self.factor *= by;
    }

    pub fn deltas(&self) -> &[DeltaPair] {
        &self.deltas
    }

    pub fn braket(&self) -> Option<(bool, bool)> {
        self.braket
    }

    pub fn add_delta(&mut self, pair: DeltaPair) -> Result<()> {
        if !pair.0.space().matches(&pair.1.space()) {
            return Err(Error::InvalidIndexSpace(pair.0, pair.1));
        }
        self.deltas.push(pair);
        Ok(())
    }

    /// Checks the diagram's contraction-closure invariant: every non-delta
    /// index appears in exactly two tensor slots,
    /// except indices fixed by the external projection tensor (`proj`),
    /// which are allowed to appear once (they are bound externally, not by
    /// an internal contraction).
    pub fn validate(&self) -> Result<()> {
        let mut counts: HashMap<u64, usize> = HashMap::new();
        let mut external: HashMap<u64, bool> = HashMap::new();
        for t in &self.tensors {
            let is_proj = t.is_projection();
            for idx in t.indices() {
                *counts.entry(idx.id()).or_insert(0) += 1;
                external.entry(idx.id()).or_insert(is_proj);
                if is_proj {
                    external.insert(idx.id(), true);
                }
            }
        }
        for d in &self.deltas {
            *counts.entry(d.0.id()).or_insert(0) += 1;
            *counts.entry(d.1.id()).or_insert(0) += 1;
        }
        for (id, count) in counts {
            let is_external = external.get(&id).copied().unwrap_or(false);
            if !is_external && count != 2 {
                return Err(Error::MalformedDiagram(format!(
                    "index {id} appears {count} time(s), expected exactly 2"
                )));
            }
        }
        Ok(())
    }

    /// A canonicalization key independent of dummy-index identity: sorts
    /// tensors by their structural key, then renumbers every index
    /// (tensor indices and delta-pair endpoints) to its minimal canonical
    /// id in order of first appearance. Two diagrams differing only by
    /// dummy relabeling produce the same key.
    pub fn canonical_key(&self) -> String {
        let mut sorted: Vec<&Tensor> = self.tensors.iter().collect();
        sorted.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        let mut remap: HashMap<u64, u64> = HashMap::new();
        let mut next = 0u64;
        let mut canon = |id: u64, remap: &mut HashMap<u64, u64>| -> u64 {
            *remap.entry(id).or_insert_with(|| {
                let v = next;
                next += 1;
                v
            })
        };

        let mut parts = Vec::with_capacity(sorted.len());
        for t in &sorted {
            let idx_repr: Vec<String> = t
                .indices()
                .iter()
                .map(|idx| format!("{}:{}:{}", idx.space().letter(), idx.dagger(), canon(idx.id(), &mut remap)))
                .collect();
            parts.push(format!("{}[{}]{}", t.label(), idx_repr.join(","), t.dagger()));
        }

        let mut delta_repr: Vec<String> = self
            .deltas
            .iter()
            .map(|d| {
                let a = canon(d.0.id(), &mut remap);
                let b = canon(d.1.id(), &mut remap);
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                format!("{lo}-{hi}")
            })
            .collect();
        delta_repr.sort();

        format!("{}|{}|{:?}", parts.join(";"), delta_repr.join(","), self.braket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Space;

    #[test]
    fn validate_rejects_index_seen_once_when_not_external() {
        let i = Index::new(Space::Active, false);
        let diagram = Diagram::new("d", vec![Tensor::new("t2", vec![i])], 1.0);
        assert!(diagram.validate().is_err());
    }

    #[test]
    fn validate_accepts_index_seen_once_via_projection() {
        let i = Index::new(Space::Active, false);
        let diagram = Diagram::new("d", vec![Tensor::new("proj", vec![i])], 1.0);
        assert!(diagram.validate().is_ok());
    }

    #[test]
    fn validate_accepts_index_seen_twice_across_tensors() {
        let i = Index::new(Space::Active, false);
        let diagram = Diagram::new(
            "d",
            vec![Tensor::new("f1", vec![i]), Tensor::new("t2", vec![i])],
            1.0,
        );
        assert!(diagram.validate().is_ok());
    }

    #[test]
    fn canonical_key_ignores_dummy_index_identity() {
        let i = Index::new(Space::Active, false);
        let j = Index::new(Space::Active, false);
        let a = Diagram::new("d0", vec![Tensor::new("f1", vec![i]), Tensor::new("t2", vec![i])], 1.0);
        let b = Diagram::new("d1", vec![Tensor::new("f1", vec![j]), Tensor::new("t2", vec![j])], 1.0);
        assert_eq!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn canonical_key_differs_for_different_tensor_labels() {
        let i = Index::new(Space::Active, false);
        let a = Diagram::new("d0", vec![Tensor::new("f1", vec![i])], 1.0);
        let b = Diagram::new("d1", vec![Tensor::new("h1", vec![i])], 1.0);
        assert_ne!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn delta_pair_surviving_follows_space_priority() {
        let c = Index::new(Space::Closed, false);
        let a = Index::new(Space::Virtual, false);
        assert_eq!(DeltaPair::new(c, a).surviving(), c);
        assert_eq!(DeltaPair::new(a, c).surviving(), c);
    }
}
