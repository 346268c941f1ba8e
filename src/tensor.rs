//! Symbolic tensors (spec.md section 3, "Tensor").

use crate::index::Index;
use crate::operator::Operator;

/// A symbolic tensor: a label, an ordered list of indices, a scalar
/// prefactor, and an optional scalar-symbol name (e.g. an energy
/// denominator `e0`).
///
/// Equality is structural: identical label, indices (same ids in the same
/// positions), and daggerness — never by any incidental identity.
///
/// Every physical tensor (as opposed to a bookkeeping one like a γ that has
/// already been resolved) carries the second-quantized operator string it
/// stands for, over the same indices. The Wick engine (C5) matches slots
/// between the `operator`s of distinct tensors in a diagram; tensors with
/// no `operator` (already-resolved γ's, scalars) are inert to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    label: String,
    indices: Vec<Index>,
    factor: f64,
    scalar: Option<String>,
    dagger: bool,
    operator: Option<Operator>,
}

impl Tensor {
    pub fn new(label: impl Into<String>, indices: Vec<Index>) -> Self {
        Tensor { label: label.into(), indices, factor: 1.0, scalar: None, dagger: false, operator: None }
    }

    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    pub fn with_scalar(mut self, scalar: impl Into<String>) -> Self {
        self.scalar = Some(scalar.into());
        self
    }

    pub fn with_dagger(mut self, dagger: bool) -> Self {
        self.dagger = dagger;
        self
    }

    pub fn with_operator(mut self, operator: Operator) -> Self {
        self.operator = Some(operator);
        self
    }

    pub fn operator(&self) -> Option<&Operator> {
        self.operator.as_ref()
    }

    pub fn operator_mut(&mut self) -> Option<&mut Operator> {
        self.operator.as_mut()
    }

    pub fn take_operator(&mut self) -> Option<Operator> {
        self.operator.take()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn indices(&self) -> &[Index] {
        &self.indices
    }

    /// Removes the first index with the given id, if present. Used by the
    /// RDM resolver when an active index moves from its original tensor
    /// onto a new γ tensor.
    pub fn remove_index(&mut self, id: u64) {
        if let Some(pos) = self.indices.iter().position(|i| i.id() == id) {
            self.indices.remove(pos);
        }
    }

    pub fn indices_mut(&mut self) -> &mut Vec<Index> {
        &mut self.indices
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn set_factor(&mut self, factor: f64) {
        self.factor = factor;
    }

    pub fn scalar(&self) -> Option<&str> {
        self.scalar.as_deref()
    }

    pub fn dagger(&self) -> bool {
        self.dagger
    }

    pub fn is_projection(&self) -> bool {
        self.label == "proj"
    }

    pub fn is_rdm(&self) -> bool {
        self.label.starts_with("Gamma") || self.label == "rdm0"
    }

    /// The RDM rank implied by a `Gamma<n>`-labelled tensor, or `None` for
    /// anything else. `rdm0` is special-cased by the caller as a pure
    /// scalar factor with no indices (spec.md section 4.3).
    pub fn rdm_rank(&self) -> Option<usize> {
        self.label.strip_prefix("Gamma").and_then(|s| s.parse::<usize>().ok())
    }

    /// Structural key used to sort tensors within a canonicalized diagram:
    /// label, then each index's (space priority, dagger) in order. Actual
    /// index ids are not part of the key since canonicalization first
    /// renames dummies to a minimal form before comparing.
    pub fn sort_key(&self) -> (String, Vec<(u8, bool)>, bool) {
        let idx_key = self.indices.iter().map(|i| (i.space().priority(), i.dagger())).collect();
        (self.label.clone(), idx_key, self.dagger)
    }

    /// Structural equality ignoring factor: same label, same indices (by
    /// id, in order), same daggerness.
    pub fn structurally_eq(&self, other: &Tensor) -> bool {
        self.label == other.label && self.dagger == other.dagger && self.indices == other.indices
    }

    pub fn str_gen(&self) -> String {
        let idx = self.indices.iter().map(|i| i.str_gen()).collect::<Vec<_>>().join(", ");
        format!("{}({}){}", self.label, idx, if self.dagger { "+" } else { "" })
    }
}
