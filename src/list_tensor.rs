//! ListTensor (C8, spec.md section 4.5): the linearized form of a single
//! diagram that factorization (C9) consumes.

use crate::diagram::Diagram;
use crate::tensor::Tensor;

/// A diagram flattened to `(target, factor, ordered tensor product)`. The
/// overall fermion sign from Wick contraction and RDM resolution is folded
/// into `factor` rather than tracked separately, since the emitter needs
/// the full scalar magnitude, not just its sign, to render a rational
/// prefactor (spec.md section 4.7).
#[derive(Debug, Clone, PartialEq)]
pub struct ListTensor {
    target: String,
    factor: f64,
    tensors: Vec<Tensor>,
}

impl ListTensor {
    pub fn from_diagram(diagram: &Diagram, target: impl Into<String>) -> Self {
        ListTensor { target: target.into(), factor: diagram.factor(), tensors: diagram.tensors().to_vec() }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn tensors(&self) -> &[Tensor] {
        &self.tensors
    }

    /// The head tensor used as a BinaryContraction's left-hand side.
    pub fn front(&self) -> Option<&Tensor> {
        self.tensors.first()
    }

    /// Every tensor but the head — the tail subtree's tensor list.
    pub fn rest(&self) -> &[Tensor] {
        if self.tensors.is_empty() {
            &[]
        } else {
            &self.tensors[1..]
        }
    }

    /// Folds every tensor with no remaining indices (a pure scalar, e.g. an
    /// `rdm0` reference or a fully-contracted Hamiltonian piece) into
    /// `factor`, leaving only tensors that still carry at least one index
    /// for the factorizer to choose binary contractions among.
    pub fn absorb_all_internal(&mut self) {
        let mut factor = self.factor;
        self.tensors.retain(|t| {
            if t.indices().is_empty() {
                factor *= t.factor();
                false
            } else {
                true
            }
        });
        self.factor = factor;
    }
}
