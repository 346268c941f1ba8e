//! Equation (C7, spec.md section 4.4): the design-time entry point. Builds
//! the Cartesian product of input tensor-vectors into Diagrams, then walks
//! the rest of the pipeline (Wick contraction, RDM resolution,
//! deduplication, factorization, emission) via [`Equation::generate`].

use itertools::Itertools;

use crate::config::MethodConfig;
use crate::diagram::{DeltaPair, Diagram};
use crate::emit;
use crate::error::{Error, Result};
use crate::list_tensor::ListTensor;
use crate::rdm;
use crate::tensor::Tensor;
use crate::tree::Tree;
use crate::wick;

const DEDUP_EPSILON: f64 = 1e-10;

/// Which residual/property this equation computes. Each variant only
/// changes the wrapper class name the emitter writes and whether the
/// `IndexRange` tuple gains a `ci` slot (spec.md section 4.7, 8; section 9
/// "Polymorphic tree types" — a tagged sum, not a class hierarchy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeType {
    Residual,
    Energy,
    Dedci,
    Correction,
    Density,
    Density1,
    Density2,
}

impl TreeType {
    pub fn wrapper_class(&self) -> &'static str {
        match self {
            TreeType::Residual => "Residual",
            TreeType::Energy => "Energy",
            TreeType::Dedci => "Dedci",
            TreeType::Correction => "Correction",
            TreeType::Density => "Density",
            TreeType::Density1 => "Density1",
            TreeType::Density2 => "Density2",
        }
    }

    /// `dedci` trees carry a fourth `IndexRange` entry (`ci_`) alongside
    /// closed/active/virtual (spec.md section 4.7, scenario 6).
    pub fn includes_ci_range(&self) -> bool {
        matches!(self, TreeType::Dedci)
    }

    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "residual" => Ok(TreeType::Residual),
            "energy" => Ok(TreeType::Energy),
            "dedci" => Ok(TreeType::Dedci),
            "correction" => Ok(TreeType::Correction),
            "density" => Ok(TreeType::Density),
            "density1" => Ok(TreeType::Density1),
            "density2" => Ok(TreeType::Density2),
            other => Err(Error::UnknownTreeType(other.to_string())),
        }
    }
}

/// An Equation owns its Diagrams: a label, an overall factor, a tree-type
/// tag, an optional `(bra, ket)` flag, and the Diagram list built from the
/// Cartesian product of the input tensor-vectors.
#[derive(Debug, Clone)]
pub struct Equation {
    name: String,
    factor: f64,
    tree_type: TreeType,
    braket: Option<(bool, bool)>,
    diagrams: Vec<Diagram>,
    config: MethodConfig,
}

impl Equation {
    /// Builds one Diagram per combination in the Cartesian product of
    /// `vectors`, each named `<name>_<i>` by its position in the product.
    pub fn new(
        name: impl Into<String>,
        vectors: Vec<Vec<Tensor>>,
        factor: f64,
        tree_type: TreeType,
        braket: Option<(bool, bool)>,
    ) -> Self {
        let name = name.into();
        let diagrams = if vectors.is_empty() {
            Vec::new()
        } else {
            vectors
                .into_iter()
                .multi_cartesian_product()
                .enumerate()
                .map(|(i, combo)| {
                    let mut d = Diagram::new(format!("{name}_{i}"), combo, factor);
                    if let Some(bk) = braket {
                        d = d.with_braket(bk);
                    }
                    d
                })
                .collect()
        };
        Equation { name, factor, tree_type, braket, diagrams, config: MethodConfig::Caspt2 }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Selects the target quantum-chemistry method (spec.md section 6);
    /// defaults to `Caspt2`.
    pub fn set_config(&mut self, config: MethodConfig) {
        self.config = config;
    }

    pub fn diagrams(&self) -> &[Diagram] {
        &self.diagrams
    }

    pub fn tree_type(&self) -> TreeType {
        self.tree_type
    }

    /// Concatenates `other`'s diagrams onto this equation's, preserving
    /// order, so the two equations factorize into a shared tree.
    pub fn merge(&mut self, other: Equation) {
        self.diagrams.extend(other.diagrams);
    }

    /// Rewrites ket-side projections into δ constraints on the CI index,
    /// for diagrams marked `(bra, ket=true)`: the bra and ket projection
    /// tensors' CI indices are identified rather than left as two distinct
    /// free indices (spec.md section 4.4).
    pub fn absorb_ket(&mut self) -> Result<()> {
        for diagram in &mut self.diagrams {
            if diagram.braket().map(|(_, ket)| ket) != Some(true) {
                continue;
            }
            let proj_ci: Vec<crate::index::Index> = diagram
                .tensors()
                .iter()
                .filter(|t| t.is_projection())
                .flat_map(|t| t.indices().iter().copied())
                .filter(|i| matches!(i.space(), crate::index::Space::Ci))
                .collect();
            if let [bra, ket] = proj_ci[..] {
                diagram.add_delta(DeltaPair::new(bra, ket))?;
            }
        }
        Ok(())
    }

    /// Canonicalizes every diagram and coalesces diagrams with identical
    /// canonical form by summing their factors; drops any whose summed
    /// factor lands within [`DEDUP_EPSILON`] of zero. Idempotent: running
    /// twice on an already-deduplicated list is a no-op (spec.md section
    /// 8).
    pub fn duplicates(&mut self) {
        let mut order: Vec<String> = Vec::new();
        let mut groups: std::collections::HashMap<String, Diagram> = std::collections::HashMap::new();
        for diagram in self.diagrams.drain(..) {
            let key = diagram.canonical_key();
            match groups.get_mut(&key) {
                Some(existing) => {
                    let summed = existing.factor() + diagram.factor();
                    existing.set_factor(summed);
                },
                None => {
                    order.push(key.clone());
                    groups.insert(key, diagram);
                },
            }
        }
        self.diagrams = order
            .into_iter()
            .filter_map(|key| groups.remove(&key))
            .filter(|d| d.factor().abs() > DEDUP_EPSILON)
            .collect();
    }

    /// Runs RDM resolution on every diagram.
    pub fn active(&mut self) -> Result<()> {
        let mut resolved = Vec::with_capacity(self.diagrams.len());
        for diagram in &self.diagrams {
            resolved.push(rdm::resolve(diagram)?);
        }
        self.diagrams = resolved;
        Ok(())
    }

    /// Top-level entry point (spec.md section 6): runs Wick contraction,
    /// RDM resolution, deduplication, factorization and emission, and
    /// returns the generated source text. Every error in the pipeline
    /// surfaces here; no partial output is returned after a failure.
    pub fn generate(&self) -> Result<String> {
        let mut contracted = Vec::new();
        for diagram in &self.diagrams {
            contracted.extend(wick::contract(diagram)?);
        }

        let mut resolved = Vec::with_capacity(contracted.len());
        for diagram in &contracted {
            resolved.push(rdm::resolve(diagram)?);
        }

        let mut staging = Equation {
            name: self.name.clone(),
            factor: self.factor,
            tree_type: self.tree_type,
            braket: self.braket,
            diagrams: resolved,
            config: self.config,
        };
        staging.duplicates();

        let target = match self.tree_type {
            TreeType::Residual | TreeType::Correction => "r",
            TreeType::Energy => "e0",
            TreeType::Dedci => "dedci",
            TreeType::Density | TreeType::Density1 | TreeType::Density2 => "den",
        };

        let mut list_tensors: Vec<ListTensor> = staging
            .diagrams
            .iter()
            .map(|d| {
                let mut lt = ListTensor::from_diagram(d, target);
                lt.absorb_all_internal();
                lt
            })
            .collect();
        list_tensors.retain(|lt| lt.front().is_some());

        let tree = Tree::build(&self.name, self.tree_type, list_tensors);
        emit::emit_tree(&tree, self.config)
    }
}
