//! Tree / BinaryContraction (C9, spec.md section 4.6): the factorized
//! binary-contraction DAG built from a single Equation's ListTensors.
//!
//! Parent back-references are non-owning arena indices (spec.md section 9,
//! "Cyclic parent links") rather than `Rc`/raw pointers, so the graph can
//! never form an ownership cycle: every `BinaryContraction` is owned once,
//! by `Tree::arena`.

use std::collections::HashMap;

use super::fmt::PrintTree;
use crate::equation::TreeType;
use crate::index::Index;
use crate::list_tensor::ListTensor;
use crate::tensor::Tensor;

/// One node of the factorized DAG: a left tensor applied to the product of
/// its child subtrees.
#[derive(Debug, Clone)]
pub struct BinaryContraction {
    pub target: String,
    pub left: Tensor,
    pub children: Vec<usize>,
    pub parent: Option<usize>,
    pub factor: f64,
    pub dagger: bool,
}

/// A Tree owns every `BinaryContraction` built for one Equation, in a flat
/// arena indexed by `usize`. `roots` lists the top-level node for each
/// ListTensor that went into the equation.
#[derive(Debug, Clone)]
pub struct Tree {
    name: String,
    tree_type: TreeType,
    arena: Vec<BinaryContraction>,
    roots: Vec<usize>,
}

impl Tree {
    /// Builds one root chain per ListTensor, then factorizes and
    /// re-establishes parent back-references (spec.md section 4.6, steps
    /// 1-3).
    pub fn build(name: impl Into<String>, tree_type: TreeType, list_tensors: Vec<ListTensor>) -> Self {
        let mut arena = Vec::new();
        let roots = list_tensors
            .iter()
            .filter_map(|lt| {
                if lt.front().is_none() {
                    None
                } else {
                    Some(build_chain(&mut arena, lt.target(), lt.tensors(), lt.factor()))
                }
            })
            .collect();

        let mut tree = Tree { name: name.into(), tree_type, arena, roots };
        tree.factorize();
        tree.set_parent_sub();
        tree
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tree_type(&self) -> TreeType {
        self.tree_type
    }

    pub fn roots(&self) -> &[usize] {
        &self.roots
    }

    pub fn node(&self, idx: usize) -> &BinaryContraction {
        &self.arena[idx]
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    /// A post-order walk over every *reachable* node (nodes dropped by a
    /// sibling merge are left in the arena but are unreachable from
    /// `roots`, and so never visited). This is the order the code emitter
    /// (C10) assigns `Task<i>` ids in.
    pub fn post_order(&self) -> Vec<usize> {
        let mut order = Vec::new();
        for &root in &self.roots {
            self.post_order_from(root, &mut order);
        }
        order
    }

    fn post_order_from(&self, idx: usize, order: &mut Vec<usize>) {
        for &child in &self.arena[idx].children {
            self.post_order_from(child, order);
        }
        order.push(idx);
    }

    /// Merges sibling BinaryContractions sharing the same head tensor
    /// (structural equality, including dagger) at every level of the tree.
    /// Siblings are scanned in order; the first occurrence wins and
    /// absorbs the later one's children (spec.md section 4.6).
    pub fn factorize(&mut self) {
        let merged_roots = self.merge_siblings(self.roots.clone());
        self.roots = merged_roots;
        for idx in self.roots.clone() {
            self.factorize_node(idx);
        }
    }

    fn factorize_node(&mut self, idx: usize) {
        let children = self.arena[idx].children.clone();
        let merged = self.merge_siblings(children);
        self.arena[idx].children = merged.clone();
        for child in merged {
            self.factorize_node(child);
        }
    }

    fn merge_siblings(&mut self, siblings: Vec<usize>) -> Vec<usize> {
        let mut kept: Vec<usize> = Vec::new();
        for idx in siblings {
            let mut absorbed = false;
            for &k in &kept {
                if self.arena[k].left.structurally_eq(&self.arena[idx].left) && self.arena[k].dagger == self.arena[idx].dagger {
                    let idx_factor = self.arena[idx].factor;
                    let extra = self.arena[idx].children.clone();
                    if extra.is_empty() {
                        // idx has no subtree of its own to carry the factor
                        // forward on; it's just the same head tensor scaled
                        // again, so fold its factor additively into k's.
                        self.arena[k].factor += idx_factor;
                    } else {
                        // idx's own factor scaled its whole chain; once idx
                        // is dropped in favor of k, push that scaling onto
                        // each of idx's children so it isn't lost.
                        for &child in &extra {
                            self.arena[child].factor *= idx_factor;
                        }
                        self.arena[k].children.extend(extra);
                    }
                    absorbed = true;
                    break;
                }
            }
            if !absorbed {
                kept.push(idx);
            }
        }
        kept
    }

    /// Re-establishes every node's `parent` back-reference from the
    /// current `children` lists (spec.md section 4.6, step 3).
    pub fn set_parent_sub(&mut self) {
        for idx in 0..self.arena.len() {
            self.arena[idx].parent = None;
        }
        let roots = self.roots.clone();
        for root in roots {
            self.set_parent_from(root, None);
        }
    }

    fn set_parent_from(&mut self, idx: usize, parent: Option<usize>) {
        self.arena[idx].parent = parent;
        let children = self.arena[idx].children.clone();
        for child in children {
            self.set_parent_from(child, Some(idx));
        }
    }

    /// The free (externally visible) indices of the subtree rooted at
    /// `idx`: every index id appearing an odd number of times across
    /// `idx`'s own tensor and all of its descendants' tensors. This is the
    /// same contraction-closure rule a Diagram's `validate()` checks
    /// (spec.md section 3): an index appearing twice inside the subtree is
    /// contracted away internally, so what is left over (odd count — in
    /// practice exactly once) is what the subtree still has to offer its
    /// parent to contract against (spec.md section 4.7's "get blocks for
    /// output and both inputs" needs each child's contribution described
    /// this way).
    pub fn subtree_free_indices(&self, idx: usize) -> Vec<Index> {
        let mut counts: HashMap<u64, (Index, usize)> = HashMap::new();
        self.collect_subtree_indices(idx, &mut counts);
        let mut free: Vec<Index> = counts.into_values().filter(|(_, c)| c % 2 == 1).map(|(i, _)| i).collect();
        free.sort_by_key(|i| i.id());
        free
    }

    fn collect_subtree_indices(&self, idx: usize, counts: &mut HashMap<u64, (Index, usize)>) {
        for index in self.arena[idx].left.indices() {
            let entry = counts.entry(index.id()).or_insert((*index, 0));
            entry.1 += 1;
        }
        for &child in &self.arena[idx].children {
            self.collect_subtree_indices(child, counts);
        }
    }
}

fn build_chain(arena: &mut Vec<BinaryContraction>, target: &str, tensors: &[Tensor], factor: f64) -> usize {
    if tensors.len() == 1 {
        arena.push(BinaryContraction {
            target: target.to_string(),
            left: tensors[0].clone(),
            children: Vec::new(),
            parent: None,
            factor,
            dagger: tensors[0].dagger(),
        });
        arena.len() - 1
    } else {
        let child = build_chain(arena, target, &tensors[1..], 1.0);
        arena.push(BinaryContraction {
            target: target.to_string(),
            left: tensors[0].clone(),
            children: vec![child],
            parent: None,
            factor,
            dagger: tensors[0].dagger(),
        });
        let idx = arena.len() - 1;
        arena[child].parent = Some(idx);
        idx
    }
}

impl PrintTree for Tree {
    fn write_tree(&self, prefix: &str, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(fmt, "{}Tree({})", prefix, self.name)?;
        let n = self.roots.len();
        for (i, &root) in self.roots.iter().enumerate() {
            self.write_node(root, &self.modify_prefix_for_child(prefix, i + 1 == n), fmt)?;
        }
        Ok(())
    }
}

impl Tree {
    fn write_node(&self, idx: usize, prefix: &str, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let node = &self.arena[idx];
        writeln!(fmt, "{}{}", prefix, node.left.str_gen())?;
        let n = node.children.len();
        for (i, &child) in node.children.iter().enumerate() {
            self.write_node(child, &self.modify_prefix_for_child(prefix, i + 1 == n), fmt)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Index, Space};

    fn lt(target: &str, labels: &[&str], factor: f64) -> ListTensor {
        let tensors: Vec<Tensor> = labels.iter().map(|l| Tensor::new(*l, vec![Index::new(Space::Virtual, false)])).collect();
        let diagram = crate::diagram::Diagram::new("d", tensors, factor);
        ListTensor::from_diagram(&diagram, target)
    }

    #[test]
    fn build_chains_tensors_front_to_back() {
        let tree = Tree::build("eq0", TreeType::Residual, vec![lt("r", &["f1", "t2"], 1.0)]);
        assert_eq!(tree.roots().len(), 1);
        let root = tree.node(tree.roots()[0]);
        assert_eq!(root.left.label(), "f1");
        assert_eq!(root.children.len(), 1);
        assert_eq!(tree.node(root.children[0]).left.label(), "t2");
    }

    #[test]
    fn factorize_merges_sibling_roots_sharing_a_head_tensor() {
        let shared = Index::new(Space::Virtual, false);
        let mk = |label: &str| Tensor::new(label, vec![shared]);
        let v2a = crate::diagram::Diagram::new("a", vec![mk("v2"), mk("t2")], 1.0);
        let v2b = crate::diagram::Diagram::new("b", vec![mk("v2"), mk("r")], 1.0);
        let list_tensors = vec![ListTensor::from_diagram(&v2a, "r"), ListTensor::from_diagram(&v2b, "r")];
        let tree = Tree::build("eq0", TreeType::Residual, list_tensors);
        assert_eq!(tree.roots().len(), 1);
        let root = tree.node(tree.roots()[0]);
        assert_eq!(root.left.label(), "v2");
        assert_eq!(root.children.len(), 2);
    }

    #[test]
    fn merge_siblings_carries_an_absorbed_roots_factor_onto_its_children() {
        let shared = Index::new(Space::Virtual, false);
        let mk = |label: &str| Tensor::new(label, vec![shared]);
        let v2a = crate::diagram::Diagram::new("a", vec![mk("v2"), mk("t2")], 2.0);
        let v2b = crate::diagram::Diagram::new("b", vec![mk("v2"), mk("r")], 3.0);
        let list_tensors = vec![ListTensor::from_diagram(&v2a, "r"), ListTensor::from_diagram(&v2b, "r")];
        let tree = Tree::build("eq0", TreeType::Residual, list_tensors);
        let root = tree.node(tree.roots()[0]);
        // the kept root (v2a's) is untouched, at 2.0; the absorbed root's
        // (v2b's, 3.0) factor must survive on its own child (`r`) rather
        // than vanishing when v2b itself is dropped.
        assert_eq!(root.factor, 2.0);
        assert_eq!(root.children.len(), 2);
        let factors: Vec<f64> = root.children.iter().map(|&c| tree.node(c).factor).collect();
        assert!(factors.contains(&1.0));
        assert!(factors.contains(&3.0));
    }

    #[test]
    fn factorize_is_stable_under_a_second_pass() {
        let mut tree = Tree::build("eq0", TreeType::Residual, vec![lt("r", &["f1", "t2"], 1.0)]);
        let before = tree.post_order();
        tree.factorize();
        let after = tree.post_order();
        assert_eq!(before, after);
    }

    #[test]
    fn subtree_free_indices_drops_indices_shared_within_the_subtree() {
        let shared = Index::new(Space::Virtual, false);
        let outer = Index::new(Space::Virtual, true);
        let tensors = vec![Tensor::new("f1", vec![outer, shared]), Tensor::new("t2", vec![shared])];
        let diagram = crate::diagram::Diagram::new("d", tensors, 1.0);
        let tree = Tree::build("eq0", TreeType::Residual, vec![ListTensor::from_diagram(&diagram, "r")]);
        let root = tree.roots()[0];
        let free = tree.subtree_free_indices(root);
        assert_eq!(free, vec![outer]);
    }
}
