//! Code emitter (C10): walks a factorized [`Tree`] and renders task-class
//! declarations, constructors, compute bodies, and queue wiring as a single
//! text blob: the five streams are concatenated in a fixed order at the
//! very end, never incrementally.

mod gamma;
mod numeric;
mod stream;
mod task;

pub use gamma::{emit_contribution, GammaContribution};
pub use numeric::prefac;

use crate::config::MethodConfig;
use crate::error::Result;
use crate::tree::Tree;
use stream::OutStream;

/// Emits the full source text for one factorized Tree: a `Task0` wrapping
/// the tree's final accumulation target in the method's wrapper class
/// (`Residual`, `Energy`, ... per `tree_type`), followed by one task per
/// remaining node in post-order.
pub fn emit_tree(tree: &Tree, config: MethodConfig) -> Result<String> {
    let mut out = OutStream::new();

    let wrapper = tree.tree_type().wrapper_class();
    out.tt.push_str(&format!("// generated for tree `{}`, method {:?}\n", tree.name(), config));
    out.cc.push_str(&format!(
        "auto {0} = make_shared<{wrapper}>(e0, \"{0}\");\n",
        tree.name()
    ));

    let order = tree.post_order();
    let root_id = 0usize;
    out.extend(task::create_target(root_id, tree.name(), tree.tree_type()));

    let mut task_id_of: std::collections::HashMap<usize, usize> = std::collections::HashMap::new();
    for (offset, &node_idx) in order.iter().enumerate() {
        let task_id = offset + 1;
        task_id_of.insert(node_idx, task_id);
        let node = tree.node(node_idx);
        let children_task_ids: Vec<usize> = node.children.iter().map(|c| task_id_of[c]).collect();
        out.extend(task::generate_bc(task_id, &children_task_ids, root_id, tree, node_idx, config)?);
    }

    Ok(out.concat())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::Diagram;
    use crate::equation::TreeType;
    use crate::index::{Index, Space};
    use crate::list_tensor::ListTensor;
    use crate::tensor::Tensor;

    #[test]
    fn emits_nonempty_source_for_a_simple_tree() {
        let i = Index::new(Space::Virtual, true);
        let j = Index::new(Space::Virtual, false);
        let diagram = Diagram::new("d", vec![Tensor::new("f1", vec![i]), Tensor::new("t2", vec![j])], 0.5);
        let lt = ListTensor::from_diagram(&diagram, "r");
        let tree = Tree::build("eq0", TreeType::Residual, vec![lt]);
        let text = emit_tree(&tree, MethodConfig::Caspt2).unwrap();
        assert!(text.contains("Residual"));
        assert!(text.contains("Task0"));
    }
}
