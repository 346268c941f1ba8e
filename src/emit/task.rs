//! Task-class emission: one `Task<i>` / `Task_local`
//! pair per Tree node, with a get-block/sort/contract/sort-target/
//! put-block compute body (spec.md section 4.7) and `add_dep` queue
//! wiring, every edge of which references an already-declared task
//! (spec.md section 8).

use std::collections::HashSet;

use crate::config::MethodConfig;
use crate::equation::TreeType;
use crate::error::{Error, Result};
use crate::index::Index;
use crate::tensor::Tensor;
use crate::tree::Tree;

use super::gamma::{emit_contribution, sort_permutation, GammaContribution};
use super::numeric::prefac;
use super::stream::OutStream;

/// Maps a tree's target label to the member-variable name used inside the
/// emitted task class, mirroring the original generator's `target_name__`.
pub fn target_name(label: &str) -> &str {
    match label {
        "r" => "residual",
        "e0" => "energy",
        "den" => "density",
        "dedci" => "deci",
        other => other,
    }
}

/// Structural-equality dedup used when counting how many distinct input
/// tensors a node's compute body must fetch blocks for.
pub fn count_distinct_tensors(tensors: &[&Tensor]) -> usize {
    let mut seen: Vec<&Tensor> = Vec::new();
    for t in tensors {
        if !seen.iter().any(|s| s.structurally_eq(t)) {
            seen.push(t);
        }
    }
    seen.len()
}

/// Canonical loop order for a set of contracted indices, falling back to
/// `fallback` (e.g. the node's own free/target indices) when there is
/// nothing to loop over. Fails with `EmptyLoop` only when neither is
/// available.
pub fn loop_indices(contracted: &[Index], fallback: &[Index]) -> Result<Vec<Index>> {
    if contracted.is_empty() {
        if fallback.is_empty() {
            return Err(Error::EmptyLoop);
        }
        return Ok(fallback.to_vec());
    }
    let mut sorted = contracted.to_vec();
    sorted.sort_by_key(|i| (i.space().priority(), i.dagger()));
    Ok(sorted)
}

/// Splits the union of `left`'s indices and a child subtree's free indices
/// into the indices contracted between them (present in both) and the
/// indices that remain free in the result (present in exactly one side).
fn split_operands(left: &[Index], child_free: &[Index]) -> (Vec<Index>, Vec<Index>) {
    let left_ids: HashSet<u64> = left.iter().map(|i| i.id()).collect();
    let child_ids: HashSet<u64> = child_free.iter().map(|i| i.id()).collect();
    let mut contracted = Vec::new();
    let mut free = Vec::new();
    for i in left {
        if child_ids.contains(&i.id()) {
            contracted.push(*i);
        } else {
            free.push(*i);
        }
    }
    for i in child_free {
        if !left_ids.contains(&i.id()) {
            free.push(*i);
        }
    }
    (contracted, free)
}

fn index_sizes(indices: &[Index]) -> String {
    indices.iter().map(|i| format!("{}.size()", i.str_gen())).collect::<Vec<_>>().join(", ")
}

fn perm_str(perm: &[usize]) -> String {
    perm.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
}

/// Emits the target-accumulation task (`Task0`): the tree's root
/// declaration, its reset-on-construct constructor, and the queue it
/// feeds.
pub fn create_target(task_id: usize, label: &str, tree_type: TreeType) -> OutStream {
    let mut out = OutStream::new();
    let member = target_name(label);
    out.tt.push_str(&format!("class Task{task_id} : public Task {{\n  protected:\n"));
    out.tt.push_str(&format!("    std::shared_ptr<Tensor> {member}_;\n"));
    out.tt.push_str("    IndexRange closed_;\n    IndexRange active_;\n    IndexRange virt_;\n");
    if tree_type.includes_ci_range() {
        out.tt.push_str("    IndexRange ci_;\n");
    }
    out.tt.push_str("    const bool reset_;\n\n    void compute_() {\n");
    out.tt.push_str(&format!("      if (reset_) {member}_->zero();\n    }}\n\n"));
    out.tt.push_str(&format!("  public:\n    Task{task_id}(std::vector<std::shared_ptr<Tensor>> t, const bool reset);\n"));
    out.tt.push_str(&format!("    ~Task{task_id}() {{}}\n}};\n\n"));

    out.cc.push_str(&format!(
        "Task{task_id}::Task{task_id}(std::vector<std::shared_ptr<Tensor>> t, const bool reset) : reset_(reset) {{\n  {member}_ = t[0];\n}}\n\n"
    ));

    out.ee.push_str(&format!("auto {label}q = make_shared<Queue>();\n"));
    out.ee.push_str(&format!("auto tensor{task_id} = std::vector<std::shared_ptr<Tensor>>{{{member}}};\n"));
    out.ee.push_str(&format!("auto task{task_id} = make_shared<Task{task_id}>(tensor{task_id}, reset);\n"));
    out.ee.push_str(&format!("{label}q->add_task(task{task_id});\n\n"));
    out
}

/// Emits one interior node's task class, `Task_local` subtask, compute
/// body, and queue wiring. `task_id` is this node's own post-order id;
/// `children_task_ids` lists the already-assigned ids of `node.children`
/// in the same order, since every child was visited earlier in the
/// post-order walk and so is always safe to reference here (spec.md
/// section 8). Edges into this node's children are therefore emitted from
/// this (the parent's) call, never from the child's.
pub fn generate_bc(
    task_id: usize,
    children_task_ids: &[usize],
    root_id: usize,
    tree: &Tree,
    node_idx: usize,
    config: MethodConfig,
) -> Result<OutStream> {
    let node = tree.node(node_idx);
    let is_root = node.parent.is_none();
    let mut out = OutStream::new();

    let child_frees: Vec<Vec<Index>> = node.children.iter().map(|&c| tree.subtree_free_indices(c)).collect();

    // This node's own free/output index set: whatever of `node.left`'s
    // indices are not contracted away against a child, plus each child's
    // own leftover free indices. Multiple children only arise from
    // factorization sharing this same left tensor (spec.md section 4.6),
    // so their free indices are folded together rather than kept apart.
    let mut outer: Vec<Index> = Vec::new();
    if child_frees.is_empty() {
        outer = node.left.indices().to_vec();
    } else {
        for free in &child_frees {
            let (_, node_free) = split_operands(node.left.indices(), free);
            for i in node_free {
                if !outer.iter().any(|o| o.id() == i.id()) {
                    outer.push(i);
                }
            }
        }
    }
    outer.sort_by_key(|i| (i.space().priority(), i.dagger()));

    let factor = prefac(node.factor)?;

    let mut input_refs: Vec<&Tensor> = vec![&node.left];
    for &c in &node.children {
        input_refs.push(&tree.node(c).left);
    }
    let n_tensors = count_distinct_tensors(&input_refs);
    let nindex = outer.len().max(1);

    out.tt.push_str(&format!(
        "class Task{task_id} : public Task {{\n  class Task_local : public SubTask<{nindex},{n_tensors}> {{\n"
    ));
    out.tt.push_str("    void compute() override;\n  public:\n");
    out.tt.push_str(&format!("    Task_local(const std::array<const Index,{nindex}>& block, const std::array<std::shared_ptr<const Tensor>,{n_tensors}>& in, std::shared_ptr<Tensor>& out)\n"));
    out.tt.push_str(&format!("      : SubTask<{nindex},{n_tensors}>(block, in, out) {{}}\n  }};\n"));
    out.tt.push_str(&format!("  std::shared_ptr<Tensor> {}_;\n", node.left.str_gen()));
    out.tt.push_str("  void compute_() override;\n public:\n");
    out.tt.push_str(&format!("  Task{task_id}(std::vector<std::shared_ptr<Tensor>> t);\n  ~Task{task_id}() {{}}\n}};\n\n"));

    out.cc.push_str(&format!("Task{task_id}::Task{task_id}(std::vector<std::shared_ptr<Tensor>> t) {{\n"));
    out.cc.push_str(&format!("  {}_ = t[0];\n}}\n\n", node.left.str_gen()));

    out.dd.push_str(&format!("void Task{task_id}::compute_() {{\n"));
    out.dd.push_str(&format!("  // factor {}/{}\n", factor.0, factor.1));
    out.dd.push_str("  out()->get_block(odata);\n");
    out.dd.push_str(&format!("  {}_->get_block(i0data);\n", node.left.str_gen()));

    if node.children.is_empty() {
        // Nothing further to contract against: scale and accumulate
        // directly, the same dummy-index scalar form spec.md section 8
        // calls out as a boundary case.
        out.dd.push_str(&format!("  odata[0] += ({}.0/{}.0) * i0data[0];\n", factor.0, factor.1));
    }

    for (pos, &child_idx) in node.children.iter().enumerate() {
        let child = tree.node(child_idx);
        let child_free = &child_frees[pos];
        let (contracted, free_ti) = split_operands(node.left.indices(), child_free);
        let di = loop_indices(&contracted, &free_ti)?;

        let left_perm = perm_str(&sort_permutation(node.left.indices(), &di));
        let right_perm = perm_str(&sort_permutation(child_free, &di));
        let in_n = pos + 1;

        out.dd.push_str(&format!("  in({in_n})->get_block(i{in_n}data); // {}\n", child.left.str_gen()));
        out.dd.push_str(&format!(
            "  sort_indices<{left_perm}, 1,1,1,1>(i0data, i0data_sorted, {});\n",
            index_sizes(node.left.indices())
        ));
        out.dd.push_str(&format!(
            "  sort_indices<{right_perm}, 1,1,1,1>(i{in_n}data, i{in_n}data_sorted, {});\n",
            index_sizes(child_free)
        ));

        if free_ti.is_empty() {
            out.dd.push_str(&format!(
                "  odata_sorted[0] += {}({}, i0data_sorted, 1, i{in_n}data_sorted, 1);\n",
                config.dot(),
                index_sizes(&contracted)
            ));
        } else {
            out.dd.push_str(&format!(
                "  {}(\"T\", \"N\", {}, 1.0, i0data_sorted, i{in_n}data_sorted, 1.0, odata_sorted);\n",
                config.gemm(),
                index_sizes(&contracted)
            ));
        }

        let target_perm = perm_str(&sort_permutation(&outer, &free_ti));
        out.dd.push_str(&format!(
            "  sort_indices_target<{target_perm}, 1,1, {}, {}>(odata_sorted, odata, {});\n",
            factor.0,
            factor.1,
            index_sizes(&outer)
        ));
    }

    if is_root {
        // Depth 0 (spec.md section 4.7 "Compute body at depth 0"): rather
        // than put_block-ing into this node's own tensor, the contracted
        // product accumulates directly into the tree's target, with
        // consecutive index pairs swapped to match the bra/ket convention
        // (ported from the original's generate_compute_operators).
        let mut swapped = outer.clone();
        let mut i = 0;
        while i + 1 < swapped.len() {
            swapped.swap(i, i + 1);
            i += 2;
        }
        out.dd.push_str("  out()->put_block(odata");
        for idx in swapped.iter().rev() {
            out.dd.push_str(&format!(", {}", idx.str_gen()));
        }
        out.dd.push_str(");\n}\n\n");
    } else {
        out.dd.push_str("  out()->put_block(odata");
        for idx in outer.iter().rev() {
            out.dd.push_str(&format!(", {}", idx.str_gen()));
        }
        out.dd.push_str(");\n}\n\n");
    }

    // Queue wiring: declare this task, wire its dependency on the root
    // (always already declared, as Task0), then wire its dependency on
    // each of its children -- also always already declared, since every
    // child was visited earlier in the post-order walk than this, its
    // parent (spec.md section 8's "every edge add_dep(child) references a
    // previously declared task").
    let mut wiring = String::new();
    wiring.push_str(&format!(
        "auto task{task_id} = make_shared<Task{task_id}>(std::vector<std::shared_ptr<Tensor>>{{{}_}});\n",
        node.left.str_gen()
    ));
    wiring.push_str(&format!("task{task_id}->add_dep(task{root_id});\n"));
    for &child_task_id in children_task_ids {
        wiring.push_str(&format!("task{task_id}->add_dep(task{child_task_id});\n"));
    }
    wiring.push('\n');

    if node.left.is_rdm() {
        out.gg.push_str(&wiring);
        let contrib = GammaContribution {
            gamma: &node.left,
            deltas: &[],
            loop_indices: &outer,
            factor: node.factor,
            merge: None,
        };
        out.gg.push_str(&emit_contribution(&contrib)?);
    } else {
        out.ee.push_str(&wiring);
    }

    Ok(out)
}
