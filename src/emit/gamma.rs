//! RDM summation emitter: renders one γ-contribution
//! as either a δ-guarded nested-loop accumulation or a `sort_indices` call,
//! with an optional merge-tensor ("mult") variant of each.

use crate::diagram::DeltaPair;
use crate::error::Result;
use crate::index::Index;
use crate::tensor::Tensor;

use super::numeric::prefac;

/// One contribution of a resolved γ tensor into a target buffer.
pub struct GammaContribution<'a> {
    pub gamma: &'a Tensor,
    pub deltas: &'a [DeltaPair],
    pub loop_indices: &'a [Index],
    pub factor: f64,
    pub merge: Option<&'a Tensor>,
}

/// Emits the γ-stream text for one contribution. The no-δ branch
/// rationalizes `factor` (it can fail with `IrrationalFactor`, spec.md
/// section 7), so this returns `Result`.
pub fn emit_contribution(contrib: &GammaContribution<'_>) -> Result<String> {
    if contrib.deltas.is_empty() {
        emit_no_delta_branch(contrib)
    } else {
        Ok(emit_delta_branch(contrib))
    }
}

fn emit_delta_branch(contrib: &GammaContribution<'_>) -> String {
    let mut out = String::new();
    let guard = contrib
        .deltas
        .iter()
        .map(|d| format!("i_{} == i_{}", d.0.id(), d.1.id()))
        .collect::<Vec<_>>()
        .join(" && ");
    out.push_str(&format!("if ({guard}) {{\n"));
    for idx in contrib.loop_indices {
        out.push_str(&format!(
            "  for (auto& i_{0} : *{1}_range()) {{\n",
            idx.id(),
            idx.space().letter()
        ));
    }
    if let Some(merge) = contrib.merge {
        emit_alias_for_merge(&mut out, contrib, merge);
        out.push_str(&format!("    odata[...] += {} * fdata[...] * data[...];\n", contrib.factor));
    } else {
        out.push_str(&format!("    odata[...] += {} * data[...];\n", contrib.factor));
    }
    for _ in contrib.loop_indices {
        out.push_str("  }\n");
    }
    out.push_str("}\n");
    out
}

/// `p,q` here are `contrib.factor` rationalized to smallest-denominator
/// form (spec.md section 4.8's literal `sort_indices<perm..., 1,1, p,q>`
/// template, using the same `prefac` scheme as the main emitter rather
/// than a placeholder token), and the trailing call arguments are each
/// index's block size, in the γ's own stored order.
fn emit_no_delta_branch(contrib: &GammaContribution<'_>) -> Result<String> {
    let perm = sort_permutation(contrib.gamma.indices(), contrib.loop_indices);
    let perm_str = perm.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ");
    let (p, q) = prefac(contrib.factor)?;
    let sizes = contrib
        .gamma
        .indices()
        .iter()
        .map(|i| format!("{}.size()", i.str_gen()))
        .collect::<Vec<_>>()
        .join(", ");
    let mut out = format!("sort_indices<{perm_str}, 1,1, {p},{q}>(data, tlabdata, {sizes});\n");
    if let Some(merge) = contrib.merge {
        out.push_str(&format!("// merge tensor {}\n", merge.label()));
    }
    Ok(out)
}

fn emit_alias_for_merge(out: &mut String, contrib: &GammaContribution<'_>, merge: &Tensor) {
    for idx in merge.indices() {
        if let Some(d) = contrib.deltas.iter().find(|d| d.0.id() == idx.id() || d.1.id() == idx.id()) {
            let other = if d.0.id() == idx.id() { d.1 } else { d.0 };
            out.push_str(&format!("    const int i_{} = i_{};\n", idx.id(), other.id()));
        }
    }
}

/// Lists, in the iteration order of `loop_indices`, the position of each
/// loop index inside `gamma_order` (the γ's stored index order); any
/// position not matched by a loop index is appended in natural order.
///
/// Shared with `task.rs`'s binary-contraction compute-body emission, which
/// needs the identical "where does this loop index sit in this tensor's
/// own index order" computation for its `sort_indices`/`sort_indices_target`
/// calls.
pub(super) fn sort_permutation(gamma_order: &[Index], loop_indices: &[Index]) -> Vec<usize> {
    let mut perm: Vec<usize> = loop_indices
        .iter()
        .filter_map(|li| gamma_order.iter().position(|gi| gi.id() == li.id()))
        .collect();
    for (pos, _) in gamma_order.iter().enumerate() {
        if !perm.contains(&pos) {
            perm.push(pos);
        }
    }
    perm
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Space;

    #[test]
    fn no_delta_branch_lists_loop_positions_then_the_remainder() {
        let a = Index::new(Space::Active, false);
        let b = Index::new(Space::Active, false);
        let c = Index::new(Space::Active, false);
        let gamma = Tensor::new("Gamma2", vec![a, b, c]);
        let perm = sort_permutation(gamma.indices(), &[c, a]);
        assert_eq!(perm, vec![2, 0, 1]);
    }

    #[test]
    fn delta_branch_emits_a_guard_per_pair() {
        let a = Index::new(Space::Active, false);
        let b = Index::new(Space::Active, false);
        let gamma = Tensor::new("Gamma1", vec![a, b]);
        let deltas = vec![DeltaPair::new(a, b)];
        let contrib = GammaContribution { gamma: &gamma, deltas: &deltas, loop_indices: &[], factor: 2.0, merge: None };
        let text = emit_contribution(&contrib).unwrap();
        assert!(text.starts_with("if (i_"));
        assert!(text.contains("odata[...] += 2 * data[...];"));
    }

    #[test]
    fn no_delta_branch_renders_a_rationalized_prefactor_and_sizes() {
        let a = Index::new(Space::Active, false);
        let b = Index::new(Space::Active, false);
        let gamma = Tensor::new("Gamma1", vec![a, b]);
        let contrib = GammaContribution { gamma: &gamma, deltas: &[], loop_indices: &[a], factor: 0.5, merge: None };
        let text = emit_contribution(&contrib).unwrap();
        assert!(text.contains("1,2>(data, tlabdata,"));
        assert!(text.contains(&format!("{}.size()", a.str_gen())));
        assert!(text.contains(&format!("{}.size()", b.str_gen())));
    }

    #[test]
    fn no_delta_branch_rejects_an_irrational_factor() {
        let a = Index::new(Space::Active, false);
        let gamma = Tensor::new("Gamma1", vec![a]);
        let contrib = GammaContribution {
            gamma: &gamma,
            deltas: &[],
            loop_indices: &[],
            factor: std::f64::consts::PI / 1e6,
            merge: None,
        };
        assert!(emit_contribution(&contrib).is_err());
    }
}
