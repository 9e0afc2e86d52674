//! The graph orienter: turns an undirected skeleton into a partially directed acyclic graph by
//! detecting v-structures, breaking any directed cycles v-structure application introduces, and
//! applying Meek's rules to a fixpoint.
//!
//! Collider evidence differs by algorithm family: the blanket/local family has no stored
//! d-separating set, so it re-derives colliderhood from a fresh conditional-independence test
//! seeded with the candidate collider; the global family looks one up from the removed-edge
//! records [`crate::drivers::global::GlobalDriver`] already collected while pruning the skeleton.
//! [`Evidence`] abstracts over the two so [`find_v_structures`] needs only one implementation of
//! the shared unshielded-triple enumeration.

use std::collections::HashMap;

use log::debug;

use crate::ci::CiOracle;
use crate::drivers::global::RemovedEdge;
use crate::error::StructureLearningError;
use crate::network::BayesianNetwork;

/// A detected v-structure `a -> collider <- b`, with the p-value that witnessed it (used to
/// break ties when multiple v-structures compete for the same arc).
#[derive(Clone, Copy, Debug)]
pub struct VStructure {
    pub collider: usize,
    pub a: usize,
    pub b: usize,
    pub p_value: f64,
}

/// The d-separating set and p-value recorded when an edge was pruned at conditioning-set size
/// `>= 1`, keyed by the unordered pair of endpoints. Built from [`GlobalDriver::removed_edges`]
/// once skeleton learning finishes.
pub type RemovedEdgeIndex = HashMap<(usize, usize), (f64, Vec<usize>)>;

pub fn index_removed_edges(edges: &[RemovedEdge]) -> RemovedEdgeIndex {
    edges
        .iter()
        .map(|e| {
            let key = (e.x.min(e.y), e.x.max(e.y));
            (key, (e.p_value, e.d_separating_set.clone()))
        })
        .collect()
}

/// Which family produced the skeleton, and the extra evidence its collider test needs.
pub enum Evidence<'a> {
    /// Blanket/local family: candidate Markov blankets, keyed by variable, and the configured
    /// cap on conditioning-set size.
    Local {
        mb: &'a HashMap<usize, Vec<usize>>,
        max_conditioning: usize,
    },
    /// Global family: the removed-edge index built by [`index_removed_edges`].
    Global { removed: &'a RemovedEdgeIndex },
}

/// For the unshielded triple `a - collider - b` (`a`, `b` not adjacent), the collider's p-value
/// if `collider` is a v-structure center, `None` otherwise.
fn collider_p_value(
    oracle: &mut CiOracle,
    evidence: &Evidence,
    collider: usize,
    a: usize,
    b: usize,
) -> Result<Option<f64>, StructureLearningError> {
    match evidence {
        Evidence::Local { mb, max_conditioning } => {
            // S is the smaller of MB(a)\{b} and MB(b)\{a}, with the collider candidate itself
            // excluded since it is separately forced via `seed` — leaving it in `given` too
            // would condition on it twice and inflate the test's degrees of freedom.
            let mb_a: Vec<usize> = mb
                .get(&a)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|&v| v != b && v != collider)
                .collect();
            let mb_b: Vec<usize> = mb
                .get(&b)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .filter(|&v| v != a && v != collider)
                .collect();
            let s = if mb_b.len() < mb_a.len() { mb_b } else { mb_a };
            let (pv, _) =
                oracle.best_pvalue_any_subset_seeded(a, b, &s, &[collider], *max_conditioning)?;
            Ok(if oracle.indep(pv) { None } else { Some(pv) })
        }
        Evidence::Global { removed } => {
            let key = (a.min(b), a.max(b));
            match removed.get(&key) {
                Some((pv, dsep)) => {
                    if dsep.contains(&collider) {
                        Ok(None)
                    } else {
                        Ok(Some(*pv))
                    }
                }
                // The (a, b) edge was pruned at conditioning-set size 0 and never recorded: its
                // implicit d-separating set is empty, so "collider not in {}" is vacuously true
                // and this is unconditionally a collider, regardless of what a fresh marginal
                // test would show.
                None => {
                    let pv = oracle.p_value(a, b, &[])?;
                    Ok(Some(pv))
                }
            }
        }
    }
}

/// Phase 1: for every vertex `x` and unordered non-adjacent pair `{y, z} ⊆ PC(x)`, tests whether
/// `y -> x <- z` is a collider.
pub fn find_v_structures(
    n: usize,
    skeleton: &HashMap<usize, Vec<usize>>,
    oracle: &mut CiOracle,
    evidence: &Evidence,
) -> Result<Vec<VStructure>, StructureLearningError> {
    let empty: Vec<usize> = Vec::new();
    let mut found = Vec::new();
    for x in 0..n {
        let pc_x = skeleton.get(&x).unwrap_or(&empty);
        for i in 0..pc_x.len() {
            for j in (i + 1)..pc_x.len() {
                let (y, z) = (pc_x[i], pc_x[j]);
                let y_neighbors = skeleton.get(&y).unwrap_or(&empty);
                if y_neighbors.contains(&z) {
                    continue; // shielded: y and z are adjacent, not an unshielded triple.
                }
                if let Some(p_value) = collider_p_value(oracle, evidence, x, y, z)? {
                    found.push(VStructure { collider: x, a: y, b: z, p_value });
                }
            }
        }
    }
    Ok(found)
}

/// Commits every v-structure in p-value-ascending order, orienting `a -> collider` and
/// `b -> collider` by removing the antiparallel arcs. A v-structure whose edges were already
/// oriented away from its collider by an earlier, higher-priority one is skipped rather than
/// forced, since forcing it would silently overwrite that earlier decision.
pub fn apply_v_structures(net: &mut BayesianNetwork, mut vstructures: Vec<VStructure>) {
    vstructures.sort_by(|p, q| p.p_value.partial_cmp(&q.p_value).unwrap_or(std::cmp::Ordering::Equal));
    for vs in vstructures {
        if net.is_undirected_edge(vs.collider, vs.a) && net.is_undirected_edge(vs.collider, vs.b) {
            debug!(
                "v-structure: orienting {} -> {} <- {} (p = {})",
                vs.a, vs.collider, vs.b, vs.p_value
            );
            net.orient_edge(vs.a, vs.collider)
                .expect("both arcs were confirmed undirected above");
            net.orient_edge(vs.b, vs.collider)
                .expect("both arcs were confirmed undirected above");
        }
    }
}

/// Phase 2: while the directed subgraph has a cycle, enumerate all simple cycles, and reverse
/// the arc with the highest cycle-membership count, breaking ties by `(source, target)`
/// ascending for cross-run reproducibility.
pub fn break_cycles(net: &mut BayesianNetwork) {
    loop {
        if !net.directed_view().has_cycle() {
            break;
        }
        let counts = net.directed_view().edge_cycle_counts();
        let &(u, v) = counts
            .iter()
            .max_by(|(k1, c1), (k2, c2)| c1.cmp(c2).then_with(|| k2.cmp(k1)))
            .map(|(k, _)| k)
            .expect("has_cycle() == true implies some arc participates in a cycle");
        debug!("breaking cycle: reversing {u} -> {v}");
        net.remove_arc(u, v);
        net.add_arc(v, u)
            .expect("reversing a directed arc cannot create a self-loop or duplicate");
    }
}

/// Attempts to commit `keep_u -> keep_v`, rolling back if doing so creates a directed cycle.
/// Returns whether the orientation was committed.
fn try_commit(net: &mut BayesianNetwork, keep_u: usize, keep_v: usize) -> bool {
    net.orient_edge(keep_u, keep_v)
        .expect("caller only calls this on a currently-undirected edge");
    if net.directed_view().has_cycle() {
        net.add_arc(keep_v, keep_u)
            .expect("undoing the orientation just committed");
        false
    } else {
        true
    }
}

/// R1 (unshielded-collider preservation): if `v` already has a parent `x` not adjacent to `u`,
/// commits `v -> u` — the reverse, `u -> v`, would make `x -> v <- u` a new unshielded collider.
/// Symmetrically, if `u` has such a parent relative to `v`, commits `u -> v`.
fn try_r1(net: &mut BayesianNetwork, u: usize, v: usize) -> bool {
    let v_has_outside_parent = net
        .directed_in_neighbors(v)
        .into_iter()
        .any(|x| !net.is_adjacent(x, u));
    if v_has_outside_parent {
        return try_commit(net, v, u);
    }
    let u_has_outside_parent = net
        .directed_in_neighbors(u)
        .into_iter()
        .any(|x| !net.is_adjacent(x, v));
    if u_has_outside_parent {
        return try_commit(net, u, v);
    }
    false
}

/// R2 (acyclicity preservation): commits `u -> v` iff a chain `u -> y -> v` exists and no
/// existing parent `w` of `v` is non-adjacent to `u` (which would itself be a new immorality).
fn r2_condition(net: &BayesianNetwork, u: usize, v: usize) -> bool {
    let has_chain = net
        .directed_out_neighbors(u)
        .into_iter()
        .any(|y| net.is_directed_edge(y, v));
    if !has_chain {
        return false;
    }
    !net.directed_in_neighbors(v).into_iter().any(|w| !net.is_adjacent(u, w))
}

fn try_r2(net: &mut BayesianNetwork, u: usize, v: usize) -> bool {
    if r2_condition(net, u, v) {
        return try_commit(net, u, v);
    }
    if r2_condition(net, v, u) {
        return try_commit(net, v, u);
    }
    false
}

/// R3 (hybrid): commits `u -> v` iff at least two of `v`'s directed parents are
/// undirected-adjacent to `u`.
fn r3_condition(net: &BayesianNetwork, u: usize, v: usize) -> bool {
    net.directed_in_neighbors(v)
        .into_iter()
        .filter(|&y| net.is_undirected_edge(u, y))
        .count()
        >= 2
}

fn try_r3(net: &mut BayesianNetwork, u: usize, v: usize) -> bool {
    if r3_condition(net, u, v) {
        return try_commit(net, u, v);
    }
    if r3_condition(net, v, u) {
        return try_commit(net, v, u);
    }
    false
}

/// Phase 3: applies R1, R2, R3 to every remaining undirected edge, repeating until a full pass
/// produces no change. Terminates because each commit strictly removes one antiparallel arc.
pub fn apply_meek_rules(net: &mut BayesianNetwork) {
    loop {
        let mut changed = false;
        let n = net.n();
        for u in 0..n {
            for v in (u + 1)..n {
                if !net.is_undirected_edge(u, v) {
                    continue;
                }
                if try_r1(net, u, v) || try_r2(net, u, v) || try_r3(net, u, v) {
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }
}

/// Runs all three phases over a skeleton, returning the oriented network.
pub fn orient_skeleton(
    names: Vec<String>,
    skeleton: &HashMap<usize, Vec<usize>>,
    oracle: &mut CiOracle,
    evidence: Evidence,
) -> Result<BayesianNetwork, StructureLearningError> {
    let n = names.len();
    let mut net = BayesianNetwork::new(names);
    let empty: Vec<usize> = Vec::new();
    for x in 0..n {
        for &y in skeleton.get(&x).unwrap_or(&empty) {
            if x < y {
                net.add_undirected_edge(x, y)?;
            }
        }
    }
    let vstructures = find_v_structures(n, skeleton, oracle, &evidence)?;
    apply_v_structures(&mut net, vstructures);
    break_cycles(&mut net);
    apply_meek_rules(&mut net);
    Ok(net)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Dataset;
    use ndarray::array;

    /// x, y independent fair coins; z = x XOR y. Pairwise marginally independent, but x and y
    /// become dependent once z is known — the textbook collider.
    fn xor_dataset() -> Dataset {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        let mut zs = Vec::new();
        for i in 0..400u32 {
            let x = i % 2;
            let y = (i / 2) % 2;
            xs.push(x);
            ys.push(y);
            zs.push(x ^ y);
        }
        let raw = array![xs, ys, zs];
        Dataset::from_raw_columns(raw, vec!["x".into(), "y".into(), "z".into()]).unwrap()
    }

    /// a -> b -> c: a, c dependent marginally, independent given b. No collider at b.
    fn chain_dataset() -> Dataset {
        let mut a = Vec::new();
        let mut b = Vec::new();
        let mut c = Vec::new();
        for i in 0..400u32 {
            a.push(i % 2);
            b.push(i % 2);
            c.push(i % 2);
        }
        let raw = array![a, b, c];
        Dataset::from_raw_columns(raw, vec!["a".into(), "b".into(), "c".into()]).unwrap()
    }

    #[test]
    fn finds_the_xor_collider() {
        let ds = xor_dataset();
        let mut oracle = CiOracle::new(&ds, 0.05);
        let skeleton: HashMap<usize, Vec<usize>> =
            [(0, vec![2]), (1, vec![2]), (2, vec![0, 1])].into_iter().collect();
        let mb = skeleton.clone();
        let evidence = Evidence::Local { mb: &mb, max_conditioning: 2 };
        let found = find_v_structures(3, &skeleton, &mut oracle, &evidence).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].collider, 2);
        assert_eq!((found[0].a.min(found[0].b), found[0].a.max(found[0].b)), (0, 1));
    }

    #[test]
    fn chain_has_no_collider() {
        let ds = chain_dataset();
        let mut oracle = CiOracle::new(&ds, 0.05);
        let skeleton: HashMap<usize, Vec<usize>> =
            [(0, vec![1]), (1, vec![0, 2]), (2, vec![1])].into_iter().collect();
        let mb = skeleton.clone();
        let evidence = Evidence::Local { mb: &mb, max_conditioning: 2 };
        let found = find_v_structures(3, &skeleton, &mut oracle, &evidence).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn apply_v_structures_orients_both_arcs_into_the_collider() {
        let mut net = BayesianNetwork::new(vec!["x".into(), "y".into(), "z".into()]);
        net.add_undirected_edge(0, 2).unwrap();
        net.add_undirected_edge(1, 2).unwrap();
        apply_v_structures(&mut net, vec![VStructure { collider: 2, a: 0, b: 1, p_value: 0.001 }]);
        assert!(net.is_directed_edge(0, 2));
        assert!(net.is_directed_edge(1, 2));
    }

    #[test]
    fn break_cycles_reverses_the_highest_count_arc() {
        let mut net = BayesianNetwork::new(vec!["a".into(), "b".into(), "c".into()]);
        net.add_arc(0, 1).unwrap();
        net.add_arc(1, 2).unwrap();
        net.add_arc(2, 0).unwrap();
        break_cycles(&mut net);
        assert!(!net.directed_view().has_cycle());
    }

    #[test]
    fn meek_r1_extends_from_an_existing_collider() {
        // x -> z <- y is already a v-structure; z - w is undirected with w not adjacent to x.
        let mut net = BayesianNetwork::new(vec!["x".into(), "y".into(), "z".into(), "w".into()]);
        net.add_arc(0, 2).unwrap();
        net.add_arc(1, 2).unwrap();
        net.add_undirected_edge(2, 3).unwrap();
        apply_meek_rules(&mut net);
        assert!(net.is_directed_edge(2, 3), "R1 should orient z -> w");
    }

    #[test]
    fn orient_skeleton_preserves_the_xor_collider_end_to_end() {
        let ds = xor_dataset();
        let mut oracle = CiOracle::new(&ds, 0.05);
        let skeleton: HashMap<usize, Vec<usize>> =
            [(0, vec![2]), (1, vec![2]), (2, vec![0, 1])].into_iter().collect();
        let mb = skeleton.clone();
        let evidence = Evidence::Local { mb: &mb, max_conditioning: 2 };
        let names = vec!["x".into(), "y".into(), "z".into()];
        let net = orient_skeleton(names, &skeleton, &mut oracle, evidence).unwrap();
        assert!(net.is_directed_edge(0, 2));
        assert!(net.is_directed_edge(1, 2));
    }
}
