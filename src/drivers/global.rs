//! The global (all-pairs) family: PC-Stable. Starts from the complete graph and, for
//! increasing conditioning-set sizes, removes any edge whose endpoints test independent given
//! some subset of that size drawn from one endpoint's current neighbors. All edge removals
//! decided during a round are applied only after every edge in the round has been checked
//! (the "stable" property: a round's neighbor sets don't change mid-round, so the result does
//! not depend on edge processing order).
//!
//! PC-Stable and PC-Stable2 differ only in how rounds are synchronized across parallel workers
//! (see [`crate::distributed`]); run sequentially they compute the identical skeleton, so a
//! single driver implements both here.

use std::collections::HashMap;

use log::debug;

use crate::cache::CandidateSource;
use crate::ci::CiOracle;
use crate::config::LearnerConfig;
use crate::error::StructureLearningError;

/// A removed edge retained because its endpoints still share a candidate neighbor, needed later
/// to check whether an unshielded triple is a collider.
pub struct RemovedEdge {
    pub x: usize,
    pub y: usize,
    pub p_value: f64,
    pub d_separating_set: Vec<usize>,
}

pub struct GlobalDriver<'a> {
    oracle: CiOracle<'a>,
    config: LearnerConfig,
    neighbors: Option<HashMap<usize, Vec<usize>>>,
    removed_edges: Vec<RemovedEdge>,
}

impl<'a> GlobalDriver<'a> {
    pub fn new(oracle: CiOracle<'a>, config: LearnerConfig) -> GlobalDriver<'a> {
        GlobalDriver {
            oracle,
            config,
            neighbors: None,
            removed_edges: Vec::new(),
        }
    }

    pub fn removed_edges(&self) -> &[RemovedEdge] {
        &self.removed_edges
    }

    fn ensure_skeleton(&mut self) -> Result<(), StructureLearningError> {
        if self.neighbors.is_some() {
            return Ok(());
        }
        let neighbors = self.compute_skeleton()?;
        self.neighbors = Some(neighbors);
        Ok(())
    }

    fn compute_skeleton(&mut self) -> Result<HashMap<usize, Vec<usize>>, StructureLearningError> {
        let n = self.oracle.n();
        let mut all_neighbors: HashMap<usize, Vec<usize>> = (0..n)
            .map(|v| (v, (0..n).filter(|&w| w != v).collect()))
            .collect();
        let mut edges: Vec<(usize, usize)> = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                edges.push((i, j));
            }
        }
        let max_size = self.config.max_conditioning.min(n.saturating_sub(2));

        let mut s = 0usize;
        while s <= max_size && !edges.is_empty() {
            debug!("testing {} edges using sets of size {s}", edges.len());
            let mut removed_neighbors: HashMap<usize, Vec<usize>> = HashMap::new();
            let mut edge_pvs: Vec<f64> = Vec::with_capacity(edges.len());

            for &(x, y) in &edges {
                let nx = all_neighbors[&x].clone();
                let ny = all_neighbors[&y].clone();
                let (pv, remove, dsep) = self.check_edge(x, y, &nx, &ny, s, s > 0)?;
                edge_pvs.push(pv);
                if remove {
                    removed_neighbors.entry(x).or_default().push(y);
                    removed_neighbors.entry(y).or_default().push(x);
                }
                if self.config.direct_edges && s > 0 && self.oracle.indep(pv) {
                    let common_neighbor_exists =
                        all_neighbors[&x].iter().any(|v| all_neighbors[&y].contains(v));
                    if common_neighbor_exists {
                        self.removed_edges.push(RemovedEdge {
                            x,
                            y,
                            p_value: pv,
                            d_separating_set: dsep,
                        });
                    }
                }
            }

            for (v, removed) in removed_neighbors {
                if let Some(entry) = all_neighbors.get_mut(&v) {
                    entry.retain(|w| !removed.contains(w));
                }
            }

            let mut next_edges = Vec::with_capacity(edges.len());
            for (idx, &(x, y)) in edges.iter().enumerate() {
                let pv = edge_pvs[idx];
                let both_exhausted =
                    all_neighbors[&x].len() <= s + 1 && all_neighbors[&y].len() <= s + 1;
                if !self.oracle.indep(pv) && !both_exhausted {
                    next_edges.push((x, y));
                }
            }
            edges = next_edges;

            if self.config.direct_edges {
                self.removed_edges
                    .retain(|e| all_neighbors[&e.x].iter().any(|v| all_neighbors[&e.y].contains(v)));
            }
            s += 1;
        }

        Ok(all_neighbors)
    }

    /// Tests whether `x` and `y` are independent given some `set_size`-sized subset of one
    /// endpoint's current neighbors: `x`'s neighbors first, then (once conditioning sets are
    /// non-empty and the edge survived) `y`'s neighbors if they contain anything `x`'s don't.
    fn check_edge(
        &mut self,
        x: usize,
        y: usize,
        neighbors_x: &[usize],
        neighbors_y: &[usize],
        set_size: usize,
        check_backward: bool,
    ) -> Result<(f64, bool, Vec<usize>), StructureLearningError> {
        let x_minus_y: Vec<usize> = neighbors_x.iter().copied().filter(|&v| v != y).collect();
        let mut pv = 0.0;
        let mut dsep = Vec::new();
        let mut remove = false;

        if x_minus_y.len() >= set_size {
            let (p, z) = self.oracle.max_pvalue_subset_exact_size(x, y, &x_minus_y, set_size)?;
            pv = p;
            dsep = z;
            remove = self.oracle.indep(pv);
        }

        if check_backward && !remove {
            let y_minus_x: Vec<usize> = neighbors_y.iter().copied().filter(|&v| v != x).collect();
            if y_minus_x.len() >= set_size {
                let has_extra = y_minus_x.iter().any(|v| !x_minus_y.contains(v));
                if has_extra {
                    let (p, z) = self.oracle.max_pvalue_subset_exact_size(x, y, &y_minus_x, set_size)?;
                    pv = p;
                    dsep = z;
                    remove = self.oracle.indep(pv);
                }
            }
        }

        Ok((pv, remove, dsep))
    }
}

impl<'a> CandidateSource for GlobalDriver<'a> {
    fn candidate_pc(&mut self, target: usize) -> Result<Vec<usize>, StructureLearningError> {
        self.ensure_skeleton()?;
        Ok(self.neighbors.as_ref().unwrap()[&target].clone())
    }

    /// The global family caches a single neighbor map per target; PC and MB coincide.
    fn candidate_mb(&mut self, target: usize) -> Result<Vec<usize>, StructureLearningError> {
        self.candidate_pc(target)
    }
}
