//! Top-level orchestration: wires the learning drivers, the neighborhood cache, the distributed
//! coordinator and the graph orienter into the two entry points the CLI binary drives — a single
//! variable's neighborhood, or a full network.

use std::collections::HashMap;

use crate::cache::{CandidateSource, NeighborhoodCache};
use crate::ci::CiOracle;
use crate::config::{Algorithm, LearnerConfig};
use crate::data::Dataset;
use crate::distributed;
use crate::drivers::{BlanketAlgo, BlanketDriver, GlobalDriver, LocalAlgo, LocalDriver};
use crate::error::StructureLearningError;
use crate::network::BayesianNetwork;
use crate::orient::{self, Evidence};

/// Which neighborhood a [`Learner::neighborhood`] call computes, matching the `--discover-mb`
/// CLI flag (PC is the default `--learn-network`-style per-target query).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NeighborhoodKind {
    Pc,
    Mb,
}

/// Dispatches to the algorithm family [`LearnerConfig::algorithm`] selects. Each variant owns its
/// own [`CiOracle`] (single-threaded scratch buffers), so one `Driver` suffices for an entire
/// learning run — every target's neighborhood is computed against the same oracle.
enum Driver<'a> {
    Blanket(BlanketDriver<'a>),
    Local(LocalDriver<'a>),
    Global(GlobalDriver<'a>),
}

impl<'a> Driver<'a> {
    fn new(dataset: &'a Dataset, config: LearnerConfig) -> Driver<'a> {
        match config.algorithm {
            Algorithm::Gs => Driver::Blanket(BlanketDriver::new(
                BlanketAlgo::Gs,
                CiOracle::new(dataset, config.alpha),
                config,
            )),
            Algorithm::Iamb => Driver::Blanket(BlanketDriver::new(
                BlanketAlgo::Iamb,
                CiOracle::new(dataset, config.alpha),
                config,
            )),
            Algorithm::InterIamb => Driver::Blanket(BlanketDriver::new(
                BlanketAlgo::InterIamb,
                CiOracle::new(dataset, config.alpha),
                config,
            )),
            Algorithm::Mmpc => Driver::Local(LocalDriver::new(
                LocalAlgo::Mmpc,
                CiOracle::new(dataset, config.alpha),
                config,
            )),
            Algorithm::Hiton => Driver::Local(LocalDriver::new(
                LocalAlgo::Hiton,
                CiOracle::new(dataset, config.alpha),
                config,
            )),
            Algorithm::SiHitonPc => Driver::Local(LocalDriver::new(
                LocalAlgo::SiHitonPc,
                CiOracle::new(dataset, config.alpha),
                config,
            )),
            Algorithm::GetPc => Driver::Local(LocalDriver::new(
                LocalAlgo::GetPc,
                CiOracle::new(dataset, config.alpha),
                config,
            )),
            Algorithm::PcStable | Algorithm::PcStable2 => {
                Driver::Global(GlobalDriver::new(CiOracle::new(dataset, config.alpha), config))
            }
        }
    }
}

impl<'a> CandidateSource for Driver<'a> {
    fn candidate_pc(&mut self, target: usize) -> Result<Vec<usize>, StructureLearningError> {
        match self {
            Driver::Blanket(d) => d.candidate_pc(target),
            Driver::Local(d) => d.candidate_pc(target),
            Driver::Global(d) => d.candidate_pc(target),
        }
    }

    fn candidate_mb(&mut self, target: usize) -> Result<Vec<usize>, StructureLearningError> {
        match self {
            Driver::Blanket(d) => d.candidate_mb(target),
            Driver::Local(d) => d.candidate_mb(target),
            Driver::Global(d) => d.candidate_mb(target),
        }
    }
}

/// Drives one learning run (one dataset, one [`LearnerConfig`]) end to end.
pub struct Learner<'a> {
    dataset: &'a Dataset,
    config: LearnerConfig,
}

impl<'a> Learner<'a> {
    pub fn new(dataset: &'a Dataset, config: LearnerConfig) -> Learner<'a> {
        Learner { dataset, config }
    }

    /// The symmetry-corrected PC or MB of `target`, sorted ascending (`--target` CLI mode).
    pub fn neighborhood(
        &self,
        target: usize,
        kind: NeighborhoodKind,
    ) -> Result<Vec<usize>, StructureLearningError> {
        let mut driver = Driver::new(self.dataset, self.config);
        let mut cache = NeighborhoodCache::new();
        let mut set = match kind {
            NeighborhoodKind::Pc => cache.get_pc(&mut driver, target)?,
            NeighborhoodKind::Mb => cache.get_mb(&mut driver, target)?,
        };
        set.sort_unstable();
        Ok(set)
    }

    /// The full network (`--learn-network` CLI mode): every variable's PC skeleton, optionally
    /// oriented into a CPDAG when `config.direct_edges` is set.
    pub fn learn_network(&self) -> Result<BayesianNetwork, StructureLearningError> {
        if self.config.workers > 1 {
            if matches!(self.config.algorithm, Algorithm::Gs | Algorithm::Iamb) {
                return self.learn_network_distributed();
            }
            // The distributed coordinator only has a grow/shrink protocol for the blanket
            // family (see `crate::distributed`); the global family's parallel edge-testing
            // protocol (§5's weighted imbalance repair over C(n-1, s+1) edge costs) has no
            // implementation here, so a `workers > 1` request for any other algorithm is
            // reported rather than silently run sequentially.
            return Err(StructureLearningError::Unimplemented(format!(
                "distributed learning is not implemented for {:?}",
                self.config.algorithm
            )));
        }

        let n = self.dataset.n();
        let names = self.dataset.names().to_vec();
        let mut driver = Driver::new(self.dataset, self.config);
        let mut cache = NeighborhoodCache::new();

        let mut skeleton: HashMap<usize, Vec<usize>> = HashMap::new();
        for x in 0..n {
            skeleton.insert(x, cache.get_pc(&mut driver, x)?);
        }

        if !self.config.direct_edges {
            return Ok(build_undirected(names, &skeleton)?);
        }

        let mut oracle = CiOracle::new(self.dataset, self.config.alpha);
        match &driver {
            Driver::Global(g) => {
                let removed = orient::index_removed_edges(g.removed_edges());
                orient::orient_skeleton(
                    names,
                    &skeleton,
                    &mut oracle,
                    Evidence::Global { removed: &removed },
                )
            }
            _ => {
                let mut mb: HashMap<usize, Vec<usize>> = HashMap::new();
                for x in 0..n {
                    mb.insert(x, cache.get_mb(&mut driver, x)?);
                }
                orient::orient_skeleton(
                    names,
                    &skeleton,
                    &mut oracle,
                    Evidence::Local { mb: &mb, max_conditioning: self.config.max_conditioning },
                )
            }
        }
    }

    /// `learn_network`'s path when the distributed coordinator handles the grow/shrink phase
    /// (blanket family only, `config.workers > 1`): the MB map comes back complete from
    /// [`distributed::run_distributed_blanket_learning`], so only PC derivation and orientation
    /// remain local work.
    fn learn_network_distributed(&self) -> Result<BayesianNetwork, StructureLearningError> {
        let names = self.dataset.names().to_vec();
        let n = self.dataset.n();
        let mb = distributed::run_distributed_blanket_learning(self.dataset, self.config)?;
        let mut oracle = CiOracle::new(self.dataset, self.config.alpha);

        let mut skeleton: HashMap<usize, Vec<usize>> = HashMap::new();
        for x in 0..n {
            let mb_x = mb.get(&x).cloned().unwrap_or_default();
            let mut pc = Vec::new();
            for &y in &mb_x {
                let mb_y = mb.get(&y).cloned().unwrap_or_default();
                let mb_x_minus_y: Vec<usize> = mb_x.iter().copied().filter(|&v| v != y).collect();
                let mb_y_minus_x: Vec<usize> = mb_y.iter().copied().filter(|&v| v != x).collect();
                let z = if mb_y_minus_x.len() < mb_x_minus_y.len() { mb_y_minus_x } else { mb_x_minus_y };
                if !oracle.indep_any_subset(x, y, &z, self.config.max_conditioning)? {
                    pc.push(y);
                }
            }
            pc.sort_unstable();
            skeleton.insert(x, pc);
        }

        if !self.config.direct_edges {
            return Ok(build_undirected(names, &skeleton)?);
        }
        orient::orient_skeleton(
            names,
            &skeleton,
            &mut oracle,
            Evidence::Local { mb: &mb, max_conditioning: self.config.max_conditioning },
        )
    }
}

fn build_undirected(
    names: Vec<String>,
    skeleton: &HashMap<usize, Vec<usize>>,
) -> Result<BayesianNetwork, crate::error::OrientError> {
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
    Ok(net)
}
