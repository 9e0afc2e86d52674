//! The local (PC-first) family: MMPC, HITON, SI-HITON-PC, GetPC. Each grows a candidate PC by
//! repeatedly admitting the variable with the strongest association to the target, interleaving
//! a false-positive removal pass; the candidate MB is then derived from the candidate PC by
//! checking each PC member's own PC for spouses.

use log::debug;

use crate::cache::CandidateSource;
use crate::ci::CiOracle;
use crate::config::LearnerConfig;
use crate::error::StructureLearningError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocalAlgo {
    Mmpc,
    Hiton,
    SiHitonPc,
    GetPc,
}

pub struct LocalDriver<'a> {
    algo: LocalAlgo,
    oracle: CiOracle<'a>,
    config: LearnerConfig,
}

impl<'a> LocalDriver<'a> {
    pub fn new(algo: LocalAlgo, oracle: CiOracle<'a>, config: LearnerConfig) -> LocalDriver<'a> {
        LocalDriver { algo, oracle, config }
    }

    fn universe(&self, target: usize) -> Vec<usize> {
        (0..self.oracle.n()).filter(|&v| v != target).collect()
    }

    /// Drops every member of `cpc` that tests independent of `target` given some subset of the
    /// rest of `cpc` (the interleaved false-positive-removal pass).
    fn remove_false_pc(
        &mut self,
        target: usize,
        cpc: &mut Vec<usize>,
    ) -> Result<(), StructureLearningError> {
        let initial = cpc.clone();
        for x in initial {
            let rest: Vec<usize> = cpc.iter().copied().filter(|&v| v != x).collect();
            if self.oracle.indep_any_subset(target, x, &rest, self.config.max_conditioning)? {
                debug!("removing {x} from the candidate PC of {target} (false positive)");
                cpc.retain(|&v| v != x);
            }
        }
        Ok(())
    }

    fn grow_pc(&mut self, target: usize) -> Result<Vec<usize>, StructureLearningError> {
        let mut candidates = self.universe(target);
        let mut cpc: Vec<usize> = Vec::new();

        match self.algo {
            LocalAlgo::Mmpc => {
                let mut changed = true;
                while !candidates.is_empty() && changed {
                    changed = false;
                    let best = self.argmin_pvalue_given_subsets(target, &candidates, &cpc)?;
                    if let Some((pos, pv)) = best {
                        let x = candidates[pos];
                        if !self.oracle.indep(pv) {
                            debug!("mmpc: adding {x} to the candidate PC of {target}");
                            cpc.push(x);
                            changed = true;
                        }
                        candidates.remove(pos);
                    }
                }
                self.remove_false_pc(target, &mut cpc)?;
            }
            LocalAlgo::Hiton => {
                while !candidates.is_empty() {
                    let best = self.argmin_marginal_pvalue(target, &candidates)?;
                    if let Some(pos) = best {
                        let x = candidates.remove(pos);
                        debug!("hiton-pc: adding {x} to the candidate PC of {target}");
                        cpc.push(x);
                        self.remove_false_pc(target, &mut cpc)?;
                    }
                }
            }
            LocalAlgo::SiHitonPc => {
                while !candidates.is_empty() {
                    let mut best: Option<(usize, f64)> = None;
                    let mut drop = Vec::new();
                    for &y in &candidates {
                        let pv = self.oracle.p_value(target, y, &[])?;
                        if self.oracle.indep(pv) {
                            drop.push(y);
                            continue;
                        }
                        if best.map_or(true, |(_, best_pv)| pv < best_pv) {
                            best = Some((y, pv));
                        }
                    }
                    candidates.retain(|v| !drop.contains(v));
                    if candidates.is_empty() {
                        continue;
                    }
                    let (x, _) = best.expect("non-empty candidates imply a best candidate");
                    candidates.retain(|&v| v != x);
                    cpc.push(x);
                    self.remove_false_pc(target, &mut cpc)?;
                }
            }
            LocalAlgo::GetPc => {
                let mut changed = true;
                while !candidates.is_empty() && changed {
                    changed = false;
                    let mut best: Option<(usize, f64)> = None;
                    let mut drop = Vec::new();
                    for &y in &candidates {
                        let (pv, _) = self.oracle.min_pvalue_subset(
                            target,
                            y,
                            &cpc,
                            self.config.max_conditioning,
                        )?;
                        if self.oracle.indep(pv) {
                            drop.push(y);
                            continue;
                        }
                        if best.map_or(true, |(_, best_pv)| pv < best_pv) {
                            best = Some((y, pv));
                        }
                    }
                    candidates.retain(|v| !drop.contains(v));
                    if candidates.is_empty() {
                        continue;
                    }
                    if let Some((x, best_pv)) = best {
                        if !self.oracle.indep(best_pv) {
                            cpc.push(x);
                            changed = true;
                        }
                        candidates.retain(|&v| v != x);
                        self.remove_false_pc(target, &mut cpc)?;
                    }
                }
            }
        }

        cpc.sort_unstable();
        Ok(cpc)
    }

    fn argmin_marginal_pvalue(
        &mut self,
        target: usize,
        pool: &[usize],
    ) -> Result<Option<usize>, StructureLearningError> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &y) in pool.iter().enumerate() {
            let pv = self.oracle.p_value(target, y, &[])?;
            if best.map_or(true, |(_, best_pv)| pv < best_pv) {
                best = Some((i, pv));
            }
        }
        Ok(best.map(|(i, _)| i))
    }

    /// Index of the pool member maximizing the minimum association score against `target` over
    /// all subsets of `cond`, i.e. the smallest `min_pvalue_subset` p-value, along with that
    /// p-value.
    fn argmin_pvalue_given_subsets(
        &mut self,
        target: usize,
        pool: &[usize],
        cond: &[usize],
    ) -> Result<Option<(usize, f64)>, StructureLearningError> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &y) in pool.iter().enumerate() {
            let (pv, _) = self.oracle.min_pvalue_subset(target, y, cond, self.config.max_conditioning)?;
            if best.map_or(true, |(_, best_pv)| pv < best_pv) {
                best = Some((i, pv));
            }
        }
        Ok(best)
    }

    /// Derives a candidate MB from a (freshly recomputed) candidate PC: every PC member is in
    /// the MB, plus any "spouse" `x` (a co-parent sharing a child `y` with `target`) that
    /// remains dependent given a minimizing subset of the remaining candidates unioned with `y`.
    fn mb_from_pc(&mut self, target: usize) -> Result<Vec<usize>, StructureLearningError> {
        let pc_target = self.grow_pc(target)?;
        let mut cmb = pc_target.clone();
        let candidates: Vec<usize> = self
            .universe(target)
            .into_iter()
            .filter(|v| !pc_target.contains(v))
            .collect();

        for &y in &pc_target {
            let pc_y = self.grow_pc(y)?;
            for &x in &pc_y {
                if x == target || pc_target.contains(&x) {
                    continue;
                }
                let pool: Vec<usize> = candidates.iter().copied().filter(|&v| v != x).collect();
                let (pv, mut z) =
                    self.oracle
                        .min_pvalue_subset(target, x, &pool, self.config.max_conditioning)?;
                if self.oracle.indep(pv) {
                    z.push(y);
                    if !self.oracle.is_independent(target, x, &z)? && !cmb.contains(&x) {
                        cmb.push(x);
                    }
                }
            }
        }
        cmb.sort_unstable();
        cmb.dedup();
        Ok(cmb)
    }
}

impl<'a> CandidateSource for LocalDriver<'a> {
    fn candidate_pc(&mut self, target: usize) -> Result<Vec<usize>, StructureLearningError> {
        self.grow_pc(target)
    }

    fn candidate_mb(&mut self, target: usize) -> Result<Vec<usize>, StructureLearningError> {
        self.mb_from_pc(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Algorithm;
    use crate::data::Dataset;
    use ndarray::array;

    fn chain_dataset() -> Dataset {
        let mut a = Vec::new();
        let mut b = Vec::new();
        let mut c = Vec::new();
        for i in 0..200u32 {
            a.push(i % 2);
            b.push(i % 2);
            c.push((i / 2) % 2);
        }
        let raw = array![a, b, c];
        Dataset::from_raw_columns(raw, vec!["a".into(), "b".into(), "c".into()]).unwrap()
    }

    fn driver(ds: &Dataset, algo: LocalAlgo) -> LocalDriver<'_> {
        let oracle = CiOracle::new(ds, 0.05);
        let config = LearnerConfig::new(Algorithm::Mmpc, 0.05, None, ds.n(), true, 1).unwrap();
        LocalDriver::new(algo, oracle, config)
    }

    #[test]
    fn mmpc_finds_the_dependent_partner() {
        let ds = chain_dataset();
        let mut drv = driver(&ds, LocalAlgo::Mmpc);
        let pc = drv.candidate_pc(0).unwrap();
        assert_eq!(pc, vec![1]);
    }

    #[test]
    fn hiton_finds_the_dependent_partner() {
        let ds = chain_dataset();
        let mut drv = driver(&ds, LocalAlgo::Hiton);
        let pc = drv.candidate_pc(0).unwrap();
        assert_eq!(pc, vec![1]);
    }

    #[test]
    fn si_hiton_pc_finds_the_dependent_partner() {
        let ds = chain_dataset();
        let mut drv = driver(&ds, LocalAlgo::SiHitonPc);
        let pc = drv.candidate_pc(0).unwrap();
        assert_eq!(pc, vec![1]);
    }

    #[test]
    fn getpc_finds_the_dependent_partner() {
        let ds = chain_dataset();
        let mut drv = driver(&ds, LocalAlgo::GetPc);
        let pc = drv.candidate_pc(0).unwrap();
        assert_eq!(pc, vec![1]);
    }

    #[test]
    fn mb_includes_the_pc() {
        let ds = chain_dataset();
        let mut drv = driver(&ds, LocalAlgo::Mmpc);
        let mb = drv.candidate_mb(0).unwrap();
        assert!(mb.contains(&1));
    }
}
