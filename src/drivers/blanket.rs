//! The blanket-first family: GS, IAMB, InterIAMB. Each grows a candidate Markov blanket by
//! repeatedly admitting the most strongly associated remaining variable, then shrinks it by
//! testing every admitted variable for independence given the rest of the blanket.

use log::debug;

use crate::cache::CandidateSource;
use crate::ci::CiOracle;
use crate::config::LearnerConfig;
use crate::error::StructureLearningError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlanketAlgo {
    Gs,
    Iamb,
    InterIamb,
}

/// Grows and shrinks a candidate MB, then derives a candidate PC from it.
pub struct BlanketDriver<'a> {
    algo: BlanketAlgo,
    oracle: CiOracle<'a>,
    config: LearnerConfig,
}

impl<'a> BlanketDriver<'a> {
    pub fn new(algo: BlanketAlgo, oracle: CiOracle<'a>, config: LearnerConfig) -> BlanketDriver<'a> {
        BlanketDriver { algo, oracle, config }
    }

    fn universe(&self, target: usize) -> Vec<usize> {
        (0..self.oracle.n()).filter(|&v| v != target).collect()
    }

    /// One grow-shrink pass, shared by all three algorithms: `pick` selects the next variable to
    /// test for admission (GS: max marginal association; IAMB/InterIAMB: max association given
    /// the current blanket); `shrink_after_each_add` is InterIAMB's distinguishing behavior.
    fn grow_shrink(&mut self, target: usize) -> Result<Vec<usize>, StructureLearningError> {
        let mut candidates = self.universe(target);
        let mut cmb: Vec<usize> = Vec::new();

        match self.algo {
            BlanketAlgo::Gs => {
                let mut changed = true;
                while !candidates.is_empty() && changed {
                    changed = false;
                    let mut this_round = candidates.clone();
                    while let Some(pos) = self.argmax_marginal(target, &this_round)? {
                        let x = this_round.remove(pos);
                        if !self.oracle.is_independent(target, x, &cmb)? {
                            debug!("gs: adding {x} to the blanket of {target}");
                            cmb.push(x);
                            candidates.retain(|&v| v != x);
                            changed = true;
                        }
                    }
                }
            }
            BlanketAlgo::Iamb => {
                let mut changed = true;
                while !candidates.is_empty() && changed {
                    changed = false;
                    if let Some(pos) = self.argmax_given(target, &candidates, &cmb)? {
                        let x = candidates[pos];
                        if !self.oracle.is_independent(target, x, &cmb)? {
                            debug!("iamb: adding {x} to the blanket of {target}");
                            cmb.push(x);
                            candidates.remove(pos);
                            changed = true;
                        }
                    }
                }
            }
            BlanketAlgo::InterIamb => {
                let mut changed = true;
                while !candidates.is_empty() && changed {
                    changed = false;
                    if let Some(pos) = self.argmax_given(target, &candidates, &cmb)? {
                        let x = candidates[pos];
                        if !self.oracle.is_independent(target, x, &cmb)? {
                            debug!("inter.iamb: adding {x} to the blanket of {target}");
                            cmb.push(x);
                            candidates.remove(pos);
                            let removed = self.shrink(target, &mut cmb)?;
                            if removed == vec![x] {
                                // Shrink undid exactly the variable just admitted: no progress.
                                changed = false;
                            } else {
                                for r in removed {
                                    if !candidates.contains(&r) {
                                        candidates.push(r);
                                    }
                                }
                                changed = true;
                            }
                        }
                    }
                }
            }
        }

        if !matches!(self.algo, BlanketAlgo::InterIamb) {
            self.shrink(target, &mut cmb)?;
        }
        cmb.sort_unstable();
        Ok(cmb)
    }

    /// Index (within `pool`) of the variable with the smallest unconditional p-value against
    /// `target`, i.e. the strongest marginal association. `None` if `pool` is empty.
    fn argmax_marginal(
        &mut self,
        target: usize,
        pool: &[usize],
    ) -> Result<Option<usize>, StructureLearningError> {
        self.argmax_given(target, pool, &[])
    }

    /// Index (within `pool`) of the variable with the smallest p-value against `target` given
    /// `cond`, i.e. the strongest association conditional on the current blanket.
    fn argmax_given(
        &mut self,
        target: usize,
        pool: &[usize],
        cond: &[usize],
    ) -> Result<Option<usize>, StructureLearningError> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &x) in pool.iter().enumerate() {
            let pv = self.oracle.p_value(target, x, cond)?;
            if best.map_or(true, |(_, best_pv)| pv < best_pv) {
                best = Some((i, pv));
            }
        }
        Ok(best.map(|(i, _)| i))
    }

    /// Removes every variable from `cmb` that tests independent of `target` given the rest of
    /// `cmb`, returning the removed variables.
    fn shrink(
        &mut self,
        target: usize,
        cmb: &mut Vec<usize>,
    ) -> Result<Vec<usize>, StructureLearningError> {
        let initial = cmb.clone();
        let mut removed = Vec::new();
        for x in initial {
            let rest: Vec<usize> = cmb.iter().copied().filter(|&v| v != x).collect();
            if self.oracle.is_independent(target, x, &rest)? {
                debug!("shrink: removing {x} from the blanket of {target}");
                cmb.retain(|&v| v != x);
                removed.push(x);
            }
        }
        Ok(removed)
    }

    /// Derives a candidate PC from a (freshly recomputed) candidate MB: `y` survives into PC(x)
    /// iff `x` and `y` remain dependent given the smaller of `MB(x) \ {y}` and `MB(y) \ {x}`.
    fn pc_from_mb(&mut self, target: usize) -> Result<Vec<usize>, StructureLearningError> {
        let mb_target = self.grow_shrink(target)?;
        let mut pc = Vec::new();
        for y in mb_target.iter().copied() {
            let mb_y = self.grow_shrink(y)?;
            let mb_target_minus_y: Vec<usize> =
                mb_target.iter().copied().filter(|&v| v != y).collect();
            let mb_y_minus_target: Vec<usize> = mb_y.iter().copied().filter(|&v| v != target).collect();
            let z = if mb_y_minus_target.len() < mb_target_minus_y.len() {
                mb_y_minus_target
            } else {
                mb_target_minus_y
            };
            if !self.oracle.indep_any_subset(target, y, &z, self.config.max_conditioning)? {
                pc.push(y);
            }
        }
        Ok(pc)
    }
}

impl<'a> CandidateSource for BlanketDriver<'a> {
    fn candidate_pc(&mut self, target: usize) -> Result<Vec<usize>, StructureLearningError> {
        self.pc_from_mb(target)
    }

    fn candidate_mb(&mut self, target: usize) -> Result<Vec<usize>, StructureLearningError> {
        self.grow_shrink(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Algorithm;
    use crate::data::Dataset;
    use ndarray::array;

    /// Three variables: a and b are perfectly correlated, c is independent noise.
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

    fn driver(ds: &Dataset, algo: BlanketAlgo) -> BlanketDriver<'_> {
        let oracle = CiOracle::new(ds, 0.05);
        let config = LearnerConfig::new(Algorithm::Gs, 0.05, None, ds.n(), true, 1).unwrap();
        BlanketDriver::new(algo, oracle, config)
    }

    #[test]
    fn gs_finds_the_dependent_partner() {
        let ds = chain_dataset();
        let mut drv = driver(&ds, BlanketAlgo::Gs);
        let mb = drv.candidate_mb(0).unwrap();
        assert_eq!(mb, vec![1]);
    }

    #[test]
    fn iamb_finds_the_dependent_partner() {
        let ds = chain_dataset();
        let mut drv = driver(&ds, BlanketAlgo::Iamb);
        let mb = drv.candidate_mb(0).unwrap();
        assert_eq!(mb, vec![1]);
    }

    #[test]
    fn inter_iamb_finds_the_dependent_partner() {
        let ds = chain_dataset();
        let mut drv = driver(&ds, BlanketAlgo::InterIamb);
        let mb = drv.candidate_mb(0).unwrap();
        assert_eq!(mb, vec![1]);
    }

    #[test]
    fn pc_derivation_matches_mb_for_a_two_variable_blanket() {
        let ds = chain_dataset();
        let mut drv = driver(&ds, BlanketAlgo::Gs);
        let pc = drv.candidate_pc(0).unwrap();
        assert_eq!(pc, vec![1]);
    }
}
