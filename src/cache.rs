//! Per-target memoization of candidate PC/MB sets, with lazy symmetry correction.
//!
//! Two independent maps (one for PC, one for MB); each entry is computed once via whatever
//! [`CandidateSource`] the active learning driver provides, and symmetry-corrected at most
//! once per target.

use std::collections::HashMap;

use log::info;

use crate::error::StructureLearningError;

/// Anything that can compute an *uncorrected* candidate neighborhood for a target, i.e. a
/// learning driver. Symmetry correction itself lives entirely in [`NeighborhoodCache`] and
/// never calls back into the driver beyond this.
pub trait CandidateSource {
    fn candidate_pc(&mut self, target: usize) -> Result<Vec<usize>, StructureLearningError>;
    fn candidate_mb(&mut self, target: usize) -> Result<Vec<usize>, StructureLearningError>;
}

#[derive(Clone)]
struct Entry {
    set: Vec<usize>,
    symmetry_ok: bool,
}

/// Holds the PC and MB neighborhood caches for one learning run.
#[derive(Default)]
pub struct NeighborhoodCache {
    pc: HashMap<usize, Entry>,
    mb: HashMap<usize, Entry>,
}

impl NeighborhoodCache {
    pub fn new() -> NeighborhoodCache {
        NeighborhoodCache {
            pc: HashMap::new(),
            mb: HashMap::new(),
        }
    }

    /// Returns the cached candidate PC set for `target` (computing it via `source` if absent)
    /// and whether it has already been symmetry corrected.
    pub fn get_candidate_pc(
        &mut self,
        source: &mut impl CandidateSource,
        target: usize,
    ) -> Result<(Vec<usize>, bool), StructureLearningError> {
        Self::get_candidate(&mut self.pc, source, target, CandidateSource::candidate_pc)
    }

    pub fn get_candidate_mb(
        &mut self,
        source: &mut impl CandidateSource,
        target: usize,
    ) -> Result<(Vec<usize>, bool), StructureLearningError> {
        Self::get_candidate(&mut self.mb, source, target, CandidateSource::candidate_mb)
    }

    fn get_candidate<S: CandidateSource>(
        map: &mut HashMap<usize, Entry>,
        source: &mut S,
        target: usize,
        compute: fn(&mut S, usize) -> Result<Vec<usize>, StructureLearningError>,
    ) -> Result<(Vec<usize>, bool), StructureLearningError> {
        if let Some(entry) = map.get(&target) {
            return Ok((entry.set.clone(), entry.symmetry_ok));
        }
        let set = compute(source, target)?;
        map.insert(
            target,
            Entry {
                set: set.clone(),
                symmetry_ok: false,
            },
        );
        Ok((set, false))
    }

    /// The symmetry-corrected PC set: forces the cache entry, then (unless already corrected)
    /// removes every `y` from the candidate set whose own candidate PC does not contain
    /// `target`. The result and the corrected flag are persisted back into the cache entry, so
    /// correction runs at most once per target.
    pub fn get_pc(
        &mut self,
        source: &mut impl CandidateSource,
        target: usize,
    ) -> Result<Vec<usize>, StructureLearningError> {
        self.get_corrected(target, true, source)
    }

    pub fn get_mb(
        &mut self,
        source: &mut impl CandidateSource,
        target: usize,
    ) -> Result<Vec<usize>, StructureLearningError> {
        self.get_corrected(target, false, source)
    }

    fn get_corrected(
        &mut self,
        target: usize,
        is_pc: bool,
        source: &mut impl CandidateSource,
    ) -> Result<Vec<usize>, StructureLearningError> {
        let (set, ok) = if is_pc {
            self.get_candidate_pc(source, target)?
        } else {
            self.get_candidate_mb(source, target)?
        };
        if ok {
            return Ok(set);
        }
        let mut corrected = set.clone();
        for &y in &set {
            let (y_candidates, _) = if is_pc {
                self.get_candidate_pc(source, y)?
            } else {
                self.get_candidate_mb(source, y)?
            };
            if !y_candidates.contains(&target) {
                info!("removing {y} from neighborhood of {target} (asymmetry)");
                corrected.retain(|&v| v != y);
            }
        }
        let map = if is_pc { &mut self.pc } else { &mut self.mb };
        map.insert(
            target,
            Entry {
                set: corrected.clone(),
                symmetry_ok: true,
            },
        );
        Ok(corrected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        // candidate_pc(x) returns this row of a hand-built (possibly asymmetric) matrix
        pc: Vec<Vec<usize>>,
    }

    impl CandidateSource for Fixture {
        fn candidate_pc(&mut self, target: usize) -> Result<Vec<usize>, StructureLearningError> {
            Ok(self.pc[target].clone())
        }
        fn candidate_mb(&mut self, target: usize) -> Result<Vec<usize>, StructureLearningError> {
            Ok(self.pc[target].clone())
        }
    }

    #[test]
    fn symmetric_pair_survives_correction() {
        let mut src = Fixture {
            pc: vec![vec![1], vec![0]],
        };
        let mut cache = NeighborhoodCache::new();
        assert_eq!(cache.get_pc(&mut src, 0).unwrap(), vec![1]);
        assert_eq!(cache.get_pc(&mut src, 1).unwrap(), vec![0]);
    }

    #[test]
    fn asymmetric_entry_is_removed() {
        // 0 claims 1 as PC, but 1 does not claim 0 back.
        let mut src = Fixture {
            pc: vec![vec![1], vec![]],
        };
        let mut cache = NeighborhoodCache::new();
        assert_eq!(cache.get_pc(&mut src, 0).unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn correction_runs_once() {
        struct CountingFixture {
            calls: std::cell::RefCell<usize>,
        }
        impl CandidateSource for CountingFixture {
            fn candidate_pc(&mut self, _target: usize) -> Result<Vec<usize>, StructureLearningError> {
                *self.calls.borrow_mut() += 1;
                Ok(vec![])
            }
            fn candidate_mb(&mut self, target: usize) -> Result<Vec<usize>, StructureLearningError> {
                self.candidate_pc(target)
            }
        }
        let mut src = CountingFixture {
            calls: std::cell::RefCell::new(0),
        };
        let mut cache = NeighborhoodCache::new();
        cache.get_pc(&mut src, 0).unwrap();
        cache.get_pc(&mut src, 0).unwrap();
        assert_eq!(*src.calls.borrow(), 1);
    }
}
