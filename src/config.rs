//! Configuration shared by every learning driver and the orienter.

use crate::error::StructureLearningError;

/// Selects which member of the algorithm family drives structure learning.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    Gs,
    Iamb,
    InterIamb,
    Mmpc,
    Hiton,
    SiHitonPc,
    GetPc,
    PcStable,
    PcStable2,
}

impl Algorithm {
    pub fn parse(name: &str) -> Option<Algorithm> {
        Some(match name {
            "gs" => Algorithm::Gs,
            "iamb" => Algorithm::Iamb,
            "inter.iamb" => Algorithm::InterIamb,
            "mmpc" => Algorithm::Mmpc,
            "hiton" => Algorithm::Hiton,
            "si.hiton.pc" => Algorithm::SiHitonPc,
            "getpc" => Algorithm::GetPc,
            "pc.stable" => Algorithm::PcStable,
            "pc.stable.2" => Algorithm::PcStable2,
            _ => return None,
        })
    }

    pub fn is_global(&self) -> bool {
        matches!(self, Algorithm::PcStable | Algorithm::PcStable2)
    }
}

/// The parameters shared by every learning driver, validated once at construction.
#[derive(Clone, Copy, Debug)]
pub struct LearnerConfig {
    pub algorithm: Algorithm,
    pub alpha: f64,
    pub max_conditioning: usize,
    pub imbalance_threshold: f64,
    pub direct_edges: bool,
    pub workers: usize,
}

impl LearnerConfig {
    /// `max_conditioning` defaults to `n - 2` when `None`.
    pub fn new(
        algorithm: Algorithm,
        alpha: f64,
        max_conditioning: Option<usize>,
        n: usize,
        direct_edges: bool,
        workers: usize,
    ) -> Result<LearnerConfig, StructureLearningError> {
        if !(0.0..=1.0).contains(&alpha) || alpha == 0.0 {
            return Err(StructureLearningError::Configuration(format!(
                "alpha must be in (0, 1], got {alpha}"
            )));
        }
        if workers == 0 {
            return Err(StructureLearningError::Configuration(
                "workers must be at least 1".into(),
            ));
        }
        let max_conditioning = max_conditioning.unwrap_or_else(|| n.saturating_sub(2));
        Ok(LearnerConfig {
            algorithm,
            alpha,
            max_conditioning,
            imbalance_threshold: f64::INFINITY,
            direct_edges,
            workers,
        })
    }

    pub fn with_imbalance_threshold(mut self, threshold: f64) -> LearnerConfig {
        self.imbalance_threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_max_conditioning_to_n_minus_2() {
        let cfg = LearnerConfig::new(Algorithm::Gs, 0.05, None, 10, true, 1).unwrap();
        assert_eq!(cfg.max_conditioning, 8);
    }

    #[test]
    fn rejects_zero_alpha() {
        assert!(LearnerConfig::new(Algorithm::Gs, 0.0, None, 10, true, 1).is_err());
    }

    #[test]
    fn parses_all_algorithm_names() {
        for name in [
            "gs",
            "iamb",
            "inter.iamb",
            "mmpc",
            "hiton",
            "si.hiton.pc",
            "getpc",
            "pc.stable",
            "pc.stable.2",
        ] {
            assert!(Algorithm::parse(name).is_some(), "{name} should parse");
        }
        assert!(Algorithm::parse("bogus").is_none());
    }
}
