//! The CI oracle: answers "X ⟂ Y | Z" queries from the [`crate::data::Dataset`] via the
//! G² statistic and a χ² p-value, plus the compound predicates the learning drivers build on.

use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::data::Dataset;
use crate::error::CiError;
use crate::varset::subsets_of;

/// Result of a single conditional-independence test.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CiResult {
    pub df: u32,
    pub g_squared: f64,
}

impl CiResult {
    /// `1 - CDF(chi2_df at g_squared)`, with the `g² == 0 ⇒ pv = 1.0` shortcut so the CDF is
    /// never evaluated at the degenerate df=0 point.
    pub fn p_value(&self) -> f64 {
        if self.g_squared == 0.0 {
            return 1.0;
        }
        let chi2 = ChiSquared::new(self.df as f64).expect("df > 0 whenever g_squared != 0");
        1.0 - chi2.cdf(self.g_squared)
    }
}

/// Single-threaded conditional-independence oracle over one [`Dataset`].
///
/// Scratch buffers (`cc`, `cx`, `cy`, `cz`) are grown monotonically and reused across queries
/// rather than reallocated each time; the oracle owns them directly since it is not shared
/// across threads (each parallel worker constructs its own, see [`crate::distributed`]).
pub struct CiOracle<'a> {
    dataset: &'a Dataset,
    alpha: f64,
    cc: Vec<u64>,
    cx: Vec<u64>,
    cy: Vec<u64>,
    cz: Vec<u64>,
}

impl<'a> CiOracle<'a> {
    pub fn new(dataset: &'a Dataset, alpha: f64) -> CiOracle<'a> {
        CiOracle {
            dataset,
            alpha,
            cc: Vec::new(),
            cx: Vec::new(),
            cy: Vec::new(),
            cz: Vec::new(),
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn n(&self) -> usize {
        self.dataset.n()
    }

    pub fn indep(&self, pv: f64) -> bool {
        pv > self.alpha
    }

    fn allocate(buf: &mut Vec<u64>, required: usize) {
        if buf.len() < required {
            let grown = required.max(buf.len() * 2);
            buf.clear();
            buf.resize(grown, 0);
        } else {
            buf[..required].iter_mut().for_each(|c| *c = 0);
        }
    }

    /// Full (df, g²) query for `X ⟂ Y | Z`. `z` need not be sorted or deduplicated by the
    /// caller; callers typically pass a `VarSet`'s iterator collected into a slice.
    pub fn query(&mut self, x: usize, y: usize, z: &[usize]) -> Result<CiResult, CiError> {
        let n = self.dataset.n();
        if x >= n {
            return Err(CiError::VariableOutOfRange { index: x, n });
        }
        if y >= n {
            return Err(CiError::VariableOutOfRange { index: y, n });
        }
        for &zv in z {
            if zv >= n {
                return Err(CiError::VariableOutOfRange { index: zv, n });
            }
        }

        let r_x = self.dataset.arity(x) as usize;
        let r_y = self.dataset.arity(y) as usize;
        let r_z_each: Vec<usize> = z.iter().map(|&v| self.dataset.arity(v) as usize).collect();
        let r_z: usize = r_z_each.iter().product();

        let df_u64 = ((r_x - 1) as u64) * ((r_y - 1) as u64) * (r_z as u64);
        let df = u32::try_from(df_u64).map_err(|_| CiError::DegreesOfFreedomOverflow { df: df_u64 })?;

        let m = self.dataset.m();
        let x_col = self.dataset.data_column(x);
        let y_col = self.dataset.data_column(y);
        let z_cols: Vec<_> = z.iter().map(|&v| self.dataset.data_column(v)).collect();

        // Mixed-radix encoding of the conditioning tuple: zz[k] in [0, r_z).
        let mut zz = vec![0usize; m];
        if !z.is_empty() {
            let mut stride = 1usize;
            for (zi, col) in z_cols.iter().enumerate() {
                for k in 0..m {
                    zz[k] += col[k] as usize * stride;
                }
                stride *= r_z_each[zi];
            }
        }

        Self::allocate(&mut self.cc, r_z * r_x * r_y);
        Self::allocate(&mut self.cx, r_z * r_x);
        Self::allocate(&mut self.cy, r_z * r_y);
        Self::allocate(&mut self.cz, r_z);

        for k in 0..m {
            let idx = zz[k] * r_x * r_y + x_col[k] as usize * r_y + y_col[k] as usize;
            self.cc[idx] += 1;
        }

        for zv in 0..r_z {
            let mut total = 0u64;
            for a in 0..r_x {
                let mut row_sum = 0u64;
                for b in 0..r_y {
                    row_sum += self.cc[zv * r_x * r_y + a * r_y + b];
                }
                self.cx[zv * r_x + a] = row_sum;
                total += row_sum;
            }
            self.cz[zv] = total;
            for b in 0..r_y {
                let mut col_sum = 0u64;
                for a in 0..r_x {
                    col_sum += self.cc[zv * r_x * r_y + a * r_y + b];
                }
                self.cy[zv * r_y + b] = col_sum;
            }
        }

        let mut g_squared = 0.0f64;
        for zv in 0..r_z {
            let cz = self.cz[zv];
            if cz == 0 {
                continue;
            }
            for a in 0..r_x {
                let cx = self.cx[zv * r_x + a];
                if cx == 0 {
                    continue;
                }
                for b in 0..r_y {
                    let cy = self.cy[zv * r_y + b];
                    let n_zab = self.cc[zv * r_x * r_y + a * r_y + b];
                    if n_zab == 0 || cy == 0 {
                        continue;
                    }
                    // Any product of three observation counts (n_zab * cx * cy, or here the
                    // equivalent n_zab * cz versus cx * cy) can exceed u32 range; every factor
                    // here is carried in u64 to avoid that overflow.
                    let lhs = n_zab * cz;
                    let rhs = cx * cy;
                    if lhs == rhs {
                        continue;
                    }
                    let observed = n_zab as f64;
                    let expected = (cx as f64) * (cy as f64) / (cz as f64);
                    g_squared += observed * (observed / expected).ln();
                }
            }
        }
        g_squared *= 2.0;

        Ok(CiResult { df, g_squared })
    }

    pub fn p_value(&mut self, x: usize, y: usize, z: &[usize]) -> Result<f64, CiError> {
        Ok(self.query(x, y, z)?.p_value())
    }

    pub fn assoc_score(&mut self, x: usize, y: usize, z: &[usize]) -> Result<f64, CiError> {
        Ok(1.0 - self.p_value(x, y, z)?)
    }

    pub fn is_independent(&mut self, x: usize, y: usize, z: &[usize]) -> Result<bool, CiError> {
        let pv = self.p_value(x, y, z)?;
        Ok(self.indep(pv))
    }

    /// Minimum p-value over all subsets of `given` of size `0..=min(given.len(), max_size)`,
    /// enumerated in cardinality order with the witness subset that attained it. Exits as soon
    /// as the running minimum falls at-or-below `alpha` — a dependency witness has been found
    /// and a smaller p-value cannot make the pair any less independent.
    pub fn min_pvalue_subset(
        &mut self,
        x: usize,
        y: usize,
        given: &[usize],
        max_size: usize,
    ) -> Result<(f64, Vec<usize>), CiError> {
        self.min_pvalue_subset_seeded(x, y, given, &[], max_size)
    }

    /// Same as [`Self::min_pvalue_subset`], but `seed` is unioned into every tested subset.
    pub fn min_pvalue_subset_seeded(
        &mut self,
        x: usize,
        y: usize,
        given: &[usize],
        seed: &[usize],
        max_size: usize,
    ) -> Result<(f64, Vec<usize>), CiError> {
        let cap = max_size.min(given.len());
        let mut best_pv = f64::INFINITY;
        let mut best_z: Vec<usize> = seed.to_vec();
        for k in 0..=cap {
            for subset in subsets_of(given.to_vec(), k) {
                let mut z = seed.to_vec();
                z.extend(subset.iter().copied());
                let pv = self.p_value(x, y, &z)?;
                if pv < best_pv {
                    best_pv = pv;
                    best_z = z;
                }
                if best_pv <= self.alpha {
                    return Ok((best_pv, best_z));
                }
            }
        }
        Ok((best_pv, best_z))
    }

    /// Maximum p-value over subsets of `given` with exactly `size` elements, with the
    /// maximizing subset. Used by the global family's per-round edge checks, which test a fixed
    /// conditioning-set size each round rather than a cumulative range: the subset that makes a
    /// pair look *most* independent is the one reported as the d-separating witness.
    pub fn max_pvalue_subset_exact_size(
        &mut self,
        x: usize,
        y: usize,
        given: &[usize],
        size: usize,
    ) -> Result<(f64, Vec<usize>), CiError> {
        let mut best_pv = f64::NEG_INFINITY;
        let mut best_z: Vec<usize> = Vec::new();
        for subset in subsets_of(given.to_vec(), size) {
            let pv = self.p_value(x, y, &subset)?;
            if pv > best_pv {
                best_pv = pv;
                best_z = subset;
            }
        }
        Ok((best_pv, best_z))
    }

    /// True iff some subset of `given` (cardinality-ordered, capped at `max_size`) witnesses
    /// independence; exits at the first such witness.
    pub fn indep_any_subset(
        &mut self,
        x: usize,
        y: usize,
        given: &[usize],
        max_size: usize,
    ) -> Result<bool, CiError> {
        self.indep_any_subset_seeded(x, y, given, &[], max_size)
    }

    pub fn indep_any_subset_seeded(
        &mut self,
        x: usize,
        y: usize,
        given: &[usize],
        seed: &[usize],
        max_size: usize,
    ) -> Result<bool, CiError> {
        let (pv, _) = self.best_pvalue_any_subset_seeded(x, y, given, seed, max_size)?;
        Ok(self.indep(pv))
    }

    /// The p-value of the first subset of `given` (cardinality-ordered, `seed` unioned into
    /// every tested subset) that witnesses independence, or — if no subset does — the largest
    /// p-value seen over the full scan. This is the same scan `indep_any_subset` runs; exposing
    /// the p-value alongside the verdict lets the orienter rank candidate v-structures by it
    /// without a second pass over the same subsets.
    pub fn best_pvalue_any_subset_seeded(
        &mut self,
        x: usize,
        y: usize,
        given: &[usize],
        seed: &[usize],
        max_size: usize,
    ) -> Result<(f64, Vec<usize>), CiError> {
        let cap = max_size.min(given.len());
        let mut best_pv = f64::NEG_INFINITY;
        let mut best_z: Vec<usize> = seed.to_vec();
        for k in 0..=cap {
            for subset in subsets_of(given.to_vec(), k) {
                let mut z = seed.to_vec();
                z.extend(subset.iter().copied());
                let pv = self.p_value(x, y, &z)?;
                if pv > best_pv {
                    best_pv = pv;
                    best_z = z.clone();
                }
                if self.indep(pv) {
                    return Ok((pv, z));
                }
            }
        }
        Ok((best_pv, best_z))
    }
}
