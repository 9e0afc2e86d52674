//! Column-major categorical dataset: the substrate the CI oracle materializes
//! contingency tables from. Holds no counts itself — see [`crate::ci`].

use ndarray::{Array2, Axis};
use log::info;

use crate::error::DataError;

/// A normalized column-major categorical dataset: `n` variables, `m` observations each,
/// with each variable's states shifted to be dense in `[0, arity(v))`.
pub struct Dataset {
    /// `columns[[v, k]]` is the state of variable `v` in observation `k`.
    columns: Array2<u8>,
    arities: Vec<u8>,
    names: Vec<String>,
}

impl Dataset {
    /// Builds a dataset from raw column-major cells, normalizing each column so its minimum
    /// state is zero and rejecting columns that are not dense in `[0, arity)`.
    ///
    /// `raw` is `n` rows (one per variable) by `m` columns (one per observation).
    pub fn from_raw_columns(raw: Array2<u32>, names: Vec<String>) -> Result<Dataset, DataError> {
        let n = raw.shape()[0];
        let m = raw.shape()[1];
        if names.len() != n {
            return Err(DataError::NameCountMismatch {
                got: names.len(),
                expected: n,
            });
        }
        if n > u16::MAX as usize {
            return Err(DataError::TooManyVariables {
                n,
                capacity: u16::MAX as usize,
            });
        }
        if m > u32::MAX as usize {
            return Err(DataError::TooManyObservations {
                m,
                capacity: u32::MAX as usize,
            });
        }

        let mut columns = Array2::<u8>::zeros((n, m));
        let mut arities = Vec::with_capacity(n);
        for v in 0..n {
            let row = raw.index_axis(Axis(0), v);
            if row.len() != m {
                return Err(DataError::RowWidthMismatch {
                    var: v,
                    got: row.len(),
                    expected: m,
                });
            }
            let min = *row.iter().min().unwrap();
            let max = *row.iter().max().unwrap();
            let arity = (max - min + 1) as usize;
            if arity > u8::MAX as usize + 1 {
                return Err(DataError::ArityOverflow {
                    var: v,
                    arity,
                    capacity: u8::MAX as usize + 1,
                });
            }

            let mut seen = vec![false; arity];
            for (k, &cell) in row.iter().enumerate() {
                let shifted = (cell - min) as u8;
                seen[shifted as usize] = true;
                columns[[v, k]] = shifted;
            }
            if let Some(missing) = seen.iter().position(|&s| !s) {
                return Err(DataError::NonDenseColumn { var: v, missing });
            }
            arities.push(arity as u8);
        }

        info!("loaded dataset: n={n} variables, m={m} observations");
        Ok(Dataset {
            columns,
            arities,
            names,
        })
    }

    pub fn n(&self) -> usize {
        self.columns.shape()[0]
    }

    pub fn m(&self) -> usize {
        self.columns.shape()[1]
    }

    pub fn arity(&self, v: usize) -> u8 {
        self.arities[v]
    }

    pub fn arities(&self) -> &[u8] {
        &self.arities
    }

    pub fn name(&self, v: usize) -> &str {
        &self.names[v]
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn var_by_name(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// The observed states of variable `v` across all `m` observations.
    pub fn data_column(&self, v: usize) -> ndarray::ArrayView1<u8> {
        self.columns.index_axis(Axis(0), v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn normalizes_columns_to_zero_minimum() {
        let raw = array![[5, 6, 5, 7], [0, 1, 0, 1]];
        let ds = Dataset::from_raw_columns(raw, vec!["a".into(), "b".into()]).unwrap();
        assert_eq!(ds.arity(0), 3);
        assert_eq!(ds.arity(1), 2);
        assert_eq!(ds.data_column(0).to_vec(), vec![0, 1, 0, 2]);
    }

    #[test]
    fn rejects_non_dense_column() {
        let raw = array![[0, 2, 0, 2]];
        let err = Dataset::from_raw_columns(raw, vec!["a".into()]).unwrap_err();
        assert_eq!(
            err,
            DataError::NonDenseColumn {
                var: 0,
                missing: 1
            }
        );
    }

    #[test]
    fn rejects_name_count_mismatch() {
        let raw = array![[0, 1]];
        let err = Dataset::from_raw_columns(raw, vec![]).unwrap_err();
        assert_eq!(
            err,
            DataError::NameCountMismatch {
                got: 0,
                expected: 1
            }
        );
    }
}
