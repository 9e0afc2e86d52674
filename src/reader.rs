//! A small delimited-text dataset reader behind a [`DatasetReader`] trait: a fixed-width
//! whitespace/comma/tab-separated integer grid with an optional header row and index column,
//! rather than a full CSV-dialect parser.

use std::fs;
use std::path::Path;

use ndarray::Array2;

use crate::error::LearnError;

/// How a delimited-text dataset file is laid out: separator character, whether the first row
/// carries variable names, whether the first column carries row indices to discard, and whether
/// rows are variables (`col_obs`) rather than the default rows-are-observations.
#[derive(Clone, Copy, Debug)]
pub struct ReaderLayout {
    pub separator: char,
    pub var_names: bool,
    pub obs_indices: bool,
    pub col_obs: bool,
}

impl Default for ReaderLayout {
    fn default() -> ReaderLayout {
        ReaderLayout {
            separator: ' ',
            var_names: false,
            obs_indices: false,
            col_obs: false,
        }
    }
}

/// Anything that can produce a `(raw column-major cells, variable names)` pair from a path.
pub trait DatasetReader {
    fn read(&self, path: &Path, n: usize, m: usize) -> Result<(Array2<u32>, Vec<String>), LearnError>;
}

/// Reads a plain-text grid of small non-negative integers, one cell per field, `--separator`
/// configurable and an optional header row / index column per [`ReaderLayout`].
pub struct DelimitedTextReader {
    pub layout: ReaderLayout,
}

impl DelimitedTextReader {
    pub fn new(layout: ReaderLayout) -> DelimitedTextReader {
        DelimitedTextReader { layout }
    }

    fn split_line<'l>(&self, line: &'l str) -> Vec<&'l str> {
        if self.layout.separator == ' ' {
            line.split_whitespace().collect()
        } else {
            line.split(self.layout.separator).map(str::trim).collect()
        }
    }

    fn unquote(field: &str) -> String {
        let trimmed = field.trim();
        trimmed
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .unwrap_or(trimmed)
            .to_string()
    }
}

impl DatasetReader for DelimitedTextReader {
    fn read(&self, path: &Path, n: usize, m: usize) -> Result<(Array2<u32>, Vec<String>), LearnError> {
        if !path.exists() {
            return Err(LearnError::Configuration(format!(
                "dataset file not found: {}",
                path.display()
            )));
        }
        let contents = fs::read_to_string(path)?;
        let mut lines = contents.lines().filter(|l| !l.trim().is_empty());

        let (major, minor) = if self.layout.col_obs { (n, m) } else { (m, n) };

        let names = if self.layout.var_names {
            let header = lines
                .next()
                .ok_or_else(|| LearnError::Format("dataset file is empty, expected a header row".into()))?;
            let mut fields = self.split_line(header);
            if self.layout.obs_indices && !self.layout.col_obs {
                if fields.is_empty() {
                    return Err(LearnError::Format("header row is empty".into()));
                }
                fields.remove(0);
            }
            if fields.len() != n {
                return Err(LearnError::Format(format!(
                    "header has {} variable names, expected {n}",
                    fields.len()
                )));
            }
            fields.into_iter().map(Self::unquote).collect::<Vec<_>>()
        } else {
            (0..n).map(|v| format!("V{v}")).collect()
        };

        // `raw` is always stored (n variables) x (m observations), regardless of the file's own
        // row/column orientation; `major`/`minor` above says which file axis is which.
        let mut raw = Array2::<u32>::zeros((n, m));
        let mut rows_seen = 0usize;
        for line in lines {
            if rows_seen >= major {
                break;
            }
            let mut fields = self.split_line(line);
            if self.layout.obs_indices && !self.layout.col_obs {
                if fields.is_empty() {
                    return Err(LearnError::Format(format!("row {rows_seen} is empty")));
                }
                fields.remove(0);
            }
            if fields.len() != minor {
                return Err(LearnError::Format(format!(
                    "row {rows_seen} has {} cells, expected {minor}",
                    fields.len()
                )));
            }
            for (k, field) in fields.iter().enumerate() {
                let value: u32 = field.trim().parse().map_err(|_| {
                    LearnError::Format(format!("cell ({rows_seen}, {k}) is not an integer: {field:?}"))
                })?;
                if self.layout.col_obs {
                    raw[[rows_seen, k]] = value;
                } else {
                    raw[[k, rows_seen]] = value;
                }
            }
            rows_seen += 1;
        }
        if rows_seen < major {
            return Err(LearnError::Format(format!(
                "dataset file has {rows_seen} rows, expected {major}"
            )));
        }

        Ok((raw, names))
    }
}
