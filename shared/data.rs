//! # Delimited-Text Data Loading
//!
//! Reads a header-carrying table from disk and splits it into a feature matrix
//! and one or more target columns. The target columns are named explicitly;
//! every other column is a feature. Files ending in `.csv` are comma separated,
//! anything else is read as tab separated.
//!
//! Failures here are assumed to be user-input errors, and `DataError` names the
//! offending column and row wherever it can.

use crate::design::{DesignError, DesignMatrix};
use ndarray::{Array2, ShapeBuilder};
use sprs::TriMat;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Failed to read the delimited input: {0}")]
    Csv(#[from] csv::Error),

    #[error(
        "The target column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),

    #[error("At least one target column must be named.")]
    NoTargets,

    #[error("The input file has no feature columns besides the targets.")]
    NoFeatures,

    #[error("The input file contains a header but no data rows.")]
    NoRows,

    #[error("Could not parse '{value}' in column '{column}' (data row {row}) as a number.")]
    NotNumeric {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Non-finite value in column '{column}' (data row {row}). All data must be finite.")]
    NonFinite { column: String, row: usize },

    #[error("Failed to assemble the loaded values into a matrix: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

/// A loaded table, split into features and targets.
#[derive(Debug)]
pub struct LoadedTable {
    /// Shape `[n_samples, n_features]`, column-major.
    pub features: Array2<f64>,
    /// Shape `[n_samples, n_targets]`, in the order the targets were requested.
    pub targets: Array2<f64>,
    pub feature_names: Vec<String>,
    pub target_names: Vec<String>,
}

impl LoadedTable {
    /// Builds the design matrix in the requested storage.
    /// Sparse storage keeps only the non-zero cells.
    pub fn design(&self, sparse: bool) -> Result<DesignMatrix, DesignError> {
        if !sparse {
            return DesignMatrix::dense(self.features.clone());
        }
        let mut triplets = TriMat::new(self.features.dim());
        for ((i, j), &value) in self.features.indexed_iter() {
            if value != 0.0 {
                triplets.add_triplet(i, j, value);
            }
        }
        DesignMatrix::sparse(triplets.to_csc())
    }
}

pub fn load_table(path: &Path, target_columns: &[String]) -> Result<LoadedTable, DataError> {
    if target_columns.is_empty() {
        return Err(DataError::NoTargets);
    }
    let delimiter = match path.extension().and_then(|ext| ext.to_str()) {
        Some("csv") => b',',
        _ => b'\t',
    };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut target_indices = Vec::with_capacity(target_columns.len());
    for name in target_columns {
        let index = headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| DataError::ColumnNotFound(name.clone()))?;
        target_indices.push(index);
    }
    let feature_indices: Vec<usize> = (0..headers.len())
        .filter(|i| !target_indices.contains(i))
        .collect();
    if feature_indices.is_empty() {
        return Err(DataError::NoFeatures);
    }

    let mut feature_values = Vec::new();
    let mut target_values = Vec::new();
    let mut n_rows = 0;
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        for &index in &feature_indices {
            feature_values.push(parse_cell(&record, index, &headers, row)?);
        }
        for &index in &target_indices {
            target_values.push(parse_cell(&record, index, &headers, row)?);
        }
        n_rows += 1;
    }
    if n_rows == 0 {
        return Err(DataError::NoRows);
    }

    let row_major = Array2::from_shape_vec((n_rows, feature_indices.len()), feature_values)?;
    let mut features = Array2::zeros(row_major.raw_dim().f());
    features.assign(&row_major);
    let targets = Array2::from_shape_vec((n_rows, target_indices.len()), target_values)?;

    log::info!(
        "Loaded {} rows with {} features and {} target column(s) from {}",
        n_rows,
        feature_indices.len(),
        target_indices.len(),
        path.display()
    );

    Ok(LoadedTable {
        features,
        targets,
        feature_names: feature_indices.iter().map(|&i| headers[i].clone()).collect(),
        target_names: target_columns.to_vec(),
    })
}

fn parse_cell(
    record: &csv::StringRecord,
    index: usize,
    headers: &[String],
    row: usize,
) -> Result<f64, DataError> {
    let raw = record.get(index).unwrap_or("");
    let value: f64 = raw.parse().map_err(|_| DataError::NotNumeric {
        column: headers[index].clone(),
        row: row + 1,
        value: raw.to_string(),
    })?;
    if !value.is_finite() {
        return Err(DataError::NonFinite {
            column: headers[index].clone(),
            row: row + 1,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::{self, Write};
    use tempfile::Builder;

    fn create_test_file(content: &str, suffix: &str) -> io::Result<tempfile::NamedTempFile> {
        let mut file = Builder::new().suffix(suffix).tempfile()?;
        writeln!(file, "{}", content)?;
        file.flush()?;
        Ok(file)
    }

    #[test]
    fn splits_targets_from_features() {
        let content = "a\ty\tb\n1.0\t-1\t0.0\n2.0\t1\t3.5\n0.0\t1\t0.0";
        let file = create_test_file(content, ".tsv").unwrap();
        let table = load_table(file.path(), &["y".to_string()]).unwrap();

        assert_eq!(table.features.shape(), &[3, 2]);
        assert_eq!(table.targets.shape(), &[3, 1]);
        assert_eq!(table.feature_names, vec!["a", "b"]);
        assert_abs_diff_eq!(table.features[[1, 1]], 3.5, epsilon = 1e-12);
        assert_abs_diff_eq!(table.targets[[0, 0]], -1.0, epsilon = 1e-12);

        let sparse = table.design(true).unwrap();
        assert!(sparse.is_sparse());
        assert_eq!(sparse.n_features(), 2);
    }

    #[test]
    fn comma_separated_by_extension() {
        let content = "y1,x,y2\n1,2,3\n4,5,6";
        let file = create_test_file(content, ".csv").unwrap();
        let table = load_table(file.path(), &["y2".to_string(), "y1".to_string()]).unwrap();
        assert_eq!(table.targets.row(0).to_vec(), vec![3.0, 1.0]);
        assert_eq!(table.features.column(0).to_vec(), vec![2.0, 5.0]);
    }

    #[test]
    fn reports_missing_column() {
        let file = create_test_file("a\tb\n1\t2", ".tsv").unwrap();
        match load_table(file.path(), &["y".to_string()]).unwrap_err() {
            DataError::ColumnNotFound(col) => assert_eq!(col, "y"),
            other => panic!("Expected ColumnNotFound(y), got {:?}", other),
        }
    }

    #[test]
    fn reports_non_numeric_and_non_finite_cells() {
        let file = create_test_file("a\ty\nfoo\t1", ".tsv").unwrap();
        match load_table(file.path(), &["y".to_string()]).unwrap_err() {
            DataError::NotNumeric { column, row, .. } => {
                assert_eq!(column, "a");
                assert_eq!(row, 1);
            }
            other => panic!("Expected NotNumeric, got {:?}", other),
        }

        let file = create_test_file("a\ty\n1\t1\n2\tinf", ".tsv").unwrap();
        match load_table(file.path(), &["y".to_string()]).unwrap_err() {
            DataError::NonFinite { column, row } => {
                assert_eq!(column, "y");
                assert_eq!(row, 2);
            }
            other => panic!("Expected NonFinite, got {:?}", other),
        }
    }

    #[test]
    fn header_only_file_has_no_rows() {
        let file = create_test_file("a\ty", ".tsv").unwrap();
        assert!(matches!(
            load_table(file.path(), &["y".to_string()]),
            Err(DataError::NoRows)
        ));
    }
}
