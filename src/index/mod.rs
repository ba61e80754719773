//! Spatial index over normalized catalog features
//!
//! Selected numeric columns are min-max scaled into `[0, 1]` and indexed by
//! an exact k-d tree. The index, the catalog and the scaling parameters are
//! packaged together as a [`SearchEngineBundle`].

pub mod kdtree;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::bundle::SearchEngineBundle;
use crate::catalog::Catalog;
use crate::types::Column;
use crate::{Error, Result};

pub use kdtree::KdTree;

/// Per-column min-max scaling parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureScaler {
    pub min: Vec<f64>,
    /// `max - min`, with zero replaced by 1
    pub range: Vec<f64>,
}

impl FeatureScaler {
    /// Fit scaling parameters to the columns of `matrix`.
    pub fn fit(matrix: &[Vec<f64>], dimension: usize) -> Self {
        let mut min = vec![f64::INFINITY; dimension];
        let mut max = vec![f64::NEG_INFINITY; dimension];
        for row in matrix {
            for (j, &value) in row.iter().enumerate().take(dimension) {
                min[j] = min[j].min(value);
                max[j] = max[j].max(value);
            }
        }

        let range = min
            .iter()
            .zip(max.iter())
            .map(|(lo, hi)| {
                let range = hi - lo;
                if range == 0.0 || !range.is_finite() {
                    1.0
                } else {
                    range
                }
            })
            .collect();

        Self { min, range }
    }

    pub fn dimension(&self) -> usize {
        self.min.len()
    }

    pub fn scale(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(self.min.iter().zip(self.range.iter()))
            .map(|(v, (min, range))| (v - min) / range)
            .collect()
    }
}

/// Resolve configured feature names to numeric columns.
pub fn resolve_features<S: AsRef<str>>(feature_names: &[S]) -> Result<Vec<Column>> {
    if feature_names.is_empty() {
        return Err(Error::InvalidColumn("feature list is empty".to_string()));
    }

    let mut columns = Vec::with_capacity(feature_names.len());
    for name in feature_names {
        let column: Column = name.as_ref().parse()?;
        if !column.is_numeric() {
            return Err(Error::InvalidColumn(format!(
                "'{}' is not a numeric column",
                column
            )));
        }
        if columns.contains(&column) {
            return Err(Error::InvalidColumn(format!(
                "'{}' listed more than once",
                column
            )));
        }
        columns.push(column);
    }
    Ok(columns)
}

/// Build the normalized search bundle for `catalog`.
pub fn build_index<S: AsRef<str>>(catalog: Catalog, feature_names: &[S]) -> Result<SearchEngineBundle> {
    let features = resolve_features(feature_names)?;
    if catalog.is_empty() {
        return Err(Error::no_data("cannot index an empty catalog"));
    }

    let matrix: Vec<Vec<f64>> = catalog
        .rows()
        .iter()
        .map(|row| {
            features
                .iter()
                .map(|&c| row.numeric(c).unwrap_or(f64::NAN))
                .collect()
        })
        .collect();

    let scaler = FeatureScaler::fit(&matrix, features.len());
    let scaled: Vec<Vec<f64>> = matrix.iter().map(|row| scaler.scale(row)).collect();
    let index = KdTree::build(scaled)?;

    tracing::info!(
        rows = catalog.len(),
        dimension = features.len(),
        "Spatial index built"
    );

    Ok(SearchEngineBundle {
        index,
        catalog,
        feature_min: scaler.min,
        feature_range: scaler.range,
        feature_names: features.iter().map(|c| c.name().to_string()).collect(),
        built_at: Utc::now(),
    })
}
