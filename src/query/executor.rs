//! Nearest-neighbor and constraint queries against a search bundle

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::{Constraints, Neighbor};
use crate::bundle::SearchEngineBundle;
use crate::catalog::StaticThrustMatch;
use crate::types::{AggregatedFeatureRow, Column};
use crate::{Error, Result};

/// Read-only query engine; cheap to clone
#[derive(Debug, Clone)]
pub struct QueryEngine {
    bundle: Arc<SearchEngineBundle>,
}

impl QueryEngine {
    pub fn new(bundle: SearchEngineBundle) -> Self {
        Self {
            bundle: Arc::new(bundle),
        }
    }

    pub fn from_shared(bundle: Arc<SearchEngineBundle>) -> Self {
        Self { bundle }
    }

    pub fn load(path: &Path) -> Result<Self> {
        Ok(Self::new(SearchEngineBundle::load(path)?))
    }

    pub fn bundle(&self) -> &SearchEngineBundle {
        &self.bundle
    }

    /// The `k` catalog rows closest to `query` in normalized feature space.
    ///
    /// `query` must name exactly the bundle's features (canonical names or
    /// aliases). Results are nearest first; equal distances keep catalog
    /// order.
    pub fn nearest(&self, query: &HashMap<String, f64>, k: usize) -> Result<Vec<Neighbor<'_>>> {
        if k == 0 {
            return Err(Error::InvalidQuery("k must be at least 1".to_string()));
        }

        let vector = self.feature_vector(query)?;
        let scaled = self.bundle.scaler().scale(&vector);

        let hits = self.bundle.index.nearest(&scaled, k)?;
        tracing::debug!(k, hits = hits.len(), "Nearest-neighbor query");

        hits.into_iter()
            .map(|(position, distance)| {
                let row = self.bundle.catalog.get(position).ok_or_else(|| {
                    Error::internal(format!("index position {} outside catalog", position))
                })?;
                Ok(Neighbor {
                    row,
                    position,
                    distance,
                })
            })
            .collect()
    }

    /// Order `query` values by the bundle's feature order.
    fn feature_vector(&self, query: &HashMap<String, f64>) -> Result<Vec<f64>> {
        let expected = &self.bundle.feature_names;
        let mismatch = || {
            let mut actual: Vec<String> = query.keys().cloned().collect();
            actual.sort();
            Error::Dimension {
                expected: expected.clone(),
                actual,
            }
        };

        let mut by_name: HashMap<&'static str, f64> = HashMap::with_capacity(query.len());
        for (key, &value) in query {
            let column: Column = key.parse().map_err(|_| mismatch())?;
            if by_name.insert(column.name(), value).is_some() {
                return Err(mismatch());
            }
        }
        if by_name.len() != expected.len() {
            return Err(mismatch());
        }

        expected
            .iter()
            .map(|name| {
                let value = *by_name.get(name.as_str()).ok_or_else(mismatch)?;
                if !value.is_finite() {
                    return Err(Error::InvalidQuery(format!(
                        "value for '{}' is not a finite number",
                        name
                    )));
                }
                Ok(value)
            })
            .collect()
    }

    /// Rows satisfying every constraint, sorted descending by `sort_by`.
    ///
    /// Rows with equal sort keys keep catalog order.
    pub fn filter(
        &self,
        constraints: &Constraints,
        sort_by: Column,
    ) -> Result<Vec<&AggregatedFeatureRow>> {
        if !sort_by.is_numeric() {
            return Err(Error::InvalidQuery(format!(
                "cannot sort by categorical column '{}'",
                sort_by
            )));
        }
        for (column, constraint) in constraints.iter() {
            if constraint.kind() != column.kind() {
                return Err(Error::InvalidQuery(format!(
                    "constraint kind {:?} does not apply to {:?} column '{}'",
                    constraint.kind(),
                    column.kind(),
                    column
                )));
            }
        }

        let mut rows: Vec<&AggregatedFeatureRow> = self
            .bundle
            .catalog
            .rows()
            .iter()
            .filter(|row| constraints.iter().all(|(c, k)| k.matches(c, row)))
            .collect();

        tracing::debug!(
            constraints = constraints.len(),
            matches = rows.len(),
            sort_by = %sort_by,
            "Filter query"
        );

        if rows.is_empty() {
            return Err(Error::EmptyResult);
        }

        let key = |row: &AggregatedFeatureRow| row.numeric(sort_by).unwrap_or(f64::NEG_INFINITY);
        rows.sort_by(|a, b| key(*b).total_cmp(&key(*a)));
        Ok(rows)
    }

    /// Propellers with the highest static thrust for a power budget, one
    /// entry per report. See [`Catalog::static_thrust_for_power`].
    ///
    /// [`Catalog::static_thrust_for_power`]: crate::catalog::Catalog::static_thrust_for_power
    pub fn static_thrust_for_power(&self, power_w: f64, count: usize) -> Result<Vec<StaticThrustMatch>> {
        let matches = self.bundle.catalog.static_thrust_for_power(power_w, count)?;
        tracing::debug!(power_w, count, matches = matches.len(), "Static thrust query");
        Ok(matches)
    }
}
