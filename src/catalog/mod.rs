//! Catalog of aggregated (propeller, speed) rows
//!
//! The builder walks a performance-report tree, turning each file into
//! catalog rows. Files that fail to parse are skipped and reported in the
//! build diagnostics instead of aborting the build.

pub mod table;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::aggregate::aggregate;
use crate::report::ReportParser;
use crate::resolver::{IdentifierParser, NamingRule};
use crate::types::{AggregatedFeatureRow, Column};
use crate::{Error, Result};

pub use table::{CatalogReader, CatalogWriter};

/// Ordered collection of catalog rows
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Catalog {
    rows: Vec<AggregatedFeatureRow>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<AggregatedFeatureRow>) -> Self {
        Self { rows }
    }

    pub fn push(&mut self, row: AggregatedFeatureRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[AggregatedFeatureRow] {
        &self.rows
    }

    pub fn get(&self, position: usize) -> Option<&AggregatedFeatureRow> {
        self.rows.get(position)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sorted set of propeller types present in the catalog.
    pub fn prop_types(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|r| r.prop_type.as_str()).collect()
    }

    /// Speeds catalogued for one propeller, in catalog order.
    pub fn speeds_for(&self, prop_id: &str) -> Vec<u32> {
        self.rows
            .iter()
            .filter(|r| r.prop_id == prop_id)
            .map(|r| r.speed)
            .collect()
    }

    /// Rank reports by static thrust near a target power.
    ///
    /// Each source file contributes its static point whose required power is
    /// closest to `power_w` (the earlier row on ties). The `count` strongest
    /// of those are returned, highest thrust first.
    pub fn static_thrust_for_power(&self, power_w: f64, count: usize) -> Result<Vec<StaticThrustMatch>> {
        if !power_w.is_finite() || power_w < 0.0 {
            return Err(Error::InvalidQuery(format!(
                "power must be a non-negative number, got {}",
                power_w
            )));
        }
        if count == 0 {
            return Err(Error::InvalidQuery("count must be at least 1".to_string()));
        }

        let mut best: Vec<StaticThrustMatch> = Vec::new();
        let mut by_file: HashMap<&str, usize> = HashMap::new();
        for row in &self.rows {
            let (Some(power), Some(thrust)) = (row.static_power, row.static_thrust) else {
                continue;
            };
            let candidate = StaticThrustMatch {
                prop_id: row.prop_id.clone(),
                source_filename: row.source_filename.clone(),
                speed: row.speed,
                power,
                thrust,
            };
            match by_file.get(row.source_filename.as_str()) {
                Some(&slot) => {
                    if (power - power_w).abs() < (best[slot].power - power_w).abs() {
                        best[slot] = candidate;
                    }
                }
                None => {
                    by_file.insert(row.source_filename.as_str(), best.len());
                    best.push(candidate);
                }
            }
        }

        if best.is_empty() {
            return Err(Error::EmptyResult);
        }
        best.sort_by(|a, b| b.thrust.total_cmp(&a.thrust));
        best.truncate(count);
        Ok(best)
    }
}

/// Static operating point of one report, as ranked by
/// [`Catalog::static_thrust_for_power`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaticThrustMatch {
    pub prop_id: String,
    pub source_filename: String,
    pub speed: u32,
    /// Required power (W)
    pub power: f64,
    /// Static thrust (N)
    pub thrust: f64,
}

/// A corpus file left out of the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of a catalog build
#[derive(Debug, Clone, Default)]
pub struct CatalogBuild {
    pub catalog: Catalog,
    pub diagnostics: Vec<SkippedFile>,
    pub files_indexed: usize,
}

/// Builds a [`Catalog`] from a tree of performance reports
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    rule: NamingRule,
    identifiers: IdentifierParser,
    reports: ReportParser,
}

impl CatalogBuilder {
    pub fn new(rule: NamingRule) -> Result<Self> {
        let identifiers = IdentifierParser::new(&rule)?;
        Ok(Self {
            rule,
            identifiers,
            reports: ReportParser::new()?,
        })
    }

    /// Catalog every report under `corpus_root`.
    pub fn build(&self, corpus_root: &Path) -> Result<CatalogBuild> {
        tracing::info!(root = %corpus_root.display(), "Building propeller catalog");

        if !corpus_root.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("corpus root {} is not a directory", corpus_root.display()),
            )
            .into());
        }

        let mut build = CatalogBuild::default();
        let mut seen: HashSet<(String, u32)> = HashSet::new();

        for entry in WalkDir::new(corpus_root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(corpus_root).to_path_buf();
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable entry");
                    build.diagnostics.push(SkippedFile {
                        path,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                tracing::warn!(path = %path.display(), "Skipping file with non UTF-8 name");
                build.diagnostics.push(SkippedFile {
                    path: path.to_path_buf(),
                    reason: "file name is not valid UTF-8".to_string(),
                });
                continue;
            };
            if !filename.ends_with(&self.rule.suffix) {
                tracing::debug!(path = %path.display(), "Ignoring non-report file");
                continue;
            }

            let rows = match self.rows_for(path, filename) {
                Ok(rows) => rows,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping report");
                    build.diagnostics.push(SkippedFile {
                        path: path.to_path_buf(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if let Some(dup) = rows
                .iter()
                .find(|r| seen.contains(&(r.source_filename.clone(), r.speed)))
            {
                let reason = format!(
                    "duplicate catalog entry ({}, RPM {})",
                    dup.source_filename, dup.speed
                );
                tracing::warn!(path = %path.display(), %reason, "Skipping report");
                build.diagnostics.push(SkippedFile {
                    path: path.to_path_buf(),
                    reason,
                });
                continue;
            }

            for row in rows {
                seen.insert((row.source_filename.clone(), row.speed));
                build.catalog.push(row);
            }
            build.files_indexed += 1;
        }

        tracing::info!(
            files = build.files_indexed,
            rows = build.catalog.len(),
            skipped = build.diagnostics.len(),
            "Catalog built"
        );

        Ok(build)
    }

    fn rows_for(&self, path: &Path, filename: &str) -> Result<Vec<AggregatedFeatureRow>> {
        let identifier = self.identifiers.parse(filename)?;
        let report = self.reports.parse(path)?;
        let rows = aggregate(&identifier, filename, &report)?;

        for row in &rows {
            let bad = Column::ALL
                .into_iter()
                .find(|&c| row.numeric(c).is_some_and(|v| !v.is_finite()));
            if let Some(column) = bad {
                return Err(Error::format(format!(
                    "non-finite {} at RPM {}",
                    column, row.speed
                )));
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(prop_id: &str, prop_type: &str, speed: u32) -> AggregatedFeatureRow {
        AggregatedFeatureRow {
            prop_id: prop_id.to_string(),
            prop_type: prop_type.to_string(),
            source_filename: format!("PER3_{}.dat", prop_id),
            diameter: 10.0,
            pitch: 5.0,
            speed,
            max_thrust: 1.0,
            max_power: 1.0,
            max_torque: 1.0,
            max_figure_of_merit: 0.5,
            max_thrust_per_power: 10.0,
            advance_ratio_curve: vec![0.0],
            thrust_coeff_curve: vec![0.1],
            power_coeff_curve: vec![0.05],
            efficiency_curve: vec![0.0],
            static_power: None,
            static_thrust: None,
        }
    }

    fn with_static(mut row: AggregatedFeatureRow, power: f64, thrust: f64) -> AggregatedFeatureRow {
        row.static_power = Some(power);
        row.static_thrust = Some(thrust);
        row
    }

    #[test]
    fn test_catalog_helpers() {
        let catalog = Catalog::from_rows(vec![
            row("10x5E", "E", 1000),
            row("10x5E", "E", 2000),
            row("12x6MR", "MR", 1000),
        ]);

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.prop_types().into_iter().collect::<Vec<_>>(), vec!["E", "MR"]);
        assert_eq!(catalog.speeds_for("10x5E"), vec![1000, 2000]);
        assert!(catalog.speeds_for("9x6").is_empty());
        assert_eq!(catalog.get(2).map(|r| r.prop_id.as_str()), Some("12x6MR"));
    }

    #[test]
    fn test_static_thrust_for_power_ranking() {
        let catalog = Catalog::from_rows(vec![
            with_static(row("10x5E", "E", 1000), 10.0, 3.0),
            with_static(row("10x5E", "E", 2000), 40.0, 9.0),
            with_static(row("9x6", "Standard", 1000), 30.0, 7.0),
            row("11x7E", "E", 1000),
            with_static(row("12x6MR", "MR", 1000), 36.0, 8.0),
        ]);

        let top = catalog.static_thrust_for_power(35.0, 2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].prop_id, "10x5E");
        assert_eq!(top[0].speed, 2000);
        assert_eq!((top[0].power, top[0].thrust), (40.0, 9.0));
        assert_eq!(top[1].prop_id, "12x6MR");

        let all = catalog.static_thrust_for_power(35.0, 10).unwrap();
        let ids: Vec<&str> = all.iter().map(|m| m.prop_id.as_str()).collect();
        assert_eq!(ids, vec!["10x5E", "12x6MR", "9x6"]);

        let low = catalog.static_thrust_for_power(0.0, 10).unwrap();
        assert_eq!(low[0].prop_id, "12x6MR");
        assert_eq!(low.iter().find(|m| m.prop_id == "10x5E").map(|m| m.speed), Some(1000));
    }

    #[test]
    fn test_static_thrust_for_power_errors() {
        let catalog = Catalog::from_rows(vec![row("11x7E", "E", 1000)]);
        assert!(matches!(
            catalog.static_thrust_for_power(50.0, 3),
            Err(Error::EmptyResult)
        ));
        assert!(matches!(
            catalog.static_thrust_for_power(f64::INFINITY, 3),
            Err(Error::InvalidQuery(_))
        ));
        assert!(matches!(
            catalog.static_thrust_for_power(-1.0, 3),
            Err(Error::InvalidQuery(_))
        ));
        assert!(matches!(
            catalog.static_thrust_for_power(50.0, 0),
            Err(Error::InvalidQuery(_))
        ));
    }
}
