//! Index build driven by an [`AppConfig`]
//!
//! The build report and the catalog file are written before indexing, so
//! the per-file diagnostics are on disk even when the index step fails.

use anyhow::{Context, Result};

use crate::bundle::BuildReport;
use crate::catalog::{CatalogBuilder, CatalogWriter};
use crate::config::AppConfig;
use crate::index::build_index;

/// Catalog the performance corpus, then write the report, catalog and bundle.
pub fn run(config: &AppConfig) -> Result<BuildReport> {
    let root = &config.corpus.performance_root;
    tracing::info!(root = %root.display(), "Starting propfinder build");

    let builder = CatalogBuilder::new(config.corpus.performance_rule.clone())
        .context("failed to compile naming rule")?;
    let build = builder
        .build(root)
        .with_context(|| format!("failed to scan {}", root.display()))?;

    let report = BuildReport::new(build.files_indexed, build.catalog.len(), build.diagnostics);
    let report_path = config.report_path();
    report
        .write_to_path(&report_path)
        .with_context(|| format!("failed to write build report to {}", report_path.display()))?;

    let catalog_path = config.catalog_path();
    CatalogWriter::new()
        .write_to_path(&build.catalog, &catalog_path)
        .with_context(|| format!("failed to write catalog to {}", catalog_path.display()))?;

    let bundle = build_index(build.catalog, &config.index.features)
        .context("failed to build spatial index")?;

    let bundle_path = config.bundle_path();
    bundle
        .save(&bundle_path)
        .with_context(|| format!("failed to write bundle to {}", bundle_path.display()))?;

    tracing::info!(
        files = report.files_indexed,
        rows = report.rows,
        skipped = report.skipped.len(),
        bundle = %bundle_path.display(),
        "Build complete"
    );

    Ok(report)
}
