//! Per-speed feature aggregation

use crate::report::ParsedReport;
use crate::types::{AggregatedFeatureRow, PerformanceRecord, PropellerIdentifier, SpeedBlock};
use crate::{Error, Result};

/// Reduce every speed block of a report to one catalog row.
///
/// Rows follow block order; curves keep the source row order. The static
/// point is the first zero-velocity row of the block.
pub fn aggregate(
    identifier: &PropellerIdentifier,
    source_filename: &str,
    report: &ParsedReport,
) -> Result<Vec<AggregatedFeatureRow>> {
    report
        .blocks
        .iter()
        .map(|block| aggregate_block(identifier, source_filename, block))
        .collect()
}

fn aggregate_block(
    identifier: &PropellerIdentifier,
    source_filename: &str,
    block: &SpeedBlock,
) -> Result<AggregatedFeatureRow> {
    if block.records.is_empty() {
        return Err(Error::internal(format!(
            "speed block {} of {} has no rows",
            block.speed, source_filename
        )));
    }

    let records = &block.records;
    let curve = |f: fn(&PerformanceRecord) -> f64| records.iter().map(f).collect::<Vec<_>>();
    let static_point = records.iter().find(|r| r.is_static());

    Ok(AggregatedFeatureRow {
        prop_id: identifier.canonical_id.clone(),
        prop_type: identifier.type_code.clone(),
        source_filename: source_filename.to_string(),
        diameter: identifier.diameter,
        pitch: identifier.pitch,
        speed: block.speed,
        max_thrust: column_max(records, |r| r.thrust_force),
        max_power: column_max(records, |r| r.power_required),
        max_torque: column_max(records, |r| r.torque),
        max_figure_of_merit: column_max(records, |r| r.figure_of_merit),
        max_thrust_per_power: column_max(records, |r| r.thrust_per_power),
        advance_ratio_curve: curve(|r| r.advance_ratio),
        thrust_coeff_curve: curve(|r| r.thrust_coeff),
        power_coeff_curve: curve(|r| r.power_coeff),
        efficiency_curve: curve(|r| r.propulsive_efficiency),
        static_power: static_point.map(|r| r.power_required),
        static_thrust: static_point.map(|r| r.thrust_force),
    })
}

fn column_max(records: &[PerformanceRecord], f: impl Fn(&PerformanceRecord) -> f64) -> f64 {
    records.iter().map(f).fold(f64::NEG_INFINITY, f64::max)
}
