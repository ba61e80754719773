//! Performance report parsing
//!
//! A report is free text with one table per rotational speed:
//!
//! ```text
//!          PROP RPM =     1000
//!
//!   V          J           Pe          Ct   ...   FOM
//!  (mph)      (Adv_Ratio)  -           -    ...   -
//!   0.00      0.0000      0.0000      0.1226 ... 0.6337
//!   ...
//! ```
//!
//! Lines are scanned with an explicit state machine. Only rows with exactly
//! [`PerformanceRecord::COLUMN_COUNT`] numeric tokens inside a table are kept;
//! titles, footnotes and blank lines are skipped.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::types::{PerformanceRecord, SpeedBlock, SEA_LEVEL_DENSITY};
use crate::{Error, Result};

const SPEED_MARKER: &str = r"PROP RPM =\s+(\d+)";
const TABLE_HEADER: &str = r"^\s*V\s+J\s+Pe\s+Ct";

/// Position of the scanner relative to the tables of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// Before the first speed marker
    ScanningForBlock,
    /// Marker seen, waiting for the column header
    ScanningForHeader { speed: u32 },
    /// Header seen, next line is the units row
    SkippingUnits { speed: u32 },
    /// Inside a table
    ReadingRows { speed: u32 },
}

/// Thrust over forward velocity at one rotational speed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThrustCurve {
    pub speed: u32,
    /// `(velocity m/s, thrust N)` in source row order
    pub points: Vec<(f64, f64)>,
}

/// All speed blocks of one report, in file order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedReport {
    pub blocks: Vec<SpeedBlock>,
}

impl ParsedReport {
    /// Speeds present in the report, in file order.
    pub fn speeds(&self) -> Vec<u32> {
        self.blocks.iter().map(|b| b.speed).collect()
    }

    /// Total number of table rows across all blocks.
    pub fn row_count(&self) -> usize {
        self.blocks.iter().map(|b| b.records.len()).sum()
    }

    pub fn block(&self, speed: u32) -> Result<&SpeedBlock> {
        self.blocks
            .iter()
            .find(|b| b.speed == speed)
            .ok_or_else(|| {
                Error::format(format!(
                    "RPM {} not present in data range. Available RPM: {:?}",
                    speed,
                    self.speeds()
                ))
            })
    }

    /// Static (zero forward velocity) row whose required power is closest to
    /// `power_w`. Earlier blocks win ties.
    pub fn closest_static_point(&self, power_w: f64) -> Option<&PerformanceRecord> {
        self.blocks
            .iter()
            .flat_map(|b| b.records.iter())
            .filter(|r| r.is_static())
            .fold(None, |best: Option<&PerformanceRecord>, r| match best {
                Some(b) if (b.power_required - power_w).abs() <= (r.power_required - power_w).abs() => {
                    Some(b)
                }
                _ => Some(r),
            })
    }

    /// `(velocity m/s, thrust N)` pairs of one block, with thrust scaled from
    /// sea-level density to `air_density`.
    pub fn dynamic_thrust(&self, speed: u32, air_density: f64) -> Result<Vec<(f64, f64)>> {
        if air_density.is_nan() || air_density <= 0.0 {
            return Err(Error::InvalidQuery(format!(
                "air density must be positive, got {}",
                air_density
            )));
        }
        let ratio = air_density / SEA_LEVEL_DENSITY;
        Ok(self
            .block(speed)?
            .records
            .iter()
            .map(|r| (r.velocity_ms(), r.thrust_force * ratio))
            .collect())
    }

    /// Dynamic thrust curve at the speed whose static point draws the power
    /// closest to `power_w`.
    pub fn dynamic_thrust_for_power(&self, power_w: f64, air_density: f64) -> Result<ThrustCurve> {
        if !power_w.is_finite() || power_w < 0.0 {
            return Err(Error::InvalidQuery(format!(
                "power must be a non-negative number, got {}",
                power_w
            )));
        }
        let speed = self
            .closest_static_point(power_w)
            .map(|r| r.speed)
            .ok_or_else(|| Error::no_data("report has no static rows"))?;

        Ok(ThrustCurve {
            speed,
            points: self.dynamic_thrust(speed, air_density)?,
        })
    }
}

/// Line-oriented parser for performance reports
#[derive(Debug, Clone)]
pub struct ReportParser {
    speed_marker: Regex,
    table_header: Regex,
}

impl ReportParser {
    pub fn new() -> Result<Self> {
        let speed_marker = Regex::new(SPEED_MARKER)
            .map_err(|e| Error::internal(format!("Invalid speed marker pattern: {}", e)))?;
        let table_header = Regex::new(TABLE_HEADER)
            .map_err(|e| Error::internal(format!("Invalid table header pattern: {}", e)))?;
        Ok(Self {
            speed_marker,
            table_header,
        })
    }

    /// Read and parse a report file.
    pub fn parse(&self, path: &Path) -> Result<ParsedReport> {
        let text = std::fs::read_to_string(path)?;
        self.parse_str(&text).map_err(|e| match e {
            Error::NoData(_) => Error::no_data(path.display().to_string()),
            Error::Format(msg) => Error::format(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Parse report text.
    pub fn parse_str(&self, text: &str) -> Result<ParsedReport> {
        let mut state = ScanState::ScanningForBlock;
        let mut blocks: Vec<SpeedBlock> = Vec::new();

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();

            if let Some(speed) = self.speed_of(line, line_no)? {
                if blocks.iter().any(|b| b.speed == speed) {
                    return Err(Error::format(format!(
                        "duplicate block for RPM {} at line {}",
                        speed,
                        line_no + 1
                    )));
                }
                blocks.push(SpeedBlock {
                    speed,
                    records: Vec::new(),
                });
                state = ScanState::ScanningForHeader { speed };
                continue;
            }

            state = match state {
                ScanState::ScanningForBlock => state,
                ScanState::ScanningForHeader { speed } => {
                    if self.table_header.is_match(line) {
                        ScanState::SkippingUnits { speed }
                    } else {
                        state
                    }
                }
                ScanState::SkippingUnits { speed } => ScanState::ReadingRows { speed },
                ScanState::ReadingRows { speed } => {
                    match parse_row(line) {
                        Some(columns) => {
                            if let Some(block) = blocks.last_mut() {
                                block
                                    .records
                                    .push(PerformanceRecord::from_columns(speed, columns));
                            }
                        }
                        None if !line.is_empty() => {
                            tracing::trace!(line = line_no + 1, "Skipping non-table line");
                        }
                        None => {}
                    }
                    state
                }
            };
        }

        blocks.retain(|b| {
            if b.records.is_empty() {
                tracing::debug!(speed = b.speed, "Dropping speed block without rows");
            }
            !b.records.is_empty()
        });

        if blocks.is_empty() {
            return Err(Error::no_data("report contains no table rows"));
        }

        Ok(ParsedReport { blocks })
    }

    fn speed_of(&self, line: &str, line_no: usize) -> Result<Option<u32>> {
        let Some(caps) = self.speed_marker.captures(line) else {
            return Ok(None);
        };
        let speed: u32 = caps[1].parse().map_err(|_| {
            Error::format(format!("bad RPM '{}' at line {}", &caps[1], line_no + 1))
        })?;
        if speed == 0 {
            return Err(Error::format(format!("zero RPM at line {}", line_no + 1)));
        }
        Ok(Some(speed))
    }
}

/// Split a table row into its numeric columns, `None` if the line is not a
/// well-formed row. `inf` and `NaN` tokens make a row malformed.
fn parse_row(line: &str) -> Option<[f64; PerformanceRecord::COLUMN_COUNT]> {
    let mut columns = [0.0; PerformanceRecord::COLUMN_COUNT];
    let mut count = 0;

    for token in line.split_whitespace() {
        if count == PerformanceRecord::COLUMN_COUNT {
            return None;
        }
        let value: f64 = token.parse().ok()?;
        if !value.is_finite() {
            return None;
        }
        columns[count] = value;
        count += 1;
    }

    (count == PerformanceRecord::COLUMN_COUNT).then_some(columns)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "  V          J           Pe          Ct          Cp          PWR         Torque      Thrust      PWR         Torque      Thrust      THR/PWR     Mach        Reyn        FOM";
    const UNITS: &str = " (mph)      (Adv_Ratio)  -           -           -           (Hp)        (In-Lbf)    (Lbf)       (W)         (N-m)       (N)         (g/W)       -           -           -";

    fn row(v: f64, thrust: f64) -> String {
        format!(
            "  {v:.2}  0.1000  0.5000  0.1000  0.0500  0.0100  0.5000  1.0000  {:.3}  0.0500  {thrust:.3}  80.00  0.10  50000  0.6000",
            7.5 + v
        )
    }

    fn block(speed: u32, rows: usize) -> String {
        let mut out = format!("         PROP RPM =     {speed}\n\n{HEADER}\n{UNITS}\n");
        for i in 0..rows {
            out.push_str(&row(i as f64 * 2.0, 5.0 - i as f64 * 0.5));
            out.push('\n');
        }
        out
    }

    #[test]
    fn test_two_blocks_with_noise() {
        let text = format!(
            "APC PROPELLER PERFORMANCE DATA\n{}\nData computed with vortex theory\n{}   (see notes)\n",
            block(1000, 5),
            block(2000, 5)
        );

        let report = ReportParser::new().unwrap().parse_str(&text).unwrap();
        assert_eq!(report.speeds(), vec![1000, 2000]);
        assert_eq!(report.blocks[0].records.len(), 5);
        assert_eq!(report.blocks[1].records.len(), 5);
        assert!(report.blocks[1].records.iter().all(|r| r.speed == 2000));
        assert_eq!(report.blocks[0].records[1].forward_velocity, 2.0);
    }

    #[test]
    fn test_units_row_is_not_data() {
        // A units row with fifteen numeric-looking tokens must still be skipped.
        let numeric_units = "1 2 3 4 5 6 7 8 9 10 11 12 13 14 15";
        let text = format!(
            "PROP RPM = 1500\n{HEADER}\n{numeric_units}\n{}\n",
            row(0.0, 4.0)
        );
        let report = ReportParser::new().unwrap().parse_str(&text).unwrap();
        assert_eq!(report.row_count(), 1);
        assert_eq!(report.blocks[0].records[0].thrust_force, 4.0);
    }

    #[test]
    fn test_rows_outside_tables_are_ignored() {
        let text = format!(
            "{}\n{}\nPROP RPM = 3000\nno header follows\n{}\n",
            row(0.0, 1.0),
            HEADER,
            row(1.0, 1.0)
        );
        let parser = ReportParser::new().unwrap();
        assert!(matches!(parser.parse_str(&text), Err(Error::NoData(_))));
    }

    #[test]
    fn test_wrong_column_count_skipped() {
        let text = format!("{}  0.1 0.2 0.3\n{} 99\n", block(1200, 2), row(9.0, 1.0));
        let report = ReportParser::new().unwrap().parse_str(&text).unwrap();
        assert_eq!(report.row_count(), 2);
    }

    #[test]
    fn test_empty_blocks_dropped() {
        let text = format!("PROP RPM = 900\n{HEADER}\n{UNITS}\n\n{}", block(1800, 3));
        let report = ReportParser::new().unwrap().parse_str(&text).unwrap();
        assert_eq!(report.speeds(), vec![1800]);
    }

    #[test]
    fn test_duplicate_speed_is_format_error() {
        let text = format!("{}{}", block(1000, 2), block(1000, 2));
        let parser = ReportParser::new().unwrap();
        assert!(matches!(parser.parse_str(&text), Err(Error::Format(_))));
    }

    #[test]
    fn test_no_data() {
        let parser = ReportParser::new().unwrap();
        assert!(matches!(
            parser.parse_str("just a title\n\nand a footnote\n"),
            Err(Error::NoData(_))
        ));
    }

    #[test]
    fn test_block_lookup_lists_available_speeds() {
        let report = ReportParser::new()
            .unwrap()
            .parse_str(&format!("{}{}", block(1000, 1), block(2000, 1)))
            .unwrap();
        assert!(report.block(2000).is_ok());
        let err = report.block(1500).unwrap_err().to_string();
        assert!(err.contains("[1000, 2000]"), "{err}");
    }

    #[test]
    fn test_closest_static_point() {
        let report = ReportParser::new()
            .unwrap()
            .parse_str(&format!("{}{}", block(1000, 3), block(2000, 3)))
            .unwrap();
        // Static rows have power 7.5 W in both blocks; the first one wins.
        let point = report.closest_static_point(10.0).unwrap();
        assert_eq!(point.speed, 1000);
        assert!(point.is_static());
    }

    #[test]
    fn test_non_finite_tokens_make_row_malformed() {
        let text = format!(
            "{}{}\n{}\n",
            block(1000, 2),
            row(6.0, 1.0).replace("0.6000", "inf"),
            row(8.0, 1.0).replace("80.00", "NaN")
        );
        let report = ReportParser::new().unwrap().parse_str(&text).unwrap();
        assert_eq!(report.row_count(), 2);

        let all_bad = format!(
            "PROP RPM = 1000\n{HEADER}\n{UNITS}\n{}\n",
            row(0.0, 1.0).replace("0.6000", "-inf")
        );
        let parser = ReportParser::new().unwrap();
        assert!(matches!(parser.parse_str(&all_bad), Err(Error::NoData(_))));
    }

    fn static_report() -> ParsedReport {
        let record = |speed: u32, v: f64, power: f64, thrust: f64| {
            let mut cols = [0.0; PerformanceRecord::COLUMN_COUNT];
            cols[0] = v;
            cols[8] = power;
            cols[10] = thrust;
            PerformanceRecord::from_columns(speed, cols)
        };
        ParsedReport {
            blocks: vec![
                SpeedBlock {
                    speed: 1000,
                    records: vec![record(1000, 0.0, 10.0, 3.0), record(1000, 10.0, 12.0, 2.0)],
                },
                SpeedBlock {
                    speed: 2000,
                    records: vec![record(2000, 0.0, 40.0, 9.0), record(2000, 10.0, 44.0, 6.0)],
                },
            ],
        }
    }

    #[test]
    fn test_dynamic_thrust_for_power_picks_speed() {
        let report = static_report();

        let curve = report.dynamic_thrust_for_power(35.0, SEA_LEVEL_DENSITY).unwrap();
        assert_eq!(curve.speed, 2000);
        assert_eq!(curve.points.len(), 2);
        assert_eq!(curve.points[0], (0.0, 9.0));
        assert_eq!(curve.points[1].1, 6.0);

        let low = report.dynamic_thrust_for_power(5.0, SEA_LEVEL_DENSITY).unwrap();
        assert_eq!(low.speed, 1000);

        assert!(matches!(
            report.dynamic_thrust_for_power(f64::NAN, SEA_LEVEL_DENSITY),
            Err(Error::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_dynamic_thrust_for_power_needs_static_rows() {
        let mut report = static_report();
        for block in &mut report.blocks {
            block.records.retain(|r| !r.is_static());
        }
        assert!(matches!(
            report.dynamic_thrust_for_power(35.0, SEA_LEVEL_DENSITY),
            Err(Error::NoData(_))
        ));
    }

    #[test]
    fn test_dynamic_thrust_density_scaling() {
        let report = ReportParser::new()
            .unwrap()
            .parse_str(&block(1000, 2))
            .unwrap();
        let curve = report.dynamic_thrust(1000, SEA_LEVEL_DENSITY / 2.0).unwrap();
        assert_eq!(curve.len(), 2);
        assert_eq!(curve[0], (0.0, 2.5));
        assert!((curve[1].0 - 2.0 * crate::types::MPH_TO_MS).abs() < 1e-12);
    }
}
