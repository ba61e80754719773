//! Core types for propfinder

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Conversion factor from miles per hour to metres per second.
pub const MPH_TO_MS: f64 = 0.44704;

/// Sea-level air density (kg/m^3) the reports are computed at.
pub const SEA_LEVEL_DENSITY: f64 = 1.225;

/// Report subtree a propeller file belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Geometry,
    Performance,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Geometry => write!(f, "geometry"),
            Category::Performance => write!(f, "performance"),
        }
    }
}

/// Canonical key of a propeller, derived from its performance file name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropellerIdentifier {
    /// Diameter in inches
    pub diameter: f64,
    /// Pitch in inches
    pub pitch: f64,
    /// Type suffix such as `E`, `MR` or `SF`; `Standard` when absent
    pub type_code: String,
    /// Short code, e.g. `20x10E`
    pub canonical_id: String,
}

/// One row of a report table at a fixed rotational speed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PerformanceRecord {
    pub speed: u32,
    /// Forward velocity (mph)
    pub forward_velocity: f64,
    pub advance_ratio: f64,
    pub propulsive_efficiency: f64,
    pub thrust_coeff: f64,
    pub power_coeff: f64,
    pub power_hp: f64,
    pub torque_in_lbf: f64,
    pub thrust_lbf: f64,
    /// Required power (W)
    pub power_required: f64,
    /// Torque (N-m)
    pub torque: f64,
    /// Thrust (N)
    pub thrust_force: f64,
    /// Thrust per power (g/W)
    pub thrust_per_power: f64,
    pub mach: f64,
    pub reynolds: f64,
    pub figure_of_merit: f64,
}

impl PerformanceRecord {
    /// Number of numeric columns in a report table row.
    pub const COLUMN_COUNT: usize = 15;

    /// Build a record from the fifteen table columns in report order.
    pub fn from_columns(speed: u32, v: [f64; Self::COLUMN_COUNT]) -> Self {
        Self {
            speed,
            forward_velocity: v[0],
            advance_ratio: v[1],
            propulsive_efficiency: v[2],
            thrust_coeff: v[3],
            power_coeff: v[4],
            power_hp: v[5],
            torque_in_lbf: v[6],
            thrust_lbf: v[7],
            power_required: v[8],
            torque: v[9],
            thrust_force: v[10],
            thrust_per_power: v[11],
            mach: v[12],
            reynolds: v[13],
            figure_of_merit: v[14],
        }
    }

    /// Forward velocity in m/s.
    pub fn velocity_ms(&self) -> f64 {
        self.forward_velocity * MPH_TO_MS
    }

    /// Static operating point (zero forward velocity).
    pub fn is_static(&self) -> bool {
        self.forward_velocity == 0.0
    }
}

/// All rows of one report table, sharing a single speed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpeedBlock {
    pub speed: u32,
    pub records: Vec<PerformanceRecord>,
}

/// Summary of one (propeller, speed) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedFeatureRow {
    pub prop_id: String,
    pub prop_type: String,
    pub source_filename: String,
    pub diameter: f64,
    pub pitch: f64,
    pub speed: u32,
    pub max_thrust: f64,
    pub max_power: f64,
    pub max_torque: f64,
    pub max_figure_of_merit: f64,
    pub max_thrust_per_power: f64,
    pub advance_ratio_curve: Vec<f64>,
    pub thrust_coeff_curve: Vec<f64>,
    pub power_coeff_curve: Vec<f64>,
    pub efficiency_curve: Vec<f64>,
    /// Required power (W) of the block's first static row, if it has one
    #[serde(default)]
    pub static_power: Option<f64>,
    /// Thrust (N) of that static row
    #[serde(default)]
    pub static_thrust: Option<f64>,
}

impl AggregatedFeatureRow {
    /// Value of a numeric column, `None` for categorical columns.
    pub fn numeric(&self, column: Column) -> Option<f64> {
        match column {
            Column::Diameter => Some(self.diameter),
            Column::Pitch => Some(self.pitch),
            Column::Speed => Some(self.speed as f64),
            Column::MaxThrust => Some(self.max_thrust),
            Column::MaxPower => Some(self.max_power),
            Column::MaxTorque => Some(self.max_torque),
            Column::MaxFigureOfMerit => Some(self.max_figure_of_merit),
            Column::MaxThrustPerPower => Some(self.max_thrust_per_power),
            Column::PropId | Column::PropType | Column::SourceFilename => None,
        }
    }

    /// Value of a categorical column, `None` for numeric columns.
    pub fn categorical(&self, column: Column) -> Option<&str> {
        match column {
            Column::PropId => Some(&self.prop_id),
            Column::PropType => Some(&self.prop_type),
            Column::SourceFilename => Some(&self.source_filename),
            _ => None,
        }
    }

    /// Number of points in the retained curves.
    pub fn curve_len(&self) -> usize {
        self.advance_ratio_curve.len()
    }
}

/// Whether a column holds numbers or labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Categorical,
    Numeric,
}

/// Addressable catalog column.
///
/// Canonical names match the published metadata table headers; the
/// snake_case field names are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Column {
    PropId,
    PropType,
    SourceFilename,
    Diameter,
    Pitch,
    Speed,
    MaxThrust,
    MaxPower,
    MaxTorque,
    MaxFigureOfMerit,
    MaxThrustPerPower,
}

impl Column {
    pub const ALL: [Column; 11] = [
        Column::PropId,
        Column::PropType,
        Column::SourceFilename,
        Column::Diameter,
        Column::Pitch,
        Column::Speed,
        Column::MaxThrust,
        Column::MaxPower,
        Column::MaxTorque,
        Column::MaxFigureOfMerit,
        Column::MaxThrustPerPower,
    ];

    /// Columns the spatial index is built over unless configured otherwise.
    pub const DEFAULT_FEATURES: [Column; 6] = [
        Column::Speed,
        Column::MaxThrust,
        Column::MaxPower,
        Column::MaxTorque,
        Column::MaxFigureOfMerit,
        Column::MaxThrustPerPower,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Column::PropId => "prop_id",
            Column::PropType => "prop_type",
            Column::SourceFilename => "filepath",
            Column::Diameter => "D (in)",
            Column::Pitch => "P (in)",
            Column::Speed => "RPM",
            Column::MaxThrust => "maxThrust (N)",
            Column::MaxPower => "maxPower (W)",
            Column::MaxTorque => "maxTorque (Nm)",
            Column::MaxFigureOfMerit => "maxFoM",
            Column::MaxThrustPerPower => "max THR/PWR (g/W)",
        }
    }

    fn alias(self) -> &'static str {
        match self {
            Column::PropId => "prop_id",
            Column::PropType => "type",
            Column::SourceFilename => "source_filename",
            Column::Diameter => "diameter",
            Column::Pitch => "pitch",
            Column::Speed => "speed",
            Column::MaxThrust => "max_thrust",
            Column::MaxPower => "max_power",
            Column::MaxTorque => "max_torque",
            Column::MaxFigureOfMerit => "max_figure_of_merit",
            Column::MaxThrustPerPower => "max_thrust_per_power",
        }
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            Column::PropId | Column::PropType | Column::SourceFilename => ColumnKind::Categorical,
            _ => ColumnKind::Numeric,
        }
    }

    pub fn is_numeric(self) -> bool {
        self.kind() == ColumnKind::Numeric
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Column {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        Column::ALL
            .into_iter()
            .find(|c| c.name() == s || c.alias() == s)
            .ok_or_else(|| Error::InvalidColumn(format!("unknown column '{}'", s)))
    }
}

impl TryFrom<String> for Column {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Column> for String {
    fn from(column: Column) -> Self {
        column.name().to_string()
    }
}
