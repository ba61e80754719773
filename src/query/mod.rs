//! Query engine over a loaded search bundle
//!
//! Two query shapes are supported: nearest-neighbor lookup in the
//! normalized feature space, and constraint filtering sorted by a numeric
//! column. Constraints can be written as JSON, e.g.
//! `{"prop_type": ["E", "MR"], "RPM": [1000, null]}`.

pub mod executor;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{AggregatedFeatureRow, Column, ColumnKind};
use crate::Result;

pub use executor::QueryEngine;

/// Condition on a single catalog column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawConstraint", into = "RawConstraint")]
pub enum Constraint {
    /// Categorical membership
    OneOf(Vec<String>),
    /// Inclusive numeric bounds; a missing bound is unbounded
    Range { min: Option<f64>, max: Option<f64> },
}

impl Constraint {
    pub fn equals(value: impl Into<String>) -> Self {
        Constraint::OneOf(vec![value.into()])
    }

    pub fn between(min: Option<f64>, max: Option<f64>) -> Self {
        Constraint::Range { min, max }
    }

    /// Column kind this constraint applies to
    pub fn kind(&self) -> ColumnKind {
        match self {
            Constraint::OneOf(_) => ColumnKind::Categorical,
            Constraint::Range { .. } => ColumnKind::Numeric,
        }
    }

    /// Evaluate against a row. Caller guarantees the kinds agree.
    pub(crate) fn matches(&self, column: Column, row: &AggregatedFeatureRow) -> bool {
        match self {
            Constraint::OneOf(values) => row
                .categorical(column)
                .is_some_and(|v| values.iter().any(|wanted| wanted == v)),
            Constraint::Range { min, max } => row.numeric(column).is_some_and(|v| {
                min.map_or(true, |lo| v >= lo) && max.map_or(true, |hi| v <= hi)
            }),
        }
    }
}

/// JSON shapes accepted for a constraint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawConstraint {
    Value(String),
    Values(Vec<String>),
    Bounds(Option<f64>, Option<f64>),
}

impl From<RawConstraint> for Constraint {
    fn from(raw: RawConstraint) -> Self {
        match raw {
            RawConstraint::Value(v) => Constraint::OneOf(vec![v]),
            RawConstraint::Values(vs) => Constraint::OneOf(vs),
            RawConstraint::Bounds(min, max) => Constraint::Range { min, max },
        }
    }
}

impl From<Constraint> for RawConstraint {
    fn from(constraint: Constraint) -> Self {
        match constraint {
            Constraint::OneOf(vs) => RawConstraint::Values(vs),
            Constraint::Range { min, max } => RawConstraint::Bounds(min, max),
        }
    }
}

/// Conjunction of per-column constraints
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Constraints {
    by_column: BTreeMap<Column, Constraint>,
}

impl Constraints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a constraint, replacing any previous one on the same column.
    pub fn with(mut self, column: Column, constraint: Constraint) -> Self {
        self.by_column.insert(column, constraint);
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Column, &Constraint)> {
        self.by_column.iter().map(|(c, k)| (*c, k))
    }

    pub fn len(&self) -> usize {
        self.by_column.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_column.is_empty()
    }
}

/// One nearest-neighbor hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<'a> {
    pub row: &'a AggregatedFeatureRow,
    /// Catalog position of `row`
    pub position: usize,
    /// Euclidean distance in normalized feature space
    pub distance: f64,
}
