//! Propfinder - similarity search over propeller performance reports
//!
//! Propfinder turns a corpus of propeller performance reports into:
//! - A catalog with one aggregated row per (propeller, speed)
//! - A normalized k-d tree index over selected numeric features
//! - Nearest-neighbor and constraint queries over the persisted bundle

pub mod aggregate;
pub mod bundle;
pub mod catalog;
pub mod config;
pub mod error;
pub mod index;
pub mod pipeline;
pub mod query;
pub mod report;
pub mod resolver;
pub mod types;

pub use error::{Error, Result};
