//! Propeller identifiers from performance file names

use regex::Regex;
use std::path::Path;

use super::NamingRule;
use crate::types::PropellerIdentifier;
use crate::{Error, Result};

/// Type code used when the file name carries no suffix after the pitch.
pub const STANDARD_TYPE: &str = "Standard";

/// Parses `<prefix><diameter>x<pitch><type_code><suffix>` file names
#[derive(Debug, Clone)]
pub struct IdentifierParser {
    pattern: Regex,
}

impl IdentifierParser {
    pub fn new(rule: &NamingRule) -> Result<Self> {
        let pattern = format!(
            r"^{}(?P<id>(?P<diameter>\d+\.?\d*)x(?P<pitch>\d+\.?\d*)(?P<type>.*?)){}$",
            regex::escape(&rule.prefix),
            regex::escape(&rule.suffix),
        );
        let pattern = Regex::new(&pattern)
            .map_err(|e| Error::internal(format!("Invalid identifier pattern: {}", e)))?;
        Ok(Self { pattern })
    }

    /// Parse a file name (or a path, of which only the file name is used).
    pub fn parse(&self, filename: &str) -> Result<PropellerIdentifier> {
        let name = Path::new(filename)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(filename);

        let caps = self
            .pattern
            .captures(name)
            .ok_or_else(|| Error::format(format!("No propeller ID pattern in '{}'", filename)))?;

        let diameter = parse_dimension(&caps["diameter"], "diameter", filename)?;
        let pitch = parse_dimension(&caps["pitch"], "pitch", filename)?;
        let type_code = match &caps["type"] {
            "" => STANDARD_TYPE.to_string(),
            t => t.to_string(),
        };

        Ok(PropellerIdentifier {
            diameter,
            pitch,
            type_code,
            canonical_id: caps["id"].to_string(),
        })
    }
}

fn parse_dimension(raw: &str, what: &str, filename: &str) -> Result<f64> {
    let value: f64 = raw
        .parse()
        .map_err(|_| Error::format(format!("Bad {} '{}' in '{}'", what, raw, filename)))?;
    if !value.is_finite() || value <= 0.0 {
        return Err(Error::format(format!(
            "Non-positive or non-finite {} in '{}'",
            what, filename
        )));
    }
    Ok(value)
}
