//! The confidence-multiplier artifact: a JSON object mapping structure
//! method names to multipliers.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::debug;

use crate::error::WeightsError;

/// Structure method name to confidence multiplier.
pub type Multipliers = BTreeMap<String, f64>;

/// Read multipliers from `path`. A missing file yields an empty map.
///
/// # Errors
///
/// Returns [`WeightsError`] when the file exists but cannot be read or is
/// not a JSON object of numbers.
pub fn load_multipliers(path: &Path) -> Result<Multipliers, WeightsError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no weights file, using defaults");
            return Ok(Multipliers::new());
        }
        Err(error) => return Err(error.into()),
    };
    Ok(serde_json::from_str(&raw)?)
}

/// Write multipliers as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`WeightsError`] when the file cannot be written.
pub fn save_multipliers(path: &Path, multipliers: &Multipliers) -> Result<(), WeightsError> {
    let mut json = serde_json::to_string_pretty(multipliers)?;
    json.push('\n');
    fs::write(path, json)?;
    Ok(())
}

/// `explicit` entries win; methods only present in `defaults` keep their
/// default.
#[must_use]
pub fn merge_multipliers(defaults: &Multipliers, explicit: &Multipliers) -> Multipliers {
    let mut merged = defaults.clone();
    merged.extend(explicit.iter().map(|(method, value)| (method.clone(), *value)));
    merged
}
