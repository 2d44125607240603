//! # Station Records
//!
//! Station files are JSON documents holding a station's harmonic constants,
//! its vertical datums, and, for subordinate stations, the offsets applied to
//! a reference station.
//!
//! ```json
//! {
//!   "id": "9414290",
//!   "name": "San Francisco",
//!   "harmonic_constituents": [{"name": "M2", "amplitude": 1.78, "phase": 190.1}],
//!   "datums": {"MLLW": 0.0, "MSL": 3.1}
//! }
//! ```

use crate::error::TideError;
use crate::offsets::ExtremeOffsets;
use crate::prediction::{predict, HarmonicConstituent, Prediction, PredictionOptions};
use crate::registry::Registry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub harmonic_constituents: Vec<HarmonicConstituent>,
    /// Height of each named datum above the station's chart datum
    #[serde(default)]
    pub datums: BTreeMap<String, f64>,
    /// Present only on subordinate stations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offsets: Option<ExtremeOffsets>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
}

impl Station {
    pub fn from_json(json: &str) -> Result<Station, TideError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a station file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Station, TideError> {
        let contents = fs::read_to_string(&path)?;
        let station = Self::from_json(&contents)?;
        debug!(
            id = %station.id,
            constituents = station.harmonic_constituents.len(),
            subordinate = station.is_subordinate(),
            "loaded station"
        );
        Ok(station)
    }

    /// True when the station's tide is derived from a reference station.
    pub fn is_subordinate(&self) -> bool {
        self.offsets.is_some()
    }

    /// Offset of a named datum, matched case-insensitively.
    pub fn datum(&self, name: &str) -> Option<f64> {
        self.datums
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }

    /// Prediction from this station's own constituents.
    pub fn predict<'r>(
        &self,
        registry: &'r Registry,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        options: &PredictionOptions,
    ) -> Result<Prediction<'r>, TideError> {
        predict(registry, &self.harmonic_constituents, start, end, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offsets::OffsetKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const REFERENCE: &str = r#"{
        "id": "9414290",
        "name": "San Francisco",
        "harmonic_constituents": [
            {"name": "M2", "amplitude": 1.78, "phase": 190.1},
            {"name": "K1", "amplitude": 1.2, "phase": 105.5}
        ],
        "datums": {"MLLW": 0.0, "MSL": 3.1}
    }"#;

    const SUBORDINATE: &str = r#"{
        "id": "9414131",
        "name": "Pillar Point",
        "reference_id": "9414290",
        "offsets": {
            "height": {"high": 0.95, "low": 0.9, "type": "ratio"},
            "time": {"high": -20, "low": -15}
        }
    }"#;

    #[test]
    fn test_reference_station() {
        let station = Station::from_json(REFERENCE).unwrap();
        assert_eq!(station.harmonic_constituents.len(), 2);
        assert!(!station.is_subordinate());
        assert_eq!(station.datum("msl"), Some(3.1));
        assert_eq!(station.datum("NAVD88"), None);
    }

    #[test]
    fn test_subordinate_station() {
        let station = Station::from_json(SUBORDINATE).unwrap();
        assert!(station.is_subordinate());
        assert!(station.harmonic_constituents.is_empty());
        assert_eq!(station.reference_id.as_deref(), Some("9414290"));
        let offsets = station.offsets.unwrap();
        assert_eq!(offsets.height.kind, OffsetKind::Ratio);
        assert_eq!(offsets.time.low, -15.0);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(REFERENCE.as_bytes()).unwrap();
        let station = Station::load(file.path()).unwrap();
        assert_eq!(station.name, "San Francisco");
    }

    #[test]
    fn test_load_errors() {
        assert!(matches!(
            Station::load("/nonexistent/station.json"),
            Err(TideError::Io(_))
        ));
        assert!(matches!(
            Station::from_json("{\"id\": 3}"),
            Err(TideError::Json(_))
        ));
    }
}
