use crate::error::RegionError;
use anyhow::Result;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Reads the area of interest from a GeoJSON FeatureCollection.
///
/// Only `features[0].geometry` is used and it is returned verbatim. Other
/// features, properties and any CRS member are ignored.
pub fn read_polygon<P: AsRef<Path>>(path: P) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    let document: Value = serde_json::from_str(&content)?;
    let geometry = first_geometry(document)?;
    Ok(geometry)
}

fn first_geometry(mut document: Value) -> Result<Value, RegionError> {
    let features = document
        .get_mut("features")
        .and_then(Value::as_array_mut)
        .ok_or(RegionError::MissingFeatures)?;
    if features.is_empty() {
        return Err(RegionError::EmptyFeatures);
    }
    features[0]
        .get_mut("geometry")
        .map(Value::take)
        .ok_or(RegionError::MissingGeometry)
}
