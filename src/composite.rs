use crate::error::DownloaderError;
use crate::region::read_polygon;
use crate::service::ImageryService;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

/// Sentinel-2 MSI Level-1C top of atmosphere reflectance.
pub const COLLECTION: &str = "COPERNICUS/S2";

/// Minimum fraction of cloud-free pixels for an image to enter the composite.
pub const CLOUDLESS_PORTION: f64 = 0.5;

pub const CRS: &str = "EPSG:4326";

pub const SCALE: f64 = 10.0;

pub const BANDS: [&str; 13] = [
    "B1", "B2", "B3", "B4", "B5", "B6", "B7", "B8", "B8A", "B9", "B10", "B11", "B12",
];

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct CompositeRequest {
    pub collection: String,
    pub region: Value,
    pub start_date: String,
    pub end_date: String,
    pub cloudless_portion: f64,
}

impl CompositeRequest {
    pub fn new(region: Value, start_date: &str, end_date: &str) -> Self {
        Self {
            collection: COLLECTION.to_string(),
            region,
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
            cloudless_portion: CLOUDLESS_PORTION,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompositeMethod {
    /// Per pixel, keep the observation with the highest quality score.
    QMosaic,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ImageInfo {
    pub id: String,
    /// Acquisition time in milliseconds since the Unix epoch.
    pub time_start: Option<i64>,
    pub cloudy_pixel_percentage: Option<f64>,
}

impl ImageInfo {
    pub fn acquired(self: &Self) -> String {
        self.time_start
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult {
    pub request: CompositeRequest,
    pub images: Vec<ImageInfo>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Composite {
    pub request: CompositeRequest,
    pub method: CompositeMethod,
    pub region: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DownloadOptions {
    pub output: PathBuf,
    pub region: Value,
    pub crs: String,
    pub scale: f64,
    pub bands: Vec<String>,
    pub overwrite: bool,
}

impl DownloadOptions {
    pub fn new(output: &Path, region: Value) -> Self {
        Self {
            output: output.to_path_buf(),
            region,
            crs: CRS.to_string(),
            scale: SCALE,
            bands: BANDS.iter().map(|b| b.to_string()).collect(),
            overwrite: true,
        }
    }
}

/// Downloads a cloud-free composite of the area of interest in `geojson` to `output_file`.
///
/// Any existing file at `output_file` is replaced. Errors from the region read, the search
/// or the download are returned as-is.
pub async fn download_tiff(
    service: &impl ImageryService,
    geojson: &Path,
    start_date: &str,
    end_date: &str,
    output_file: &Path,
) -> Result<()> {
    let polygon = read_polygon(geojson)?;

    let request = CompositeRequest::new(polygon.clone(), start_date, end_date);
    info!(
        "Searching {} from {} to {} (cloudless portion >= {})",
        request.collection, request.start_date, request.end_date, request.cloudless_portion
    );
    let search = service.search(&request).await?;
    if search.images.is_empty() {
        return Err(DownloaderError::NoImages {
            start: start_date.to_string(),
            end: end_date.to_string(),
        }
        .into());
    }
    info!("Found {} images", search.images.len());
    for image in search.images.iter() {
        info!(
            "  {} acquired {} cloudy {}",
            image.id,
            image.acquired(),
            image
                .cloudy_pixel_percentage
                .map(|p| format!("{:.1}%", p))
                .unwrap_or_else(|| "-".to_string())
        );
    }

    let composite = service
        .composite(&search, CompositeMethod::QMosaic, &polygon)
        .await?;

    let options = DownloadOptions::new(output_file, polygon);
    info!(
        "Downloading {} bands at scale {} in {} to {}",
        options.bands.len(),
        options.scale,
        options.crs,
        options.output.display()
    );
    service.download(&composite, &options).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_uses_fixed_collection_and_threshold() {
        let request = CompositeRequest::new(json!({"type": "Point"}), "2023-01-01", "2023-03-01");
        assert_eq!(request.collection, "COPERNICUS/S2");
        assert_eq!(request.cloudless_portion, 0.5);
        assert_eq!(request.start_date, "2023-01-01");
        assert_eq!(request.end_date, "2023-03-01");
    }

    #[test]
    fn test_download_options() {
        let options = DownloadOptions::new(Path::new("out.tif"), json!({"type": "Point"}));
        assert_eq!(options.crs, "EPSG:4326");
        assert_eq!(options.scale, 10.0);
        assert!(options.overwrite);
        assert_eq!(
            options.bands,
            vec!["B1", "B2", "B3", "B4", "B5", "B6", "B7", "B8", "B8A", "B9", "B10", "B11", "B12"]
        );
    }

    #[test]
    fn test_acquired() {
        let image = ImageInfo {
            id: "COPERNICUS/S2/20230105T101401_20230105T101355_T32TQM".to_string(),
            time_start: Some(1_672_913_641_000),
            cloudy_pixel_percentage: Some(2.5),
        };
        assert_eq!(image.acquired(), "2023-01-05 10:14");

        let image = ImageInfo {
            time_start: None,
            ..image
        };
        assert_eq!(image.acquired(), "-");
    }
}
