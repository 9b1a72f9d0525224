use thiserror::Error;

/// Lookup failures while pulling the area of interest out of a GeoJSON document.
#[derive(Error, Debug, PartialEq)]
pub enum RegionError {
    #[error("GeoJSON document has no \"features\" array")]
    MissingFeatures,
    #[error("GeoJSON \"features\" array is empty")]
    EmptyFeatures,
    #[error("First GeoJSON feature has no \"geometry\"")]
    MissingGeometry,
}

#[derive(Error, Debug)]
pub enum DownloaderError {
    #[error("No images found between {start} and {end} matching the search filters")]
    NoImages { start: String, end: String },
    #[error("Imagery service returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Unsupported geometry: {0}")]
    UnsupportedGeometry(String),
    #[error("Missing setting: {0}")]
    MissingSetting(&'static str),
    #[error("Imagery service did not return a download name")]
    MissingDownloadName,
}
