//! The seam between the download pipeline and a remote imagery service
use crate::composite::{Composite, CompositeMethod, CompositeRequest, DownloadOptions, SearchResult};
use serde_json::Value;

pub trait ImageryService {
    /// Finds the images of `request.collection` that intersect the region within the date
    /// range and pass the cloud-free threshold.
    async fn search(self: &Self, request: &CompositeRequest) -> anyhow::Result<SearchResult>;

    /// Reduces the search results to a single image.
    async fn composite(
        self: &Self,
        search: &SearchResult,
        method: CompositeMethod,
        region: &Value,
    ) -> anyhow::Result<Composite>;

    /// Renders the composite and writes it to `options.output`.
    async fn download(self: &Self, composite: &Composite, options: &DownloadOptions)
        -> anyhow::Result<()>;
}
