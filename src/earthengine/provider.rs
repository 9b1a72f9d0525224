use super::{download_expression, parse_images, search_expression};
use crate::composite::{Composite, CompositeMethod, CompositeRequest, DownloadOptions, SearchResult};
use crate::download::write_response;
use crate::error::DownloaderError;
use crate::service::ImageryService;
use crate::settings::Settings;
use anyhow::Result;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

/// Client for the Earth Engine REST API, scoped to one cloud project.
pub struct Provider {
    client: Client,
    api_url: Url,
    project: String,
    access_token: String,
}

#[derive(Deserialize)]
struct ComputeValueResponse {
    result: Value,
}

#[derive(Deserialize)]
struct Thumbnail {
    name: Option<String>,
}

impl Provider {
    pub fn new(client: Client, api_url: Url, project: &str, access_token: &str) -> Self {
        Self {
            client,
            api_url,
            project: project.to_string(),
            access_token: access_token.to_string(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self::new(
            Client::new(),
            settings.api_url()?,
            settings.project()?,
            settings.access_token()?,
        ))
    }

    fn project_url(self: &Self, method: &str) -> Result<Url> {
        let url = self
            .api_url
            .join(&format!("projects/{}/{}", self.project, method))?;
        Ok(url)
    }

    async fn post(self: &Self, url: Url, body: &Value) -> Result<Response> {
        debug!("POST {url}");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;
        check_status(response).await
    }

    async fn get(self: &Self, url: Url) -> Result<Response> {
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        check_status(response).await
    }
}

impl ImageryService for Provider {
    async fn search(self: &Self, request: &CompositeRequest) -> Result<SearchResult> {
        let expression = search_expression(request)?;
        let url = self.project_url("value:compute")?;
        let computed: ComputeValueResponse = self
            .post(url, &json!({ "expression": expression }))
            .await?
            .json()
            .await?;
        let images = parse_images(&computed.result)?;
        Ok(SearchResult {
            request: request.clone(),
            images,
        })
    }

    async fn composite(
        self: &Self,
        search: &SearchResult,
        method: CompositeMethod,
        region: &Value,
    ) -> Result<Composite> {
        // Evaluated lazily by the service when the download is requested.
        Ok(Composite {
            request: search.request.clone(),
            method,
            region: region.clone(),
        })
    }

    async fn download(self: &Self, composite: &Composite, options: &DownloadOptions) -> Result<()> {
        let expression = download_expression(composite, options)?;
        let body = json!({
            "expression": expression,
            "fileFormat": "GEO_TIFF",
            "bandIds": options.bands,
        });
        let thumbnail: Thumbnail = self
            .post(self.project_url("thumbnails")?, &body)
            .await?
            .json()
            .await?;
        let name = thumbnail.name.ok_or(DownloaderError::MissingDownloadName)?;

        let url = self.api_url.join(&format!("{name}:getPixels"))?;
        let response = self.get(url).await?;
        let written = write_response(response, &options.output, options.overwrite).await?;
        info!("Wrote {} bytes to {}", written, options.output.display());
        Ok(())
    }
}

/// Turns non-success responses into `DownloaderError::Api`, preferring the service's own message.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|body| body["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(text);
    Err(DownloaderError::Api {
        status: status.as_u16(),
        message,
    }
    .into())
}
