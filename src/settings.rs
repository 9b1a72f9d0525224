use crate::earthengine::DEFAULT_API_URL;
use crate::error::DownloaderError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use url::Url;

/// Connection settings for the Earth Engine REST API.
///
/// Every field may come from a TOML file and is overridden by the matching `EE_*`
/// environment variable. The access token is obtained out of band, e.g. with
/// `gcloud auth print-access-token`.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Settings {
    pub api_url: Option<String>,
    pub project: Option<String>,
    pub access_token: Option<String>,
}

impl Settings {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&content)?;
        Ok(settings)
    }

    pub fn write<P: AsRef<Path>>(self: &Self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Starting point for a settings file. The access token is left out so it is not
    /// written to disk by accident; supply it through `EE_ACCESS_TOKEN`.
    pub fn template() -> toml::Table {
        toml::toml! {
            api_url = "https://earthengine.googleapis.com/v1/"

            project = "my-cloud-project"
        }
    }

    pub fn from_template(table: &toml::Table) -> Result<Self> {
        let settings: Self = toml::from_str(&table.to_string())?;
        Ok(settings)
    }

    pub fn with_env(self: Self) -> Self {
        self.merge(|key| std::env::var(key).ok())
    }

    fn merge<F>(self: Self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            api_url: lookup("EE_API_URL").or(self.api_url),
            project: lookup("EE_PROJECT").or(self.project),
            access_token: lookup("EE_ACCESS_TOKEN").or(self.access_token),
        }
    }

    /// The API root, always ending in `/` so relative paths join under it.
    pub fn api_url(self: &Self) -> Result<Url> {
        let mut raw = self
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Ok(Url::parse(&raw)?)
    }

    pub fn project(self: &Self) -> Result<&str> {
        let project = self
            .project
            .as_deref()
            .ok_or(DownloaderError::MissingSetting("project"))?;
        Ok(project)
    }

    pub fn access_token(self: &Self) -> Result<&str> {
        let token = self
            .access_token
            .as_deref()
            .ok_or(DownloaderError::MissingSetting("access_token"))?;
        Ok(token)
    }
}
