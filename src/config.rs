//! Azure Computer Vision credentials and endpoint.
//!
//! These are read from the environment exactly once, when a front end starts
//! up, and then passed explicitly to whatever needs them.

use std::{env, fmt};

use reqwest::Url;

use crate::prelude::*;

/// Environment variable holding our Azure Computer Vision key.
pub const KEY_VAR: &str = "AZURE_VISION_KEY";

/// Environment variable holding our Azure Computer Vision endpoint.
pub const ENDPOINT_VAR: &str = "AZURE_VISION_ENDPOINT";

/// The endpoint used by `serve` when [`ENDPOINT_VAR`] is not set.
pub const DEFAULT_SERVER_ENDPOINT: &str = "https://westus.api.cognitive.microsoft.com/";

/// Validated connection settings for Azure Computer Vision.
#[derive(Clone)]
pub struct VisionConfig {
    /// The base URL of our Computer Vision resource. Always ends in `/`.
    pub endpoint: Url,

    /// The subscription key.
    pub key: String,
}

impl VisionConfig {
    /// Build a config from explicit values, validating the endpoint.
    pub fn new(endpoint: &str, key: &str) -> Result<Self> {
        if key.trim().is_empty() {
            return Err(anyhow!("{KEY_VAR} environment variable not set"));
        }
        let mut endpoint = endpoint.trim().to_owned();
        if endpoint.is_empty() {
            return Err(anyhow!("{ENDPOINT_VAR} environment variable not set"));
        }
        if !endpoint.ends_with('/') {
            endpoint.push('/');
        }
        let endpoint = Url::parse(&endpoint)
            .with_context(|| format!("invalid {ENDPOINT_VAR}: {endpoint:?}"))?;
        Ok(Self {
            endpoint,
            key: key.trim().to_owned(),
        })
    }

    /// Read our config from the environment.
    ///
    /// If `default_endpoint` is `None`, then [`ENDPOINT_VAR`] must be set.
    pub fn from_env(default_endpoint: Option<&str>) -> Result<Self> {
        let key = env::var(KEY_VAR).unwrap_or_default();
        let endpoint = match env::var(ENDPOINT_VAR) {
            Ok(endpoint) if !endpoint.trim().is_empty() => endpoint,
            _ => default_endpoint.unwrap_or_default().to_owned(),
        };
        Self::new(&endpoint, &key)
    }
}

// Never print our key, not even in debug logs.
impl fmt::Debug for VisionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("key", &"<redacted>")
            .finish()
    }
}
