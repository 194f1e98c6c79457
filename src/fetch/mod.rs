//! Retrieval and validation of published updates.
//!
//! [`Requester`] is the only network primitive the update pipeline depends
//! on: fetch bytes from a URL. [`HttpRequester`] is the stock implementation
//! over reqwest; tests and embedders substitute their own.
//!
//! [`ReleaseFetcher`] layers the release semantics on top: resolve the
//! channel-aware URLs, decode and validate the manifest, then retrieve the
//! gzipped binary and verify its SHA-256 digest against the manifest before
//! anyone is allowed to touch it. Every validation failure is a distinct
//! [`UpdateError`](crate::core::UpdateError) kind so callers can tell a
//! poisoned channel from a corrupt download.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use flate2::read::GzDecoder;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::UpdateError;
use crate::manifest::{self, Channel, SHA256_LEN, UpdateManifest};
use crate::paths;

/// Fetches bytes from a URL.
///
/// Implementations must return `Ok(None)` only for the degenerate
/// "successful response with no content" case; the pipeline rejects it as
/// [`UpdateError::EmptyFetchResult`] rather than treating it as an empty
/// payload.
#[async_trait]
pub trait Requester: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>>;
}

/// [`Requester`] over a plain HTTPS GET.
pub struct HttpRequester {
    client: reqwest::Client,
}

impl HttpRequester {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("rollout/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Requester for HttpRequester {
    async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("request failed: {url}"))?;
        if !response.status().is_success() {
            bail!("unexpected status {} fetching {url}", response.status());
        }
        let body = response
            .bytes()
            .await
            .with_context(|| format!("failed to read response body: {url}"))?;
        Ok(Some(body.to_vec()))
    }
}

/// Resolves, retrieves, and validates one channel's published artifacts.
pub struct ReleaseFetcher {
    app_name: String,
    channel: Channel,
    manifest_base: String,
    binary_base: String,
    platform: String,
    requester: Option<Arc<dyn Requester>>,
}

impl ReleaseFetcher {
    pub fn new(
        app_name: impl Into<String>,
        channel: Channel,
        manifest_base: impl Into<String>,
        binary_base: impl Into<String>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            channel,
            manifest_base: manifest_base.into(),
            binary_base: binary_base.into(),
            platform: paths::platform(),
            requester: None,
        }
    }

    /// Attach the transport. Without one, every fetch fails with
    /// [`UpdateError::NoRequester`].
    pub fn with_requester(mut self, requester: Arc<dyn Requester>) -> Self {
        self.requester = Some(requester);
        self
    }

    /// Override the platform string (`{os}-{arch}`), e.g. to fetch for a
    /// foreign target or to pin it in tests.
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    fn requester(&self) -> Result<&Arc<dyn Requester>> {
        self.requester
            .as_ref()
            .ok_or_else(|| UpdateError::NoRequester.into())
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let body = self.requester()?.fetch(url).await?;
        body.ok_or_else(|| UpdateError::EmptyFetchResult { url: url.to_string() }.into())
    }

    /// Retrieve and validate this channel's update manifest.
    ///
    /// # Errors
    ///
    /// - [`UpdateError::InvalidHash`] when the digest is not 32 bytes
    /// - [`UpdateError::ChannelMismatch`] when the manifest declares a
    ///   different channel than the one requested
    pub async fn fetch_manifest(&self) -> Result<UpdateManifest> {
        let key = paths::manifest_key(&self.app_name, &self.channel, &self.platform);
        let url = paths::join_url(&self.manifest_base, &key);
        debug!(%url, "fetching update manifest");

        let body = self.fetch_bytes(&url).await?;
        let manifest: UpdateManifest = serde_json::from_slice(&body)
            .with_context(|| format!("malformed update manifest at {url}"))?;

        if manifest.sha256.len() != SHA256_LEN {
            return Err(UpdateError::InvalidHash {
                expected: SHA256_LEN,
                actual: manifest.sha256.len(),
            }
            .into());
        }
        if manifest.channel != self.channel {
            return Err(UpdateError::ChannelMismatch {
                expected: self.channel.to_string(),
                actual: manifest.channel.to_string(),
            }
            .into());
        }
        Ok(manifest)
    }

    /// Retrieve the gzipped binary named by `manifest`, decompress it, and
    /// verify the decompressed bytes against the manifest digest.
    ///
    /// # Errors
    ///
    /// [`UpdateError::HashMismatch`] when verification fails; the payload is
    /// dropped and never reaches the applier.
    pub async fn fetch_binary(&self, manifest: &UpdateManifest) -> Result<Vec<u8>> {
        let key = paths::binary_key(
            &self.app_name,
            &self.channel,
            &manifest.version,
            &self.platform,
        );
        let url = paths::join_url(&self.binary_base, &key);
        info!(%url, version = %manifest.version, "fetching update binary");

        let body = self.fetch_bytes(&url).await?;
        let mut binary = Vec::new();
        GzDecoder::new(body.as_slice())
            .read_to_end(&mut binary)
            .with_context(|| format!("failed to decompress update binary from {url}"))?;

        if !manifest::verify_sha256(&binary, &manifest.sha256) {
            return Err(UpdateError::HashMismatch {
                expected: hex::encode(&manifest.sha256),
                actual: hex::encode(manifest::sha256(&binary)),
            }
            .into());
        }
        Ok(binary)
    }
}
