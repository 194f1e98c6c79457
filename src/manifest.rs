//! Data model for published updates and tracked versions.
//!
//! [`UpdateManifest`] is the immutable wire record describing one published
//! artifact. Its JSON field names (`Version`, `Sha256`, `Channel`, `Date`) are
//! fixed: manifests written by older publishers must keep round-tripping, so
//! the digest is carried as standard base64 and the date as RFC 3339.
//!
//! [`TrackedVersion`] is the mutable promotion record keyed by version string.
//! It is created when a version is first published to `dev` and mutated only
//! by the [`ChannelPromoter`](crate::promote::ChannelPromoter).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Byte length of a SHA-256 digest.
pub const SHA256_LEN: usize = 32;

const STABLE: &str = "stable";

/// A named release track (dev, beta, stable, ...).
///
/// `stable` is the default channel and is addressed without a channel path
/// segment in the release layout. Channel names are free-form so deployments
/// can add tracks (e.g. `nightly`) without touching this crate; the promotion
/// gates only recognize `dev` and `beta` as pre-stable stages.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(String);

impl Channel {
    /// Create a channel from a name. An empty name means `stable`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        if name.is_empty() { Self(STABLE.to_string()) } else { Self(name) }
    }

    /// The `dev` channel.
    pub fn dev() -> Self {
        Self("dev".to_string())
    }

    /// The `beta` channel.
    pub fn beta() -> Self {
        Self("beta".to_string())
    }

    /// The `stable` channel.
    pub fn stable() -> Self {
        Self(STABLE.to_string())
    }

    /// The channel name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the stable channel (addressed without a path segment).
    pub fn is_stable(&self) -> bool {
        self.0 == STABLE
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::stable()
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Channel {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

/// Metadata describing one published artifact.
///
/// Published once per `(channel, version)` pair and never mutated; promotion
/// writes a *new* manifest copy under the destination channel with a
/// refreshed [`date`](Self::date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateManifest {
    /// Version string of the published binary.
    pub version: String,
    /// SHA-256 digest of the *uncompressed* binary, base64 on the wire.
    #[serde(with = "sha256_base64")]
    pub sha256: Vec<u8>,
    /// Channel this manifest was published under.
    pub channel: Channel,
    /// Publication time.
    pub date: DateTime<Utc>,
}

impl UpdateManifest {
    /// The manifest this artifact gets when promoted to `channel`: same
    /// version and digest, refreshed publication time.
    pub fn promoted(&self, channel: Channel, date: DateTime<Utc>) -> Self {
        Self {
            version: self.version.clone(),
            sha256: self.sha256.clone(),
            channel,
            date,
        }
    }
}

/// Mutable promotion record for one version, keyed by the version string.
///
/// `dev_approved` is set only on the dev -> beta transition and
/// `beta_approved` only on beta -> stable; a record is eligible for at most
/// one forward transition per promotion scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedVersion {
    /// Version string, the record's primary key.
    pub version: String,
    /// Channel the version currently lives in.
    pub channel: Channel,
    /// When the version landed in its current channel.
    pub date: DateTime<Utc>,
    /// Set when the version was promoted out of dev.
    #[serde(default)]
    pub dev_approved: bool,
    /// Set when the version was promoted out of beta.
    #[serde(default)]
    pub beta_approved: bool,
}

/// Compute the SHA-256 digest of `bytes`.
pub fn sha256(bytes: &[u8]) -> [u8; SHA256_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Whether `bytes` hashes to `expected`.
pub fn verify_sha256(bytes: &[u8], expected: &[u8]) -> bool {
    sha256(bytes).as_slice() == expected
}

/// Serde adapter: digest bytes as a standard-alphabet base64 string.
mod sha256_base64 {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
