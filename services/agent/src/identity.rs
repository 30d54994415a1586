//! Host identity from the instance metadata service.
//!
//! Resolves which instance this process runs on and in which region. The
//! run cannot scope anything without it, so every failure here is fatal.
//! One attempt per request; no retries.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};
use volsnap_id::{IdError, InstanceId};

/// Default metadata service base URL.
pub const DEFAULT_METADATA_URL: &str = "http://169.254.169.254/latest";

/// Lifetime requested for an IMDSv2 session token.
const TOKEN_TTL_SECS: u32 = 300;

const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";

const INSTANCE_ID_PATH: &str = "meta-data/instance-id";
const ZONE_PATH: &str = "meta-data/placement/availability-zone";

/// Identity resolution errors.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("failed to build metadata client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("metadata endpoint unreachable for {path}: {source}")]
    Unreachable {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("metadata endpoint returned {status} for {path}")]
    Status { path: String, status: u16 },

    #[error("metadata endpoint returned an empty value for {0}")]
    Empty(String),

    #[error("invalid instance id from metadata: {0}")]
    InvalidInstanceId(#[from] IdError),

    #[error("cannot derive region from availability zone '{0}'")]
    InvalidZone(String),
}

/// Where this process runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub instance_id: InstanceId,
    pub availability_zone: String,
    pub region: String,
}

/// Minimal instance metadata service client.
pub struct MetadataClient {
    client: reqwest::Client,
    base_url: String,
}

impl MetadataClient {
    /// Create a client for `base_url` (e.g. [`DEFAULT_METADATA_URL`]).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(IdentityError::Client)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve instance id, zone and region.
    ///
    /// `region_override` replaces the region derived from the zone.
    pub async fn resolve(&self, region_override: Option<&str>) -> Result<Identity, IdentityError> {
        let token = self.session_token().await;

        let instance_id = self.get(INSTANCE_ID_PATH, token.as_deref()).await?;
        let instance_id = InstanceId::parse(&instance_id)?;
        let availability_zone = self.get(ZONE_PATH, token.as_deref()).await?;

        let region = match region_override {
            Some(region) => region.to_string(),
            None => region_from_zone(&availability_zone)
                .ok_or_else(|| IdentityError::InvalidZone(availability_zone.clone()))?,
        };

        info!(
            instance_id = %instance_id,
            availability_zone = %availability_zone,
            region = %region,
            "Resolved host identity"
        );

        Ok(Identity {
            instance_id,
            availability_zone,
            region,
        })
    }

    /// Request an IMDSv2 session token. `None` falls back to IMDSv1 reads.
    async fn session_token(&self) -> Option<String> {
        let url = format!("{}/api/token", self.base_url);
        let response = self
            .client
            .put(&url)
            .header(TOKEN_TTL_HEADER, TOKEN_TTL_SECS.to_string())
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => {
                let token = r.text().await.ok()?;
                let token = token.trim();
                (!token.is_empty()).then(|| token.to_string())
            }
            Ok(r) => {
                debug!(status = %r.status(), "Metadata token refused, using IMDSv1");
                None
            }
            Err(e) => {
                debug!(error = %e, "Metadata token request failed, using IMDSv1");
                None
            }
        }
    }

    async fn get(&self, path: &str, token: Option<&str>) -> Result<String, IdentityError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!(url = %url, "Fetching instance metadata");

        let mut request = self.client.get(&url);
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request
            .send()
            .await
            .map_err(|source| IdentityError::Unreachable {
                path: path.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(IdentityError::Status {
                path: path.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|source| IdentityError::Unreachable {
                path: path.to_string(),
                source,
            })?;

        let value = body.trim();
        if value.is_empty() {
            return Err(IdentityError::Empty(path.to_string()));
        }
        Ok(value.to_string())
    }
}

/// Region of an availability zone: the zone minus its trailing zone letter.
///
/// `us-east-1a` → `us-east-1`. Returns `None` when the input does not end in
/// a digit followed by one letter.
pub fn region_from_zone(zone: &str) -> Option<String> {
    let zone = zone.trim();
    let mut chars = zone.chars().rev();
    let letter = chars.next()?;
    let digit = chars.next()?;
    if letter.is_ascii_lowercase() && digit.is_ascii_digit() {
        Some(zone[..zone.len() - 1].to_string())
    } else {
        None
    }
}
