//! Credential lookup: token and broadcast host list for a room.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::{ConnectionConfig, HostAddr};
use crate::error::{ClientError, ClientResult};
use crate::transport::BoxFuture;

/// Path of the room connection-info endpoint.
const DANMU_INFO_PATH: &str = "/xlive/web-room/v1/index/getDanmuInfo";

/// Default HTTP timeout for the lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Supplies the [`ConnectionConfig`] for a room.
pub trait CredentialSource: Send + Sync {
    /// Looks up the token and host list for `room_id`.
    fn lookup(&self, room_id: u64) -> BoxFuture<'_, ClientResult<ConnectionConfig>>;
}

/// Fixed token and host list, e.g. from the config file.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    token: String,
    hosts: Vec<HostAddr>,
}

impl StaticCredentials {
    /// Creates a static source.
    pub fn new(token: impl Into<String>, hosts: Vec<HostAddr>) -> Self {
        Self {
            token: token.into(),
            hosts,
        }
    }
}

impl CredentialSource for StaticCredentials {
    fn lookup(&self, room_id: u64) -> BoxFuture<'_, ClientResult<ConnectionConfig>> {
        Box::pin(async move {
            if self.hosts.is_empty() {
                return Err(ClientError::Credentials("no hosts configured".into()));
            }
            Ok(ConnectionConfig {
                auth_token: self.token.clone(),
                host_list: self.hosts.clone(),
                room_id,
            })
        })
    }
}

/// Looks up credentials through the platform's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpCredentialSource {
    http_client: reqwest::Client,
    api_base: Url,
}

impl HttpCredentialSource {
    /// Creates a source for the API at `api_base`.
    pub fn new(api_base: &str, timeout: Duration) -> ClientResult<Self> {
        let api_base = Url::parse(api_base)
            .map_err(|e| ClientError::Config(format!("invalid api_base {:?}: {}", api_base, e)))?;
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("livechat/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http_client,
            api_base,
        })
    }

    /// Returns the lookup URL for `room_id`.
    pub fn endpoint(&self, room_id: u64) -> ClientResult<Url> {
        let mut url = self
            .api_base
            .join(DANMU_INFO_PATH)
            .map_err(|e| ClientError::Config(format!("invalid api_base: {}", e)))?;
        url.query_pairs_mut()
            .append_pair("id", &room_id.to_string())
            .append_pair("type", "0");
        Ok(url)
    }

    async fn fetch(&self, room_id: u64) -> ClientResult<ConnectionConfig> {
        let url = self.endpoint(room_id)?;
        debug!(url = %url, "looking up room credentials");

        let response = self.http_client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Credentials(format!(
                "credential API returned HTTP {}",
                status
            )));
        }

        let body: ApiResponse = response.json().await?;
        body.into_config(room_id)
    }
}

impl CredentialSource for HttpCredentialSource {
    fn lookup(&self, room_id: u64) -> BoxFuture<'_, ClientResult<ConnectionConfig>> {
        Box::pin(self.fetch(room_id))
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<DanmuInfo>,
}

#[derive(Debug, Deserialize)]
struct DanmuInfo {
    token: String,
    #[serde(default)]
    host_list: Vec<ApiHost>,
}

#[derive(Debug, Deserialize)]
struct ApiHost {
    host: String,
    wss_port: u16,
}

impl ApiResponse {
    fn into_config(self, room_id: u64) -> ClientResult<ConnectionConfig> {
        if self.code != 0 {
            warn!(code = self.code, message = %self.message, "credential API refused lookup");
            return Err(ClientError::Credentials(format!(
                "API code {}: {}",
                self.code, self.message
            )));
        }

        let data = self
            .data
            .ok_or_else(|| ClientError::Credentials("response has no data".into()))?;
        if data.host_list.is_empty() {
            return Err(ClientError::Credentials("empty host list".into()));
        }

        Ok(ConnectionConfig {
            auth_token: data.token,
            host_list: data
                .host_list
                .into_iter()
                .map(|h| HostAddr::new(h.host, h.wss_port))
                .collect(),
            room_id,
        })
    }
}
