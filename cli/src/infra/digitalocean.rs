//! DigitalOcean implementation of the `HostProvider` port.
//!
//! Covers the subset of the v2 API needed to create one droplet:
//! account keys, droplet create/get, and action status.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::ports::HostProvider;
use crate::domain::host::{
    ActionId, ActionStatus, HostAddress, HostHandle, HostId, HostRequest, KeyRef,
};

pub const DEFAULT_BASE_URL: &str = "https://api.digitalocean.com";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("digitalocean request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("digitalocean {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid droplet id: {0}")]
    InvalidId(String),
}

pub type Result<T> = std::result::Result<T, Error>;

// ── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
struct CreateDropletRequest<'a> {
    name: &'a str,
    region: &'a str,
    size: &'a str,
    image: ImageRef<'a>,
    ssh_keys: &'a [KeyRef],
    backups: bool,
}

/// Images are addressed by slug or by numeric id.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum ImageRef<'a> {
    Id(u64),
    Slug(&'a str),
}

impl<'a> ImageRef<'a> {
    fn parse(raw: &'a str) -> Self {
        raw.parse().map_or(Self::Slug(raw), Self::Id)
    }
}

#[derive(Debug, Deserialize)]
struct SshKeysResponse {
    ssh_keys: Vec<SshKey>,
}

#[derive(Debug, Deserialize)]
struct SshKey {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct DropletResponse {
    droplet: Droplet,
    #[serde(default)]
    links: Links,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    #[serde(default)]
    actions: Vec<ActionLink>,
}

#[derive(Debug, Deserialize)]
struct ActionLink {
    id: u64,
}

#[derive(Debug, Deserialize)]
struct Droplet {
    id: u64,
    #[serde(default)]
    networks: Networks,
}

#[derive(Debug, Default, Deserialize)]
struct Networks {
    #[serde(default)]
    v4: Vec<NetworkV4>,
}

#[derive(Debug, Deserialize)]
struct NetworkV4 {
    ip_address: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ActionResponse {
    action: Action,
}

#[derive(Debug, Deserialize)]
struct ActionsResponse {
    actions: Vec<Action>,
}

#[derive(Debug, Deserialize)]
struct Action {
    id: u64,
    status: String,
}

// ── Client ──────────────────────────────────────────────────────────────────

/// Client for the DigitalOcean v2 REST API.
#[derive(Clone)]
pub struct DigitalOceanClient {
    token: String,
    base_url: String,
    http: reqwest::Client,
}

impl DigitalOceanClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self> {
        Self::with_base_url(token, DEFAULT_BASE_URL, timeout)
    }

    /// Point the client at another API root, e.g. a local stub.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(
        token: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hardhost/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            token: token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v2{path}", self.base_url)
    }

    fn auth(&self) -> String {
        format!("Bearer {}", self.token)
    }

    async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api {
                endpoint,
                status,
                body: api_message(&body),
            });
        }
        Ok(resp)
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        endpoint: &'static str,
    ) -> Result<T> {
        let resp = self
            .http
            .get(self.url(path))
            .header("Authorization", self.auth())
            .send()
            .await?;

        Self::check(resp, endpoint)
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    async fn droplet_actions(&self, droplet_id: u64) -> Result<Vec<ActionId>> {
        let resp: ActionsResponse = self
            .get(&format!("/droplets/{droplet_id}/actions"), "list droplet actions")
            .await?;
        Ok(resp
            .actions
            .into_iter()
            .map(|a| ActionId(a.id.to_string()))
            .collect())
    }

    fn parse_id(raw: &str) -> Result<u64> {
        raw.parse().map_err(|_| Error::InvalidId(raw.to_string()))
    }
}

impl HostProvider for DigitalOceanClient {
    async fn list_ssh_keys(&self) -> anyhow::Result<Vec<KeyRef>> {
        let resp: SshKeysResponse = self
            .get("/account/keys?per_page=200", "list account keys")
            .await?;
        Ok(resp.ssh_keys.into_iter().map(|k| KeyRef(k.id)).collect())
    }

    async fn create_host(&self, request: &HostRequest) -> anyhow::Result<HostHandle> {
        let body = CreateDropletRequest {
            name: &request.name,
            region: &request.region,
            size: &request.size,
            image: ImageRef::parse(&request.image),
            ssh_keys: &request.ssh_keys,
            backups: request.backups,
        };
        let resp = self
            .http
            .post(self.url("/droplets"))
            .header("Authorization", self.auth())
            .json(&body)
            .send()
            .await
            .map_err(Error::from)?;
        let created: DropletResponse = Self::check(resp, "create droplet")
            .await?
            .json()
            .await
            .map_err(Error::from)?;

        let droplet_id = created.droplet.id;
        let mut pending_actions = action_ids(&created.links);
        if pending_actions.is_empty() {
            // The droplet exists from here on; a failed lookup must not read
            // as a rejected create.
            match self.droplet_actions(droplet_id).await {
                Ok(ids) => pending_actions = ids,
                Err(e) => tracing::warn!(droplet_id, error = %e, "could not list droplet actions"),
            }
        }
        tracing::info!(droplet_id, actions = pending_actions.len(), "droplet create accepted");

        Ok(HostHandle {
            id: HostId(droplet_id.to_string()),
            pending_actions,
        })
    }

    async fn action_status(&self, action: &ActionId) -> anyhow::Result<ActionStatus> {
        let resp: ActionResponse = self
            .get(&format!("/actions/{}", action.0), "get action")
            .await?;
        tracing::trace!(action = resp.action.id, status = %resp.action.status, "action fetched");
        Ok(ActionStatus::parse(&resp.action.status))
    }

    async fn host_address(&self, host: &HostId) -> anyhow::Result<Option<HostAddress>> {
        let id = Self::parse_id(&host.0)?;
        let resp: DropletResponse = self.get(&format!("/droplets/{id}"), "get droplet").await?;
        Ok(public_ipv4(&resp.droplet))
    }
}

/// The `message` of an API error document, else the raw body.
fn api_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message")?.as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn action_ids(links: &Links) -> Vec<ActionId> {
    links
        .actions
        .iter()
        .map(|a| ActionId(a.id.to_string()))
        .collect()
}

fn public_ipv4(droplet: &Droplet) -> Option<HostAddress> {
    droplet
        .networks
        .v4
        .iter()
        .find(|net| net.kind == "public")
        .map(|net| HostAddress(net.ip_address.clone()))
}
