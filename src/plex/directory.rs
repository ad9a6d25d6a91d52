//! Server discovery through the plex.tv resource directory.

use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{header, Client as HttpClient};
use serde::Deserialize;
use serde_json::Value;

use super::{ServerEndpoint, TOKEN_HEADER};
use crate::error::{Error, Result};

const RESOURCES_PATH: &str = "/api/v2/resources";
const ACCOUNT_PATH: &str = "/users/account";
const CLIENT_ID_HEADER: &str = "X-Plex-Client-Identifier";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Resource {
    name: Option<String>,
    provides: Option<String>,
    access_token: Option<String>,
    product_version: Option<String>,
    platform_version: Option<String>,
    owner: Option<ResourceOwner>,
    connections: Vec<Connection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResourceOwner {
    username: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Connection {
    uri: Option<String>,
    local: Option<bool>,
}

impl Resource {
    fn provides_server(&self) -> bool {
        self.provides
            .as_deref()
            .is_some_and(|p| p.split(',').any(|c| c.trim() == "server"))
    }

    /// First URI not flagged local. Reachability is not checked.
    fn external_uri(&self) -> Option<&str> {
        self.connections
            .iter()
            .filter(|c| c.local == Some(false))
            .find_map(|c| c.uri.as_deref().filter(|u| !u.is_empty()))
    }

    fn owner_name(&self) -> Option<&str> {
        self.owner
            .as_ref()
            .and_then(|o| o.username.as_deref())
            .filter(|u| !u.is_empty())
    }
}

/// Client for the plex.tv directory and account services.
pub struct Directory {
    http: HttpClient,
    base_url: String,
    client_identifier: String,
    timeout: Duration,
}

impl Directory {
    pub fn new(http: HttpClient, base_url: &str, client_identifier: &str, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            client_identifier: client_identifier.to_string(),
            timeout,
        }
    }

    /// Find the first server resource with an external connection.
    pub async fn discover(&self, credential: &str) -> Result<ServerEndpoint> {
        let body = self
            .get(RESOURCES_PATH, credential)
            .await
            .map_err(|e| Error::Discovery(e.to_string()))?;
        let resources: Vec<Value> = serde_json::from_str(&body)
            .map_err(|e| Error::Discovery(format!("unreadable resource list: {e}")))?;

        // Entries that do not match the expected shape are not servers we can use.
        let (resource, uri) = resources
            .into_iter()
            .filter_map(|r| Resource::deserialize(r).ok())
            .filter(|r| r.provides_server())
            .find_map(|r| {
                let uri = r.external_uri()?.to_string();
                Some((r, uri))
            })
            .ok_or_else(|| Error::Discovery("no server with an external connection".to_string()))?;

        let owner = match resource.owner_name() {
            Some(name) => Some(name.to_string()),
            None => self.account_username(credential).await,
        };
        tracing::info!(
            server = resource.name.as_deref().unwrap_or("unknown"),
            owner = owner.as_deref().unwrap_or("unknown"),
            "discovered Plex server"
        );

        Ok(ServerEndpoint {
            base_url: uri,
            access_token: resource
                .access_token
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| credential.to_string()),
            version: resource
                .product_version
                .clone()
                .or_else(|| resource.platform_version.clone()),
            owner,
            name: resource.name,
        })
    }

    /// Owner lookup through the account endpoint. Best-effort.
    async fn account_username(&self, credential: &str) -> Option<String> {
        match self.get(ACCOUNT_PATH, credential).await {
            Ok(body) => {
                let name = parse_account_username(&body);
                if name.is_none() {
                    tracing::debug!("account response carried no username");
                }
                name
            }
            Err(e) => {
                tracing::warn!("Could not look up account owner: {}", e);
                None
            }
        }
    }

    async fn get(&self, path: &str, credential: &str) -> Result<String> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header(header::ACCEPT, "application/json")
            .header(TOKEN_HEADER, credential)
            .header(CLIENT_ID_HEADER, &self.client_identifier)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::fetch(path, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(path, format!("status {status}")));
        }
        response.text().await.map_err(|e| Error::fetch(path, e))
    }
}

/// `username` from a JSON account document (flat or under `user`), or the
/// `username` attribute of an XML root element.
fn parse_account_username(body: &str) -> Option<String> {
    let body = body.trim_start();
    if body.starts_with('<') {
        let mut reader = Reader::from_str(body);
        loop {
            match reader.read_event().ok()? {
                Event::Start(e) | Event::Empty(e) => {
                    return e
                        .try_get_attribute("username")
                        .ok()
                        .flatten()
                        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
                        .filter(|u| !u.is_empty());
                }
                Event::Eof => return None,
                _ => {}
            }
        }
    }

    let json: Value = serde_json::from_str(body).ok()?;
    json.get("username")
        .or_else(|| json.get("user").and_then(|u| u.get("username")))
        .and_then(Value::as_str)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
}
