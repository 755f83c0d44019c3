use crate::config::{WorkspaceAuth, WorkspaceConfig};
use anyhow::{anyhow, Context, Result};
use log::debug;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::cell::RefCell;

/// A managed Postgres instance as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseInstance {
    pub name: String,
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    /// Hostname of the read/write endpoint. Absent until the instance is up.
    #[serde(default)]
    pub read_write_dns: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListDatabaseInstancesResponse {
    #[serde(default)]
    database_instances: Vec<DatabaseInstance>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// The workspace operations needed to find an instance's endpoint.
pub trait ControlPlane {
    /// All instances visible to the caller, every page.
    fn list_database_instances(&self) -> Result<Vec<DatabaseInstance>>;

    fn get_database_instance(&self, name: &str) -> Result<DatabaseInstance>;
}

/// Blocking REST client for the workspace control plane.
pub struct WorkspaceClient {
    config: WorkspaceConfig,
    client: Client,
    token: RefCell<Option<String>>,
}

impl WorkspaceClient {
    pub fn new(config: &WorkspaceConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("could not build HTTP client")?;

        Ok(Self {
            config: config.clone(),
            client,
            token: RefCell::new(None),
        })
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Bearer token for API calls. Service principal tokens are minted once
    /// per client.
    fn token(&self) -> Result<String> {
        if let Some(token) = self.token.borrow().as_ref() {
            return Ok(token.clone());
        }

        let token = match &self.config.auth {
            WorkspaceAuth::Token(token) => token.clone(),
            WorkspaceAuth::ServicePrincipal {
                client_id,
                client_secret,
            } => self.fetch_oauth_token(client_id, client_secret)?,
        };

        *self.token.borrow_mut() = Some(token.clone());
        Ok(token)
    }

    fn fetch_oauth_token(&self, client_id: &str, client_secret: &str) -> Result<String> {
        let url = format!("{}/oidc/v1/token", self.config.host);
        debug!("requesting OAuth token from {}", url);

        let request = self
            .client
            .post(&url)
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials"), ("scope", "all-apis")]);

        let token: TokenResponse = send_json(request, "OAuth token request")?;
        Ok(token.access_token)
    }

    fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)], what: &str) -> Result<T> {
        let url = format!("{}{}", self.config.host, path);
        debug!("GET {} {:?}", url, query);

        let request = self
            .client
            .get(&url)
            .bearer_auth(self.token()?)
            .query(query);

        send_json(request, what)
    }
}

impl ControlPlane for WorkspaceClient {
    fn list_database_instances(&self) -> Result<Vec<DatabaseInstance>> {
        let mut instances = vec![];
        let mut page_token: Option<String> = None;

        loop {
            let query: Vec<(&str, &str)> = match &page_token {
                Some(token) => vec![("page_token", token.as_str())],
                None => vec![],
            };

            let page: ListDatabaseInstancesResponse =
                self.get("/api/2.0/database/instances", &query, "list database instances")?;
            instances.extend(page.database_instances);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) if Some(&next) == page_token.as_ref() => {
                    return Err(anyhow!(
                        "list database instances: control plane returned the same page token twice"
                    ));
                }
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!("found {} database instance(s)", instances.len());
        Ok(instances)
    }

    fn get_database_instance(&self, name: &str) -> Result<DatabaseInstance> {
        let path = format!("/api/2.0/database/instances/{}", urlencoding::encode(name));
        self.get(&path, &[], &format!("get database instance '{}'", name))
    }
}

fn send_json<T: DeserializeOwned>(request: RequestBuilder, what: &str) -> Result<T> {
    let response = request
        .send()
        .with_context(|| format!("{}: request failed", what))?;

    let response = check_status(response, what)?;

    response
        .json::<T>()
        .with_context(|| format!("{}: could not parse response", what))
}

fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    Err(anyhow!("{}: HTTP {}: {}", what, status, body.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn test_parse_list_response() {
        let body = indoc! {r#"
            {
              "database_instances": [
                {
                  "name": "chatbot-lakebase",
                  "uid": "b2c1",
                  "state": "AVAILABLE",
                  "read_write_dns": "instance-b2c1.database.cloud.databricks.com",
                  "capacity": "CU_1"
                },
                { "name": "starting", "state": "STARTING" }
              ],
              "next_page_token": "abc"
            }
        "#};

        let page: ListDatabaseInstancesResponse = serde_json::from_str(body).unwrap();

        assert_eq!(page.database_instances.len(), 2);
        assert_eq!(
            page.database_instances[0].read_write_dns.as_deref(),
            Some("instance-b2c1.database.cloud.databricks.com")
        );
        assert_eq!(page.database_instances[1].read_write_dns, None);
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
    }

    #[test]
    fn test_parse_empty_list_response() {
        let page: ListDatabaseInstancesResponse = serde_json::from_str("{}").unwrap();
        assert!(page.database_instances.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn test_client_uses_configured_token() {
        let config = WorkspaceConfig::new("example.com", WorkspaceAuth::Token("dapi".to_string()));
        let client = WorkspaceClient::new(&config).unwrap();

        assert_eq!(client.host(), "https://example.com");
        assert_eq!(client.token().unwrap(), "dapi");
    }
}
