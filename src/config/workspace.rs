use anyhow::{anyhow, Result};
use log::debug;
use std::fmt;

pub const ENV_HOST: &str = "DATABRICKS_HOST";
pub const ENV_TOKEN: &str = "DATABRICKS_TOKEN";
pub const ENV_CLIENT_ID: &str = "DATABRICKS_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "DATABRICKS_CLIENT_SECRET";

/// How requests to the workspace control plane are authenticated.
#[derive(Clone, PartialEq, Eq)]
pub enum WorkspaceAuth {
    /// Personal access token, sent as a bearer token.
    Token(String),
    /// Service principal, exchanged for an OAuth token (client credentials).
    ServicePrincipal {
        client_id: String,
        client_secret: String,
    },
}

impl fmt::Debug for WorkspaceAuth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WorkspaceAuth::Token(_) => write!(f, "Token(********)"),
            WorkspaceAuth::ServicePrincipal { client_id, .. } => f
                .debug_struct("ServicePrincipal")
                .field("client_id", client_id)
                .field("client_secret", &"********")
                .finish(),
        }
    }
}

impl fmt::Display for WorkspaceAuth {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            WorkspaceAuth::Token(_) => write!(f, "personal access token"),
            WorkspaceAuth::ServicePrincipal { .. } => write!(f, "OAuth service principal"),
        }
    }
}

/// Workspace control-plane configuration.
///
/// Read from the environment:
/// ```sh
/// DATABRICKS_HOST=https://my-workspace.cloud.databricks.com
/// DATABRICKS_TOKEN=dapi...                  # or:
/// DATABRICKS_CLIENT_ID=... DATABRICKS_CLIENT_SECRET=...
/// ```
///
/// A token takes precedence over service principal credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConfig {
    pub host: String,
    pub auth: WorkspaceAuth,
}

impl WorkspaceConfig {
    pub fn new(host: &str, auth: WorkspaceAuth) -> Self {
        Self {
            host: normalize_host(host),
            auth,
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| {
            if envmnt::exists(key) {
                Some(envmnt::get_or(key, ""))
            } else {
                None
            }
        })
    }

    /// Build the config from any key/value source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host = get(ENV_HOST).ok_or_else(|| anyhow!("config: {} is not set", ENV_HOST))?;

        let auth = match (get(ENV_TOKEN), get(ENV_CLIENT_ID), get(ENV_CLIENT_SECRET)) {
            (Some(token), _, _) => WorkspaceAuth::Token(token),
            (None, Some(client_id), Some(client_secret)) => WorkspaceAuth::ServicePrincipal {
                client_id,
                client_secret,
            },
            (None, Some(_), None) => {
                return Err(anyhow!(
                    "config: {} is set but {} is not",
                    ENV_CLIENT_ID,
                    ENV_CLIENT_SECRET
                ))
            }
            (None, None, _) => {
                return Err(anyhow!(
                    "config: no workspace credentials, set {} or {} and {}",
                    ENV_TOKEN,
                    ENV_CLIENT_ID,
                    ENV_CLIENT_SECRET
                ))
            }
        };

        let config = Self::new(&host, auth);
        debug!("workspace config: {:?}", config);

        Ok(config)
    }
}

/// `my-workspace.cloud.databricks.com/` -> `https://my-workspace.cloud.databricks.com`
fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("https://") || host.starts_with("http://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}
