use crate::config::{DEFAULT_DATABASE, DEFAULT_PORT};
use crate::workspace::ControlPlane;
use log::{debug, info};
use thiserror::Error;

/// Connection endpoint of a resolved database instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDescriptor {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub database: String,
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("database instance name is empty")]
    EmptyName,

    #[error("database instance '{0}' not found")]
    NotFound(String),

    #[error("database instance name '{name}' is ambiguous: {count} instances share it")]
    Ambiguous { name: String, count: usize },

    #[error("database instance '{name}' has no read/write endpoint (state: {state})")]
    NoEndpoint { name: String, state: String },

    #[error("error getting database connection info: {0:#}")]
    ControlPlane(anyhow::Error),
}

/// Find the instance named exactly `name` and return its endpoint.
///
/// The name must match one visible instance. Zero or several matches fail
/// before anything connects to a database.
pub fn resolve_instance(
    control_plane: &dyn ControlPlane,
    name: &str,
) -> Result<InstanceDescriptor, ResolveError> {
    if name.trim().is_empty() {
        return Err(ResolveError::EmptyName);
    }

    let instances = control_plane
        .list_database_instances()
        .map_err(ResolveError::ControlPlane)?;

    let count = instances.iter().filter(|i| i.name == name).count();
    debug!(
        "{} instance(s) visible, {} named '{}'",
        instances.len(),
        count,
        name
    );

    match count {
        0 => return Err(ResolveError::NotFound(name.to_string())),
        1 => (),
        count => {
            return Err(ResolveError::Ambiguous {
                name: name.to_string(),
                count,
            })
        }
    }

    let instance = control_plane
        .get_database_instance(name)
        .map_err(ResolveError::ControlPlane)?;

    let host = match instance.read_write_dns.filter(|h| !h.is_empty()) {
        Some(host) => host,
        None => {
            return Err(ResolveError::NoEndpoint {
                name: name.to_string(),
                state: instance.state.unwrap_or_else(|| "unknown".to_string()),
            })
        }
    };

    info!("Resolved instance '{}' to {}:{}", name, host, DEFAULT_PORT);

    Ok(InstanceDescriptor {
        name: instance.name,
        host,
        port: DEFAULT_PORT,
        database: DEFAULT_DATABASE.to_string(),
    })
}
