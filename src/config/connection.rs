use anyhow::{anyhow, Result};
use postgres::config::SslMode;
use std::fmt;
use std::str::FromStr;

/// TLS mode for the admin connection. Supported values: disable, require
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    Disable,
    #[default]
    Require,
}

impl FromStr for TlsMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "disable" => Ok(TlsMode::Disable),
            "require" => Ok(TlsMode::Require),
            other => Err(anyhow!(
                "unknown sslmode `{}`, expected one of: disable, require",
                other
            )),
        }
    }
}

impl fmt::Display for TlsMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TlsMode::Disable => write!(f, "disable"),
            TlsMode::Require => write!(f, "require"),
        }
    }
}

/// The administrative login used to provision the role.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"********")
            .finish()
    }
}

/// Everything needed to open the admin connection to a resolved instance.
/// The admin user should have the permission to create roles and grant
/// privileges on the target database.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub admin: AdminCredentials,
    pub tls: TlsMode,
}

impl ConnectionInfo {
    /// `host:port/database`, for messages. Never includes credentials.
    pub fn target(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }

    pub fn to_pg_config(&self) -> postgres::Config {
        let mut config = postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .dbname(&self.database)
            .user(&self.admin.username)
            .password(&self.admin.password)
            .application_name(env!("CARGO_PKG_NAME"))
            .ssl_mode(match self.tls {
                TlsMode::Disable => SslMode::Disable,
                TlsMode::Require => SslMode::Require,
            });

        config
    }
}
