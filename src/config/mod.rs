pub mod connection;
pub mod role;
pub mod workspace;

pub use connection::{AdminCredentials, ConnectionInfo, TlsMode};
pub use role::RoleSpec;
pub use workspace::{WorkspaceAuth, WorkspaceConfig};

/// The database every migration role is provisioned in.
pub const DEFAULT_DATABASE: &str = "chatbot_db";

/// Lakebase instances always serve Postgres on the standard port.
pub const DEFAULT_PORT: u16 = 5432;

pub const DEFAULT_ROLE_NAME: &str = "app_migrator";
