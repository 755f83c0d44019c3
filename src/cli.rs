use crate::config::{AdminCredentials, RoleSpec, TlsMode};
use crate::run::RunOptions;
use anyhow::Result;
use structopt::StructOpt;

/// Create or update a least-privilege database role for running migrations
/// on a Lakebase database instance.
///
/// Workspace credentials are read from DATABRICKS_HOST and either
/// DATABRICKS_TOKEN or DATABRICKS_CLIENT_ID / DATABRICKS_CLIENT_SECRET.
#[derive(Debug, StructOpt)]
#[structopt(name = "lakebase-role")]
pub struct Cli {
    /// Name of the Lakebase database instance
    #[structopt(long)]
    pub instance_name: String,

    /// Admin username for the database
    #[structopt(long)]
    pub admin_username: String,

    /// Admin password for the database
    #[structopt(long)]
    pub admin_password: String,

    /// Name of the role to create
    #[structopt(long, default_value = "app_migrator")]
    pub role_name: String,

    /// Password for the role
    #[structopt(long)]
    pub role_password: String,

    /// TLS for the admin connection: require or disable
    #[structopt(long, default_value = "require")]
    pub sslmode: TlsMode,

    /// Dry run: show the statements without changing anything
    #[structopt(short, long)]
    pub dryrun: bool,
}

impl Cli {
    /// Validate the arguments. The role name is checked here, before any
    /// network call.
    pub fn to_options(&self) -> Result<RunOptions> {
        Ok(RunOptions {
            instance_name: self.instance_name.clone(),
            admin: AdminCredentials {
                username: self.admin_username.clone(),
                password: self.admin_password.clone(),
            },
            role: RoleSpec::new(&self.role_name, &self.role_password)?,
            tls: self.sslmode,
            dryrun: self.dryrun,
        })
    }
}

// Parse the command line arguments
pub fn parse() -> Cli {
    Cli::from_args()
}
