use crate::config::{AdminCredentials, ConnectionInfo, RoleSpec, TlsMode};
use crate::connection::RoleSession;
use crate::provision::{provision, Outcome};
use crate::resolver::{resolve_instance, InstanceDescriptor};
use crate::workspace::ControlPlane;
use anyhow::Result;
use log::info;

/// Validated inputs for one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub instance_name: String,
    pub admin: AdminCredentials,
    pub role: RoleSpec,
    pub tls: TlsMode,
    pub dryrun: bool,
}

#[derive(Debug)]
pub struct Report {
    pub instance: InstanceDescriptor,
    pub outcome: Outcome,
    /// `None` for dry runs.
    pub postgres_url: Option<String>,
}

/// `postgresql://{role}:{password}@{host}:{port}/{database}`
///
/// The password is percent-encoded; role names are already URL safe.
pub fn connection_string(instance: &InstanceDescriptor, role: &RoleSpec) -> String {
    format!(
        "postgresql://{}:{}@{}:{}/{}",
        role.role_name,
        urlencoding::encode(&role.role_password),
        instance.host,
        instance.port,
        instance.database
    )
}

/// Resolve the instance, connect with `connect`, provision the role and
/// print the connection string.
///
/// Each stage only starts when the previous one succeeded: nothing connects
/// for an unknown instance, and nothing is executed if connecting fails.
pub fn run<S, F>(options: &RunOptions, control_plane: &dyn ControlPlane, connect: F) -> Result<Report>
where
    S: RoleSession,
    F: FnOnce(&ConnectionInfo) -> Result<S>,
{
    println!(
        "Setting up database role for instance: {}",
        options.instance_name
    );

    let instance = resolve_instance(control_plane, &options.instance_name)?;
    println!("Resolved database at {}:{}", instance.host, instance.port);

    let info = ConnectionInfo {
        host: instance.host.clone(),
        port: instance.port,
        database: instance.database.clone(),
        admin: options.admin.clone(),
        tls: options.tls,
    };
    let mut session = connect(&info)?;

    let outcome = provision(&mut session, &instance, &options.role, options.dryrun)?;

    if options.dryrun {
        info!("Dry-run: no changes were made to {}", info.target());
        return Ok(Report {
            instance,
            outcome,
            postgres_url: None,
        });
    }

    let postgres_url = connection_string(&instance, &options.role);
    println!();
    println!("Connection string for the app:");
    println!("POSTGRES_URL={}", postgres_url);
    println!();
    println!("Please store this connection string in your secrets management system.");

    Ok(Report {
        instance,
        outcome,
        postgres_url: Some(postgres_url),
    })
}
