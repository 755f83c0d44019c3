use crate::config::{ConnectionInfo, TlsMode};
use crate::sql::{RoleName, Statement};
use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use postgres::{Client, NoTls};
use std::sync::Arc;
use tokio_postgres_rustls::MakeRustlsConnect;

/// What the provisioner needs from a database session.
pub trait RoleSession {
    /// Whether a role with exactly this name exists.
    fn role_exists(&mut self, role: &RoleName) -> Result<bool>;

    /// Run `statements` in order, all or nothing.
    fn apply(&mut self, statements: &[Statement]) -> Result<()>;
}

impl<T: RoleSession + ?Sized> RoleSession for &mut T {
    fn role_exists(&mut self, role: &RoleName) -> Result<bool> {
        (**self).role_exists(role)
    }

    fn apply(&mut self, statements: &[Statement]) -> Result<()> {
        (**self).apply(statements)
    }
}

/// Administrative connection to the target database.
pub struct DbConnection {
    target: String,
    client: Client,
}

impl DbConnection {
    /// Connect as the admin user described by `info`.
    ///
    /// With `TlsMode::Require` the server certificate is verified against
    /// the webpki roots.
    pub fn connect(info: &ConnectionInfo) -> Result<Self> {
        let target = info.target();
        let config = info.to_pg_config();

        let client = match info.tls {
            TlsMode::Disable => config.connect(NoTls),
            TlsMode::Require => config.connect(rustls_connector()?),
        }
        .with_context(|| {
            format!(
                "could not connect to {} as '{}'",
                target, info.admin.username
            )
        })?;

        info!("Connected to database: {}", target);

        Ok(Self { target, client })
    }

    /// Returns `host:port/database`
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Ping the database
    pub fn ping(&mut self) -> Result<bool> {
        let rows = self.client.execute("SELECT 1", &[])?;
        Ok(rows == 1)
    }
}

impl RoleSession for DbConnection {
    fn role_exists(&mut self, role: &RoleName) -> Result<bool> {
        let row = self
            .client
            .query_opt("SELECT 1 FROM pg_roles WHERE rolname = $1", &[&role.as_str()])
            .with_context(|| format!("could not look up role '{}'", role))?;

        debug!("role_exists({}): {}", role, row.is_some());

        Ok(row.is_some())
    }

    fn apply(&mut self, statements: &[Statement]) -> Result<()> {
        let mut transaction = self
            .client
            .transaction()
            .context("could not start transaction")?;

        for statement in statements {
            debug!("execute: {}", statement);

            // simple query protocol: utility statements take no bind parameters
            transaction
                .batch_execute(&statement.sql)
                .with_context(|| format!("{} failed: {}", statement.step, statement))?;
        }

        transaction
            .commit()
            .with_context(|| format!("could not commit role changes on {}", self.target))?;

        Ok(())
    }
}

fn rustls_connector() -> Result<MakeRustlsConnect> {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .map_err(|e| anyhow!("could not configure TLS: {}", e))?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(MakeRustlsConnect::new(config))
}

// These tests need a local Postgres, like the rest of the DB tests:
// `cargo test -- --ignored`
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdminCredentials;
    use crate::sql::Grant;
    use rand::{thread_rng, Rng};

    fn local() -> ConnectionInfo {
        ConnectionInfo {
            host: "localhost".to_string(),
            port: 5432,
            database: "postgres".to_string(),
            admin: AdminCredentials {
                username: "postgres".to_string(),
                password: "postgres".to_string(),
            },
            tls: TlsMode::Disable,
        }
    }

    fn random_role() -> RoleName {
        const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
        let mut rng = thread_rng();

        let name: String = (0..10)
            .map(|_| {
                let idx = rng.gen_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect();

        RoleName::parse(&format!("test_{}", name)).unwrap()
    }

    fn drop_role(db: &mut DbConnection, role: &RoleName) {
        let sql = format!(
            "DROP OWNED BY {0}; DROP ROLE IF EXISTS {0}",
            role.quoted()
        );
        db.client.batch_execute(&sql).unwrap_or_else(|_| ());
    }

    #[test]
    fn test_connect_refused() {
        let mut info = local();
        info.port = 1;
        info.admin.password = "hunter2".to_string();

        let err = DbConnection::connect(&info).err().unwrap();
        let message = format!("{:#}", err);

        assert!(message.contains("could not connect to localhost:1/postgres as 'postgres'"));
        assert!(!message.contains("hunter2"));
    }

    #[test]
    #[ignore]
    fn test_connect() {
        let mut db = DbConnection::connect(&local()).expect("cannot connect");
        assert!(db.ping().expect("cannot ping"));
    }

    #[test]
    #[ignore]
    fn test_apply_create_role() {
        let mut db = DbConnection::connect(&local()).unwrap();
        let role = random_role();

        assert!(!db.role_exists(&role).unwrap());

        let mut statements = vec![Statement::create_role(&role, "it's a secret")];
        statements.extend(Grant::ALL.iter().map(|g| Statement::grant(*g, "postgres", &role)));
        db.apply(&statements).unwrap();

        assert!(db.role_exists(&role).unwrap());

        // Clean up
        drop_role(&mut db, &role);
    }

    #[test]
    #[ignore]
    fn test_apply_rolls_back_on_failure() {
        let mut db = DbConnection::connect(&local()).unwrap();
        let role = random_role();

        let statements = vec![
            Statement::create_role(&role, "secret"),
            Statement::grant(Grant::ConnectOnDatabase, "database_does_not_exist", &role),
        ];

        let err = db.apply(&statements).unwrap_err();
        assert!(format!("{:#}", err).contains("connect on database failed"));

        // CREATE ROLE was rolled back with the failed grant
        assert!(!db.role_exists(&role).unwrap());
    }
}
