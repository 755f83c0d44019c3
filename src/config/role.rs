use crate::sql::RoleName;
use anyhow::{anyhow, Result};
use std::fmt;

/// The login role to provision.
///
/// For example, `app_migrator` with its password. The name is validated on
/// construction so it can be placed in DDL as an identifier.
#[derive(Clone, PartialEq, Eq)]
pub struct RoleSpec {
    pub role_name: RoleName,
    pub role_password: String,
}

impl RoleSpec {
    pub fn new(role_name: &str, role_password: &str) -> Result<Self> {
        let role_name = RoleName::parse(role_name)?;

        if role_password.is_empty() {
            return Err(anyhow!("role password is empty"));
        }

        Ok(Self {
            role_name,
            role_password: role_password.to_string(),
        })
    }
}

impl fmt::Debug for RoleSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("RoleSpec")
            .field("role_name", &self.role_name)
            .field("role_password", &"********")
            .finish()
    }
}
