use anyhow::{anyhow, Result};
use regex::Regex;
use std::fmt;

/// Postgres truncates identifiers longer than NAMEDATALEN - 1 bytes.
const MAX_IDENTIFIER_LEN: usize = 63;

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

const REDACTED_PASSWORD: &str = "'********'";

/// A role name that is safe to place in identifier position.
///
/// Role names cannot be sent as bound parameters in DDL, so the only way to
/// get one is through [`RoleName::parse`], which checks it against an
/// allow-list (letters, digits, underscore; not starting with a digit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleName(String);

impl RoleName {
    pub fn parse(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(anyhow!("invalid role name '': must not be empty"));
        }

        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(anyhow!(
                "invalid role name '{}': longer than {} characters",
                name,
                MAX_IDENTIFIER_LEN
            ));
        }

        if !Regex::new(IDENTIFIER_PATTERN)?.is_match(name) {
            return Err(anyhow!(
                "invalid role name '{}': only letters, digits and '_' are allowed, and it must not start with a digit",
                name
            ));
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The double-quoted form used in SQL.
    pub fn quoted(&self) -> String {
        quote_ident(&self.0)
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Quote an identifier the way Postgres' `quote_ident` does.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a string literal the way Postgres' `quote_literal` does.
///
/// Values with a backslash use the `E'...'` escape syntax so they are read
/// the same regardless of `standard_conforming_strings`.
pub fn quote_literal(value: &str) -> String {
    let escaped = value.replace('\'', "''");
    if escaped.contains('\\') {
        format!("E'{}'", escaped.replace('\\', "\\\\"))
    } else {
        format!("'{}'", escaped)
    }
}

/// A step of the provisioning plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateRole,
    AlterRole,
    Grant(Grant),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Step::CreateRole => write!(f, "create role"),
            Step::AlterRole => write!(f, "update password"),
            Step::Grant(grant) => write!(f, "{}", grant),
        }
    }
}

/// The grants a migration role receives, in the order they are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    ConnectOnDatabase,
    CreateOnDatabase,
    UsageOnSchema,
    CreateOnSchema,
    AllOnTables,
    AllOnSequences,
    DefaultOnTables,
    DefaultOnSequences,
}

impl Grant {
    pub const ALL: [Grant; 8] = [
        Grant::ConnectOnDatabase,
        Grant::CreateOnDatabase,
        Grant::UsageOnSchema,
        Grant::CreateOnSchema,
        Grant::AllOnTables,
        Grant::AllOnSequences,
        Grant::DefaultOnTables,
        Grant::DefaultOnSequences,
    ];

    /// Render the grant for `role` on `database`.
    ///
    /// Schema-level grants always target `public`.
    ///
    /// ```sql
    /// GRANT CONNECT ON DATABASE "chatbot_db" TO "app_migrator"
    /// ALTER DEFAULT PRIVILEGES IN SCHEMA public GRANT ALL ON TABLES TO "app_migrator"
    /// ```
    pub fn to_sql(&self, database: &str, role: &RoleName) -> String {
        let database = quote_ident(database);
        let role = role.quoted();

        match self {
            Grant::ConnectOnDatabase => format!("GRANT CONNECT ON DATABASE {} TO {}", database, role),
            Grant::CreateOnDatabase => format!("GRANT CREATE ON DATABASE {} TO {}", database, role),
            Grant::UsageOnSchema => format!("GRANT USAGE ON SCHEMA public TO {}", role),
            Grant::CreateOnSchema => format!("GRANT CREATE ON SCHEMA public TO {}", role),
            Grant::AllOnTables => {
                format!("GRANT ALL PRIVILEGES ON ALL TABLES IN SCHEMA public TO {}", role)
            }
            Grant::AllOnSequences => {
                format!("GRANT ALL PRIVILEGES ON ALL SEQUENCES IN SCHEMA public TO {}", role)
            }
            Grant::DefaultOnTables => format!(
                "ALTER DEFAULT PRIVILEGES IN SCHEMA public GRANT ALL ON TABLES TO {}",
                role
            ),
            Grant::DefaultOnSequences => format!(
                "ALTER DEFAULT PRIVILEGES IN SCHEMA public GRANT ALL ON SEQUENCES TO {}",
                role
            ),
        }
    }
}

impl fmt::Display for Grant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            Grant::ConnectOnDatabase => "connect on database",
            Grant::CreateOnDatabase => "create on database",
            Grant::UsageOnSchema => "usage on schema public",
            Grant::CreateOnSchema => "create on schema public",
            Grant::AllOnTables => "all on tables",
            Grant::AllOnSequences => "all on sequences",
            Grant::DefaultOnTables => "default privileges on tables",
            Grant::DefaultOnSequences => "default privileges on sequences",
        };
        write!(f, "{}", label)
    }
}

/// A rendered SQL statement.
///
/// `display` is safe to log: passwords are masked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub step: Step,
    pub sql: String,
    pub display: String,
}

impl Statement {
    pub fn create_role(role: &RoleName, password: &str) -> Self {
        let prefix = format!("CREATE ROLE {} WITH LOGIN PASSWORD ", role.quoted());
        Self {
            step: Step::CreateRole,
            sql: format!("{}{}", prefix, quote_literal(password)),
            display: format!("{}{}", prefix, REDACTED_PASSWORD),
        }
    }

    pub fn alter_role(role: &RoleName, password: &str) -> Self {
        let prefix = format!("ALTER ROLE {} WITH PASSWORD ", role.quoted());
        Self {
            step: Step::AlterRole,
            sql: format!("{}{}", prefix, quote_literal(password)),
            display: format!("{}{}", prefix, REDACTED_PASSWORD),
        }
    }

    pub fn grant(grant: Grant, database: &str, role: &RoleName) -> Self {
        let sql = grant.to_sql(database, role);
        Self {
            step: Step::Grant(grant),
            display: sql.clone(),
            sql,
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.display)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_name_valid() {
        for name in ["app_migrator", "_r", "Role1", "a"] {
            assert!(RoleName::parse(name).is_ok(), "{} should be valid", name);
        }
    }

    #[test]
    fn test_role_name_rejects_injection() {
        let names = [
            "",
            "1role",
            "app-migrator",
            "app migrator",
            "app_migrator; DROP ROLE postgres",
            "x\" WITH SUPERUSER --",
            "rôle",
        ];

        for name in names {
            let err = RoleName::parse(name).unwrap_err();
            assert!(
                err.to_string().starts_with("invalid role name"),
                "unexpected error for {:?}: {}",
                name,
                err
            );
        }
    }

    #[test]
    fn test_role_name_too_long() {
        let name = "a".repeat(64);
        assert!(RoleName::parse(&name).is_err());
        assert!(RoleName::parse(&name[..63]).is_ok());
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("chatbot_db"), "\"chatbot_db\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_quote_literal() {
        assert_eq!(quote_literal("secret123"), "'secret123'");
        assert_eq!(quote_literal("it's"), "'it''s'");
        assert_eq!(quote_literal(r"a\b"), r"E'a\\b'");
        assert_eq!(quote_literal(r"x'\"), r"E'x''\\'");
    }

    #[test]
    fn test_grant_sql() {
        let role = RoleName::parse("app_migrator").unwrap();
        let sql: Vec<String> = Grant::ALL
            .iter()
            .map(|g| g.to_sql("chatbot_db", &role))
            .collect();

        assert_eq!(
            sql,
            vec![
                r#"GRANT CONNECT ON DATABASE "chatbot_db" TO "app_migrator""#,
                r#"GRANT CREATE ON DATABASE "chatbot_db" TO "app_migrator""#,
                r#"GRANT USAGE ON SCHEMA public TO "app_migrator""#,
                r#"GRANT CREATE ON SCHEMA public TO "app_migrator""#,
                r#"GRANT ALL PRIVILEGES ON ALL TABLES IN SCHEMA public TO "app_migrator""#,
                r#"GRANT ALL PRIVILEGES ON ALL SEQUENCES IN SCHEMA public TO "app_migrator""#,
                r#"ALTER DEFAULT PRIVILEGES IN SCHEMA public GRANT ALL ON TABLES TO "app_migrator""#,
                r#"ALTER DEFAULT PRIVILEGES IN SCHEMA public GRANT ALL ON SEQUENCES TO "app_migrator""#,
            ]
        );
    }

    #[test]
    fn test_create_role_masks_password() {
        let role = RoleName::parse("app_migrator").unwrap();
        let stmt = Statement::create_role(&role, "s3cr'et");

        assert_eq!(
            stmt.sql,
            r#"CREATE ROLE "app_migrator" WITH LOGIN PASSWORD 's3cr''et'"#
        );
        assert_eq!(
            stmt.to_string(),
            r#"CREATE ROLE "app_migrator" WITH LOGIN PASSWORD '********'"#
        );
        assert!(!stmt.display.contains("s3cr"));
    }

    #[test]
    fn test_alter_role() {
        let role = RoleName::parse("app_migrator").unwrap();
        let stmt = Statement::alter_role(&role, "secret123");

        assert_eq!(stmt.step, Step::AlterRole);
        assert_eq!(
            stmt.sql,
            r#"ALTER ROLE "app_migrator" WITH PASSWORD 'secret123'"#
        );
    }
}
