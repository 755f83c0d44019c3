use crate::config::RoleSpec;
use crate::connection::RoleSession;
use crate::resolver::InstanceDescriptor;
use crate::sql::{Grant, RoleName, Statement};
use ansi_term::Colour::{Green, Purple, Red};
use anyhow::Result;
use ascii_table::AsciiTable;
use log::{error, info};
use std::fmt;

/// What happens to the role itself before the grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleAction {
    /// Role did not exist: CREATE ROLE ... WITH LOGIN PASSWORD
    Create,
    /// Role existed: ALTER ROLE ... WITH PASSWORD
    Update,
}

impl fmt::Display for RoleAction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RoleAction::Create => write!(f, "created"),
            RoleAction::Update => write!(f, "updated"),
        }
    }
}

/// The ordered statements for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub role: RoleName,
    pub action: RoleAction,
    pub statements: Vec<Statement>,
}

impl Plan {
    /// The grant statements, without the create/alter that precedes them.
    pub fn grants(&self) -> &[Statement] {
        &self.statements[1..]
    }
}

/// Result of a provisioning run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub plan: Plan,
    pub applied: bool,
}

/// Build the plan for `role_spec` in `database`.
///
/// Both branches end in the same grant sequence, in `Grant::ALL` order.
pub fn plan(role_spec: &RoleSpec, database: &str, exists: bool) -> Plan {
    let role = &role_spec.role_name;

    let (action, first) = if exists {
        (
            RoleAction::Update,
            Statement::alter_role(role, &role_spec.role_password),
        )
    } else {
        (
            RoleAction::Create,
            Statement::create_role(role, &role_spec.role_password),
        )
    };

    let mut statements = Vec::with_capacity(Grant::ALL.len() + 1);
    statements.push(first);
    statements.extend(
        Grant::ALL
            .iter()
            .map(|grant| Statement::grant(*grant, database, role)),
    );

    Plan {
        role: role.clone(),
        action,
        statements,
    }
}

/// Create or update the role and apply its grants.
///
/// With `dryrun` the session is only read (role lookup) and the plan is
/// logged instead of applied.
pub fn provision(
    session: &mut dyn RoleSession,
    instance: &InstanceDescriptor,
    role_spec: &RoleSpec,
    dryrun: bool,
) -> Result<Outcome> {
    let role = &role_spec.role_name;
    let exists = session.role_exists(role)?;

    if exists {
        println!("Role '{}' already exists, updating password...", role);
    } else {
        println!("Creating role '{}'...", role);
    }

    let plan = plan(role_spec, &instance.database, exists);

    if dryrun {
        for statement in &plan.statements {
            info!("{}: {}", Purple.paint("Dry-run"), statement);
        }
        print_summary(&plan, "dry-run");

        return Ok(Outcome {
            plan,
            applied: false,
        });
    }

    println!("Granting permissions to '{}'...", role);

    if let Err(e) = session.apply(&plan.statements) {
        error!("{}: {:#}", Red.paint("Error"), e);
        print_summary(&plan, "rolled back");
        return Err(e);
    }

    for statement in &plan.statements {
        info!("{}: {}", Green.paint("Success"), statement);
    }
    print_summary(&plan, &plan.action.to_string());

    println!(
        "Successfully created/updated role '{}' with migration permissions",
        role
    );

    Ok(Outcome {
        plan,
        applied: true,
    })
}

/// Log the plan as a table: step, statement, status.
fn print_summary(plan: &Plan, status: &str) {
    let mut summary = vec![vec![
        "Step".to_string(),
        "Statement".to_string(),
        "Status".to_string(),
    ]];
    summary.push(vec!["---".to_string(), "---".to_string(), "---".to_string()]);

    for statement in &plan.statements {
        summary.push(vec![
            statement.step.to_string(),
            statement.display.clone(),
            status.to_string(),
        ]);
    }

    let term_width = term_size::dimensions()
        .map(|(w, _)| w)
        .unwrap_or(120)
        .saturating_sub(5);

    let mut table = AsciiTable::default();
    table.set_max_width(term_width);

    info!("Summary for role '{}':\n{}", plan.role, table.format(summary));
}
