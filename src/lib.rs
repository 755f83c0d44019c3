//! Provision a migration role on a Lakebase (managed Postgres) database
//! instance.
//!
//! The instance endpoint is looked up through the workspace control plane
//! ([`workspace`], [`resolver`]), then an admin connection ([`connection`])
//! creates or updates the role and applies its grants ([`provision`]).

pub mod cli;
pub mod config;
pub mod connection;
pub mod provision;
pub mod resolver;
pub mod run;
pub mod sql;
pub mod workspace;
