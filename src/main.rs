use env_logger::Env;
use lakebase_role::cli;
use lakebase_role::config::WorkspaceConfig;
use lakebase_role::connection::DbConnection;
use lakebase_role::run::run;
use lakebase_role::workspace::WorkspaceClient;
use log::debug;
use std::process;

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = cli::parse();

    if let Err(e) = try_main(&args) {
        println!("Error: {:#}", e);
        process::exit(1);
    }
}

fn try_main(args: &cli::Cli) -> anyhow::Result<()> {
    let options = args.to_options()?;

    let workspace = WorkspaceConfig::from_env()?;
    debug!("Using {} for {}", workspace.auth, workspace.host);
    let client = WorkspaceClient::new(&workspace)?;

    run(&options, &client, DbConnection::connect)?;

    Ok(())
}
