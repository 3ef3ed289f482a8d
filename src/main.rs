//! # ptask - Parametric Task Catalogue CLI
//!
//! Command-line front end over the parametric task naming engine. Tasks are
//! generated from a category plus parameter choices, and their descriptions,
//! branch groupings and unit costs are derived from the catalogue snapshot.
//!
//! ## Quick Start
//!
//! ```bash
//! # Inspect the parameter catalogue
//! ptask params
//!
//! # Generate a task
//! ptask add --category mam --param tipo_elemento=o1 --param tipo_ladrillo=o2
//!
//! # Browse by branch, with a search filter
//! ptask list --search hueco
//!
//! # Unit cost of a task
//! ptask cost MAM-001
//!
//! # Interactive browser
//! ptask ui
//! ```
//!
//! Data is stored in `~/.ptask/catalog.json` (or `$PTASK_HOME`), or in the file
//! passed with `--db`. Set `RUST_LOG=parametric_tasks=debug` for diagnostics.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parametric_tasks::cli::Cli;
use parametric_tasks::cmd::*;
use parametric_tasks::config::Config;
use parametric_tasks::db::Database;

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parametric_tasks=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        cmd_completions(shell);
        return;
    }

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> parametric_tasks::Result<()> {
    let config = Config::resolve(cli.db.as_deref())?;
    let mut db = Database::load(&config.db_path)?;

    match cli.command {
        Commands::Completions { shell } => {
            cmd_completions(shell);
            Ok(())
        }

        Commands::Ui { search, scope, org } => cmd_ui(&config, db, search, scope, org),

        Commands::Params { category } => cmd_params(&db, category),

        Commands::Add { category, params, org, public, system } =>
            cmd_add(&config, &mut db, category, params, org, public, system),

        Commands::Update { id, params, clear_params } =>
            cmd_update(&config, &mut db, id, params, clear_params),

        Commands::View { id } => cmd_view(&config, &db, id),

        Commands::List { search, scope, org, flat, sort, limit } =>
            cmd_list(&config, &db, search, scope, org, flat, sort, limit),

        Commands::Cost { id } => cmd_cost(&config, &db, id),

        Commands::Materialize { id } => cmd_materialize(&config, &mut db, id),

        Commands::Delete { id } => cmd_delete(&config, &mut db, id),

        Commands::Export { output, scope, org } => cmd_export(&config, &db, output, scope, org),
    }
}
