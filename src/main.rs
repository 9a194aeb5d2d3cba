//! klustercost-ask - natural-language questions over the klustercost database.

use std::sync::Arc;

use anyhow::{bail, Context};
use klustercost_ask::catalog::{CatalogPolicy, SchemaCatalog};
use klustercost_ask::cli::{Cli, Command};
use klustercost_ask::config::Config;
use klustercost_ask::db::{DatabaseClient, PostgresClient};
use klustercost_ask::llm::create_client;
use klustercost_ask::safety::{classify_sql, validate_read_only};
use klustercost_ask::service::QueryService;
use klustercost_ask::{logging, repl, tools};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logging::init_stderr_logging();

    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_args();
    let command = cli.command();

    if !command.needs_database() {
        return run_offline(&command);
    }

    let config = resolve_config(&cli)?;
    info!("Connection: {}", config.database.display_string());

    let db: Arc<dyn DatabaseClient> = Arc::new(PostgresClient::new(&config.database));
    let outcome = dispatch(&command, &config, Arc::clone(&db)).await;
    if let Err(e) = db.close().await {
        error!("Failed to close database pool: {}", e);
    }
    outcome
}

/// Runs the commands that touch neither the store nor a model.
fn run_offline(command: &Command) -> anyhow::Result<()> {
    match command {
        Command::ToolSchema => {
            let definitions = tools::tool_definitions();
            println!("{}", serde_json::to_string_pretty(&definitions)?);
        }
        Command::Check { sql } => {
            validate_read_only(sql)?;
            println!("OK: {}", classify_sql(sql));
        }
        other => bail!("{:?} needs a database connection", other),
    }
    Ok(())
}

async fn dispatch(
    command: &Command,
    config: &Config,
    db: Arc<dyn DatabaseClient>,
) -> anyhow::Result<()> {
    if !command.needs_llm() {
        if *command != Command::Schema {
            bail!("{:?} is not a schema command", command);
        }
        let policy = CatalogPolicy::new(config.database.schema_or_default())
            .with_fetch_timeout(config.database.catalog_timeout());
        let catalog = SchemaCatalog::new(db, policy);
        let snapshot = catalog.get().await?;
        println!("{}", snapshot.text);
        return Ok(());
    }

    let llm = create_client(&config.llm).context("Failed to set up the language model client")?;
    let service = Arc::new(QueryService::from_config(config, db, llm)?);

    match command {
        Command::Ask { question } => {
            let question = question.join(" ");
            if question.trim().is_empty() {
                bail!("Question must not be empty");
            }
            println!("{}", Arc::clone(&service).answer_isolated(&question).await);
        }
        Command::Call { payload } => {
            println!("{}", tools::invoke_call(&service, payload).await);
        }
        Command::Repl => {
            repl::run_stdio(&service)
                .await
                .context("Interactive session failed")?;
        }
        Command::Schema | Command::Check { .. } | Command::ToolSchema => {}
    }

    Ok(())
}

/// Resolves the final configuration.
///
/// Precedence: CLI arguments, then the config file, then environment
/// variables, then built-in defaults.
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;

    if let Some(connection) = cli.to_connection_config()? {
        config.database.merge(&connection);
    }
    config.database.apply_env_defaults();
    cli.apply_llm_overrides(&mut config);

    Ok(config)
}
