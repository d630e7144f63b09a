//! Table plan and deploy commands.

use std::path::{Path, PathBuf};

use anyhow::Context;
use dialoguer::Confirm;
use dynamodel::storage::dynamodb::{
    calculate_deploy_plan, create_client, execute_deploy_plan, format_deploy_plan,
    get_table_state, DeployPlan,
};
use dynamodel::{DynamoDbConfig, Table};

use crate::prelude::*;

/// Table declaration commands.
#[derive(Debug, clap::Parser)]
pub struct TableCommand {
    #[command(subcommand)]
    pub action: TableAction,
}

#[derive(Debug, clap::Subcommand)]
pub enum TableAction {
    /// Show the changes needed to bring a table in line with its declaration.
    Plan(PlanCommand),

    /// Create or update a table from its declaration.
    Deploy(DeployCommand),
}

#[derive(Debug, clap::Args)]
pub struct TableSource {
    /// JSON table declaration file.
    #[arg(long, short = 'f', value_name = "PATH", env = "DYNAMODEL_TABLE_FILE")]
    pub file: PathBuf,
}

/// Show the deploy plan for a table declaration.
#[derive(Debug, clap::Parser)]
pub struct PlanCommand {
    #[command(flatten)]
    pub source: TableSource,
}

/// Create or update a table.
#[derive(Debug, clap::Parser)]
#[command(long_about = "Create or update a DynamoDB table from a JSON declaration.

Creates the table with every declared secondary index when it does not
exist, otherwise adds the indexes it is missing. Indexes are never removed.

The command shows a plan of changes before applying and asks for confirmation.

Environment variables:
  AWS_ENDPOINT_URL        - Use local DynamoDB (e.g., http://localhost:8000)
  AWS_REGION              - AWS region (defaults to us-east-1)
  AWS_PROFILE             - AWS profile to use for credentials
  DYNAMODEL_TABLE_PREFIX  - Prefix prepended to the declared table name")]
pub struct DeployCommand {
    #[command(flatten)]
    pub source: TableSource,

    /// Skip confirmation prompts.
    #[arg(long)]
    pub force: bool,
}

pub async fn run(cmd: TableCommand, global: &crate::Global) -> anyhow::Result<()> {
    match cmd.action {
        TableAction::Plan(plan_cmd) => {
            run_plan(&plan_cmd.source.file, global).await?;
        }
        TableAction::Deploy(deploy_cmd) => run_deploy(deploy_cmd, global).await?,
    }
    Ok(())
}

/// Reads a table declaration file.
fn load_table(path: &Path) -> anyhow::Result<Table> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_table(&contents).with_context(|| format!("invalid table declaration {}", path.display()))
}

fn parse_table(contents: &str) -> anyhow::Result<Table> {
    Ok(serde_json::from_str(contents)?)
}

async fn run_plan(path: &Path, global: &crate::Global) -> anyhow::Result<DeployPlan> {
    let config = DynamoDbConfig::from_env();
    let table = config.resolve_table(&load_table(path)?);

    if !global.is_silent() {
        aprintln!("{} {}", p_b("Target:"), config.target_display());
        aprintln!("{} {}", p_b("Table:"), table.name());
        aprintln!();
    }

    let client = create_client(&config).await;
    let current_state = get_table_state(&client, table.name()).await?;
    tracing::debug!(table = %table.name(), exists = current_state.is_some(), "Fetched table state");

    let plan = calculate_deploy_plan(current_state.as_ref(), &table);

    if !global.is_silent() {
        aprintln!("{}", p_c("Deploy Plan:"));
        for line in format_deploy_plan(&plan) {
            aprintln!("  {}", plan_line(&line));
        }
        aprintln!();
    }

    Ok(plan)
}

async fn run_deploy(cmd: DeployCommand, global: &crate::Global) -> anyhow::Result<()> {
    let plan = run_plan(&cmd.source.file, global).await?;

    if !plan.has_changes() {
        if !global.is_silent() {
            aprintln!("{}", p_g("Infrastructure is up to date."));
        }
        return Ok(());
    }

    if !cmd.force {
        let confirmed = Confirm::new()
            .with_prompt("Apply these changes?")
            .default(true)
            .interact()?;

        if !confirmed {
            anyhow::bail!("deploy cancelled");
        }
    }

    if !global.is_silent() {
        aprintln!("{}", p_b("Applying changes..."));
    }

    let client = create_client(&DynamoDbConfig::from_env()).await;
    execute_deploy_plan(&client, &plan).await?;

    if !global.is_silent() {
        aprintln!("{}", p_g("Infrastructure deployed successfully."));
    }

    Ok(())
}
