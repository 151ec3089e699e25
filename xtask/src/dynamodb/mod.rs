//! DynamoDB table management and data commands.

mod config;
mod error;
mod planning;
mod seed;

pub use error::{DynamodbError, Result};

use std::path::PathBuf;

use crate::prelude::*;
use ddbgate::ddbgate_core::{NativeValue, QueryRequest, SortOrder, TableDescription, TableDescriptor};
use ddbgate::{CallContext, Gateway, GatewayError, StoreConfig};
use dialoguer::Confirm;
use tokio_util::sync::CancellationToken;

/// DynamoDB table management and data commands.
#[derive(Debug, clap::Parser)]
#[command(long_about = "Manage registered DynamoDB tables and their data.

Tables are described in a registry file (tables.json by default):

  {\"tables\": [{\"name\": \"user_logs_1\",
                \"partition_key\": {\"name\": \"PK\"},
                \"sort_key\": {\"name\": \"SK\"}}]}

Environment variables:
  AWS_ENDPOINT_URL    - Use local DynamoDB (e.g., http://localhost:8000)
  AWS_REGION          - AWS region (defaults to us-east-1)
  AWS_PROFILE         - AWS profile to use for credentials
  DDBGATE_*           - Readiness and batch retry tuning")]
pub struct DynamodbCommand {
    /// Table registry file.
    #[arg(long, global = true, default_value = config::DEFAULT_REGISTRY_PATH)]
    pub registry: PathBuf,

    #[command(subcommand)]
    pub action: DynamodbAction,
}

/// Available DynamoDB actions.
#[derive(Debug, clap::Subcommand)]
pub enum DynamodbAction {
    /// Create registered tables and wait until they are active, or destroy them.
    Deploy(DeployCommand),

    /// Batch-insert demo items or items from a JSON file.
    Seed(SeedCommand),

    /// List tables and describe registered ones.
    Tables,

    /// Fetch one item by primary key.
    Get(GetCommand),

    /// Run a key-condition query.
    Query(QueryCommand),
}

/// Deploy or destroy registered tables.
#[derive(Debug, clap::Parser)]
pub struct DeployCommand {
    /// Skip confirmation prompts.
    #[arg(long)]
    pub force: bool,

    /// Destroy the tables instead of creating them.
    #[arg(long)]
    pub destroy: bool,

    /// Restrict to one registered table.
    #[arg(long)]
    pub table: Option<String>,
}

/// Seed a registered table.
#[derive(Debug, clap::Parser)]
pub struct SeedCommand {
    /// Registered table name.
    #[arg(long)]
    pub table: String,

    /// JSON array of items to insert instead of generated ones.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Number of items to generate.
    #[arg(long, default_value = "30")]
    pub count: u32,

    /// Skip confirmation prompts.
    #[arg(long)]
    pub force: bool,
}

/// Fetch one item.
#[derive(Debug, clap::Parser)]
pub struct GetCommand {
    /// Registered table name.
    #[arg(long)]
    pub table: String,

    /// Partition key value (`n:` prefix for numbers).
    #[arg(long)]
    pub pk: String,

    /// Sort key value, required for tables with a sort key.
    #[arg(long)]
    pub sk: Option<String>,
}

/// Query a registered table.
#[derive(Debug, clap::Parser)]
pub struct QueryCommand {
    /// Registered table name.
    #[arg(long)]
    pub table: String,

    /// Key condition expression, e.g. "PK = :pk AND begins_with(#sk, :prefix)".
    #[arg(long)]
    pub condition: String,

    /// Value binding `:name=value` (`n:` prefix for numbers). Repeatable.
    #[arg(long = "value", value_name = ":NAME=VALUE")]
    pub values: Vec<String>,

    /// Name binding `#name=Attribute`. Repeatable.
    #[arg(long = "name", value_name = "#NAME=ATTR")]
    pub names: Vec<String>,

    /// Maximum number of rows.
    #[arg(long)]
    pub limit: Option<u32>,

    /// Return rows in descending sort-key order.
    #[arg(long)]
    pub desc: bool,
}

/// Main entry point for dynamodb command.
pub async fn run(command: DynamodbCommand, global: crate::Global) -> Result<()> {
    let registry = config::load_registry(&command.registry)?;
    let gateway = Gateway::dynamodb_from_env().await.with_registry(registry);
    let ctx = cancel_on_ctrl_c();

    if !global.is_silent() {
        aprintln!("{} {}", p_b("Target:"), StoreConfig::from_env().target_display());
        aprintln!();
    }

    match command.action {
        DynamodbAction::Deploy(cmd) => run_deploy(cmd, &gateway, &ctx, &global).await,
        DynamodbAction::Seed(cmd) => run_seed(cmd, &gateway, &ctx, &global).await,
        DynamodbAction::Tables => run_tables(&gateway, &ctx).await,
        DynamodbAction::Get(cmd) => run_get(cmd, &gateway, &ctx).await,
        DynamodbAction::Query(cmd) => run_query(cmd, &gateway, &ctx, &global).await,
    }
}

/// Context whose token fires on the first Ctrl-C.
fn cancel_on_ctrl_c() -> CallContext {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling in-flight operation");
            child.cancel();
        }
    });
    CallContext::with_token(token)
}

fn confirm(prompt: String, default: bool) -> Result<()> {
    let confirmed = Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact()
        .map_err(|e| DynamodbError::Prompt(e.to_string()))?;

    if confirmed {
        Ok(())
    } else {
        Err(DynamodbError::UserCancelled)
    }
}

fn selected_tables<'a>(gateway: &'a Gateway, only: Option<&str>) -> Result<Vec<&'a TableDescriptor>> {
    match only {
        Some(name) => Ok(vec![gateway.table(name)?]),
        None => Ok(gateway.registry().iter().collect()),
    }
}

/// Current description, `None` when the table does not exist.
async fn current_state(
    gateway: &Gateway,
    ctx: &CallContext,
    table: &str,
) -> Result<Option<TableDescription>> {
    match gateway.lifecycle().describe_table(ctx, table).await {
        Ok(description) => Ok(Some(description)),
        Err(err) if err.is_not_found() => Ok(None),
        Err(err) => Err(err.into()),
    }
}

async fn run_deploy(
    cmd: DeployCommand,
    gateway: &Gateway,
    ctx: &CallContext,
    global: &crate::Global,
) -> Result<()> {
    let tables = selected_tables(gateway, cmd.table.as_deref())?;

    if cmd.destroy {
        let mut plans = Vec::with_capacity(tables.len());
        for descriptor in &tables {
            let current = current_state(gateway, ctx, &descriptor.name).await?;
            plans.push(planning::calculate_destroy_plan(
                current.as_ref(),
                &descriptor.name,
            ));
        }

        if !global.is_silent() {
            aprintln!("{}", p_y("Destroy Plan:"));
            for line in plans.iter().flat_map(planning::format_destroy_plan) {
                aprintln!("  {}", p_r(&line));
            }
            aprintln!();
        }

        let doomed: Vec<&str> = plans
            .iter()
            .filter_map(|plan| match plan {
                planning::DestroyPlan::DeleteTable { table_name } => Some(table_name.as_str()),
                planning::DestroyPlan::AlreadyGone { .. } => None,
            })
            .collect();

        if doomed.is_empty() {
            if !global.is_silent() {
                aprintln!("{}", p_g("Nothing to destroy."));
            }
            return Ok(());
        }

        if !cmd.force {
            confirm(
                "Are you sure you want to delete these tables? ALL DATA WILL BE LOST".to_string(),
                false,
            )?;
        }

        for table in doomed {
            if !global.is_silent() {
                aprintln!("{} {}", p_b("Deleting table"), table);
            }
            match gateway.lifecycle().delete_table(ctx, table).await {
                // Someone else deleted it between the plan and now.
                Err(err) if err.is_not_found() => {}
                other => other?,
            }
        }

        if !global.is_silent() {
            aprintln!("{}", p_g("Tables destroyed successfully."));
        }
        return Ok(());
    }

    let mut plans = Vec::with_capacity(tables.len());
    for descriptor in &tables {
        let current = current_state(gateway, ctx, &descriptor.name).await?;
        plans.push(planning::calculate_deploy_plan(current.as_ref(), descriptor));
    }

    if !global.is_silent() {
        aprintln!("{}", p_c("Deploy Plan:"));
        for line in plans.iter().flat_map(planning::format_deploy_plan) {
            if line.starts_with('+') {
                aprintln!("  {}", p_g(&line));
            } else if line.starts_with('~') {
                aprintln!("  {}", p_y(&line));
            } else {
                aprintln!("  {}", line);
            }
        }
        aprintln!();
    }

    if !plans.iter().any(planning::DeployPlan::has_changes) {
        if !global.is_silent() {
            aprintln!("{}", p_g("Infrastructure is up to date."));
        }
        return Ok(());
    }

    if !cmd.force {
        confirm("Apply these changes?".to_string(), true)?;
    }

    if !global.is_silent() {
        aprintln!("{}", p_b("Applying changes..."));
    }

    // ensure_ready creates missing tables and waits for the creating ones.
    for descriptor in &tables {
        gateway.lifecycle().ensure_ready(ctx, descriptor).await?;
    }

    if !global.is_silent() {
        aprintln!("{}", p_g("Infrastructure deployed successfully."));
    }

    Ok(())
}

async fn run_seed(
    cmd: SeedCommand,
    gateway: &Gateway,
    ctx: &CallContext,
    global: &crate::Global,
) -> Result<()> {
    let descriptor = gateway.table(&cmd.table)?;

    let items = match &cmd.file {
        Some(path) => seed::parse_seed_items(&std::fs::read_to_string(path)?)?,
        None => seed::generate_seed_items(descriptor, cmd.count),
    };

    if !global.is_silent() {
        aprintln!("{} {}", p_b("Table:"), descriptor.name);
        aprintln!("{}", p_c("Items to insert:"));
        for item in items.iter().take(5) {
            aprintln!("  {}", seed::format_item_key(descriptor, item));
        }
        if items.len() > 5 {
            aprintln!("  ... and {} more", items.len() - 5);
        }
        aprintln!();
    }

    if items.is_empty() {
        if !global.is_silent() {
            aprintln!("{}", p_g("Nothing to insert."));
        }
        return Ok(());
    }

    if !cmd.force {
        confirm(format!("Insert {} items?", items.len()), true)?;
    }

    let result = gateway.writer().insert_batch(ctx, descriptor, &items).await;

    if !global.is_silent() {
        match &result {
            Ok(()) => aprintln!("{} {} items inserted.", p_g("Success:"), items.len()),
            Err(GatewayError::PartialBatchFailure {
                unprocessed,
                committed,
                ..
            }) => aprintln!(
                "{} {} items inserted, {} left unprocessed.",
                p_y("Partial:"),
                committed,
                unprocessed.len()
            ),
            Err(_) => {}
        }
    }

    Ok(result?)
}

async fn run_tables(gateway: &Gateway, ctx: &CallContext) -> Result<()> {
    let existing = gateway.lifecycle().list_tables(ctx).await?;

    aprintln!("{}", p_c("Tables:"));
    for name in &existing {
        let registered = if gateway.registry().get(name).is_some() {
            p_g("registered")
        } else {
            p_y("unregistered")
        };
        aprintln!("  {} ({})", name, registered);
    }

    for descriptor in gateway.registry().iter() {
        match current_state(gateway, ctx, &descriptor.name).await? {
            Some(description) => aprintln!(
                "{} {} state={} items={} bytes={}",
                p_b("Describe:"),
                description.name,
                description.state.as_str(),
                description
                    .item_count
                    .map_or_else(|| "?".to_string(), |n| n.to_string()),
                description
                    .size_bytes
                    .map_or_else(|| "?".to_string(), |n| n.to_string()),
            ),
            None => aprintln!("{} {} {}", p_b("Describe:"), descriptor.name, p_r("missing")),
        }
    }

    Ok(())
}

async fn run_get(cmd: GetCommand, gateway: &Gateway, ctx: &CallContext) -> Result<()> {
    let descriptor = gateway.table(&cmd.table)?;
    let partition = config::parse_value(&cmd.pk)?;
    let sort = cmd.sk.as_deref().map(config::parse_value).transpose()?;

    let item = gateway
        .reader()
        .find_by_key(ctx, descriptor, &partition, sort.as_ref())
        .await?;

    let json = serde_json::Value::from(NativeValue::Map(item));
    aprintln!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn run_query(
    cmd: QueryCommand,
    gateway: &Gateway,
    ctx: &CallContext,
    global: &crate::Global,
) -> Result<()> {
    let descriptor = gateway.table(&cmd.table)?;

    let mut request = QueryRequest::new(cmd.condition);
    for raw in &cmd.values {
        let (placeholder, value) = config::parse_binding(raw, ':')?;
        request = request.bind(placeholder, config::parse_value(value)?);
    }
    for raw in &cmd.names {
        let (placeholder, attribute) = config::parse_binding(raw, '#')?;
        request = request.name(placeholder, attribute);
    }
    if let Some(limit) = cmd.limit {
        request = request.limit(limit);
    }
    if cmd.desc {
        request = request.order(SortOrder::Descending);
    }

    let rows = gateway.reader().find_by_condition(ctx, descriptor, &request).await?;

    for row in rows.iter().cloned() {
        let json = serde_json::Value::from(NativeValue::Map(row));
        aprintln!("{}", serde_json::to_string(&json)?);
    }
    if !global.is_silent() {
        aprintln!("{} {} rows", p_g("Done:"), rows.len());
    }

    Ok(())
}
