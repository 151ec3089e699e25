//! Pure functions for calculating deployment plans (Functional Core).

use ddbgate::ddbgate_core::{BillingMode, TableDescription, TableDescriptor, TableReadinessState};

/// Planned changes for one registered table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployPlan {
    /// Table doesn't exist, needs to be created.
    CreateTable { descriptor: TableDescriptor },
    /// Table exists but is not active yet; wait for it.
    AwaitActive {
        table_name: String,
        state: TableReadinessState,
    },
    /// Table is active, no changes needed.
    NoChanges { table_name: String },
}

impl DeployPlan {
    pub fn has_changes(&self) -> bool {
        !matches!(self, DeployPlan::NoChanges { .. })
    }
}

/// Plan for destroying a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestroyPlan {
    /// Table exists and will be deleted.
    DeleteTable { table_name: String },
    /// Table doesn't exist, nothing to do.
    AlreadyGone { table_name: String },
}

/// Pure function: Calculate what is needed to reach the desired state.
pub fn calculate_deploy_plan(
    current: Option<&TableDescription>,
    desired: &TableDescriptor,
) -> DeployPlan {
    match current {
        None => DeployPlan::CreateTable {
            descriptor: desired.clone(),
        },
        Some(description) if description.state == TableReadinessState::Active => {
            DeployPlan::NoChanges {
                table_name: desired.name.clone(),
            }
        }
        Some(description) => DeployPlan::AwaitActive {
            table_name: desired.name.clone(),
            state: description.state,
        },
    }
}

/// Pure function: Calculate destroy plan.
pub fn calculate_destroy_plan(current: Option<&TableDescription>, table_name: &str) -> DestroyPlan {
    match current {
        Some(_) => DestroyPlan::DeleteTable {
            table_name: table_name.to_string(),
        },
        None => DestroyPlan::AlreadyGone {
            table_name: table_name.to_string(),
        },
    }
}

fn billing_display(billing: &BillingMode) -> String {
    match billing {
        BillingMode::OnDemand => "PAY_PER_REQUEST".to_string(),
        BillingMode::Provisioned {
            read_units,
            write_units,
        } => format!("PROVISIONED (read: {read_units}, write: {write_units})"),
    }
}

/// Pure function: Format a deploy plan for display.
pub fn format_deploy_plan(plan: &DeployPlan) -> Vec<String> {
    match plan {
        DeployPlan::CreateTable { descriptor } => {
            let pk = &descriptor.partition_key;
            let mut lines = vec![
                format!("+ Create table: {}", descriptor.name),
                format!("  Partition key: {} ({})", pk.name, pk.attribute_type.as_str()),
            ];
            if let Some(sk) = &descriptor.sort_key {
                lines.push(format!("  Sort key: {} ({})", sk.name, sk.attribute_type.as_str()));
            }
            lines.push(format!("  Billing: {}", billing_display(&descriptor.billing)));
            lines
        }
        DeployPlan::AwaitActive { table_name, state } => {
            vec![format!(
                "~ Wait for table '{}' to become active (currently {})",
                table_name,
                state.as_str()
            )]
        }
        DeployPlan::NoChanges { table_name } => {
            vec![format!("= Table '{}' is up to date", table_name)]
        }
    }
}

/// Pure function: Format a destroy plan for display.
pub fn format_destroy_plan(plan: &DestroyPlan) -> Vec<String> {
    match plan {
        DestroyPlan::DeleteTable { table_name } => {
            vec![format!(
                "- Delete table: {} (ALL DATA WILL BE LOST)",
                table_name
            )]
        }
        DestroyPlan::AlreadyGone { table_name } => {
            vec![format!("= Table '{}' does not exist", table_name)]
        }
    }
}
