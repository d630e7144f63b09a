//! Pure functions for calculating table deployment plans.

use dynamodel_core::{Index, Table};

/// Represents the current state of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableState {
    pub status: TableStatus,
    pub gsis: Vec<GsiState>,
}

impl TableState {
    /// Whether the table and every GSI can serve requests.
    pub fn is_active(&self) -> bool {
        self.status == TableStatus::Active
            && self.gsis.iter().all(|gsi| gsi.status == GsiStatus::Active)
    }
}

/// Table status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Active,
    Creating,
    Updating,
    Deleting,
}

/// GSI state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GsiState {
    pub name: String,
    pub status: GsiStatus,
}

/// GSI status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GsiStatus {
    Active,
    Creating,
    Updating,
    Deleting,
}

/// A global secondary index to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GsiDefinition {
    pub name: String,
    pub index: Index,
}

/// Planned changes for deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployPlan {
    /// Table doesn't exist, needs to be created.
    CreateTable { table: Table },
    /// Table exists, GSIs need to be added.
    AddGsis {
        table_name: String,
        gsis_to_add: Vec<GsiDefinition>,
    },
    /// Table is up to date, no changes needed.
    NoChanges { table_name: String },
}

impl DeployPlan {
    pub fn has_changes(&self) -> bool {
        !matches!(self, Self::NoChanges { .. })
    }
}

/// Calculate what changes are needed to reach the declared table.
///
/// Existing GSIs are never modified or removed.
pub fn calculate_deploy_plan(current: Option<&TableState>, desired: &Table) -> DeployPlan {
    match current {
        None => DeployPlan::CreateTable {
            table: desired.clone(),
        },
        Some(state) => {
            let existing: Vec<&str> = state.gsis.iter().map(|g| g.name.as_str()).collect();

            let gsis_to_add: Vec<GsiDefinition> = desired
                .secondary_indexes()
                .filter(|(name, _)| !existing.contains(name))
                .map(|(name, index)| GsiDefinition {
                    name: name.to_string(),
                    index: index.clone(),
                })
                .collect();

            if gsis_to_add.is_empty() {
                DeployPlan::NoChanges {
                    table_name: desired.name().to_string(),
                }
            } else {
                DeployPlan::AddGsis {
                    table_name: desired.name().to_string(),
                    gsis_to_add,
                }
            }
        }
    }
}

fn key_lines(index: &Index, indent: &str) -> Vec<String> {
    let mut lines = vec![format!("{indent}Partition key: {} (S)", index.partition_key)];
    if let Some(sk) = &index.sort_key {
        lines.push(format!("{indent}Sort key: {} (S)", sk));
    }
    lines
}

/// Format a deploy plan for display.
pub fn format_deploy_plan(plan: &DeployPlan) -> Vec<String> {
    match plan {
        DeployPlan::CreateTable { table } => {
            let mut lines = vec![format!("+ Create table: {}", table.name())];
            lines.extend(key_lines(table.primary(), "  "));
            for (name, index) in table.secondary_indexes() {
                lines.push(format!("  + GSI: {}", name));
                lines.extend(key_lines(index, "    "));
            }
            lines.push("  Billing: PAY_PER_REQUEST".to_string());
            lines
        }
        DeployPlan::AddGsis {
            table_name,
            gsis_to_add,
        } => {
            let mut lines = vec![format!("~ Update table: {}", table_name)];
            for gsi in gsis_to_add {
                lines.push(format!("  + Add GSI: {}", gsi.name));
            }
            lines
        }
        DeployPlan::NoChanges { table_name } => {
            vec![format!("= Table '{}' is up to date", table_name)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::builder("app", Index::new("PK").with_sort_key("SK"))
            .secondary_index("GSI1", Index::new("GSI1PK").with_sort_key("GSI1SK"))
            .domain_index("ByType", Index::new("entityType").with_sort_key("PK"))
            .build()
            .unwrap()
    }

    fn gsi(name: &str, status: GsiStatus) -> GsiState {
        GsiState {
            name: name.to_string(),
            status,
        }
    }

    #[test]
    fn test_plan_creates_missing_table() {
        let plan = calculate_deploy_plan(None, &table());
        assert_eq!(plan, DeployPlan::CreateTable { table: table() });
        assert!(plan.has_changes());
    }

    #[test]
    fn test_plan_adds_missing_gsis() {
        let state = TableState {
            status: TableStatus::Active,
            gsis: vec![gsi("GSI1", GsiStatus::Active)],
        };
        let plan = calculate_deploy_plan(Some(&state), &table());
        assert_eq!(
            plan,
            DeployPlan::AddGsis {
                table_name: "app".to_string(),
                gsis_to_add: vec![GsiDefinition {
                    name: "ByType".to_string(),
                    index: Index::new("entityType").with_sort_key("PK"),
                }],
            }
        );
    }

    #[test]
    fn test_plan_no_changes() {
        let state = TableState {
            status: TableStatus::Active,
            gsis: vec![
                gsi("GSI1", GsiStatus::Active),
                gsi("ByType", GsiStatus::Creating),
                gsi("Legacy", GsiStatus::Active),
            ],
        };
        let plan = calculate_deploy_plan(Some(&state), &table());
        assert_eq!(
            plan,
            DeployPlan::NoChanges {
                table_name: "app".to_string()
            }
        );
        assert!(!plan.has_changes());
    }

    #[test]
    fn test_format_create_plan() {
        let lines = format_deploy_plan(&calculate_deploy_plan(None, &table()));
        assert_eq!(
            lines,
            vec![
                "+ Create table: app",
                "  Partition key: PK (S)",
                "  Sort key: SK (S)",
                "  + GSI: GSI1",
                "    Partition key: GSI1PK (S)",
                "    Sort key: GSI1SK (S)",
                "  + GSI: ByType",
                "    Partition key: entityType (S)",
                "    Sort key: PK (S)",
                "  Billing: PAY_PER_REQUEST",
            ]
        );
    }

    #[test]
    fn test_format_update_and_no_change_plans() {
        let update = DeployPlan::AddGsis {
            table_name: "app".to_string(),
            gsis_to_add: vec![GsiDefinition {
                name: "GSI1".to_string(),
                index: Index::new("GSI1PK"),
            }],
        };
        assert_eq!(
            format_deploy_plan(&update),
            vec!["~ Update table: app", "  + Add GSI: GSI1"]
        );

        let unchanged = DeployPlan::NoChanges {
            table_name: "app".to_string(),
        };
        assert_eq!(
            format_deploy_plan(&unchanged),
            vec!["= Table 'app' is up to date"]
        );
    }

    #[test]
    fn test_table_state_is_active() {
        let mut state = TableState {
            status: TableStatus::Active,
            gsis: vec![gsi("GSI1", GsiStatus::Active)],
        };
        assert!(state.is_active());

        state.gsis.push(gsi("ByType", GsiStatus::Creating));
        assert!(!state.is_active());

        state.gsis.clear();
        state.status = TableStatus::Updating;
        assert!(!state.is_active());
    }
}
