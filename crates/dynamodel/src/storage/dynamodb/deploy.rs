//! Table deployment operations.

use std::time::Duration;

use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, BillingMode, CreateGlobalSecondaryIndexAction, GlobalSecondaryIndex,
    GlobalSecondaryIndexUpdate, KeySchemaElement, KeyType, Projection, ProjectionType,
    ScalarAttributeType,
};
use aws_sdk_dynamodb::Client;
use dynamodel_core::{Index, Table};

use super::error::{DeployError, DeployResult};
use super::planning::{DeployPlan, GsiDefinition, GsiState, GsiStatus, TableState, TableStatus};

const ACTIVATION_ATTEMPTS: u32 = 60;
const ACTIVATION_DELAY: Duration = Duration::from_secs(2);

fn sdk_error(err: impl std::fmt::Display) -> DeployError {
    DeployError::AwsSdk(err.to_string())
}

/// Execute a deploy plan.
pub async fn execute_deploy_plan(client: &Client, plan: &DeployPlan) -> DeployResult<()> {
    match plan {
        DeployPlan::CreateTable { table } => {
            tracing::info!(table = %table.name(), "Creating table");
            create_table(client, table).await?;
            wait_for_table_active(client, table.name()).await?;
        }
        DeployPlan::AddGsis {
            table_name,
            gsis_to_add,
        } => {
            // DynamoDB accepts one GSI creation per update.
            for gsi in gsis_to_add {
                tracing::info!(table = %table_name, gsi = %gsi.name, "Adding GSI");
                add_gsi(client, table_name, gsi).await?;
                wait_for_table_active(client, table_name).await?;
            }
        }
        DeployPlan::NoChanges { table_name } => {
            tracing::info!(table = %table_name, "Table is up to date");
        }
    }
    Ok(())
}

/// Fetches current table state, returns None if table doesn't exist.
pub async fn get_table_state(
    client: &Client,
    table_name: &str,
) -> DeployResult<Option<TableState>> {
    let response = match client.describe_table().table_name(table_name).send().await {
        Ok(response) => response,
        Err(err) => {
            return match err.into_service_error() {
                DescribeTableError::ResourceNotFoundException(_) => Ok(None),
                err => Err(sdk_error(format!("DescribeTable failed: {err:?}"))),
            };
        }
    };
    let Some(table) = response.table() else {
        return Ok(None);
    };

    let gsis = table
        .global_secondary_indexes()
        .iter()
        .map(|gsi| GsiState {
            name: gsi.index_name().unwrap_or_default().to_string(),
            status: match gsi.index_status() {
                Some(aws_sdk_dynamodb::types::IndexStatus::Creating) => GsiStatus::Creating,
                Some(aws_sdk_dynamodb::types::IndexStatus::Updating) => GsiStatus::Updating,
                Some(aws_sdk_dynamodb::types::IndexStatus::Deleting) => GsiStatus::Deleting,
                _ => GsiStatus::Active,
            },
        })
        .collect();

    let status = match table.table_status() {
        Some(aws_sdk_dynamodb::types::TableStatus::Creating) => TableStatus::Creating,
        Some(aws_sdk_dynamodb::types::TableStatus::Updating) => TableStatus::Updating,
        Some(aws_sdk_dynamodb::types::TableStatus::Deleting) => TableStatus::Deleting,
        _ => TableStatus::Active,
    };

    Ok(Some(TableState { status, gsis }))
}

fn key_schema(index: &Index) -> DeployResult<Vec<KeySchemaElement>> {
    let mut schema = vec![KeySchemaElement::builder()
        .attribute_name(&index.partition_key)
        .key_type(KeyType::Hash)
        .build()
        .map_err(sdk_error)?];

    if let Some(sk) = &index.sort_key {
        schema.push(
            KeySchemaElement::builder()
                .attribute_name(sk)
                .key_type(KeyType::Range)
                .build()
                .map_err(sdk_error)?,
        );
    }
    Ok(schema)
}

/// String attribute definitions for the key attributes of `indexes`,
/// each attribute once.
fn attribute_definitions<'a>(
    indexes: impl IntoIterator<Item = &'a Index>,
) -> DeployResult<Vec<AttributeDefinition>> {
    let mut definitions: Vec<AttributeDefinition> = Vec::new();
    for index in indexes {
        for name in std::iter::once(&index.partition_key).chain(index.sort_key.as_ref()) {
            if definitions.iter().any(|d| d.attribute_name() == name.as_str()) {
                continue;
            }
            definitions.push(
                AttributeDefinition::builder()
                    .attribute_name(name)
                    .attribute_type(ScalarAttributeType::S)
                    .build()
                    .map_err(sdk_error)?,
            );
        }
    }
    Ok(definitions)
}

fn projection_all() -> Projection {
    Projection::builder()
        .projection_type(ProjectionType::All)
        .build()
}

async fn create_table(client: &Client, table: &Table) -> DeployResult<()> {
    let indexes =
        std::iter::once(table.primary()).chain(table.secondary_indexes().map(|(_, index)| index));

    let mut request = client
        .create_table()
        .table_name(table.name())
        .set_key_schema(Some(key_schema(table.primary())?))
        .set_attribute_definitions(Some(attribute_definitions(indexes)?))
        .billing_mode(BillingMode::PayPerRequest);

    for (name, index) in table.secondary_indexes() {
        request = request.global_secondary_indexes(
            GlobalSecondaryIndex::builder()
                .index_name(name)
                .set_key_schema(Some(key_schema(index)?))
                .projection(projection_all())
                .build()
                .map_err(sdk_error)?,
        );
    }

    request.send().await.map_err(sdk_error)?;
    Ok(())
}

async fn add_gsi(client: &Client, table_name: &str, gsi: &GsiDefinition) -> DeployResult<()> {
    client
        .update_table()
        .table_name(table_name)
        .set_attribute_definitions(Some(attribute_definitions([&gsi.index])?))
        .global_secondary_index_updates(
            GlobalSecondaryIndexUpdate::builder()
                .create(
                    CreateGlobalSecondaryIndexAction::builder()
                        .index_name(&gsi.name)
                        .set_key_schema(Some(key_schema(&gsi.index)?))
                        .projection(projection_all())
                        .build()
                        .map_err(sdk_error)?,
                )
                .build(),
        )
        .send()
        .await
        .map_err(sdk_error)?;

    Ok(())
}

async fn wait_for_table_active(client: &Client, table_name: &str) -> DeployResult<()> {
    for _ in 0..ACTIVATION_ATTEMPTS {
        if let Some(state) = get_table_state(client, table_name).await? {
            if state.is_active() {
                return Ok(());
            }
            tracing::debug!(table = %table_name, status = ?state.status, "Waiting for table");
        }
        tokio::time::sleep(ACTIVATION_DELAY).await;
    }

    Err(DeployError::TableActivationTimeout {
        table_name: table_name.to_string(),
    })
}
