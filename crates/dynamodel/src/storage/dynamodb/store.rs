//! DynamoDB store implementation.
//!
//! Implements the `Store` trait from `dynamodel_core::store` using
//! `aws-sdk-dynamodb`.

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;

use dynamodel_core::query::QuerySpec;
use dynamodel_core::store::{Item, ItemKey, PutCondition, QueryPage, Result, Store};
use dynamodel_core::Table;

use super::conversions::{attributes_to_item, item_to_attributes, string_values};
use super::error::{map_get_item_error, map_put_item_error, map_query_error};
use crate::config::DynamoDbConfig;

/// DynamoDB-based store.
#[derive(Debug, Clone)]
pub struct DynamoDbStore {
    client: Client,
}

impl DynamoDbStore {
    /// Creates a new store with the given DynamoDB client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Creates a new store from environment configuration.
    ///
    /// Uses the AWS SDK default credential chain, see
    /// [`DynamoDbConfig::from_env`] for the variables read.
    pub async fn from_env() -> Self {
        Self::new(create_client(&DynamoDbConfig::from_env()).await)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Creates a DynamoDB client with the given configuration.
pub async fn create_client(config: &DynamoDbConfig) -> Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new(config.region.clone()));

    if let Some(endpoint) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    let sdk_config = loader.load().await;
    Client::new(&sdk_config)
}

#[async_trait]
impl Store for DynamoDbStore {
    async fn put_item(
        &self,
        table: &Table,
        item: Item,
        condition: Option<PutCondition>,
    ) -> Result<()> {
        let mut request = self
            .client
            .put_item()
            .table_name(table.name())
            .set_item(Some(item_to_attributes(&item)));

        if let Some(condition) = &condition {
            request = request
                .condition_expression(condition.expression())
                .expression_attribute_names("#cond", condition.attribute());
        }

        request
            .send()
            .await
            .map_err(|e| map_put_item_error(e, table.name()))?;
        Ok(())
    }

    async fn get_item(&self, table: &Table, key: &ItemKey) -> Result<Option<Item>> {
        let mut request = self.client.get_item().table_name(table.name());
        for attribute in key.attributes() {
            request = request.key(&attribute.name, AttributeValue::S(attribute.value.clone()));
        }

        let result = request
            .send()
            .await
            .map_err(|e| map_get_item_error(e, table.name()))?;

        result.item.as_ref().map(attributes_to_item).transpose()
    }

    async fn query_items(&self, table: &Table, query: &QuerySpec) -> Result<QueryPage> {
        let result = self
            .client
            .query()
            .table_name(table.name())
            .set_index_name(query.index.as_index_name().map(str::to_string))
            .key_condition_expression(query.key_condition_expression())
            .set_filter_expression(query.filter_expression())
            .set_expression_attribute_names(Some(
                query.expression_attribute_names().into_iter().collect(),
            ))
            .set_expression_attribute_values(Some(string_values(
                &query.expression_attribute_values(),
            )))
            .scan_index_forward(query.ascending)
            .set_limit(query.limit.map(|limit| i32::try_from(limit).unwrap_or(i32::MAX)))
            .set_exclusive_start_key(query.exclusive_start_key.as_ref().map(item_to_attributes))
            .send()
            .await
            .map_err(|e| map_query_error(e, table.name()))?;

        let items = result
            .items
            .unwrap_or_default()
            .iter()
            .map(attributes_to_item)
            .collect::<Result<Vec<_>>>()?;
        let last_evaluated_key = result
            .last_evaluated_key
            .as_ref()
            .map(attributes_to_item)
            .transpose()?;

        Ok(QueryPage {
            items,
            last_evaluated_key,
        })
    }
}
