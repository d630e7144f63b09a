use std::env;

use dynamodel_core::Table;

const DEFAULT_REGION: &str = "us-east-1";

/// DynamoDB connection settings loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamoDbConfig {
    /// Custom endpoint URL (for local DynamoDB).
    pub endpoint_url: Option<String>,
    /// AWS region (default: us-east-1)
    pub region: String,
    /// Prepended to every table name.
    pub table_prefix: Option<String>,
}

impl DynamoDbConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `AWS_ENDPOINT_URL` - Endpoint override, e.g. `http://localhost:8000`
    /// - `AWS_REGION` - AWS region (default: "us-east-1")
    /// - `DYNAMODEL_TABLE_PREFIX` - Table name prefix (default: none)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    ///
    /// Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());
        Self {
            endpoint_url: var("AWS_ENDPOINT_URL"),
            region: var("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            table_prefix: var("DYNAMODEL_TABLE_PREFIX"),
        }
    }

    /// Returns a display string for the target environment.
    pub fn target_display(&self) -> String {
        match &self.endpoint_url {
            Some(url) => format!("Local DynamoDB ({})", url),
            None => format!("AWS DynamoDB (region: {})", self.region),
        }
    }

    /// The physical name of a declared table.
    pub fn table_name(&self, name: &str) -> String {
        match &self.table_prefix {
            Some(prefix) => format!("{prefix}{name}"),
            None => name.to_string(),
        }
    }

    /// A copy of `table` renamed with the configured prefix.
    pub fn resolve_table(&self, table: &Table) -> Table {
        let name = self.table_name(table.name());
        table.clone().with_name(name)
    }
}

impl Default for DynamoDbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
