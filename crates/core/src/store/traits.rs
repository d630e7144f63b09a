use async_trait::async_trait;

use crate::query::QuerySpec;
use crate::table::Table;

use super::{Item, ItemKey, PutCondition, QueryPage, Result};

/// A single-table key-value store.
///
/// Implementations perform exactly one request per call and never retry.
#[async_trait]
pub trait Store: Send + Sync {
    /// Writes an item, replacing any item under the same primary key.
    ///
    /// A failed `condition` is reported as [`super::StoreError::ConditionFailed`].
    async fn put_item(
        &self,
        table: &Table,
        item: Item,
        condition: Option<PutCondition>,
    ) -> Result<()>;

    /// Reads the item under a primary key.
    async fn get_item(&self, table: &Table, key: &ItemKey) -> Result<Option<Item>>;

    /// Runs one query against the index named by `query`.
    async fn query_items(&self, table: &Table, query: &QuerySpec) -> Result<QueryPage>;

    /// Whether filter expressions are evaluated by the store.
    fn supports_filters(&self) -> bool {
        true
    }
}
