//! In-memory store implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use dynamodel_core::query::QuerySpec;
use dynamodel_core::store::{Item, ItemKey, PutCondition, QueryPage, Result, Store, StoreError};
use dynamodel_core::table::{Index, Table};

type PrimaryKey = (String, Option<String>);
type TableItems = HashMap<PrimaryKey, Item>;

/// Index sort key, then primary key.
type Position = [Option<String>; 3];

/// In-memory storage backend for testing.
///
/// Tables must be created before use, as in DynamoDB. Data is not
/// persisted and will be lost when the last clone of the store is dropped.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<HashMap<String, TableItems>>>,
    filters: bool,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates a new store without tables.
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            filters: true,
        }
    }

    /// A store that rejects filter expressions, so callers filter results
    /// themselves.
    pub fn without_filter_support() -> Self {
        Self {
            filters: false,
            ..Self::new()
        }
    }

    /// Creates `table` if it does not exist yet.
    pub async fn create_table(&self, table: &Table) {
        let mut tables = self.tables.write().await;
        tables.entry(table.name().to_string()).or_default();
    }

    /// Number of items stored in `table`.
    pub async fn item_count(&self, table: &Table) -> usize {
        let tables = self.tables.read().await;
        tables.get(table.name()).map_or(0, HashMap::len)
    }
}

fn table_not_found(table: &Table) -> StoreError {
    StoreError::TableNotFound(table.name().to_string())
}

fn primary_key(item: &Item, table: &Table) -> Result<PrimaryKey> {
    ItemKey::from_item(item, table.primary())
        .map(|key| key_tuple(&key))
        .ok_or_else(|| {
            StoreError::Serialization(format!(
                "item is missing the primary key attributes of table {}",
                table.name()
            ))
        })
}

fn key_tuple(key: &ItemKey) -> PrimaryKey {
    (
        key.partition.value.clone(),
        key.sort.as_ref().map(|sort| sort.value.clone()),
    )
}

fn read_string(item: &Item, name: Option<&String>) -> Option<String> {
    name.and_then(|name| item.get(name))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn position(item: &Item, index: &Index, primary: &Index) -> Position {
    [
        read_string(item, index.sort_key.as_ref()),
        read_string(item, Some(&primary.partition_key)),
        read_string(item, primary.sort_key.as_ref()),
    ]
}

/// The key attributes DynamoDB reports as `LastEvaluatedKey`.
fn evaluated_key(item: &Item, index: &Index, primary: &Index) -> Item {
    [
        Some(&index.partition_key),
        index.sort_key.as_ref(),
        Some(&primary.partition_key),
        primary.sort_key.as_ref(),
    ]
    .into_iter()
    .flatten()
    .filter_map(|name| item.get(name).map(|value| (name.clone(), value.clone())))
    .collect()
}

#[async_trait]
impl Store for InMemoryStore {
    async fn put_item(
        &self,
        table: &Table,
        item: Item,
        condition: Option<PutCondition>,
    ) -> Result<()> {
        let key = primary_key(&item, table)?;
        let mut tables = self.tables.write().await;
        let items = tables
            .get_mut(table.name())
            .ok_or_else(|| table_not_found(table))?;

        if let Some(condition) = condition {
            if !condition.holds(items.get(&key)) {
                return Err(StoreError::ConditionFailed {
                    table: table.name().to_string(),
                });
            }
        }

        items.insert(key, item);
        Ok(())
    }

    async fn get_item(&self, table: &Table, key: &ItemKey) -> Result<Option<Item>> {
        let tables = self.tables.read().await;
        let items = tables
            .get(table.name())
            .ok_or_else(|| table_not_found(table))?;
        Ok(items.get(&key_tuple(key)).cloned())
    }

    async fn query_items(&self, table: &Table, query: &QuerySpec) -> Result<QueryPage> {
        if query.filter.is_some() && !self.filters {
            return Err(StoreError::RequestFailed(
                "filter expressions are not supported by this store".to_string(),
            ));
        }
        if query.limit == Some(0) {
            return Err(StoreError::RequestFailed(
                "limit must be greater than 0".to_string(),
            ));
        }
        let index = table.index(&query.index).ok_or_else(|| {
            StoreError::RequestFailed(format!(
                "index {} does not exist on table {}",
                query.index,
                table.name()
            ))
        })?;
        let primary = table.primary();

        let tables = self.tables.read().await;
        let items = tables
            .get(table.name())
            .ok_or_else(|| table_not_found(table))?;

        // Secondary indexes are sparse: items without the key attributes
        // are not part of them.
        let mut selected: Vec<(Position, &Item)> = items
            .values()
            .filter(|item| ItemKey::from_item(item, index).is_some())
            .filter(|item| query.matches_key(item))
            .map(|item| (position(item, index, primary), item))
            .collect();
        selected.sort_by(|a, b| a.0.cmp(&b.0));
        if !query.ascending {
            selected.reverse();
        }

        if let Some(start) = &query.exclusive_start_key {
            let start = position(start, index, primary);
            selected.retain(|(pos, _)| {
                if query.ascending {
                    *pos > start
                } else {
                    *pos < start
                }
            });
        }

        // The limit counts evaluated items, before the filter.
        let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);
        let truncated = selected.len() > limit;
        selected.truncate(limit);

        let last_evaluated_key = if truncated {
            selected
                .last()
                .map(|(_, item)| evaluated_key(item, index, primary))
        } else {
            None
        };

        let items = selected
            .into_iter()
            .map(|(_, item)| item)
            .filter(|item| query.passes_filter(item))
            .cloned()
            .collect();

        Ok(QueryPage {
            items,
            last_evaluated_key,
        })
    }

    fn supports_filters(&self) -> bool {
        self.filters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynamodel_core::query::{DomainFilter, KeyCondition, SortCondition};
    use dynamodel_core::store::KeyAttribute;
    use dynamodel_core::table::IndexName;
    use serde_json::json;

    fn table() -> Table {
        Table::builder("app", Index::new("PK").with_sort_key("SK"))
            .secondary_index("GSI1", Index::new("GSI1PK").with_sort_key("GSI1SK"))
            .build()
            .unwrap()
    }

    fn item(value: Value) -> Item {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn order(user: &str, id: u32, tag: &str) -> Item {
        item(json!({
            "PK": format!("USER#{user}"),
            "SK": format!("ORDER#{id:03}"),
            "entityType": tag,
            "id": id,
        }))
    }

    fn key(pk: &str, sk: &str) -> ItemKey {
        ItemKey {
            partition: KeyAttribute::new("PK", pk),
            sort: Some(KeyAttribute::new("SK", sk)),
        }
    }

    fn partition_query(pk: &str) -> QuerySpec {
        QuerySpec {
            index: IndexName::Primary,
            key: KeyCondition {
                partition: KeyAttribute::new("PK", pk),
                sort: None,
            },
            filter: None,
            limit: None,
            ascending: true,
            exclusive_start_key: None,
        }
    }

    async fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        let table = table();
        store.create_table(&table).await;
        for id in [2, 1, 3] {
            store
                .put_item(&table, order("alice", id, "order"), None)
                .await
                .unwrap();
        }
        store
            .put_item(&table, order("bob", 1, "order"), None)
            .await
            .unwrap();
        store
    }

    fn ids(page: &QueryPage) -> Vec<u64> {
        page.items
            .iter()
            .map(|item| item["id"].as_u64().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let store = seeded_store().await;
        let found = store
            .get_item(&table(), &key("USER#alice", "ORDER#002"))
            .await
            .unwrap();
        assert_eq!(found, Some(order("alice", 2, "order")));
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let store = seeded_store().await;
        let found = store
            .get_item(&table(), &key("USER#alice", "ORDER#999"))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_existing() {
        let store = seeded_store().await;
        let table = table();
        store
            .put_item(&table, order("alice", 1, "invoice"), None)
            .await
            .unwrap();

        let found = store
            .get_item(&table, &key("USER#alice", "ORDER#001"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found["entityType"], "invoice");
        assert_eq!(store.item_count(&table).await, 4);
    }

    #[tokio::test]
    async fn test_put_condition_not_exists() {
        let store = seeded_store().await;
        let condition = PutCondition::NotExists {
            attribute: "PK".to_string(),
        };

        let result = store
            .put_item(&table(), order("alice", 1, "order"), Some(condition.clone()))
            .await;
        assert_eq!(
            result,
            Err(StoreError::ConditionFailed {
                table: "app".to_string()
            })
        );

        store
            .put_item(&table(), order("alice", 4, "order"), Some(condition))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_put_without_key_attributes() {
        let store = seeded_store().await;
        let result = store
            .put_item(&table(), item(json!({ "PK": "USER#alice" })), None)
            .await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let store = InMemoryStore::new();
        let result = store.get_item(&table(), &key("a", "b")).await;
        assert_eq!(result, Err(StoreError::TableNotFound("app".to_string())));
    }

    #[tokio::test]
    async fn test_query_orders_by_sort_key() {
        let store = seeded_store().await;
        let page = store
            .query_items(&table(), &partition_query("USER#alice"))
            .await
            .unwrap();
        assert_eq!(ids(&page), vec![1, 2, 3]);
        assert!(page.last_evaluated_key.is_none());

        let mut descending = partition_query("USER#alice");
        descending.ascending = false;
        let page = store.query_items(&table(), &descending).await.unwrap();
        assert_eq!(ids(&page), vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_query_sort_conditions() {
        let store = seeded_store().await;

        let mut exact = partition_query("USER#alice");
        exact.key.sort = Some(SortCondition::Equals(KeyAttribute::new("SK", "ORDER#002")));
        let page = store.query_items(&table(), &exact).await.unwrap();
        assert_eq!(ids(&page), vec![2]);

        let mut prefix = partition_query("USER#alice");
        prefix.key.sort = Some(SortCondition::BeginsWith(KeyAttribute::new("SK", "ORDER#00")));
        let page = store.query_items(&table(), &prefix).await.unwrap();
        assert_eq!(ids(&page), vec![1, 2, 3]);

        let mut none = partition_query("USER#alice");
        none.key.sort = Some(SortCondition::BeginsWith(KeyAttribute::new("SK", "INVOICE#")));
        let page = store.query_items(&table(), &none).await.unwrap();
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_query_pages_with_limit() {
        let store = seeded_store().await;
        let mut query = partition_query("USER#alice");
        query.limit = Some(2);

        let first = store.query_items(&table(), &query).await.unwrap();
        assert_eq!(ids(&first), vec![1, 2]);
        let start = first.last_evaluated_key.clone().unwrap();
        assert_eq!(start, item(json!({ "PK": "USER#alice", "SK": "ORDER#002" })));

        query.exclusive_start_key = Some(start);
        let second = store.query_items(&table(), &query).await.unwrap();
        assert_eq!(ids(&second), vec![3]);
        assert!(second.last_evaluated_key.is_none());
    }

    #[tokio::test]
    async fn test_query_limit_applies_before_filter() {
        let store = seeded_store().await;
        let table = table();
        store
            .put_item(&table, order("alice", 0, "invoice"), None)
            .await
            .unwrap();

        let mut query = partition_query("USER#alice");
        query.limit = Some(2);
        query.filter = Some(DomainFilter {
            attribute: "entityType".to_string(),
            value: "order".to_string(),
        });

        let page = store.query_items(&table, &query).await.unwrap();
        assert_eq!(ids(&page), vec![1]);
        assert!(page.last_evaluated_key.is_some());
    }

    #[tokio::test]
    async fn test_query_secondary_index_is_sparse() {
        let store = seeded_store().await;
        let table = table();
        let mut indexed = order("carol", 1, "order");
        indexed.insert("GSI1PK".to_string(), json!("EMAIL#c@x.com"));
        indexed.insert("GSI1SK".to_string(), json!("USER#carol"));
        store.put_item(&table, indexed, None).await.unwrap();

        let query = QuerySpec {
            index: IndexName::named("GSI1"),
            key: KeyCondition {
                partition: KeyAttribute::new("GSI1PK", "EMAIL#c@x.com"),
                sort: None,
            },
            ..partition_query("")
        };
        let page = store.query_items(&table, &query).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0]["PK"], "USER#carol");
    }

    #[tokio::test]
    async fn test_query_unknown_index() {
        let store = seeded_store().await;
        let query = QuerySpec {
            index: IndexName::named("GSI9"),
            ..partition_query("USER#alice")
        };
        let result = store.query_items(&table(), &query).await;
        assert!(matches!(result, Err(StoreError::RequestFailed(_))));
    }

    #[tokio::test]
    async fn test_store_without_filter_support_rejects_filters() {
        let store = InMemoryStore::without_filter_support();
        store.create_table(&table()).await;
        assert!(!store.supports_filters());

        let mut query = partition_query("USER#alice");
        query.filter = Some(DomainFilter {
            attribute: "entityType".to_string(),
            value: "order".to_string(),
        });
        let result = store.query_items(&table(), &query).await;
        assert!(matches!(result, Err(StoreError::RequestFailed(_))));
    }
}
