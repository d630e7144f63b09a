//! Typed repository over a store.

use std::sync::Arc;

use serde_json::Value;

use dynamodel_core::query::QuerySpec;
use dynamodel_core::store::{ItemKey, PutCondition, Store, StoreError};
use dynamodel_core::{
    Codec, Cursor, IndexName, Model, ModelError, ModelSchema, QueryOptions, Record, Result, Table,
};

/// One page of decoded records.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<M> {
    pub items: Vec<Record<M>>,
    /// Present when the store has more results; pass it to
    /// [`QueryOptions::start_from`] to continue.
    pub cursor: Option<Cursor>,
}

impl<M> Page<M> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Reads and writes one model through a store.
///
/// Every operation is one logical request. Writes and paged reads issue a
/// single store request; `query`, `find_one` and `get_from` follow the
/// store's continuation token while a truncated page leaves results behind.
pub struct Repository<M, S> {
    store: Arc<S>,
    codec: Codec<M>,
}

impl<M, S> Clone for Repository<M, S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            codec: self.codec.clone(),
        }
    }
}

impl<M: Model, S: Store> Repository<M, S> {
    /// Compiles `M`'s declaration and binds it to `store`.
    pub fn new(store: Arc<S>) -> Result<Self> {
        Ok(Self::with_codec(store, Codec::new()?))
    }

    /// Binds an already compiled codec, e.g. one whose table was renamed
    /// for the current environment.
    pub fn with_codec(store: Arc<S>, codec: Codec<M>) -> Self {
        Self { store, codec }
    }

    pub fn schema(&self) -> &ModelSchema {
        self.codec.schema()
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn table(&self) -> &Table {
        self.schema().table()
    }

    /// Writes `value`, replacing any item under the same primary key.
    ///
    /// The keys of every satisfiable access pattern are written in the same
    /// item.
    pub async fn save(&self, value: &M) -> Result<Record<M>> {
        let (item, record) = self.prepare(value)?;
        tracing::debug!(
            table = %self.table().name(),
            model = %self.schema().name(),
            indexes = record.keys().len(),
            "put_item"
        );
        self.store
            .put_item(self.table(), item, None)
            .await
            .map_err(|err| self.store_failure("put_item", err))?;
        Ok(record)
    }

    /// Writes `value` unless an item already exists under its primary key.
    pub async fn create(&self, value: &M) -> Result<Record<M>> {
        let (item, record) = self.prepare(value)?;
        let key = self.primary_item_key(&record)?;
        let condition = PutCondition::NotExists {
            attribute: self.table().primary().partition_key.clone(),
        };

        tracing::debug!(table = %self.table().name(), %key, "put_item if not exists");
        match self.store.put_item(self.table(), item, Some(condition)).await {
            Ok(()) => Ok(record),
            Err(StoreError::ConditionFailed { .. }) => Err(ModelError::AlreadyExists {
                model: self.schema().name().to_string(),
                key: key.to_string(),
            }),
            Err(err) => Err(self.store_failure("put_item", err)),
        }
    }

    /// Reads the item whose primary key the arguments bind.
    ///
    /// Arguments bind the placeholders of the first primary pattern that can
    /// take them, partition key first.
    pub async fn get(&self, args: &[Value]) -> Result<Record<M>> {
        let key = self.schema().primary_key(args)?;
        tracing::debug!(table = %self.table().name(), %key, "get_item");

        let item = self
            .store
            .get_item(self.table(), &key)
            .await
            .map_err(|err| self.store_failure("get_item", err))?
            .ok_or_else(|| ModelError::NotFound {
                model: self.schema().name().to_string(),
                key: key.to_string(),
            })?;
        self.codec.decode(item)
    }

    /// Reads the one item whose keys on a secondary index the arguments bind.
    pub async fn get_from(&self, index: &IndexName, args: &[Value]) -> Result<Record<M>> {
        let spec = self.schema().lookup_spec(index, args)?;
        let key = describe_key(&spec);
        self.collect(spec, true)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::NotFound {
                model: self.schema().name().to_string(),
                key,
            })
    }

    /// Every record matching a partial key on `index`, across pages.
    pub async fn query(&self, index: &IndexName, args: &[Value]) -> Result<Vec<Record<M>>> {
        let spec = self
            .schema()
            .query_spec(index, args, QueryOptions::default(), true)?;
        self.collect(spec, false).await
    }

    /// One page of records matching a partial key on `index`.
    ///
    /// The limit counts items the store evaluated, before the domain filter,
    /// so a page may hold fewer records than the limit and still carry a
    /// cursor.
    pub async fn query_page(
        &self,
        index: &IndexName,
        args: &[Value],
        options: QueryOptions,
    ) -> Result<Page<M>> {
        let spec = self.schema().query_spec(index, args, options, true)?;
        self.run(spec).await
    }

    /// The first record matching a partial key on `index`.
    pub async fn find_one(&self, index: &IndexName, args: &[Value]) -> Result<Option<Record<M>>> {
        // No limit: it would apply before the domain filter.
        let spec = self
            .schema()
            .query_spec(index, args, QueryOptions::default(), true)?;
        Ok(self.collect(spec, true).await?.into_iter().next())
    }

    /// Every record of this model, through the table's domain index.
    pub async fn list_domain(&self, options: QueryOptions) -> Result<Page<M>> {
        let spec = self.schema().domain_query(options)?;
        self.run(spec).await
    }

    fn prepare(&self, value: &M) -> Result<(dynamodel_core::Item, Record<M>)> {
        let (item, _) = self.codec.encode(value)?;
        // Decoding the written item applies the same defaults and key
        // checks a later read would.
        let record = self.codec.decode(item.clone())?;
        tracing::trace!(model = %self.schema().name(), ?item, "Encoded item");
        Ok((item, record))
    }

    /// Runs `spec` page after page until the cursor runs out, or until a
    /// page yields a record when `first_only`.
    ///
    /// A filtered page can be empty and still carry a cursor, so an empty
    /// page never ends the read on its own.
    async fn collect(&self, mut spec: QuerySpec, first_only: bool) -> Result<Vec<Record<M>>> {
        let mut records = Vec::new();
        loop {
            let page = self.run(spec.clone()).await?;
            records.extend(page.items);
            match page.cursor {
                Some(cursor) if !(first_only && !records.is_empty()) => {
                    tracing::debug!(
                        model = %self.schema().name(),
                        collected = records.len(),
                        "Following continuation"
                    );
                    spec.exclusive_start_key = Some(cursor.into_item());
                }
                _ => return Ok(records),
            }
        }
    }

    async fn run(&self, spec: QuerySpec) -> Result<Page<M>> {
        let client_filter = spec.filter.is_some() && !self.store.supports_filters();
        let request = if client_filter {
            spec.clone().without_filter()
        } else {
            spec.clone()
        };

        tracing::debug!(
            table = %self.table().name(),
            index = %request.index,
            key = %describe_key(&request),
            filter = request.filter.is_some(),
            limit = ?request.limit,
            "query"
        );
        let page = self
            .store
            .query_items(self.table(), &request)
            .await
            .map_err(|err| self.store_failure("query", err))?;

        let cursor = page.cursor();
        let items = page
            .items
            .into_iter()
            .filter(|item| !client_filter || spec.passes_filter(item))
            .map(|item| self.codec.decode(item))
            .collect::<Result<Vec<_>>>()?;

        Ok(Page { items, cursor })
    }

    fn primary_item_key(&self, record: &Record<M>) -> Result<ItemKey> {
        record
            .keys()
            .primary()
            .map(|key| key.item_key())
            .ok_or_else(|| ModelError::UnsatisfiedPattern {
                model: self.schema().name().to_string(),
                index: IndexName::Primary.to_string(),
            })
    }

    fn store_failure(&self, operation: &'static str, err: StoreError) -> ModelError {
        tracing::warn!(
            table = %self.table().name(),
            operation,
            error = %err,
            transient = err.is_transient(),
            "Store request failed"
        );
        ModelError::Store(err)
    }
}

/// `PK=v, SK=v` for log lines and errors.
pub(crate) fn describe_key(spec: &QuerySpec) -> String {
    let partition = &spec.key.partition;
    match &spec.key.sort {
        Some(sort) => {
            let sort = sort.attribute();
            format!(
                "{}={}, {}={}",
                partition.name, partition.value, sort.name, sort.value
            )
        }
        None => format!("{}={}", partition.name, partition.value),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::OnceLock;

    use async_trait::async_trait;
    use dynamodel_core::store::{Item, QueryPage};
    use dynamodel_core::{FieldKind, FieldSet, Index, ModelSettings};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;
    use crate::storage::inmemory::InMemoryStore;

    const USER_ID: &str = "550e8400-e29b-41d4-a716-446655440001";

    fn table() -> Arc<Table> {
        static TABLE: OnceLock<Arc<Table>> = OnceLock::new();
        Arc::clone(TABLE.get_or_init(|| {
            Arc::new(
                Table::builder("app", Index::new("PK").with_sort_key("SK"))
                    .secondary_index("GSI1", Index::new("GSI1PK").with_sort_key("GSI1SK"))
                    .build()
                    .unwrap(),
            )
        }))
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        id: String,
        email: Option<String>,
    }

    impl Model for User {
        fn settings() -> ModelSettings {
            ModelSettings::builder("User", table())
                .domain("user")
                .fields(
                    FieldSet::new("user")
                        .field("id", FieldKind::Uuid)
                        .field("email", FieldKind::String),
                )
                .access_pattern(IndexName::Primary, "user:{id}", "user:{id}")
                .access_pattern("GSI1", "user-email:{email}", "user:{id}")
                .build()
        }
    }

    fn user() -> User {
        User {
            id: USER_ID.to_string(),
            email: Some("a@b.com".to_string()),
        }
    }

    async fn repository() -> Repository<User, InMemoryStore> {
        let store = InMemoryStore::new();
        store.create_table(&table()).await;
        Repository::new(Arc::new(store)).unwrap()
    }

    /// Wraps a store and counts requests.
    struct CountingStore {
        inner: InMemoryStore,
        requests: AtomicUsize,
    }

    #[async_trait]
    impl Store for CountingStore {
        async fn put_item(
            &self,
            table: &Table,
            item: Item,
            condition: Option<PutCondition>,
        ) -> dynamodel_core::store::Result<()> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.inner.put_item(table, item, condition).await
        }

        async fn get_item(
            &self,
            table: &Table,
            key: &ItemKey,
        ) -> dynamodel_core::store::Result<Option<Item>> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.inner.get_item(table, key).await
        }

        async fn query_items(
            &self,
            table: &Table,
            query: &QuerySpec,
        ) -> dynamodel_core::store::Result<QueryPage> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.inner.query_items(table, query).await
        }
    }

    /// Caps every query at one evaluated item, so a filtered page can come
    /// back empty with a cursor.
    struct OneItemPagesStore {
        inner: InMemoryStore,
        queries: AtomicUsize,
    }

    #[async_trait]
    impl Store for OneItemPagesStore {
        async fn put_item(
            &self,
            table: &Table,
            item: Item,
            condition: Option<PutCondition>,
        ) -> dynamodel_core::store::Result<()> {
            self.inner.put_item(table, item, condition).await
        }

        async fn get_item(
            &self,
            table: &Table,
            key: &ItemKey,
        ) -> dynamodel_core::store::Result<Option<Item>> {
            self.inner.get_item(table, key).await
        }

        async fn query_items(
            &self,
            table: &Table,
            query: &QuerySpec,
        ) -> dynamodel_core::store::Result<QueryPage> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            let mut query = query.clone();
            query.limit = Some(1);
            self.inner.query_items(table, &query).await
        }
    }

    /// A store that fails every request.
    struct FailingStore;

    #[async_trait]
    impl Store for FailingStore {
        async fn put_item(
            &self,
            _table: &Table,
            _item: Item,
            _condition: Option<PutCondition>,
        ) -> dynamodel_core::store::Result<()> {
            Err(StoreError::Throttled("slow down".to_string()))
        }

        async fn get_item(
            &self,
            _table: &Table,
            _key: &ItemKey,
        ) -> dynamodel_core::store::Result<Option<Item>> {
            Err(StoreError::ConnectionFailed("refused".to_string()))
        }

        async fn query_items(
            &self,
            _table: &Table,
            _query: &QuerySpec,
        ) -> dynamodel_core::store::Result<QueryPage> {
            Err(StoreError::RequestFailed("bad request".to_string()))
        }
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let repo = repository().await;
        let saved = repo.save(&user()).await.unwrap();
        assert_eq!(saved.value(), &user());
        assert_eq!(saved.keys().len(), 2);

        let found = repo.get(&[json!(USER_ID)]).await.unwrap();
        assert_eq!(found.into_inner(), user());
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let repo = repository().await;
        let result = repo.get(&[json!(USER_ID)]).await;
        assert_eq!(
            result.map(|_| ()),
            Err(ModelError::NotFound {
                model: "User".to_string(),
                key: format!("PK=user:{USER_ID}, SK=user:{USER_ID}"),
            })
        );
    }

    #[tokio::test]
    async fn test_create_rejects_existing() {
        let repo = repository().await;
        repo.create(&user()).await.unwrap();

        let result = repo.create(&user()).await;
        assert!(matches!(result, Err(ModelError::AlreadyExists { .. })));
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let repo = repository().await;
        repo.save(&user()).await.unwrap();

        let changed = User {
            email: Some("new@b.com".to_string()),
            ..user()
        };
        repo.save(&changed).await.unwrap();

        let found = repo.get(&[json!(USER_ID)]).await.unwrap();
        assert_eq!(found.email.as_deref(), Some("new@b.com"));
        assert_eq!(repo.store().item_count(&table()).await, 1);
    }

    #[tokio::test]
    async fn test_get_from_secondary_index() {
        let repo = repository().await;
        repo.save(&user()).await.unwrap();

        let found = repo
            .get_from(&IndexName::named("GSI1"), &[json!("a@b.com"), json!(USER_ID)])
            .await
            .unwrap();
        assert_eq!(found.into_inner(), user());

        let missing = repo
            .get_from(&IndexName::named("GSI1"), &[json!("x@b.com"), json!(USER_ID)])
            .await;
        assert!(matches!(missing, Err(ModelError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_find_one() {
        let repo = repository().await;
        repo.save(&user()).await.unwrap();

        let found = repo
            .find_one(&IndexName::named("GSI1"), &[json!("a@b.com")])
            .await
            .unwrap();
        assert_eq!(found.map(Record::into_inner), Some(user()));

        let none = repo
            .find_one(&IndexName::named("GSI1"), &[json!("x@b.com")])
            .await
            .unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_each_operation_issues_one_request() {
        let store = Arc::new(CountingStore {
            inner: InMemoryStore::new(),
            requests: AtomicUsize::new(0),
        });
        store.inner.create_table(&table()).await;
        let repo = Repository::<User, _>::new(Arc::clone(&store)).unwrap();
        let gsi = IndexName::named("GSI1");

        repo.save(&user()).await.unwrap();
        assert_eq!(store.requests.load(Ordering::SeqCst), 1);
        repo.get(&[json!(USER_ID)]).await.unwrap();
        assert_eq!(store.requests.load(Ordering::SeqCst), 2);
        repo.get_from(&gsi, &[json!("a@b.com"), json!(USER_ID)])
            .await
            .unwrap();
        assert_eq!(store.requests.load(Ordering::SeqCst), 3);
        repo.query(&gsi, &[json!("a@b.com")]).await.unwrap();
        assert_eq!(store.requests.load(Ordering::SeqCst), 4);
        repo.find_one(&gsi, &[json!("a@b.com")]).await.unwrap();
        assert_eq!(store.requests.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_reads_follow_cursor_past_filtered_pages() {
        let store = Arc::new(OneItemPagesStore {
            inner: InMemoryStore::new(),
            queries: AtomicUsize::new(0),
        });
        store.inner.create_table(&table()).await;
        // Sorts first on GSI1 and belongs to another model.
        store
            .inner
            .put_item(
                &table(),
                serde_json::from_value(json!({
                    "PK": "account:1",
                    "SK": "account:1",
                    "GSI1PK": "user-email:a@b.com",
                    "GSI1SK": format!("user:{USER_ID}"),
                    "entityType": "account",
                }))
                .unwrap(),
                None,
            )
            .await
            .unwrap();
        let repo = Repository::<User, _>::new(Arc::clone(&store)).unwrap();
        repo.save(&user()).await.unwrap();
        let gsi = IndexName::named("GSI1");

        let page = repo
            .query_page(&gsi, &[json!("a@b.com")], QueryOptions::default())
            .await
            .unwrap();
        assert!(page.is_empty());
        assert!(page.cursor.is_some());

        let found = repo.find_one(&gsi, &[json!("a@b.com")]).await.unwrap();
        assert_eq!(found.map(Record::into_inner), Some(user()));

        let all = repo.query(&gsi, &[json!("a@b.com")]).await.unwrap();
        assert_eq!(all.len(), 1);

        let exact = repo
            .get_from(&gsi, &[json!("a@b.com"), json!(USER_ID)])
            .await
            .unwrap();
        assert_eq!(exact.into_inner(), user());

        store.queries.store(0, Ordering::SeqCst);
        let none = repo.find_one(&gsi, &[json!("x@b.com")]).await.unwrap();
        assert!(none.is_none());
        assert_eq!(store.queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_argument_errors_skip_the_store() {
        let store = Arc::new(CountingStore {
            inner: InMemoryStore::new(),
            requests: AtomicUsize::new(0),
        });
        let repo = Repository::<User, _>::new(Arc::clone(&store)).unwrap();

        let result = repo.get(&[json!(USER_ID), json!("extra")]).await;
        assert!(matches!(result, Err(ModelError::TooManyArguments { .. })));
        let result = repo.get(&[json!("not-a-uuid")]).await;
        assert!(matches!(result, Err(ModelError::Coercion { .. })));
        assert_eq!(store.requests.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_errors_propagate_unchanged() {
        let repo = Repository::<User, _>::new(Arc::new(FailingStore)).unwrap();

        assert_eq!(
            repo.save(&user()).await.map(|_| ()),
            Err(ModelError::Store(StoreError::Throttled(
                "slow down".to_string()
            )))
        );
        assert_eq!(
            repo.create(&user()).await.map(|_| ()),
            Err(ModelError::Store(StoreError::Throttled(
                "slow down".to_string()
            )))
        );
        assert_eq!(
            repo.get(&[json!(USER_ID)]).await.map(|_| ()),
            Err(ModelError::Store(StoreError::ConnectionFailed(
                "refused".to_string()
            )))
        );
        assert_eq!(
            repo.query(&IndexName::Primary, &[json!(USER_ID)])
                .await
                .map(|_| ()),
            Err(ModelError::Store(StoreError::RequestFailed(
                "bad request".to_string()
            )))
        );
    }

    #[tokio::test]
    async fn test_list_domain_without_domain_index() {
        let repo = repository().await;
        let result = repo.list_domain(QueryOptions::default()).await;
        assert!(matches!(result, Err(ModelError::NoPatternForIndex { .. })));
    }

    #[test]
    fn test_describe_key() {
        let spec = QuerySpec {
            index: IndexName::Primary,
            key: dynamodel_core::query::KeyCondition {
                partition: dynamodel_core::KeyAttribute::new("PK", "user:1"),
                sort: None,
            },
            filter: None,
            limit: None,
            ascending: true,
            exclusive_start_key: None,
        };
        assert_eq!(describe_key(&spec), "PK=user:1");
    }
}
