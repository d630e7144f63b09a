//! Multi-model queries over a shared partition.

use std::sync::Arc;

use serde_json::Value;

use dynamodel_core::query::QuerySpec;
use dynamodel_core::store::{QueryPage, Store};
use dynamodel_core::{CollectionSchema, GroupedResult, IndexName, Member, QueryOptions, Result};

use crate::repository::describe_key;

/// Reads several models stored under one partition with a single query.
pub struct Collection<S> {
    store: Arc<S>,
    schema: CollectionSchema,
}

impl<S> Clone for Collection<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            schema: self.schema.clone(),
        }
    }
}

impl<S: Store> Collection<S> {
    /// Groups `members` on `index`.
    ///
    /// Fails with `IncompatibleModels` unless every member lives in the
    /// same table under the same partition template on `index`.
    pub fn new(store: Arc<S>, index: IndexName, members: Vec<Member>) -> Result<Self> {
        Ok(Self {
            store,
            schema: CollectionSchema::new(index, members)?,
        })
    }

    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    /// Every member record in the partition the arguments bind.
    ///
    /// Partition arguments come first; trailing sort arguments narrow the
    /// query to the sort key prefix the members share. Pages are followed
    /// until the store reports no more results.
    pub async fn query(&self, args: &[Value]) -> Result<GroupedResult> {
        let mut spec = self.schema.query_spec(args, QueryOptions::default())?;
        let mut items = Vec::new();
        loop {
            let page = self.fetch(&spec).await?;
            items.extend(page.items);
            match page.last_evaluated_key {
                Some(key) => spec.exclusive_start_key = Some(key),
                None => break,
            }
        }
        self.group(QueryPage {
            items,
            last_evaluated_key: None,
        })
    }

    /// One page of member records in the partition the arguments bind.
    pub async fn query_page(&self, args: &[Value], options: QueryOptions) -> Result<GroupedResult> {
        let spec = self.schema.query_spec(args, options)?;
        let page = self.fetch(&spec).await?;
        self.group(page)
    }

    async fn fetch(&self, spec: &QuerySpec) -> Result<QueryPage> {
        let table = self.schema.table();
        tracing::debug!(
            table = %table.name(),
            index = %spec.index,
            key = %describe_key(spec),
            members = self.schema.members().len(),
            "collection query"
        );
        let page = self
            .store
            .query_items(table, spec)
            .await
            .inspect_err(|err| {
                tracing::warn!(
                    table = %table.name(),
                    error = %err,
                    transient = err.is_transient(),
                    "Store request failed"
                );
            })?;
        Ok(page)
    }

    fn group(&self, page: QueryPage) -> Result<GroupedResult> {
        let grouped = self.schema.group(page)?;
        if !grouped.skipped().is_empty() {
            tracing::debug!(
                skipped = ?grouped.skipped(),
                "Skipped items of models outside the collection"
            );
        }
        Ok(grouped)
    }
}
