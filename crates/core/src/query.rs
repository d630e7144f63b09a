//! Query composition.
//!
//! A [`QuerySpec`] is the store-neutral description of one index query. It
//! renders the DynamoDB expression strings and can also evaluate itself
//! against an item, for stores without server-side filtering.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::Result;
use crate::field::FieldValues;
use crate::pattern::AccessPattern;
use crate::store::{Cursor, Item, KeyAttribute};
use crate::table::{IndexName, Table};

/// Condition on the sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortCondition {
    Equals(KeyAttribute),
    BeginsWith(KeyAttribute),
}

impl SortCondition {
    pub fn attribute(&self) -> &KeyAttribute {
        match self {
            Self::Equals(attribute) | Self::BeginsWith(attribute) => attribute,
        }
    }

    fn accepts(&self, item: &Item) -> bool {
        let attribute = self.attribute();
        let Some(value) = item.get(&attribute.name).and_then(Value::as_str) else {
            return false;
        };
        match self {
            Self::Equals(_) => value == attribute.value,
            Self::BeginsWith(_) => value.starts_with(&attribute.value),
        }
    }
}

/// Partition equality plus an optional sort condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCondition {
    pub partition: KeyAttribute,
    pub sort: Option<SortCondition>,
}

/// `attribute = value` on the domain tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainFilter {
    pub attribute: String,
    pub value: String,
}

/// Paging and ordering of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    pub limit: Option<u32>,
    pub ascending: bool,
    pub start: Option<Cursor>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            limit: None,
            ascending: true,
            start: None,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn descending(mut self) -> Self {
        self.ascending = false;
        self
    }

    /// Continues after the page that returned `cursor`.
    pub fn start_from(mut self, cursor: Cursor) -> Self {
        self.start = Some(cursor);
        self
    }
}

/// One index query, ready for a store.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub index: IndexName,
    pub key: KeyCondition,
    pub filter: Option<DomainFilter>,
    pub limit: Option<u32>,
    pub ascending: bool,
    pub exclusive_start_key: Option<Item>,
}

impl QuerySpec {
    pub fn key_condition_expression(&self) -> String {
        match &self.key.sort {
            None => "#pk = :pk".to_string(),
            Some(SortCondition::Equals(_)) => "#pk = :pk AND #sk = :sk".to_string(),
            Some(SortCondition::BeginsWith(_)) => {
                "#pk = :pk AND begins_with(#sk, :sk)".to_string()
            }
        }
    }

    pub fn filter_expression(&self) -> Option<String> {
        self.filter.as_ref().map(|_| "#domain = :domain".to_string())
    }

    /// `#name` placeholders used by the expressions.
    pub fn expression_attribute_names(&self) -> BTreeMap<String, String> {
        let mut names = BTreeMap::new();
        names.insert("#pk".to_string(), self.key.partition.name.clone());
        if let Some(sort) = &self.key.sort {
            names.insert("#sk".to_string(), sort.attribute().name.clone());
        }
        if let Some(filter) = &self.filter {
            names.insert("#domain".to_string(), filter.attribute.clone());
        }
        names
    }

    /// `:value` placeholders used by the expressions. All values are strings.
    pub fn expression_attribute_values(&self) -> BTreeMap<String, String> {
        let mut values = BTreeMap::new();
        values.insert(":pk".to_string(), self.key.partition.value.clone());
        if let Some(sort) = &self.key.sort {
            values.insert(":sk".to_string(), sort.attribute().value.clone());
        }
        if let Some(filter) = &self.filter {
            values.insert(":domain".to_string(), filter.value.clone());
        }
        values
    }

    /// Whether the key condition selects `item`.
    pub fn matches_key(&self, item: &Item) -> bool {
        self.key.partition.is_in(item)
            && self
                .key
                .sort
                .as_ref()
                .is_none_or(|sort| sort.accepts(item))
    }

    /// Whether `item` passes the domain filter.
    pub fn passes_filter(&self, item: &Item) -> bool {
        self.filter.as_ref().is_none_or(|filter| {
            item.get(&filter.attribute).and_then(Value::as_str) == Some(filter.value.as_str())
        })
    }

    pub fn accepts(&self, item: &Item) -> bool {
        self.matches_key(item) && self.passes_filter(item)
    }

    /// The same query with the filter left to the caller.
    pub fn without_filter(mut self) -> Self {
        self.filter = None;
        self
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.limit = options.limit;
        self.ascending = options.ascending;
        self.exclusive_start_key = options.start.map(Cursor::into_item);
        self
    }
}

/// Builds [`QuerySpec`]s for one table.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'a> {
    table: &'a Table,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(table: &'a Table) -> Self {
        Self { table }
    }

    /// Builds the query for `pattern` from the bound field values.
    ///
    /// The partition key must be fully bound. The sort key is matched
    /// exactly when fully bound, by prefix otherwise, and not at all when
    /// the prefix is empty.
    pub fn build(
        &self,
        pattern: &AccessPattern,
        values: &FieldValues,
        domain: Option<&str>,
    ) -> Result<QuerySpec> {
        let bound = pattern.key_values(values)?;
        let partition = pattern.render_partition(&bound)?;

        let sort = pattern
            .render_sort_prefix(&bound)
            .and_then(|(attribute, prefix)| {
                if prefix.complete {
                    Some(SortCondition::Equals(KeyAttribute::new(attribute, prefix.key)))
                } else if prefix.key.is_empty() {
                    None
                } else {
                    Some(SortCondition::BeginsWith(KeyAttribute::new(
                        attribute, prefix.key,
                    )))
                }
            });

        Ok(QuerySpec {
            index: pattern.index().clone(),
            key: KeyCondition { partition, sort },
            filter: domain.map(|tag| DomainFilter {
                attribute: self.table.domain_attribute().to_string(),
                value: tag.to_string(),
            }),
            limit: None,
            ascending: true,
            exclusive_start_key: None,
        })
    }

    /// Every item of a domain through the table's domain index.
    ///
    /// `None` when the table declares no domain index.
    pub fn domain_scan(&self, domain: &str) -> Option<QuerySpec> {
        let index = self.table.domain_index()?;
        Some(QuerySpec {
            index,
            key: KeyCondition {
                partition: KeyAttribute::new(self.table.domain_attribute(), domain),
                sort: None,
            },
            filter: None,
            limit: None,
            ascending: true,
            exclusive_start_key: None,
        })
    }
}
