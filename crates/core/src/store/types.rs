use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::table::Index;

/// The attribute bag of one stored item.
pub type Item = Map<String, Value>;

/// One key attribute and its rendered value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyAttribute {
    pub name: String,
    pub value: String,
}

impl KeyAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// True when `item` carries this attribute with exactly this value.
    pub fn is_in(&self, item: &Item) -> bool {
        item.get(&self.name).and_then(Value::as_str) == Some(self.value.as_str())
    }
}

/// Full primary key of one item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub partition: KeyAttribute,
    pub sort: Option<KeyAttribute>,
}

impl ItemKey {
    /// Reads the key attributes of `index` out of an item.
    ///
    /// Returns `None` when an attribute is missing or not a string.
    pub fn from_item(item: &Item, index: &Index) -> Option<Self> {
        let read = |name: &str| {
            item.get(name)
                .and_then(Value::as_str)
                .map(|value| KeyAttribute::new(name, value))
        };
        let partition = read(&index.partition_key)?;
        let sort = match &index.sort_key {
            Some(name) => Some(read(name)?),
            None => None,
        };
        Some(Self { partition, sort })
    }

    pub fn attributes(&self) -> impl Iterator<Item = &KeyAttribute> {
        std::iter::once(&self.partition).chain(self.sort.as_ref())
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.partition.name, self.partition.value)?;
        if let Some(sort) = &self.sort {
            write!(f, ", {}={}", sort.name, sort.value)?;
        }
        Ok(())
    }
}

/// Condition attached to a put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutCondition {
    /// No item exists under the key yet.
    NotExists { attribute: String },
}

impl PutCondition {
    /// DynamoDB condition expression, with the attribute behind `#cond`.
    pub fn expression(&self) -> &'static str {
        match self {
            Self::NotExists { .. } => "attribute_not_exists(#cond)",
        }
    }

    pub fn attribute(&self) -> &str {
        match self {
            Self::NotExists { attribute } => attribute,
        }
    }

    /// Evaluates the condition against the item currently stored under the key.
    pub fn holds(&self, existing: Option<&Item>) -> bool {
        let present = existing.is_some_and(|item| item.contains_key(self.attribute()));
        match self {
            Self::NotExists { .. } => !present,
        }
    }
}

/// Opaque continuation token, the store's last evaluated key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(Item);

impl Cursor {
    pub fn from_item(item: Item) -> Self {
        Self(item)
    }

    pub fn as_item(&self) -> &Item {
        &self.0
    }

    pub fn into_item(self) -> Item {
        self.0
    }
}

/// One page of raw query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPage {
    pub items: Vec<Item>,
    pub last_evaluated_key: Option<Item>,
}

impl QueryPage {
    pub fn cursor(&self) -> Option<Cursor> {
        self.last_evaluated_key.clone().map(Cursor::from_item)
    }
}
