//! Table and index descriptors (pure data).
//!
//! Descriptors are declared once and shared read-only by every model that
//! lives in the table.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Attribute holding the owning model's domain tag when none is declared.
pub const DEFAULT_DOMAIN_ATTRIBUTE: &str = "entityType";

/// Identifies an index of a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexName {
    /// The table's own key schema.
    Primary,
    /// A global secondary index.
    Named(String),
}

impl IndexName {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// The index name to send to the store, `None` for the primary index.
    pub fn as_index_name(&self) -> Option<&str> {
        match self {
            Self::Primary => None,
            Self::Named(name) => Some(name),
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, Self::Primary)
    }
}

impl std::fmt::Display for IndexName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Named(name) => f.write_str(name),
        }
    }
}

impl From<&str> for IndexName {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

/// Key attribute names of one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub partition_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_key: Option<String>,
}

impl Index {
    pub fn new(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: None,
        }
    }

    pub fn with_sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = Some(sort_key.into());
        self
    }
}

/// Immutable table descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TableDeclaration", into = "TableDeclaration")]
pub struct Table {
    name: String,
    primary: Index,
    domain_attribute: String,
    domain_index: Option<String>,
    secondary: Vec<(String, Index)>,
}

impl Table {
    /// Starts a table declaration.
    pub fn builder(name: impl Into<String>, primary: Index) -> TableBuilder {
        TableBuilder {
            declaration: TableDeclaration {
                name: name.into(),
                primary,
                domain_attribute: DEFAULT_DOMAIN_ATTRIBUTE.to_string(),
                domain_index: None,
                indexes: Vec::new(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary(&self) -> &Index {
        &self.primary
    }

    /// Attribute every item carries its model's domain tag in.
    pub fn domain_attribute(&self) -> &str {
        &self.domain_attribute
    }

    /// The index keyed by the domain attribute, if the table declares one.
    pub fn domain_index(&self) -> Option<IndexName> {
        self.domain_index.as_deref().map(IndexName::named)
    }

    /// Looks up an index by name.
    pub fn index(&self, name: &IndexName) -> Option<&Index> {
        match name {
            IndexName::Primary => Some(&self.primary),
            IndexName::Named(name) => self
                .secondary
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, index)| index),
        }
    }

    /// Secondary indexes in declaration order.
    pub fn secondary_indexes(&self) -> impl Iterator<Item = (&str, &Index)> {
        self.secondary.iter().map(|(n, index)| (n.as_str(), index))
    }

    /// Returns a copy of this table under another physical name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Builder for [`Table`]; validation happens in [`TableBuilder::build`].
#[derive(Debug, Clone)]
pub struct TableBuilder {
    declaration: TableDeclaration,
}

impl TableBuilder {
    pub fn secondary_index(mut self, name: impl Into<String>, index: Index) -> Self {
        self.declaration.indexes.push(NamedIndex {
            name: name.into(),
            index,
        });
        self
    }

    pub fn domain_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.declaration.domain_attribute = attribute.into();
        self
    }

    /// Declares a secondary index keyed by the domain attribute.
    pub fn domain_index(mut self, name: impl Into<String>, index: Index) -> Self {
        let name = name.into();
        self.declaration.domain_index = Some(name.clone());
        self.secondary_index(name, index)
    }

    pub fn build(self) -> Result<Table> {
        Table::try_from(self.declaration)
    }
}

/// Serialized form of a table, as found in declaration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDeclaration {
    pub name: String,
    pub primary: Index,
    #[serde(default = "default_domain_attribute")]
    pub domain_attribute: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_index: Option<String>,
    #[serde(default)]
    pub indexes: Vec<NamedIndex>,
}

/// A secondary index and its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedIndex {
    pub name: String,
    #[serde(flatten)]
    pub index: Index,
}

fn default_domain_attribute() -> String {
    DEFAULT_DOMAIN_ATTRIBUTE.to_string()
}

impl TryFrom<TableDeclaration> for Table {
    type Error = ModelError;

    fn try_from(declaration: TableDeclaration) -> Result<Self> {
        let invalid = |reason: String| {
            Err(ModelError::Declaration(format!(
                "table {}: {reason}",
                declaration.name
            )))
        };

        if declaration.name.is_empty() {
            return Err(ModelError::Declaration(
                "table name cannot be empty".to_string(),
            ));
        }
        if declaration.domain_attribute.is_empty() {
            return invalid("domain attribute cannot be empty".to_string());
        }

        let mut all = vec![&declaration.primary];
        all.extend(declaration.indexes.iter().map(|n| &n.index));
        for index in all {
            if index.partition_key.is_empty() {
                return invalid("index partition key cannot be empty".to_string());
            }
            if index.sort_key.as_deref() == Some("") {
                return invalid("index sort key cannot be empty".to_string());
            }
        }

        let mut names: Vec<&str> = Vec::new();
        for named in &declaration.indexes {
            if named.name.is_empty() || named.name == "primary" {
                return invalid(format!("invalid index name {:?}", named.name));
            }
            if names.contains(&named.name.as_str()) {
                return invalid(format!("duplicate index name {}", named.name));
            }
            names.push(&named.name);
        }

        if let Some(domain_index) = &declaration.domain_index {
            match declaration.indexes.iter().find(|n| &n.name == domain_index) {
                None => return invalid(format!("unknown domain index {domain_index}")),
                Some(named) if named.index.partition_key != declaration.domain_attribute => {
                    return invalid(format!(
                        "domain index {domain_index} must be keyed by {}",
                        declaration.domain_attribute
                    ))
                }
                Some(_) => {}
            }
        }

        Ok(Table {
            secondary: declaration
                .indexes
                .iter()
                .map(|n| (n.name.clone(), n.index.clone()))
                .collect(),
            name: declaration.name,
            primary: declaration.primary,
            domain_attribute: declaration.domain_attribute,
            domain_index: declaration.domain_index,
        })
    }
}

impl From<Table> for TableDeclaration {
    fn from(table: Table) -> Self {
        Self {
            name: table.name,
            primary: table.primary,
            domain_attribute: table.domain_attribute,
            domain_index: table.domain_index,
            indexes: table
                .secondary
                .into_iter()
                .map(|(name, index)| NamedIndex { name, index })
                .collect(),
        }
    }
}
