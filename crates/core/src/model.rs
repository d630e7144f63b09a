//! Model declarations.
//!
//! A model is a serde type plus a [`ModelSettings`] value describing where
//! and how it is stored. Settings compile once into a [`ModelSchema`].

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ModelError, Result};
use crate::field::{FieldSet, Fields};
use crate::pattern::{AccessPatternDecl, PatternRegistry, ResolvedKeys};
use crate::query::{QueryBuilder, QueryOptions, QuerySpec};
use crate::store::ItemKey;
use crate::table::{IndexName, Table};

/// A type stored in a single table.
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn settings() -> ModelSettings;
}

/// Immutable declaration of a model.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub name: String,
    pub table: Arc<Table>,
    pub domain: String,
    pub field_sets: Vec<FieldSet>,
    pub access_patterns: Vec<AccessPatternDecl>,
}

impl ModelSettings {
    /// Starts a declaration. The domain tag defaults to the model name.
    pub fn builder(name: impl Into<String>, table: Arc<Table>) -> ModelSettingsBuilder {
        let name = name.into();
        ModelSettingsBuilder {
            settings: ModelSettings {
                domain: name.clone(),
                name,
                table,
                field_sets: Vec::new(),
                access_patterns: Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelSettingsBuilder {
    settings: ModelSettings,
}

impl ModelSettingsBuilder {
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.settings.domain = domain.into();
        self
    }

    /// Adds a field set; sets are merged in the order they are added.
    pub fn fields(mut self, set: FieldSet) -> Self {
        self.settings.field_sets.push(set);
        self
    }

    /// Declares a pattern on an index with a sort key.
    pub fn access_pattern(
        mut self,
        index: impl Into<IndexName>,
        partition: impl Into<String>,
        sort: impl Into<String>,
    ) -> Self {
        self.settings.access_patterns.push(AccessPatternDecl {
            index: index.into(),
            partition: partition.into(),
            sort: Some(sort.into()),
        });
        self
    }

    /// Declares a pattern on an index without a sort key.
    pub fn partition_pattern(
        mut self,
        index: impl Into<IndexName>,
        partition: impl Into<String>,
    ) -> Self {
        self.settings.access_patterns.push(AccessPatternDecl {
            index: index.into(),
            partition: partition.into(),
            sort: None,
        });
        self
    }

    pub fn build(self) -> ModelSettings {
        self.settings
    }
}

/// A compiled model declaration.
#[derive(Debug, Clone)]
pub struct ModelSchema {
    name: String,
    table: Arc<Table>,
    domain: String,
    fields: Fields,
    registry: PatternRegistry,
}

impl ModelSchema {
    pub fn compile(settings: ModelSettings) -> Result<Self> {
        let ModelSettings {
            name,
            table,
            domain,
            field_sets,
            access_patterns,
        } = settings;

        if name.is_empty() {
            return Err(ModelError::Declaration(
                "model name cannot be empty".to_string(),
            ));
        }
        if domain.is_empty() {
            return Err(ModelError::Declaration(format!(
                "model {name} has an empty domain tag"
            )));
        }

        let fields = Fields::merge(&field_sets)?;
        if fields.contains(table.domain_attribute()) {
            return Err(ModelError::Declaration(format!(
                "model {name} declares field {} which holds the domain tag",
                table.domain_attribute()
            )));
        }
        if !access_patterns.iter().any(|p| p.index.is_primary()) {
            return Err(ModelError::Declaration(format!(
                "model {name} declares no access pattern on the primary index"
            )));
        }

        let registry = PatternRegistry::compile(&name, &access_patterns, &table, &fields)?;

        Ok(Self {
            name,
            table,
            domain,
            fields,
            registry,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    /// The primary key addressed by positional arguments.
    ///
    /// Every placeholder of the chosen primary pattern must be bound.
    pub fn primary_key(&self, args: &[Value]) -> Result<ItemKey> {
        let (pattern, values) = self.registry.resolve_for_query(&IndexName::Primary, args)?;
        let bound = pattern.key_values(&values)?;
        Ok(pattern.full_key(&bound)?.item_key())
    }

    /// A query on `index` from positional arguments.
    ///
    /// With `filtered`, only items tagged with this model's domain pass.
    pub fn query_spec(
        &self,
        index: &IndexName,
        args: &[Value],
        options: QueryOptions,
        filtered: bool,
    ) -> Result<QuerySpec> {
        let (pattern, values) = self.registry.resolve_for_query(index, args)?;
        let domain = filtered.then_some(self.domain.as_str());
        Ok(QueryBuilder::new(&self.table)
            .build(pattern, &values, domain)?
            .with_options(options))
    }

    /// An exact-match query on `index`, filtered to this model's domain.
    ///
    /// Every placeholder of the chosen pattern must be bound.
    pub fn lookup_spec(&self, index: &IndexName, args: &[Value]) -> Result<QuerySpec> {
        let (pattern, values) = self.registry.resolve_for_query(index, args)?;
        pattern.full_key(&pattern.key_values(&values)?)?;
        QueryBuilder::new(&self.table).build(pattern, &values, Some(&self.domain))
    }

    /// Every item of this model through the table's domain index.
    pub fn domain_query(&self, options: QueryOptions) -> Result<QuerySpec> {
        QueryBuilder::new(&self.table)
            .domain_scan(&self.domain)
            .map(|spec| spec.with_options(options))
            .ok_or_else(|| ModelError::NoPatternForIndex {
                model: self.name.clone(),
                index: "domain".to_string(),
            })
    }
}

/// A model value with the keys it is stored under.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<M> {
    value: M,
    keys: ResolvedKeys,
}

impl<M> Record<M> {
    pub fn new(value: M, keys: ResolvedKeys) -> Self {
        Self { value, keys }
    }

    pub fn keys(&self) -> &ResolvedKeys {
        &self.keys
    }

    pub fn value(&self) -> &M {
        &self.value
    }

    pub fn into_inner(self) -> M {
        self.value
    }

    pub fn into_parts(self) -> (M, ResolvedKeys) {
        (self.value, self.keys)
    }
}

impl<M> std::ops::Deref for Record<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.value
    }
}
