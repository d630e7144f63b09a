//! Access patterns: key templates bound to an index and a model's fields.

mod keys;
mod registry;

use serde_json::Value;

use crate::error::{ModelError, Result};
use crate::field::{Field, FieldValues, Fields};
use crate::store::KeyAttribute;
use crate::table::{IndexName, Table};
use crate::template::{KeyTemplate, KeyValues, RenderedPrefix};

pub use keys::{ResolvedKey, ResolvedKeys};
pub use registry::PatternRegistry;

/// An access pattern as declared on a model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPatternDecl {
    pub index: IndexName,
    pub partition: String,
    pub sort: Option<String>,
}

/// A compiled access pattern.
#[derive(Debug, Clone)]
pub struct AccessPattern {
    index: IndexName,
    partition_attribute: String,
    sort_attribute: Option<String>,
    partition: KeyTemplate,
    sort: Option<KeyTemplate>,
    /// Placeholder fields, partition placeholders first, without repeats.
    placeholders: Vec<Field>,
}

impl AccessPattern {
    /// Compiles a declaration against the table and the model's fields.
    pub fn compile(decl: &AccessPatternDecl, table: &Table, fields: &Fields) -> Result<Self> {
        let index = table.index(&decl.index).ok_or_else(|| {
            ModelError::Declaration(format!(
                "table {} has no index {}",
                table.name(),
                decl.index
            ))
        })?;

        let partition = KeyTemplate::compile(&decl.partition)?;
        let sort = match (&decl.sort, &index.sort_key) {
            (Some(pattern), Some(_)) => Some(KeyTemplate::compile(pattern)?),
            (None, None) => None,
            (Some(pattern), None) => {
                return Err(ModelError::Declaration(format!(
                    "index {} has no sort key for template {pattern:?}",
                    decl.index
                )))
            }
            (None, Some(_)) => {
                return Err(ModelError::Declaration(format!(
                    "index {} requires a sort key template",
                    decl.index
                )))
            }
        };

        let mut placeholders: Vec<Field> = Vec::new();
        let templates = std::iter::once(&partition).chain(sort.as_ref());
        for template in templates {
            for name in template.placeholders() {
                let field = fields.get(name).ok_or_else(|| {
                    ModelError::Declaration(format!(
                        "template {template} names unknown field {name}"
                    ))
                })?;
                if !placeholders.iter().any(|f| f.name == name) {
                    placeholders.push(field.clone());
                }
            }
        }

        Ok(Self {
            index: decl.index.clone(),
            partition_attribute: index.partition_key.clone(),
            sort_attribute: index.sort_key.clone(),
            partition,
            sort,
            placeholders,
        })
    }

    pub fn index(&self) -> &IndexName {
        &self.index
    }

    pub fn partition_template(&self) -> &KeyTemplate {
        &self.partition
    }

    pub fn sort_template(&self) -> Option<&KeyTemplate> {
        self.sort.as_ref()
    }

    pub fn partition_attribute(&self) -> &str {
        &self.partition_attribute
    }

    pub fn sort_attribute(&self) -> Option<&str> {
        self.sort_attribute.as_deref()
    }

    /// Placeholder names in positional argument order.
    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.placeholders.iter().map(|f| f.name.as_str())
    }

    /// Number of positional arguments this pattern accepts.
    pub fn arity(&self) -> usize {
        self.placeholders.len()
    }

    /// Number of placeholders in the partition template.
    pub fn partition_arity(&self) -> usize {
        self.partition.placeholders().count()
    }

    /// Renders both keys from field values.
    ///
    /// `Ok(None)` when a placeholder's field is absent or null. A present
    /// value that its kind cannot format is a coercion error.
    pub fn resolve_forward(&self, values: &FieldValues) -> Result<Option<ResolvedKey>> {
        let mut bound = KeyValues::new();
        for field in &self.placeholders {
            match values.get(&field.name) {
                None | Some(Value::Null) => return Ok(None),
                Some(value) => {
                    bound.insert(field.name.clone(), field.format(value)?);
                }
            }
        }
        Ok(Some(self.full_key(&bound)?))
    }

    /// Matches stored keys back into field values.
    ///
    /// `Ok(None)` when either template does not match or a placeholder
    /// shared by both templates binds different text.
    pub fn resolve_reverse(
        &self,
        partition_raw: &str,
        sort_raw: Option<&str>,
    ) -> Result<Option<FieldValues>> {
        let Some(mut bound) = self.partition.matches(partition_raw) else {
            return Ok(None);
        };
        if let Some(sort) = &self.sort {
            let Some(sort_bound) = sort_raw.and_then(|raw| sort.matches(raw)) else {
                return Ok(None);
            };
            for (name, raw) in sort_bound {
                if bound.get(&name).is_some_and(|existing| *existing != raw) {
                    return Ok(None);
                }
                bound.insert(name, raw);
            }
        }

        let mut values = FieldValues::new();
        for field in &self.placeholders {
            if let Some(raw) = bound.get(&field.name) {
                values.insert(field.name.clone(), field.parse(raw)?);
            }
        }
        Ok(Some(values))
    }

    /// Binds positional arguments to placeholders, left to right.
    ///
    /// Arguments beyond [`AccessPattern::arity`] are ignored; the registry
    /// rejects them before binding.
    pub fn bind_positional(&self, args: &[Value]) -> FieldValues {
        self.placeholders
            .iter()
            .zip(args)
            .map(|(field, value)| (field.name.clone(), value.clone()))
            .collect()
    }

    /// Formats the present, non-null placeholder values.
    pub fn key_values(&self, values: &FieldValues) -> Result<KeyValues> {
        let mut bound = KeyValues::new();
        for field in &self.placeholders {
            match values.get(&field.name) {
                None | Some(Value::Null) => {}
                Some(value) => {
                    bound.insert(field.name.clone(), field.format(value)?);
                }
            }
        }
        Ok(bound)
    }

    /// Renders the partition key; every partition placeholder must be bound.
    pub fn render_partition(&self, bound: &KeyValues) -> Result<KeyAttribute> {
        Ok(KeyAttribute::new(
            &self.partition_attribute,
            self.partition.render(bound)?,
        ))
    }

    /// Renders the sort key as far as it is bound.
    pub fn render_sort_prefix(&self, bound: &KeyValues) -> Option<(String, RenderedPrefix)> {
        match (&self.sort, &self.sort_attribute) {
            (Some(template), Some(attribute)) => {
                Some((attribute.clone(), template.render_prefix(bound)))
            }
            _ => None,
        }
    }

    /// Renders the full key; every placeholder must be bound.
    pub fn full_key(&self, bound: &KeyValues) -> Result<ResolvedKey> {
        let partition = self.render_partition(bound)?;
        let sort = match (&self.sort, &self.sort_attribute) {
            (Some(template), Some(attribute)) => {
                Some(KeyAttribute::new(attribute, template.render(bound)?))
            }
            _ => None,
        };
        Ok(ResolvedKey {
            index: self.index.clone(),
            partition,
            sort,
        })
    }
}
