//! Record encoding and decoding.
//!
//! Encoding overlays the resolved keys and the domain tag on the serialized
//! fields. Decoding runs the other way and cross-checks every field that is
//! also embedded in the primary key.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{ModelError, Result};
use crate::field::FieldValues;
use crate::model::{Model, ModelSchema, Record};
use crate::pattern::{ResolvedKey, ResolvedKeys};
use crate::store::{Item, ItemKey};
use crate::table::{Index, IndexName};

impl ModelSchema {
    /// Builds the stored item from serialized field values.
    ///
    /// Key attributes and the domain tag replace same-named fields.
    pub fn encode_fields(&self, mut values: FieldValues) -> Result<(Item, ResolvedKeys)> {
        self.fields().apply_defaults(&mut values);
        let keys = self.registry().resolve_for_save(&values)?;

        let mut item = values;
        keys.overlay(&mut item);
        item.insert(
            self.table().domain_attribute().to_string(),
            Value::String(self.domain().to_string()),
        );
        Ok((item, keys))
    }

    /// Recovers field values and keys from a stored item.
    pub fn decode_fields(&self, mut item: Item) -> Result<(FieldValues, ResolvedKeys)> {
        self.check_domain(&item)?;

        let table = self.table();
        let primary = table.primary();
        let key = ItemKey::from_item(&item, primary).ok_or_else(|| ModelError::UndecodableKey {
            model: self.name().to_string(),
            key: format!("missing {} attributes", key_attribute_names(primary)),
        })?;

        let (_, derived) = self.registry().reverse_decode(
            &IndexName::Primary,
            &key.partition.value,
            key.sort.as_ref().map(|s| s.value.as_str()),
        )?;

        let keys = self.stored_keys(&item);

        item.remove(table.domain_attribute());
        for attribute in keys.attributes() {
            if !self.fields().contains(&attribute.name) {
                item.remove(&attribute.name);
            }
        }

        let mut values = item;
        for (name, derived_value) in derived {
            match values.get(&name) {
                None | Some(Value::Null) => {
                    values.insert(name, derived_value);
                }
                Some(stored) => self.check_consistency(&name, stored, &derived_value)?,
            }
        }
        self.fields().apply_defaults(&mut values);

        Ok((values, keys))
    }

    fn check_domain(&self, item: &Item) -> Result<()> {
        let attribute = self.table().domain_attribute();
        match item.get(attribute) {
            None | Some(Value::Null) => Err(ModelError::MissingDomain {
                attribute: attribute.to_string(),
            }),
            Some(Value::String(tag)) if tag == self.domain() => Ok(()),
            Some(other) => Err(ModelError::DomainMismatch {
                expected: self.domain().to_string(),
                found: match other {
                    Value::String(tag) => tag.clone(),
                    other => other.to_string(),
                },
            }),
        }
    }

    /// Keys of every index this model declares that the item carries.
    fn stored_keys(&self, item: &Item) -> ResolvedKeys {
        let table = self.table();
        let mut keys: Vec<ResolvedKey> = self
            .registry()
            .indexes()
            .into_iter()
            .filter_map(|index| {
                let key = ItemKey::from_item(item, table.index(index)?)?;
                Some(ResolvedKey {
                    index: index.clone(),
                    partition: key.partition,
                    sort: key.sort,
                })
            })
            .collect();
        keys.sort_by_key(|k| !k.index.is_primary());
        ResolvedKeys::new(keys)
    }

    fn check_consistency(&self, name: &str, stored: &Value, derived: &Value) -> Result<()> {
        let Some(field) = self.fields().get(name) else {
            return Ok(());
        };
        let stored = field.format(stored)?;
        let derived = field.format(derived)?;
        if stored == derived {
            Ok(())
        } else {
            Err(ModelError::Consistency {
                model: self.name().to_string(),
                field: name.to_string(),
                stored,
                derived,
            })
        }
    }
}

fn key_attribute_names(index: &Index) -> String {
    match &index.sort_key {
        Some(sort) => format!("{}/{}", index.partition_key, sort),
        None => index.partition_key.clone(),
    }
}

/// Typed encoder/decoder of one model.
pub struct Codec<M> {
    schema: Arc<ModelSchema>,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for Codec<M> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            _model: PhantomData,
        }
    }
}

impl<M> std::fmt::Debug for Codec<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec")
            .field("model", &self.schema.name())
            .finish()
    }
}

impl<M: Model> Codec<M> {
    /// Compiles the model's settings.
    pub fn new() -> Result<Self> {
        Ok(Self::from_schema(Arc::new(ModelSchema::compile(
            M::settings(),
        )?)))
    }

    pub fn from_schema(schema: Arc<ModelSchema>) -> Self {
        Self {
            schema,
            _model: PhantomData,
        }
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    pub fn encode(&self, value: &M) -> Result<(Item, ResolvedKeys)> {
        match serde_json::to_value(value).map_err(|e| self.invalid(e.to_string()))? {
            Value::Object(values) => self.schema.encode_fields(values),
            other => Err(self.invalid(format!("expected an object, serialized to {other}"))),
        }
    }

    pub fn decode(&self, item: Item) -> Result<Record<M>> {
        let (values, keys) = self.schema.decode_fields(item)?;
        let value =
            serde_json::from_value(Value::Object(values)).map_err(|e| self.invalid(e.to_string()))?;
        Ok(Record::new(value, keys))
    }

    fn invalid(&self, message: String) -> ModelError {
        ModelError::Validation {
            model: self.schema.name().to_string(),
            message,
        }
    }
}
