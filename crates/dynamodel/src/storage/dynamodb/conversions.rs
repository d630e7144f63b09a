//! DynamoDB attribute conversion functions.
//!
//! Pure functions for converting between DynamoDB AttributeValue maps and
//! JSON attribute bags. These are testable in isolation without DynamoDB
//! access.

use std::collections::HashMap;

use aws_sdk_dynamodb::types::AttributeValue;
use dynamodel_core::store::{Item, StoreError};
use serde_json::{Map, Number, Value};

pub type AttributeMap = HashMap<String, AttributeValue>;

// ============================================================================
// Item conversions
// ============================================================================

/// Convert an attribute bag to a DynamoDB item.
pub fn item_to_attributes(item: &Item) -> AttributeMap {
    item.iter()
        .map(|(name, value)| (name.clone(), value_to_attribute(value)))
        .collect()
}

/// Convert a DynamoDB item to an attribute bag.
pub fn attributes_to_item(attributes: &AttributeMap) -> Result<Item, StoreError> {
    attributes
        .iter()
        .map(|(name, attribute)| {
            attribute_to_value(attribute)
                .map(|value| (name.clone(), value))
                .map_err(|reason| {
                    StoreError::Serialization(format!("attribute {name}: {reason}"))
                })
        })
        .collect()
}

// ============================================================================
// Value conversions
// ============================================================================

pub fn value_to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(value_to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_attribute(v)))
                .collect(),
        ),
    }
}

pub fn attribute_to_value(attribute: &AttributeValue) -> Result<Value, String> {
    match attribute {
        AttributeValue::S(s) => Ok(Value::String(s.clone())),
        AttributeValue::N(n) => parse_number(n).map(Value::Number),
        AttributeValue::Bool(b) => Ok(Value::Bool(*b)),
        AttributeValue::Null(_) => Ok(Value::Null),
        AttributeValue::L(list) => list
            .iter()
            .map(attribute_to_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        AttributeValue::M(map) => map
            .iter()
            .map(|(k, v)| attribute_to_value(v).map(|value| (k.clone(), value)))
            .collect::<Result<Map<_, _>, _>>()
            .map(Value::Object),
        AttributeValue::Ss(set) => Ok(Value::Array(
            set.iter().cloned().map(Value::String).collect(),
        )),
        AttributeValue::Ns(set) => set
            .iter()
            .map(|n| parse_number(n).map(Value::Number))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        other => Err(format!("unsupported attribute type {other:?}")),
    }
}

fn parse_number(n: &str) -> Result<Number, String> {
    if let Ok(i) = n.parse::<i64>() {
        return Ok(i.into());
    }
    if let Ok(u) = n.parse::<u64>() {
        return Ok(u.into());
    }
    n.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .ok_or_else(|| format!("invalid number {n}"))
}

// ============================================================================
// Key conversions
// ============================================================================

/// Expression attribute values, all of them strings.
pub fn string_values<'a>(
    values: impl IntoIterator<Item = (&'a String, &'a String)>,
) -> AttributeMap {
    values
        .into_iter()
        .map(|(name, value)| (name.clone(), AttributeValue::S(value.clone())))
        .collect()
}
