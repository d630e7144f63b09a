//! Declared fields and their key coercion.
//!
//! Every [`FieldKind`] owns a formatter (value to canonical key text) and
//! the inverse parser. Access patterns look the pair up once, when they are
//! compiled, and never branch on the kind afterwards.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{ModelError, Result};

/// Field name to value, as produced by serializing a model.
pub type FieldValues = Map<String, Value>;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Semantic type of a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Boolean,
    /// Rendered hyphenated lowercase.
    Uuid,
    /// RFC 3339 in UTC.
    DateTime,
    /// `YYYY-MM-DD`.
    Date,
    /// One of the declared values.
    Enum(Vec<String>),
    /// Strings, numbers and booleans, in their native text form.
    Any,
}

impl FieldKind {
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum(values.into_iter().map(Into::into).collect())
    }

    /// The formatter/parser pair for this kind.
    pub(crate) fn coercion(&self) -> &'static Coercion {
        match self {
            Self::String => &STRING,
            Self::Integer => &INTEGER,
            Self::Boolean => &BOOLEAN,
            Self::Uuid => &UUID,
            Self::DateTime => &DATE_TIME,
            Self::Date => &DATE,
            Self::Enum(_) => &ENUM,
            Self::Any => &ANY,
        }
    }
}

type FormatFn = fn(&FieldKind, &Value) -> std::result::Result<String, String>;
type ParseFn = fn(&FieldKind, &str) -> std::result::Result<Value, String>;

/// Canonical formatter and inverse parser of one kind.
pub(crate) struct Coercion {
    format: FormatFn,
    parse: ParseFn,
}

static STRING: Coercion = Coercion {
    format: format_string,
    parse: parse_string,
};
static INTEGER: Coercion = Coercion {
    format: format_integer,
    parse: parse_integer,
};
static BOOLEAN: Coercion = Coercion {
    format: format_boolean,
    parse: parse_boolean,
};
static UUID: Coercion = Coercion {
    format: format_uuid,
    parse: parse_uuid,
};
static DATE_TIME: Coercion = Coercion {
    format: format_date_time,
    parse: parse_date_time,
};
static DATE: Coercion = Coercion {
    format: format_date,
    parse: parse_date,
};
static ENUM: Coercion = Coercion {
    format: format_enum,
    parse: parse_enum,
};
static ANY: Coercion = Coercion {
    format: format_any,
    parse: parse_any,
};

fn expect_str(value: &Value) -> std::result::Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected a string, got {value}"))
}

fn format_string(_: &FieldKind, value: &Value) -> std::result::Result<String, String> {
    expect_str(value).map(str::to_string)
}

fn parse_string(_: &FieldKind, raw: &str) -> std::result::Result<Value, String> {
    Ok(Value::String(raw.to_string()))
}

fn format_integer(kind: &FieldKind, value: &Value) -> std::result::Result<String, String> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(|n| n.to_string())
            .ok_or_else(|| format!("{n} is not an integer")),
        Value::String(s) => parse_integer(kind, s).and_then(|v| format_integer(kind, &v)),
        other => Err(format!("expected an integer, got {other}")),
    }
}

fn parse_integer(_: &FieldKind, raw: &str) -> std::result::Result<Value, String> {
    raw.parse::<i64>()
        .map(Value::from)
        .map_err(|e| e.to_string())
}

fn format_boolean(kind: &FieldKind, value: &Value) -> std::result::Result<String, String> {
    match value {
        Value::Bool(b) => Ok(b.to_string()),
        Value::String(s) => parse_boolean(kind, s).map(|_| s.clone()),
        other => Err(format!("expected a boolean, got {other}")),
    }
}

fn parse_boolean(_: &FieldKind, raw: &str) -> std::result::Result<Value, String> {
    match raw {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        _ => Err("expected true or false".to_string()),
    }
}

fn format_uuid(_: &FieldKind, value: &Value) -> std::result::Result<String, String> {
    let raw = expect_str(value)?;
    Uuid::parse_str(raw)
        .map(|id| id.hyphenated().to_string())
        .map_err(|e| e.to_string())
}

fn parse_uuid(kind: &FieldKind, raw: &str) -> std::result::Result<Value, String> {
    format_uuid(kind, &Value::String(raw.to_string())).map(Value::String)
}

fn format_date_time(_: &FieldKind, value: &Value) -> std::result::Result<String, String> {
    let raw = expect_str(value)?;
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| {
            dt.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::AutoSi, true)
        })
        .map_err(|e| e.to_string())
}

fn parse_date_time(kind: &FieldKind, raw: &str) -> std::result::Result<Value, String> {
    format_date_time(kind, &Value::String(raw.to_string())).map(Value::String)
}

fn format_date(_: &FieldKind, value: &Value) -> std::result::Result<String, String> {
    let raw = expect_str(value)?;
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map(|date| date.format(DATE_FORMAT).to_string())
        .map_err(|e| e.to_string())
}

fn parse_date(kind: &FieldKind, raw: &str) -> std::result::Result<Value, String> {
    format_date(kind, &Value::String(raw.to_string())).map(Value::String)
}

fn format_enum(kind: &FieldKind, value: &Value) -> std::result::Result<String, String> {
    let raw = expect_str(value)?;
    match kind {
        FieldKind::Enum(values) if values.iter().any(|v| v == raw) => Ok(raw.to_string()),
        FieldKind::Enum(values) => Err(format!("expected one of {values:?}")),
        _ => Err("not an enum field".to_string()),
    }
}

fn parse_enum(kind: &FieldKind, raw: &str) -> std::result::Result<Value, String> {
    format_enum(kind, &Value::String(raw.to_string())).map(Value::String)
}

fn format_any(_: &FieldKind, value: &Value) -> std::result::Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("{other} has no key form")),
    }
}

fn parse_any(_: &FieldKind, raw: &str) -> std::result::Result<Value, String> {
    Ok(Value::String(raw.to_string()))
}

/// Default applied to a field absent from a serialized model.
#[derive(Debug, Clone)]
pub enum FieldDefault {
    Value(Value),
    Factory(fn() -> Value),
}

impl FieldDefault {
    pub fn produce(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Factory(factory) => factory(),
        }
    }
}

/// A declared field.
#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub default: Option<FieldDefault>,
}

impl Field {
    /// Canonical key text of `value`.
    pub fn format(&self, value: &Value) -> Result<String> {
        (self.kind.coercion().format)(&self.kind, value).map_err(|reason| self.coercion_error(value, reason))
    }

    /// Parses key text back into a field value.
    pub fn parse(&self, raw: &str) -> Result<Value> {
        (self.kind.coercion().parse)(&self.kind, raw).map_err(|reason| ModelError::Coercion {
            field: self.name.clone(),
            value: raw.to_string(),
            reason,
        })
    }

    fn coercion_error(&self, value: &Value, reason: String) -> ModelError {
        ModelError::Coercion {
            field: self.name.clone(),
            value: match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            reason,
        }
    }
}

/// A named, ordered bundle of fields that models compose.
#[derive(Debug, Clone)]
pub struct FieldSet {
    name: String,
    fields: Vec<Field>,
}

impl FieldSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
            default: None,
        });
        self
    }

    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        kind: FieldKind,
        default: FieldDefault,
    ) -> Self {
        self.fields.push(Field {
            name: name.into(),
            kind,
            default: Some(default),
        });
        self
    }

    /// `created_at` and `updated_at`, both defaulting to now.
    pub fn timestamps() -> Self {
        Self::new("timestamps")
            .field_with_default("created_at", FieldKind::DateTime, FieldDefault::Factory(now))
            .field_with_default("updated_at", FieldKind::DateTime, FieldDefault::Factory(now))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

/// The flat field list of a model, merged from its field sets.
#[derive(Debug, Clone, Default)]
pub struct Fields {
    fields: Vec<Field>,
}

impl Fields {
    /// Merges field sets in order. A name declared twice is an error.
    pub fn merge<'a>(sets: impl IntoIterator<Item = &'a FieldSet>) -> Result<Self> {
        let mut fields: Vec<Field> = Vec::new();
        for set in sets {
            for field in set.iter() {
                if fields.iter().any(|f| f.name == field.name) {
                    return Err(ModelError::Declaration(format!(
                        "field {} of set {} is already declared",
                        field.name, set.name
                    )));
                }
                if field.name.is_empty() {
                    return Err(ModelError::Declaration(format!(
                        "set {} declares a field without a name",
                        set.name
                    )));
                }
                fields.push(field.clone());
            }
        }
        Ok(Self { fields })
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Fills absent fields that declare a default.
    pub fn apply_defaults(&self, values: &mut FieldValues) {
        for field in &self.fields {
            if let Some(default) = &field.default {
                if !values.contains_key(&field.name) {
                    values.insert(field.name.clone(), default.produce());
                }
            }
        }
    }
}
