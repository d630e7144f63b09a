//! Functional core of the single-table object mapper.
//!
//! Everything here is pure: key templates, access pattern resolution,
//! query composition and record encoding. Store I/O goes through the
//! [`store::Store`] trait, implemented by the `dynamodel` crate.

pub mod codec;
pub mod collection;
pub mod error;
pub mod field;
pub mod model;
pub mod pattern;
pub mod query;
pub mod store;
pub mod table;
pub mod template;

pub use codec::Codec;
pub use collection::{CollectionSchema, Group, GroupedResult, Member};
pub use error::{ModelError, Result};
pub use field::{Field, FieldDefault, FieldKind, FieldSet, FieldValues, Fields};
pub use model::{Model, ModelSchema, ModelSettings, ModelSettingsBuilder, Record};
pub use pattern::{AccessPattern, AccessPatternDecl, PatternRegistry, ResolvedKey, ResolvedKeys};
pub use query::{QueryBuilder, QueryOptions, QuerySpec, SortCondition};
pub use store::{Cursor, Item, ItemKey, KeyAttribute, PutCondition, QueryPage, Store, StoreError};
pub use table::{Index, IndexName, Table, TableDeclaration};
pub use template::{KeyTemplate, TemplateError};
