//! Single-table object mapper for DynamoDB.
//!
//! This crate is the imperative shell around [`dynamodel_core`]: it runs
//! the queries the core composes against a [`Store`] and turns the
//! responses back into typed records.
//!
//! # Example
//!
//! ```rust,ignore
//! use dynamodel::storage::inmemory::InMemoryStore;
//! use dynamodel::Repository;
//!
//! let store = Arc::new(InMemoryStore::new());
//! store.create_table(&table).await;
//! let users = Repository::<User, _>::new(store)?;
//!
//! users.save(&user).await?;
//! let found = users.get(&[json!(user.id)]).await?;
//! ```

pub mod collection;
pub mod config;
pub mod repository;
pub mod storage;

pub use collection::Collection;
pub use config::DynamoDbConfig;
pub use repository::{Page, Repository};

pub use dynamodel_core::{
    Codec, Cursor, FieldDefault, FieldKind, FieldSet, Group, GroupedResult, Index, IndexName,
    Item, Member, Model, ModelError, ModelSchema, ModelSettings, QueryOptions, Record, Result,
    Store, StoreError, Table, TableDeclaration,
};
