//! In-memory storage backend for testing.
//!
//! This module provides an in-memory implementation of the `Store` trait
//! that keeps every table in a HashMap wrapped in `Arc<RwLock<_>>`. Key
//! conditions, filters, ordering, limits and continuation keys behave the
//! way DynamoDB evaluates them, so code tested here runs unchanged against
//! the real service.
//!
//! # Example
//!
//! ```rust,ignore
//! use dynamodel::storage::inmemory::InMemoryStore;
//!
//! let store = InMemoryStore::new();
//! store.create_table(&table).await;
//! // Use store for testing...
//! ```

mod store;

pub use store::InMemoryStore;
