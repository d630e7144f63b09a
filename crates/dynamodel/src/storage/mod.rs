//! Storage backend implementations.
//!
//! This module provides concrete implementations of the `Store` trait
//! defined in `dynamodel_core::store`. Backends are selected at compile
//! time via feature flags and may be enabled together.
//!
//! # Feature Flags
//!
//! - `inmemory` (default): in-memory store for tests and development
//! - `dynamodb`: AWS DynamoDB store using `aws-sdk-dynamodb`, plus table
//!   deployment
//!
//! # Examples
//!
//! Build with DynamoDB:
//! ```bash
//! cargo build -p dynamodel --features dynamodb
//! ```

#[cfg(not(any(feature = "inmemory", feature = "dynamodb")))]
compile_error!(
    "No storage backend selected. Enable 'inmemory' or 'dynamodb' feature. \
    Example: cargo build -p dynamodel --features dynamodb"
);

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryStore;

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbStore;
