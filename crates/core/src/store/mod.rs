mod error;
mod traits;
mod types;

pub use error::{Result, StoreError};
pub use traits::Store;
pub use types::{Cursor, Item, ItemKey, KeyAttribute, PutCondition, QueryPage};
