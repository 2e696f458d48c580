//! Content-addressed object store with a mutable filesystem namespace (MFS)
//! overlay: the store capability the rest of the engine is built against.

pub mod any;
pub mod diff;
pub mod error;
pub mod object;
pub mod path;
pub mod store;
pub mod table;

pub use any::{AnyStore, StoreKind};
pub use diff::{ChangeType, ObjectChange};
pub use error::{Result, StoreError};
pub use object::{Kind, ObjectId, StoredObject};
pub use path::StorePath;
pub use store::{DirEntry, FsStore, MemStore, Store, TreeStore};
