pub mod error;
pub mod store;
pub mod types;

pub use error::StoreError;
pub use store::{BookmarkStore, FileBookmarkStore, MemoryBookmarkStore};
pub use types::{Bookmark, BookmarkOption};
