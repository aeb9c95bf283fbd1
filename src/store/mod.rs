//! Destination content store
//!
//! The import pipeline talks to the store only through [`ContentStore`];
//! [`WordPressClient`] is the production implementation.

mod traits;
mod wordpress;

pub use traits::{
    ContentStore, MediaUpload, RecordDraft, RecordStatus, StoreError, StoreResult,
};
pub use wordpress::WordPressClient;
