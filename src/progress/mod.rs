//! Progress reporting for long-running operations
//!
//! Sessions are addressed by a UUID handle. Owners push partial updates;
//! observers either poll [`ProgressRegistry::read`] or follow the push
//! stream from [`ProgressRegistry::subscribe`].

mod registry;
mod session;

pub use registry::ProgressRegistry;
pub use session::{percentage, ProgressFrame, ProgressSnapshot, ProgressStatus, ProgressUpdate};
