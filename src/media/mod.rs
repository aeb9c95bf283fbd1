//! Media fetch and republish step

mod naming;
mod publisher;

pub use naming::{
    alt_text, guess_extension, media_filename, media_title, mime_for_extension, truncate_chars,
};
pub use publisher::{MediaError, MediaOutcome, MediaPublisher};
