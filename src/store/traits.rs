use async_trait::async_trait;
use thiserror::Error;

/// Errors from a content store call
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Content store rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Network(err.to_string())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Publication status of a created record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordStatus {
    #[default]
    Draft,
    Publish,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Draft => "draft",
            RecordStatus::Publish => "publish",
        }
    }
}

/// Content of a record to create
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDraft {
    pub title: String,
    pub body: String,
    pub status: RecordStatus,
}

/// A media asset to upload, already downloaded
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime_type: String,
    pub title: String,
    pub alt_text: String,
    pub caption: Option<String>,
    pub description: Option<String>,
}

/// Destination system for imported content
///
/// Each call is an independent, fallible RPC. Nothing is transactional
/// across calls: a record can exist without its metadata or primary media
/// if a later call fails.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Creates a record and returns its identifier
    async fn create_record(&self, draft: &RecordDraft) -> StoreResult<u64>;

    /// Uploads a media asset and returns its identifier
    async fn upload_media(&self, upload: &MediaUpload) -> StoreResult<u64>;

    /// Sets the record's primary (featured) media
    async fn set_primary_media(&self, record_id: u64, media_id: u64) -> StoreResult<()>;

    /// Sets one metadata field on a record
    async fn set_metadata(&self, record_id: u64, key: &str, value: &str) -> StoreResult<()>;
}
