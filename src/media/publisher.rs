use crate::apify::ResultRecord;
use crate::media::naming::{
    alt_text, guess_extension, media_filename, media_title, mime_for_extension,
};
use crate::store::{ContentStore, MediaUpload, StoreError};
use reqwest::header::{ACCEPT, CONTENT_TYPE, REFERER};
use std::time::Duration;
use thiserror::Error;

/// Referer the media CDN expects
const MEDIA_REFERER: &str = "https://www.instagram.com/";

/// Why a media asset could not be republished
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Failed to download media: {0}")]
    Download(String),

    #[error("Media origin returned status {0}")]
    Status(u16),

    #[error("URL does not return an image (content-type: {0})")]
    NotAnImage(String),

    #[error("Media origin returned an empty body")]
    Empty,

    #[error("Upload failed: {0}")]
    Upload(#[from] StoreError),
}

/// Result of the media step for one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaOutcome {
    /// Uploaded; carries the store's media identifier
    Uploaded(u64),
    /// The record has no usable media URL
    NoMedia,
    /// Download or upload failed; carries the reason
    Failed(String),
}

impl MediaOutcome {
    pub fn media_id(&self) -> Option<u64> {
        match self {
            MediaOutcome::Uploaded(id) => Some(*id),
            _ => None,
        }
    }
}

/// Downloads a record's primary media and republishes it to a store
///
/// Media URLs are signed and expire, so the download happens immediately
/// before the upload and the bytes are never kept.
pub struct MediaPublisher {
    client: reqwest::Client,
}

impl MediaPublisher {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("instapress/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Runs the media step; never fails, the outcome carries the reason
    pub async fn publish(&self, record: &ResultRecord, store: &dyn ContentStore) -> MediaOutcome {
        let Some(url) = record.media_url.as_deref() else {
            return MediaOutcome::NoMedia;
        };

        match self.try_publish(record, url, store).await {
            Ok(media_id) => {
                tracing::debug!("Uploaded media {} for {}", media_id, record.short_code);
                MediaOutcome::Uploaded(media_id)
            }
            Err(e) => {
                tracing::warn!("Media step failed for {}: {}", record.short_code, e);
                MediaOutcome::Failed(e.to_string())
            }
        }
    }

    async fn try_publish(
        &self,
        record: &ResultRecord,
        url: &str,
        store: &dyn ContentStore,
    ) -> Result<u64, MediaError> {
        let (bytes, content_type) = self.download(url).await?;

        let ext = guess_extension(url);
        let mime_type = content_type.unwrap_or_else(|| mime_for_extension(ext).to_string());

        let upload = MediaUpload {
            bytes,
            filename: media_filename(&record.author, &record.short_code, ext),
            mime_type,
            title: media_title(&record.author, &record.caption),
            alt_text: alt_text(&record.caption),
            caption: Some(format!("Instagram post by @{}", record.author)),
            description: Some(format!("Imported from Instagram: {}", record.post_url)),
        };

        Ok(store.upload_media(&upload).await?)
    }

    /// Fetches the asset; returns its bytes and image content type
    async fn download(&self, url: &str) -> Result<(Vec<u8>, Option<String>), MediaError> {
        let resp = self
            .client
            .get(url)
            .header(REFERER, MEDIA_REFERER)
            .header(ACCEPT, "image/webp,image/apng,image/*,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| MediaError::Download(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(MediaError::Status(status.as_u16()));
        }

        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

        if let Some(ct) = &content_type {
            if !ct.starts_with("image/") {
                return Err(MediaError::NotAnImage(ct.clone()));
            }
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| MediaError::Download(e.to_string()))?;
        if bytes.is_empty() {
            return Err(MediaError::Empty);
        }

        Ok((bytes.to_vec(), content_type))
    }
}
