use crate::config::WordPressConfig;
use crate::store::traits::{
    ContentStore, MediaUpload, RecordDraft, StoreError, StoreResult,
};
use async_trait::async_trait;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct Created {
    id: u64,
}

/// [`ContentStore`] backed by the WordPress REST API
///
/// Authenticates with HTTP basic auth using an application password.
pub struct WordPressClient {
    client: reqwest::Client,
    api_root: String,
    username: String,
    password: String,
}

impl WordPressClient {
    pub fn new(config: &WordPressConfig, timeout: Duration) -> StoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("instapress/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_root: format!("{}/wp-json/wp/v2", config.base_url.trim_end_matches('/')),
            username: config.username.clone(),
            password: config.application_password.clone(),
        })
    }

    async fn post_json(&self, path: &str, body: &Value) -> StoreResult<Value> {
        let resp = self
            .client
            .post(format!("{}/{}", self.api_root, path))
            .basic_auth(&self.username, Some(&self.password))
            .json(body)
            .send()
            .await?;
        read_json(resp).await
    }
}

#[async_trait]
impl ContentStore for WordPressClient {
    async fn create_record(&self, draft: &RecordDraft) -> StoreResult<u64> {
        let body = json!({
            "title": draft.title,
            "content": draft.body,
            "status": draft.status.as_str(),
        });
        let created: Created = decode(self.post_json("posts", &body).await?)?;
        tracing::debug!("Created WordPress post {}", created.id);
        Ok(created.id)
    }

    async fn upload_media(&self, upload: &MediaUpload) -> StoreResult<u64> {
        let resp = self
            .client
            .post(format!("{}/media", self.api_root))
            .basic_auth(&self.username, Some(&self.password))
            .header(CONTENT_TYPE, &upload.mime_type)
            .header(
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", upload.filename),
            )
            .body(upload.bytes.clone())
            .send()
            .await?;
        let created: Created = decode(read_json(resp).await?)?;

        let mut details = json!({
            "title": upload.title,
            "alt_text": upload.alt_text,
        });
        if let Some(caption) = &upload.caption {
            details["caption"] = json!(caption);
        }
        if let Some(description) = &upload.description {
            details["description"] = json!(description);
        }

        // The file is already stored; missing descriptive fields are tolerable
        if let Err(e) = self
            .post_json(&format!("media/{}", created.id), &details)
            .await
        {
            tracing::warn!("Could not update media {} details: {}", created.id, e);
        }

        Ok(created.id)
    }

    async fn set_primary_media(&self, record_id: u64, media_id: u64) -> StoreResult<()> {
        self.post_json(
            &format!("posts/{}", record_id),
            &json!({ "featured_media": media_id }),
        )
        .await?;
        Ok(())
    }

    async fn set_metadata(&self, record_id: u64, key: &str, value: &str) -> StoreResult<()> {
        self.post_json(
            &format!("posts/{}", record_id),
            &json!({ "meta": { key: value } }),
        )
        .await?;
        Ok(())
    }
}

async fn read_json(resp: reqwest::Response) -> StoreResult<Value> {
    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(StoreError::Rejected {
            status: status.as_u16(),
            message,
        });
    }
    resp.json()
        .await
        .map_err(|e| StoreError::Parse(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> StoreResult<T> {
    serde_json::from_value(value).map_err(|e| StoreError::Parse(e.to_string()))
}
