//! S3-backed file store.
//!
//! Objects are written under `{folder}/{played_at}-{uuid}/{name}`, with
//! `played_at` zero-padded so that key order is play order. The random
//! component keeps the store append-only: two writes of the same game produce
//! two objects, exactly like a drive folder would. Flat game fields travel as
//! user metadata so the newest object can answer watermark queries with a
//! single `HeadObject`.

use super::{FileStore, StoredFile};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use chess_archive_core::GameFile;
use std::collections::{BTreeMap, HashMap};

const PGN_CONTENT_TYPE: &str = "application/x-chess-pgn";

/// Metadata key carrying the file description.
pub const DESCRIPTION_KEY: &str = "description";

/// File store on an S3 bucket.
#[derive(Debug, Clone)]
pub struct S3Store {
    client: S3Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a store from the default AWS credential chain.
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let bucket = bucket.into();
        tracing::info!(%bucket, "S3 store initialized");
        Self::new(S3Client::new(&config), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn head_metadata(&self, key: &str) -> Result<BTreeMap<String, String>> {
        let head = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::S3(format!("head {}: {}", key, DisplayErrorContext(&e))))?;

        Ok(head.metadata.unwrap_or_default().into_iter().collect())
    }
}

/// Object key for a new file. `/` in names would create phantom folders.
fn object_key(folder: &str, played_at: i64, file_name: &str) -> String {
    let name = file_name.replace('/', "_");
    format!(
        "{}/{:013}-{}/{}",
        folder,
        played_at.max(0),
        uuid::Uuid::new_v4(),
        name
    )
}

/// Display name recovered from an object key.
fn name_from_key(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// S3 user metadata must be ASCII.
fn ascii_value(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_ascii() && !c.is_ascii_control() { c } else { '?' })
        .collect()
}

fn played_at(metadata: &BTreeMap<String, String>) -> Option<i64> {
    metadata.get("played_at").and_then(|v| v.parse().ok())
}

#[async_trait]
impl FileStore for S3Store {
    async fn create(
        &self,
        folder: &str,
        file: &GameFile,
        metadata: &BTreeMap<String, String>,
    ) -> Result<String> {
        let key = object_key(folder, played_at(metadata).unwrap_or(0), &file.name);

        let mut user_metadata: HashMap<String, String> = metadata
            .iter()
            .map(|(k, v)| (k.clone(), ascii_value(v)))
            .collect();
        user_metadata.insert(DESCRIPTION_KEY.to_string(), ascii_value(&file.description));

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(PGN_CONTENT_TYPE)
            .set_metadata(Some(user_metadata))
            .body(ByteStream::from(file.content.clone().into_bytes()))
            .send()
            .await
            .map_err(|e| Error::S3(format!("put {}: {}", key, DisplayErrorContext(&e))))?;

        tracing::debug!(bucket = %self.bucket, %key, "created object");
        Ok(key)
    }

    async fn newest_in_folder(&self, folder: &str) -> Result<Option<StoredFile>> {
        let prefix = format!("{}/", folder);
        let mut newest: Option<String> = None;
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix);

            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request
                .send()
                .await
                .map_err(|e| Error::S3(format!("list {}: {}", prefix, DisplayErrorContext(&e))))?;

            for obj in response.contents.unwrap_or_default() {
                let Some(key) = obj.key else {
                    continue;
                };
                if newest.as_ref().is_none_or(|best| key > *best) {
                    newest = Some(key);
                }
            }

            if response.is_truncated.unwrap_or(false) {
                continuation_token = response.next_continuation_token;
            } else {
                break;
            }
        }

        let Some(key) = newest else {
            return Ok(None);
        };
        let metadata = self.head_metadata(&key).await?;

        Ok(Some(StoredFile {
            name: name_from_key(&key).to_string(),
            metadata,
            id: key,
        }))
    }
}
