// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! S3-compatible object store backed by aws-sdk-s3.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tracing::info;

use super::traits::*;
use crate::config::StorageConfig;

/// Characters left unescaped in a `CopySource` key.
const COPY_SOURCE_KEEP: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// [`ObjectStore`] over any S3-compatible endpoint (AWS, R2, MinIO).
///
/// Uses path-style addressing and static credentials.
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Build a client from storage settings.
    pub fn new(config: &StorageConfig) -> Self {
        info!(
            endpoint = %config.endpoint,
            bucket = %config.bucket,
            region = %config.region,
            "Configuring object store"
        );

        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "devex-static",
        );
        let sdk_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(config.endpoint.clone())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket.clone(),
        }
    }

    /// Bucket this store operates on.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn store_type(&self) -> &'static str {
        "s3"
    }

    async fn list_page(&self, prefix: &str, token: Option<&str>) -> Result<ObjectPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_continuation_token(token.map(str::to_string))
            .send()
            .await
            .map_err(|e| map_sdk_error(prefix, e))?;

        let keys = output
            .contents()
            .iter()
            .filter_map(|object| object.key().map(str::to_string))
            .collect();
        let next_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ObjectPage { keys, next_token })
    }

    async fn copy_object(&self, source: &str, dest: &str) -> Result<()> {
        let copy_source = format!(
            "{}/{}",
            self.bucket,
            utf8_percent_encode(source, COPY_SOURCE_KEEP)
        );
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(copy_source)
            .key(dest)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| map_sdk_error(source, e))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| map_sdk_error(key, e))
    }

    async fn head_bucket(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| map_sdk_error(&self.bucket, e))
    }
}

fn map_sdk_error<E>(target: &str, err: SdkError<E, HttpResponse>) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    match (&err, status) {
        (_, Some(404)) => StoreError::NotFound(target.to_string()),
        (SdkError::ServiceError(_) | SdkError::ResponseError(_), _) => {
            StoreError::Request(DisplayErrorContext(&err).to_string())
        }
        _ => StoreError::Client(DisplayErrorContext(&err).to_string()),
    }
}
