// /////////////////////////////////////////////////////////////////////////////
// Adaptive Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! S3-backed `BlockStore`.
//!
//! `BlockKey`s map directly to S3 object keys under an optional prefix.
//! `put` is a single `PutObject`, which S3 already makes atomic from a
//! reader's perspective (no reader ever observes a partial object), so
//! this backend needs no staging step, unlike the filesystem backend.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use dittofs_payload_domain::error::{PayloadError, PayloadResult};
use dittofs_payload_domain::services::BlockStore;
use dittofs_payload_domain::value_objects::BlockKey;

pub struct S3BlockStore {
    client: Client,
    bucket: String,
    /// Optional key prefix, e.g. `"payload/"`, so multiple logical stores
    /// can share one bucket.
    key_prefix: String,
}

impl S3BlockStore {
    pub fn new(client: Client, bucket: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        Self { client, bucket: bucket.into(), key_prefix: key_prefix.into() }
    }

    /// Builds a store from the default AWS config chain (env vars, shared
    /// config files, IMDS).
    pub async fn from_env(bucket: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&config), bucket, key_prefix)
    }

    fn object_key(&self, key: &BlockKey) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl BlockStore for S3BlockStore {
    async fn put(&self, key: &BlockKey, bytes: &[u8]) -> PayloadResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .body(ByteStream::from(bytes.to_vec()))
            .send()
            .await
            .map_err(|e| PayloadError::transient(format!("s3 put_object failed for {key}: {e}")))?;
        Ok(())
    }

    async fn get(&self, key: &BlockKey) -> PayloadResult<Vec<u8>> {
        let response = self.client.get_object().bucket(&self.bucket).key(self.object_key(key)).send().await;

        let object = match response {
            Ok(object) => object,
            Err(aws_sdk_s3::error::SdkError::ServiceError(e))
                if e.err().is_no_such_key() =>
            {
                return Err(PayloadError::block_not_found(key))
            }
            Err(e) => return Err(PayloadError::transient(format!("s3 get_object failed for {key}: {e}"))),
        };

        let bytes = object
            .body
            .collect()
            .await
            .map_err(|e| PayloadError::transient(format!("s3 get_object body read failed for {key}: {e}")))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn list_by_prefix(&self, prefix: &str) -> PayloadResult<Vec<BlockKey>> {
        let full_prefix = format!("{}{}", self.key_prefix, prefix);
        let mut keys = Vec::new();
        let mut continuation_token = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket).prefix(&full_prefix);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }
            let response = request
                .send()
                .await
                .map_err(|e| PayloadError::transient(format!("s3 list_objects_v2 failed for {full_prefix}: {e}")))?;

            for object in response.contents() {
                if let Some(object_key) = object.key() {
                    let stripped = object_key.strip_prefix(&self.key_prefix).unwrap_or(object_key);
                    keys.push(BlockKey::parse(stripped)?);
                }
            }

            if response.is_truncated() == Some(true) {
                continuation_token = response.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }
        Ok(keys)
    }

    async fn delete(&self, key: &BlockKey) -> PayloadResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await
            .map_err(|e| PayloadError::transient(format!("s3 delete_object failed for {key}: {e}")))?;
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> PayloadResult<()> {
        for key in self.list_by_prefix(prefix).await? {
            self.delete(&key).await?;
        }
        Ok(())
    }

    async fn healthcheck(&self) -> PayloadResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| PayloadError::transient(format!("s3 head_bucket failed for {}: {e}", self.bucket)))?;
        Ok(())
    }
}

