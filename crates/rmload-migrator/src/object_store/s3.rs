use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::Client;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rmload_shared::{IngestError, ObjectStore};
use tracing::debug;

use super::VisibilityWait;
use crate::config::StorageConfig;

/// Object store over any S3-compatible service.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    wait: VisibilityWait,
}

/// Bytes left as-is in a `CopySource` key: RFC 3986 unreserved plus `/`.
const COPY_SOURCE_KEY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// URL-encoded `CopySource` value for a key in `bucket`.
fn copy_source(bucket: &str, key: &str) -> String {
    format!(
        "{}/{}",
        bucket,
        utf8_percent_encode(key.trim_start_matches('/'), COPY_SOURCE_KEY)
    )
}

/// Map an SDK failure onto the pipeline's error kinds.
fn classify<E>(op: &str, key: &str, err: SdkError<E>) -> IngestError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let not_found = err
        .as_service_error()
        .and_then(|e| e.code())
        .is_some_and(|code| matches!(code, "NoSuchKey" | "NotFound"));
    let message = format!("{} {}: {}", op, key, DisplayErrorContext(&err));
    if not_found {
        IngestError::NotFound(message)
    } else {
        IngestError::TransientIo(message)
    }
}

impl S3ObjectStore {
    /// Build a client from the storage settings.
    ///
    /// Region, endpoint and credentials fall back to the SDK's default chain
    /// when unset. Path-style addressing is always on, since most
    /// self-hosted S3 services don't do virtual-host buckets.
    pub async fn connect(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(ref region) = config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(ref endpoint) = config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(access), Some(secret)) = (&config.access_key, &config.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access,
                secret.expose(),
                None,
                None,
                "rmload-config",
            ));
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            wait: config.into(),
        }
    }

    pub async fn check_bucket(&self) -> anyhow::Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("{}", DisplayErrorContext(&e)))
            .with_context(|| format!("Bucket '{}' is not reachable", self.bucket))?;
        Ok(())
    }

    pub async fn exists(&self, key: &str) -> Result<bool, IngestError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|s| s.is_not_found()) => Ok(false),
            Err(e) => Err(classify("head", key, e)),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, IngestError> {
        let mut keys = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(token) = continuation_token {
                request = request.continuation_token(token);
            }

            let response = request.send().await.map_err(|e| classify("list", prefix, e))?;

            for object in response.contents.unwrap_or_default() {
                if let Some(key) = object.key {
                    // Console-created "folders" are zero-byte keys ending in '/'.
                    if !key.ends_with('/') {
                        keys.push(key);
                    }
                }
            }

            if response.is_truncated.unwrap_or(false) {
                continuation_token = response.next_continuation_token;
                if continuation_token.is_none() {
                    break;
                }
            } else {
                break;
            }
        }

        debug!(prefix, count = keys.len(), "Listed objects");
        Ok(keys)
    }

    async fn read(&self, key: &str) -> Result<Bytes, IngestError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify("read", key, e))?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| IngestError::TransientIo(format!("read {}: {}", key, e)))?
            .into_bytes();

        debug!(key, size = data.len(), "Read object");
        Ok(data)
    }

    async fn relocate(&self, src: &str, dst: &str) -> Result<(), IngestError> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(copy_source(&self.bucket, src))
            .key(dst)
            .send()
            .await
            .map_err(|e| match classify("copy", src, e) {
                IngestError::NotFound(msg) => IngestError::NotFound(msg),
                other => IngestError::TransientIo(format!("{} -> {}: {}", src, dst, other)),
            })?;

        self.wait
            .until(&format!("{} to appear", dst), true, || self.exists(dst))
            .await?;

        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(src)
            .send()
            .await
            .map_err(|e| {
                IngestError::TransientIo(format!(
                    "{} copied to {} but delete failed, both keys present: {}",
                    src,
                    dst,
                    DisplayErrorContext(&e)
                ))
            })?;

        self.wait
            .until(&format!("{} to disappear", src), false, || self.exists(src))
            .await?;

        debug!(src, dst, "Relocated object");
        Ok(())
    }
}
