//! AWS S3 Object Store Implementation

use super::config::S3Config;
use crate::metrics::{record_op, record_read, record_write};
use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    Delete, MetadataDirective, ObjectIdentifier, StorageClass, TaggingDirective,
};
use aws_sdk_s3::Client;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use objstash_core::{
    rebase_key, rechunk, ChunkStream, ObjectInfo, ObjectStore, ObjectStoreError, Result,
};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::any::Any;
use tracing::{debug, instrument, warn};

const STORE_TYPE: &str = "s3";

/// `DeleteObjects` accepts at most this many identifiers per request.
const MAX_DELETE_BATCH: usize = 1000;

/// Characters left unescaped in an `x-amz-copy-source` value.
const COPY_SOURCE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// AWS S3 object store implementation. One store addresses one bucket.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    config: S3Config,
}

impl S3ObjectStore {
    /// Build a client from the AWS default provider chain plus the region
    /// and endpoint overrides in `config`.
    pub async fn new(config: S3Config) -> Result<Self> {
        config.validate()?;

        let mut loader = aws_config::from_env();
        if let Some(region) = &config.region {
            loader = loader.region(aws_sdk_s3::config::Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        debug!(bucket = %config.bucket, endpoint = ?config.endpoint, "S3ObjectStore initialised");
        Self::from_client(Client::from_conf(s3_config), config)
    }

    /// Wrap an already configured client.
    pub fn from_client(client: Client, config: S3Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { client, config })
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Server-side copy from `source_bucket` into this store's bucket.
    ///
    /// Source metadata, tags and redirect location are replaced by nothing,
    /// and the storage class is reset to the default tier.
    async fn copy_object(
        &self,
        source_bucket: &str,
        source_key: &str,
        destination_key: &str,
    ) -> Result<()> {
        record_op(STORE_TYPE, "copy_object");
        self.client
            .copy_object()
            .copy_source(copy_source(source_bucket, source_key))
            .bucket(&self.config.bucket)
            .key(destination_key)
            .metadata_directive(MetadataDirective::Replace)
            .tagging_directive(TaggingDirective::Replace)
            .storage_class(StorageClass::Standard)
            .send()
            .await
            .map_err(|e| {
                if e.code() == Some("NoSuchKey") {
                    ObjectStoreError::NotFound(source_key.to_string())
                } else {
                    map_sdk_error(format!("copy {source_bucket}/{source_key}"), e)
                }
            })?;
        Ok(())
    }

    /// Every key starting with `prefix`, following continuation tokens
    /// until the listing is exhausted.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut results = Vec::new();
        let mut continuation_token = None;

        loop {
            record_op(STORE_TYPE, "list_objects");
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.config.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation_token)
                .send()
                .await
                .map_err(|e| map_sdk_error(format!("list {prefix}"), e))?;

            for object in resp.contents() {
                if let Some(key) = object.key() {
                    results.push(key.to_string());
                }
            }

            match resp.next_continuation_token() {
                Some(token) => continuation_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(results)
    }

    /// Issue one `DeleteObjects` call per batch of identifiers. Returns the
    /// number of identifiers the service reported as not deleted, and the
    /// first such failure.
    async fn delete_identifiers(
        &self,
        identifiers: Vec<ObjectIdentifier>,
    ) -> Result<(usize, Option<ObjectStoreError>)> {
        let mut failed = 0;
        let mut first = None;
        let mut remaining = identifiers;

        while !remaining.is_empty() {
            let rest = remaining.split_off(remaining.len().min(MAX_DELETE_BATCH));
            let batch = std::mem::replace(&mut remaining, rest);

            let delete = Delete::builder()
                .set_objects(Some(batch))
                .quiet(true)
                .build()
                .map_err(|e| ObjectStoreError::Provider(e.to_string()))?;

            record_op(STORE_TYPE, "delete_objects");
            let resp = self
                .client
                .delete_objects()
                .bucket(&self.config.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| map_sdk_error("delete objects".to_string(), e))?;

            for error in resp.errors() {
                warn!(
                    key = error.key().unwrap_or_default(),
                    code = error.code().unwrap_or_default(),
                    "object version not deleted"
                );
                failed += 1;
                if first.is_none() {
                    first = Some(ObjectStoreError::Provider(format!(
                        "delete {}: {}",
                        error.key().unwrap_or_default(),
                        error.message().or(error.code()).unwrap_or("unknown error")
                    )));
                }
            }
        }
        Ok((failed, first))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn exists_under_prefix(&self, prefix: &str) -> Result<bool> {
        record_op(STORE_TYPE, "exists_under_prefix");
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&self.config.bucket)
            .prefix(prefix)
            .max_keys(1)
            .send()
            .await
            .map_err(|e| map_sdk_error(format!("list {prefix}"), e))?;
        Ok(!resp.contents().is_empty())
    }

    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        record_op(STORE_TYPE, "get");
        let resp = match self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Ok(None)
            }
            Err(e) => return Err(map_sdk_error(format!("get {key}"), e)),
        };

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| ObjectStoreError::Network(format!("read body of {key}: {e}")))?
            .into_bytes();
        record_read(STORE_TYPE, data.len());
        Ok(Some(data))
    }

    #[instrument(skip(self, data), fields(bucket = %self.config.bucket, size = data.len()))]
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        record_op(STORE_TYPE, "put");
        let size = data.len();
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| map_sdk_error(format!("put {key}"), e))?;
        record_write(STORE_TYPE, size);
        Ok(())
    }

    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn delete_single(&self, key: &str) -> Result<()> {
        record_op(STORE_TYPE, "delete_single");
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(format!("delete {key}"), e))?;
        Ok(())
    }

    /// Removes every version and delete marker under `prefix`, so nothing
    /// deleted here stays recoverable in a versioned bucket.
    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn delete_recursive(&self, prefix: &str) -> Result<()> {
        record_op(STORE_TYPE, "delete_recursive");
        let mut key_marker: Option<String> = None;
        let mut version_id_marker: Option<String> = None;
        let mut total = 0usize;
        let mut failed = 0usize;
        let mut first_error = None;

        loop {
            record_op(STORE_TYPE, "list_object_versions");
            let resp = self
                .client
                .list_object_versions()
                .bucket(&self.config.bucket)
                .prefix(prefix)
                .set_key_marker(key_marker.take())
                .set_version_id_marker(version_id_marker.take())
                .send()
                .await
                .map_err(|e| map_sdk_error(format!("list versions {prefix}"), e))?;

            let versions = resp
                .versions()
                .iter()
                .map(|v| (v.key(), v.version_id()));
            let markers = resp
                .delete_markers()
                .iter()
                .map(|m| (m.key(), m.version_id()));

            let mut identifiers = Vec::new();
            for (key, version_id) in versions.chain(markers) {
                let Some(key) = key else { continue };
                let identifier = ObjectIdentifier::builder()
                    .key(key)
                    .set_version_id(version_id.map(str::to_string))
                    .build()
                    .map_err(|e| ObjectStoreError::Provider(e.to_string()))?;
                identifiers.push(identifier);
            }

            total += identifiers.len();
            let (batch_failed, batch_first) = self.delete_identifiers(identifiers).await?;
            failed += batch_failed;
            if first_error.is_none() {
                first_error = batch_first;
            }

            if !resp.is_truncated().unwrap_or(false) {
                break;
            }
            key_marker = resp.next_key_marker().map(str::to_string);
            version_id_marker = resp.next_version_id_marker().map(str::to_string);
            if key_marker.is_none() {
                break;
            }
        }

        debug!(total, failed, "deleted prefix");
        match first_error {
            Some(first) => Err(ObjectStoreError::Batch {
                operation: "delete_recursive",
                failed,
                total,
                first: Box::new(first),
            }),
            None => Ok(()),
        }
    }

    /// Lists the whole source prefix first, then copies every object with
    /// a bounded number of copies in flight. All copies are attempted; any
    /// failures are reported together once the last one finishes.
    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn copy_recursive(&self, source_prefix: &str, destination_prefix: &str) -> Result<()> {
        record_op(STORE_TYPE, "copy_recursive");
        let keys = self.list_keys(source_prefix).await?;
        let total = keys.len();
        let bucket = self.config.bucket.as_str();

        let pairs: Vec<(String, String)> = keys
            .into_iter()
            .filter_map(|key| {
                let destination = rebase_key(&key, source_prefix, destination_prefix)?;
                Some((key, destination))
            })
            .collect();

        let results: Vec<(String, Result<()>)> = stream::iter(pairs)
            .map(move |(key, destination)| async move {
                let result = self.copy_object(bucket, &key, &destination).await;
                (key, result)
            })
            .buffer_unordered(self.config.copy_concurrency)
            .collect()
            .await;

        let mut failed = 0usize;
        let mut first_error = None;
        for (key, result) in results {
            if let Err(e) = result {
                warn!(key = %key, error = %e, "object copy failed");
                failed += 1;
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        debug!(total, failed, "copied prefix");
        match first_error {
            Some(first) => Err(ObjectStoreError::Batch {
                operation: "copy_recursive",
                failed,
                total,
                first: Box::new(first),
            }),
            None => Ok(()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_object_store(&self) -> &dyn ObjectStore {
        self
    }

    fn store_type(&self) -> &'static str {
        STORE_TYPE
    }

    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>> {
        record_op(STORE_TYPE, "head");
        match self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(resp) => {
                let size = resp.content_length().unwrap_or(0).max(0) as u64;
                Ok(Some(ObjectInfo::new(size)))
            }
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(None),
            Err(e) => Err(map_sdk_error(format!("head {key}"), e)),
        }
    }

    /// Streams the response body, re-sliced to `chunk_size`, without
    /// buffering the whole object.
    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn get_as_chunks(&self, key: &str, chunk_size: usize) -> Result<Option<ChunkStream>> {
        if chunk_size == 0 {
            return Err(ObjectStoreError::InvalidArgument(
                "chunk size must be at least 1 byte".to_string(),
            ));
        }
        record_op(STORE_TYPE, "get_as_chunks");
        let resp = match self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Ok(None)
            }
            Err(e) => return Err(map_sdk_error(format!("get {key}"), e)),
        };

        let key = key.to_string();
        let body = stream::unfold(Some(resp.body), move |body| {
            let key = key.clone();
            async move {
                let mut body = body?;
                match body.try_next().await {
                    Ok(Some(bytes)) => {
                        record_read(STORE_TYPE, bytes.len());
                        Some((Ok(bytes), Some(body)))
                    }
                    Ok(None) => None,
                    Err(e) => Some((
                        Err(ObjectStoreError::Network(format!("read body of {key}: {e}"))),
                        None,
                    )),
                }
            }
        });
        Ok(Some(rechunk(body.boxed(), chunk_size)?))
    }

    /// Uses a server-side copy when `source` is also an S3 store, otherwise
    /// reads the object through memory.
    #[instrument(skip(self, source), fields(bucket = %self.config.bucket, source_store = source.store_type()))]
    async fn copy_single(
        &self,
        source: &dyn ObjectStore,
        source_key: &str,
        destination_key: &str,
    ) -> Result<()> {
        match source.as_any().downcast_ref::<S3ObjectStore>() {
            Some(source_store) => {
                self.copy_object(source_store.bucket(), source_key, destination_key)
                    .await
            }
            None => {
                let data = source.get_or_fail(source_key).await?;
                self.put(destination_key, data).await
            }
        }
    }

    #[instrument(skip(self), fields(bucket = %self.config.bucket))]
    async fn move_object(&self, source_key: &str, destination_key: &str) -> Result<()> {
        self.copy_object(&self.config.bucket, source_key, destination_key)
            .await?;
        if source_key != destination_key {
            self.delete_single(source_key).await?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for S3ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectStore")
            .field("bucket", &self.config.bucket)
            .field("endpoint", &self.config.endpoint)
            .finish()
    }
}

/// `x-amz-copy-source` value for `bucket/key`.
fn copy_source(bucket: &str, key: &str) -> String {
    utf8_percent_encode(&format!("{bucket}/{key}"), COPY_SOURCE).to_string()
}

fn map_sdk_error<E, R>(context: String, err: SdkError<E, R>) -> ObjectStoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug,
{
    let message = format!("{context}: {}", DisplayErrorContext(&err));
    match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            ObjectStoreError::Network(message)
        }
        _ if matches!(err.code(), Some("AccessDenied") | Some("AllAccessDisabled")) => {
            ObjectStoreError::PermissionDenied(message)
        }
        _ => ObjectStoreError::Provider(message),
    }
}
