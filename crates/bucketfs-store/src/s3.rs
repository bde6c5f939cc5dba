use std::collections::VecDeque;
use std::io::Cursor;

use async_trait::async_trait;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::primitives::DateTime as AwsDateTime;
use bucketfs_config::S3Settings;
use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::scope::KeyScope;
use crate::traits::{ListCursor, ListEntry, ListOptions, ObjectAttributes, ObjectReader, ObjectStore};

const DEFAULT_REGION: &str = "us-east-1";

/// S3-compatible store (AWS S3, MinIO, and friends).
pub struct S3Store {
    client: aws_sdk_s3::Client,
    bucket: String,
    scope: KeyScope,
}

impl S3Store {
    /// Create a store for `bucket`, optionally scoped below `prefix`.
    pub async fn new(bucket: &str, prefix: &str, settings: &S3Settings) -> Result<Self, StoreError> {
        let region = settings.region.clone().unwrap_or_else(|| DEFAULT_REGION.to_string());
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region));

        if let (Some(access_key), Some(secret_key)) =
            (&settings.access_key_id, &settings.secret_access_key)
        {
            let credentials = aws_sdk_s3::config::Credentials::new(
                access_key.expose(),
                secret_key.expose(),
                None,
                None,
                "bucketfs",
            );
            loader = loader.credentials_provider(credentials);
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(S3Store {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
            bucket: bucket.to_string(),
            scope: KeyScope::new(prefix),
        })
    }
}

fn to_chrono(t: &AwsDateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(t.secs(), t.subsec_nanos())
}

/// Pages through `ListObjectsV2` one request at a time.
struct S3ListCursor {
    client: aws_sdk_s3::Client,
    bucket: String,
    scope: KeyScope,
    prefix: String,
    delimiter: Option<String>,
    continuation_token: Option<String>,
    buffered: VecDeque<ListEntry>,
    last_page: bool,
}

impl S3ListCursor {
    async fn fetch_page(&mut self) -> Result<(), StoreError> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&self.prefix)
            .set_delimiter(self.delimiter.clone())
            .set_continuation_token(self.continuation_token.clone())
            .send()
            .await
            .map_err(|e| StoreError::transport("list", e))?;

        let objects = response.contents().iter().filter_map(|obj| {
            obj.key().map(|key| {
                ListEntry::object(
                    self.scope.strip(key),
                    obj.size().unwrap_or(0).max(0) as u64,
                    obj.last_modified().and_then(to_chrono),
                )
            })
        });
        let prefixes = response
            .common_prefixes()
            .iter()
            .filter_map(|cp| cp.prefix())
            .map(|p| ListEntry::prefix(self.scope.strip(p)));

        let mut entries: Vec<ListEntry> = objects.chain(prefixes).collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        debug!(count = entries.len(), "fetched list page");
        self.buffered.extend(entries);

        self.continuation_token = if response.is_truncated() == Some(true) {
            response.next_continuation_token().map(|s| s.to_string())
        } else {
            None
        };
        self.last_page = self.continuation_token.is_none();
        Ok(())
    }
}

#[async_trait]
impl ListCursor for S3ListCursor {
    async fn next(&mut self) -> Result<Option<ListEntry>, StoreError> {
        loop {
            if let Some(entry) = self.buffered.pop_front() {
                return Ok(Some(entry));
            }
            if self.last_page {
                return Ok(None);
            }
            self.fetch_page().await?;
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn describe(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.scope.prefix())
    }

    #[instrument(skip(self), fields(store = "s3"))]
    async fn attributes(&self, key: &str) -> Result<ObjectAttributes, StoreError> {
        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.scope.apply(key))
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|se| se.is_not_found()) == Some(true) {
                    StoreError::NotFound(key.to_string())
                } else {
                    StoreError::transport("attributes", e)
                }
            })?;

        Ok(ObjectAttributes {
            size: response.content_length().unwrap_or(0).max(0) as u64,
            modified: response.last_modified().and_then(to_chrono),
        })
    }

    #[instrument(skip(self), fields(store = "s3", prefix = %options.prefix))]
    async fn list(&self, options: ListOptions) -> Result<Box<dyn ListCursor>, StoreError> {
        Ok(Box::new(S3ListCursor {
            client: self.client.clone(),
            bucket: self.bucket.clone(),
            scope: self.scope.clone(),
            prefix: self.scope.apply(&options.prefix),
            delimiter: options.delimiter,
            continuation_token: None,
            buffered: VecDeque::new(),
            last_page: false,
        }))
    }

    #[instrument(skip(self), fields(store = "s3"))]
    async fn open_range_reader(
        &self,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<ObjectReader, StoreError> {
        if length == 0 {
            return Ok(Box::new(Cursor::new(Vec::new())));
        }

        let last = offset.saturating_add(length - 1);
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(self.scope.apply(key))
            .range(format!("bytes={}-{}", offset, last))
            .send()
            .await;

        match result {
            Ok(output) => Ok(Box::new(Box::pin(output.body.into_async_read()))),
            Err(e) if e.code() == Some("InvalidRange") => Ok(Box::new(Cursor::new(Vec::new()))),
            Err(e) if e.as_service_error().map(|se| se.is_no_such_key()) == Some(true) => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(StoreError::transport("read", e)),
        }
    }
}
