use std::collections::VecDeque;
use std::io::Cursor;

use async_trait::async_trait;
use bucketfs_config::GcsSettings;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::StoreError;
use crate::scope::KeyScope;
use crate::traits::{ListCursor, ListEntry, ListOptions, ObjectAttributes, ObjectReader, ObjectStore};

const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Google Cloud Storage store, speaking the JSON API.
pub struct GcsStore {
    client: Client,
    bucket: String,
    scope: KeyScope,
    endpoint: String,
    access_token: Option<String>,
}

impl GcsStore {
    /// Create a store for `bucket`, optionally scoped below `prefix`.
    pub fn new(bucket: &str, prefix: &str, settings: &GcsSettings) -> Result<Self, StoreError> {
        let client = Client::builder()
            .build()
            .map_err(|e| StoreError::Other(format!("Failed to create HTTP client: {}", e)))?;

        let endpoint = settings
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/')
            .to_string();

        Ok(GcsStore {
            client,
            bucket: bucket.to_string(),
            scope: KeyScope::new(prefix),
            endpoint,
            access_token: settings.access_token.as_ref().map(|s| s.expose().to_string()),
        })
    }

    /// Base URL for object metadata and listings.
    fn objects_url(&self) -> String {
        format!(
            "{}/storage/v1/b/{}/o",
            self.endpoint,
            urlencoding::encode(&self.bucket)
        )
    }

    /// URL for a single object. Object names are fully escaped, `/` included.
    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.objects_url(),
            urlencoding::encode(&self.scope.apply(key))
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        authorize(request, self.access_token.as_deref())
    }
}

fn authorize(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

/// GCS list response.
#[derive(Deserialize)]
struct GcsListResponse {
    #[serde(default)]
    items: Vec<GcsObject>,
    #[serde(default)]
    prefixes: Vec<String>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

/// GCS object metadata. Sizes are encoded as decimal strings.
#[derive(Deserialize)]
struct GcsObject {
    name: String,
    #[serde(default)]
    size: Option<String>,
    updated: Option<String>,
}

impl GcsObject {
    fn size(&self) -> u64 {
        self.size
            .as_ref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0)
    }

    fn modified(&self) -> Option<DateTime<Utc>> {
        self.updated
            .as_ref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Pages through a listing one request at a time.
struct GcsListCursor {
    client: Client,
    url: String,
    access_token: Option<String>,
    scope: KeyScope,
    prefix: String,
    delimiter: Option<String>,
    page_token: Option<String>,
    buffered: VecDeque<ListEntry>,
    last_page: bool,
}

impl GcsListCursor {
    async fn fetch_page(&mut self) -> Result<(), StoreError> {
        let mut query = vec![("prefix", self.prefix.clone())];
        if let Some(delimiter) = &self.delimiter {
            query.push(("delimiter", delimiter.clone()));
        }
        if let Some(token) = &self.page_token {
            query.push(("pageToken", token.clone()));
        }

        let request = self.client.get(&self.url).query(&query);
        let response = authorize(request, self.access_token.as_deref())
            .send()
            .await
            .map_err(|e| StoreError::transport("list", e))?;

        if !response.status().is_success() {
            return Err(StoreError::transport(
                "list",
                format!("GCS list returned status {}", response.status()),
            ));
        }

        let page: GcsListResponse = response
            .json()
            .await
            .map_err(|e| StoreError::transport("list", e))?;

        // Items and prefixes arrive as two sorted runs; merge them back into key order.
        let mut entries: Vec<ListEntry> = page
            .items
            .iter()
            .map(|item| {
                ListEntry::object(self.scope.strip(&item.name), item.size(), item.modified())
            })
            .chain(
                page.prefixes
                    .iter()
                    .map(|p| ListEntry::prefix(self.scope.strip(p))),
            )
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        debug!(count = entries.len(), more = page.next_page_token.is_some(), "fetched list page");

        self.buffered.extend(entries);
        self.page_token = page.next_page_token;
        self.last_page = self.page_token.is_none();
        Ok(())
    }
}

#[async_trait]
impl ListCursor for GcsListCursor {
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
impl ObjectStore for GcsStore {
    fn describe(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.scope.prefix())
    }

    #[instrument(skip(self), fields(store = "gcs"))]
    async fn attributes(&self, key: &str) -> Result<ObjectAttributes, StoreError> {
        let response = self
            .authorize(self.client.get(self.object_url(key)))
            .send()
            .await
            .map_err(|e| StoreError::transport("attributes", e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(key.to_string()));
        }
        if !response.status().is_success() {
            return Err(StoreError::transport(
                "attributes",
                format!("GCS stat returned status {}", response.status()),
            ));
        }

        let object: GcsObject = response
            .json()
            .await
            .map_err(|e| StoreError::transport("attributes", e))?;

        Ok(ObjectAttributes {
            size: object.size(),
            modified: object.modified(),
        })
    }

    #[instrument(skip(self), fields(store = "gcs", prefix = %options.prefix))]
    async fn list(&self, options: ListOptions) -> Result<Box<dyn ListCursor>, StoreError> {
        // No request is made until the first pull.
        Ok(Box::new(GcsListCursor {
            client: self.client.clone(),
            url: self.objects_url(),
            access_token: self.access_token.clone(),
            scope: self.scope.clone(),
            prefix: self.scope.apply(&options.prefix),
            delimiter: options.delimiter,
            page_token: None,
            buffered: VecDeque::new(),
            last_page: false,
        }))
    }

    #[instrument(skip(self), fields(store = "gcs"))]
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
        let request = self
            .client
            .get(self.object_url(key))
            .query(&[("alt", "media")])
            .header(reqwest::header::RANGE, format!("bytes={}-{}", offset, last));

        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::transport("read", e))?;

        let status = response.status();
        if status == StatusCode::RANGE_NOT_SATISFIABLE {
            return Ok(Box::new(Cursor::new(Vec::new())));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(key.to_string()));
        }
        if !status.is_success() {
            return Err(StoreError::transport(
                "read",
                format!("GCS read returned status {}", status),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| StoreError::transport("read", e))?;

        // A plain 200 means the range was ignored and the whole object came back.
        let bytes = if status == StatusCode::PARTIAL_CONTENT {
            body.to_vec()
        } else {
            let len = body.len() as u64;
            let start = offset.min(len) as usize;
            let end = offset.saturating_add(length).min(len) as usize;
            body[start..end].to_vec()
        };

        Ok(Box::new(Cursor::new(bytes)))
    }
}
