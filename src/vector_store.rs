//! Qdrant collection management, bulk upload and nearest-neighbor search.
//!
//! Talks to the Qdrant REST API directly. Bulk loads follow the usual
//! pattern for large imports: recreate the collection with indexing
//! disabled, upload every point, then raise the indexing threshold so the
//! optimizer builds the HNSW graph once at the end.

use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::ValueEnum;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::embeddings::{Chunk, EmbeddedChunk, ScoredChunk};

/// Indexing threshold restored after a bulk upload.
pub const INDEXING_THRESHOLD: u64 = 20_000;

/// Default number of points per upload request.
pub const DEFAULT_UPLOAD_BATCH: usize = 256;

/// Validated Qdrant collection name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionName(String);

impl CollectionName {
    /// Builds a new collection identifier.
    pub fn new<S: Into<String>>(name: S) -> Result<Self> {
        let name = name.into();
        anyhow::ensure!(!name.trim().is_empty(), "collection name is required");
        anyhow::ensure!(
            name.chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-'),
            "collection name {:?} may only contain ASCII letters, digits, '_' and '-'",
            name
        );
        Ok(Self(name))
    }

    /// Returns the raw collection string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Similarity metric configured on a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
pub enum Distance {
    /// Cosine similarity.
    Cosine,
    /// Dot product.
    Dot,
    /// Euclidean distance.
    Euclid,
}

/// Connection settings for [`QdrantStore`].
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// Base URL of the Qdrant REST endpoint, e.g. `http://localhost:6333`.
    pub url: String,
    /// Optional value for the `api-key` header.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6333".to_string(),
            api_key: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Blocking Qdrant REST client.
#[derive(Clone)]
pub struct QdrantStore {
    client: Client,
    base_url: String,
}

impl QdrantStore {
    /// Builds a new client from `config`.
    pub fn new(config: QdrantConfig) -> Result<Self> {
        anyhow::ensure!(
            config.url.starts_with("http://") || config.url.starts_with("https://"),
            "Qdrant URL must be an http(s) URL"
        );
        let mut headers = HeaderMap::new();
        if let Some(key) = config.api_key.as_deref().filter(|key| !key.trim().is_empty()) {
            headers.insert(
                "api-key",
                HeaderValue::from_str(key.trim()).context("invalid Qdrant API key")?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .context("failed to build Qdrant HTTP client")?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn collection_url(&self, name: &CollectionName) -> String {
        format!("{}/collections/{}", self.base_url, name)
    }

    /// Drops `name` if it exists and creates it fresh with indexing disabled.
    pub fn recreate_collection(
        &self,
        name: &CollectionName,
        dim: usize,
        distance: Distance,
    ) -> Result<()> {
        anyhow::ensure!(dim > 0, "embedding dimension must be positive");
        let url = self.collection_url(name);
        let resp = self
            .client
            .delete(&url)
            .send()
            .with_context(|| format!("failed to delete collection {name}"))?;
        if resp.status() != StatusCode::NOT_FOUND {
            check(resp, "delete collection")?;
        }

        let body = json!({
            "vectors": { "size": dim, "distance": distance },
            "optimizers_config": { "indexing_threshold": 0 },
        });
        send(self.client.put(&url).json(&body), "create collection")?;
        info!(collection = %name, dim, ?distance, "recreated collection");
        Ok(())
    }

    /// Stops the optimizer from building the vector index during bulk writes.
    pub fn disable_indexing(&self, name: &CollectionName) -> Result<()> {
        self.set_indexing_threshold(name, 0)
    }

    /// Lets the optimizer build the vector index again.
    pub fn enable_indexing(&self, name: &CollectionName) -> Result<()> {
        self.set_indexing_threshold(name, INDEXING_THRESHOLD)
    }

    fn set_indexing_threshold(&self, name: &CollectionName, threshold: u64) -> Result<()> {
        let body = json!({ "optimizers_config": { "indexing_threshold": threshold } });
        send(
            self.client.patch(self.collection_url(name)).json(&body),
            "update collection",
        )?;
        debug!(collection = %name, threshold, "updated indexing threshold");
        Ok(())
    }

    /// Uploads `records` in batches, assigning point ids `0..records.len()`.
    ///
    /// Every vector must have `dim` components; the check runs before any
    /// request is sent.
    pub fn upload_points(
        &self,
        name: &CollectionName,
        records: &[EmbeddedChunk],
        dim: usize,
        batch_size: usize,
    ) -> Result<usize> {
        check_dimensions(records, dim)?;
        let url = format!("{}/points?wait=true", self.collection_url(name));
        let batch_size = batch_size.max(1);
        let mut uploaded = 0usize;
        for (batch_no, batch) in records.chunks(batch_size).enumerate() {
            let points: Vec<PointStruct<'_>> = batch
                .iter()
                .enumerate()
                .map(|(offset, record)| PointStruct {
                    id: (uploaded + offset) as u64,
                    vector: &record.embedding,
                    payload: &record.chunk,
                })
                .collect();
            send(
                self.client.put(&url).json(&UpsertRequest { points }),
                "upload points",
            )
            .with_context(|| format!("batch {} of collection {}", batch_no, name))?;
            uploaded += batch.len();
            info!(collection = %name, uploaded, total = records.len(), "uploaded points");
        }
        Ok(uploaded)
    }

    /// Returns the `top` stored chunks closest to `vector`, best first.
    pub fn search(&self, name: &CollectionName, vector: &[f32], top: usize) -> Result<Vec<ScoredChunk>> {
        let request = SearchRequest {
            vector,
            limit: top,
            with_payload: true,
        };
        let resp = send(
            self.client
                .post(format!("{}/points/search", self.collection_url(name)))
                .json(&request),
            "search points",
        )?;
        let parsed: SearchResponse = resp.json().context("failed to parse Qdrant search response")?;
        Ok(parsed
            .result
            .into_iter()
            .map(|hit| ScoredChunk {
                payload: hit.payload,
                score: hit.score,
            })
            .collect())
    }
}

/// Fails on the first record whose vector does not have `dim` components.
pub fn check_dimensions(records: &[EmbeddedChunk], dim: usize) -> Result<()> {
    if let Some((idx, bad)) = records
        .iter()
        .enumerate()
        .find(|(_, record)| record.embedding.len() != dim)
    {
        anyhow::bail!(
            "vector {} (page {}, chunk {}) has {} dimensions, collection expects {}",
            idx,
            bad.chunk.page_no,
            bad.chunk.chunk,
            bad.embedding.len(),
            dim
        );
    }
    Ok(())
}

fn send(request: RequestBuilder, action: &str) -> Result<Response> {
    let resp = request
        .send()
        .with_context(|| format!("failed to {action} on Qdrant"))?;
    check(resp, action)
}

fn check(resp: Response, action: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp
        .text()
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    anyhow::bail!("Qdrant {} failed ({}): {}", action, status, body)
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    points: Vec<PointStruct<'a>>,
}

#[derive(Serialize)]
struct PointStruct<'a> {
    id: u64,
    vector: &'a [f32],
    payload: &'a Chunk,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    score: f32,
    payload: Chunk,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collection_name_rejects_blank_and_paths() {
        assert!(CollectionName::new("  ").is_err());
        assert!(CollectionName::new("a/b").is_err());
        assert!(CollectionName::new("a%2Fb").is_err());
        assert!(CollectionName::new("my docs").is_err());
        assert!(CollectionName::new("my-test_collection2").is_ok());
        assert_eq!(CollectionName::new("blitzscaling").unwrap().as_str(), "blitzscaling");
    }

    #[test]
    fn distance_serializes_like_qdrant() {
        assert_eq!(serde_json::to_value(Distance::Cosine).unwrap(), "Cosine");
        assert_eq!(serde_json::to_value(Distance::Euclid).unwrap(), "Euclid");
    }

    #[test]
    fn upload_rejects_dimension_mismatch_before_sending() {
        let store = QdrantStore::new(QdrantConfig {
            url: "http://127.0.0.1:9".into(),
            ..QdrantConfig::default()
        })
        .unwrap();
        let record = EmbeddedChunk {
            chunk: Chunk {
                doc: "d.pdf".into(),
                page_no: 2,
                chunk: 0,
                text: "t".into(),
            },
            embedding: vec![0.0; 3],
        };
        let name = CollectionName::new("c").unwrap();
        let err = store.upload_points(&name, &[record], 4, 256).unwrap_err();
        assert!(err.to_string().contains("has 3 dimensions"));
    }

    #[test]
    fn rejects_non_http_url() {
        let config = QdrantConfig {
            url: "localhost:6333".into(),
            ..QdrantConfig::default()
        };
        assert!(QdrantStore::new(config).is_err());
    }
}
