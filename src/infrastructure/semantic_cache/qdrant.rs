//! Qdrant-backed vector index

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qdrant_client::{
    qdrant::{
        point_id::PointIdOptions, vectors_config::Config, CountPointsBuilder,
        CreateCollectionBuilder, DeletePointsBuilder, Distance, GetPointsBuilder, PointId,
        PointStruct, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
        VectorParams, VectorsConfig,
    },
    Qdrant,
};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::domain::cache::CacheKey;
use crate::domain::semantic_cache::{
    rank_matches, EmbeddingPayload, EmbeddingRecord, SimilarityMatch, VectorIndex,
};
use crate::domain::DomainError;

const STORE: &str = "qdrant";

/// Extra neighbours fetched beyond `limit`; Qdrant orders equal scores
/// arbitrarily, so ties are re-ranked locally before truncating
const TIE_HEADROOM: usize = 16;

/// Vector index stored in one Qdrant collection with cosine distance.
///
/// The collection is created on first use. Point ids are derived from the
/// cache key so re-inserting the same query replaces its point.
pub struct QdrantVectorIndex {
    client: Arc<Qdrant>,
    collection: String,
    dimensions: usize,
    ready: OnceCell<()>,
}

impl fmt::Debug for QdrantVectorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QdrantVectorIndex")
            .field("collection", &self.collection)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

fn store_error(action: &str, e: impl fmt::Display) -> DomainError {
    DomainError::cache_unavailable(STORE, format!("{}: {}", action, e))
}

/// First 128 bits of the hex key as a UUID
fn point_id(key: &CacheKey) -> PointId {
    // Keys are always 64 hex chars, so the prefix parses.
    let id = key
        .as_str()
        .get(..32)
        .and_then(|prefix| Uuid::parse_str(prefix).ok())
        .unwrap_or_default();

    PointId::from(id.to_string())
}

impl QdrantVectorIndex {
    pub fn new(
        url: &str,
        collection: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, DomainError> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| store_error(&format!("Failed to create client for {}", url), e))?;

        Ok(Self {
            client: Arc::new(client),
            collection: collection.into(),
            dimensions,
            ready: OnceCell::new(),
        })
    }

    async fn ensure_collection(&self) -> Result<(), DomainError> {
        self.ready
            .get_or_try_init(|| async {
                let exists = self
                    .client
                    .list_collections()
                    .await
                    .map_err(|e| store_error("Failed to list collections", e))?
                    .collections
                    .iter()
                    .any(|c| c.name == self.collection);

                if !exists {
                    let request = CreateCollectionBuilder::new(&self.collection).vectors_config(
                        VectorsConfig {
                            config: Some(Config::Params(VectorParams {
                                size: self.dimensions as u64,
                                distance: Distance::Cosine.into(),
                                ..Default::default()
                            })),
                        },
                    );

                    self.client
                        .create_collection(request)
                        .await
                        .map_err(|e| store_error("Failed to create collection", e))?;

                    tracing::info!(
                        collection = %self.collection,
                        dimensions = self.dimensions,
                        "Created Qdrant collection"
                    );
                }

                Ok(())
            })
            .await
            .map(|_| ())
    }

    fn check_dimensions(&self, len: usize) -> Result<(), DomainError> {
        if len != self.dimensions {
            return Err(DomainError::cache_unavailable(
                STORE,
                format!(
                    "Vector has {} dimensions, collection expects {}",
                    len, self.dimensions
                ),
            ));
        }
        Ok(())
    }

    fn record_to_point(record: &EmbeddingRecord) -> PointStruct {
        let mut payload: HashMap<String, QdrantValue> = HashMap::new();
        payload.insert("cache_key".into(), record.key.as_str().to_string().into());
        payload.insert("query".into(), record.payload.query.clone().into());
        payload.insert("response".into(), record.payload.response.clone().into());
        payload.insert("provider_id".into(), record.payload.provider_id.clone().into());
        payload.insert("model_id".into(), record.payload.model_id.clone().into());
        payload.insert(
            "created_at".into(),
            record.payload.created_at.to_rfc3339().into(),
        );

        PointStruct {
            id: Some(point_id(&record.key)),
            vectors: Some(record.vector.clone().into()),
            payload,
        }
    }

    fn payload_to_record(
        payload: HashMap<String, QdrantValue>,
    ) -> Option<(CacheKey, EmbeddingPayload)> {
        let fields: HashMap<String, serde_json::Value> = payload
            .into_iter()
            .map(|(k, v)| (k, serde_json::Value::from(v)))
            .collect();

        let text = |name: &str| fields.get(name).and_then(|v| v.as_str()).map(String::from);

        let key = serde_json::from_value(fields.get("cache_key")?.clone()).ok()?;
        let created_at = text("created_at")
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc))?;

        Some((
            key,
            EmbeddingPayload {
                query: text("query")?,
                response: text("response")?,
                provider_id: text("provider_id")?,
                model_id: text("model_id")?,
                created_at,
            },
        ))
    }
}

#[async_trait]
impl VectorIndex for QdrantVectorIndex {
    async fn upsert(&self, record: EmbeddingRecord) -> Result<(), DomainError> {
        self.check_dimensions(record.vector.len())?;
        self.ensure_collection().await?;

        let request =
            UpsertPointsBuilder::new(&self.collection, vec![Self::record_to_point(&record)]);

        self.client
            .upsert_points(request)
            .await
            .map_err(|e| store_error("Upsert failed", e))?;

        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<SimilarityMatch>, DomainError> {
        self.check_dimensions(vector.len())?;
        self.ensure_collection().await?;

        let fetch = limit.saturating_add(TIE_HEADROOM) as u64;
        let request = SearchPointsBuilder::new(&self.collection, vector.to_vec(), fetch)
            .with_payload(true)
            .score_threshold(threshold);

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| store_error("Search failed", e))?;

        let matches = response
            .result
            .into_iter()
            .filter_map(|point| {
                let score = point.score;
                let (key, payload) = Self::payload_to_record(point.payload)?;
                // Search results omit vectors; the orchestrator only needs the payload.
                Some(SimilarityMatch::new(
                    EmbeddingRecord::new(key, Vec::new(), payload),
                    score,
                ))
            })
            .collect();

        Ok(rank_matches(matches, limit))
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool, DomainError> {
        self.ensure_collection().await?;

        let id = point_id(key);
        let existing = self
            .client
            .get_points(GetPointsBuilder::new(&self.collection, vec![id.clone()]))
            .await
            .map_err(|e| store_error("Get failed", e))?;

        if existing.result.is_empty() {
            return Ok(false);
        }

        self.client
            .delete_points(DeletePointsBuilder::new(&self.collection).points(vec![id]))
            .await
            .map_err(|e| store_error("Delete failed", e))?;

        Ok(true)
    }

    async fn size(&self) -> Result<usize, DomainError> {
        self.ensure_collection().await?;

        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(|e| store_error("Count failed", e))?;

        Ok(response.result.map(|r| r.count as usize).unwrap_or(0))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn backend_name(&self) -> &'static str {
        STORE
    }
}
