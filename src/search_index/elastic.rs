use std::time::Duration;

use async_trait::async_trait;

use super::{IndexDocument, SearchHit, SearchIndex, SearchIndexError};
use crate::config::SearchConfig;

/// Elasticsearch-backed index using the REST API via `reqwest`.
///
/// Documents live in a single index; the mapping is created on startup if it
/// does not already exist. Every call is bounded by the configured timeout --
/// a slow or down engine degrades search freshness, not upload availability.
pub struct ElasticIndex {
    client: reqwest::Client,
    base_url: String,
    index: String,
    username: Option<String>,
    password: Option<String>,
}

impl ElasticIndex {
    pub fn new(config: &SearchConfig) -> Result<Self, SearchIndexError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| SearchIndexError::Backend(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_owned(),
            index: config.index.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Build a request for the given method and path, applying basic
    /// authentication when credentials are configured.
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{path}", self.base_url);
        let mut req = self.client.request(method, &url);
        if let Some(ref user) = self.username {
            req = req.basic_auth(user, self.password.as_deref());
        }
        req
    }
}

// ---------------------------------------------------------------------------
// Elasticsearch response types (internal)
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(serde::Deserialize)]
struct SearchHits {
    hits: Vec<RawHit>,
}

#[derive(serde::Deserialize)]
struct RawHit {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_score")]
    score: Option<f64>,
}

#[async_trait]
impl SearchIndex for ElasticIndex {
    async fn ensure_schema(&self) -> Result<(), SearchIndexError> {
        let mapping = serde_json::json!({
            "settings": {
                "number_of_shards": 1,
                "number_of_replicas": 0
            },
            "mappings": {
                "properties": {
                    "space_name":   { "type": "text" },
                    "folder_name":  { "type": "text" },
                    "project_name": { "type": "text" },
                    "filename":     { "type": "text" },
                    "content":      { "type": "text" },
                    "file_path":    { "type": "keyword" },
                    "created_at":   { "type": "date" }
                }
            }
        });

        let resp = self
            .request(reqwest::Method::PUT, &self.index)
            .json(&mapping)
            .send()
            .await
            .map_err(|e| SearchIndexError::Backend(e.to_string()))?;

        // 200/201 = created, 400 = index already exists
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::BAD_REQUEST {
            tracing::debug!(index = %self.index, "search index ensured");
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(SearchIndexError::Backend(format!(
                "failed to create index '{}': {body}",
                self.index
            )))
        }
    }

    async fn upsert(&self, file_id: &str, doc: &IndexDocument) -> Result<(), SearchIndexError> {
        let path = format!("{}/_doc/{file_id}", self.index);

        let resp = self
            .request(reqwest::Method::PUT, &path)
            .json(doc)
            .send()
            .await
            .map_err(|e| SearchIndexError::Backend(e.to_string()))?;

        if resp.status().is_success() {
            tracing::debug!(file_id = %file_id, "document indexed");
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(SearchIndexError::Backend(format!(
                "failed to index document: {body}"
            )))
        }
    }

    async fn remove(&self, file_id: &str) -> Result<(), SearchIndexError> {
        let path = format!("{}/_doc/{file_id}", self.index);

        let resp = self
            .request(reqwest::Method::DELETE, &path)
            .send()
            .await
            .map_err(|e| SearchIndexError::Backend(e.to_string()))?;

        // 404 is fine -- entry already gone
        if resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(SearchIndexError::Backend(format!(
                "failed to remove document: {body}"
            )))
        }
    }

    async fn query(&self, text: &str) -> Result<Vec<SearchHit>, SearchIndexError> {
        let body = serde_json::json!({
            "query": {
                "multi_match": {
                    "query": text,
                    "fields": ["space_name", "folder_name", "project_name", "filename", "content"]
                }
            }
        });

        let path = format!("{}/_search", self.index);

        let resp = self
            .request(reqwest::Method::POST, &path)
            .json(&body)
            .send()
            .await
            .map_err(|e| SearchIndexError::Backend(e.to_string()))?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SearchIndexError::Backend(format!("query failed: {body}")));
        }

        let search: SearchResponse = resp
            .json()
            .await
            .map_err(|e| SearchIndexError::Serialization(e.to_string()))?;

        Ok(search
            .hits
            .hits
            .into_iter()
            .map(|hit| SearchHit {
                file_id: hit.id,
                score: hit.score.unwrap_or(0.0),
            })
            .collect())
    }
}
