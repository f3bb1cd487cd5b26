//! Elasticsearch connector.
//!
//! Snapshot exports every document matching the configured index pattern
//! via the scroll API into an NDJSON artifact (one `{_index, _id, _source}`
//! object per line). Restore deletes the matching indices and replays the
//! artifact through `_bulk`. Quiesce toggles the `blocks.write` index
//! setting.

use crate::{tmp_path, BackendConnector};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};
use vigil_common::{BackendKind, Error, Result};
use vigil_config::SearchConfig;

const EXPORT_FILE: &str = "search.ndjson";

pub struct ElasticsearchConnector {
    config: SearchConfig,
    client: Client,
    health_timeout: Duration,
}

impl ElasticsearchConnector {
    pub fn new(config: SearchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Internal(format!("http client: {}", e)))?;
        Ok(Self {
            config,
            client,
            health_timeout: Duration::from_secs(5),
        })
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn unreachable(&self, e: reqwest::Error) -> Error {
        Error::BackendUnreachable {
            kind: BackendKind::SearchIndex,
            reason: e.to_string(),
        }
    }

    fn snapshot_error(reason: String) -> Error {
        Error::SnapshotFailed {
            kind: BackendKind::SearchIndex,
            reason,
        }
    }

    fn restore_error(reason: String) -> Error {
        Error::RestoreFailed {
            kind: BackendKind::SearchIndex,
            reason,
        }
    }

    /// `failure` picks the error variant for the operation in flight, so a
    /// rejected `_bulk` surfaces as a restore failure and a rejected scroll
    /// as a snapshot failure.
    async fn expect_ok<F>(&self, response: reqwest::Response, action: &str, failure: F) -> Result<Value>
    where
        F: FnOnce(String) -> Error,
    {
        let status = response.status();
        let body: Value = response.json().await.map_err(|e| self.unreachable(e))?;
        if !status.is_success() {
            return Err(failure(format!("{} returned {}: {}", action, status, body)));
        }
        Ok(body)
    }

    async fn set_write_block(&self, blocked: bool) -> Result<()> {
        let url = self.url(&format!("/{}/_settings", self.config.index_pattern));
        let body = json!({ "index": { "blocks": { "write": blocked } } });
        let response = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        // 404 just means no index matches the pattern yet.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        self.expect_ok(response, "settings update", Self::restore_error)
            .await?;
        Ok(())
    }

    fn hit_line(hit: &Value) -> Option<String> {
        let line = json!({
            "_index": hit.get("_index")?,
            "_id": hit.get("_id")?,
            "_source": hit.get("_source")?,
        });
        Some(line.to_string())
    }

    async fn bulk_flush(&self, body: String) -> Result<()> {
        let response = self
            .client
            .post(self.url("/_bulk"))
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let value = self.expect_ok(response, "_bulk", Self::restore_error).await?;
        if value.get("errors").and_then(Value::as_bool) == Some(true) {
            return Err(Error::RestoreFailed {
                kind: BackendKind::SearchIndex,
                reason: "bulk indexing reported item errors".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BackendConnector for ElasticsearchConnector {
    fn kind(&self) -> BackendKind {
        BackendKind::SearchIndex
    }

    async fn snapshot(&self, dest_dir: &Path) -> Result<PathBuf> {
        let final_path = dest_dir.join(EXPORT_FILE);
        let tmp = tmp_path(&final_path);
        let mut file = tokio::fs::File::create(&tmp).await?;

        info!(pattern = %self.config.index_pattern, "exporting search index");

        let url = self.url(&format!(
            "/{}/_search?scroll=1m",
            self.config.index_pattern
        ));
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "size": self.config.page_size,
                "query": { "match_all": {} },
                "sort": ["_doc"],
            }))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let mut page = self
            .expect_ok(response, "scroll open", Self::snapshot_error)
            .await?;

        let mut exported = 0u64;
        // The server allocates the scroll context on the initial search
        // even when the first page is empty, so the id is captured up
        // front and always released below.
        let mut scroll_id = page
            .get("_scroll_id")
            .and_then(Value::as_str)
            .map(String::from);
        loop {
            let hits = page
                .pointer("/hits/hits")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if hits.is_empty() {
                break;
            }
            for hit in &hits {
                let line = Self::hit_line(hit).ok_or_else(|| Error::SnapshotFailed {
                    kind: BackendKind::SearchIndex,
                    reason: "scroll hit without _index/_id/_source".to_string(),
                })?;
                file.write_all(line.as_bytes()).await?;
                file.write_all(b"\n").await?;
                exported += 1;
            }

            let Some(id) = scroll_id.clone() else { break };
            let response = self
                .client
                .post(self.url("/_search/scroll"))
                .json(&json!({ "scroll": "1m", "scroll_id": id }))
                .send()
                .await
                .map_err(|e| self.unreachable(e))?;
            page = self
                .expect_ok(response, "scroll page", Self::snapshot_error)
                .await?;
            if let Some(next) = page.get("_scroll_id").and_then(Value::as_str) {
                scroll_id = Some(next.to_string());
            }
        }

        if let Some(id) = scroll_id {
            let _ = self
                .client
                .delete(self.url("/_search/scroll"))
                .json(&json!({ "scroll_id": id }))
                .send()
                .await;
        }

        file.flush().await?;
        drop(file);
        tokio::fs::rename(&tmp, &final_path).await?;
        debug!(documents = exported, "search export complete");
        Ok(final_path)
    }

    async fn restore(&self, artifact_path: &Path) -> Result<()> {
        info!(pattern = %self.config.index_pattern, "restoring search index");

        // Exclusive access: drop whatever currently matches the pattern.
        let response = self
            .client
            .delete(self.url(&format!("/{}", self.config.index_pattern)))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        if !response.status().is_success() && response.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(Error::RestoreFailed {
                kind: BackendKind::SearchIndex,
                reason: format!("index delete returned {}", response.status()),
            });
        }

        let file = tokio::fs::File::open(artifact_path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut batch = String::new();
        let mut batched = 0usize;

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let doc: Value = serde_json::from_str(&line).map_err(|e| Error::IncompatibleFormat {
                kind: BackendKind::SearchIndex,
                reason: format!("bad NDJSON line: {}", e),
            })?;
            let (Some(index), Some(id), Some(source)) =
                (doc.get("_index"), doc.get("_id"), doc.get("_source"))
            else {
                return Err(Error::IncompatibleFormat {
                    kind: BackendKind::SearchIndex,
                    reason: "line missing _index/_id/_source".to_string(),
                });
            };
            batch.push_str(&json!({ "index": { "_index": index, "_id": id } }).to_string());
            batch.push('\n');
            batch.push_str(&source.to_string());
            batch.push('\n');
            batched += 1;

            if batched >= self.config.page_size {
                self.bulk_flush(std::mem::take(&mut batch)).await?;
                batched = 0;
            }
        }
        if batched > 0 {
            self.bulk_flush(batch).await?;
        }
        Ok(())
    }

    async fn is_healthy(&self) -> bool {
        let request = self
            .client
            .get(self.url("/_cluster/health"))
            .timeout(self.health_timeout)
            .send();
        match request.await {
            Ok(response) => match response.json::<Value>().await {
                Ok(body) => matches!(
                    body.get("status").and_then(Value::as_str),
                    Some("green") | Some("yellow")
                ),
                Err(_) => false,
            },
            Err(_) => false,
        }
    }

    async fn quiesce(&self) -> Result<()> {
        self.set_write_block(true).await
    }

    async fn resume(&self) -> Result<()> {
        self.set_write_block(false).await
    }

    async fn smoke_test(&self, artifact_path: &Path) -> Result<()> {
        let file = tokio::fs::File::open(artifact_path).await?;
        let mut lines = BufReader::new(file).lines();
        match lines.next_line().await? {
            // An empty export is structurally valid (no documents matched).
            None => Ok(()),
            Some(first) => {
                let doc: Value =
                    serde_json::from_str(&first).map_err(|e| Error::IntegrityFailure {
                        item: artifact_path.display().to_string(),
                        reason: format!("first record unparseable: {}", e),
                    })?;
                if doc.get("_index").is_none() || doc.get("_source").is_none() {
                    return Err(Error::IntegrityFailure {
                        item: artifact_path.display().to_string(),
                        reason: "first record missing _index/_source".to_string(),
                    });
                }
                Ok(())
            }
        }
    }
}
