//! Consumer client: poll a wireq over HTTP and store every entry on disk.
//!
//! In `get` mode an entry's receipt is redeemed only once the entry is
//! safely written, so a failed write means the entry is delivered again
//! after its lease runs out. `dequeue` mode trades that guarantee for one
//! round trip per poll.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::ValueEnum;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use wireq_core::domain::RECEIPT_FIELD;

use crate::demo::scaled;

/// Pause used when a response carries no retry-after header.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(120);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// How entries are taken off the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Lease with `GET /entries.json`, delete after storing
    Get,
    /// Destructive `POST /dequeue-entries.json`
    Dequeue,
}

/// What a single poll did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    pub served: usize,
    pub written: usize,
    pub deleted: usize,
    pub rejected_deletes: usize,
    pub failed_writes: usize,
    pub missing_receipts: usize,
    pub throttled: bool,
    pub retry_after: Duration,
}

/// Totals over a `run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub polls: usize,
    pub throttled: usize,
    pub written: usize,
    pub deleted: usize,
    pub rejected_deletes: usize,
    pub failed_writes: usize,
    pub missing_receipts: usize,
}

impl RunSummary {
    fn absorb(&mut self, poll: &PollReport) {
        self.polls += 1;
        self.throttled += usize::from(poll.throttled);
        self.written += poll.written;
        self.deleted += poll.deleted;
        self.rejected_deletes += poll.rejected_deletes;
        self.failed_writes += poll.failed_writes;
        self.missing_receipts += poll.missing_receipts;
    }
}

#[derive(Deserialize)]
struct Entries {
    #[serde(default)]
    entries: Vec<Value>,
}

pub struct Receiver {
    client: Client,
    base_url: String,
    mode: Mode,
    out_dir: PathBuf,
}

impl Receiver {
    pub fn new(base_url: &str, mode: Mode, out_dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            mode,
            out_dir: out_dir.into(),
        })
    }

    /// Poll until a served poll comes back empty (`until_drained`) or
    /// forever, sleeping for each scaled retry-after hint in between.
    pub async fn run(&self, until_drained: bool, time_scale: f64) -> anyhow::Result<RunSummary> {
        let mut summary = RunSummary::default();
        loop {
            let poll = self.receive_once().await?;
            summary.absorb(&poll);
            if until_drained && !poll.throttled && poll.served == 0 {
                return Ok(summary);
            }

            let pause = scaled(poll.retry_after, time_scale);
            info!(waiting_ms = pause.as_millis() as u64, "pacing");
            tokio::time::sleep(pause).await;
        }
    }

    pub async fn receive_once(&self) -> anyhow::Result<PollReport> {
        let request = match self.mode {
            Mode::Get => self.client.get(format!("{}/entries.json", self.base_url)),
            Mode::Dequeue => self
                .client
                .post(format!("{}/dequeue-entries.json", self.base_url)),
        };
        let response = request.send().await.context("poll failed")?;
        let retry_after = retry_after(response.headers()).unwrap_or(DEFAULT_POLL_INTERVAL);

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            warn!(retry_after = retry_after.as_secs(), "throttled");
            return Ok(PollReport {
                throttled: true,
                retry_after,
                ..PollReport::default()
            });
        }
        let Entries { entries } = response
            .error_for_status()
            .context("poll rejected")?
            .json()
            .await
            .context("malformed poll response")?;

        let mut report = PollReport {
            served: entries.len(),
            retry_after,
            ..PollReport::default()
        };
        for mut entry in entries {
            let receipt = take_receipt(&mut entry);
            match write_article(&self.out_dir, &entry).await {
                Ok(path) => {
                    report.written += 1;
                    debug!(path = %path.display(), "stored");
                }
                Err(err) => {
                    report.failed_writes += 1;
                    warn!(%err, mode = ?self.mode, "unable to store entry");
                    continue;
                }
            }
            if self.mode == Mode::Dequeue {
                continue;
            }
            let Some(receipt) = receipt else {
                report.missing_receipts += 1;
                warn!("entry carried no receipt");
                continue;
            };
            if self.delete(&receipt).await? {
                report.deleted += 1;
            } else {
                report.rejected_deletes += 1;
            }
        }

        info!(
            served = report.served,
            written = report.written,
            deleted = report.deleted,
            retry_after = retry_after.as_secs(),
            "polled"
        );
        Ok(report)
    }

    /// `true` once the receipt is redeemed; `false` when the queue no longer
    /// knows it (404, 410).
    async fn delete(&self, receipt: &str) -> anyhow::Result<bool> {
        let response = self
            .client
            .delete(format!("{}/entry/{receipt}", self.base_url))
            .send()
            .await
            .context("delete failed")?;
        match response.status() {
            status if status.is_success() => Ok(true),
            status @ (StatusCode::NOT_FOUND | StatusCode::GONE) => {
                warn!(%receipt, %status, "delete rejected");
                Ok(false)
            }
            status => bail!("delete of {receipt} answered {status}"),
        }
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(secs))
}

fn take_receipt(entry: &mut Value) -> Option<String> {
    match entry.as_object_mut()?.remove(RECEIPT_FIELD)? {
        Value::String(receipt) => Some(receipt),
        _ => None,
    }
}

/// `<version_created>-<urn>-<sha256 of body>.json`.
pub fn article_file_name(article: &Value, body: &[u8]) -> String {
    let field = |key: &str| {
        article
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .replace('/', "_")
    };
    let digest = hex::encode(Sha256::digest(body));
    format!("{}-{}-{digest}.json", field("version_created"), field("urn"))
}

/// Write `article` as pretty JSON under `dir`, creating it if needed.
pub async fn write_article(dir: &Path, article: &Value) -> std::io::Result<PathBuf> {
    let body = serde_json::to_vec_pretty(article)?;
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(article_file_name(article, &body));
    tokio::fs::write(&path, &body).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::generate_articles;
    use crate::http::{AppState, create_router};
    use chrono::Utc;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rstest::rstest;
    use serde_json::json;
    use std::sync::Arc;
    use wireq_core::{QueueConfig, QueueEngine};

    fn engine(max_items: usize, max_ops: usize) -> AppState {
        Arc::new(QueueEngine::new(
            QueueConfig::builder()
                .max_items_returned(max_items)
                .retry_after_drained(Duration::from_secs(100))
                .retry_after_more_data(Duration::from_secs(10))
                .retry_after_throttled(Duration::from_secs(360))
                .max_ops_per_minute(max_ops)
                .build()
                .unwrap(),
        ))
    }

    /// Serve the real router on an ephemeral port; returns its base URL.
    async fn serve(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn stored(dir: &Path) -> Vec<Value> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect();
        files.sort();
        files
            .iter()
            .map(|path| serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn get_mode_stores_then_deletes() {
        let state = engine(10, 1_000);
        let articles = generate_articles(3, Utc::now(), &mut StdRng::seed_from_u64(7));
        state.enqueue(articles.clone());
        let out = tempfile::tempdir().unwrap();

        let receiver = Receiver::new(&serve(state.clone()).await, Mode::Get, out.path()).unwrap();
        let report = receiver.receive_once().await.unwrap();

        assert_eq!(report.served, 3);
        assert_eq!(report.written, 3);
        assert_eq!(report.deleted, 3);
        assert_eq!(report.retry_after, Duration::from_secs(100));
        assert!(state.is_empty());
        assert_eq!(state.stats().deleted_receipts, 3);

        let files = stored(out.path());
        assert_eq!(files.len(), 3);
        for article in &articles {
            assert!(files.contains(article));
        }
        assert!(files.iter().all(|file| file.get(RECEIPT_FIELD).is_none()));
    }

    #[tokio::test]
    async fn dequeue_mode_stores_without_deleting() {
        let state = engine(10, 1_000);
        state.enqueue(vec![json!({"urn": "urn:1"}), json!({"urn": "urn:2"})]);
        let out = tempfile::tempdir().unwrap();

        let receiver = Receiver::new(&serve(state.clone()).await, Mode::Dequeue, out.path()).unwrap();
        let report = receiver.receive_once().await.unwrap();

        assert_eq!(report.written, 2);
        assert_eq!(report.deleted, 0);
        assert!(state.is_empty());
        assert_eq!(state.stats().deleted_receipts, 0);
        assert_eq!(stored(out.path()).len(), 2);
    }

    #[tokio::test]
    async fn failed_write_leaves_the_receipt_unredeemed() {
        let state = engine(10, 1_000);
        state.enqueue(vec![json!({"urn": "urn:1"})]);
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, b"not a directory").unwrap();

        let receiver = Receiver::new(&serve(state.clone()).await, Mode::Get, &blocked).unwrap();
        let report = receiver.receive_once().await.unwrap();

        assert_eq!(report.failed_writes, 1);
        assert_eq!(report.deleted, 0);
        let stats = state.stats();
        assert_eq!(stats.leased, 1);
        assert_eq!(stats.deleted_receipts, 0);
    }

    #[tokio::test]
    async fn throttled_poll_honors_the_long_hint() {
        let state = engine(1, 1);
        state.enqueue(vec![json!({"urn": "urn:1"}), json!({"urn": "urn:2"})]);
        let out = tempfile::tempdir().unwrap();
        let receiver = Receiver::new(&serve(state.clone()).await, Mode::Dequeue, out.path()).unwrap();

        let first = receiver.receive_once().await.unwrap();
        assert_eq!(first.written, 1);
        assert_eq!(first.retry_after, Duration::from_secs(10));

        let second = receiver.receive_once().await.unwrap();
        assert!(second.throttled);
        assert_eq!(second.served, 0);
        assert_eq!(second.retry_after, Duration::from_secs(360));
        assert_eq!(state.len(), 1);
    }

    #[tokio::test]
    async fn run_until_drained_collects_everything() {
        let state = engine(2, 1_000);
        let articles = generate_articles(5, Utc::now(), &mut StdRng::seed_from_u64(11));
        state.enqueue(articles);
        let out = tempfile::tempdir().unwrap();

        let receiver = Receiver::new(&serve(state.clone()).await, Mode::Get, out.path()).unwrap();
        let summary = receiver.run(true, 0.0).await.unwrap();

        assert_eq!(summary.polls, 4);
        assert_eq!(summary.written, 5);
        assert_eq!(summary.deleted, 5);
        assert_eq!(summary.throttled, 0);
        assert!(state.is_empty());
        assert_eq!(stored(out.path()).len(), 5);
    }

    #[tokio::test]
    async fn unreachable_queue_is_an_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let out = tempfile::tempdir().unwrap();

        let receiver = Receiver::new(&format!("http://{addr}"), Mode::Get, out.path()).unwrap();
        assert!(receiver.receive_once().await.is_err());
    }

    #[rstest]
    #[case(json!({"urn": "urn:newsml:dpa.com:1", "version_created": "2024-01-01T00:00:00Z"}), "2024-01-01T00:00:00Z-urn:newsml:dpa.com:1-")]
    #[case(json!({"urn": "urn:a/b"}), "unknown-urn:a_b-")]
    #[case(json!([1, 2]), "unknown-unknown-")]
    fn file_names_carry_version_urn_and_digest(#[case] article: Value, #[case] prefix: &str) {
        let body = serde_json::to_vec_pretty(&article).unwrap();
        let name = article_file_name(&article, &body);

        assert!(name.starts_with(prefix), "{name}");
        let digest = name
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_suffix(".json"))
            .unwrap();
        assert_eq!(digest.len(), 64);
        assert_eq!(name, article_file_name(&article, &body));
    }

    #[test]
    fn receipt_is_taken_off_objects_only() {
        let mut entry = json!({"urn": "urn:1", RECEIPT_FIELD: "rcpt-x"});
        assert_eq!(take_receipt(&mut entry), Some("rcpt-x".to_string()));
        assert_eq!(entry, json!({"urn": "urn:1"}));

        let mut scalar = json!(42);
        assert_eq!(take_receipt(&mut scalar), None);
    }
}
