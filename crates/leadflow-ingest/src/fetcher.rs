//! Concurrent work-unit fetching
//!
//! Dispatches work units over a bounded video pool; reply expansion for
//! the comments discovered on a single page fans out over a smaller,
//! separately bounded reply pool. Each unit is isolated: a timed-out or
//! failed unit is recorded and excluded from the output without touching
//! its siblings. Top-level pages within one video remain strictly
//! sequential because each page token comes from the previous response.

use crate::error::{IngestError, Result};
use crate::retry::RetryExecutor;
use crate::youtube::CommentApi;
use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use leadflow_common::types::{FetchRecord, WorkUnit};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

// ============================================================================
// Fetcher Constants
// ============================================================================

/// Default size of the outer (video) worker pool.
pub const DEFAULT_VIDEO_WORKERS: usize = 4;

/// Default size of the inner (reply) worker pool.
pub const DEFAULT_REPLY_WORKERS: usize = 2;

/// Default timeout for a full video's comment fetch.
pub const DEFAULT_VIDEO_TIMEOUT_SECS: u64 = 120;

/// Default timeout for one parent comment's reply expansion.
pub const DEFAULT_REPLY_TIMEOUT_SECS: u64 = 30;

/// Worker-pool sizes and per-unit timeouts.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub video_workers: usize,
    pub reply_workers: usize,
    pub video_timeout: Duration,
    pub reply_timeout: Duration,
    /// Show a progress bar over work units.
    pub progress: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            video_workers: DEFAULT_VIDEO_WORKERS,
            reply_workers: DEFAULT_REPLY_WORKERS,
            video_timeout: Duration::from_secs(DEFAULT_VIDEO_TIMEOUT_SECS),
            reply_timeout: Duration::from_secs(DEFAULT_REPLY_TIMEOUT_SECS),
            progress: false,
        }
    }
}

impl FetcherConfig {
    /// The reply pool must stay strictly smaller than the video pool so a
    /// video worker waiting on its reply tasks can never starve the pool.
    pub fn validate(&self) -> Result<()> {
        if self.video_workers == 0 || self.reply_workers == 0 {
            return Err(IngestError::Config(
                "worker pool sizes must be at least 1".to_string(),
            ));
        }
        if self.reply_workers >= self.video_workers {
            return Err(IngestError::Config(format!(
                "reply pool ({}) must be strictly smaller than video pool ({})",
                self.reply_workers, self.video_workers
            )));
        }
        Ok(())
    }
}

/// Aggregate result of one fetch batch.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// All successfully fetched records, deduplicated by
    /// `(author, text, timestamp)`.
    pub records: Vec<FetchRecord>,
    /// Ids of units that failed or timed out.
    pub failed_units: Vec<String>,
}

impl FetchOutcome {
    pub fn failure_count(&self) -> usize {
        self.failed_units.len()
    }
}

/// Fetches work units over bounded worker pools with per-unit isolation.
pub struct ConcurrentFetcher {
    api: Arc<dyn CommentApi>,
    retry: Arc<RetryExecutor>,
    config: FetcherConfig,
}

impl ConcurrentFetcher {
    pub fn new(
        api: Arc<dyn CommentApi>,
        retry: Arc<RetryExecutor>,
        config: FetcherConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self { api, retry, config })
    }

    /// Enumerate the video work units of the configured playlists.
    ///
    /// Playlist pagination is strictly sequential per playlist; a failure
    /// here is a stage-level failure, not a unit-level one.
    pub async fn expand_playlists(&self, playlist_ids: &[String]) -> Result<Vec<WorkUnit>> {
        let mut units = Vec::new();

        for playlist_id in playlist_ids {
            let mut page_token: Option<String> = None;
            let mut found = 0usize;

            loop {
                let page = self
                    .retry
                    .execute("playlistItems.list", || {
                        self.api.playlist_page(playlist_id, page_token.as_deref())
                    })
                    .await?;

                found += page.video_ids.len();
                units.extend(
                    page.video_ids
                        .into_iter()
                        .map(|video_id| WorkUnit::Video { video_id }),
                );

                match page.next_page_token {
                    Some(token) => page_token = Some(token),
                    None => break,
                }
            }

            info!(playlist = %playlist_id, videos = found, "Playlist expanded");
        }

        Ok(units)
    }

    /// Fetch all units, absorbing per-unit failures into the outcome.
    pub async fn fetch_all(&self, units: Vec<WorkUnit>) -> FetchOutcome {
        let video_sem = Arc::new(Semaphore::new(self.config.video_workers));
        let reply_sem = Arc::new(Semaphore::new(self.config.reply_workers));
        let bar = self.config.progress.then(|| {
            let bar = ProgressBar::new(units.len() as u64);
            bar.set_message("fetching comments");
            bar
        });

        info!(
            units = units.len(),
            video_workers = self.config.video_workers,
            reply_workers = self.config.reply_workers,
            "Dispatching work units"
        );

        let mut tasks = JoinSet::new();
        for unit in units {
            let api = self.api.clone();
            let retry = self.retry.clone();
            let video_sem = video_sem.clone();
            let reply_sem = reply_sem.clone();
            let config = self.config.clone();

            tasks.spawn(async move {
                let _permit = video_sem
                    .acquire_owned()
                    .await
                    .expect("video pool semaphore closed");

                let timeout = match unit {
                    WorkUnit::Video { .. } => config.video_timeout,
                    WorkUnit::Replies { .. } => config.reply_timeout,
                };

                let result = match tokio::time::timeout(
                    timeout,
                    fetch_unit(api, retry, reply_sem, config.reply_timeout, unit.clone()),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(IngestError::Timeout {
                        timeout_secs: timeout.as_secs(),
                    }),
                };

                (unit, result)
            });
        }

        let mut records = Vec::new();
        let mut failed_units = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((unit, Ok(unit_records))) => {
                    debug!(unit = %unit, records = unit_records.len(), "Work unit finished");
                    records.extend(unit_records);
                },
                Ok((unit, Err(e))) => {
                    warn!(unit = %unit, error = %e, "Work unit failed");
                    failed_units.push(unit.id());
                },
                Err(e) => {
                    warn!(error = %e, "Worker task aborted");
                    failed_units.push("unknown".to_string());
                },
            }
            if let Some(bar) = &bar {
                bar.inc(1);
            }
        }

        if let Some(bar) = &bar {
            bar.finish_and_clear();
        }

        let before = records.len();
        let mut seen: HashSet<(String, String, DateTime<Utc>)> = HashSet::new();
        records.retain(|r| seen.insert((r.author.clone(), r.text.clone(), r.timestamp)));

        info!(
            records = records.len(),
            duplicates = before - records.len(),
            failed = failed_units.len(),
            "Fetch batch complete"
        );

        FetchOutcome {
            records,
            failed_units,
        }
    }
}

async fn fetch_unit(
    api: Arc<dyn CommentApi>,
    retry: Arc<RetryExecutor>,
    reply_sem: Arc<Semaphore>,
    reply_timeout: Duration,
    unit: WorkUnit,
) -> Result<Vec<FetchRecord>> {
    match unit {
        WorkUnit::Video { video_id } => {
            fetch_video(api, retry, reply_sem, reply_timeout, video_id).await
        },
        WorkUnit::Replies {
            parent_id,
            video_id,
        } => fetch_replies(&*api, &retry, &parent_id, &video_id).await,
    }
}

/// Fetch every top-level comment page of a video, expanding replies for
/// each page across the reply pool as the page is consumed.
async fn fetch_video(
    api: Arc<dyn CommentApi>,
    retry: Arc<RetryExecutor>,
    reply_sem: Arc<Semaphore>,
    reply_timeout: Duration,
    video_id: String,
) -> Result<Vec<FetchRecord>> {
    let mut records = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = retry
            .execute("commentThreads.list", || {
                api.comment_threads_page(&video_id, page_token.as_deref())
            })
            .await?;

        let mut reply_parents = Vec::new();
        for thread in page.threads {
            if thread.total_reply_count > 0 {
                reply_parents.push(thread.comment_id);
            }
            records.push(thread.record);
        }

        // Replies for different parents are independent, so they fan out;
        // a failed parent drops only its own replies.
        if !reply_parents.is_empty() {
            let mut tasks = JoinSet::new();
            for parent_id in reply_parents {
                let api = api.clone();
                let retry = retry.clone();
                let reply_sem = reply_sem.clone();
                let video_id = video_id.clone();

                tasks.spawn(async move {
                    let _permit = reply_sem
                        .acquire_owned()
                        .await
                        .expect("reply pool semaphore closed");

                    let result = match tokio::time::timeout(
                        reply_timeout,
                        fetch_replies(&*api, &retry, &parent_id, &video_id),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(IngestError::Timeout {
                            timeout_secs: reply_timeout.as_secs(),
                        }),
                    };

                    (parent_id, result)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((_, Ok(replies))) => records.extend(replies),
                    Ok((parent_id, Err(e))) => {
                        warn!(
                            parent = %parent_id,
                            video = %video_id,
                            error = %e,
                            "Reply expansion failed, dropping this parent's replies"
                        );
                    },
                    Err(e) => warn!(error = %e, "Reply task aborted"),
                }
            }
        }

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(records)
}

/// Fetch all reply pages under one parent comment.
async fn fetch_replies(
    api: &dyn CommentApi,
    retry: &RetryExecutor,
    parent_id: &str,
    video_id: &str,
) -> Result<Vec<FetchRecord>> {
    let mut records = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = retry
            .execute("comments.list", || {
                api.replies_page(parent_id, page_token.as_deref())
            })
            .await?;

        records.extend(page.records.into_iter().map(|mut record| {
            record.video_id = video_id.to_string();
            record
        }));

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    Ok(records)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::rate_limit::RateLimiter;
    use crate::retry::RetryPolicy;
    use crate::youtube::{PlaylistPage, RepliesPage, Thread, ThreadsPage};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn record(author: &str, text: &str, video_id: &str) -> FetchRecord {
        FetchRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            author: author.to_string(),
            video_id: video_id.to_string(),
            text: text.to_string(),
            last_modified: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            parent_id: None,
        }
    }

    fn thread(comment_id: &str, author: &str, text: &str, video_id: &str, replies: u32) -> Thread {
        Thread {
            comment_id: comment_id.to_string(),
            record: record(author, text, video_id),
            total_reply_count: replies,
        }
    }

    /// Scripted in-memory API: one threads page per video, one replies
    /// page per parent, with optional per-video delays and failures.
    #[derive(Default)]
    struct FakeApi {
        playlists: HashMap<(String, Option<String>), PlaylistPage>,
        threads: HashMap<String, ThreadsPage>,
        replies: HashMap<String, RepliesPage>,
        delays: HashMap<String, Duration>,
        fail_videos: HashSet<String>,
        fail_parents: HashSet<String>,
    }

    #[async_trait]
    impl CommentApi for FakeApi {
        async fn playlist_page(
            &self,
            playlist_id: &str,
            page_token: Option<&str>,
        ) -> Result<PlaylistPage> {
            let key = (playlist_id.to_string(), page_token.map(str::to_string));
            Ok(self.playlists.get(&key).cloned().unwrap_or_default())
        }

        async fn comment_threads_page(
            &self,
            video_id: &str,
            _page_token: Option<&str>,
        ) -> Result<ThreadsPage> {
            if let Some(delay) = self.delays.get(video_id) {
                tokio::time::sleep(*delay).await;
            }
            if self.fail_videos.contains(video_id) {
                return Err(IngestError::NonRetryable("bad video".to_string()));
            }
            Ok(self.threads.get(video_id).cloned().unwrap_or_default())
        }

        async fn replies_page(
            &self,
            parent_id: &str,
            _page_token: Option<&str>,
        ) -> Result<RepliesPage> {
            if self.fail_parents.contains(parent_id) {
                return Err(IngestError::NonRetryable("bad parent".to_string()));
            }
            Ok(self.replies.get(parent_id).cloned().unwrap_or_default())
        }
    }

    fn fetcher_with(api: FakeApi, config: FetcherConfig) -> ConcurrentFetcher {
        let retry = RetryExecutor::new(
            Arc::new(RateLimiter::new(Duration::from_millis(1))),
            RetryPolicy::new(0, Duration::from_millis(1)),
        );
        ConcurrentFetcher::new(Arc::new(api), Arc::new(retry), config).unwrap()
    }

    fn video_units(ids: &[&str]) -> Vec<WorkUnit> {
        ids.iter()
            .map(|id| WorkUnit::Video {
                video_id: id.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_config_rejects_inverted_pools() {
        let config = FetcherConfig {
            video_workers: 2,
            reply_workers: 2,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(IngestError::Config(_))));
        assert!(FetcherConfig::default().validate().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_triples_appear_exactly_once() {
        let mut api = FakeApi::default();
        // The same (author, text, timestamp) triple shows up under both units
        api.threads.insert(
            "vid1".to_string(),
            ThreadsPage {
                threads: vec![
                    thread("c1", "alice", "love it", "vid1", 0),
                    thread("c2", "bob", "how much?", "vid1", 0),
                ],
                next_page_token: None,
            },
        );
        api.threads.insert(
            "vid2".to_string(),
            ThreadsPage {
                threads: vec![thread("c3", "alice", "love it", "vid2", 0)],
                next_page_token: None,
            },
        );

        let fetcher = fetcher_with(api, FetcherConfig::default());
        let outcome = fetcher.fetch_all(video_units(&["vid1", "vid2"])).await;

        assert_eq!(outcome.failure_count(), 0);
        assert_eq!(outcome.records.len(), 2);
        let alices: Vec<_> = outcome
            .records
            .iter()
            .filter(|r| r.author == "alice")
            .collect();
        assert_eq!(alices.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_unit_does_not_abort_siblings() {
        let mut api = FakeApi::default();
        api.threads.insert(
            "good1".to_string(),
            ThreadsPage {
                threads: vec![thread("c1", "alice", "a", "good1", 0)],
                next_page_token: None,
            },
        );
        api.threads.insert(
            "good2".to_string(),
            ThreadsPage {
                threads: vec![thread("c2", "bob", "b", "good2", 0)],
                next_page_token: None,
            },
        );
        api.fail_videos.insert("bad".to_string());

        let fetcher = fetcher_with(api, FetcherConfig::default());
        let outcome = fetcher
            .fetch_all(video_units(&["good1", "bad", "good2"]))
            .await;

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.failed_units, vec!["video:bad".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_unit_is_recorded_and_excluded() {
        let mut api = FakeApi::default();
        for vid in ["vid1", "vid2"] {
            api.threads.insert(
                vid.to_string(),
                ThreadsPage {
                    threads: vec![thread("c", "u", vid, vid, 0)],
                    next_page_token: None,
                },
            );
        }
        api.threads.insert(
            "slow".to_string(),
            ThreadsPage {
                threads: vec![thread("c9", "snail", "late", "slow", 0)],
                next_page_token: None,
            },
        );
        api.delays
            .insert("slow".to_string(), Duration::from_secs(300));

        let config = FetcherConfig {
            video_workers: 2,
            reply_workers: 1,
            ..Default::default()
        };
        let fetcher = fetcher_with(api, config);
        let outcome = fetcher
            .fetch_all(video_units(&["vid1", "slow", "vid2"]))
            .await;

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.failure_count(), 1);
        assert_eq!(outcome.failed_units, vec!["video:slow".to_string()]);
        assert!(outcome.records.iter().all(|r| r.author != "snail"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_replies_are_expanded_with_parent_and_video() {
        let mut api = FakeApi::default();
        api.threads.insert(
            "vid1".to_string(),
            ThreadsPage {
                threads: vec![thread("c1", "alice", "top", "vid1", 2)],
                next_page_token: None,
            },
        );
        let mut reply = record("bob", "re: top", "");
        reply.parent_id = Some("c1".to_string());
        api.replies.insert(
            "c1".to_string(),
            RepliesPage {
                records: vec![reply],
                next_page_token: None,
            },
        );

        let fetcher = fetcher_with(api, FetcherConfig::default());
        let outcome = fetcher.fetch_all(video_units(&["vid1"])).await;

        assert_eq!(outcome.records.len(), 2);
        let reply = outcome.records.iter().find(|r| r.is_reply()).unwrap();
        assert_eq!(reply.parent_id.as_deref(), Some("c1"));
        assert_eq!(reply.video_id, "vid1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_failure_drops_only_that_parent() {
        let mut api = FakeApi::default();
        api.threads.insert(
            "vid1".to_string(),
            ThreadsPage {
                threads: vec![
                    thread("ok", "alice", "top a", "vid1", 1),
                    thread("broken", "bob", "top b", "vid1", 1),
                ],
                next_page_token: None,
            },
        );
        let mut reply = record("carol", "re: a", "");
        reply.parent_id = Some("ok".to_string());
        api.replies.insert(
            "ok".to_string(),
            RepliesPage {
                records: vec![reply],
                next_page_token: None,
            },
        );
        api.fail_parents.insert("broken".to_string());

        let fetcher = fetcher_with(api, FetcherConfig::default());
        let outcome = fetcher.fetch_all(video_units(&["vid1"])).await;

        // Both top-level comments plus the one fetchable reply; the unit
        // itself is not marked failed.
        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expand_playlists_follows_page_tokens() {
        let mut api = FakeApi::default();
        api.playlists.insert(
            ("pl1".to_string(), None),
            PlaylistPage {
                video_ids: vec!["vidA".to_string()],
                next_page_token: Some("t2".to_string()),
            },
        );
        api.playlists.insert(
            ("pl1".to_string(), Some("t2".to_string())),
            PlaylistPage {
                video_ids: vec!["vidB".to_string()],
                next_page_token: None,
            },
        );

        let fetcher = fetcher_with(api, FetcherConfig::default());
        let units = fetcher
            .expand_playlists(&["pl1".to_string()])
            .await
            .unwrap();

        assert_eq!(
            units,
            vec![
                WorkUnit::Video {
                    video_id: "vidA".to_string()
                },
                WorkUnit::Video {
                    video_id: "vidB".to_string()
                },
            ]
        );
    }
}
