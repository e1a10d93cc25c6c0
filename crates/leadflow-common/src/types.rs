//! Core domain types shared across the workspace

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One independently fetchable entity.
///
/// Immutable once created and consumed exactly once by a worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkUnit {
    /// All top-level comment pages of a single video.
    Video { video_id: String },
    /// Reply expansion for one top-level comment.
    Replies {
        parent_id: String,
        video_id: String,
    },
}

impl WorkUnit {
    /// Stable identifier used in failure lists and logs.
    pub fn id(&self) -> String {
        match self {
            WorkUnit::Video { video_id } => format!("video:{}", video_id),
            WorkUnit::Replies { parent_id, .. } => format!("replies:{}", parent_id),
        }
    }

    pub fn video_id(&self) -> &str {
        match self {
            WorkUnit::Video { video_id } => video_id,
            WorkUnit::Replies { video_id, .. } => video_id,
        }
    }
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// One fetched comment or reply.
///
/// Produced only by successful API responses and never mutated after
/// creation. Serialized field names match the CSV artifact columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchRecord {
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Username")]
    pub author: String,
    #[serde(rename = "VideoID")]
    pub video_id: String,
    #[serde(rename = "Comment")]
    pub text: String,
    #[serde(rename = "Date")]
    pub last_modified: DateTime<Utc>,
    /// Absent for top-level comments, present for replies.
    #[serde(rename = "ParentID")]
    pub parent_id: Option<String>,
}

impl FetchRecord {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }

    /// Key used to deduplicate records before persistence.
    pub fn dedup_key(&self) -> (&str, &str, DateTime<Utc>) {
        (&self.author, &self.text, self.timestamp)
    }
}

/// Lifecycle of a pipeline stage within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl StageStatus {
    pub fn as_str(&self) -> &str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Succeeded => "succeeded",
            StageStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal state of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every critical stage succeeded.
    Completed,
    /// A critical stage failed and the run halted.
    Aborted,
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Aborted => "aborted",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Completed => 0,
            RunStatus::Aborted => 1,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Row counts per artifact, re-derived after every stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunMetrics {
    counts: BTreeMap<String, usize>,
}

impl RunMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, artifact: impl Into<String>, rows: usize) {
        self.counts.insert(artifact.into(), rows);
    }

    pub fn get(&self, artifact: &str) -> Option<usize> {
        self.counts.get(artifact).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(author: &str, text: &str) -> FetchRecord {
        FetchRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            author: author.to_string(),
            video_id: "vid1".to_string(),
            text: text.to_string(),
            last_modified: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            parent_id: None,
        }
    }

    #[test]
    fn test_work_unit_ids() {
        let video = WorkUnit::Video {
            video_id: "abc".to_string(),
        };
        let replies = WorkUnit::Replies {
            parent_id: "c9".to_string(),
            video_id: "abc".to_string(),
        };
        assert_eq!(video.id(), "video:abc");
        assert_eq!(replies.id(), "replies:c9");
        assert_eq!(replies.video_id(), "abc");
    }

    #[test]
    fn test_dedup_key_matches_identical_triples() {
        let a = record("alice", "love this ev");
        let b = record("alice", "love this ev");
        let c = record("bob", "love this ev");
        assert_eq!(a.dedup_key(), b.dedup_key());
        assert_ne!(a.dedup_key(), c.dedup_key());
    }

    #[test]
    fn test_fetch_record_csv_column_names() {
        let json = serde_json::to_value(record("alice", "hi")).unwrap();
        let obj = json.as_object().unwrap();
        for col in ["Timestamp", "Username", "VideoID", "Comment", "Date", "ParentID"] {
            assert!(obj.contains_key(col), "missing column {}", col);
        }
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(StageStatus::Succeeded.as_str(), "succeeded");
        assert_eq!(RunStatus::Completed.exit_code(), 0);
        assert_eq!(RunStatus::Aborted.exit_code(), 1);
    }

    #[test]
    fn test_metrics_record_and_get() {
        let mut metrics = RunMetrics::new();
        metrics.record("comments_data.csv", 42);
        metrics.record("comments_data.csv", 50);
        assert_eq!(metrics.get("comments_data.csv"), Some(50));
        assert_eq!(metrics.get("unknown.csv"), None);
    }
}
