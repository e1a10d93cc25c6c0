//! Wire types for the YouTube Data API v3 and their page-level views
//!
//! The `*Response` structs mirror the provider's JSON. The `*Page` structs
//! are what the rest of the crate consumes; the client converts between
//! the two so callers never see provider JSON shapes.

use chrono::{DateTime, Utc};
use leadflow_common::types::FetchRecord;
use serde::Deserialize;

// ============================================================================
// Page-level views (consumed by the fetcher)
// ============================================================================

/// One page of video ids from a playlist.
#[derive(Debug, Clone, Default)]
pub struct PlaylistPage {
    pub video_ids: Vec<String>,
    pub next_page_token: Option<String>,
}

/// A top-level comment thread on one page.
#[derive(Debug, Clone)]
pub struct Thread {
    /// Id of the top-level comment, used as the reply parent.
    pub comment_id: String,
    pub record: FetchRecord,
    pub total_reply_count: u32,
}

/// One page of top-level comment threads for a video.
#[derive(Debug, Clone, Default)]
pub struct ThreadsPage {
    pub threads: Vec<Thread>,
    pub next_page_token: Option<String>,
}

/// One page of replies under a parent comment.
#[derive(Debug, Clone, Default)]
pub struct RepliesPage {
    pub records: Vec<FetchRecord>,
    pub next_page_token: Option<String>,
}

// ============================================================================
// Provider JSON
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct PlaylistItemsResponse {
    #[serde(default)]
    pub items: Vec<PlaylistItem>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlaylistItem {
    #[serde(rename = "contentDetails")]
    pub content_details: PlaylistContentDetails,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PlaylistContentDetails {
    #[serde(rename = "videoId")]
    pub video_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommentThreadsResponse {
    #[serde(default)]
    pub items: Vec<CommentThread>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommentThread {
    pub snippet: CommentThreadSnippet,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommentThreadSnippet {
    #[serde(rename = "topLevelComment")]
    pub top_level_comment: Comment,
    #[serde(rename = "totalReplyCount", default)]
    pub total_reply_count: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommentsResponse {
    #[serde(default)]
    pub items: Vec<Comment>,
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Comment {
    pub id: String,
    pub snippet: CommentSnippet,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommentSnippet {
    #[serde(rename = "publishedAt")]
    pub published_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "authorDisplayName")]
    pub author_display_name: String,
    #[serde(rename = "textDisplay")]
    pub text_display: String,
}

impl CommentSnippet {
    /// Build a record; `updatedAt` falls back to `publishedAt` when absent.
    pub(crate) fn into_record(self, video_id: &str, parent_id: Option<String>) -> FetchRecord {
        FetchRecord {
            timestamp: self.published_at,
            author: self.author_display_name,
            video_id: video_id.to_string(),
            text: self.text_display,
            last_modified: self.updated_at.unwrap_or(self.published_at),
            parent_id,
        }
    }
}
