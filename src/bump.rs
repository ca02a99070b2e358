//! Resetting a thread's bump time to the creation time of one of its posts.
//!
//! The thread update and the audit append are separate repository calls. A failed
//! append is logged and the reset still counts as done.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::models::{AuditAction, Id, NewAuditEntry, Post, Thread, UserIdentity};
use crate::repo::{Repo, RepoError};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum BumpError {
    #[error("reset bump is disabled")]
    Disabled,
    #[error("param is missing or the value is empty: post_id")]
    MissingParameter,
    #[error("post_id must be a positive integer, got '{0}'")]
    InvalidParameter(String),
    #[error("post {0} not found")]
    PostNotFound(Id),
    #[error("thread {thread_id} for post {post_id} not found")]
    ThreadNotFound { post_id: Id, thread_id: Id },
    #[error("failed to update thread {thread_id}")]
    UpdateFailed { thread_id: Id },
    /// A lookup failed for a reason other than a missing row.
    #[error("internal error")]
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpOutcome {
    pub thread_id: Id,
    pub previous_value: DateTime<Utc>,
    pub new_value: DateTime<Utc>,
    /// False when the thread was updated but the audit append failed.
    pub audited: bool,
}

#[derive(Clone)]
pub struct BumpResetOperation {
    repo: Arc<dyn Repo>,
    enabled: bool,
}

impl BumpResetOperation {
    pub fn new(repo: Arc<dyn Repo>, enabled: bool) -> Self {
        Self { repo, enabled }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub async fn execute(
        &self,
        raw_post_id: Option<&str>,
        acting_user: &UserIdentity,
    ) -> Result<BumpOutcome, BumpError> {
        if !self.enabled {
            return Err(BumpError::Disabled);
        }
        let post_id = parse_post_id(raw_post_id)?;

        let post = self.repo.get_post(post_id).await.map_err(|e| match e {
            RepoError::NotFound => BumpError::PostNotFound(post_id),
            other => {
                error!(post_id, "post lookup failed: {other}");
                BumpError::Storage
            }
        })?;
        let thread = self.repo.get_thread(post.thread_id).await.map_err(|e| match e {
            RepoError::NotFound => BumpError::ThreadNotFound { post_id, thread_id: post.thread_id },
            other => {
                error!(post_id, thread_id = post.thread_id, "thread lookup failed: {other}");
                BumpError::Storage
            }
        })?;

        let previous_value = thread.last_activity_at;
        self.repo
            .set_thread_bump(thread.id, post.created_at, post.author_id)
            .await
            .map_err(|e| {
                error!(thread_id = thread.id, post_id, "thread bump update failed: {e}");
                BumpError::UpdateFailed { thread_id: thread.id }
            })?;

        info!(
            thread_id = thread.id,
            post_id,
            actor = acting_user.id,
            last_actor = post.author_id,
            previous = %previous_value,
            bumped_to = %post.created_at,
            "reset thread bump"
        );

        let entry = NewAuditEntry {
            action: AuditAction::ResetPostBump,
            acting_user_id: acting_user.id,
            post_id,
            thread_id: thread.id,
            previous_value,
            new_value: post.created_at,
            context: context_path(&thread, &post),
        };
        let audited = match self.repo.append_audit_entry(entry).await {
            Ok(_) => true,
            Err(e) => {
                error!(thread_id = thread.id, post_id, actor = acting_user.id, "audit append failed after bump reset: {e}");
                false
            }
        };

        Ok(BumpOutcome {
            thread_id: thread.id,
            previous_value,
            new_value: post.created_at,
            audited,
        })
    }
}

/// Blank counts as missing; anything that isn't a positive `i64` is invalid.
pub fn parse_post_id(raw: Option<&str>) -> Result<Id, BumpError> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty()).ok_or(BumpError::MissingParameter)?;
    match raw.parse::<Id>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(BumpError::InvalidParameter(raw.to_string())),
    }
}

/// `/t/{slug}/{thread id}/{post number}`
pub fn context_path(thread: &Thread, post: &Post) -> String {
    format!("/t/{}/{}/{}", thread.slug, thread.id, post.post_number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positive_ids() {
        assert_eq!(parse_post_id(Some("42")), Ok(42));
        assert_eq!(parse_post_id(Some(" 7 ")), Ok(7));
    }

    #[test]
    fn missing_and_blank_ids() {
        assert_eq!(parse_post_id(None), Err(BumpError::MissingParameter));
        assert_eq!(parse_post_id(Some("")), Err(BumpError::MissingParameter));
        assert_eq!(parse_post_id(Some("   ")), Err(BumpError::MissingParameter));
    }

    #[test]
    fn invalid_ids() {
        for raw in ["0", "-1", "abc", "4.2", "42abc", "99999999999999999999"] {
            assert_eq!(
                parse_post_id(Some(raw)),
                Err(BumpError::InvalidParameter(raw.to_string())),
                "{raw}"
            );
        }
    }

    #[test]
    fn builds_context_path() {
        let now = Utc::now();
        let thread = Thread {
            id: 5,
            slug: "demo".into(),
            title: "Demo".into(),
            last_activity_at: now,
            last_actor_id: 1,
            last_posted_at: now,
            created_at: now,
        };
        let post = Post { id: 42, thread_id: 5, author_id: 2, post_number: 3, created_at: now };
        assert_eq!(context_path(&thread, &post), "/t/demo/5/3");
    }
}
