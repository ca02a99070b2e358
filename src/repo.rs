use chrono::{DateTime, Utc};

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("storage error: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

use async_trait::async_trait;

#[async_trait]
pub trait PostRepo: Send + Sync {
    async fn get_post(&self, id: Id) -> RepoResult<Post>;
}

#[async_trait]
pub trait ThreadRepo: Send + Sync {
    async fn get_thread(&self, id: Id) -> RepoResult<Thread>;
    /// Overwrites the bump fields only; `last_posted_at` is left alone.
    async fn set_thread_bump(&self, id: Id, at: DateTime<Utc>, actor_id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait AuditLogRepo: Send + Sync {
    async fn append_audit_entry(&self, new: NewAuditEntry) -> RepoResult<AuditEntry>;
    /// Newest first.
    async fn list_audit_entries(&self, limit: i64) -> RepoResult<Vec<AuditEntry>>;
}

pub trait Repo: PostRepo + ThreadRepo + AuditLogRepo {}

impl<T> Repo for T where T: PostRepo + ThreadRepo + AuditLogRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
    use tracing::{info, warn};

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        threads: HashMap<Id, Thread>,
        posts: HashMap<Id, Post>,
        audit_log: Vec<AuditEntry>,
        next_audit_id: Id,
    }

    #[derive(Clone, Default)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Option<Arc<PathBuf>>,
    }

    impl InMemRepo {
        /// Purely in-memory; nothing is written to disk.
        pub fn new() -> Self {
            Self::default()
        }

        /// Loads `path` if it exists and rewrites it after every mutation.
        pub fn with_snapshot(path: impl Into<PathBuf>) -> Self {
            let path = path.into();
            let state = Self::load_state_from(&path);
            Self {
                state: Arc::new(RwLock::new(state)),
                snapshot_path: Some(Arc::new(path)),
            }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        info!(path = %path.display(), threads = s.threads.len(), posts = s.posts.len(), "loaded snapshot");
                        s
                    }
                    Err(e) => {
                        warn!(path = %path.display(), "failed to parse snapshot: {e}; starting empty");
                        State::default()
                    }
                },
                Err(e) => {
                    info!(path = %path.display(), "no snapshot ({e}); starting empty");
                    State::default()
                }
            }
        }

        fn persist(&self) {
            let Some(path) = self.snapshot_path.as_deref() else { return };
            let bytes = match self.read().map(|s| serde_json::to_vec_pretty(&*s)) {
                Ok(Ok(b)) => b,
                Ok(Err(e)) => { warn!("failed to encode snapshot: {e}"); return; }
                Err(e) => { warn!("failed to read state for snapshot: {e}"); return; }
            };
            if let Some(dir) = path.parent() {
                let _ = std::fs::create_dir_all(dir);
            }
            if let Err(e) = std::fs::write(path, bytes) {
                warn!(path = %path.display(), "failed to write snapshot: {e}");
            }
        }

        fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        /// Seeds a thread. Threads belong to the forum, so this sits outside the repo traits.
        pub fn insert_thread(&self, thread: Thread) -> RepoResult<()> {
            let mut s = self.write()?;
            if s.threads.contains_key(&thread.id) { return Err(RepoError::Conflict); }
            s.threads.insert(thread.id, thread);
            drop(s);                       // release lock before persisting
            self.persist();
            Ok(())
        }

        /// Seeds a post. The parent thread is not required to exist.
        pub fn insert_post(&self, post: Post) -> RepoResult<()> {
            let mut s = self.write()?;
            if s.posts.contains_key(&post.id) { return Err(RepoError::Conflict); }
            s.posts.insert(post.id, post);
            drop(s);
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl PostRepo for InMemRepo {
        async fn get_post(&self, id: Id) -> RepoResult<Post> {
            let s = self.read()?;
            s.posts.get(&id).cloned().ok_or(RepoError::NotFound)
        }
    }

    #[async_trait]
    impl ThreadRepo for InMemRepo {
        async fn get_thread(&self, id: Id) -> RepoResult<Thread> {
            let s = self.read()?;
            s.threads.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn set_thread_bump(&self, id: Id, at: DateTime<Utc>, actor_id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            let thread = s.threads.get_mut(&id).ok_or(RepoError::NotFound)?;
            thread.last_activity_at = at;
            thread.last_actor_id = actor_id;
            drop(s);
            self.persist();
            Ok(())
        }
    }

    #[async_trait]
    impl AuditLogRepo for InMemRepo {
        async fn append_audit_entry(&self, new: NewAuditEntry) -> RepoResult<AuditEntry> {
            let mut s = self.write()?;
            s.next_audit_id += 1;
            let entry = AuditEntry {
                id: s.next_audit_id,
                action: new.action,
                acting_user_id: new.acting_user_id,
                post_id: new.post_id,
                thread_id: new.thread_id,
                previous_value: new.previous_value,
                new_value: new.new_value,
                context: new.context,
                created_at: Utc::now(),
            };
            s.audit_log.push(entry.clone());
            drop(s);
            self.persist();
            Ok(entry)
        }

        async fn list_audit_entries(&self, limit: i64) -> RepoResult<Vec<AuditEntry>> {
            let s = self.read()?;
            let take = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
            Ok(s.audit_log.iter().rev().take(take).cloned().collect())
        }
    }
}

// Postgres implementation (feature = "postgres-store")
//
// Reads the forum's existing tables:
//   threads(id, slug, title, last_activity_at, last_actor_id, last_posted_at, created_at)
//   posts(id, thread_id, author_id, post_number, created_at)
// and owns `staff_action_logs`, created by `ensure_audit_table`.
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres};

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

        pub async fn ensure_audit_table(&self) -> RepoResult<()> {
            sqlx::query(r#"
                CREATE TABLE IF NOT EXISTS staff_action_logs (
                    id             BIGSERIAL PRIMARY KEY,
                    action         TEXT        NOT NULL,
                    acting_user_id BIGINT      NOT NULL,
                    post_id        BIGINT      NOT NULL,
                    thread_id      BIGINT      NOT NULL,
                    previous_value TIMESTAMPTZ NOT NULL,
                    new_value      TIMESTAMPTZ NOT NULL,
                    context        TEXT        NOT NULL,
                    created_at     TIMESTAMPTZ NOT NULL DEFAULT now()
                )
            "#)
                .execute(&self.pool).await.map_err(map_sqlx)?;
            Ok(())
        }
    }

    fn map_sqlx(e: sqlx::Error) -> RepoError {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Conflict,
            other => RepoError::Internal(other.to_string()),
        }
    }

    #[derive(sqlx::FromRow)]
    struct AuditRow {
        id: Id,
        action: String,
        acting_user_id: Id,
        post_id: Id,
        thread_id: Id,
        previous_value: DateTime<Utc>,
        new_value: DateTime<Utc>,
        context: String,
        created_at: DateTime<Utc>,
    }

    impl TryFrom<AuditRow> for AuditEntry {
        type Error = RepoError;

        fn try_from(r: AuditRow) -> Result<Self, Self::Error> {
            Ok(AuditEntry {
                id: r.id,
                action: r.action.parse().map_err(RepoError::Internal)?,
                acting_user_id: r.acting_user_id,
                post_id: r.post_id,
                thread_id: r.thread_id,
                previous_value: r.previous_value,
                new_value: r.new_value,
                context: r.context,
                created_at: r.created_at,
            })
        }
    }

    const AUDIT_COLUMNS: &str =
        "id, action, acting_user_id, post_id, thread_id, previous_value, new_value, context, created_at";

    #[async_trait]
    impl PostRepo for PgRepo {
        async fn get_post(&self, id: Id) -> RepoResult<Post> {
            sqlx::query_as::<_, Post>("SELECT id, thread_id, author_id, post_number, created_at FROM posts WHERE id = $1")
                .bind(id)
                .fetch_one(&self.pool).await.map_err(map_sqlx)
        }
    }

    #[async_trait]
    impl ThreadRepo for PgRepo {
        async fn get_thread(&self, id: Id) -> RepoResult<Thread> {
            sqlx::query_as::<_, Thread>(r#"
                SELECT id, slug, title, last_activity_at, last_actor_id, last_posted_at, created_at
                FROM threads WHERE id = $1
            "#)
                .bind(id)
                .fetch_one(&self.pool).await.map_err(map_sqlx)
        }

        async fn set_thread_bump(&self, id: Id, at: DateTime<Utc>, actor_id: Id) -> RepoResult<()> {
            let res = sqlx::query("UPDATE threads SET last_activity_at = $2, last_actor_id = $3 WHERE id = $1")
                .bind(id)
                .bind(at)
                .bind(actor_id)
                .execute(&self.pool).await.map_err(map_sqlx)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
    }

    #[async_trait]
    impl AuditLogRepo for PgRepo {
        async fn append_audit_entry(&self, new: NewAuditEntry) -> RepoResult<AuditEntry> {
            let row = sqlx::query_as::<_, AuditRow>(&format!(
                "INSERT INTO staff_action_logs (action, acting_user_id, post_id, thread_id, previous_value, new_value, context) \
                 VALUES ($1,$2,$3,$4,$5,$6,$7) RETURNING {AUDIT_COLUMNS}"
            ))
                .bind(new.action.as_str())
                .bind(new.acting_user_id)
                .bind(new.post_id)
                .bind(new.thread_id)
                .bind(new.previous_value)
                .bind(new.new_value)
                .bind(&new.context)
                .fetch_one(&self.pool).await.map_err(map_sqlx)?;
            row.try_into()
        }

        async fn list_audit_entries(&self, limit: i64) -> RepoResult<Vec<AuditEntry>> {
            let rows = sqlx::query_as::<_, AuditRow>(&format!(
                "SELECT {AUDIT_COLUMNS} FROM staff_action_logs ORDER BY id DESC LIMIT $1"
            ))
                .bind(limit)
                .fetch_all(&self.pool).await.map_err(map_sqlx)?;
            rows.into_iter().map(AuditEntry::try_from).collect()
        }
    }
}
