use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// Forum ids are Postgres BIGSERIAL
pub type Id = i64;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Thread {
    pub id: Id,
    pub slug: String,
    pub title: String,
    /// Sort key for activity-ordered listings ("bump time").
    pub last_activity_at: DateTime<Utc>,
    pub last_actor_id: Id,
    /// Time of the newest post; a reset never moves this.
    pub last_posted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, sqlx::FromRow)]
pub struct Post {
    pub id: Id,
    pub thread_id: Id,
    pub author_id: Id,
    /// Position within the thread, starting at 1 for the opening post.
    pub post_number: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ResetPostBump,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::ResetPostBump => "reset_post_bump",
        }
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reset_post_bump" => Ok(AuditAction::ResetPostBump),
            other => Err(format!("unknown audit action '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEntry {
    pub id: Id,
    pub action: AuditAction,
    pub acting_user_id: Id,
    pub post_id: Id,
    pub thread_id: Id,
    pub previous_value: DateTime<Utc>,
    pub new_value: DateTime<Utc>,
    /// Browsable path to the post, e.g. `/t/demo/5/3`.
    pub context: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub action: AuditAction,
    pub acting_user_id: Id,
    pub post_id: Id,
    pub thread_id: Id,
    pub previous_value: DateTime<Utc>,
    pub new_value: DateTime<Utc>,
    pub context: String,
}

/// The authenticated caller, as established by the staff guard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: Id,
    pub username: String,
}
