//! Post and post type domain models.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type PostId = Uuid;
pub type TypeId = Uuid;

/// Category a post belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostType {
    pub id: TypeId,
    pub name: String,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub deleted_at: Option<i64>,
}

/// Board post. Timestamps are absent on upsert responses, which are built
/// from the request rather than re-read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub type_id: TypeId,
    pub slug: String,
    pub title: String,
    pub body: String,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub deleted_at: Option<i64>,
    pub blocked_at: Option<i64>,
}
