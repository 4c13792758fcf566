//! Post and post type repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Upsert post types and posts keyed by id.
//! - Page over posts filtered by keywords.
//! - Hard-delete posts.
//!
//! # Invariants
//! - Upsert responses are built from the request and the resolved id; no
//!   re-read happens, so server-side timestamps are absent on them.
//! - Keyword patterns are bound arguments, never part of the SQL text.

use crate::config::PageLimits;
use crate::identity::IdentityProvider;
use crate::model::page::Page;
use crate::model::post::{Post, PostType};
use crate::repo::{
    count_matching, ensure_schema_ready, parse_uuid_column, read_snapshot, RepoError, RepoResult,
};
use crate::sql::builder::{like_contains, FilterClause};
use log::info;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const POST_SELECT_SQL: &str = "SELECT
    post_id,
    type_id,
    slug,
    title,
    body,
    created_at,
    updated_at,
    deleted_at,
    blocked_at
FROM posts";

/// Request to create or update one post type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddTypeRequest {
    pub name: String,
}

/// Request to create or update one post.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddPostRequest {
    pub type_id: String,
    pub slug: String,
    pub title: String,
    pub body: String,
}

/// Keyword search over post title and body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindPostsQuery {
    /// Every keyword must appear in the title or the body. Blank entries are
    /// ignored; no keywords means no filter.
    pub keywords: Vec<String>,
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub lapse: u32,
}

/// Repository interface for posts and their types.
pub trait PostRepository {
    fn upsert_type(&self, supplied_id: &str, request: &AddTypeRequest) -> RepoResult<PostType>;
    fn upsert_post(&self, supplied_id: &str, request: &AddPostRequest) -> RepoResult<Post>;
    fn find_posts(&self, query: &FindPostsQuery) -> RepoResult<Page<Post>>;
    /// Removes the post row.
    fn delete_post(&self, post_id: &str) -> RepoResult<()>;
}

/// SQLite-backed post repository.
pub struct SqlitePostRepository<'conn> {
    conn: &'conn Connection,
    identity: IdentityProvider,
    limits: PageLimits,
}

impl<'conn> SqlitePostRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_schema_ready(conn)?;
        Ok(Self {
            conn,
            identity: IdentityProvider::new(),
            limits: PageLimits::default(),
        })
    }

    pub fn with_identity(mut self, identity: IdentityProvider) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_page_limits(mut self, limits: PageLimits) -> Self {
        self.limits = limits;
        self
    }
}

impl PostRepository for SqlitePostRepository<'_> {
    fn upsert_type(&self, supplied_id: &str, request: &AddTypeRequest) -> RepoResult<PostType> {
        let type_id = self.identity.resolve(supplied_id)?;
        if request.name.trim().is_empty() {
            return Err(RepoError::InvalidArgument(
                "type name cannot be blank".to_string(),
            ));
        }

        self.conn.execute(
            "INSERT INTO types (type_id, name)
             VALUES (?1, ?2)
             ON CONFLICT (type_id) DO UPDATE SET
                name = excluded.name,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![type_id.to_string(), request.name.as_str()],
        )?;

        info!("event=type_upsert module=repo status=ok type_id={type_id}");
        Ok(PostType {
            id: type_id,
            name: request.name.clone(),
            created_at: None,
            updated_at: None,
            deleted_at: None,
        })
    }

    fn upsert_post(&self, supplied_id: &str, request: &AddPostRequest) -> RepoResult<Post> {
        let post_id = self.identity.resolve(supplied_id)?;
        let type_id = self.identity.parse(&request.type_id)?;
        if request.title.trim().is_empty() {
            return Err(RepoError::InvalidArgument(
                "post title cannot be blank".to_string(),
            ));
        }

        self.conn.execute(
            "INSERT INTO posts (post_id, type_id, slug, title, body)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (post_id) DO UPDATE SET
                type_id = excluded.type_id,
                slug = excluded.slug,
                title = excluded.title,
                body = excluded.body,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                post_id.to_string(),
                type_id.to_string(),
                request.slug.as_str(),
                request.title.as_str(),
                request.body.as_str(),
            ],
        )?;

        info!("event=post_upsert module=repo status=ok post_id={post_id} type_id={type_id}");
        Ok(Post {
            id: post_id,
            type_id,
            slug: request.slug.clone(),
            title: request.title.clone(),
            body: request.body.clone(),
            created_at: None,
            updated_at: None,
            deleted_at: None,
            blocked_at: None,
        })
    }

    fn find_posts(&self, query: &FindPostsQuery) -> RepoResult<Page<Post>> {
        let mut filter = FilterClause::new();
        for keyword in query.keywords.iter().map(|value| value.trim()) {
            if keyword.is_empty() {
                continue;
            }
            let pattern = like_contains(keyword);
            filter.and(
                "title LIKE ? ESCAPE '\\' OR body LIKE ? ESCAPE '\\'",
                [pattern.clone(), pattern],
            );
        }

        let applied_limit = self.limits.apply(query.limit);
        let sql = format!(
            "{POST_SELECT_SQL}{} ORDER BY created_at DESC, post_id ASC LIMIT ? OFFSET ?;",
            filter.where_sql()
        );
        let mut bind_values = filter.args().to_vec();
        bind_values.push(Value::Integer(i64::from(applied_limit)));
        bind_values.push(Value::Integer(i64::from(query.lapse)));

        let (items, total) = read_snapshot(self.conn, |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(bind_values))?;
            let mut posts = Vec::new();
            while let Some(row) = rows.next()? {
                posts.push(parse_post_row(row)?);
            }
            let total = count_matching(conn, "posts", &filter)?;
            Ok((posts, total))
        })?;

        Ok(Page {
            items,
            total,
            applied_limit,
        })
    }

    fn delete_post(&self, post_id: &str) -> RepoResult<()> {
        let id = self.identity.parse(post_id)?;
        let changed = self
            .conn
            .execute("DELETE FROM posts WHERE post_id = ?1;", [id.to_string()])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        info!("event=post_delete module=repo status=ok post_id={id}");
        Ok(())
    }
}

fn parse_post_row(row: &Row<'_>) -> RepoResult<Post> {
    let post_id_text: String = row.get("post_id")?;
    let type_id_text: String = row.get("type_id")?;
    Ok(Post {
        id: parse_uuid_column(&post_id_text, "posts.post_id")?,
        type_id: parse_uuid_column(&type_id_text, "posts.type_id")?,
        slug: row.get("slug")?,
        title: row.get("title")?,
        body: row.get("body")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: row.get("deleted_at")?,
        blocked_at: row.get("blocked_at")?,
    })
}
