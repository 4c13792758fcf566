//! Post use-case service.
//!
//! # Responsibility
//! - Derive URL slugs from post titles.
//! - Split free-text search input into keyword filters.
//!
//! # Invariants
//! - Slugs contain only `[a-z0-9-]`, never start or end with `-`, and are
//!   never empty.

use crate::model::page::Page;
use crate::model::post::{Post, PostType};
use crate::repo::post_repo::{AddPostRequest, AddTypeRequest, FindPostsQuery, PostRepository};
use crate::repo::RepoResult;
use once_cell::sync::Lazy;
use regex::Regex;

const MAX_SLUG_CHARS: usize = 80;
const FALLBACK_SLUG: &str = "post";

static SLUG_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug separator regex"));

/// Post service facade over repository implementations.
pub struct PostService<R: PostRepository> {
    repo: R,
}

impl<R: PostRepository> PostService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn add_type(&self, supplied_id: &str, name: impl Into<String>) -> RepoResult<PostType> {
        let request = AddTypeRequest {
            name: name.into().trim().to_string(),
        };
        self.repo.upsert_type(supplied_id.trim(), &request)
    }

    /// Creates or updates a post, deriving its slug from `title`.
    pub fn add_post(
        &self,
        supplied_id: &str,
        type_id: &str,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> RepoResult<Post> {
        let title = title.into().trim().to_string();
        let request = AddPostRequest {
            type_id: type_id.trim().to_string(),
            slug: derive_slug(&title),
            title,
            body: body.into(),
        };
        self.repo.upsert_post(supplied_id.trim(), &request)
    }

    /// Searches posts whose title or body contains every whitespace-separated
    /// term of `text`.
    pub fn search_posts(&self, text: &str, limit: Option<u32>, lapse: u32) -> RepoResult<Page<Post>> {
        let query = FindPostsQuery {
            keywords: text.split_whitespace().map(str::to_string).collect(),
            limit,
            lapse,
        };
        self.repo.find_posts(&query)
    }

    pub fn delete_post(&self, post_id: &str) -> RepoResult<()> {
        self.repo.delete_post(post_id.trim())
    }
}

/// Derives a lowercase, dash-separated slug from a post title.
pub fn derive_slug(title: &str) -> String {
    let lowered = title.to_lowercase();
    let dashed = SLUG_SEPARATOR_RE.replace_all(&lowered, "-");
    let slug = dashed
        .trim_matches('-')
        .chars()
        .take(MAX_SLUG_CHARS)
        .collect::<String>();
    let slug = slug.trim_end_matches('-');
    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug.to_string()
    }
}
