//! Entity reconstruction and upsert coordination for the OpenBoard store.
//! This crate owns the board's persistence invariants: identity, join-row
//! deduplication and all-or-nothing membership writes.

pub mod config;
pub mod db;
pub mod flatten;
pub mod identity;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sql;

pub use config::{ConfigError, PageLimits, StoreConfig};
pub use identity::{IdentityError, IdentityProvider};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::page::Page;
pub use model::post::{Post, PostId, PostType, TypeId};
pub use model::role::{Role, RoleId};
pub use model::user::{User, UserId};
pub use repo::post_repo::{
    AddPostRequest, AddTypeRequest, FindPostsQuery, PostRepository, SqlitePostRepository,
};
pub use repo::role_repo::{AddRoleRequest, FindRolesQuery, RoleRepository, SqliteRoleRepository};
pub use repo::user_repo::{AddUserRequest, FindUsersQuery, SqliteUserRepository, UserRepository};
pub use repo::{RepoError, RepoResult};
pub use service::post_service::{derive_slug, PostService};
pub use service::user_service::UserService;
