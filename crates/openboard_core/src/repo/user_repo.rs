//! User repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Upsert a user and its role memberships in one transaction, then re-read
//!   the canonical user through the finder.
//! - Page over users with their roles without paginating duplicated join rows.
//! - Soft-delete users.
//!
//! # Invariants
//! - The user row and its memberships are written all-or-nothing.
//! - Memberships are replaced as a whole; role order is request order.
//! - LIMIT/OFFSET apply to the base `users` set, before the role join.

use crate::config::PageLimits;
use crate::db::is_constraint_violation;
use crate::flatten::{flatten, Aggregate, JoinRow};
use crate::identity::IdentityProvider;
use crate::model::page::Page;
use crate::model::role::{Role, RoleId};
use crate::model::user::{User, UserId};
use crate::repo::{
    bool_to_int, count_matching, ensure_schema_ready, parse_bool_column, parse_uuid_column,
    read_snapshot, RepoError, RepoResult,
};
use crate::sql::builder::{build_in_clause, build_multi_value_insert, FilterClause};
use log::{error, info, warn};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use std::time::Instant;

const USER_COLUMNS: &str = "user_id,
    username,
    email,
    email_hold,
    altmail,
    altmail_hold,
    full_name,
    avatar,
    last_login,
    created_at,
    updated_at,
    deleted_at,
    blocked_at";

const MEMBERSHIP_INSERT_HEAD: &str = "INSERT INTO user_roles (user_id, role_id, position)";

/// Request to create or update one user with its role set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddUserRequest {
    pub username: String,
    pub email: String,
    pub email_hold: bool,
    pub altmail: String,
    pub altmail_hold: bool,
    pub full_name: String,
    pub avatar: String,
    /// Opaque credential; stored, never read back.
    pub password: String,
    /// Role ids in the order they should be listed on the user.
    pub role_ids: Vec<String>,
}

/// User filter. `None` fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindUsersQuery {
    /// Users holding any of these roles; empty means no role filter.
    pub role_ids: Vec<String>,
    pub email: Option<String>,
    pub email_hold: Option<bool>,
    pub altmail: Option<String>,
    pub altmail_hold: Option<bool>,
    pub include_deleted: bool,
    pub limit: Option<u32>,
    /// Number of users to skip.
    pub lapse: u32,
}

/// Repository interface for users.
pub trait UserRepository {
    /// Writes the user and its memberships atomically and returns the
    /// re-read user.
    fn upsert_user(&mut self, supplied_id: &str, request: &AddUserRequest) -> RepoResult<User>;
    fn find_users(&self, query: &FindUsersQuery) -> RepoResult<Page<User>>;
    /// Sets the soft-delete tombstone. Repeated calls keep the first one.
    fn delete_user(&self, user_id: &str) -> RepoResult<()>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn mut Connection,
    identity: IdentityProvider,
    limits: PageLimits,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
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

    fn build_filter(&self, query: &FindUsersQuery) -> RepoResult<FilterClause> {
        let mut filter = FilterClause::new();
        if !query.include_deleted {
            filter.and_static("deleted_at IS NULL");
        }
        if let Some(email) = query.email.as_ref() {
            filter.and("email = ?", [Value::Text(email.clone())]);
        }
        if let Some(email_hold) = query.email_hold {
            filter.and("email_hold = ?", [Value::Integer(bool_to_int(email_hold))]);
        }
        if let Some(altmail) = query.altmail.as_ref() {
            filter.and("altmail = ?", [Value::Text(altmail.clone())]);
        }
        if let Some(altmail_hold) = query.altmail_hold {
            filter.and(
                "altmail_hold = ?",
                [Value::Integer(bool_to_int(altmail_hold))],
            );
        }
        if !query.role_ids.is_empty() {
            let role_ids = self
                .identity
                .parse_unique(&query.role_ids)?
                .into_iter()
                .map(|id| Value::Text(id.to_string()))
                .collect();
            let in_roles = build_in_clause("role_id", role_ids);
            filter.and(
                format!(
                    "user_id IN (SELECT user_id FROM user_roles WHERE {})",
                    in_roles.sql
                ),
                in_roles.args,
            );
        }
        Ok(filter)
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn upsert_user(&mut self, supplied_id: &str, request: &AddUserRequest) -> RepoResult<User> {
        let started_at = Instant::now();
        let user_id = self.identity.resolve(supplied_id)?;
        let role_ids = self.identity.parse_unique(&request.role_ids)?;
        if request.username.trim().is_empty() {
            return Err(RepoError::InvalidArgument(
                "username cannot be blank".to_string(),
            ));
        }
        if request.email.trim().is_empty() {
            return Err(RepoError::InvalidArgument(
                "email cannot be blank".to_string(),
            ));
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if let Err(err) = write_user_rows(&tx, user_id, request, &role_ids) {
            let constraint = matches!(&err, RepoError::Db(db_err) if is_constraint_violation(db_err));
            warn!(
                "event=user_upsert module=repo status=rollback user_id={} constraint_violation={} error={}",
                user_id, constraint, err
            );
            if let Err(rollback_err) = tx.rollback() {
                warn!(
                    "event=user_upsert module=repo status=error error_code=rollback_failed user_id={} error={}",
                    user_id, rollback_err
                );
            }
            return Err(err);
        }
        tx.commit()?;

        let reread = FindUsersQuery {
            email: Some(request.email.clone()),
            include_deleted: true,
            ..FindUsersQuery::default()
        };
        let filter = self.build_filter(&reread)?;
        let mut found = select_users(self.conn, &filter, 2, 0)?;
        let reread_matches = found.len() == 1 && found[0].id == user_id;
        if !reread_matches {
            error!(
                "event=user_upsert module=repo status=error error_code=reread_mismatch user_id={} found={}",
                user_id,
                found.len()
            );
            return Err(RepoError::Consistency(format!(
                "expected user {user_id} to be the only match for its email after upsert, found {}",
                found.len()
            )));
        }

        info!(
            "event=user_upsert module=repo status=ok user_id={} roles={} duration_ms={}",
            user_id,
            role_ids.len(),
            started_at.elapsed().as_millis()
        );
        Ok(found.remove(0))
    }

    fn find_users(&self, query: &FindUsersQuery) -> RepoResult<Page<User>> {
        let filter = self.build_filter(query)?;
        let applied_limit = self.limits.apply(query.limit);

        let (items, total) = read_snapshot(self.conn, |conn| {
            let items = select_users(conn, &filter, applied_limit, query.lapse)?;
            let total = count_matching(conn, "users", &filter)?;
            Ok((items, total))
        })?;

        Ok(Page {
            items,
            total,
            applied_limit,
        })
    }

    fn delete_user(&self, user_id: &str) -> RepoResult<()> {
        let id = self.identity.parse(user_id)?;
        let changed = self.conn.execute(
            "UPDATE users
             SET deleted_at = COALESCE(deleted_at, strftime('%s', 'now') * 1000)
             WHERE user_id = ?1;",
            [id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        info!("event=user_delete module=repo status=ok user_id={id}");
        Ok(())
    }
}

fn write_user_rows(
    tx: &Transaction<'_>,
    user_id: UserId,
    request: &AddUserRequest,
    role_ids: &[RoleId],
) -> RepoResult<()> {
    let user_id_text = user_id.to_string();
    tx.execute(
        "INSERT INTO users (
            user_id,
            username,
            email,
            email_hold,
            altmail,
            altmail_hold,
            full_name,
            avatar,
            password
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT (user_id) DO UPDATE SET
            username = excluded.username,
            email = excluded.email,
            email_hold = excluded.email_hold,
            altmail = excluded.altmail,
            altmail_hold = excluded.altmail_hold,
            full_name = excluded.full_name,
            avatar = excluded.avatar,
            password = excluded.password,
            updated_at = (strftime('%s', 'now') * 1000);",
        params![
            user_id_text.as_str(),
            request.username.as_str(),
            request.email.as_str(),
            bool_to_int(request.email_hold),
            request.altmail.as_str(),
            bool_to_int(request.altmail_hold),
            request.full_name.as_str(),
            request.avatar.as_str(),
            request.password.as_str(),
        ],
    )?;

    tx.execute(
        "DELETE FROM user_roles WHERE user_id = ?1;",
        [user_id_text.as_str()],
    )?;

    if role_ids.is_empty() {
        return Ok(());
    }

    let rows = role_ids
        .iter()
        .enumerate()
        .map(|(position, role_id)| {
            vec![
                Value::Text(user_id_text.clone()),
                Value::Text(role_id.to_string()),
                Value::Integer(position as i64),
            ]
        })
        .collect();
    let insert = build_multi_value_insert(MEMBERSHIP_INSERT_HEAD, rows)?;
    tx.execute(&insert.sql, params_from_iter(insert.args))?;
    Ok(())
}

/// One row of the user x role outer join.
#[derive(Debug, Clone, PartialEq, Eq)]
struct UserJoinRow {
    user_id: UserId,
    username: String,
    email: String,
    email_hold: bool,
    altmail: String,
    altmail_hold: bool,
    full_name: String,
    avatar: String,
    last_login: Option<i64>,
    created_at: Option<i64>,
    updated_at: Option<i64>,
    deleted_at: Option<i64>,
    blocked_at: Option<i64>,
    role_id: Option<RoleId>,
    role_name: Option<String>,
}

impl Aggregate for User {
    type Child = Role;

    fn children_mut(&mut self) -> &mut Vec<Role> {
        &mut self.roles
    }
}

impl JoinRow for UserJoinRow {
    type Key = UserId;
    type Entity = User;

    fn key(&self) -> UserId {
        self.user_id
    }

    fn into_parts(self) -> (User, Option<Role>) {
        let role = match (self.role_id, self.role_name) {
            (Some(id), Some(name)) => Some(Role { id, name }),
            _ => None,
        };
        let user = User {
            id: self.user_id,
            username: self.username,
            email: self.email,
            email_hold: self.email_hold,
            altmail: self.altmail,
            altmail_hold: self.altmail_hold,
            full_name: self.full_name,
            avatar: self.avatar,
            roles: Vec::new(),
            last_login: self.last_login,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
            blocked_at: self.blocked_at,
        };
        (user, role)
    }
}

fn select_users(
    conn: &Connection,
    filter: &FilterClause,
    limit: u32,
    lapse: u32,
) -> RepoResult<Vec<User>> {
    let sql = format!(
        "SELECT
            u.user_id AS user_id,
            u.username AS username,
            u.email AS email,
            u.email_hold AS email_hold,
            u.altmail AS altmail,
            u.altmail_hold AS altmail_hold,
            u.full_name AS full_name,
            u.avatar AS avatar,
            u.last_login AS last_login,
            u.created_at AS created_at,
            u.updated_at AS updated_at,
            u.deleted_at AS deleted_at,
            u.blocked_at AS blocked_at,
            r.role_id AS role_id,
            r.role_name AS role_name
         FROM (
            SELECT {USER_COLUMNS}
            FROM users{}
            ORDER BY created_at ASC, user_id ASC
            LIMIT ? OFFSET ?
         ) u
         LEFT JOIN user_roles ur ON ur.user_id = u.user_id
         LEFT JOIN roles r ON r.role_id = ur.role_id
         ORDER BY u.created_at ASC, u.user_id ASC, ur.position ASC;",
        filter.where_sql()
    );
    let mut bind_values = filter.args().to_vec();
    bind_values.push(Value::Integer(i64::from(limit)));
    bind_values.push(Value::Integer(i64::from(lapse)));

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut join_rows = Vec::new();
    while let Some(row) = rows.next()? {
        join_rows.push(parse_user_join_row(row)?);
    }

    Ok(flatten(join_rows))
}

fn parse_user_join_row(row: &Row<'_>) -> RepoResult<UserJoinRow> {
    let user_id_text: String = row.get("user_id")?;
    let role_id = match row.get::<_, Option<String>>("role_id")? {
        Some(value) => Some(parse_uuid_column(&value, "roles.role_id")?),
        None => None,
    };

    Ok(UserJoinRow {
        user_id: parse_uuid_column(&user_id_text, "users.user_id")?,
        username: row.get("username")?,
        email: row.get("email")?,
        email_hold: parse_bool_column(row.get("email_hold")?, "users.email_hold")?,
        altmail: row.get("altmail")?,
        altmail_hold: parse_bool_column(row.get("altmail_hold")?, "users.altmail_hold")?,
        full_name: row.get("full_name")?,
        avatar: row.get("avatar")?,
        last_login: row.get("last_login")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        deleted_at: row.get("deleted_at")?,
        blocked_at: row.get("blocked_at")?,
        role_id,
        role_name: row.get("role_name")?,
    })
}
