//! Role repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Upsert roles keyed by id and confirm them with a name re-read.
//! - Find roles by id list or name list with pagination.
//!
//! # Invariants
//! - Role names are unique. Upserting an already-used name under a generated
//!   id leaves the existing row in place and returns it.
//! - A caller-supplied id is never swapped for another role's id; a name
//!   taken by a different role is an `InvalidArgument` error.
//! - An empty id list and an empty name list together match no roles.

use crate::config::PageLimits;
use crate::identity::IdentityProvider;
use crate::model::page::Page;
use crate::model::role::Role;
use crate::repo::{
    count_matching, ensure_schema_ready, parse_uuid_column, read_snapshot, RepoError, RepoResult,
};
use crate::sql::builder::{build_in_clause, FilterClause};
use log::{error, info};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

/// Request to create or update one role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddRoleRequest {
    pub name: String,
}

/// Role lookup by ids or names. A role matching either list is returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindRolesQuery {
    pub role_ids: Vec<String>,
    pub role_names: Vec<String>,
    pub limit: Option<u32>,
    /// Number of rows to skip.
    pub lapse: u32,
}

/// Repository interface for roles.
pub trait RoleRepository {
    /// Inserts or updates a role, then re-reads it by name.
    ///
    /// With an empty `supplied_id` and a name that is already used, the
    /// existing role is returned unchanged.
    fn upsert_role(&self, supplied_id: &str, request: &AddRoleRequest) -> RepoResult<Role>;
    /// Lists and counts matching roles from one snapshot. Inside an open
    /// transaction on the same connection the reads run within it.
    fn find_roles(&self, query: &FindRolesQuery) -> RepoResult<Page<Role>>;
}

/// SQLite-backed role repository.
pub struct SqliteRoleRepository<'conn> {
    conn: &'conn Connection,
    identity: IdentityProvider,
    limits: PageLimits,
}

impl<'conn> SqliteRoleRepository<'conn> {
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

impl RoleRepository for SqliteRoleRepository<'_> {
    fn upsert_role(&self, supplied_id: &str, request: &AddRoleRequest) -> RepoResult<Role> {
        let role_id = self.identity.resolve(supplied_id)?;
        let name = request.name.trim();
        if name.is_empty() {
            return Err(RepoError::InvalidArgument(
                "role name cannot be blank".to_string(),
            ));
        }

        self.conn.execute(
            "INSERT INTO roles (role_id, role_name)
             VALUES (?1, ?2)
             ON CONFLICT (role_id) DO UPDATE SET role_name = excluded.role_name
             ON CONFLICT (role_name) DO NOTHING;",
            params![role_id.to_string(), name],
        )?;

        let mut filter = FilterClause::new();
        filter.and("role_name = ?", [Value::Text(name.to_string())]);
        let mut found = select_roles(self.conn, &filter, 2, 0)?;
        if found.len() != 1 {
            error!(
                "event=role_upsert module=repo status=error error_code=reread_mismatch role_id={} found={}",
                role_id,
                found.len()
            );
            return Err(RepoError::Consistency(format!(
                "expected one role named `{name}` after upsert, found {}",
                found.len()
            )));
        }

        let role = found.remove(0);
        if !supplied_id.is_empty() && role.id != role_id {
            info!(
                "event=role_upsert module=repo status=rejected error_code=name_taken role_id={} owner_id={}",
                role_id, role.id
            );
            return Err(RepoError::InvalidArgument(format!(
                "role name `{name}` already belongs to role {}",
                role.id
            )));
        }

        info!(
            "event=role_upsert module=repo status=ok role_id={} reused_existing={}",
            role.id,
            role.id != role_id
        );
        Ok(role)
    }

    fn find_roles(&self, query: &FindRolesQuery) -> RepoResult<Page<Role>> {
        let role_ids = self
            .identity
            .parse_unique(&query.role_ids)?
            .into_iter()
            .map(|id| Value::Text(id.to_string()))
            .collect::<Vec<_>>();
        let role_names = query
            .role_names
            .iter()
            .map(|name| Value::Text(name.clone()))
            .collect::<Vec<_>>();

        let by_id = build_in_clause("role_id", role_ids);
        let by_name = build_in_clause("role_name", role_names);
        let mut filter = FilterClause::new();
        filter.and(
            format!("{} OR {}", by_id.sql, by_name.sql),
            by_id.args.into_iter().chain(by_name.args),
        );

        let applied_limit = self.limits.apply(query.limit);
        let (items, total) = read_snapshot(self.conn, |conn| {
            let items = select_roles(conn, &filter, applied_limit, query.lapse)?;
            let total = count_matching(conn, "roles", &filter)?;
            Ok((items, total))
        })?;

        Ok(Page {
            items,
            total,
            applied_limit,
        })
    }
}

fn select_roles(
    conn: &Connection,
    filter: &FilterClause,
    limit: u32,
    lapse: u32,
) -> RepoResult<Vec<Role>> {
    let sql = format!(
        "SELECT role_id, role_name FROM roles{} ORDER BY role_name ASC, role_id ASC LIMIT ? OFFSET ?;",
        filter.where_sql()
    );
    let mut bind_values = filter.args().to_vec();
    bind_values.push(Value::Integer(i64::from(limit)));
    bind_values.push(Value::Integer(i64::from(lapse)));

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(bind_values))?;
    let mut roles = Vec::new();
    while let Some(row) = rows.next()? {
        roles.push(parse_role_row(row)?);
    }
    Ok(roles)
}

fn parse_role_row(row: &Row<'_>) -> RepoResult<Role> {
    let id_text: String = row.get("role_id")?;
    Ok(Role {
        id: parse_uuid_column(&id_text, "roles.role_id")?,
        name: row.get("role_name")?,
    })
}
