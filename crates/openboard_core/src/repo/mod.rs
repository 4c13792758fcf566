//! Repository layer: upsert coordination and paginated finders.
//!
//! # Responsibility
//! - Translate request objects into parameterized statements.
//! - Apply multi-table writes atomically and re-read canonical state.
//! - Reassemble joined rows into entities.
//!
//! # Invariants
//! - Client errors (`InvalidIdentifier`, `InvalidArgument`) are raised before
//!   any write takes effect.
//! - List and count reads of one finder share a single `FilterClause`.
//! - A successful write whose mandated re-read is missing or ambiguous is a
//!   `Consistency` error, never a silent success.

use crate::db::migrations::{latest_version, schema_status, SchemaStatus};
use crate::db::DbError;
use crate::identity::IdentityError;
use crate::sql::builder::{FilterClause, StatementError};
use rusqlite::{params_from_iter, Connection};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub mod post_repo;
pub mod role_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error taxonomy.
#[derive(Debug)]
pub enum RepoError {
    /// Supplied identifier text failed to parse.
    InvalidIdentifier(IdentityError),
    /// Request cannot be turned into a valid statement.
    InvalidArgument(String),
    /// Statement, connection or transaction failure.
    Db(DbError),
    /// A write succeeded but its re-read did not find exactly one row.
    Consistency(String),
    /// Persisted row cannot be decoded.
    InvalidData(String),
    NotFound(Uuid),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl RepoError {
    /// Returns whether the error was caused by caller input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidIdentifier(_) | Self::InvalidArgument(_))
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier(err) => write!(f, "{err}"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Consistency(message) => write!(f, "inconsistent board state: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted board data: {message}"),
            Self::NotFound(id) => write!(f, "entity not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}; open it with open_db"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidIdentifier(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<IdentityError> for RepoError {
    fn from(value: IdentityError) -> Self {
        Self::InvalidIdentifier(value)
    }
}

impl From<StatementError> for RepoError {
    fn from(value: StatementError) -> Self {
        Self::InvalidArgument(value.to_string())
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Rejects connections that did not go through `open_db`.
pub(crate) fn ensure_schema_ready(conn: &Connection) -> RepoResult<()> {
    match schema_status(conn)? {
        SchemaStatus::Current => Ok(()),
        SchemaStatus::Behind { db_version } | SchemaStatus::Ahead { db_version } => {
            Err(RepoError::UninitializedConnection {
                expected_version: latest_version(),
                actual_version: db_version,
            })
        }
    }
}

/// Runs `read` against one consistent snapshot.
///
/// Opens a deferred read transaction when the connection is in autocommit
/// mode. Inside a caller-owned transaction the reads join it instead.
pub(crate) fn read_snapshot<T>(
    conn: &Connection,
    read: impl FnOnce(&Connection) -> RepoResult<T>,
) -> RepoResult<T> {
    if !conn.is_autocommit() {
        return read(conn);
    }
    let tx = conn.unchecked_transaction()?;
    let value = read(&tx)?;
    tx.commit()?;
    Ok(value)
}

/// Runs `SELECT COUNT(*) FROM <from>` under `filter`.
pub(crate) fn count_matching(conn: &Connection, from: &str, filter: &FilterClause) -> RepoResult<u64> {
    let sql = format!("SELECT COUNT(*) FROM {from}{};", filter.where_sql());
    let total: i64 = conn.query_row(&sql, params_from_iter(filter.args()), |row| row.get(0))?;
    u64::try_from(total)
        .map_err(|_| RepoError::InvalidData(format!("negative row count {total} from {from}")))
}

pub(crate) fn parse_uuid_column(value: &str, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

pub(crate) fn parse_bool_column(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
