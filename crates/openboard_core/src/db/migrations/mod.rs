//! Embedded board schema and its forward-only upgrade path.
//!
//! # Responsibility
//! - Hold the ordered list of named schema steps for users, roles and posts.
//! - Classify a connection's schema against this build.
//! - Upgrade a behind schema inside one transaction.
//!
//! # Invariants
//! - Step versions start at 1 and increase by exactly one.
//! - `PRAGMA user_version` equals the version of the last applied step.
//! - A schema newer than this build is never touched.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, Transaction};

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[
    SchemaStep {
        version: 1,
        name: "users_roles",
        sql: include_str!("0001_users_roles.sql"),
    },
    SchemaStep {
        version: 2,
        name: "posts_types",
        sql: include_str!("0002_posts_types.sql"),
    },
];

/// Where a connection's schema sits relative to this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStatus {
    Current,
    Behind { db_version: u32 },
    Ahead { db_version: u32 },
}

/// Version of the newest schema step embedded in this build.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.last().map_or(0, |step| step.version)
}

/// Reads `PRAGMA user_version` and compares it with [`latest_version`].
pub fn schema_status(conn: &Connection) -> DbResult<SchemaStatus> {
    let db_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let latest = latest_version();
    Ok(if db_version == latest {
        SchemaStatus::Current
    } else if db_version < latest {
        SchemaStatus::Behind { db_version }
    } else {
        SchemaStatus::Ahead { db_version }
    })
}

/// Brings the schema up to [`latest_version`].
///
/// Returns how many steps ran. Either every pending step is applied or none.
///
/// # Errors
/// - `DbError::UnsupportedSchemaVersion` when the database is newer than
///   this build.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<usize> {
    let db_version = match schema_status(conn)? {
        SchemaStatus::Current => return Ok(0),
        SchemaStatus::Ahead { db_version } => {
            return Err(DbError::UnsupportedSchemaVersion {
                db_version,
                latest_supported: latest_version(),
            })
        }
        SchemaStatus::Behind { db_version } => db_version,
    };

    let tx = conn.transaction()?;
    let pending = SCHEMA_STEPS
        .iter()
        .filter(|step| step.version > db_version)
        .collect::<Vec<_>>();
    for step in &pending {
        run_step(&tx, step)?;
    }
    tx.commit()?;
    Ok(pending.len())
}

fn run_step(tx: &Transaction<'_>, step: &SchemaStep) -> DbResult<()> {
    tx.execute_batch(step.sql)?;
    tx.pragma_update(None, "user_version", step.version)?;
    info!(
        "event=db_migrate module=db status=ok version={} name={}",
        step.version, step.name
    );
    Ok(())
}
