//! Client repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and search APIs over `clients`/`phones` storage.
//! - Keep SQL details and transaction boundaries inside core persistence.
//! - Translate store constraint failures into semantic errors.
//!
//! # Invariants
//! - Write paths validate input before any SQL runs.
//! - Every operation runs in exactly one transaction. A transaction that is
//!   not committed rolls back when dropped, so early returns never leak
//!   partial writes.
//! - Values are always bound parameters.
//! - Updates/deletes of missing ids succeed with zero affected rows.

use crate::db::migrations::{latest_version, REQUIRED_TABLES};
use crate::db::DbError;
use crate::model::client::{
    validate_phone, Client, ClientId, ClientUpdate, ClientValidationError, NewClient, Phone,
    PhoneId,
};
use crate::search::filter::{build_search_statement, parse_client_row, ClientFilter, ClientRow};
use log::{debug, log_enabled, warn, Level};
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, Transaction,
    TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::ops::ControlFlow;
use std::time::Instant;

pub type RepoResult<T> = Result<T, RepoError>;

/// Store constraint family that rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    NotNull,
    Check,
    ForeignKey,
    Other,
}

impl Display for ConstraintKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Unique => "unique",
            Self::NotNull => "not-null",
            Self::Check => "check",
            Self::ForeignKey => "foreign-key",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// Repository error for client persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Caller input rejected before reaching the store.
    Validation(ClientValidationError),
    /// Store rejected a write (duplicate email, missing value, ...).
    Constraint {
        kind: ConstraintKind,
        message: String,
    },
    /// Write referenced a client that does not exist.
    Reference(ClientId),
    Db(DbError),
    /// Connection schema is older than this binary expects.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Connection was opened without `PRAGMA foreign_keys = ON`.
    ForeignKeysDisabled,
}

impl RepoError {
    /// Stable machine-readable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_failed",
            Self::Constraint { .. } => "constraint_violation",
            Self::Reference(_) => "reference_missing",
            Self::Db(_) => "db_error",
            Self::UninitializedConnection { .. } => "uninitialized_connection",
            Self::MissingRequiredTable(_) => "missing_table",
            Self::MissingRequiredColumn { .. } => "missing_column",
            Self::ForeignKeysDisabled => "foreign_keys_disabled",
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::Constraint {
                kind: ConstraintKind::Unique,
                ..
            }
        )
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Constraint { kind, message } => {
                write!(f, "{kind} constraint violated: {message}")
            }
            Self::Reference(id) => write!(f, "client not found: {id}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "client repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "client repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "client repository requires column `{column}` in table `{table}`"
            ),
            Self::ForeignKeysDisabled => {
                write!(f, "client repository requires `PRAGMA foreign_keys = ON`")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Constraint { .. } => None,
            Self::Reference(_) => None,
            Self::UninitializedConnection { .. } => None,
            Self::MissingRequiredTable(_) => None,
            Self::MissingRequiredColumn { .. } => None,
            Self::ForeignKeysDisabled => None,
        }
    }
}

impl From<ClientValidationError> for RepoError {
    fn from(value: ClientValidationError) -> Self {
        Self::Validation(value)
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

/// Repository interface for client/phone operations.
pub trait ClientRepository {
    /// Inserts one client and returns its store-assigned id.
    fn add_client(&self, client: &NewClient) -> RepoResult<ClientId>;
    /// Inserts one phone owned by `client_id`.
    fn add_phone(&self, client_id: ClientId, phone: &str) -> RepoResult<PhoneId>;
    /// Updates supplied columns; returns matched client rows (0 or 1).
    fn update_client(&self, client_id: ClientId, update: &ClientUpdate) -> RepoResult<usize>;
    /// Deletes phones matching both owner and number; returns deleted rows.
    fn delete_phone(&self, client_id: ClientId, phone: &str) -> RepoResult<usize>;
    /// Deletes one client and, by cascade, its phones; returns deleted clients.
    fn delete_client(&self, client_id: ClientId) -> RepoResult<usize>;
    /// Loads one client by id.
    fn get_client(&self, client_id: ClientId) -> RepoResult<Option<Client>>;
    /// Lists phones of one client in insertion order.
    fn list_phones(&self, client_id: ClientId) -> RepoResult<Vec<Phone>>;
    /// Streams joined search rows into `visitor` until exhausted or stopped.
    ///
    /// Returns the number of rows handed to the visitor.
    fn scan_clients(
        &self,
        filter: &ClientFilter,
        visitor: &mut dyn FnMut(ClientRow) -> ControlFlow<()>,
    ) -> RepoResult<usize>;
    /// Collects every joined search row.
    fn find_client(&self, filter: &ClientFilter) -> RepoResult<Vec<ClientRow>> {
        let mut rows = Vec::new();
        self.scan_clients(filter, &mut |row| {
            rows.push(row);
            ControlFlow::Continue(())
        })?;
        Ok(rows)
    }
}

/// SQLite-backed client repository.
pub struct SqliteClientRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteClientRepository<'conn> {
    /// Creates repository from a connection with the client schema applied.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_client_connection_ready(conn)?;
        Ok(Self { conn })
    }

    /// Runs `op` inside one immediate transaction and logs the outcome.
    fn write<T>(
        &self,
        event: &'static str,
        op: impl FnOnce(&Transaction<'_>) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let started_at = Instant::now();
        let result = run_in_transaction(self.conn, TransactionBehavior::Immediate, op);
        match &result {
            Ok(_) => debug!(
                "event={} module=repo status=ok duration_ms={}",
                event,
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event={} module=repo status=error duration_ms={} error_code={}",
                event,
                started_at.elapsed().as_millis(),
                err.code()
            ),
        }
        result
    }
}

impl ClientRepository for SqliteClientRepository<'_> {
    fn add_client(&self, client: &NewClient) -> RepoResult<ClientId> {
        client.validate()?;

        self.write("client_add", |tx| {
            tx.execute(
                "INSERT INTO clients (first_name, last_name, email)
                 VALUES (?1, ?2, ?3);",
                params![
                    client.first_name.as_str(),
                    client.last_name.as_str(),
                    client.email.as_str(),
                ],
            )
            .map_err(classify_write_error)?;
            Ok(tx.last_insert_rowid())
        })
    }

    fn add_phone(&self, client_id: ClientId, phone: &str) -> RepoResult<PhoneId> {
        validate_phone(phone)?;

        self.write("phone_add", |tx| {
            tx.execute(
                "INSERT INTO phones (client_id, phone) VALUES (?1, ?2);",
                params![client_id, phone],
            )
            .map_err(|err| match classify_write_error(err) {
                RepoError::Constraint {
                    kind: ConstraintKind::ForeignKey,
                    ..
                } => RepoError::Reference(client_id),
                other => other,
            })?;
            Ok(tx.last_insert_rowid())
        })
    }

    fn update_client(&self, client_id: ClientId, update: &ClientUpdate) -> RepoResult<usize> {
        update.validate()?;
        if update.is_empty() {
            return Ok(0);
        }

        self.write("client_update", |tx| {
            let mut matched = 0;
            for (field, value) in update.changes() {
                // Column names come from a closed enum; only values are bound.
                let sql = format!("UPDATE clients SET {} = ?1 WHERE id = ?2;", field.column());
                let changed = tx
                    .execute(&sql, params![value, client_id])
                    .map_err(classify_write_error)?;
                matched = matched.max(changed);
            }
            Ok(matched)
        })
    }

    fn delete_phone(&self, client_id: ClientId, phone: &str) -> RepoResult<usize> {
        self.write("phone_delete", |tx| {
            let deleted = tx.execute(
                "DELETE FROM phones WHERE client_id = ?1 AND phone = ?2;",
                params![client_id, phone],
            )?;
            Ok(deleted)
        })
    }

    fn delete_client(&self, client_id: ClientId) -> RepoResult<usize> {
        self.write("client_delete", |tx| {
            if log_enabled!(Level::Debug) {
                let owned_phones: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM phones WHERE client_id = ?1;",
                    [client_id],
                    |row| row.get(0),
                )?;
                debug!(
                    "event=client_delete module=repo status=cascade phones_owned={}",
                    owned_phones
                );
            }
            let deleted = tx.execute("DELETE FROM clients WHERE id = ?1;", [client_id])?;
            Ok(deleted)
        })
    }

    fn get_client(&self, client_id: ClientId) -> RepoResult<Option<Client>> {
        let client = self
            .conn
            .query_row(
                "SELECT id, first_name, last_name, email
                 FROM clients
                 WHERE id = ?1;",
                [client_id],
                |row| {
                    Ok(Client {
                        id: row.get("id")?,
                        first_name: row.get("first_name")?,
                        last_name: row.get("last_name")?,
                        email: row.get("email")?,
                    })
                },
            )
            .optional()?;
        Ok(client)
    }

    fn list_phones(&self, client_id: ClientId) -> RepoResult<Vec<Phone>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, client_id, phone
             FROM phones
             WHERE client_id = ?1
             ORDER BY id ASC;",
        )?;
        let mut rows = stmt.query([client_id])?;
        let mut phones = Vec::new();
        while let Some(row) = rows.next()? {
            phones.push(Phone {
                id: row.get("id")?,
                client_id: row.get("client_id")?,
                phone: row.get("phone")?,
            });
        }
        Ok(phones)
    }

    fn scan_clients(
        &self,
        filter: &ClientFilter,
        visitor: &mut dyn FnMut(ClientRow) -> ControlFlow<()>,
    ) -> RepoResult<usize> {
        let statement = build_search_statement(filter);

        run_in_transaction(self.conn, TransactionBehavior::Deferred, |tx| {
            let mut stmt = tx.prepare(&statement.sql)?;
            let mut rows = stmt.query(params_from_iter(statement.bind_values.iter()))?;
            let mut visited = 0;
            while let Some(row) = rows.next()? {
                visited += 1;
                if visitor(parse_client_row(row)?).is_break() {
                    break;
                }
            }
            Ok(visited)
        })
    }
}

/// Scoped transaction: commits only when `op` succeeds, otherwise the
/// transaction is dropped and rolled back.
fn run_in_transaction<T>(
    conn: &Connection,
    behavior: TransactionBehavior,
    op: impl FnOnce(&Transaction<'_>) -> RepoResult<T>,
) -> RepoResult<T> {
    let tx = Transaction::new_unchecked(conn, behavior)?;
    let value = op(&tx)?;
    tx.commit()?;
    Ok(value)
}

/// Maps constraint failures to [`RepoError::Constraint`]; other errors stay
/// transport-level.
fn classify_write_error(err: rusqlite::Error) -> RepoError {
    if let rusqlite::Error::SqliteFailure(failure, message) = &err {
        if failure.code == ErrorCode::ConstraintViolation {
            let kind = match failure.extended_code {
                rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY => ConstraintKind::Unique,
                rusqlite::ffi::SQLITE_CONSTRAINT_NOTNULL => ConstraintKind::NotNull,
                rusqlite::ffi::SQLITE_CONSTRAINT_CHECK => ConstraintKind::Check,
                rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintKind::ForeignKey,
                _ => ConstraintKind::Other,
            };
            let message = message.clone().unwrap_or_else(|| failure.to_string());
            return RepoError::Constraint { kind, message };
        }
    }

    RepoError::from(err)
}

fn ensure_client_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version < expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    for column in ["id", "first_name", "last_name", "email"] {
        if !table_has_column(conn, "clients", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "clients",
                column,
            });
        }
    }

    for column in ["id", "client_id", "phone"] {
        if !table_has_column(conn, "phones", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "phones",
                column,
            });
        }
    }

    let foreign_keys: i64 = conn.query_row("PRAGMA foreign_keys;", [], |row| row.get(0))?;
    if foreign_keys != 1 {
        return Err(RepoError::ForeignKeysDisabled);
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::{classify_write_error, ConstraintKind, RepoError};
    use rusqlite::Connection;

    fn constraint_error(sql: &str) -> RepoError {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE CHECK (length(name) > 1)
            );
            INSERT INTO t (name) VALUES ('taken');",
        )
        .unwrap();
        classify_write_error(conn.execute(sql, []).unwrap_err())
    }

    #[test]
    fn classifies_constraint_families() {
        let unique = constraint_error("INSERT INTO t (name) VALUES ('taken');");
        assert!(unique.is_unique_violation());

        let not_null = constraint_error("INSERT INTO t (name) VALUES (NULL);");
        assert!(matches!(
            not_null,
            RepoError::Constraint {
                kind: ConstraintKind::NotNull,
                ..
            }
        ));

        let check = constraint_error("INSERT INTO t (name) VALUES ('x');");
        assert!(matches!(
            check,
            RepoError::Constraint {
                kind: ConstraintKind::Check,
                ..
            }
        ));
    }

    #[test]
    fn non_constraint_errors_stay_transport_level() {
        let conn = Connection::open_in_memory().unwrap();
        let err = classify_write_error(
            conn.execute("INSERT INTO missing VALUES (1);", [])
                .unwrap_err(),
        );
        assert!(matches!(err, RepoError::Db(_)));
        assert_eq!(err.code(), "db_error");
    }
}
