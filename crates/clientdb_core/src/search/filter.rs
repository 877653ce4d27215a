//! Multi-field client search.
//!
//! # Responsibility
//! - Compose optional equality criteria into one `clients LEFT JOIN phones`
//!   statement.
//! - Decode joined rows into [`ClientRow`] with an explicit absent-phone state.
//!
//! # Invariants
//! - Criterion values are only ever bound parameters; SQL text is built from
//!   static fragments alone.
//! - Clause list and bind list grow together, so placeholder order always
//!   matches value order.
//! - Result ordering is deterministic: `c.id ASC, p.id ASC`.

use crate::model::client::{non_empty, ClientField, ClientId};
use rusqlite::types::Value;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

const CLIENT_SEARCH_SQL: &str = "SELECT
    c.id AS client_id,
    c.first_name AS first_name,
    c.last_name AS last_name,
    c.email AS email,
    p.phone AS phone
FROM clients c
LEFT JOIN phones p ON p.client_id = c.id";

const CLIENT_SEARCH_ORDER_SQL: &str = " ORDER BY c.id ASC, p.id ASC";

/// Conjunctive search criteria. `None` leaves a field unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFilter {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl ClientFilter {
    /// Builds criteria from raw strings, treating `""` as unconstrained.
    pub fn from_parts(first_name: &str, last_name: &str, email: &str, phone: &str) -> Self {
        Self {
            first_name: non_empty(first_name),
            last_name: non_empty(last_name),
            email: non_empty(email),
            phone: non_empty(phone),
        }
    }

    pub fn by_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    pub fn by_phone(phone: impl Into<String>) -> Self {
        Self {
            phone: Some(phone.into()),
            ..Self::default()
        }
    }

    /// Returns `true` when every client row is selected.
    pub fn is_unconstrained(&self) -> bool {
        self.criteria().next().is_none()
    }

    fn criteria(&self) -> impl Iterator<Item = (ClientField, &str)> + '_ {
        [
            (ClientField::FirstName, self.first_name.as_deref()),
            (ClientField::LastName, self.last_name.as_deref()),
            (ClientField::Email, self.email.as_deref()),
            (ClientField::Phone, self.phone.as_deref()),
        ]
        .into_iter()
        .filter_map(|(field, value)| match value {
            Some(value) if !value.is_empty() => Some((field, value)),
            _ => None,
        })
    }
}

/// One joined search row.
///
/// A client with N phones yields N rows; a client with no phones yields one
/// row whose `phone` is `None`. `Some("")` would be a stored empty number,
/// which the schema forbids, but the two states stay distinct here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRow {
    pub client_id: ClientId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl ClientRow {
    pub fn has_phone(&self) -> bool {
        self.phone.is_some()
    }
}

/// Parameterized search statement produced from a [`ClientFilter`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchStatement {
    pub sql: String,
    pub bind_values: Vec<Value>,
}

/// Composes the search statement for `filter`.
///
/// Each present criterion appends one `AND <column> = ?` clause and one bound
/// value, in that order.
pub fn build_search_statement(filter: &ClientFilter) -> SearchStatement {
    let mut sql = format!("{CLIENT_SEARCH_SQL} WHERE 1 = 1");
    let mut bind_values: Vec<Value> = Vec::new();

    for (field, value) in filter.criteria() {
        sql.push_str(predicate_clause(field));
        bind_values.push(Value::Text(value.to_string()));
    }

    sql.push_str(CLIENT_SEARCH_ORDER_SQL);
    SearchStatement { sql, bind_values }
}

fn predicate_clause(field: ClientField) -> &'static str {
    match field {
        ClientField::FirstName => " AND c.first_name = ?",
        ClientField::LastName => " AND c.last_name = ?",
        ClientField::Email => " AND c.email = ?",
        // Filtering on the joined row drops clients without a matching phone.
        ClientField::Phone => " AND p.phone = ?",
    }
}

pub(crate) fn parse_client_row(row: &Row<'_>) -> rusqlite::Result<ClientRow> {
    Ok(ClientRow {
        client_id: row.get("client_id")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        email: row.get("email")?,
        phone: row.get("phone")?,
    })
}
