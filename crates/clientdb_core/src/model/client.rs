//! Client and phone domain model.
//!
//! # Responsibility
//! - Define the records stored in `clients` and `phones`.
//! - Validate caller input before it reaches the store.
//!
//! # Invariants
//! - `ClientId`/`PhoneId` are assigned by the store and never reused.
//! - Required text fields are non-empty and within column limits.
//! - An empty update field means "leave unchanged", never "clear".

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-assigned client identifier.
pub type ClientId = i64;

/// Store-assigned phone identifier.
pub type PhoneId = i64;

pub const MAX_NAME_CHARS: usize = 50;
pub const MAX_EMAIL_CHARS: usize = 100;
pub const MAX_PHONE_CHARS: usize = 30;

/// Persisted client record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub first_name: String,
    pub last_name: String,
    /// Unique across all clients.
    pub email: String,
}

/// Persisted phone record owned by one client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phone {
    pub id: PhoneId,
    pub client_id: ClientId,
    pub phone: String,
}

/// Input for creating a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClient {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl NewClient {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
        }
    }

    /// Checks required fields and column limits.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        validate_required(ClientField::FirstName, &self.first_name)?;
        validate_required(ClientField::LastName, &self.last_name)?;
        validate_required(ClientField::Email, &self.email)?;
        Ok(())
    }
}

/// Field-by-field client update.
///
/// `None` leaves the column unchanged. [`ClientUpdate::from_parts`] maps empty
/// strings to `None`, so callers holding raw form input can pass it through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

impl ClientUpdate {
    pub fn from_parts(first_name: &str, last_name: &str, email: &str) -> Self {
        Self {
            first_name: non_empty(first_name),
            last_name: non_empty(last_name),
            email: non_empty(email),
        }
    }

    /// Returns `true` when no column would be touched.
    pub fn is_empty(&self) -> bool {
        self.changes().next().is_none()
    }

    /// Yields the columns to update, in stable column order.
    ///
    /// `Some("")` is treated the same as `None`.
    pub fn changes(&self) -> impl Iterator<Item = (ClientField, &str)> + '_ {
        [
            (ClientField::FirstName, self.first_name.as_deref()),
            (ClientField::LastName, self.last_name.as_deref()),
            (ClientField::Email, self.email.as_deref()),
        ]
        .into_iter()
        .filter_map(|(field, value)| match value {
            Some(value) if !value.is_empty() => Some((field, value)),
            _ => None,
        })
    }

    /// Checks every supplied field against its column limit.
    pub fn validate(&self) -> Result<(), ClientValidationError> {
        for (field, value) in self.changes() {
            validate_required(field, value)?;
        }
        Ok(())
    }
}

/// Columns addressable by search criteria and updates.
///
/// `Phone` lives in `phones`; updates only ever yield the `clients` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientField {
    FirstName,
    LastName,
    Email,
    Phone,
}

impl ClientField {
    /// Column name in the owning table.
    pub fn column(self) -> &'static str {
        match self {
            Self::FirstName => "first_name",
            Self::LastName => "last_name",
            Self::Email => "email",
            Self::Phone => "phone",
        }
    }

    fn max_chars(self) -> usize {
        match self {
            Self::FirstName | Self::LastName => MAX_NAME_CHARS,
            Self::Email => MAX_EMAIL_CHARS,
            Self::Phone => MAX_PHONE_CHARS,
        }
    }
}

impl Display for ClientField {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// Caller input that violates the client contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientValidationError {
    EmptyField(ClientField),
    TooLong {
        field: ClientField,
        max_chars: usize,
        actual_chars: usize,
    },
}

impl Display for ClientValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyField(field) => write!(f, "{field} must not be empty"),
            Self::TooLong {
                field,
                max_chars,
                actual_chars,
            } => write!(
                f,
                "{field} must be at most {max_chars} characters, got {actual_chars}"
            ),
        }
    }
}

impl Error for ClientValidationError {}

/// Checks one phone number before it is stored.
pub fn validate_phone(phone: &str) -> Result<(), ClientValidationError> {
    validate_required(ClientField::Phone, phone)
}

fn validate_required(field: ClientField, value: &str) -> Result<(), ClientValidationError> {
    if value.is_empty() {
        return Err(ClientValidationError::EmptyField(field));
    }

    let actual_chars = value.chars().count();
    if actual_chars > field.max_chars() {
        return Err(ClientValidationError::TooLong {
            field,
            max_chars: field.max_chars(),
            actual_chars,
        });
    }

    Ok(())
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
