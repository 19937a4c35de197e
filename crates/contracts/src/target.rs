//! TableName / PersistenceTarget - durable destination identity
//!
//! The target table is resolved once at startup and is read-only afterwards.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, OnceLock};

use crate::ContractError;

/// Maximum identifier length accepted by MySQL
const MAX_TABLE_NAME_LEN: usize = 64;

/// Length of the `%Y%m%d_%H%M%S` suffix appended by [`TableName::timestamped`]
pub const TIMESTAMP_SUFFIX_LEN: usize = 15;

/// Validated SQL table identifier.
///
/// Only ASCII letters, digits and `_` are accepted, so the name can be quoted
/// with backticks and interpolated into statements safely.
///
/// # Examples
/// ```
/// use contracts::TableName;
///
/// let table = TableName::new("gyro_data_20250101_120000").unwrap();
/// assert_eq!(table.as_str(), "gyro_data_20250101_120000");
/// assert!(TableName::new("gyro; DROP TABLE x").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TableName(Arc<str>);

impl TableName {
    /// Create a new TableName, validating the identifier
    pub fn new(name: &str) -> Result<Self, ContractError> {
        validate_identifier(name)?;
        Ok(Self(Arc::from(name)))
    }

    /// Build `<prefix>%Y%m%d_%H%M%S` from the given instant
    pub fn timestamped<Tz: TimeZone>(prefix: &str, now: &DateTime<Tz>) -> Result<Self, ContractError>
    where
        Tz::Offset: fmt::Display,
    {
        Self::new(&format!("{}{}", prefix, now.format("%Y%m%d_%H%M%S")))
    }

    /// Get the underlying string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Check a table name or table name prefix
pub fn validate_identifier(name: &str) -> Result<(), ContractError> {
    if name.is_empty() {
        return Err(ContractError::invalid_table_name(name, "name cannot be empty"));
    }
    if name.len() > MAX_TABLE_NAME_LEN {
        return Err(ContractError::invalid_table_name(
            name,
            format!("name longer than {} characters", MAX_TABLE_NAME_LEN),
        ));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(ContractError::invalid_table_name(
            name,
            format!("invalid character {:?}", c),
        ));
    }
    Ok(())
}

/// Check a prefix for [`TableName::timestamped`], leaving room for the suffix
pub fn validate_table_prefix(prefix: &str) -> Result<(), ContractError> {
    validate_identifier(prefix)?;
    let max = MAX_TABLE_NAME_LEN - TIMESTAMP_SUFFIX_LEN;
    if prefix.len() > max {
        return Err(ContractError::invalid_table_name(
            prefix,
            format!("prefix longer than {} characters", max),
        ));
    }
    Ok(())
}

impl Deref for TableName {
    type Target = str;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableName({:?})", self.0)
    }
}

impl Serialize for TableName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TableName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).map_err(serde::de::Error::custom)
    }
}

/// Write-once persistence target shared between the supervisor and the writer.
///
/// Cloning shares the same cell.
#[derive(Debug, Clone, Default)]
pub struct PersistenceTarget(Arc<OnceLock<TableName>>);

impl PersistenceTarget {
    /// Create an unresolved target
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a target that is already resolved
    pub fn resolved(table: TableName) -> Self {
        let target = Self::new();
        // A fresh cell cannot be occupied.
        let _ = target.0.set(table);
        target
    }

    /// Resolve the target. Fails if it was already resolved.
    pub fn resolve(&self, table: TableName) -> Result<(), ContractError> {
        self.0.set(table).map_err(|_| ContractError::TargetAlreadyResolved {
            current: self.0.get().map(|t| t.to_string()).unwrap_or_default(),
        })
    }

    /// Read the resolved table
    ///
    /// # Errors
    /// `ContractError::TargetNotResolved` if `resolve` has not been called yet
    pub fn get(&self) -> Result<&TableName, ContractError> {
        self.0.get().ok_or(ContractError::TargetNotResolved)
    }

    /// Check whether the target has been resolved
    pub fn is_resolved(&self) -> bool {
        self.0.get().is_some()
    }
}
