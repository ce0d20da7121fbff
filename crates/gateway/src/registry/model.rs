//! Registry document model and validation.
//!
//! The registry is the allow-list of tables and columns the gateway will put
//! into SQL text. Anything not named here is rejected before a statement is
//! built; column types drive the cast applied to each bound value.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;

use crate::crypto::{ENCRYPTED_TABLE, PII_COLUMNS};

/// Name of the primary key column every table must declare.
pub const ID_COLUMN: &str = "id";

/// `/api/{name}` segments taken by integration and tenant routes.
pub const RESERVED_NAMES: &[&str] = &["qbo", "stripe", "provision", "access"];

/// Errors produced while parsing or validating a registry document.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry document is not valid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid identifier {0:?}: only lowercase letters, digits and '_' are allowed")]
    InvalidIdentifier(String),

    #[error("table {0} has no {ID_COLUMN} column")]
    MissingId(String),

    #[error("table {table}: column {ID_COLUMN} has unsupported key type {ty:?}")]
    UnsupportedIdType { table: String, ty: ColumnType },

    #[error("table {table}: order_by column {column} is not declared")]
    UnknownOrderColumn { table: String, column: String },

    #[error("table {ENCRYPTED_TABLE}: PII column {0} must be declared as text")]
    PiiColumn(String),

    #[error("table name {0} is reserved for a built-in route")]
    ReservedName(String),
}

/// Postgres column types the gateway knows how to cast a bound text value to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Varchar,
    Smallint,
    Integer,
    Bigint,
    Numeric,
    Real,
    DoublePrecision,
    Boolean,
    Date,
    Time,
    Timestamp,
    Timestamptz,
    Uuid,
    Json,
    Jsonb,
}

impl ColumnType {
    /// The SQL type name used in `$n::<type>` casts.
    pub fn sql_name(self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Varchar => "varchar",
            ColumnType::Smallint => "smallint",
            ColumnType::Integer => "integer",
            ColumnType::Bigint => "bigint",
            ColumnType::Numeric => "numeric",
            ColumnType::Real => "real",
            ColumnType::DoublePrecision => "double precision",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Time => "time",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Timestamptz => "timestamptz",
            ColumnType::Uuid => "uuid",
            ColumnType::Json => "json",
            ColumnType::Jsonb => "jsonb",
        }
    }

    /// JSON-valued columns accept structured values (serialised to text on
    /// write) and are returned as text on read.
    pub fn is_json(self) -> bool {
        matches!(self, ColumnType::Json | ColumnType::Jsonb)
    }

    fn is_textual(self) -> bool {
        matches!(self, ColumnType::Text | ColumnType::Varchar)
    }

    fn is_integer(self) -> bool {
        matches!(
            self,
            ColumnType::Smallint | ColumnType::Integer | ColumnType::Bigint
        )
    }

    fn is_valid_key(self) -> bool {
        self.is_textual() || self.is_integer() || self == ColumnType::Uuid
    }
}

/// Sort direction of a table's default ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Default ordering applied to `GET /api/{table}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderBy {
    pub column: String,
    #[serde(default)]
    pub direction: Direction,
}

/// One registered table.
#[derive(Debug, Clone, Deserialize)]
pub struct TableSchema {
    pub columns: BTreeMap<String, ColumnType>,
    #[serde(default)]
    pub order_by: Option<OrderBy>,
}

impl TableSchema {
    /// Type of `column`, if registered.
    pub fn column(&self, column: &str) -> Option<ColumnType> {
        self.columns.get(column).copied()
    }

    /// Type of the `id` column. Validation guarantees it exists.
    pub fn id_type(&self) -> ColumnType {
        self.column(ID_COLUMN).unwrap_or(ColumnType::Text)
    }

    /// Names of the JSON-valued columns.
    pub fn json_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|(_, ty)| ty.is_json())
            .map(|(name, _)| name.as_str())
    }

    /// Returns `true` if `id` is a syntactically valid key for this table.
    pub fn accepts_id(&self, id: &str) -> bool {
        let ty = self.id_type();
        if ty == ColumnType::Uuid {
            uuid::Uuid::parse_str(id).is_ok()
        } else if ty == ColumnType::Smallint {
            id.parse::<i16>().is_ok()
        } else if ty == ColumnType::Integer {
            id.parse::<i32>().is_ok()
        } else if ty == ColumnType::Bigint {
            id.parse::<i64>().is_ok()
        } else {
            !id.is_empty()
        }
    }
}

#[derive(Debug, Deserialize)]
struct RegistryDocument {
    tables: BTreeMap<String, TableSchema>,
}

/// Validated set of tables the gateway may address.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tables: BTreeMap<String, TableSchema>,
}

impl Registry {
    /// Parse and validate a YAML registry document.
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] describing the first invalid entry.
    pub fn from_yaml(text: &str) -> Result<Self, RegistryError> {
        let doc: RegistryDocument = serde_yaml::from_str(text)?;
        let registry = Self { tables: doc.tables };
        registry.validate()?;
        Ok(registry)
    }

    /// Look up a table by name.
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn validate(&self) -> Result<(), RegistryError> {
        for (name, schema) in &self.tables {
            ensure_identifier(name)?;
            if RESERVED_NAMES.contains(&name.as_str()) {
                return Err(RegistryError::ReservedName(name.clone()));
            }
            for column in schema.columns.keys() {
                ensure_identifier(column)?;
            }

            let id_type = schema
                .column(ID_COLUMN)
                .ok_or_else(|| RegistryError::MissingId(name.clone()))?;
            if !id_type.is_valid_key() {
                return Err(RegistryError::UnsupportedIdType {
                    table: name.clone(),
                    ty: id_type,
                });
            }

            if let Some(order) = &schema.order_by {
                if schema.column(&order.column).is_none() {
                    return Err(RegistryError::UnknownOrderColumn {
                        table: name.clone(),
                        column: order.column.clone(),
                    });
                }
            }

            if name == ENCRYPTED_TABLE {
                for pii in PII_COLUMNS {
                    match schema.column(pii) {
                        Some(ty) if ty.is_textual() => {}
                        _ => return Err(RegistryError::PiiColumn((*pii).to_owned())),
                    }
                }
            }
        }
        Ok(())
    }
}

/// Identifiers go into SQL text (quoted), so keep them to a boring alphabet.
fn ensure_identifier(name: &str) -> Result<(), RegistryError> {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid_start && valid_rest && name.len() <= 63 {
        Ok(())
    } else {
        Err(RegistryError::InvalidIdentifier(name.to_owned()))
    }
}
