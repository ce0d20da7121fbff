//! SQL text construction for the generic CRUD operations.
//!
//! Identifiers come only from the [`TableSchema`] and are double-quoted. Values
//! are always bound as text parameters with an explicit cast to the registered
//! column type, so Postgres does the parsing (`'2024-09-01'::date`,
//! `'[1,2]'::jsonb`, ...). Every row-returning statement yields one `jsonb`
//! column built with `to_jsonb`, which keeps the row shape schema-free.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::registry::{ColumnType, TableSchema, ID_COLUMN};

/// A parameterised statement ready to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub sql: String,
    /// Positional parameters `$1..$n`; `None` binds SQL `NULL`.
    pub params: Vec<Option<String>>,
}

/// Errors produced while building a statement from request input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StatementError {
    #[error("unknown column {column} for table {table}")]
    UnknownColumn { table: String, column: String },

    #[error("column {0} does not accept object or array values")]
    StructuredValue(String),

    #[error("invalid id {id:?} for table {table}")]
    InvalidId { table: String, id: String },

    #[error("update body for table {0} has no columns")]
    EmptyUpdate(String),
}

/// Quote an identifier for inclusion in SQL text.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `SELECT` every row of `table`, in the table's registered order.
pub fn select_all(table: &str, schema: &TableSchema) -> Statement {
    let mut sql = format!("SELECT to_jsonb(t) FROM {} AS t", quote_ident(table));
    if let Some(order) = &schema.order_by {
        sql.push_str(&format!(
            " ORDER BY t.{} {}",
            quote_ident(&order.column),
            order.direction.sql()
        ));
    }
    Statement {
        sql,
        params: Vec::new(),
    }
}

/// `SELECT` the row of `table` whose id is `id`.
pub fn select_by_id(table: &str, schema: &TableSchema, id: &str) -> Result<Statement, StatementError> {
    check_id(table, schema, id)?;
    Ok(Statement {
        sql: format!(
            "SELECT to_jsonb(t) FROM {} AS t WHERE t.{} = $1::{}",
            quote_ident(table),
            quote_ident(ID_COLUMN),
            schema.id_type().sql_name()
        ),
        params: vec![Some(id.to_owned())],
    })
}

/// `INSERT` one row using every key of `row` as a column; returns the new row.
pub fn insert(
    table: &str,
    schema: &TableSchema,
    row: &Map<String, Value>,
) -> Result<Statement, StatementError> {
    let bound = bind_columns(table, schema, row)?;
    let insert = if bound.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING *", quote_ident(table))
    } else {
        let columns: Vec<String> = bound.iter().map(|c| quote_ident(c.name)).collect();
        let placeholders: Vec<String> = bound
            .iter()
            .enumerate()
            .map(|(i, c)| format!("${}::{}", i + 1, c.ty.sql_name()))
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING *",
            quote_ident(table),
            columns.join(", "),
            placeholders.join(", ")
        )
    };
    Ok(Statement {
        sql: format!("WITH t AS ({insert}) SELECT to_jsonb(t) FROM t"),
        params: bound.into_iter().map(|c| c.value).collect(),
    })
}

/// `UPDATE` the row with id `id`, assigning every key of `row`; returns the
/// updated row (none if the id does not exist).
pub fn update(
    table: &str,
    schema: &TableSchema,
    id: &str,
    row: &Map<String, Value>,
) -> Result<Statement, StatementError> {
    check_id(table, schema, id)?;
    let bound = bind_columns(table, schema, row)?;
    if bound.is_empty() {
        return Err(StatementError::EmptyUpdate(table.to_owned()));
    }
    let assignments: Vec<String> = bound
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ${}::{}", quote_ident(c.name), i + 1, c.ty.sql_name()))
        .collect();
    let id_param = bound.len() + 1;
    let sql = format!(
        "WITH t AS (UPDATE {} SET {} WHERE {} = ${}::{} RETURNING *) SELECT to_jsonb(t) FROM t",
        quote_ident(table),
        assignments.join(", "),
        quote_ident(ID_COLUMN),
        id_param,
        schema.id_type().sql_name()
    );
    let mut params: Vec<Option<String>> = bound.into_iter().map(|c| c.value).collect();
    params.push(Some(id.to_owned()));
    Ok(Statement { sql, params })
}

/// `DELETE` the row with id `id`. Deleting a missing id is not an error.
pub fn delete(table: &str, schema: &TableSchema, id: &str) -> Result<Statement, StatementError> {
    check_id(table, schema, id)?;
    Ok(Statement {
        sql: format!(
            "DELETE FROM {} WHERE {} = $1::{}",
            quote_ident(table),
            quote_ident(ID_COLUMN),
            schema.id_type().sql_name()
        ),
        params: vec![Some(id.to_owned())],
    })
}

/// Check that every key of `row` is a registered column of `table`.
pub fn check_columns(
    table: &str,
    schema: &TableSchema,
    row: &Map<String, Value>,
) -> Result<(), StatementError> {
    match row.keys().find(|column| schema.column(column).is_none()) {
        Some(column) => Err(StatementError::UnknownColumn {
            table: table.to_owned(),
            column: column.clone(),
        }),
        None => Ok(()),
    }
}

/// Replace every non-null value in a JSON column with its JSON text, so
/// callers always read those columns back as strings. A JSON string scalar
/// keeps its quotes.
pub fn stringify_json_columns(schema: &TableSchema, row: &mut Map<String, Value>) {
    for column in schema.json_columns() {
        if let Some(value) = row.get_mut(column).filter(|v| !v.is_null()) {
            *value = Value::String(value.to_string());
        }
    }
}

struct BoundColumn<'a> {
    name: &'a str,
    ty: ColumnType,
    value: Option<String>,
}

fn bind_columns<'a>(
    table: &str,
    schema: &TableSchema,
    row: &'a Map<String, Value>,
) -> Result<Vec<BoundColumn<'a>>, StatementError> {
    check_columns(table, schema, row)?;
    row.iter()
        .map(|(name, value)| {
            let ty = schema.column(name).unwrap_or(ColumnType::Text);
            Ok(BoundColumn {
                name,
                ty,
                value: bind_value(name, ty, value)?,
            })
        })
        .collect()
}

fn bind_value(column: &str, ty: ColumnType, value: &Value) -> Result<Option<String>, StatementError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Array(_) | Value::Object(_) if ty.is_json() => Ok(Some(value.to_string())),
        Value::Array(_) | Value::Object(_) => Err(StatementError::StructuredValue(column.to_owned())),
    }
}

/// Check that `id` is a well-formed key for `table`.
pub fn check_id(table: &str, schema: &TableSchema, id: &str) -> Result<(), StatementError> {
    if schema.accepts_id(id) {
        Ok(())
    } else {
        Err(StatementError::InvalidId {
            table: table.to_owned(),
            id: id.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use serde_json::json;

    const ID: &str = "6f1c2f9e-3f0a-4b8e-9d55-2a7f0c1e4b11";

    fn registry() -> Registry {
        Registry::builtin().unwrap()
    }

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn select_all_applies_registered_order() {
        let reg = registry();
        let stmt = select_all("attendance", reg.table("attendance").unwrap());
        assert_eq!(
            stmt.sql,
            r#"SELECT to_jsonb(t) FROM "attendance" AS t ORDER BY t."date" DESC"#
        );
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn select_all_unordered_table() {
        let reg = registry();
        let stmt = select_all("meal_menus", reg.table("meal_menus").unwrap());
        assert_eq!(stmt.sql, r#"SELECT to_jsonb(t) FROM "meal_menus" AS t"#);
    }

    #[test]
    fn select_by_id_binds_id_with_key_cast() {
        let reg = registry();
        let stmt = select_by_id("children", reg.table("children").unwrap(), ID).unwrap();
        assert_eq!(
            stmt.sql,
            r#"SELECT to_jsonb(t) FROM "children" AS t WHERE t."id" = $1::uuid"#
        );
        assert_eq!(stmt.params, vec![Some(ID.to_owned())]);
    }

    #[test]
    fn malformed_id_rejected_before_sql() {
        let reg = registry();
        let err = select_by_id("children", reg.table("children").unwrap(), "1; DROP TABLE children")
            .unwrap_err();
        assert!(matches!(err, StatementError::InvalidId { .. }));
    }

    #[test]
    fn insert_casts_each_value_to_column_type() {
        let reg = registry();
        let row = map(json!({
            "amount": 125.5,
            "due_date": "2026-11-01",
            "status": "pending",
        }));
        let stmt = insert("invoices", reg.table("invoices").unwrap(), &row).unwrap();
        assert_eq!(
            stmt.sql,
            r#"WITH t AS (INSERT INTO "invoices" ("amount", "due_date", "status") VALUES ($1::numeric, $2::date, $3::text) RETURNING *) SELECT to_jsonb(t) FROM t"#
        );
        assert_eq!(
            stmt.params,
            vec![
                Some("125.5".to_owned()),
                Some("2026-11-01".to_owned()),
                Some("pending".to_owned())
            ]
        );
    }

    #[test]
    fn insert_null_binds_none() {
        let reg = registry();
        let row = map(json!({"classroom_id": null}));
        let stmt = insert("children", reg.table("children").unwrap(), &row).unwrap();
        assert_eq!(stmt.params, vec![None]);
    }

    #[test]
    fn insert_empty_body_uses_defaults() {
        let reg = registry();
        let stmt = insert("meal_menus", reg.table("meal_menus").unwrap(), &Map::new()).unwrap();
        assert_eq!(
            stmt.sql,
            r#"WITH t AS (INSERT INTO "meal_menus" DEFAULT VALUES RETURNING *) SELECT to_jsonb(t) FROM t"#
        );
    }

    #[test]
    fn json_column_value_serialised_to_text() {
        let reg = registry();
        let row = map(json!({"recurring_charges": [{"name": "tuition", "amount": 200}]}));
        let stmt = insert("children", reg.table("children").unwrap(), &row).unwrap();
        assert!(stmt.sql.contains("$1::jsonb"));
        assert_eq!(
            stmt.params,
            vec![Some(r#"[{"amount":200,"name":"tuition"}]"#.to_owned())]
        );
    }

    #[test]
    fn json_column_string_passed_through() {
        let reg = registry();
        let row = map(json!({"child_ids": "[\"a\",\"b\"]"}));
        let stmt = insert("app_users", reg.table("app_users").unwrap(), &row).unwrap();
        assert_eq!(stmt.params, vec![Some(r#"["a","b"]"#.to_owned())]);
    }

    #[test]
    fn structured_value_in_text_column_rejected() {
        let reg = registry();
        let row = map(json!({"first_name": {"given": "Ava"}}));
        let err = insert("children", reg.table("children").unwrap(), &row).unwrap_err();
        assert_eq!(err, StatementError::StructuredValue("first_name".into()));
    }

    #[test]
    fn unknown_column_rejected() {
        let reg = registry();
        let row = map(json!({"first_name": "Ava", "is_admin\" = true --": "x"}));
        let err = insert("children", reg.table("children").unwrap(), &row).unwrap_err();
        assert!(matches!(err, StatementError::UnknownColumn { .. }));
    }

    #[test]
    fn update_places_id_after_assignments() {
        let reg = registry();
        let row = map(json!({"status": "present", "check_out": "17:05"}));
        let stmt = update("attendance", reg.table("attendance").unwrap(), ID, &row).unwrap();
        assert_eq!(
            stmt.sql,
            r#"WITH t AS (UPDATE "attendance" SET "check_out" = $1::text, "status" = $2::text WHERE "id" = $3::uuid RETURNING *) SELECT to_jsonb(t) FROM t"#
        );
        assert_eq!(
            stmt.params,
            vec![
                Some("17:05".to_owned()),
                Some("present".to_owned()),
                Some(ID.to_owned())
            ]
        );
    }

    #[test]
    fn update_with_empty_body_rejected() {
        let reg = registry();
        let err = update("attendance", reg.table("attendance").unwrap(), ID, &Map::new()).unwrap_err();
        assert_eq!(err, StatementError::EmptyUpdate("attendance".into()));
    }

    #[test]
    fn delete_by_id() {
        let reg = registry();
        let stmt = delete("invoices", reg.table("invoices").unwrap(), ID).unwrap();
        assert_eq!(stmt.sql, r#"DELETE FROM "invoices" WHERE "id" = $1::uuid"#);
        assert_eq!(stmt.params, vec![Some(ID.to_owned())]);
    }

    #[test]
    fn read_side_json_columns_become_text() {
        let reg = registry();
        let mut row = map(json!({
            "id": ID,
            "operating_hours": {"Monday": {"open": "07:00"}},
            "name": "Little Oaks",
        }));
        stringify_json_columns(reg.table("company_info").unwrap(), &mut row);
        assert_eq!(row["operating_hours"], r#"{"Monday":{"open":"07:00"}}"#);
        assert_eq!(row["name"], "Little Oaks");
    }

    #[test]
    fn read_side_null_json_column_stays_null() {
        let reg = registry();
        let mut row = map(json!({"child_ids": null}));
        stringify_json_columns(reg.table("app_users").unwrap(), &mut row);
        assert_eq!(row["child_ids"], Value::Null);
    }

    #[test]
    fn read_side_json_string_scalar_keeps_quotes() {
        let reg = registry();
        let mut row = map(json!({"bathroom_times": "abc"}));
        stringify_json_columns(reg.table("daily_activities").unwrap(), &mut row);
        assert_eq!(row["bathroom_times"], r#""abc""#);
    }

    #[test]
    fn quote_ident_doubles_quotes() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
