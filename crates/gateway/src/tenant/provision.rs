//! `POST /api/provision`: create a daycare with its admin user and company
//! profile in one transaction.

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use chrono::{DateTime, Duration, Utc};
use common::protocol::{ProvisionRequest, ProvisionResponse};
use serde_json::Value;
use sqlx::PgConnection;
use tracing::info;

use super::DAYCARES;
use crate::db::{self, statement, Row};
use crate::error::ApiError;
use crate::registry::{TableSchema, ID_COLUMN};
use crate::resource::{lookup, present};
use crate::server::state::AppState;
use common::ServiceError;

const APP_USERS: &str = "app_users";
const COMPANY_INFO: &str = "company_info";

/// Characters used for daycare codes and generated passwords. No `I`, `O`,
/// `0` or `1`. The length divides 256, so `byte % len` is unbiased.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LEN: usize = 6;
pub const PASSWORD_LEN: usize = 12;
pub const TRIAL_DAYS: i64 = 14;

/// Daycare columns copied onto the company profile.
const PROFILE_COLUMNS: &[&str] = &["name", "address", "city", "state", "zip_code", "phone", "email"];

pub async fn provision(state: &AppState, req: ProvisionRequest) -> Result<ProvisionResponse, ApiError> {
    let registry = state.registry.load();
    let daycares = lookup(&registry, DAYCARES)?;
    let users = lookup(&registry, APP_USERS)?;
    let company = lookup(&registry, COMPANY_INFO)?;

    statement::check_columns(DAYCARES, daycares, &req.daycare)?;
    let (daycare, code) = daycare_row(daycares, req.daycare, Utc::now())?;
    let (password, generated) = match req.admin_password.filter(|p| !p.is_empty()) {
        Some(password) => (password, false),
        None => (random_token(PASSWORD_LEN), true),
    };

    let mut tx = state.database.begin().await?;
    let mut daycare = insert_one(&mut tx, DAYCARES, daycares, &daycare).await?;
    let mut admin = insert_one(&mut tx, APP_USERS, users, &admin_row(users, &daycare, &code, &password)).await?;
    let mut profile = insert_one(&mut tx, COMPANY_INFO, company, &company_row(company, &daycare)).await?;
    tx.commit().await?;

    info!(
        daycare_id = ?daycare.get(ID_COLUMN),
        daycare_code = %code,
        "daycare provisioned"
    );

    present(daycares, None, &mut daycare);
    present(users, None, &mut admin);
    present(company, None, &mut profile);
    Ok(ProvisionResponse {
        daycare: Value::Object(daycare),
        admin_user: Value::Object(admin),
        company_info: Value::Object(profile),
        generated_password: generated.then_some(password),
    })
}

async fn insert_one(
    conn: &mut PgConnection,
    table: &str,
    schema: &TableSchema,
    row: &Row,
) -> Result<Row, ApiError> {
    let stmt = statement::insert(table, schema, row)?;
    db::fetch_optional_row(&mut *conn, &stmt)
        .await?
        .ok_or_else(|| ServiceError::Internal(format!("insert into {table} returned no row")).into())
}

/// `len` characters drawn from [`CODE_ALPHABET`] with the OS CSPRNG.
pub fn random_token(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    OsRng.fill_bytes(&mut bytes);
    bytes
        .iter()
        .map(|b| CODE_ALPHABET[usize::from(*b) % CODE_ALPHABET.len()] as char)
        .collect()
}

/// Complete the requested daycare row; returns it with its code.
fn daycare_row(schema: &TableSchema, mut row: Row, now: DateTime<Utc>) -> Result<(Row, String), ApiError> {
    let has_name = row
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|name| !name.trim().is_empty());
    if !has_name {
        return Err(ApiError::bad_request("daycare.name is required"));
    }

    let code = match row.get("daycare_code").and_then(Value::as_str).map(str::trim) {
        Some(code) if !code.is_empty() => code.to_uppercase(),
        _ => random_token(CODE_LEN),
    };
    set(schema, &mut row, "daycare_code", code.clone());
    if row.get("status").map_or(true, Value::is_null) {
        set(schema, &mut row, "status", "active");
    }
    set(schema, &mut row, "subscription_status", "trial");
    set(
        schema,
        &mut row,
        "trial_ends_at",
        (now + Duration::days(TRIAL_DAYS)).to_rfc3339(),
    );
    Ok((row, code))
}

fn admin_row(schema: &TableSchema, daycare: &Row, code: &str, password: &str) -> Row {
    let code = code.to_lowercase();
    let name = daycare.get("name").and_then(Value::as_str).unwrap_or_default();
    let email = daycare
        .get("email")
        .and_then(Value::as_str)
        .filter(|e| !e.is_empty())
        .map_or_else(|| format!("admin@{code}.daycare"), str::to_owned);

    let mut row = Row::new();
    copy_id(schema, daycare, &mut row);
    set(schema, &mut row, "username", format!("admin_{code}"));
    set(schema, &mut row, "password", password);
    set(schema, &mut row, "role", "admin");
    set(schema, &mut row, "full_name", format!("{name} Admin"));
    set(schema, &mut row, "email", email);
    set(schema, &mut row, "status", "active");
    row
}

fn company_row(schema: &TableSchema, daycare: &Row) -> Row {
    let mut row = Row::new();
    copy_id(schema, daycare, &mut row);
    for column in PROFILE_COLUMNS {
        if let Some(value) = daycare.get(*column).filter(|v| !v.is_null()) {
            set(schema, &mut row, column, value.clone());
        }
    }
    row
}

fn copy_id(schema: &TableSchema, daycare: &Row, row: &mut Row) {
    if let Some(id) = daycare.get(ID_COLUMN) {
        set(schema, row, "daycare_id", id.clone());
    }
}

/// Set `column` only if the table registers it.
fn set(schema: &TableSchema, row: &mut Row, column: &str, value: impl Into<Value>) {
    if schema.column(column).is_some() {
        row.insert(column.to_owned(), value.into());
    }
}
