//! Row-level application of the envelope to the fixed PII column list.

use serde_json::{Map, Value};

use super::envelope::{decrypt_or_passthrough, encrypt_value, CipherError};

/// The one table whose rows carry encrypted PII columns.
pub const ENCRYPTED_TABLE: &str = "children";

/// Columns of [`ENCRYPTED_TABLE`] stored as envelopes.
pub const PII_COLUMNS: &[&str] = &[
    "parent_email",
    "parent_phone",
    "emergency_contact",
    "emergency_phone",
    "emergency_contact_2",
    "emergency_phone_2",
    "authorized_pickup_1",
    "authorized_pickup_1_phone",
    "authorized_pickup_2",
    "authorized_pickup_2_phone",
    "authorized_pickup_3",
    "authorized_pickup_3_phone",
    "allergies",
    "medical_notes",
];

/// Returns `true` if `column` is one of the [`PII_COLUMNS`].
pub fn is_pii_column(column: &str) -> bool {
    PII_COLUMNS.contains(&column)
}

/// Encrypt every PII column present in `row`, in place.
///
/// Strings are encrypted (empty strings stay empty), numbers and booleans are
/// encrypted as their JSON text, `null` is left alone. Structured values are
/// left untouched; the registry rejects them for text columns before this runs.
///
/// # Errors
///
/// Propagates [`CipherError`] from the cipher; a failure leaves `row`
/// partially encrypted and must not be written.
pub fn encrypt_row(row: &mut Map<String, Value>, key: &[u8]) -> Result<(), CipherError> {
    for column in PII_COLUMNS {
        let Some(value) = row.get_mut(*column) else {
            continue;
        };
        let plaintext = match value {
            Value::String(s) => std::mem::take(s),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null | Value::Array(_) | Value::Object(_) => continue,
        };
        *value = Value::String(encrypt_value(&plaintext, key)?);
    }
    Ok(())
}

/// Decrypt every PII column present in `row`, in place.
///
/// Values that are not envelopes, or that fail to open, are left exactly as
/// stored.
pub fn decrypt_row(row: &mut Map<String, Value>, key: &[u8]) {
    for column in PII_COLUMNS {
        if let Some(Value::String(stored)) = row.get_mut(*column) {
            *stored = decrypt_or_passthrough(stored, key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::envelope::{is_envelope, KEY_LEN};
    use serde_json::json;

    fn key() -> Vec<u8> {
        vec![0x42u8; KEY_LEN]
    }

    fn as_map(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn encrypts_only_pii_columns() {
        let mut row = as_map(json!({
            "first_name": "Ava",
            "parent_email": "parent@example.com",
            "allergies": "peanuts",
            "daycare_id": "d-1",
        }));
        encrypt_row(&mut row, &key()).unwrap();

        assert_eq!(row["first_name"], "Ava");
        assert_eq!(row["daycare_id"], "d-1");
        assert!(is_envelope(row["parent_email"].as_str().unwrap()));
        assert!(is_envelope(row["allergies"].as_str().unwrap()));
    }

    #[test]
    fn non_pii_columns_are_byte_identical() {
        let original = json!({
            "first_name": "Ava",
            "recurring_charges": [{"amount": 50}],
            "classroom_id": null,
            "status": "active",
            "medical_notes": "asthma",
        });
        let mut row = as_map(original.clone());
        encrypt_row(&mut row, &key()).unwrap();
        for (column, value) in original.as_object().unwrap() {
            if !is_pii_column(column) {
                assert_eq!(&row[column], value, "column {column} changed");
            }
        }
    }

    #[test]
    fn null_and_empty_are_left_alone() {
        let mut row = as_map(json!({"parent_phone": null, "emergency_contact": ""}));
        encrypt_row(&mut row, &key()).unwrap();
        assert_eq!(row["parent_phone"], Value::Null);
        assert_eq!(row["emergency_contact"], "");
    }

    #[test]
    fn absent_columns_stay_absent() {
        let mut row = as_map(json!({"first_name": "Ava"}));
        encrypt_row(&mut row, &key()).unwrap();
        assert_eq!(row.len(), 1);
        assert!(!row.contains_key("parent_email"));
    }

    #[test]
    fn numeric_value_encrypted_as_text() {
        let mut row = as_map(json!({"parent_phone": 5550100}));
        encrypt_row(&mut row, &key()).unwrap();
        decrypt_row(&mut row, &key());
        assert_eq!(row["parent_phone"], "5550100");
    }

    #[test]
    fn decrypt_restores_encrypted_row() {
        let original = json!({
            "first_name": "Ava",
            "parent_email": "parent@example.com",
            "authorized_pickup_3_phone": "555-0199",
        });
        let mut row = as_map(original.clone());
        encrypt_row(&mut row, &key()).unwrap();
        decrypt_row(&mut row, &key());
        assert_eq!(Value::Object(row), original);
    }

    #[test]
    fn decrypt_passes_legacy_plaintext_through() {
        let mut row = as_map(json!({"allergies": "none", "emergency_phone": "555:0100"}));
        decrypt_row(&mut row, &key());
        assert_eq!(row["allergies"], "none");
        assert_eq!(row["emergency_phone"], "555:0100");
    }
}
