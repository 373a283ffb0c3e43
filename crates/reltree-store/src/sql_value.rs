//! Conversions between core values and SQLite values

use reltree_core::{RecordId, Value};
use rusqlite::types::{Value as SqlValue, ValueRef};

pub fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Real(r) => SqlValue::Real(*r),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Blob(b) => SqlValue::Blob(b.clone()),
    }
}

pub fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(r) => Value::Real(r),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

pub fn id_to_sql(id: &RecordId) -> SqlValue {
    match id {
        RecordId::Int(i) => SqlValue::Integer(*i),
        RecordId::Text(s) => SqlValue::Text(s.clone()),
    }
}

pub fn id_from_sql(value: ValueRef<'_>) -> Option<RecordId> {
    RecordId::from_value(&from_sql(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_classes_survive() {
        for value in [
            Value::Null,
            Value::Integer(-3),
            Value::Real(1.5),
            Value::from("x"),
            Value::Blob(vec![0, 255]),
        ] {
            let sql = to_sql(&value);
            assert_eq!(from_sql(ValueRef::from(&sql)), value);
        }
    }

    #[test]
    fn test_id_roundtrip_keeps_kind() {
        let text = RecordId::from("0190a1b2");
        assert_eq!(id_from_sql(ValueRef::from(&id_to_sql(&text))), Some(text));
        assert_eq!(id_from_sql(ValueRef::Null), None);
    }
}
