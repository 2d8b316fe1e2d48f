use crate::udbc::value::Value;
use rusqlite::types::{Value as SqliteValue, ValueRef};

pub fn from_sqlite_value(v: ValueRef<'_>) -> Value {
    match v {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::I64(i),
        ValueRef::Real(f) => Value::F64(f),
        ValueRef::Text(b) => match std::str::from_utf8(b) {
            Ok(s) => Value::Str(s.to_string()),
            Err(_) => Value::Bytes(b.to_vec()),
        },
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

pub fn to_sqlite_value(v: &Value) -> SqliteValue {
    match v {
        Value::Null => SqliteValue::Null,
        Value::Bool(b) => SqliteValue::Integer(if *b { 1 } else { 0 }),
        Value::I64(i) => SqliteValue::Integer(*i),
        // SQLite integers are signed 64-bit
        Value::U64(u) => match i64::try_from(*u) {
            Ok(i) => SqliteValue::Integer(i),
            Err(_) => SqliteValue::Text(u.to_string()),
        },
        Value::F64(f) => SqliteValue::Real(*f),
        Value::Str(s) => SqliteValue::Text(s.clone()),
        Value::Bytes(b) => SqliteValue::Blob(b.clone()),
        Value::Date(d) => SqliteValue::Text(d.to_string()),
        Value::Time(t) => SqliteValue::Text(t.to_string()),
        Value::DateTime(dt) => SqliteValue::Text(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
        Value::Decimal(d) => SqliteValue::Text(d.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_large_unsigned_falls_back_to_text() {
        assert_eq!(to_sqlite_value(&Value::U64(7)), SqliteValue::Integer(7));
        assert_eq!(
            to_sqlite_value(&Value::U64(u64::MAX)),
            SqliteValue::Text(u64::MAX.to_string())
        );
    }

    #[test]
    fn test_datetime_as_text() {
        let dt = NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(
            to_sqlite_value(&Value::DateTime(dt)),
            SqliteValue::Text("2024-02-29 08:30:00".to_string())
        );
    }
}
