use crate::udbc::value::Value;
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use mysql_async::Value as MyValue;

pub fn from_mysql_value(v: MyValue) -> Value {
    match v {
        MyValue::NULL => Value::Null,
        MyValue::Int(i) => Value::I64(i),
        MyValue::UInt(u) => Value::U64(u),
        MyValue::Float(f) => Value::F64(f as f64),
        MyValue::Double(d) => Value::F64(d),
        // text protocol results arrive as bytes
        MyValue::Bytes(b) => match String::from_utf8(b) {
            Ok(s) => Value::Str(s),
            Err(e) => Value::Bytes(e.into_bytes()),
        },
        MyValue::Date(y, m, d, h, min, s, micro) => {
            let date = NaiveDate::from_ymd_opt(y as i32, m as u32, d as u32).unwrap_or_default();
            if h == 0 && min == 0 && s == 0 && micro == 0 {
                Value::Date(date)
            } else {
                let dt = date
                    .and_hms_micro_opt(h as u32, min as u32, s as u32, micro)
                    .unwrap_or_default();
                Value::DateTime(dt)
            }
        }
        MyValue::Time(is_neg, days, h, min, s, micro) => {
            let total_h = days * 24 + (h as u32);
            if is_neg || total_h >= 24 {
                let sign = if is_neg { "-" } else { "" };
                return Value::Str(format!(
                    "{}{:02}:{:02}:{:02}.{:06}",
                    sign, total_h, min, s, micro
                ));
            }
            let t = NaiveTime::from_hms_micro_opt(total_h, min as u32, s as u32, micro)
                .unwrap_or_default();
            Value::Time(t)
        }
    }
}

pub fn to_mysql_value(v: &Value) -> MyValue {
    match v {
        Value::Null => MyValue::NULL,
        Value::Bool(b) => MyValue::Int(if *b { 1 } else { 0 }),
        Value::I64(i) => MyValue::Int(*i),
        Value::U64(u) => MyValue::UInt(*u),
        Value::F64(f) => MyValue::Double(*f),
        Value::Str(s) => MyValue::Bytes(s.as_bytes().to_vec()),
        Value::Bytes(b) => MyValue::Bytes(b.clone()),
        Value::Date(d) => to_mysql_date_value(*d, NaiveTime::default()),
        Value::Time(t) => MyValue::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1000,
        ),
        Value::DateTime(dt) => to_mysql_date_value(dt.date(), dt.time()),
        Value::Decimal(d) => MyValue::Bytes(d.to_string().into_bytes()),
    }
}

fn to_mysql_date_value(d: NaiveDate, t: NaiveTime) -> MyValue {
    MyValue::Date(
        d.year() as u16,
        d.month() as u8,
        d.day() as u8,
        t.hour() as u8,
        t.minute() as u8,
        t.second() as u8,
        t.nanosecond() / 1000,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_bytes_become_strings() {
        assert_eq!(
            from_mysql_value(MyValue::Bytes(b"12".to_vec())),
            Value::Str("12".to_string())
        );
        assert_eq!(
            from_mysql_value(MyValue::Bytes(vec![0xff, 0x00])),
            Value::Bytes(vec![0xff, 0x00])
        );
    }

    #[test]
    fn test_datetime_keeps_microseconds() {
        let dt = NaiveDate::from_ymd_opt(2023, 10, 27)
            .unwrap()
            .and_hms_micro_opt(12, 34, 56, 123456)
            .unwrap();
        let my_val = to_mysql_value(&Value::DateTime(dt));
        assert_eq!(my_val, MyValue::Date(2023, 10, 27, 12, 34, 56, 123456));
        assert_eq!(from_mysql_value(my_val), Value::DateTime(dt));
    }

    #[test]
    fn test_midnight_date_reads_as_date() {
        let v = from_mysql_value(MyValue::Date(2024, 1, 2, 0, 0, 0, 0));
        assert_eq!(v, Value::Date(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()));
    }

    #[test]
    fn test_time_outside_a_day_is_text() {
        assert_eq!(
            from_mysql_value(MyValue::Time(false, 1, 2, 3, 4, 0)),
            Value::Str("26:03:04.000000".to_string())
        );
        assert_eq!(
            from_mysql_value(MyValue::Time(true, 0, 1, 0, 0, 0)),
            Value::Str("-01:00:00.000000".to_string())
        );
    }

    #[test]
    fn test_decimal_is_sent_as_text() {
        let d = rust_decimal::Decimal::new(12345, 2);
        assert_eq!(
            to_mysql_value(&Value::Decimal(d)),
            MyValue::Bytes(b"123.45".to_vec())
        );
    }
}
