// ==========================================
// 农业作业管理系统 - 列类型转换
// ==========================================
// 数量: TEXT 十进制字符串 <-> rust_decimal::Decimal
// 时间: TEXT "%Y-%m-%d %H:%M:%S" / "%Y-%m-%d"
// 枚举: TEXT（未知取值报错，不回退默认值）
// ==========================================

use crate::db::{DATE_FORMAT, TS_FORMAT};
use crate::domain::types::Quantity;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::types::Type;
use rusqlite::Row;
use std::str::FromStr;

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

pub(crate) fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub(crate) fn fmt_date(d: &NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

pub(crate) fn decimal_col(row: &Row, idx: usize) -> rusqlite::Result<Quantity> {
    let raw: String = row.get(idx)?;
    Quantity::from_str(raw.trim())
        .map_err(|e| conversion_error(idx, format!("无效数量 '{}': {}", raw, e)))
}

pub(crate) fn opt_decimal_col(row: &Row, idx: usize) -> rusqlite::Result<Option<Quantity>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(s) => Quantity::from_str(s.trim())
            .map(Some)
            .map_err(|e| conversion_error(idx, format!("无效数量 '{}': {}", s, e))),
    }
}

pub(crate) fn ts_col(row: &Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TS_FORMAT)
        .map_err(|e| conversion_error(idx, format!("无效时间 '{}': {}", raw, e)))
}

pub(crate) fn opt_ts_col(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(s) => NaiveDateTime::parse_from_str(&s, TS_FORMAT)
            .map(Some)
            .map_err(|e| conversion_error(idx, format!("无效时间 '{}': {}", s, e))),
    }
}

pub(crate) fn date_col(row: &Row, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|e| conversion_error(idx, format!("无效日期 '{}': {}", raw, e)))
}

pub(crate) fn opt_date_col(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(&s, DATE_FORMAT)
            .map(Some)
            .map_err(|e| conversion_error(idx, format!("无效日期 '{}': {}", s, e))),
    }
}

pub(crate) fn enum_col<T>(
    row: &Row,
    idx: usize,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| conversion_error(idx, format!("未知枚举值 '{}'", raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::ReservationStatus;
    use rusqlite::Connection;
    use rust_decimal::Decimal;

    #[test]
    fn test_decimal_col_parses_text() {
        let conn = Connection::open_in_memory().unwrap();
        let v = conn
            .query_row("SELECT '12.500'", [], |row| decimal_col(row, 0))
            .unwrap();
        assert_eq!(v, Decimal::new(125, 1));
    }

    #[test]
    fn test_bad_values_fail_instead_of_defaulting() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(conn.query_row("SELECT 'abc'", [], |row| decimal_col(row, 0)).is_err());
        assert!(conn
            .query_row("SELECT 'PENDING'", [], |row| {
                enum_col(row, 0, ReservationStatus::from_db_str)
            })
            .is_err());
        let none = conn
            .query_row("SELECT NULL", [], |row| opt_decimal_col(row, 0))
            .unwrap();
        assert_eq!(none, None);
    }
}
