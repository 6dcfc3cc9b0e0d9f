//! Conversion between the core `StoredValue` and rusqlite values

use rusqlite::types::{Value, ValueRef};
use sqlmapper_core::StoredValue;

pub fn to_sql(value: StoredValue) -> Value {
    match value {
        StoredValue::Null => Value::Null,
        StoredValue::Integer(i) => Value::Integer(i),
        StoredValue::Real(f) => Value::Real(f),
        StoredValue::Text(s) => Value::Text(s),
        StoredValue::Blob(b) => Value::Blob(b),
    }
}

pub fn from_sql(value: ValueRef<'_>) -> StoredValue {
    match value {
        ValueRef::Null => StoredValue::Null,
        ValueRef::Integer(i) => StoredValue::Integer(i),
        ValueRef::Real(f) => StoredValue::Real(f),
        ValueRef::Text(t) => StoredValue::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => StoredValue::Blob(b.to_vec()),
    }
}

/// Read every column of `row` in select order
pub fn read_row(row: &rusqlite::Row<'_>, width: usize) -> rusqlite::Result<Vec<StoredValue>> {
    (0..width).map(|i| row.get_ref(i).map(from_sql)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_survive_a_select() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let values = vec![
            StoredValue::Null,
            StoredValue::Integer(-7),
            StoredValue::Real(1.5),
            StoredValue::Text("ann".to_string()),
            StoredValue::Blob(vec![0, 1, 2]),
        ];
        let bound: Vec<Value> = values.iter().cloned().map(to_sql).collect();

        let read = conn
            .query_row(
                "select ?1, ?2, ?3, ?4, ?5",
                rusqlite::params_from_iter(bound.iter()),
                |row| read_row(row, 5),
            )
            .unwrap();

        assert_eq!(read, values);
    }
}
