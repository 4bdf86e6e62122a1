//! Physical storage for dynamically synthesised record tables.
//!
//! Each cached remote table is mirrored by one SQLite table whose columns
//! come from `libs::schema`. This module owns the DDL (create, evolve,
//! index) and the row-level operations (bulk replace, upsert, delete,
//! invalidate). Table and column names are engine-synthesised and SQL-safe;
//! every record value binds as a parameter.
//!
//! Rows are never partially updated: a bulk replace deletes the table's
//! rows and reinserts the new set inside one transaction, and an upsert
//! replaces the whole row by id.

use crate::libs::codec::{self, SqlValue};
use crate::libs::schema::{FieldMapEntry, TableMapping};
use crate::libs::timestamp;
use anyhow::Result;
use rusqlite::{params, Connection, ToSql};
use serde_json::Value;
use std::collections::HashMap;

/// Database interface for the dynamic record tables.
pub struct RecordStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> RecordStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Creates the physical table and its indexes.
    pub fn create_table(&self, table_name: &str, mapping: &TableMapping) -> Result<()> {
        let mut columns = vec!["id TEXT PRIMARY KEY".to_string()];
        for column in mapping.all_columns() {
            columns.push(format!("\"{}\" {}", column.name, column.sql_type.as_sql()));
        }
        columns.push("cached_at TEXT NOT NULL".to_string());
        columns.push("expires_at TEXT NOT NULL".to_string());

        self.conn
            .execute(&format!("CREATE TABLE IF NOT EXISTS \"{}\" ({})", table_name, columns.join(", ")), [])?;

        self.create_index(table_name, "expires_at")?;
        for column in mapping.all_columns().filter(|c| c.indexed) {
            self.create_index(table_name, &column.name)?;
        }
        Ok(())
    }

    /// Adds columns (and their indexes) for fields that appeared during
    /// schema evolution. Existing rows keep NULL in the new columns.
    pub fn add_columns(&self, table_name: &str, entries: &[FieldMapEntry]) -> Result<()> {
        for entry in entries {
            for column in &entry.columns {
                self.conn.execute(
                    &format!(
                        "ALTER TABLE \"{}\" ADD COLUMN \"{}\" {}",
                        table_name,
                        column.name,
                        column.sql_type.as_sql()
                    ),
                    [],
                )?;
                if column.indexed {
                    self.create_index(table_name, &column.name)?;
                }
            }
        }
        Ok(())
    }

    fn create_index(&self, table_name: &str, column: &str) -> Result<()> {
        self.conn.execute(
            &format!("CREATE INDEX IF NOT EXISTS \"idx_{}_{}\" ON \"{}\"(\"{}\")", table_name, column, table_name, column),
            [],
        )?;
        Ok(())
    }

    /// Deletes every row, then inserts the new set under one uniform
    /// `expires_at`, inside a single transaction.
    pub fn replace_all(&self, table_name: &str, mapping: &TableMapping, records: &[Value], cached_at: &str, expires_at: &str) -> Result<usize> {
        // A single logical unit: either the old rows and the new rows swap
        // completely, or nothing changes
        self.conn.execute_batch("BEGIN")?;
        let result = (|| -> Result<usize> {
            self.conn.execute(&format!("DELETE FROM \"{}\"", table_name), [])?;
            let (sql, column_names) = insert_sql(table_name, mapping);
            let mut stmt = self.conn.prepare(&sql)?;
            for record in records {
                let values = row_values(mapping, &column_names, record, cached_at, expires_at);
                let refs: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
                stmt.execute(&refs[..])?;
            }
            Ok(records.len())
        })();

        match result {
            Ok(count) => {
                self.conn.execute_batch("COMMIT")?;
                Ok(count)
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    /// Inserts or replaces one row by record id.
    pub fn upsert(&self, table_name: &str, mapping: &TableMapping, record: &Value, cached_at: &str, expires_at: &str) -> Result<()> {
        let (sql, column_names) = insert_sql(table_name, mapping);
        let values = row_values(mapping, &column_names, record, cached_at, expires_at);
        let refs: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
        self.conn.prepare(&sql)?.execute(&refs[..])?;
        Ok(())
    }

    /// Removes one row by id; missing rows are not an error.
    pub fn delete(&self, table_name: &str, record_id: &str) -> Result<()> {
        self.conn
            .execute(&format!("DELETE FROM \"{}\" WHERE id = ?1", table_name), params![record_id])?;
        Ok(())
    }

    /// True when at least one row is still within TTL.
    pub fn is_valid(&self, table_name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM \"{}\" WHERE expires_at > ?1", table_name),
            params![timestamp::now()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Expires every row without deleting the data.
    pub fn invalidate(&self, table_name: &str) -> Result<()> {
        self.conn
            .execute(&format!("UPDATE \"{}\" SET expires_at = ?1", table_name), params![timestamp::EPOCH])?;
        Ok(())
    }

    /// Reads and reconstructs one record by id.
    pub fn get(&self, table_name: &str, mapping: &TableMapping, record_id: &str) -> Result<Option<Value>> {
        let mut stmt = self.conn.prepare(&format!("SELECT * FROM \"{}\" WHERE id = ?1", table_name))?;
        let column_names: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let mut rows = stmt.query_map(params![record_id], |row| {
            let mut map = codec::Row::new();
            for (index, name) in column_names.iter().enumerate() {
                let value = match row.get_ref(index)? {
                    rusqlite::types::ValueRef::Null => Value::Null,
                    rusqlite::types::ValueRef::Integer(i) => Value::from(i),
                    rusqlite::types::ValueRef::Real(f) => Value::from(f),
                    rusqlite::types::ValueRef::Text(t) => Value::from(String::from_utf8_lossy(t).to_string()),
                    rusqlite::types::ValueRef::Blob(b) => Value::from(String::from_utf8_lossy(b).to_string()),
                };
                map.insert(name.clone(), value);
            }
            Ok(map)
        })?;

        match rows.next().transpose()? {
            Some(row) => Ok(Some(codec::reconstruct_record(mapping, &row))),
            None => Ok(None),
        }
    }
}

/// The INSERT statement and its column order for a mapping.
fn insert_sql(table_name: &str, mapping: &TableMapping) -> (String, Vec<String>) {
    let mut column_names = vec!["id".to_string()];
    column_names.extend(mapping.all_columns().map(|c| c.name.clone()));
    column_names.push("cached_at".to_string());
    column_names.push("expires_at".to_string());

    let quoted: Vec<String> = column_names.iter().map(|c| format!("\"{}\"", c)).collect();
    let placeholders: Vec<&str> = vec!["?"; column_names.len()];
    let sql = format!(
        "INSERT OR REPLACE INTO \"{}\" ({}) VALUES ({})",
        table_name,
        quoted.join(", "),
        placeholders.join(", ")
    );
    (sql, column_names)
}

/// Bind values for one record, aligned with the INSERT column order.
fn row_values(mapping: &TableMapping, column_names: &[String], record: &Value, cached_at: &str, expires_at: &str) -> Vec<SqlValue> {
    let mut extracted: HashMap<String, SqlValue> = codec::extract_record(mapping, record).into_iter().collect();

    let id = record
        .get("id")
        .map(|v| match v {
            Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        })
        .unwrap_or(SqlValue::Null);

    column_names
        .iter()
        .map(|name| match name.as_str() {
            "id" => id.clone(),
            "cached_at" => SqlValue::Text(cached_at.to_string()),
            "expires_at" => SqlValue::Text(expires_at.to_string()),
            other => extracted.remove(other).unwrap_or(SqlValue::Null),
        })
        .collect()
}
