// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

//! Write operations for the metadata store.
//!
//! Rows are inserted whole and never partially updated; a changed instance is
//! rewritten with [`MetadataDb::rewrite_row`].

use rusqlite::{Connection, params, params_from_iter};
use tracing::debug;

use crate::connection::MetadataDb;
use crate::error::{Error, Result, SchemaError};
use crate::schema::{ID_COLUMN, quote_ident};
use crate::types::{IntoValue, Value};

type Entries = Vec<(String, Value)>;

fn collect_entries<I, K, V>(values: I) -> Entries
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: IntoValue,
{
    values
        .into_iter()
        .map(|(k, v)| (k.into(), v.into_value()))
        .collect()
}

/// Insert one row through an open connection or transaction.
fn insert_entries(conn: &Connection, table: &str, entries: &Entries) -> Result<i64> {
    let table = quote_ident(table)?;
    if entries.is_empty() {
        conn.execute(&format!("INSERT INTO {table} DEFAULT VALUES"), [])?;
        return Ok(conn.last_insert_rowid());
    }

    let mut columns = Vec::with_capacity(entries.len());
    let mut bindings = Vec::with_capacity(entries.len());
    for (i, (name, _)) in entries.iter().enumerate() {
        columns.push(quote_ident(name)?);
        bindings.push(format!("?{}", i + 1));
    }
    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        columns.join(", "),
        bindings.join(", ")
    );
    conn.prepare_cached(&sql)?
        .execute(params_from_iter(entries.iter().map(|(_, v)| v)))?;
    Ok(conn.last_insert_rowid())
}

impl MetadataDb {
    /// Make sure every name in `columns` exists in `table`.
    ///
    /// Missing columns are created as TEXT when implicit creation is enabled,
    /// otherwise the first one is reported as [`SchemaError::UnknownColumn`].
    fn prepare_columns<'a>(
        &mut self,
        table: &str,
        columns: impl IntoIterator<Item = &'a str>,
    ) -> Result<()> {
        let existing = self.column_names(table)?;
        let mut missing: Vec<&str> = Vec::new();
        for name in columns {
            if !existing.iter().any(|c| c == name) && !missing.contains(&name) {
                missing.push(name);
            }
        }
        if missing.is_empty() {
            return Ok(());
        }
        if !self.options().implicit_columns {
            return Err(SchemaError::UnknownColumn {
                table: table.to_owned(),
                column: missing[0].to_owned(),
            }
            .into());
        }
        debug!("Implicitly creating columns in {table}: {missing:?}");
        self.ensure_text_columns(table, &missing)?;
        Ok(())
    }

    /// Insert one row. Columns absent from `values` are left NULL.
    ///
    /// Returns the identifier assigned to the row.
    pub fn insert_row<I, K, V>(&mut self, table: &str, values: I) -> Result<i64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoValue,
    {
        let entries = collect_entries(values);
        self.prepare_columns(table, entries.iter().map(|(c, _)| c.as_str()))?;
        let id = insert_entries(self.connect()?, table, &entries)?;
        self.finish_write()?;
        Ok(id)
    }

    /// Insert several rows in one transaction.
    pub fn insert_rows<R, I, K, V>(&mut self, table: &str, rows: R) -> Result<Vec<i64>>
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoValue,
    {
        let rows: Vec<Entries> = rows.into_iter().map(collect_entries).collect();
        self.prepare_columns(
            table,
            rows.iter().flat_map(|r| r.iter().map(|(c, _)| c.as_str())),
        )?;

        let tx = self.connect()?.transaction()?;
        let mut ids = Vec::with_capacity(rows.len());
        for entries in &rows {
            ids.push(insert_entries(&tx, table, entries)?);
        }
        tx.commit()?;
        debug!("Inserted {} row(s) into {table}", ids.len());
        self.finish_write()?;
        Ok(ids)
    }

    /// Replace row `id` wholesale, keeping its identifier.
    ///
    /// Columns absent from `values` become NULL.
    pub fn rewrite_row<I, K, V>(&mut self, table: &str, id: i64, values: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoValue,
    {
        let mut entries = collect_entries(values);
        entries.retain(|(c, _)| c != ID_COLUMN);
        self.prepare_columns(table, entries.iter().map(|(c, _)| c.as_str()))?;
        entries.insert(0, (ID_COLUMN.to_owned(), Value::Integer(id)));

        let quoted = quote_ident(table)?;
        let tx = self.connect()?.transaction()?;
        let deleted = tx.execute(
            &format!("DELETE FROM {quoted} WHERE {} = ?1", quote_ident(ID_COLUMN)?),
            params![id],
        )?;
        if deleted == 0 {
            // dropping the transaction rolls back
            return Err(Error::RowNotFound {
                table: table.to_owned(),
                id,
            });
        }
        insert_entries(&tx, table, &entries)?;
        tx.commit()?;
        debug!("Rewrote row {id} in {table}");
        self.finish_write()
    }

    /// Delete rows whose `column` equals `value`. Returns the number removed.
    pub fn delete_rows(&mut self, table: &str, column: &str, value: impl IntoValue) -> Result<usize> {
        if !self.column_names(table)?.iter().any(|c| c == column) {
            return Err(SchemaError::UnknownColumn {
                table: table.to_owned(),
                column: column.to_owned(),
            }
            .into());
        }
        let sql = format!(
            "DELETE FROM {} WHERE {} IS ?1",
            quote_ident(table)?,
            quote_ident(column)?
        );
        let removed = self.connect()?.execute(&sql, params![value.into_value()])?;
        debug!("Deleted {removed} row(s) from {table}");
        self.finish_write()?;
        Ok(removed)
    }
}
