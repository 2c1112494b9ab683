// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

//! Dynamic schema operations: tables and columns created on demand.
//!
//! Tables start with only the identity column and grow one column per tag name.
//! Columns are never dropped implicitly; [`MetadataDb::delete_column`] rebuilds
//! the table inside a single transaction.

use rusqlite::params;
use tracing::debug;

use crate::connection::MetadataDb;
use crate::error::{Result, SchemaError};

/// Name of the auto-assigned row identifier column.
pub const ID_COLUMN: &str = "id";

/// Names that can never be declared as metadata columns.
pub const RESERVED_IDENTIFIERS: &[&str] = &[ID_COLUMN, "rowid", "oid", "_rowid_"];

/// Declared SQLite storage type of a column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColumnType {
    #[default]
    Text,
    Integer,
    Real,
    Numeric,
    Blob,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            ColumnType::Text => "TEXT",
            ColumnType::Integer => "INTEGER",
            ColumnType::Real => "REAL",
            ColumnType::Numeric => "NUMERIC",
            ColumnType::Blob => "BLOB",
        }
    }
}

/// A column to be declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text)
    }
}

/// One row of `PRAGMA table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub cid: i64,
    pub name: String,
    /// Declared type as written in the schema (may be empty)
    pub decl_type: String,
    pub not_null: bool,
    pub primary_key: bool,
}

/// Quote an identifier for interpolation into SQL text.
pub(crate) fn quote_ident(name: &str) -> std::result::Result<String, SchemaError> {
    if name.is_empty() || name.contains('\0') {
        return Err(SchemaError::InvalidIdentifier(name.to_owned()));
    }
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Decide which of `defs` must be added to a table holding `existing`.
fn plan_additions<'a>(
    table: &str,
    existing: &[String],
    defs: &'a [ColumnDef],
) -> std::result::Result<Vec<&'a ColumnDef>, SchemaError> {
    let mut planned: Vec<&ColumnDef> = Vec::new();
    for def in defs {
        quote_ident(&def.name)?;
        if RESERVED_IDENTIFIERS.contains(&def.name.as_str()) {
            return Err(SchemaError::ReservedIdentifier(def.name.clone()));
        }
        let known = existing
            .iter()
            .map(String::as_str)
            .chain(planned.iter().map(|d| d.name.as_str()));
        let mut skip = false;
        for name in known {
            if name == def.name {
                skip = true;
                break;
            }
            // SQLite column names are case-insensitive
            if name.eq_ignore_ascii_case(&def.name) {
                return Err(SchemaError::CaseConflict {
                    table: table.to_owned(),
                    requested: def.name.clone(),
                    existing: name.to_owned(),
                });
            }
        }
        if !skip {
            planned.push(def);
        }
    }
    Ok(planned)
}

impl MetadataDb {
    /// Create `table` with only the identity column if it does not exist.
    pub fn ensure_table(&mut self, table: &str) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({} INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL)",
            quote_ident(table)?,
            quote_ident(ID_COLUMN)?
        );
        self.connect()?.execute(&sql, [])?;
        debug!("Ensured table {table}");
        self.finish_write()
    }

    /// Table names compare case-insensitively, as in SQL.
    pub fn has_table(&mut self, table: &str) -> Result<bool> {
        let count: i64 = self.connect()?.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1 COLLATE NOCASE",
            params![table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Names of all user tables.
    pub fn table_names(&mut self) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare_cached(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let mut names = Vec::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            names.push(row.get(0)?);
        }
        Ok(names)
    }

    /// Column descriptions of `table`, in table order.
    pub fn column_info(&mut self, table: &str) -> Result<Vec<ColumnInfo>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare_cached(
            r#"SELECT cid, name, type, "notnull", pk FROM pragma_table_info(?1) ORDER BY cid"#,
        )?;
        let mut columns = Vec::new();
        let mut rows = stmt.query(params![table])?;
        while let Some(row) = rows.next()? {
            columns.push(ColumnInfo {
                cid: row.get(0)?,
                name: row.get(1)?,
                decl_type: row.get(2)?,
                not_null: row.get::<_, i64>(3)? != 0,
                primary_key: row.get::<_, i64>(4)? != 0,
            });
        }
        if columns.is_empty() {
            return Err(SchemaError::UnknownTable(table.to_owned()).into());
        }
        Ok(columns)
    }

    pub fn column_names(&mut self, table: &str) -> Result<Vec<String>> {
        Ok(self
            .column_info(table)?
            .into_iter()
            .map(|c| c.name)
            .collect())
    }

    /// Add every column of `defs` that `table` does not have yet.
    ///
    /// Existing names are skipped. Returns the names actually added.
    pub fn ensure_columns(&mut self, table: &str, defs: &[ColumnDef]) -> Result<Vec<String>> {
        let existing = self.column_names(table)?;
        let planned = plan_additions(table, &existing, defs)?;
        if planned.is_empty() {
            return Ok(Vec::new());
        }

        let quoted_table = quote_ident(table)?;
        let tx = self.connect()?.transaction()?;
        for def in &planned {
            tx.execute(
                &format!(
                    "ALTER TABLE {quoted_table} ADD COLUMN {} {}",
                    quote_ident(&def.name)?,
                    def.ty.as_sql()
                ),
                [],
            )?;
        }
        tx.commit()?;

        let added: Vec<String> = planned.into_iter().map(|d| d.name.clone()).collect();
        debug!("Added {} column(s) to {table}: {added:?}", added.len());
        self.finish_write()?;
        Ok(added)
    }

    /// [`MetadataDb::ensure_columns`] with every column declared TEXT.
    pub fn ensure_text_columns<S: AsRef<str>>(
        &mut self,
        table: &str,
        names: &[S],
    ) -> Result<Vec<String>> {
        let defs: Vec<ColumnDef> = names.iter().map(|n| ColumnDef::text(n.as_ref())).collect();
        self.ensure_columns(table, &defs)
    }

    pub fn rename_table(&mut self, from: &str, to: &str) -> Result<()> {
        if !self.has_table(from)? {
            return Err(SchemaError::UnknownTable(from.to_owned()).into());
        }
        if self.has_table(to)? {
            return Err(SchemaError::TableExists(to.to_owned()).into());
        }
        let sql = format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_ident(from)?,
            quote_ident(to)?
        );
        self.connect()?.execute(&sql, [])?;
        debug!("Renamed table {from} to {to}");
        self.finish_write()
    }

    /// Drop `table`. Returns false if it did not exist.
    pub fn drop_table(&mut self, table: &str) -> Result<bool> {
        if !self.has_table(table)? {
            return Ok(false);
        }
        let sql = format!("DROP TABLE IF EXISTS {}", quote_ident(table)?);
        self.connect()?.execute(&sql, [])?;
        debug!("Dropped table {table}");
        self.finish_write()?;
        Ok(true)
    }

    /// Remove `column` from `table`, preserving every other column and row.
    ///
    /// The table is copied without the column, the original dropped and the
    /// copy renamed, all in one transaction. Returns false if the column did
    /// not exist.
    pub fn delete_column(&mut self, table: &str, column: &str) -> Result<bool> {
        if column == ID_COLUMN {
            return Err(SchemaError::ReservedIdentifier(column.to_owned()).into());
        }
        let info = self.column_info(table)?;
        if !info.iter().any(|c| c.name == column) {
            return Ok(false);
        }

        let keep: Vec<&ColumnInfo> = info
            .iter()
            .filter(|c| c.name != column && c.name != ID_COLUMN)
            .collect();
        let has_id = info.iter().any(|c| c.name == ID_COLUMN);

        let mut tmp = format!("{table}__rebuild");
        let mut attempt = 1;
        while self.has_table(&tmp)? {
            attempt += 1;
            tmp = format!("{table}__rebuild{attempt}");
        }

        let quoted_table = quote_ident(table)?;
        let quoted_tmp = quote_ident(&tmp)?;
        let quoted_id = quote_ident(ID_COLUMN)?;

        let mut decls = vec![format!(
            "{quoted_id} INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL"
        )];
        let mut copied = Vec::new();
        if has_id {
            copied.push(quoted_id.clone());
        }
        for c in &keep {
            let name = quote_ident(&c.name)?;
            decls.push(format!("{name} {}", c.decl_type).trim_end().to_owned());
            copied.push(name);
        }
        let copied = copied.join(", ");

        let sql = format!(
            r#"
            CREATE TABLE {quoted_tmp} ({decls});
            INSERT INTO {quoted_tmp} ({copied}) SELECT {copied} FROM {quoted_table};
            DROP TABLE {quoted_table};
            ALTER TABLE {quoted_tmp} RENAME TO {quoted_table};
            "#,
            decls = decls.join(", "),
        );

        let tx = self.connect()?.transaction()?;
        tx.execute_batch(&sql)?;
        tx.commit()?;
        debug!("Deleted column {column} from {table}");
        self.finish_write()?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("PatientID").unwrap(), "\"PatientID\"");
        assert_eq!(quote_ident("a\"b").unwrap(), "\"a\"\"b\"");
        assert!(quote_ident("").is_err());
        assert!(quote_ident("a\0b").is_err());
    }

    #[test]
    fn test_plan_skips_existing_and_duplicates() {
        let existing = names(&["id", "PatientID"]);
        let defs = vec![
            ColumnDef::text("PatientID"),
            ColumnDef::text("Modality"),
            ColumnDef::text("Modality"),
        ];
        let planned = plan_additions("t", &existing, &defs).unwrap();
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].name, "Modality");
    }

    #[test]
    fn test_plan_rejects_reserved() {
        let err = plan_additions("t", &names(&["id"]), &[ColumnDef::text("id")]).unwrap_err();
        assert_eq!(err, SchemaError::ReservedIdentifier("id".into()));
    }

    #[test]
    fn test_plan_rejects_case_variant() {
        let err =
            plan_additions("t", &names(&["id", "Modality"]), &[ColumnDef::text("MODALITY")])
                .unwrap_err();
        assert!(matches!(err, SchemaError::CaseConflict { ref existing, .. } if existing == "Modality"));

        // "ID" is not reserved verbatim but clashes with the identity column
        let err = plan_additions("t", &names(&["id"]), &[ColumnDef::text("ID")]).unwrap_err();
        assert!(matches!(err, SchemaError::CaseConflict { .. }));
    }

    #[test]
    fn test_column_type_sql() {
        assert_eq!(ColumnType::default().as_sql(), "TEXT");
        assert_eq!(ColumnType::Real.as_sql(), "REAL");
    }
}
