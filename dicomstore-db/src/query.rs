// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

//! Keyword queries against a metadata table.
//!
//! Filter values are always bound as parameters. Column and table names are
//! checked against the live schema before they are quoted into the query text.

use rusqlite::{params, params_from_iter};
use tracing::debug;

use crate::connection::MetadataDb;
use crate::error::{Error, QueryError, Result, SchemaError};
use crate::schema::{ColumnInfo, ID_COLUMN, quote_ident};
use crate::types::{IntoValue, Row, Value, value_to_text};

/// Which columns a query returns.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    /// Every column, in table order
    #[default]
    All,
    /// Exactly these columns, in this order
    Columns(Vec<String>),
}

/// A filtered, optionally sorted and projected read of one table.
///
/// Filters combine with AND. With [`Query::partial_match`] each filter is a
/// case-sensitive substring test instead of equality.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    table: String,
    filters: Vec<(String, Value)>,
    sort_by: Option<String>,
    partial_match: bool,
    projection: Projection,
}

/// Options for [`MetadataDb::column_values`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnValues {
    pub distinct: bool,
    pub sorted: bool,
}

impl Default for ColumnValues {
    fn default() -> Self {
        Self {
            distinct: true,
            sorted: true,
        }
    }
}

/// SQL fragments for one query against a known schema.
struct Plan {
    table: String,
    select_list: String,
    /// WHERE and ORDER BY clauses, with a leading space when present
    tail: String,
    params: Vec<Value>,
    projected: Vec<String>,
}

fn quote(name: &str) -> std::result::Result<String, QueryError> {
    quote_ident(name).map_err(|_| QueryError::InvalidIdentifier(name.to_owned()))
}

impl Query {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            sort_by: None,
            partial_match: false,
            projection: Projection::All,
        }
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl IntoValue) -> Self {
        self.filters.push((column.into(), value.into_value()));
        self
    }

    pub fn sort_by(mut self, column: impl Into<String>) -> Self {
        self.sort_by = Some(column.into());
        self
    }

    pub fn partial_match(mut self, enabled: bool) -> Self {
        self.partial_match = enabled;
        self
    }

    pub fn project<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Projection::Columns(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn filters(&self) -> &[(String, Value)] {
        &self.filters
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    fn plan(&self, columns: &[ColumnInfo]) -> std::result::Result<Plan, QueryError> {
        let check = |name: &str| -> std::result::Result<String, QueryError> {
            if columns.iter().any(|c| c.name == name) {
                quote(name)
            } else {
                Err(QueryError::UnknownColumn {
                    table: self.table.clone(),
                    column: name.to_owned(),
                })
            }
        };

        let projected: Vec<String> = match &self.projection {
            Projection::All => columns.iter().map(|c| c.name.clone()).collect(),
            Projection::Columns(list) => list.clone(),
        };
        let select_list = projected
            .iter()
            .map(|name| check(name))
            .collect::<std::result::Result<Vec<_>, _>>()?
            .join(", ");

        let mut conditions = Vec::with_capacity(self.filters.len());
        let mut params = Vec::with_capacity(self.filters.len());
        for (name, value) in &self.filters {
            let column = check(name)?;
            let n = params.len() + 1;
            match (self.partial_match, value_to_text(value)) {
                (true, Some(text)) => {
                    conditions.push(format!("instr(CAST({column} AS TEXT), ?{n}) > 0"));
                    params.push(Value::Text(text));
                }
                _ => {
                    conditions.push(format!("{column} IS ?{n}"));
                    params.push(value.clone());
                }
            }
        }

        let mut tail = String::new();
        if !conditions.is_empty() {
            tail.push_str(" WHERE ");
            tail.push_str(&conditions.join(" AND "));
        }
        if let Some(sort) = &self.sort_by {
            tail.push_str(" ORDER BY ");
            tail.push_str(&check(sort)?);
        }

        Ok(Plan {
            table: quote(&self.table)?,
            select_list,
            tail,
            params,
            projected,
        })
    }
}

impl MetadataDb {
    fn source_columns(&mut self, table: &str) -> Result<Vec<ColumnInfo>> {
        match self.column_info(table) {
            Err(Error::Schema(SchemaError::UnknownTable(t))) => {
                Err(QueryError::UnknownTable(t).into())
            }
            other => other,
        }
    }

    /// Run `query` and return the matching rows.
    pub fn query(&mut self, query: &Query) -> Result<Vec<Row>> {
        let columns = self.source_columns(query.table())?;
        let plan = query.plan(&columns)?;
        let sql = format!("SELECT {} FROM {}{}", plan.select_list, plan.table, plan.tail);
        debug!("{sql}");

        let conn = self.connect()?;
        let mut stmt = conn.prepare_cached(&sql)?;
        let mut rows = stmt.query(params_from_iter(plan.params.iter()))?;
        let mut result = Vec::new();
        while let Some(row) = rows.next()? {
            let mut out = Row::new();
            for (i, name) in plan.projected.iter().enumerate() {
                out.push(name.as_str(), row.get::<_, Value>(i)?);
            }
            result.push(out);
        }
        Ok(result)
    }

    /// Persist the result of `query` as table `destination`, replacing any
    /// existing table of that name. Returns the number of rows copied.
    ///
    /// The destination gets its own identity column; projected columns keep
    /// their declared types. Source ids are kept when `id` is projected.
    pub fn materialize(&mut self, query: &Query, destination: &str) -> Result<usize> {
        if destination.eq_ignore_ascii_case(query.table()) {
            return Err(QueryError::DestinationIsSource(destination.to_owned()).into());
        }
        let columns = self.source_columns(query.table())?;
        let plan = query.plan(&columns)?;
        let dest = quote(destination)?;
        let quoted_id = quote(ID_COLUMN)?;

        let mut decls = vec![format!(
            "{quoted_id} INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL"
        )];
        for name in plan.projected.iter().filter(|n| *n != ID_COLUMN) {
            let decl_type = columns
                .iter()
                .find(|c| &c.name == name)
                .map(|c| c.decl_type.as_str())
                .unwrap_or_default();
            decls.push(format!("{} {decl_type}", quote(name)?).trim_end().to_owned());
        }

        let insert = format!(
            "INSERT INTO {dest} ({}) SELECT {} FROM {}{}",
            plan.select_list, plan.select_list, plan.table, plan.tail
        );
        debug!("{insert}");

        let tx = self.connect()?.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {dest}"), [])?;
        tx.execute(&format!("CREATE TABLE {dest} ({})", decls.join(", ")), [])?;
        let copied = tx.execute(&insert, params_from_iter(plan.params.iter()))?;
        tx.commit()?;

        debug!("Materialized {copied} row(s) from {} into {destination}", query.table());
        self.finish_write()?;
        Ok(copied)
    }

    /// Fetch the row with identifier `id`.
    ///
    /// Returns `None` if no row matches.
    pub fn row_by_id(&mut self, table: &str, id: i64) -> Result<Option<Row>> {
        let rows = self.query(&Query::new(table).filter(ID_COLUMN, id))?;
        Ok(rows.into_iter().next())
    }

    /// Values of one column across the table, NULLs excluded.
    pub fn column_values(
        &mut self,
        table: &str,
        column: &str,
        options: ColumnValues,
    ) -> Result<Vec<Value>> {
        let columns = self.source_columns(table)?;
        if !columns.iter().any(|c| c.name == column) {
            return Err(QueryError::UnknownColumn {
                table: table.to_owned(),
                column: column.to_owned(),
            }
            .into());
        }
        let column_q = quote(column)?;
        let mut sql = format!(
            "SELECT {}{column_q} FROM {} WHERE {column_q} IS NOT NULL",
            if options.distinct { "DISTINCT " } else { "" },
            quote(table)?
        );
        if options.sorted {
            sql.push_str(&format!(" ORDER BY {column_q}"));
        }

        let conn = self.connect()?;
        let mut stmt = conn.prepare_cached(&sql)?;
        let mut rows = stmt.query([])?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            values.push(row.get(0)?);
        }
        Ok(values)
    }

    /// Count the rows of `table`.
    pub fn count_rows(&mut self, table: &str) -> Result<u64> {
        self.source_columns(table)?;
        let count: i64 = self.connect()?.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote(table)?),
            params![],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<ColumnInfo> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| ColumnInfo {
                cid: i as i64,
                name: name.to_string(),
                decl_type: "TEXT".into(),
                not_null: false,
                primary_key: false,
            })
            .collect()
    }

    #[test]
    fn test_plan_equality_filters() {
        let cols = columns(&["id", "PatientID", "Modality"]);
        let plan = Query::new("dicom")
            .filter("PatientID", "P1")
            .filter("Modality", "PT")
            .sort_by("id")
            .plan(&cols)
            .unwrap();
        assert_eq!(plan.select_list, r#""id", "PatientID", "Modality""#);
        assert_eq!(
            plan.tail,
            r#" WHERE "PatientID" IS ?1 AND "Modality" IS ?2 ORDER BY "id""#
        );
        assert_eq!(
            plan.params,
            vec![Value::Text("P1".into()), Value::Text("PT".into())]
        );
    }

    #[test]
    fn test_plan_partial_match_binds_text() {
        let cols = columns(&["id", "SeriesDescription"]);
        let plan = Query::new("dicom")
            .filter("SeriesDescription", "WB")
            .partial_match(true)
            .project(["SeriesDescription"])
            .plan(&cols)
            .unwrap();
        assert_eq!(plan.select_list, r#""SeriesDescription""#);
        assert_eq!(
            plan.tail,
            r#" WHERE instr(CAST("SeriesDescription" AS TEXT), ?1) > 0"#
        );
        assert_eq!(plan.projected, vec!["SeriesDescription".to_string()]);
    }

    #[test]
    fn test_plan_rejects_unknown_column() {
        let cols = columns(&["id"]);
        let err = Query::new("dicom")
            .filter("PatientID", "P1")
            .plan(&cols)
            .err()
            .unwrap();
        assert_eq!(
            err,
            QueryError::UnknownColumn {
                table: "dicom".into(),
                column: "PatientID".into()
            }
        );

        let err = Query::new("dicom").sort_by("Missing").plan(&cols).err().unwrap();
        assert!(matches!(err, QueryError::UnknownColumn { .. }));
    }

    #[test]
    fn test_plan_without_filters_has_no_where() {
        let plan = Query::new("dicom").plan(&columns(&["id"])).unwrap();
        assert!(plan.tail.is_empty());
        assert!(plan.params.is_empty());
    }
}
