//! Append-only SQLite store of per-candidate results and per-table diffs.

use std::path::Path;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};

use crate::compare::ComparisonResult;
use crate::error::StoreError;
use crate::tuner::MethodRecord;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS method_results (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    table_id         TEXT NOT NULL,
    method           TEXT NOT NULL,
    structure_method TEXT NOT NULL,
    cell_method      TEXT NOT NULL,
    boundary_summary TEXT NOT NULL,
    grid_summary     TEXT NOT NULL,
    quality_score    REAL,
    execution_ms     INTEGER NOT NULL,
    recorded_at      TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_method_results_table ON method_results(table_id);

CREATE TABLE IF NOT EXISTS table_diffs (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    table_id            TEXT NOT NULL,
    method              TEXT NOT NULL,
    cell_accuracy       REAL NOT NULL,
    structural_coverage REAL NOT NULL,
    fuzzy_accuracy      REAL NOT NULL,
    row_splits          INTEGER NOT NULL,
    row_merges          INTEGER NOT NULL,
    column_splits       INTEGER NOT NULL,
    column_merges       INTEGER NOT NULL,
    gt_rows             INTEGER NOT NULL,
    gt_cols             INTEGER NOT NULL,
    extracted_rows      INTEGER NOT NULL,
    extracted_cols      INTEGER NOT NULL,
    comparison_json     TEXT NOT NULL,
    recorded_at         TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_table_diffs_table ON table_diffs(table_id);
";

/// One candidate's outcome for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodResult {
    pub table_id: String,
    pub structure_method: String,
    pub cell_method: String,
    pub boundary_summary: String,
    pub grid_summary: String,
    pub quality_score: Option<f64>,
    pub execution_ms: u64,
}

impl MethodResult {
    /// `structure+cell`.
    #[must_use]
    pub fn method(&self) -> String {
        format!("{}+{}", self.structure_method, self.cell_method)
    }
}

fn sql_int(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

pub struct EvaluationStore {
    conn: Connection,
}

impl EvaluationStore {
    /// Open (creating if needed) a store file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the database cannot be opened or the
    /// schema cannot be created.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Self::with_connection(conn)
    }

    /// A throwaway in-memory store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the schema cannot be created.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    pub fn record_method_result(&self, result: &MethodResult) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO method_results (table_id, method, structure_method, cell_method,
                 boundary_summary, grid_summary, quality_score, execution_ms, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                result.table_id,
                result.method(),
                result.structure_method,
                result.cell_method,
                result.boundary_summary,
                result.grid_summary,
                result.quality_score,
                i64::try_from(result.execution_ms).unwrap_or(i64::MAX),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// # Errors
    ///
    /// Returns [`StoreError`] when the comparison cannot be encoded or the
    /// insert fails.
    pub fn record_table_diff(
        &self,
        table_id: &str,
        method: &str,
        comparison: &ComparisonResult,
    ) -> Result<i64, StoreError> {
        let json = serde_json::to_string(comparison)?;
        self.conn.execute(
            "INSERT INTO table_diffs (table_id, method, cell_accuracy, structural_coverage,
                 fuzzy_accuracy, row_splits, row_merges, column_splits, column_merges,
                 gt_rows, gt_cols, extracted_rows, extracted_cols, comparison_json, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                table_id,
                method,
                comparison.cell_accuracy,
                comparison.structural_coverage,
                comparison.fuzzy_accuracy,
                sql_int(comparison.row_splits.len()),
                sql_int(comparison.row_merges.len()),
                sql_int(comparison.column_splits.len()),
                sql_int(comparison.column_merges.len()),
                sql_int(comparison.gt_shape.0),
                sql_int(comparison.gt_shape.1),
                sql_int(comparison.extracted_shape.0),
                sql_int(comparison.extracted_shape.1),
                json,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Every recorded candidate score, grouped by table and best first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    pub fn method_scores(&self) -> Result<Vec<MethodRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT table_id, method, quality_score FROM method_results
             ORDER BY table_id, quality_score IS NULL, quality_score DESC, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(MethodRecord {
                table_id: row.get(0)?,
                method: row.get(1)?,
                quality_score: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// The highest-scoring record of each table that has any score.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    pub fn best_per_table(&self) -> Result<Vec<MethodRecord>, StoreError> {
        let mut best: Vec<MethodRecord> = Vec::new();
        for record in self.method_scores()? {
            if record.quality_score.is_none() {
                continue;
            }
            if best
                .last()
                .is_none_or(|last| last.table_id != record.table_id)
            {
                best.push(record);
            }
        }
        Ok(best)
    }

    /// Most recently stored comparison for `table_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails or the stored JSON no
    /// longer decodes.
    pub fn latest_comparison(&self, table_id: &str) -> Result<Option<ComparisonResult>, StoreError> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT comparison_json FROM table_diffs WHERE table_id = ?1
                 ORDER BY id DESC LIMIT 1",
                params![table_id],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(StoreError::from)
    }
}
