//! Report repository: queue operations over the `analysis_reports` table.
//!
//! Every function runs as a single statement (or a single immediate
//! transaction), so each call is atomic on its own. Booking relies on a
//! conditional `UPDATE` and never on the in-process mutex, which keeps it
//! correct when several processes share the database file.

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};
use crate::model::{AnalysisReport, ReportId, ReportStatus};

/// Columns for metadata reads. The payload itself is never selected here.
const REPORT_COLUMNS: &str = "id, project_key, snapshot_id, report_status,
    report_data IS NOT NULL AS has_data, created_at, updated_at, started_at, finished_at";

/// Matches reports whose project already has an earlier report in flight.
/// Expects the outer table to be aliased `r`.
const BLOCKED_BY_EARLIER_WORKING: &str = "EXISTS (
    SELECT 1 FROM analysis_reports w
    WHERE w.project_key = r.project_key
      AND w.report_status = 'WORKING'
      AND w.id < r.id)";

fn conversion_error(idx: usize, ty: Type, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, msg.into())
}

fn millis_to_datetime(idx: usize, millis: i64) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| conversion_error(idx, Type::Integer, format!("timestamp out of range: {millis}")))
}

fn optional_millis(idx: usize, millis: Option<i64>) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    millis.map(|m| millis_to_datetime(idx, m)).transpose()
}

fn report_from_row(row: &Row<'_>) -> Result<AnalysisReport, rusqlite::Error> {
    let status: String = row.get(3)?;
    Ok(AnalysisReport {
        id: ReportId(row.get(0)?),
        project_key: row.get(1)?,
        snapshot_id: row.get(2)?,
        status: status
            .parse()
            .map_err(|e: String| conversion_error(3, Type::Text, e))?,
        has_data: row.get(4)?,
        created_at: millis_to_datetime(5, row.get(5)?)?,
        updated_at: millis_to_datetime(6, row.get(6)?)?,
        started_at: optional_millis(7, row.get(7)?)?,
        finished_at: optional_millis(8, row.get(8)?)?,
    })
}

fn find_by_id_on(conn: &rusqlite::Connection, id: ReportId) -> Result<Option<AnalysisReport>, DatabaseError> {
    let report = conn
        .query_row(
            &format!("SELECT {REPORT_COLUMNS} FROM analysis_reports WHERE id = ?1"),
            params![id.0],
            report_from_row,
        )
        .optional()?;
    Ok(report)
}

/// Inserts a new `PENDING` report and returns its generated id.
pub fn insert(
    db: &Database,
    project_key: &str,
    snapshot_id: i64,
    data: Option<&[u8]>,
    now: DateTime<Utc>,
) -> Result<ReportId, DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO analysis_reports
             (project_key, snapshot_id, report_status, report_data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                project_key,
                snapshot_id,
                ReportStatus::Pending.as_str(),
                data,
                now.timestamp_millis(),
            ],
        )?;
        Ok(ReportId(conn.last_insert_rowid()))
    })
}

/// Finds a report by id, without its payload.
pub fn find_by_id(db: &Database, id: ReportId) -> Result<Option<AnalysisReport>, DatabaseError> {
    db.with_conn(|conn| find_by_id_on(conn, id))
}

/// Lists every report of a project. No ordering is promised.
pub fn find_by_project_key(
    db: &Database,
    project_key: &str,
) -> Result<Vec<AnalysisReport>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM analysis_reports WHERE project_key = ?1"
        ))?;
        let rows = stmt
            .query_map(params![project_key], report_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Full queue snapshot, ordered by id.
pub fn find_all(db: &Database) -> Result<Vec<AnalysisReport>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPORT_COLUMNS} FROM analysis_reports ORDER BY id ASC"
        ))?;
        let rows = stmt
            .query_map([], report_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Reads the stored payload. `None` when the report is gone or has no data.
pub fn read_data(db: &Database, id: ReportId) -> Result<Option<Vec<u8>>, DatabaseError> {
    db.with_conn(|conn| {
        let data: Option<Option<Vec<u8>>> = conn
            .query_row(
                "SELECT report_data FROM analysis_reports WHERE id = ?1",
                params![id.0],
                |r| r.get(0),
            )
            .optional()?;
        Ok(data.flatten())
    })
}

/// Deletes a report and its payload. Returns whether a row was removed;
/// deleting a missing report is not an error.
pub fn delete(db: &Database, id: ReportId) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let removed = conn.execute("DELETE FROM analysis_reports WHERE id = ?1", params![id.0])?;
        Ok(removed > 0)
    })
}

/// Removes every report regardless of status. Returns the number removed.
pub fn purge_all(db: &Database) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| Ok(conn.execute("DELETE FROM analysis_reports", [])?))
}

/// Puts every report back to `PENDING` and clears `started_at`.
pub fn reset_all_to_pending(db: &Database, now: DateTime<Utc>) -> Result<usize, DatabaseError> {
    db.with_conn(|conn| {
        let updated = conn.execute(
            "UPDATE analysis_reports
             SET report_status = ?1, started_at = NULL, updated_at = ?2",
            params![ReportStatus::Pending.as_str(), now.timestamp_millis()],
        )?;
        Ok(updated)
    })
}

/// Counts reports with the given status.
pub fn count_by_status(db: &Database, status: ReportStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM analysis_reports WHERE report_status = ?1",
            params![status.as_str()],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Stamps `finished_at`. Returns false when the report does not exist.
pub fn mark_finished(db: &Database, id: ReportId, now: DateTime<Utc>) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let updated = conn.execute(
            "UPDATE analysis_reports SET finished_at = ?2, updated_at = ?2 WHERE id = ?1",
            params![id.0, now.timestamp_millis()],
        )?;
        Ok(updated > 0)
    })
}

/// Earliest `PENDING` report that is not queued behind an earlier `WORKING`
/// report of its own project. Read-only.
pub fn next_available(db: &Database) -> Result<Option<AnalysisReport>, DatabaseError> {
    db.with_conn(|conn| {
        let report = conn
            .query_row(
                &format!(
                    "SELECT {REPORT_COLUMNS} FROM analysis_reports r
                     WHERE r.report_status = 'PENDING'
                       AND NOT {BLOCKED_BY_EARLIER_WORKING}
                     ORDER BY r.id ASC
                     LIMIT 1"
                ),
                [],
                report_from_row,
            )
            .optional()?;
        Ok(report)
    })
}

/// Claims a report: `PENDING` to `WORKING` in one conditional write.
///
/// Returns `None` when the report is missing, already `WORKING`, or queued
/// behind an earlier `WORKING` report of the same project.
pub fn book(
    db: &Database,
    id: ReportId,
    now: DateTime<Utc>,
) -> Result<Option<AnalysisReport>, DatabaseError> {
    db.with_transaction(|tx| {
        let claimed = tx.execute(
            &format!(
                "UPDATE analysis_reports AS r
                 SET report_status = 'WORKING', started_at = ?2, updated_at = ?2
                 WHERE r.id = ?1
                   AND r.report_status = 'PENDING'
                   AND NOT {BLOCKED_BY_EARLIER_WORKING}"
            ),
            params![id.0, now.timestamp_millis()],
        )?;

        if claimed == 0 {
            return Ok(None);
        }
        find_by_id_on(tx, id)
    })
}
