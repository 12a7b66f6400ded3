use std::path::Path;

use rusqlite::Connection;

use crate::scoring::OutputRow;

pub fn connect(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=DELETE;")?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        DROP TABLE IF EXISTS adas_functions;
        CREATE TABLE adas_functions (
            id                  INTEGER PRIMARY KEY,
            function_title      TEXT NOT NULL,
            function_id         TEXT NOT NULL,
            semantic_adas_score REAL NOT NULL,
            function_code       TEXT NOT NULL,
            domain              TEXT NOT NULL,
            owner_team          TEXT NOT NULL,
            extracted_content   TEXT NOT NULL
        );
        CREATE INDEX idx_adas_functions_id ON adas_functions(function_id);
        ",
    )?;
    Ok(())
}

/// One table per run: rows from an earlier run are replaced.
///
/// Schema reset and inserts share one transaction, so a failed write leaves the
/// previous table untouched.
pub fn replace_rows(conn: &Connection, rows: &[OutputRow]) -> rusqlite::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    init_schema(&tx)?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO adas_functions
             (function_title, function_id, semantic_adas_score, function_code, domain, owner_team, extracted_content)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for r in rows {
            count += stmt.execute(rusqlite::params![
                r.title, r.function_id, r.score, r.function_code, r.domain, r.owner_team, r.content,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_rows(conn: &Connection) -> rusqlite::Result<Vec<OutputRow>> {
    let mut stmt = conn.prepare(
        "SELECT function_title, function_id, semantic_adas_score, function_code, domain, owner_team, extracted_content
         FROM adas_functions ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(OutputRow {
                title: row.get(0)?,
                function_id: row.get(1)?,
                score: row.get(2)?,
                function_code: row.get(3)?,
                domain: row.get(4)?,
                owner_team: row.get(5)?,
                content: row.get(6)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
