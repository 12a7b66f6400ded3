//! Tabular output: one row per retained record, fixed column order.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use thiserror::Error;

use crate::db;
use crate::scoring::{OutputRow, COLUMNS};

#[derive(Debug, Error)]
pub enum OutputWriteError {
    #[error("unsupported output format for {path} (expected .xlsx, .json, .sqlite or .db)")]
    UnsupportedFormat { path: PathBuf },
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write spreadsheet {path}: {source}")]
    Xlsx {
        path: PathBuf,
        #[source]
        source: XlsxError,
    },
    #[error("failed to write JSON {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write SQLite {path}: {source}")]
    Sqlite {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Xlsx,
    Json,
    Sqlite,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Result<Self, OutputWriteError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("xlsx") => Ok(Self::Xlsx),
            Some("json") => Ok(Self::Json),
            Some("sqlite" | "db") => Ok(Self::Sqlite),
            _ => Err(OutputWriteError::UnsupportedFormat {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Write `rows` to `path` in the format implied by its extension.
pub fn write_table(rows: &[OutputRow], path: &Path) -> Result<(), OutputWriteError> {
    let format = OutputFormat::from_path(path)?;
    match format {
        OutputFormat::Xlsx => write_xlsx(rows, path),
        OutputFormat::Json => write_json(rows, path),
        OutputFormat::Sqlite => write_sqlite(rows, path),
    }?;
    tracing::info!(path = %path.display(), rows = rows.len(), ?format, "wrote output table");
    Ok(())
}

fn write_xlsx(rows: &[OutputRow], path: &Path) -> Result<(), OutputWriteError> {
    let xlsx = |source| OutputWriteError::Xlsx {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let bold = Format::new().set_bold();

    for (col, name) in COLUMNS.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, *name, &bold)
            .map_err(xlsx)?;
    }

    for (i, r) in rows.iter().enumerate() {
        let row = i as u32 + 1;
        sheet.write_string(row, 0, &r.title).map_err(xlsx)?;
        sheet.write_string(row, 1, &r.function_id).map_err(xlsx)?;
        sheet.write_number(row, 2, r.score).map_err(xlsx)?;
        sheet.write_string(row, 3, &r.function_code).map_err(xlsx)?;
        sheet.write_string(row, 4, &r.domain).map_err(xlsx)?;
        sheet.write_string(row, 5, &r.owner_team).map_err(xlsx)?;
        sheet.write_string(row, 6, &r.content).map_err(xlsx)?;
    }

    workbook.save(path).map_err(xlsx)
}

fn write_json(rows: &[OutputRow], path: &Path) -> Result<(), OutputWriteError> {
    let file = File::create(path).map_err(|source| OutputWriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), rows).map_err(|source| OutputWriteError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn write_sqlite(rows: &[OutputRow], path: &Path) -> Result<(), OutputWriteError> {
    let sqlite = |source| OutputWriteError::Sqlite {
        path: path.to_path_buf(),
        source,
    };
    let conn = db::connect(path).map_err(sqlite)?;
    db::replace_rows(&conn, rows).map_err(sqlite)?;
    Ok(())
}
