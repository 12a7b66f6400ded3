//! Page text of a source document.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentReadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not a readable PDF: {message}")]
    Pdf { path: PathBuf, message: String },
}

/// Page-ordered text of the document at `path`, each page followed by a newline.
///
/// `.txt` files are taken as already-extracted text and returned verbatim.
pub fn extract_text(path: &Path) -> Result<String, DocumentReadError> {
    let bytes = std::fs::read(path).map_err(|source| DocumentReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    if is_plain_text(path) {
        return String::from_utf8(bytes).map_err(|e| DocumentReadError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        });
    }

    if !bytes.starts_with(b"%PDF") {
        return Err(DocumentReadError::Pdf {
            path: path.to_path_buf(),
            message: "missing %PDF header".into(),
        });
    }

    let text = pdf_extract::extract_text_from_mem(&bytes).map_err(|e| DocumentReadError::Pdf {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let pages = split_pages(&text);
    tracing::info!(path = %path.display(), pages = pages.len(), "extracted document text");
    Ok(pages.iter().map(|p| format!("{p}\n")).collect())
}

fn is_plain_text(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("txt"))
}

// pdf-extract separates pages with form feeds.
fn split_pages(text: &str) -> Vec<&str> {
    let mut pages: Vec<&str> = text.split('\x0C').collect();
    if pages.len() > 1 && pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}
