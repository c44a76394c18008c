//! Reading the clinical Q&A corpus and turning rows into documents.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::document::{CorpusRow, QADocument};
use crate::error::{RagError, Result};
use crate::topics;

/// A source of corpus rows.
pub trait CorpusSource: Send + Sync {
    /// Read every row of the corpus.
    fn rows(&self) -> Result<Vec<CorpusRow>>;

    /// Human-readable provenance recorded on each document.
    fn describe(&self) -> String;
}

/// A CSV file with `Questions` and `Answers` columns and an optional
/// `Question_ID` column.
#[derive(Debug, Clone)]
pub struct CsvCorpus {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(rename = "Question_ID", default)]
    question_id: Option<String>,
    #[serde(rename = "Questions", default)]
    question: Option<String>,
    #[serde(rename = "Answers", default)]
    answer: Option<String>,
}

impl CsvCorpus {
    /// Point at a CSV file on disk. Nothing is read until [`CorpusSource::rows`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The corpus file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn failure(&self, message: impl Into<String>) -> RagError {
        RagError::CorpusError { path: self.path.clone(), message: message.into() }
    }
}

impl CorpusSource for CsvCorpus {
    fn rows(&self) -> Result<Vec<CorpusRow>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| self.failure(e.to_string()))?;

        let headers = reader.headers().map_err(|e| self.failure(e.to_string()))?;
        for required in ["Questions", "Answers"] {
            if !headers.iter().any(|h| h == required) {
                return Err(self.failure(format!("missing required column `{required}`")));
            }
        }

        let mut rows = Vec::new();
        for (position, record) in reader.deserialize::<CsvRecord>().enumerate() {
            let record = record.map_err(|e| self.failure(format!("row {position}: {e}")))?;
            rows.push(CorpusRow {
                question_id: record
                    .question_id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| position.to_string()),
                question: record.question.unwrap_or_default(),
                answer: record.answer.unwrap_or_default(),
            });
        }

        debug!(path = %self.path.display(), row_count = rows.len(), "read corpus");
        Ok(rows)
    }

    fn describe(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Convert rows into tagged documents, silently skipping rows with an empty
/// question or answer.
pub fn documents_from_rows(rows: Vec<CorpusRow>, source: &str) -> Vec<QADocument> {
    let total = rows.len();
    let documents: Vec<QADocument> = rows
        .into_iter()
        .filter(CorpusRow::is_usable)
        .map(|row| QADocument {
            topics: topics::tag(&row.question, &row.answer),
            id: row.question_id,
            question_text: row.question,
            answer_text: row.answer,
            source_metadata: source.to_string(),
        })
        .collect();

    info!(total, usable = documents.len(), "prepared corpus documents");
    documents
}
