use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::parser::answer_key::AnswerKeyEntry;
use crate::parser::{Extraction, ExtractionReport};
use crate::record::{QuestionRecord, SourceKind};

/// What one output file holds.
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub source: &'a str,
    pub subject: &'a str,
    pub kind: SourceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub generated_at: DateTime<Utc>,
    pub report: ExtractionReport,
    /// Scraped pages only.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub answer_key: Vec<AnswerKeyEntry>,
    pub records: &'a [QuestionRecord],
}

impl<'a> Envelope<'a> {
    pub fn new(source: &'a str, subject: &'a str, kind: SourceKind, year: Option<i32>, extraction: &'a Extraction) -> Self {
        Envelope {
            source,
            subject,
            kind,
            year,
            generated_at: Utc::now(),
            report: extraction.report,
            answer_key: extraction
                .answer_key
                .as_ref()
                .map(|k| k.entries().copied().collect())
                .unwrap_or_default(),
            records: &extraction.records,
        }
    }
}

/// `year-2019.json` for scraped pages, `<file stem>.json` otherwise.
pub fn file_name(name: &str, year: Option<i32>) -> String {
    match year {
        Some(y) => format!("year-{:04}.json", y),
        None => format!("{}.json", name),
    }
}

/// Pretty-printed envelope written to `dir`, which is created if missing.
pub fn write_records(dir: &Path, envelope: &Envelope<'_>) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(file_name(envelope.source, envelope.year));
    let json = serde_json::to_string_pretty(envelope)?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
