//! Night-shift premium calculation from PDF timesheets
//!
//! This crate provides:
//! - Positioned word extraction from PDF pages
//! - Date / HI / HF column recovery with header detection and a layout fallback
//! - Night-window overlap and date-dependent pricing per shift
//! - Monthly, yearly and global totals for a batch of documents

pub mod aggregate;
pub mod columns;
pub mod config;
pub mod extractor;
pub mod hours;
pub mod night;
pub mod session;
pub mod table;

pub use aggregate::{aggregate, Bucket, MonthKey, Summary};
pub use columns::{ColumnDetector, ColumnLayout, ColumnRange, FractionalColumns, HeaderColumns};
pub use config::Config;
pub use extractor::{extract_pages, extract_pages_mem, BBox, Page, Word};
pub use hours::{normalize_hour, parse_date, ClockTime};
pub use night::{DailyResult, NightConfig, NightWindow, ShiftRecord, Tariff, TariffTier};
pub use session::{Report, ReportCache};
pub use table::{records_from_grid, DateMode, ParseOptions, RawRow, TimesheetParser};

use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;

/// Recover the timesheet rows of a PDF file with the default options
pub fn parse_pdf<P: AsRef<Path>>(path: P) -> Result<Vec<RawRow>, Error> {
    let pages = extract_pages(path)?;
    Ok(TimesheetParser::default().parse_pages(&pages))
}

/// Recover the timesheet rows of a PDF held in memory
pub fn parse_pdf_mem(buffer: &[u8]) -> Result<Vec<RawRow>, Error> {
    let pages = extract_pages_mem(buffer)?;
    Ok(TimesheetParser::default().parse_pages(&pages))
}

/// One input document of a batch
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// File name or other label shown in reports
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// A document that could not be (fully) used
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentWarning {
    pub source: String,
    pub message: String,
}

/// Outcome of one document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResult {
    pub source: String,
    /// Rows recovered from the tables
    pub rows_found: usize,
    /// Priced shifts, in document order
    pub results: Vec<DailyResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<DocumentWarning>,
}

/// Outcome of a batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub documents: Vec<DocumentResult>,
    pub summary: Summary,
}

impl BatchReport {
    pub fn warnings(&self) -> impl Iterator<Item = &DocumentWarning> {
        self.documents.iter().filter_map(|d| d.warning.as_ref())
    }

    /// Every priced shift of the batch
    pub fn results(&self) -> impl Iterator<Item = &DailyResult> {
        self.documents.iter().flat_map(|d| d.results.iter())
    }
}

/// Parser, night rules and batch processing wired together
pub struct Pipeline {
    parser: TimesheetParser,
    night: NightConfig,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(&Config::default())
    }
}

impl Pipeline {
    pub fn new(config: &Config) -> Self {
        Self::from_parts(
            TimesheetParser::new(config.parse.clone()),
            config.night.clone(),
        )
    }

    pub fn from_parts(parser: TimesheetParser, night: NightConfig) -> Self {
        Self { parser, night }
    }

    pub fn parser(&self) -> &TimesheetParser {
        &self.parser
    }

    pub fn night(&self) -> &NightConfig {
        &self.night
    }

    /// Parse and price recovered rows, dropping unreadable or out-of-range ones
    pub fn evaluate_rows(&self, rows: &[RawRow]) -> Vec<DailyResult> {
        rows.iter()
            .filter_map(ShiftRecord::from_raw)
            .filter_map(|record| self.night.evaluate(&record))
            .collect()
    }

    /// Process one PDF held in memory.
    ///
    /// Never fails: an unreadable document comes back empty with a warning.
    pub fn process_document(&self, source: &str, buffer: &[u8]) -> DocumentResult {
        let pages = match extract_pages_mem(buffer) {
            Ok(pages) => pages,
            Err(e) => {
                log::warn!("{}: {}", source, e);
                return DocumentResult::failed(source, e.to_string());
            }
        };

        if pages.iter().all(|p| p.words.is_empty()) {
            log::info!("{}: no extractable text", source);
            return DocumentResult::failed(
                source,
                "no extractable text (scanned documents need OCR)".to_string(),
            );
        }

        let rows = self.parser.parse_pages(&pages);
        let results = self.evaluate_rows(&rows);
        log::info!(
            "{}: {} rows, {} priced shifts",
            source,
            rows.len(),
            results.len()
        );

        DocumentResult {
            source: source.to_string(),
            rows_found: rows.len(),
            results,
            warning: None,
        }
    }

    /// Process a batch of documents and aggregate the shifts of all of them.
    ///
    /// Documents are decoded in parallel; results keep the input order.
    pub fn process_batch(&self, documents: &[SourceDocument]) -> BatchReport {
        let documents: Vec<DocumentResult> = documents
            .par_iter()
            .map(|doc| self.process_document(&doc.name, &doc.bytes))
            .collect();
        let summary = aggregate(documents.iter().flat_map(|d| d.results.iter()));
        BatchReport { documents, summary }
    }

    /// Read PDF files from disk and process them as one batch.
    ///
    /// Files that can't be read become warnings like corrupt PDFs do.
    pub fn process_files<P: AsRef<Path>>(&self, paths: &[P]) -> BatchReport {
        let mut positions = Vec::with_capacity(paths.len());
        let mut sources = Vec::with_capacity(paths.len());
        let mut unreadable = Vec::new();

        for (idx, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            let name = display_name(path);
            match std::fs::read(path) {
                Ok(bytes) => {
                    positions.push(idx);
                    sources.push(SourceDocument::new(name, bytes));
                }
                Err(e) => {
                    log::warn!("{}: {}", name, e);
                    let message = Error::from(e).to_string();
                    unreadable.push((idx, DocumentResult::failed(&name, message)));
                }
            }
        }

        let mut report = self.process_batch(&sources);

        // Put the unreadable files back at their input positions
        let mut documents: Vec<(usize, DocumentResult)> = positions
            .into_iter()
            .zip(report.documents)
            .chain(unreadable)
            .collect();
        documents.sort_by_key(|(idx, _)| *idx);
        report.documents = documents.into_iter().map(|(_, d)| d).collect();
        report
    }
}

impl DocumentResult {
    fn failed(source: &str, message: String) -> Self {
        Self {
            source: source.to_string(),
            rows_found: 0,
            results: Vec::new(),
            warning: Some(DocumentWarning {
                source: source.to_string(),
                message,
            }),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parsing error: {0}")]
    Parse(String),
    #[error("PDF is encrypted")]
    Encrypted,
    #[error("Invalid PDF structure")]
    InvalidStructure,
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<lopdf::Error> for Error {
    fn from(e: lopdf::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}
