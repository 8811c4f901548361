//! Timesheet table recovery
//!
//! Turns the words of a page (or a pre-segmented grid of cells) into raw
//! `(date, start, end)` rows. Rows are rebuilt by grouping words on their
//! vertical position and bucketing them into the Date / HI / HF columns
//! found by a [`ColumnDetector`].

use crate::columns::{default_detectors, ColumnDetector, ColumnLayout};
use crate::extractor::{Page, Word};
use crate::hours::{parse_date, time_tokens};
use serde::{Deserialize, Serialize};

/// Header names accepted for the start column of a pre-segmented grid
const START_HEADERS: &[&str] = &["hi", "h.i", "h.i.", "hora inicio", "hora_inicio", "inicio"];

/// Header names accepted for the end column of a pre-segmented grid
const END_HEADERS: &[&str] = &[
    "hf",
    "h.f",
    "h.f.",
    "hora fin",
    "hora_fin",
    "hora final",
    "hora_final",
    "fin",
];

/// What to do with a row that has times but no date of its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DateMode {
    /// Reuse the last date seen earlier in the same document
    #[default]
    CarryForward,
    /// Drop the row
    Strict,
}

/// Table recovery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    pub date_mode: DateMode,
    /// Words whose tops are within this distance of a row's first word
    /// belong to that row
    pub row_tolerance: f32,
    /// Padding added on both sides of a column range
    pub column_tolerance: f32,
    /// Date, start and end column indices for grids without a header row
    pub grid_columns: [usize; 3],
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            date_mode: DateMode::CarryForward,
            row_tolerance: 2.0,
            column_tolerance: 2.0,
            grid_columns: [0, 1, 2],
        }
    }
}

/// One recovered table row, before date parsing.
///
/// `start_text` and `end_text` hold a single normalized `HH:MM` token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawRow {
    pub date_text: String,
    pub start_text: String,
    pub end_text: String,
    pub is_primary: bool,
}

/// Recovers timesheet rows from pages
pub struct TimesheetParser {
    options: ParseOptions,
    detectors: Vec<Box<dyn ColumnDetector>>,
}

impl Default for TimesheetParser {
    fn default() -> Self {
        Self::new(ParseOptions::default())
    }
}

impl TimesheetParser {
    pub fn new(options: ParseOptions) -> Self {
        Self::with_detectors(options, default_detectors())
    }

    /// Use a custom detector chain, tried in order
    pub fn with_detectors(options: ParseOptions, detectors: Vec<Box<dyn ColumnDetector>>) -> Self {
        Self { options, detectors }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Column layout from the first detector that recognizes the page
    pub fn layout_for(&self, page: &Page) -> Option<ColumnLayout> {
        self.detectors.iter().find_map(|detector| {
            let layout = detector.detect(page)?;
            log::debug!("page {}: columns from {} detector", page.number, detector.name());
            Some(layout)
        })
    }

    /// Rows of a single page
    pub fn parse_page(&self, page: &Page) -> Vec<RawRow> {
        let mut rows = Vec::new();
        self.parse_page_into(page, &mut None, &mut rows);
        rows
    }

    /// Rows of a whole document; the carried date crosses page breaks
    pub fn parse_pages(&self, pages: &[Page]) -> Vec<RawRow> {
        let mut rows = Vec::new();
        let mut last_date = None;
        for page in pages {
            self.parse_page_into(page, &mut last_date, &mut rows);
        }
        rows
    }

    fn parse_page_into(&self, page: &Page, last_date: &mut Option<String>, out: &mut Vec<RawRow>) {
        let Some(layout) = self.layout_for(page) else {
            log::info!("page {}: no column layout, skipped", page.number);
            return;
        };

        let before = out.len();
        let data_words: Vec<&Word> = page
            .words
            .iter()
            .filter(|w| w.top > layout.data_top)
            .collect();

        for line in group_rows(data_words, self.options.row_tolerance) {
            let cells = bucket_line(&line, &layout, self.options.column_tolerance);
            self.emit_rows(cells, last_date, out);
        }

        if out.len() == before {
            log::info!("page {}: no shift rows found", page.number);
        }
    }

    /// Rows of a pre-segmented table (rows of cell strings)
    pub fn parse_grid(&self, grid: &[Vec<String>]) -> Vec<RawRow> {
        let (columns, body) = match find_grid_header(grid) {
            Some((header_idx, columns)) => (columns, &grid[header_idx + 1..]),
            None => {
                log::debug!("grid without header row, using positional columns");
                (self.options.grid_columns, grid)
            }
        };
        let [date_col, start_col, end_col] = columns;

        let mut rows = Vec::new();
        let mut last_date = None;
        for row in body {
            let cell = |idx: usize| row.get(idx).map(String::as_str).unwrap_or("");
            let cells = LineCells {
                date: cell(date_col).split_whitespace().collect::<Vec<_>>().join(" "),
                // Multi-line cells: the shift starts on the top line, ends on the bottom one
                start: first_line(cell(start_col)).to_string(),
                end: last_line(cell(end_col)).to_string(),
            };
            self.emit_rows(cells, &mut last_date, &mut rows);
        }
        rows
    }

    /// Apply date carry-forward, filtering and primary/secondary pairing
    fn emit_rows(&self, cells: LineCells, last_date: &mut Option<String>, out: &mut Vec<RawRow>) {
        let date = if cells.date.is_empty() {
            match self.options.date_mode {
                DateMode::CarryForward => last_date.clone(),
                DateMode::Strict => None,
            }
        } else {
            // Labels such as "TOTAL" in the date column don't replace the carried date
            if parse_date(&cells.date).is_some() {
                *last_date = Some(cells.date.clone());
            } else {
                log::debug!("date cell {:?} is not a date", cells.date);
            }
            Some(cells.date)
        };

        if cells.start.is_empty() && cells.end.is_empty() {
            return;
        }

        let starts = time_tokens(&cells.start);
        let ends = time_tokens(&cells.end);
        let (Some(first_start), Some(last_end)) = (starts.first(), ends.last()) else {
            return;
        };

        let Some(date) = date else {
            log::debug!("dropping undated row {:?} - {:?}", cells.start, cells.end);
            return;
        };

        out.push(RawRow {
            date_text: date.clone(),
            start_text: first_start.to_string(),
            end_text: last_end.to_string(),
            is_primary: true,
        });

        // Split shift: the inner pair is the second shift of the day
        if starts.len() >= 2 && ends.len() >= 2 {
            out.push(RawRow {
                date_text: date,
                start_text: starts[1].to_string(),
                end_text: ends[0].to_string(),
                is_primary: false,
            });
        }
    }
}

/// Rows of a pre-segmented table with the default column detectors
pub fn records_from_grid(grid: &[Vec<String>], options: &ParseOptions) -> Vec<RawRow> {
    TimesheetParser::new(options.clone()).parse_grid(grid)
}

/// Raw text of the three cells of one line
#[derive(Debug, Default)]
struct LineCells {
    date: String,
    start: String,
    end: String,
}

/// Group words into lines by vertical position.
///
/// Words are sorted by `top`; a word joins the current line when its top is
/// within `tolerance` of the line's first word, otherwise it opens a new
/// line. Each line comes back sorted left to right.
pub fn group_rows(mut words: Vec<&Word>, tolerance: f32) -> Vec<Vec<&Word>> {
    words.sort_by(|a, b| a.top.total_cmp(&b.top));

    let mut lines: Vec<Vec<&Word>> = Vec::new();
    for word in words {
        match lines.last_mut() {
            Some(line) if word.top - line[0].top <= tolerance => line.push(word),
            _ => lines.push(vec![word]),
        }
    }

    for line in &mut lines {
        line.sort_by(|a, b| a.x0.total_cmp(&b.x0));
    }
    lines
}

/// Split a line's words into the date / start / end cells by midpoint
fn bucket_line(line: &[&Word], layout: &ColumnLayout, tolerance: f32) -> LineCells {
    let mut date = Vec::new();
    let mut start = Vec::new();
    let mut end = Vec::new();

    for word in line {
        let text = word.text.trim();
        if text.is_empty() {
            continue;
        }
        let x = word.x_mid();
        if layout.date.contains(x, tolerance) {
            date.push(text);
        } else if layout.start.contains(x, tolerance) {
            start.push(text);
        } else if layout.end.contains(x, tolerance) {
            end.push(text);
        }
    }

    LineCells {
        date: date.join(" "),
        start: start.join(" "),
        end: end.join(" "),
    }
}

/// Find the header row of a grid and the date/start/end column indices
fn find_grid_header(grid: &[Vec<String>]) -> Option<(usize, [usize; 3])> {
    for (row_idx, row) in grid.iter().enumerate() {
        let names: Vec<String> = row.iter().map(|c| c.trim().to_lowercase()).collect();
        let Some(date_col) = names.iter().position(|n| n.contains("fecha")) else {
            continue;
        };
        let start_col = names.iter().position(|n| START_HEADERS.contains(&n.as_str()));
        let end_col = names.iter().position(|n| END_HEADERS.contains(&n.as_str()));
        if let (Some(start_col), Some(end_col)) = (start_col, end_col) {
            return Some((row_idx, [date_col, start_col, end_col]));
        }
    }
    None
}

fn first_line(cell: &str) -> &str {
    cell.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("")
}

fn last_line(cell: &str) -> &str {
    cell.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .unwrap_or("")
}
