//! Column detection for timesheet pages
//!
//! A detector looks at the words of one page and decides where the Date,
//! Start (HI) and End (HF) columns are, plus where the data rows begin.
//! Detectors are tried in order until one answers, so alternate document
//! templates can be supported by adding a detector.

use crate::extractor::{Page, Word};

/// Data rows never start above this distance from the page top
pub const DEFAULT_TOP_MARGIN: f32 = 40.0;

/// Horizontal extent of one column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnRange {
    pub x0: f32,
    pub x1: f32,
}

impl ColumnRange {
    pub fn new(x0: f32, x1: f32) -> Self {
        Self { x0, x1 }
    }

    /// Whether `x` falls inside the range padded by `tolerance` on both sides
    pub fn contains(&self, x: f32, tolerance: f32) -> bool {
        x >= self.x0 - tolerance && x <= self.x1 + tolerance
    }
}

/// Where the three columns of interest sit on a page
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    pub date: ColumnRange,
    pub start: ColumnRange,
    pub end: ColumnRange,
    /// Words whose top is at or above this offset are not data
    pub data_top: f32,
}

/// Finds the column layout of a page
pub trait ColumnDetector: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Returns `None` when this detector doesn't recognize the page
    fn detect(&self, page: &Page) -> Option<ColumnLayout>;
}

/// Detector list used when none is configured: header text first,
/// then the fixed ranges of the known timesheet template
pub fn default_detectors() -> Vec<Box<dyn ColumnDetector>> {
    vec![
        Box::new(HeaderColumns::default()),
        Box::new(FractionalColumns::timesheet_template()),
    ]
}

/// Locates columns from the `Fecha` / `HI` / `HF` header words.
///
/// Header matching is case-insensitive on trimmed word text and needs all
/// three headers. The topmost line holding all three is the header row, so
/// a stray "HI" in a title above the table doesn't anchor a column. When no
/// single line has all three, the last occurrence of each is used.
#[derive(Debug, Clone)]
pub struct HeaderColumns {
    pub top_margin: f32,
    /// Maximum top difference between words of the same header line
    pub line_tolerance: f32,
}

impl Default for HeaderColumns {
    fn default() -> Self {
        Self {
            top_margin: DEFAULT_TOP_MARGIN,
            line_tolerance: 2.0,
        }
    }
}

impl HeaderColumns {
    fn same_line(&self, a: &Word, b: &Word) -> bool {
        (a.top - b.top).abs() <= self.line_tolerance
    }
}

impl ColumnDetector for HeaderColumns {
    fn name(&self) -> &str {
        "header"
    }

    fn detect(&self, page: &Page) -> Option<ColumnLayout> {
        let mut dates = Vec::new();
        let mut starts = Vec::new();
        let mut ends = Vec::new();

        for word in &page.words {
            match word.text.trim().to_lowercase().as_str() {
                "fecha" => dates.push(word),
                "hi" => starts.push(word),
                "hf" => ends.push(word),
                _ => {}
            }
        }

        let mut lines: Vec<(&Word, &Word, &Word)> = dates
            .iter()
            .filter_map(|&date| {
                let start = starts.iter().find(|w| self.same_line(date, w))?;
                let end = ends.iter().find(|w| self.same_line(date, w))?;
                Some((date, *start, *end))
            })
            .collect();
        lines.sort_by(|a, b| a.0.top.total_cmp(&b.0.top));

        let (date, start, end) = match lines.first() {
            Some(&line) => line,
            None => (*dates.last()?, *starts.last()?, *ends.last()?),
        };
        let header_bottom = date.bottom.max(start.bottom).max(end.bottom);

        Some(ColumnLayout {
            date: ColumnRange::new(date.x0, date.x1),
            start: ColumnRange::new(start.x0, start.x1),
            end: ColumnRange::new(end.x0, end.x1),
            data_top: header_bottom.max(self.top_margin),
        })
    }
}

/// Columns at fixed fractions of the page width.
///
/// The fractions only fit the document template they were measured on;
/// they are not a general layout rule.
#[derive(Debug, Clone)]
pub struct FractionalColumns {
    pub date: (f32, f32),
    pub start: (f32, f32),
    pub end: (f32, f32),
    pub top_margin: f32,
}

impl FractionalColumns {
    /// Ranges measured on the bus-driver shift sheet this crate targets
    pub fn timesheet_template() -> Self {
        Self {
            date: (0.06, 0.22),
            start: (0.69, 0.81),
            end: (0.81, 0.95),
            top_margin: DEFAULT_TOP_MARGIN,
        }
    }
}

impl ColumnDetector for FractionalColumns {
    fn name(&self) -> &str {
        "fractional"
    }

    fn detect(&self, page: &Page) -> Option<ColumnLayout> {
        let x0 = page.bbox.x0;
        let width = page.bbox.width();
        if width <= 0.0 {
            return None;
        }
        let range = |(a, b): (f32, f32)| ColumnRange::new(x0 + a * width, x0 + b * width);

        Some(ColumnLayout {
            date: range(self.date),
            start: range(self.start),
            end: range(self.end),
            data_top: self.top_margin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::BBox;

    fn word(text: &str, x0: f32, x1: f32, top: f32) -> Word {
        Word {
            text: text.into(),
            x0,
            x1,
            top,
            bottom: top + 10.0,
        }
    }

    fn page(words: Vec<Word>) -> Page {
        Page::new(1, BBox::new(0.0, 0.0, 600.0, 800.0), words)
    }

    #[test]
    fn test_header_detection() {
        let p = page(vec![
            word("FECHA", 40.0, 70.0, 90.0),
            word("Servicio", 150.0, 190.0, 90.0),
            word(" Hi ", 420.0, 430.0, 90.0),
            word("hF", 500.0, 510.0, 92.0),
        ]);
        let layout = HeaderColumns::default().detect(&p).unwrap();
        assert_eq!(layout.date, ColumnRange::new(40.0, 70.0));
        assert_eq!(layout.start, ColumnRange::new(420.0, 430.0));
        assert_eq!(layout.end, ColumnRange::new(500.0, 510.0));
        assert_eq!(layout.data_top, 102.0);
    }

    #[test]
    fn test_stray_title_word_ignored() {
        let p = page(vec![
            word("HI", 250.0, 260.0, 30.0),
            word("Fecha", 40.0, 70.0, 90.0),
            word("HI", 420.0, 430.0, 90.0),
            word("HF", 500.0, 510.0, 90.0),
        ]);
        let layout = HeaderColumns::default().detect(&p).unwrap();
        assert_eq!(layout.start, ColumnRange::new(420.0, 430.0));
        assert_eq!(layout.data_top, 100.0);
    }

    #[test]
    fn test_scattered_headers_use_last_occurrence() {
        let p = page(vec![
            word("Fecha", 40.0, 70.0, 90.0),
            word("HI", 400.0, 410.0, 60.0),
            word("HI", 420.0, 430.0, 110.0),
            word("HF", 500.0, 510.0, 120.0),
        ]);
        let layout = HeaderColumns::default().detect(&p).unwrap();
        assert_eq!(layout.start, ColumnRange::new(420.0, 430.0));
        assert_eq!(layout.data_top, 130.0);
    }

    #[test]
    fn test_header_near_top_keeps_margin() {
        let p = page(vec![
            word("Fecha", 40.0, 70.0, 5.0),
            word("HI", 420.0, 430.0, 5.0),
            word("HF", 500.0, 510.0, 5.0),
        ]);
        let layout = HeaderColumns::default().detect(&p).unwrap();
        assert_eq!(layout.data_top, DEFAULT_TOP_MARGIN);
    }

    #[test]
    fn test_header_missing_one_column() {
        let p = page(vec![
            word("Fecha", 40.0, 70.0, 90.0),
            word("HI", 420.0, 430.0, 90.0),
        ]);
        assert!(HeaderColumns::default().detect(&p).is_none());
    }

    #[test]
    fn test_fractional_ranges() {
        let layout = FractionalColumns::timesheet_template()
            .detect(&page(vec![]))
            .unwrap();
        assert!((layout.date.x0 - 36.0).abs() < 0.01);
        assert!((layout.date.x1 - 132.0).abs() < 0.01);
        assert!((layout.start.x0 - 414.0).abs() < 0.01);
        assert!((layout.start.x1 - 486.0).abs() < 0.01);
        assert!((layout.end.x0 - 486.0).abs() < 0.01);
        assert!((layout.end.x1 - 570.0).abs() < 0.01);
        assert_eq!(layout.data_top, DEFAULT_TOP_MARGIN);
    }

    #[test]
    fn test_range_tolerance() {
        let range = ColumnRange::new(100.0, 120.0);
        assert!(range.contains(99.0, 2.0));
        assert!(range.contains(122.0, 2.0));
        assert!(!range.contains(122.5, 2.0));
    }
}
