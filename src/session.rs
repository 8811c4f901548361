//! Caller-owned store of finished reports
//!
//! A host that shows results first and lets the user download them later
//! keeps the batch here between the two requests. The store is a plain
//! value; a multi-threaded host puts it behind its own lock or keeps one
//! per session.

use crate::BatchReport;
use serde::Serialize;
use std::collections::HashMap;

/// A processed batch together with the employee it belongs to
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub employee_code: String,
    pub employee_name: String,
    #[serde(flatten)]
    pub batch: BatchReport,
}

impl Report {
    pub fn new(
        employee_code: impl Into<String>,
        employee_name: impl Into<String>,
        batch: BatchReport,
    ) -> Self {
        Self {
            employee_code: employee_code.into(),
            employee_name: employee_name.into(),
            batch,
        }
    }

    /// Lookup key: `code:name`
    pub fn key(&self) -> String {
        format!("{}:{}", self.employee_code, self.employee_name)
    }
}

#[derive(Debug, Default)]
pub struct ReportCache {
    reports: HashMap<String, Report>,
}

impl ReportCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a report, replacing an earlier one for the same employee.
    /// Returns the key to fetch it with.
    pub fn insert(&mut self, report: Report) -> String {
        let key = report.key();
        if self.reports.insert(key.clone(), report).is_some() {
            log::debug!("replaced cached report {}", key);
        }
        key
    }

    pub fn get(&self, key: &str) -> Option<&Report> {
        self.reports.get(key)
    }

    /// Remove and return a report, e.g. once it has been downloaded
    pub fn take(&mut self, key: &str) -> Option<Report> {
        self.reports.remove(key)
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Summary;

    fn report(code: &str, name: &str, documents: usize) -> Report {
        let batch = BatchReport {
            documents: (0..documents)
                .map(|i| crate::DocumentResult {
                    source: format!("doc{i}.pdf"),
                    rows_found: 0,
                    results: Vec::new(),
                    warning: None,
                })
                .collect(),
            summary: Summary::default(),
        };
        Report::new(code, name, batch)
    }

    #[test]
    fn test_insert_and_get() {
        let mut cache = ReportCache::new();
        let key = cache.insert(report("1234", "Ana Perez", 1));
        assert_eq!(key, "1234:Ana Perez");
        assert_eq!(cache.get(&key).unwrap().batch.documents.len(), 1);
        assert!(cache.get("9999:Nobody").is_none());
    }

    #[test]
    fn test_same_employee_replaced() {
        let mut cache = ReportCache::new();
        cache.insert(report("1234", "Ana Perez", 1));
        let key = cache.insert(report("1234", "Ana Perez", 3));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&key).unwrap().batch.documents.len(), 3);
    }

    #[test]
    fn test_caches_are_independent() {
        let mut first = ReportCache::new();
        let second = ReportCache::new();
        let key = first.insert(report("1234", "Ana Perez", 1));
        assert!(second.get(&key).is_none());
        assert!(second.is_empty());
    }

    #[test]
    fn test_take_removes() {
        let mut cache = ReportCache::new();
        let key = cache.insert(report("77", "Luis", 2));
        assert!(cache.take(&key).is_some());
        assert!(cache.take(&key).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_report_serializes_flat() {
        let json = serde_json::to_value(report("77", "Luis", 1)).unwrap();
        assert_eq!(json["employee_code"], "77");
        assert_eq!(json["documents"][0]["source"], "doc0.pdf");
        assert!(json["summary"]["global"].is_object());
    }
}
