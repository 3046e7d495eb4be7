//! Per-document keyword spreadsheet (CSV).

use crate::atomic::write_atomic;
use lexicloud_core::error::{LexiError, Result};
use lexicloud_core::types::DocumentKeywordSet;
use serde::Serialize;
use std::path::Path;
use tracing::info;

const HEADER: [&str; 3] = ["file_name", "keyword", "weight"];

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    file_name: &'a str,
    keyword: &'a str,
    weight: f64,
}

/// Writes one row per (document, keyword) pair
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportWriter;

impl ReportWriter {
    pub fn new() -> Self {
        Self
    }

    /// Serialize the report into CSV bytes.
    ///
    /// Rows are grouped by document identifier in lexical order, and each
    /// group lists its keywords by descending weight. An empty report still
    /// carries its header.
    pub fn to_csv(&self, documents: &[(String, DocumentKeywordSet)]) -> Result<Vec<u8>> {
        let mut ordered: Vec<&(String, DocumentKeywordSet)> = documents.iter().collect();
        ordered.sort_by(|a, b| a.0.cmp(&b.0));

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(HEADER).map_err(csv_error)?;

        for (name, set) in ordered {
            let mut entries: Vec<_> = set.iter().collect();
            entries.sort_by(|a, b| b.weight.total_cmp(&a.weight));
            for entry in entries {
                writer
                    .serialize(ReportRow {
                        file_name: name,
                        keyword: &entry.term,
                        weight: entry.weight,
                    })
                    .map_err(csv_error)?;
            }
        }

        writer
            .into_inner()
            .map_err(|e| LexiError::Io(e.into_error()))
    }

    /// Write the report to `path`. Returns the number of keyword rows.
    pub fn write(&self, documents: &[(String, DocumentKeywordSet)], path: &Path) -> Result<usize> {
        let bytes = self.to_csv(documents)?;
        write_atomic(path, &bytes)?;
        let rows = documents.iter().map(|(_, set)| set.len()).sum();
        info!("Keyword report saved to {} ({} rows)", path.display(), rows);
        Ok(rows)
    }
}

fn csv_error(err: csv::Error) -> LexiError {
    LexiError::Io(err.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexicloud_core::types::KeywordEntry;
    use tempfile::TempDir;

    fn set(entries: &[(&str, f64)]) -> DocumentKeywordSet {
        DocumentKeywordSet::new(entries.iter().map(|(t, w)| KeywordEntry::new(*t, *w)), usize::MAX)
    }

    #[test]
    fn test_rows_sorted_by_document_then_weight() {
        let documents = vec![
            ("报告B".to_string(), set(&[("绿色", 0.2), ("发展", 0.9)])),
            ("报告A".to_string(), set(&[("创新", 0.5)])),
        ];
        let csv = String::from_utf8(ReportWriter::new().to_csv(&documents).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(
            lines,
            vec![
                "file_name,keyword,weight",
                "报告A,创新,0.5",
                "报告B,发展,0.9",
                "报告B,绿色,0.2",
            ]
        );
    }

    #[test]
    fn test_empty_report_has_header_only() {
        let csv = ReportWriter::new().to_csv(&[]).unwrap();
        assert_eq!(String::from_utf8(csv).unwrap(), "file_name,keyword,weight\n");
    }

    #[test]
    fn test_fields_with_commas_are_quoted() {
        let documents = vec![("a,b".to_string(), set(&[("x", 1.0)]))];
        let csv = String::from_utf8(ReportWriter::new().to_csv(&documents).unwrap()).unwrap();
        assert!(csv.contains("\"a,b\",x,1.0"));
    }

    #[test]
    fn test_write_reports_row_count() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out/document_keywords_tfidf.csv");
        let documents = vec![
            ("一".to_string(), set(&[("甲", 0.3), ("乙", 0.1)])),
            ("二".to_string(), DocumentKeywordSet::empty()),
        ];
        let rows = ReportWriter::new().write(&documents, &path).unwrap();
        assert_eq!(rows, 2);
        assert!(path.exists());
    }

    #[test]
    fn test_unwritable_path_is_io_write() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "file").unwrap();
        let err = ReportWriter::new()
            .write(&[], &blocker.join("report.csv"))
            .unwrap_err();
        assert!(matches!(err, LexiError::IoWrite { .. }));
    }
}
