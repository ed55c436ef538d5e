use crate::error::{DetectorError, Result};
use crate::label::{normalize_label, Label};
use crate::normalization::TextNormalizer;
use crate::schema::SchemaMapper;
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Enumerates the labeled files a corpus is built from.
///
/// Files are listed up front and read on demand, so the builder can process
/// them independently.
pub trait CorpusSource: Sync {
    fn list(&self) -> Result<Vec<String>>;
    fn read(&self, id: &str) -> Result<Vec<u8>>;
}

/// Every `*.csv` file directly inside a directory, in file-name order.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CorpusSource for DirectorySource {
    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let is_csv = path
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false);
            if let (true, Some(name)) = (is_csv, path.file_name().and_then(|n| n.to_str())) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, id: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.dir.join(id))?)
    }
}

/// In-memory files, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: Vec<(String, Vec<u8>)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, id: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.push((id.into(), contents.into()));
        self
    }
}

impl CorpusSource for MemorySource {
    fn list(&self) -> Result<Vec<String>> {
        Ok(self.files.iter().map(|(id, _)| id.clone()).collect())
    }

    fn read(&self, id: &str) -> Result<Vec<u8>> {
        self.files
            .iter()
            .find(|(name, _)| name == id)
            .map(|(_, contents)| contents.clone())
            .ok_or_else(|| {
                DetectorError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no in-memory file named {id}"),
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceEncoding {
    Utf8,
    Latin1,
}

/// Decodes as UTF-8, falling back to Latin-1 for the whole file.
pub fn decode_source(bytes: Vec<u8>) -> (String, SourceEncoding) {
    match String::from_utf8(bytes) {
        Ok(text) => (text, SourceEncoding::Utf8),
        Err(e) => {
            let text = e.into_bytes().iter().map(|&b| b as char).collect();
            (text, SourceEncoding::Latin1)
        }
    }
}

/// One row as read from a source file, before any normalization.
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    pub body: Option<&'a str>,
    pub label: &'a str,
    pub source_file: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedRecord {
    pub body: String,
    pub label: Label,
    pub body_clean: String,
    pub urls_extracted: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    UnknownLabel,
    MissingBody,
}

/// The unified training corpus.
#[derive(Debug, Clone, Default)]
pub struct LabeledCorpus {
    records: Vec<CleanedRecord>,
}

impl LabeledCorpus {
    pub fn new(records: Vec<CleanedRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[CleanedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn labels(&self) -> Vec<Label> {
        self.records.iter().map(|r| r.label).collect()
    }

    /// Record counts indexed by `Label::index`.
    pub fn class_counts(&self) -> [usize; 2] {
        let mut counts = [0; 2];
        for record in &self.records {
            counts[record.label.index()] += 1;
        }
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileStatus {
    Loaded {
        encoding: SourceEncoding,
        kept: usize,
        dropped_label: usize,
        dropped_body: usize,
        malformed: usize,
    },
    Skipped {
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub source: String,
    #[serde(flatten)]
    pub status: FileStatus,
}

/// Per-file outcome of a corpus build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub files: Vec<FileReport>,
}

impl BuildReport {
    pub fn loaded_files(&self) -> usize {
        self.files
            .iter()
            .filter(|f| matches!(f.status, FileStatus::Loaded { .. }))
            .count()
    }

    pub fn skipped_files(&self) -> usize {
        self.files.len() - self.loaded_files()
    }

    pub fn rows_kept(&self) -> usize {
        self.sum(|status| match status {
            FileStatus::Loaded { kept, .. } => *kept,
            FileStatus::Skipped { .. } => 0,
        })
    }

    pub fn rows_dropped(&self) -> usize {
        self.sum(|status| match status {
            FileStatus::Loaded {
                dropped_label,
                dropped_body,
                malformed,
                ..
            } => dropped_label + dropped_body + malformed,
            FileStatus::Skipped { .. } => 0,
        })
    }

    fn sum(&self, f: impl Fn(&FileStatus) -> usize) -> usize {
        self.files.iter().map(|file| f(&file.status)).sum()
    }
}

/// Records and report for one processed source file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub report: FileReport,
    pub records: Vec<CleanedRecord>,
}

impl FileOutcome {
    fn skipped(source: &str, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        log::warn!("Skipping {source} ({reason})");
        Self {
            report: FileReport {
                source: source.to_string(),
                status: FileStatus::Skipped { reason },
            },
            records: Vec::new(),
        }
    }
}

/// Turns heterogeneous labeled CSV files into one `LabeledCorpus`.
pub struct CorpusBuilder {
    mapper: SchemaMapper,
    normalizer: TextNormalizer,
    parallel: bool,
}

impl CorpusBuilder {
    pub fn new(mapper: SchemaMapper, normalizer: TextNormalizer) -> Self {
        Self {
            mapper,
            normalizer,
            parallel: false,
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn normalizer(&self) -> &TextNormalizer {
        &self.normalizer
    }

    /// Builds the corpus, failing with `EmptyCorpus` when nothing survives.
    pub fn build(&self, source: &dyn CorpusSource) -> Result<(LabeledCorpus, BuildReport)> {
        let outcomes = self.process_all(source)?;

        let mut records = Vec::new();
        let mut report = BuildReport::default();
        for outcome in outcomes {
            records.extend(outcome.records);
            report.files.push(outcome.report);
        }

        log::info!(
            "Corpus built from {} of {} files: {} rows kept, {} rows dropped",
            report.loaded_files(),
            report.files.len(),
            report.rows_kept(),
            report.rows_dropped()
        );

        if records.is_empty() {
            log::error!("No valid data found in any source file");
            return Err(DetectorError::EmptyCorpus);
        }

        Ok((LabeledCorpus::new(records), report))
    }

    /// Processes every listed file, returning outcomes ordered by source id.
    pub fn process_all(&self, source: &dyn CorpusSource) -> Result<Vec<FileOutcome>> {
        let ids = source.list()?;

        let mut outcomes: Vec<FileOutcome> = if self.parallel {
            ids.par_iter().map(|id| self.load_file(source, id)).collect()
        } else {
            ids.iter().map(|id| self.load_file(source, id)).collect()
        };

        outcomes.sort_by(|a, b| a.report.source.cmp(&b.report.source));
        Ok(outcomes)
    }

    fn load_file(&self, source: &dyn CorpusSource, id: &str) -> FileOutcome {
        match source.read(id) {
            Ok(bytes) => self.process_file(id, bytes),
            Err(e) => FileOutcome::skipped(id, format!("unreadable: {e}")),
        }
    }

    /// Schema-maps, cleans and label-normalizes one file's rows.
    pub fn process_file(&self, id: &str, bytes: Vec<u8>) -> FileOutcome {
        let (text, encoding) = decode_source(bytes);
        if encoding == SourceEncoding::Latin1 {
            log::warn!("{id} is not valid UTF-8, decoded as Latin-1");
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let headers = match reader.headers() {
            Ok(headers) => headers.clone(),
            Err(e) => return FileOutcome::skipped(id, format!("unreadable header: {e}")),
        };

        let mapping = self.mapper.map_schema(headers.iter());
        let (body_col, label_col) = match mapping.resolved() {
            Some((body, label)) => (body.index, label.index),
            None => {
                let reason = mapping
                    .missing_roles()
                    .unwrap_or_else(|| "unresolved columns".to_string());
                return FileOutcome::skipped(id, reason);
            }
        };

        let mut records = Vec::new();
        let (mut dropped_label, mut dropped_body, mut malformed) = (0, 0, 0);

        for row in reader.records() {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    log::debug!("{id}: malformed row: {e}");
                    malformed += 1;
                    continue;
                }
            };

            let raw = RawRecord {
                body: row.get(body_col),
                label: row.get(label_col).unwrap_or_default(),
                source_file: id,
            };

            match self.clean_record(&raw) {
                Ok(record) => records.push(record),
                Err(DropReason::UnknownLabel) => dropped_label += 1,
                Err(DropReason::MissingBody) => dropped_body += 1,
            }
        }

        log::info!(
            "Loaded: {id} (rows: {}, dropped: {})",
            records.len(),
            dropped_label + dropped_body + malformed
        );

        FileOutcome {
            report: FileReport {
                source: id.to_string(),
                status: FileStatus::Loaded {
                    encoding,
                    kept: records.len(),
                    dropped_label,
                    dropped_body,
                    malformed,
                },
            },
            records,
        }
    }

    pub fn clean_record(&self, raw: &RawRecord<'_>) -> std::result::Result<CleanedRecord, DropReason> {
        let label = normalize_label(raw.label).ok_or(DropReason::UnknownLabel)?;

        let body = match raw.body {
            Some(body) if !body.trim().is_empty() => body,
            _ => return Err(DropReason::MissingBody),
        };

        let normalized = self.normalizer.normalize(Some(body));
        Ok(CleanedRecord {
            body: body.to_string(),
            label,
            body_clean: normalized.clean,
            urls_extracted: normalized.urls,
        })
    }
}

impl Default for CorpusBuilder {
    fn default() -> Self {
        Self::new(SchemaMapper::default(), TextNormalizer::default())
    }
}

/// Writes the `body, label, body_clean, urls_extracted` intermediate CSV.
pub fn write_cleaned_csv<W: Write>(records: &[CleanedRecord], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(["body", "label", "body_clean", "urls_extracted"])?;
    for record in records {
        let urls = record.urls_extracted.join(", ");
        writer.write_record([
            record.body.as_str(),
            record.label.as_str(),
            record.body_clean.as_str(),
            urls.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// `emails.csv` becomes `emails_cleaned.csv`.
pub fn cleaned_file_name(source: &str) -> String {
    let stem = Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(source);
    format!("{stem}_cleaned.csv")
}

#[cfg(test)]
mod tests {
    use super::*;

    const KAGGLE_STYLE: &str = "\
Unnamed: 0,Email Text,Email Type
0,Click http://evil.com now!!!,Phishing Email
1,See you at the meeting,Safe Email
2,Cheap pills,spam
3,,Safe Email
";

    const NUMERIC_LABELS: &str = "\
sender,body,label
a@x.com,Verify your password,1
b@y.com,Invoice attached,0
";

    #[test]
    fn test_builds_from_mixed_schemas() {
        let source = MemorySource::new()
            .with_file("b.csv", NUMERIC_LABELS)
            .with_file("a.csv", KAGGLE_STYLE);

        let (corpus, report) = CorpusBuilder::default().build(&source).unwrap();

        assert_eq!(corpus.len(), 4);
        assert_eq!(corpus.class_counts(), [2, 2]);

        // ordered by source id regardless of listing order
        assert_eq!(report.files[0].source, "a.csv");
        assert_eq!(corpus.records()[0].body_clean, "click now");
        assert_eq!(corpus.records()[0].urls_extracted, vec!["http://evil.com"]);
        assert_eq!(corpus.records()[0].label, Label::Phishing);

        assert_eq!(
            report.files[0].status,
            FileStatus::Loaded {
                encoding: SourceEncoding::Utf8,
                kept: 2,
                dropped_label: 1,
                dropped_body: 1,
                malformed: 0,
            }
        );
        assert_eq!(report.rows_kept(), 4);
        assert_eq!(report.rows_dropped(), 2);
    }

    #[test]
    fn test_label_normalization_in_rows() {
        let csv = "body,label\nfirst,1\nsecond,Safe Email\nthird,spam\n";
        let outcome = CorpusBuilder::default().process_file("labels.csv", csv.into());

        let labels: Vec<Label> = outcome.records.iter().map(|r| r.label).collect();
        assert_eq!(labels, vec![Label::Phishing, Label::Safe]);
        assert!(outcome.records.iter().all(|r| r.body != "third"));
    }

    #[test]
    fn test_skips_file_without_known_columns() {
        let source = MemorySource::new()
            .with_file("bad.csv", "subject,verdict\nhello,1\n")
            .with_file("good.csv", NUMERIC_LABELS);

        let (corpus, report) = CorpusBuilder::default().build(&source).unwrap();
        assert_eq!(corpus.len(), 2);
        assert_eq!(report.skipped_files(), 1);
        assert_eq!(
            report.files[0].status,
            FileStatus::Skipped {
                reason: "no text/body column and no label column".to_string()
            }
        );
    }

    #[test]
    fn test_empty_corpus_is_terminal() {
        let source = MemorySource::new()
            .with_file("bad.csv", "subject,verdict\nhello,1\n")
            .with_file("unlabeled.csv", "body,label\nhello,spam\n");

        let result = CorpusBuilder::default().build(&source);
        assert!(matches!(result, Err(DetectorError::EmptyCorpus)));

        let nothing = MemorySource::new();
        assert!(matches!(
            CorpusBuilder::default().build(&nothing),
            Err(DetectorError::EmptyCorpus)
        ));
    }

    #[test]
    fn test_latin1_fallback() {
        let mut bytes = b"body,label\ncaf".to_vec();
        bytes.push(0xE9);
        bytes.extend_from_slice(b" offer,1\n");

        let outcome = CorpusBuilder::default().process_file("latin.csv", bytes);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].body, "café offer");
        assert!(matches!(
            outcome.report.status,
            FileStatus::Loaded {
                encoding: SourceEncoding::Latin1,
                ..
            }
        ));
    }

    #[test]
    fn test_short_rows_count_as_missing_body() {
        let csv = "label,body\n1\n0,hello\n";
        let outcome = CorpusBuilder::default().process_file("short.csv", csv.into());
        assert_eq!(outcome.records.len(), 1);
        assert!(matches!(
            outcome.report.status,
            FileStatus::Loaded { dropped_body: 1, .. }
        ));
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut source = MemorySource::new();
        for i in (0..12).rev() {
            source = source.with_file(
                format!("file_{i:02}.csv"),
                format!("body,label\nmessage {i} alpha,1\nmessage {i} beta,0\n"),
            );
        }

        let (sequential, _) = CorpusBuilder::default().build(&source).unwrap();
        let (parallel, _) = CorpusBuilder::default().parallel(true).build(&source).unwrap();
        assert_eq!(sequential.records(), parallel.records());
        assert_eq!(sequential.records()[0].body, "message 0 alpha");
    }

    #[test]
    fn test_directory_source() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.csv"), NUMERIC_LABELS).unwrap();
        fs::write(dir.path().join("a.CSV"), KAGGLE_STYLE).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::create_dir(dir.path().join("cleaned")).unwrap();

        let source = DirectorySource::new(dir.path());
        assert_eq!(source.list().unwrap(), vec!["a.CSV", "b.csv"]);

        let (corpus, report) = CorpusBuilder::default().build(&source).unwrap();
        assert_eq!(corpus.len(), 4);
        assert_eq!(report.loaded_files(), 2);
    }

    #[test]
    fn test_cleaned_csv_is_a_valid_source() {
        let outcome = CorpusBuilder::default().process_file("a.csv", KAGGLE_STYLE.into());

        let mut buffer = Vec::new();
        write_cleaned_csv(&outcome.records, &mut buffer).unwrap();
        let written = String::from_utf8(buffer.clone()).unwrap();
        assert!(written.starts_with("body,label,body_clean,urls_extracted\n"));
        assert!(written.contains("Click http://evil.com now!!!,phishing,click now,http://evil.com"));

        let reread = CorpusBuilder::default().process_file("a_cleaned.csv", buffer);
        assert_eq!(reread.records, outcome.records);
    }

    #[test]
    fn test_cleaned_file_name() {
        assert_eq!(cleaned_file_name("emails.csv"), "emails_cleaned.csv");
        assert_eq!(cleaned_file_name("Phishing_Email"), "Phishing_Email_cleaned.csv");
    }
}
