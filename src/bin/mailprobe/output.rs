use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mailprobe::{BatchReport, Row};
use tracing::{info, warn};

use crate::input::CsvRow;

pub const RESULT_COLUMNS: [&str; 5] = ["format_valid", "domain_exists", "smtp_valid", "valid", "reason"];

/// `<stem>_valid.csv`, `<stem>_invalid.csv`, `<stem>_results.csv` next to the
/// output base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub valid: PathBuf,
    pub invalid: PathBuf,
    pub combined: PathBuf,
}

impl OutputPaths {
    pub fn from_base(base: &Path) -> Self {
        let stem = base
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "cleaned_emails".to_string());
        let ext = base
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| "csv".to_string());
        let dir = base.parent().unwrap_or_else(|| Path::new(""));
        let named = |suffix: &str| dir.join(format!("{stem}_{suffix}.{ext}"));
        Self {
            valid: named("valid"),
            invalid: named("invalid"),
            combined: named("results"),
        }
    }
}

/// Writes the three reports; empty partitions produce no file. Returns the
/// paths actually written.
pub fn write_reports(
    report: &BatchReport<CsvRow>,
    headers: &[String],
    paths: &OutputPaths,
) -> Result<Vec<PathBuf>> {
    if report.is_empty() {
        warn!("no results to write");
        return Ok(Vec::new());
    }

    let mut written = Vec::new();
    if report.valid_count() > 0 {
        write_rows(&paths.valid, headers, report.valid_rows())?;
        info!(path = %paths.valid.display(), rows = report.valid_count(), "valid emails saved");
        written.push(paths.valid.clone());
    }
    if report.invalid_count() > 0 {
        write_rows(&paths.invalid, headers, report.invalid_rows())?;
        info!(path = %paths.invalid.display(), rows = report.invalid_count(), "invalid emails saved");
        written.push(paths.invalid.clone());
    }
    write_rows(&paths.combined, headers, report.all_rows().iter())?;
    info!(path = %paths.combined.display(), rows = report.len(), "all results saved");
    written.push(paths.combined.clone());
    Ok(written)
}

/// One JSON object per address on `out`.
pub fn write_ndjson<W: Write>(report: &BatchReport<CsvRow>, mut out: W) -> Result<()> {
    for row in report.all_rows() {
        let line = serde_json::to_string(&row.result.summary())?;
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}

fn write_rows<'a>(
    path: &Path,
    headers: &[String],
    rows: impl Iterator<Item = &'a Row<CsvRow>>,
) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    let mut header: Vec<&str> = headers.iter().map(String::as_str).collect();
    header.extend(RESULT_COLUMNS);
    wtr.write_record(&header)?;

    for row in rows {
        wtr.write_record(csv_record(row))?;
    }
    let data = wtr.into_inner().context("flush CSV buffer")?;
    write_all_atomically(path, &data)
}

fn csv_record(row: &Row<CsvRow>) -> Vec<String> {
    let result = &row.result;
    let mut record = row.record.fields.clone();
    record.push(bool_str(result.format_valid()).to_string());
    record.push(bool_str(result.domain_exists()).to_string());
    record.push(bool_str(result.smtp_valid()).to_string());
    record.push(bool_str(result.valid()).to_string());
    record.push(result.reason());
    record
}

fn bool_str(flag: bool) -> &'static str {
    if flag { "true" } else { "false" }
}

fn write_all_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    {
        let mut f = std::fs::File::create(&tmp)
            .with_context(|| format!("create {}", tmp.display()))?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input;
    use mailprobe::smtp::SmtpReply;
    use mailprobe::{SmtpOutcome, ValidationResult, Verdict};

    fn sample_report() -> (Vec<String>, BatchReport<CsvRow>) {
        let input = input::from_reader(
            "email,name\ngood@x.test,Good\nbad,Bad\n".as_bytes(),
        )
        .unwrap();
        let mut rows = input.rows.into_iter();
        let mut report = BatchReport::new();
        report.push(
            rows.next().unwrap(),
            ValidationResult::new(
                "good@x.test",
                Verdict::Probed(SmtpOutcome::Accepted {
                    host: "mx.x.test".to_string(),
                    reply: SmtpReply::new(250, "Ok"),
                }),
            ),
        );
        report.push(rows.next().unwrap(), ValidationResult::new("bad", Verdict::BadFormat));
        (input.headers, report)
    }

    #[test]
    fn paths_follow_output_stem() {
        let paths = OutputPaths::from_base(Path::new("out/cleaned.csv"));
        assert_eq!(paths.valid, PathBuf::from("out/cleaned_valid.csv"));
        assert_eq!(paths.invalid, PathBuf::from("out/cleaned_invalid.csv"));
        assert_eq!(paths.combined, PathBuf::from("out/cleaned_results.csv"));

        let bare = OutputPaths::from_base(Path::new("report"));
        assert_eq!(bare.combined, PathBuf::from("report_results.csv"));
    }

    #[test]
    fn writes_partitions_and_combined() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::from_base(&dir.path().join("cleaned.csv"));
        let (headers, report) = sample_report();

        let written = write_reports(&report, &headers, &paths).unwrap();
        assert_eq!(written.len(), 3);

        let combined = std::fs::read_to_string(&paths.combined).unwrap();
        let lines: Vec<&str> = combined.lines().collect();
        assert_eq!(
            lines,
            vec![
                "email,name,format_valid,domain_exists,smtp_valid,valid,reason",
                "good@x.test,Good,true,true,true,true,SMTP: email verified successfully (250 Ok)",
                "bad,Bad,false,false,false,false,FORMAT: invalid email format",
            ]
        );

        let valid = std::fs::read_to_string(&paths.valid).unwrap();
        assert_eq!(valid.lines().count(), 2);
        assert!(valid.contains("good@x.test"));
        let invalid = std::fs::read_to_string(&paths.invalid).unwrap();
        assert_eq!(invalid.lines().count(), 2);
        assert!(invalid.contains("bad,Bad"));
    }

    #[test]
    fn empty_partition_writes_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::from_base(&dir.path().join("cleaned.csv"));
        let input = input::from_reader("email\nnope\n".as_bytes()).unwrap();
        let mut report = BatchReport::new();
        for row in input.rows {
            report.push(row, ValidationResult::new("nope", Verdict::BadFormat));
        }

        let written = write_reports(&report, &input.headers, &paths).unwrap();
        assert_eq!(written, vec![paths.invalid.clone(), paths.combined.clone()]);
        assert!(!paths.valid.exists());
    }

    #[test]
    fn empty_report_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::from_base(&dir.path().join("cleaned.csv"));
        let report: BatchReport<CsvRow> = BatchReport::new();
        let written = write_reports(&report, &["email".to_string()], &paths).unwrap();
        assert!(written.is_empty());
        assert!(!paths.combined.exists());
    }

    #[test]
    fn ndjson_has_one_line_per_row() {
        let (_, report) = sample_report();
        let mut buf = Vec::new();
        write_ndjson(&report, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"valid\":true"));
        assert!(lines[1].contains("\"stage_reached\":\"FORMAT\""));
    }
}
