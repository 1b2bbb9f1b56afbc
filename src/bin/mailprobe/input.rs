use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use mailprobe::EmailRecord;
use tracing::warn;

/// Input table: the header line plus every data row, fields kept verbatim.
#[derive(Debug)]
pub struct CsvInput {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    pub fields: Vec<String>,
    email_index: usize,
}

impl EmailRecord for CsvRow {
    fn email(&self) -> &str {
        self.fields
            .get(self.email_index)
            .map(String::as_str)
            .unwrap_or("")
    }
}

pub fn read_input(path: &Path) -> Result<CsvInput> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("cannot open input file {}", path.display()))?;
    from_reader(file).with_context(|| format!("cannot read {}", path.display()))
}

pub fn from_reader<R: Read>(reader: R) -> Result<CsvInput> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: Vec<String> = reader
        .headers()
        .context("read CSV header")?
        .iter()
        .map(str::to_string)
        .collect();
    let email_index = email_column(&headers).context("no 'email' column in CSV header")?;

    let mut rows = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("CSV record {}", line + 1))?;
        let mut fields: Vec<String> = record.iter().map(str::to_string).collect();
        // result columns are appended after the header's columns
        if fields.len() > headers.len() {
            warn!(
                record = line + 1,
                extra = fields.len() - headers.len(),
                "dropping fields beyond the header"
            );
        }
        fields.resize(headers.len(), String::new());
        rows.push(CsvRow {
            fields,
            email_index,
        });
    }

    Ok(CsvInput { headers, rows })
}

fn email_column(headers: &[String]) -> Option<usize> {
    headers.iter().position(|name| {
        name.trim_start_matches('\u{feff}')
            .trim()
            .eq_ignore_ascii_case("email")
    })
}
