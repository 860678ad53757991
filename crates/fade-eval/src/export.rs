//! Record and report writers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use crate::error::{EvalError, Result};
use crate::record::EvaluationRecord;
use crate::summary::RunReport;

/// Output layout for evaluation records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    /// One JSON object per line
    #[default]
    Jsonl,
    /// Header row plus one row per record
    Csv,
    /// The full run report as pretty-printed JSON
    Json,
}

impl RecordFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        ext.parse().ok()
    }
}

impl FromStr for RecordFormat {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jsonl" | "ndjson" => Ok(Self::Jsonl),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(EvalError::parse(
                0,
                format!("unknown record format '{other}' (expected jsonl, csv or json)"),
            )),
        }
    }
}

impl fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Jsonl => "jsonl",
            Self::Csv => "csv",
            Self::Json => "json",
        })
    }
}

pub fn write_jsonl<W: Write>(mut writer: W, records: &[EvaluationRecord]) -> Result<()> {
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_csv<W: Write>(mut writer: W, records: &[EvaluationRecord]) -> Result<()> {
    writeln!(writer, "{}", EvaluationRecord::CSV_HEADER)?;
    for record in records {
        writeln!(writer, "{}", record.to_csv_row())?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a report in the given format. Row formats carry only the records.
pub fn write_report<W: Write>(mut writer: W, report: &RunReport, format: RecordFormat) -> Result<()> {
    match format {
        RecordFormat::Jsonl => write_jsonl(writer, &report.records),
        RecordFormat::Csv => write_csv(writer, &report.records),
        RecordFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, report)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            Ok(())
        }
    }
}
