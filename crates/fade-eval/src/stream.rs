//! Event-stream ingress: CSV files and synthetic Zipf traffic
//!
//! The CSV layout is a header row followed by comma-separated fields. Column
//! names are matched loosely so both `timestamp,key,value` streams and the
//! generator's own `timestamp,item_id,packet_size` files load unchanged.
//! Fields are not quoted; keys must not contain commas.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::Zipf;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use fade_core::{DecayError, Event};

use crate::error::{EvalError, Result};

const TIMESTAMP_COLUMNS: &[&str] = &["timestamp", "ts", "time"];
const KEY_COLUMNS: &[&str] = &["key", "item_id", "item", "dest_ip"];
const VALUE_COLUMNS: &[&str] = &["value", "packet_size", "size"];

#[derive(Debug, Clone, Copy)]
struct Columns {
    timestamp: usize,
    key: usize,
    value: Option<usize>,
    width: usize,
}

impl Columns {
    fn from_header(header: &str) -> Result<Self> {
        let names: Vec<String> = header
            .split(',')
            .map(|name| name.trim().to_ascii_lowercase())
            .collect();
        let find = |aliases: &[&str]| names.iter().position(|name| aliases.contains(&name.as_str()));

        let timestamp = find(TIMESTAMP_COLUMNS)
            .ok_or_else(|| EvalError::parse(1, format!("no timestamp column in '{header}'")))?;
        let key = find(KEY_COLUMNS)
            .ok_or_else(|| EvalError::parse(1, format!("no key column in '{header}'")))?;

        Ok(Self {
            timestamp,
            key,
            value: find(VALUE_COLUMNS),
            width: names.len(),
        })
    }
}

/// Streaming reader yielding one event per CSV row
///
/// Rows are read as bytes, so a row that is not UTF-8 surfaces as a
/// recoverable [`EvalError::Parse`] rather than ending the stream.
pub struct CsvEventReader<R> {
    reader: R,
    buf: Vec<u8>,
    columns: Columns,
    line: usize,
    count_only: bool,
}

impl CsvEventReader<BufReader<File>> {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::new(BufReader::new(file))
    }
}

impl<R: BufRead> CsvEventReader<R> {
    /// Read the header row and resolve the column layout.
    pub fn new(mut reader: R) -> Result<Self> {
        let mut buf = Vec::new();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Err(EvalError::parse(1, "empty input, expected a header row"));
        }
        let header = std::str::from_utf8(&buf)
            .map_err(|e| EvalError::parse(1, format!("header is not valid UTF-8: {e}")))?;
        let columns = Columns::from_header(header.trim())?;
        Ok(Self {
            reader,
            buf,
            columns,
            line: 1,
            count_only: false,
        })
    }

    /// Give every event value 1, counting occurrences instead of summing
    /// the value column.
    pub fn count_only(mut self, count_only: bool) -> Self {
        self.count_only = count_only;
        self
    }

    fn parse_row(&self, row: &str) -> Result<Event> {
        let fields: Vec<&str> = row.split(',').map(str::trim).collect();
        if fields.len() < self.columns.width {
            return Err(EvalError::parse(
                self.line,
                format!(
                    "expected {} fields, found {}",
                    self.columns.width,
                    fields.len()
                ),
            ));
        }

        let timestamp: f64 = fields[self.columns.timestamp].parse().map_err(|_| {
            EvalError::parse(
                self.line,
                format!("invalid timestamp '{}'", fields[self.columns.timestamp]),
            )
        })?;
        let value = match self.columns.value {
            Some(index) if !self.count_only => fields[index].parse().map_err(|_| {
                EvalError::parse(self.line, format!("invalid value '{}'", fields[index]))
            })?,
            _ => 1.0,
        };

        Ok(Event::new(timestamp, fields[self.columns.key], value))
    }
}

impl<R: BufRead> Iterator for CsvEventReader<R> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
            self.line += 1;

            let row = match std::str::from_utf8(&self.buf) {
                Ok(row) => row,
                Err(e) => {
                    return Some(Err(EvalError::parse(
                        self.line,
                        format!("row is not valid UTF-8: {e}"),
                    )))
                }
            };
            if row.trim().is_empty() {
                continue;
            }
            return Some(self.parse_row(row));
        }
    }
}

/// Shape of a synthetic traffic stream
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Distinct item ids, drawn from `1..=num_items`
    pub num_items: usize,
    /// Events per second of stream time
    pub rate: f64,
    /// Stream length in seconds
    pub duration: f64,
    /// Zipf skew of the item distribution
    pub zipf_alpha: f64,
    /// Packet sizes are drawn uniformly from `min_size..max_size`
    pub min_size: u32,
    pub max_size: u32,
    pub start_time: f64,
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            num_items: 1000,
            rate: 1000.0,
            duration: 10.0,
            zipf_alpha: 1.2,
            min_size: 40,
            max_size: 1500,
            start_time: 0.0,
            seed: None,
        }
    }
}

/// Zipf-distributed packet stream with evenly spaced timestamps
pub struct TrafficGenerator {
    config: GeneratorConfig,
    zipf: Zipf<f64>,
    rng: StdRng,
    total: u64,
    emitted: u64,
}

impl TrafficGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let invalid = |message: &str| EvalError::from(DecayError::InvalidConfig(message.to_string()));
        if config.num_items == 0 {
            return Err(invalid("generator needs at least one item"));
        }
        if !(config.rate.is_finite() && config.rate > 0.0) {
            return Err(invalid("generator rate must be positive"));
        }
        if !(config.duration.is_finite() && config.duration >= 0.0) {
            return Err(invalid("generator duration must be non-negative"));
        }
        if !(config.zipf_alpha.is_finite() && config.zipf_alpha > 0.0) {
            return Err(invalid("zipf alpha must be positive"));
        }
        if config.min_size >= config.max_size {
            return Err(invalid("packet size range is empty"));
        }

        let zipf = Zipf::new(config.num_items as f64, config.zipf_alpha)
            .map_err(|e| invalid(&format!("invalid zipf distribution: {e}")))?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let total = (config.rate * config.duration).round() as u64;

        Ok(Self {
            config,
            zipf,
            rng,
            total,
            emitted: 0,
        })
    }

    /// Events the generator will emit in total
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Item rank in `1..=num_items`
    fn sample_item(&mut self) -> usize {
        let rank: f64 = self.rng.sample(&self.zipf);
        (rank as usize).clamp(1, self.config.num_items)
    }
}

impl Iterator for TrafficGenerator {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        if self.emitted >= self.total {
            return None;
        }
        let timestamp = self.config.start_time + self.emitted as f64 / self.config.rate;
        let item = self.sample_item();
        let size = self
            .rng
            .random_range(self.config.min_size..self.config.max_size);
        self.emitted += 1;
        Some(Event::new(timestamp, item.to_string(), f64::from(size)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.total - self.emitted) as usize;
        (left, Some(left))
    }
}

/// Write events in the `timestamp,item_id,packet_size` layout, returning
/// the number of rows written.
pub fn write_events<W, I>(mut writer: W, events: I) -> Result<u64>
where
    W: Write,
    I: IntoIterator<Item = Event>,
{
    writeln!(writer, "timestamp,item_id,packet_size")?;
    let mut rows = 0u64;
    for event in events {
        if event.key.contains(',') {
            return Err(EvalError::parse(
                rows as usize + 2,
                format!("key '{}' contains a comma", event.key),
            ));
        }
        writeln!(writer, "{},{},{}", event.timestamp, event.key, event.value)?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}
