//! Delimited input loading
//!
//! Reads the header and every record as untyped strings. Only the presence
//! of the timestamp and target columns is checked here; malformed values are
//! left to the cleaner.

use crate::config::InputConfig;
use crate::domain::RawTable;
use crate::error::{ForecastError, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

pub struct CsvLoader<'a> {
    config: &'a InputConfig,
}

impl<'a> CsvLoader<'a> {
    pub fn new(config: &'a InputConfig) -> Self {
        Self { config }
    }

    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<RawTable> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading meter readings");
        let file = File::open(path)?;
        self.load_reader(file)
    }

    pub fn load_reader<R: Read>(&self, reader: R) -> Result<RawTable> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(self.config.delimiter as u8)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        let table = RawTable::new(headers, rows);
        self.validate_schema(&table)?;

        debug!(
            rows = table.len(),
            columns = table.headers.len(),
            "raw table loaded"
        );
        Ok(table)
    }

    fn validate_schema(&self, table: &RawTable) -> Result<()> {
        for required in [&self.config.timestamp_column, &self.config.target_column] {
            if !table.has_column(required) {
                return Err(ForecastError::missing_column(required.as_str()));
            }
        }
        Ok(())
    }
}
