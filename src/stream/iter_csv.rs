use csv::{Reader, ReaderBuilder, StringRecord, Trim};
use ndarray::Array2;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::common::{SensorReading, FEATURES};
use crate::error::{Error, Result};

/// Iterates over the sensor readings of a CSV file.
///
/// The header row must name the `hour`, `vibration` and `temperature_c` columns; they may
/// appear in any order and any other column is ignored. Every yielded reading has been
/// checked to hold three finite numbers.
///
/// # Example
///
/// ```
/// use machine_watch::stream::iter_csv::IterCsv;
///
/// let content = "machine_id,hour,vibration,temperature_c\nm-1,2,1190,24.5\nm-1,9,1250,25.5";
/// let readings: Vec<_> = IterCsv::new(content.as_bytes())
///     .unwrap()
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(readings.len(), 2);
/// assert_eq!(readings[1].vibration, 1250.0);
/// ```
pub struct IterCsv<R: Read> {
    reader: Reader<R>,
    columns: [usize; 3],
    record: StringRecord,
    row: u64,
}

impl<R: Read> IterCsv<R> {
    pub fn new(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(Trim::All)
            .from_reader(reader);
        let headers = reader.headers()?.to_owned();

        let mut columns = [0; 3];
        for (slot, name) in columns.iter_mut().zip(FEATURES) {
            *slot = headers
                .iter()
                .position(|header| header == name)
                .ok_or_else(|| Error::MissingColumn {
                    column: name.to_string(),
                })?;
        }

        Ok(Self {
            reader,
            columns,
            record: StringRecord::new(),
            row: 0,
        })
    }

    fn parse_record(&self) -> Result<SensorReading> {
        let mut values = [0.0; 3];
        for ((value, &column), name) in values.iter_mut().zip(&self.columns).zip(FEATURES) {
            let field = self.record.get(column).unwrap_or("");
            *value = match field.parse::<f64>() {
                Ok(v) if v.is_finite() => v,
                _ => {
                    return Err(Error::InvalidValue {
                        row: self.row,
                        column: name.to_string(),
                        value: field.to_string(),
                    })
                }
            };
        }
        Ok(SensorReading::new(values[0], values[1], values[2]))
    }
}

impl IterCsv<BufReader<File>> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        IterCsv::new(BufReader::new(file))
    }
}

impl<R: Read> Iterator for IterCsv<R> {
    type Item = Result<SensorReading>;

    /// Rows are numbered from 1, not counting the header.
    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_record(&mut self.record) {
            Ok(true) => {
                self.row += 1;
                Some(self.parse_record())
            }
            Ok(false) => None,
            Err(e) => Some(Err(e.into())),
        }
    }
}

/// Read every reading of a CSV file, stopping at the first bad row.
pub fn load_readings<P: AsRef<Path>>(path: P) -> Result<Vec<SensorReading>> {
    IterCsv::from_path(path)?.collect()
}

/// Stack readings into an `n x 3` matrix with columns in feature order.
pub fn to_matrix(readings: &[SensorReading]) -> Array2<f64> {
    Array2::from_shape_fn((readings.len(), FEATURES.len()), |(i, j)| {
        readings[i].to_features()[j]
    })
}
