//! File-driven telemetry replay.
//!
//! The replay file is the range-test CSV format: a label line followed by
//! `time,mass,p1,p2` rows with mass in kilograms and pressures in PSI. The
//! file loops forever so a demo stream never runs dry. Row timestamps are
//! ignored; the telemetry task stamps measurements with pad uptime.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::{Measurement, SensorError, SensorSource};

pub struct ReplaySource<R> {
    reader: R,
    path: PathBuf,
}

impl ReplaySource<BufReader<File>> {
    /// Open a replay file and discard its label line.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SensorError> {
        let path = path.as_ref().to_path_buf();
        let io = |source| SensorError::Io {
            path: path.clone(),
            source,
        };
        let mut reader = BufReader::new(File::open(&path).map_err(io)?);
        reader.read_line(&mut String::new()).map_err(io)?;
        Ok(Self { reader, path })
    }
}

impl<R: BufRead + Seek + Send> ReplaySource<R> {
    /// Replay from an in-memory reader; used by tests.
    pub fn from_reader(mut reader: R, name: impl Into<PathBuf>) -> Result<Self, SensorError> {
        let path = name.into();
        reader.read_line(&mut String::new()).map_err(|source| SensorError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Self { reader, path })
    }

    fn io(&self, source: std::io::Error) -> SensorError {
        SensorError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn next_line(&mut self) -> Result<Option<String>, SensorError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).map_err(|e| self.io(e))? == 0 {
            // End of file: rewind past the label line and go again.
            self.reader
                .seek(SeekFrom::Start(0))
                .map_err(|e| self.io(e))?;
            let mut label = String::new();
            self.reader.read_line(&mut label).map_err(|e| self.io(e))?;
            line.clear();
            if self.reader.read_line(&mut line).map_err(|e| self.io(e))? == 0 {
                return Ok(None);
            }
        }
        Ok(Some(line))
    }
}

fn parse_row(line: &str) -> Option<(f64, f64, f64)> {
    let mut fields = line.trim().split(',');
    let _time: f64 = fields.next()?.trim().parse().ok()?;
    let mass: f64 = fields.next()?.trim().parse().ok()?;
    let p1: f64 = fields.next()?.trim().parse().ok()?;
    let p2: f64 = fields.next()?.trim().parse().ok()?;
    Some((mass, p1, p2))
}

impl<R: BufRead + Seek + Send> SensorSource for ReplaySource<R> {
    fn sample(&mut self) -> Result<Vec<Measurement>, SensorError> {
        let Some(line) = self.next_line()? else {
            return Ok(Vec::new());
        };
        let Some((mass, p1, p2)) = parse_row(&line) else {
            warn!(file = %self.path.display(), line = line.trim(), "skipping malformed replay row");
            return Ok(Vec::new());
        };
        Ok(vec![
            Measurement::Mass {
                id: 0,
                grams: (mass * 1000.0) as i32,
            },
            Measurement::Pressure {
                id: 1,
                millipsi: (p1 * 1000.0) as i32,
            },
            Measurement::Pressure {
                id: 2,
                millipsi: (p2 * 1000.0) as i32,
            },
        ])
    }
}
