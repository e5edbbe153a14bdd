//! Line-oriented message reading from files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ttylog_core::{JsonReader, LineJsonReader, Result};

/// A [`JsonReader`] over a log file, one message per line.
#[derive(Debug)]
pub struct FileJsonReader {
    inner: LineJsonReader<BufReader<File>>,
}

impl FileJsonReader {
    /// Opens a message log file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::from_file(File::open(path)?))
    }

    /// Wraps an already-open file (or anything convertible to one, such
    /// as an owned fd).
    pub fn from_file(file: impl Into<File>) -> Self {
        FileJsonReader {
            inner: LineJsonReader::new(BufReader::new(file.into())),
        }
    }
}

impl JsonReader for FileJsonReader {
    fn read(&mut self) -> Result<Option<serde_json::Value>> {
        self.inner.read()
    }

    fn loc(&self) -> u64 {
        self.inner.loc()
    }

    fn format_loc(&self, loc: u64) -> String {
        self.inner.format_loc(loc)
    }
}
