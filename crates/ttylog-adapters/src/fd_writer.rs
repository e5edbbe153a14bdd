//! Raw file-descriptor message writing.

use std::fs::{File, OpenOptions};
use std::path::Path;

use nix::errno::Errno;
use ttylog_core::{Error, JsonWriter, Result};

/// Writes message lines to a file descriptor with `write(2)`.
///
/// Each message is written completely or not at all: an interruption
/// before the first byte surfaces as an `Interrupted` I/O error so the
/// caller may retry the whole message, while an interruption mid-message
/// keeps writing so no partial line is ever left behind.
#[derive(Debug)]
pub struct FdJsonWriter {
    file: File,
}

impl FdJsonWriter {
    /// Wraps an open file (or anything convertible to one, such as an
    /// owned fd).
    pub fn from_file(file: impl Into<File>) -> Self {
        FdJsonWriter { file: file.into() }
    }

    /// Opens a log file for appending, creating it if needed.
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(FdJsonWriter { file })
    }
}

impl JsonWriter for FdJsonWriter {
    fn write(&mut self, _id: u64, line: &[u8]) -> Result<()> {
        let mut written = 0;
        while written < line.len() {
            match nix::unistd::write(&self.file, &line[written..]) {
                Ok(n) => written += n,
                Err(Errno::EINTR) if written > 0 => {}
                Err(errno) => return Err(Error::Io(std::io::Error::from_raw_os_error(errno as i32))),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    #[test]
    fn writes_complete_lines() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut writer = FdJsonWriter::append(tmp.path()).unwrap();
        writer.write(1, b"{\"id\":1}\n").unwrap();
        writer.write(2, b"{\"id\":2}\n").unwrap();

        let mut text = String::new();
        File::open(tmp.path())
            .unwrap()
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, "{\"id\":1}\n{\"id\":2}\n");
    }

    #[test]
    fn closed_descriptor_surfaces_the_os_error() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let file = File::open(tmp.path()).unwrap();
        // Opened read-only, so writing must fail with a system error
        let mut writer = FdJsonWriter::from_file(file);
        match writer.write(1, b"x\n") {
            Err(Error::Io(e)) => assert!(!matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted
            )),
            other => panic!("expected I/O error, got {other:?}"),
        }
    }
}
