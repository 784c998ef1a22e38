use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::endian;
use crate::error::{Error, Result};
use crate::ffi::Record;

/// Random-access reader over the bytes of an image.
///
/// The cursor may move backwards as well as forwards, FAT containers need
/// to come back to the descriptor table after decoding each architecture.
pub struct ByteSource<R> {
    reader: R,
    path: PathBuf,
}

impl ByteSource<BufReader<File>> {
    /// Opens the file at `path` for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| Error::FileAccess {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file), path))
    }
}

impl<R: Read + Seek> ByteSource<R> {
    /// Wraps an already opened reader. `path` is only used in errors.
    pub fn new<P: AsRef<Path>>(reader: R, path: P) -> Self {
        Self {
            reader,
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads exactly `n` bytes at the current position.
    pub fn read(&mut self, n: usize) -> Result<Vec<u8>> {
        let offset = self.position()?;
        let mut buf = Vec::new();
        let result = (&mut self.reader).take(n as u64).read_to_end(&mut buf);
        let available = result.map_err(|err| self.access_error(err))?;
        if available < n {
            return Err(Error::ShortRead {
                offset,
                expected: n,
                available,
            });
        }
        Ok(buf)
    }

    /// Reads a fixed-size record at the current position, normalizing it
    /// first if `swap` is set.
    pub fn read_record<T: Record>(&mut self, swap: bool) -> Result<T> {
        let offset = self.position()?;
        let buf = endian::normalized(&self.read(T::SIZE)?, swap);
        T::read(&buf, swap).ok_or(Error::ShortRead {
            offset,
            expected: T::SIZE,
            available: buf.len(),
        })
    }

    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.reader
            .seek(SeekFrom::Start(offset))
            .map(|_| ())
            .map_err(|err| self.access_error(err))
    }

    pub fn position(&mut self) -> Result<u64> {
        self.reader
            .stream_position()
            .map_err(|err| self.access_error(err))
    }

    fn access_error(&self, source: io::Error) -> Error {
        Error::FileAccess {
            path: self.path.clone(),
            source,
        }
    }
}
